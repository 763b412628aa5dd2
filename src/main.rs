use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local};
use clap::Parser;
use covbase::baseline::{validate_record, BaselineRepository, BaselineSelector, DocumentFormat};
use covbase::cli::{parse_key_value, Cli, Command, EvaluateArgs, OutputFormat, SelectArgs};
use covbase::confidence::{
    is_undersized, perfect_run_lower_bound, required_samples_for_compliance, ConfidenceConfig,
};
use covbase::covariate::{
    CovariateDeclaration, CovariateProfile, CovariateResolver, FixedContext, ResolutionContext,
    SystemContext, REGION_ENV_VAR, REGION_PROPERTY,
};
use covbase::evaluation::{evaluate_against_baseline, EvaluationRequest};
use covbase::execution_spec::SpecRegistry;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Everything `select` and `evaluate` share: declaration, profile, candidates
struct Prepared {
    declaration: CovariateDeclaration,
    profile: CovariateProfile,
    now: DateTime<FixedOffset>,
    repository: BaselineRepository,
}

fn prepare(args: &SelectArgs) -> Result<Prepared> {
    let declaration = CovariateDeclaration::from_toml(&args.declaration).with_context(|| {
        format!(
            "Failed to load covariate declaration {}",
            args.declaration.display()
        )
    })?;

    let now = match &args.now {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid --now '{}': expected RFC 3339", raw))?,
        None => Local::now().fixed_offset(),
    };
    let tz_id = args
        .tz_id
        .clone()
        .unwrap_or_else(|| SystemContext::new().timezone_id());

    let mut context = FixedContext::new(now, tz_id);
    if let Some(region) = &args.region {
        context = context.with_property(REGION_PROPERTY, region.as_str());
    }
    if let Ok(region) = std::env::var(REGION_ENV_VAR) {
        context = context.with_env(REGION_ENV_VAR, region);
    }

    let mut custom = HashMap::new();
    for raw in &args.custom {
        let (key, value) = parse_key_value(raw).map_err(anyhow::Error::msg)?;
        custom.insert(key, value);
    }

    let profile = CovariateResolver::new(&declaration).resolve(&context, &custom);
    Ok(Prepared {
        declaration,
        profile,
        now,
        repository: BaselineRepository::new(&args.baselines),
    })
}

fn profile_json(profile: &CovariateProfile) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (key, value) in profile.iter() {
        map.insert(key.to_string(), json!(value.canonical()));
    }
    serde_json::Value::Object(map)
}

fn run_select(args: &SelectArgs, format: OutputFormat) -> Result<()> {
    let prepared = prepare(args)?;
    let footprint = prepared.declaration.footprint();
    let candidates = prepared
        .repository
        .require_candidates(&args.use_case, &footprint)?;

    let result =
        BaselineSelector::new().select(&candidates, &prepared.profile, &prepared.declaration);
    let selected = result
        .selected
        .context("No baseline could be selected")?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "useCaseId": args.use_case,
            "footprint": footprint,
            "profile": profile_json(&prepared.profile),
            "selected": selected.filename(),
            "score": result.score,
            "ambiguous": result.ambiguous,
            "candidatesConsidered": result.candidates_considered,
            "conformance": result.conformance,
            "hardGateViolations": result
                .hard_gate_violations(&prepared.declaration)
                .iter()
                .map(|d| d.key.as_str())
                .collect::<Vec<_>>(),
            "warnings": result.warnings(),
        }))?,
        OutputFormat::Text => {
            println!("Use case:   {}", args.use_case);
            println!("Footprint:  {}", footprint);
            for (key, value) in prepared.profile.iter() {
                println!("  {} = {}", key, value);
            }
            println!(
                "Selected:   {} (score {}, {} candidates)",
                selected.filename(),
                result.score,
                result.candidates_considered
            );
            for detail in &result.conformance {
                println!(
                    "  {:<16} {:<20} {:<20} {}",
                    detail.key, detail.baseline_value, detail.test_value, detail.result
                );
            }
            for warning in result.warnings() {
                println!("WARNING: {}", warning);
            }
        }
    }
    Ok(())
}

fn run_evaluate(args: &EvaluateArgs, format: OutputFormat) -> Result<bool> {
    let prepared = prepare(&args.select)?;
    let candidates = prepared
        .repository
        .require_candidates(&args.select.use_case, &prepared.declaration.footprint())?;

    let evaluation = evaluate_against_baseline(&EvaluationRequest {
        use_case_id: &args.select.use_case,
        declaration: &prepared.declaration,
        test_profile: &prepared.profile,
        candidates: &candidates,
        test_successes: args.successes,
        test_samples: args.samples,
        config: ConfidenceConfig::default(),
        compliance_target: args.target,
        now: prepared.now,
    })?;

    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&evaluation)?)?,
        OutputFormat::Text => {
            println!("Baseline:   {}", evaluation.baseline_filename);
            println!(
                "Threshold:  {:.4} (baseline {}/{}, {:.0}% confidence)",
                evaluation.threshold.min_pass_rate,
                evaluation.threshold.baseline_successes,
                evaluation.threshold.baseline_samples,
                evaluation.threshold.confidence_level * 100.0
            );
            println!(
                "Observed:   {:.4} ({}/{})",
                evaluation.verdict.observed_rate(),
                args.successes,
                args.samples
            );
            println!(
                "Verdict:    {}",
                if evaluation.passed() { "PASS" } else { "FAIL" }
            );
            println!("Expiration: {}", evaluation.expiration);
            for warning in &evaluation.warnings {
                println!("WARNING: {}", warning);
            }
        }
    }
    Ok(evaluation.passed())
}

fn run_validate(file: &Path, format: OutputFormat) -> Result<()> {
    let format_of_file = DocumentFormat::from_path(file)
        .with_context(|| format!("{} is not a .yaml, .yml or .json file", file.display()))?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let record = validate_record(&text, format_of_file, &file.display().to_string())?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "valid": true,
            "record": record,
        }))?,
        OutputFormat::Text => {
            println!(
                "{}: valid ({} {}, {} samples, observed {:.4})",
                file.display(),
                record.use_case_id,
                record.schema_version,
                record.statistics.samples(),
                record.statistics.observed_rate
            );
        }
    }
    Ok(())
}

fn run_sample_size(
    target: f64,
    samples: Option<u64>,
    confidence: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let mut config = ConfidenceConfig::default();
    if let Some(level) = confidence {
        config.compliance_confidence = level;
    }
    config.validate().map_err(anyhow::Error::msg)?;
    if target.is_nan() || target <= 0.0 || target > 1.0 {
        anyhow::bail!("Invalid --target {}: must be in (0, 1]", target);
    }

    let required = required_samples_for_compliance(target, &config);
    let check = samples.map(|n| {
        (
            n,
            perfect_run_lower_bound(n, config.compliance_confidence),
            is_undersized(n, target, &config),
        )
    });

    match format {
        OutputFormat::Json => print_json(&json!({
            "target": target,
            "complianceConfidence": config.compliance_confidence,
            "requiredSamples": required,
            "samples": check.map(|(n, _, _)| n),
            "perfectRunLowerBound": check.map(|(_, bound, _)| bound),
            "undersized": check.map(|(_, _, undersized)| undersized),
        }))?,
        OutputFormat::Text => {
            match required {
                Some(n) => println!(
                    "Target {} at {:.1}% confidence needs at least {} samples",
                    target,
                    config.compliance_confidence * 100.0,
                    n
                ),
                None => println!("Target {} cannot be evidenced by any sample size", target),
            }
            if let Some((n, bound, undersized)) = check {
                println!(
                    "{} samples: flawless-run lower bound {:.6} -> {}",
                    n,
                    bound,
                    if undersized { "UNDERSIZED" } else { "SUFFICIENT" }
                );
            }
        }
    }
    Ok(())
}

fn run_spec(dir: &Path, id: &str, format: OutputFormat) -> Result<()> {
    let spec = SpecRegistry::new(dir).resolve(id)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&spec)?)?,
        OutputFormat::Text => {
            println!("Spec:          {}", spec.spec_id);
            println!(
                "Approved:      {} by {}",
                spec.approved_at.to_rfc3339(),
                spec.approved_by
            );
            println!("Min pass rate: {}", spec.requirements.min_pass_rate);
            if !spec.requirements.success_criteria.is_empty() {
                println!("Criteria:      {}", spec.requirements.success_criteria);
            }
            if let Some(notes) = &spec.approval_notes {
                println!("Notes:         {}", notes);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    match &args.command {
        Command::Select(select) => run_select(select, args.format)?,
        Command::Evaluate(evaluate) => {
            if !run_evaluate(evaluate, args.format)? {
                std::process::exit(1);
            }
        }
        Command::Validate { file } => run_validate(file, args.format)?,
        Command::SampleSize {
            target,
            samples,
            confidence,
        } => run_sample_size(*target, *samples, *confidence, args.format)?,
        Command::Spec { dir, id } => run_spec(dir, id, args.format)?,
    }
    Ok(())
}
