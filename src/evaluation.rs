//! One-call evaluation of a test run against stored baselines
//!
//! Given the declaration, the run's resolved profile, the candidate list and
//! the run's counts, this drops candidates that fail a hard gate, selects a
//! baseline, derives the threshold, judges the run, and classifies the
//! baseline's expiry.

use crate::baseline::{
    BaselineCandidate, BaselineSelector, ConformanceDetail, ExpirationPolicy, ExpirationStatus,
};
use crate::confidence::{
    derive_threshold, evaluate, is_undersized, required_samples_for_compliance, ConfidenceConfig,
    DerivedThreshold, Verdict,
};
use crate::covariate::{CovariateDeclaration, CovariateProfile};
use crate::error::{CovbaseError, Result};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Inputs to [`evaluate_against_baseline`]
#[derive(Debug, Clone)]
pub struct EvaluationRequest<'a> {
    pub use_case_id: &'a str,
    pub declaration: &'a CovariateDeclaration,
    pub test_profile: &'a CovariateProfile,
    pub candidates: &'a [BaselineCandidate],
    pub test_successes: u64,
    pub test_samples: u64,
    pub config: ConfidenceConfig,
    /// Externally anchored pass rate (SLA/SLO) the run should evidence
    pub compliance_target: Option<f64>,
    pub now: DateTime<FixedOffset>,
}

/// Whether the run's size can support its compliance target at all
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplianceCheck {
    pub target: f64,
    pub samples: u64,
    pub undersized: bool,
    pub required_samples: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub baseline_filename: String,
    pub baseline_generated_at: DateTime<FixedOffset>,
    pub ambiguous: bool,
    pub conformance: Vec<ConformanceDetail>,
    pub excluded_by_hard_gate: Vec<String>,
    pub threshold: DerivedThreshold,
    pub verdict: Verdict,
    pub expiration: ExpirationStatus,
    pub compliance: Option<ComplianceCheck>,
    pub warnings: Vec<String>,
}

impl Evaluation {
    pub fn passed(&self) -> bool {
        self.verdict.passed()
    }
}

pub fn evaluate_against_baseline(request: &EvaluationRequest<'_>) -> Result<Evaluation> {
    request.config.validate().map_err(CovbaseError::validation)?;
    let selector = BaselineSelector::new();

    let mut eligible = Vec::with_capacity(request.candidates.len());
    let mut excluded = Vec::new();
    for candidate in request.candidates {
        let gated: Vec<String> = selector
            .conformance(candidate.profile(), request.test_profile, request.declaration)
            .into_iter()
            .filter(|d| {
                !d.conforms()
                    && request
                        .declaration
                        .category(&d.key)
                        .is_some_and(|c| c.is_hard_gate())
            })
            .map(|d| d.key)
            .collect();
        if gated.is_empty() {
            eligible.push(candidate.clone());
        } else {
            tracing::warn!(
                "Excluding baseline {}: configuration mismatch on {}",
                candidate.filename(),
                gated.join(", ")
            );
            excluded.push(candidate.filename().to_string());
        }
    }

    let selection = selector.select(&eligible, request.test_profile, request.declaration);
    let Some(baseline) = selection.selected else {
        return Err(CovbaseError::NotFound {
            searched: format!("baseline for '{}'", request.use_case_id),
            available: excluded,
        });
    };

    let threshold = derive_threshold(
        baseline.successes(),
        baseline.samples(),
        request.test_samples,
        &request.config,
    )?;
    let verdict = evaluate(request.test_successes, request.test_samples, &threshold)?;

    let expiration = ExpirationPolicy::new(baseline.record().expires_in_days)
        .evaluate(baseline.record().end_of_collection(), request.now);

    let compliance = request.compliance_target.map(|target| ComplianceCheck {
        target,
        samples: request.test_samples,
        undersized: is_undersized(request.test_samples, target, &request.config),
        required_samples: required_samples_for_compliance(target, &request.config),
    });

    let mut warnings = selection.warnings();
    if expiration.requires_warning() {
        warnings.push(expiration.message());
    }
    if let Some(check) = compliance.filter(|c| c.undersized) {
        warnings.push(match check.required_samples {
            Some(n) => format!(
                "{} samples cannot evidence a {} pass rate; at least {} are required",
                check.samples, check.target, n
            ),
            None => format!("No finite sample can evidence a {} pass rate", check.target),
        });
    }

    tracing::info!(
        "Evaluated {} against {}: {:?}",
        request.use_case_id,
        baseline.filename(),
        verdict
    );

    Ok(Evaluation {
        baseline_filename: baseline.filename().to_string(),
        baseline_generated_at: baseline.generated_at(),
        ambiguous: selection.ambiguous,
        conformance: selection.conformance,
        excluded_by_hard_gate: excluded,
        threshold,
        verdict,
        expiration,
        compliance,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::fixtures::stamped_yaml;
    use crate::baseline::{validate_record, DocumentFormat};

    const DECLARATION: &str = r#"
timezone = true
[[custom]]
key = "llm_model"
category = "CONFIGURATION"
"#;

    fn candidate(name: &str, model: &str, successes: u64, failures: u64) -> BaselineCandidate {
        let text = stamped_yaml(
            "search",
            "2026-10-01T00:00:00Z",
            "a1b2c3d4",
            &[("timezone", "Europe/London"), ("llm_model", model)],
            successes,
            failures,
        );
        let record = validate_record(&text, DocumentFormat::Yaml, name).unwrap();
        BaselineCandidate::from_record(name, record)
    }

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-10-16T00:00:00Z").unwrap()
    }

    fn request<'a>(
        declaration: &'a CovariateDeclaration,
        profile: &'a CovariateProfile,
        candidates: &'a [BaselineCandidate],
    ) -> EvaluationRequest<'a> {
        EvaluationRequest {
            use_case_id: "search",
            declaration,
            test_profile: profile,
            candidates,
            test_successes: 93,
            test_samples: 100,
            config: ConfidenceConfig::default(),
            compliance_target: None,
            now: now(),
        }
    }

    #[test]
    fn test_configuration_mismatch_excludes_candidate() {
        let declaration = CovariateDeclaration::from_toml_str(DECLARATION).unwrap();
        let profile = CovariateProfile::from_stored([
            ("timezone", "Europe/Paris"),
            ("llm_model", "gpt-x"),
        ]);
        let candidates = vec![
            candidate("other-model.yaml", "gpt-y", 99, 1),
            candidate("same-model.yaml", "gpt-x", 95, 5),
        ];

        let evaluation = evaluate_against_baseline(&request(&declaration, &profile, &candidates))
            .unwrap();
        assert_eq!(evaluation.baseline_filename, "same-model.yaml");
        assert_eq!(evaluation.excluded_by_hard_gate, vec!["other-model.yaml"]);
        // timezone differs but is soft
        assert!(evaluation.warnings.iter().any(|w| w.contains("timezone")));
        assert!(evaluation.passed());
    }

    #[test]
    fn test_all_candidates_gated_is_not_found() {
        let declaration = CovariateDeclaration::from_toml_str(DECLARATION).unwrap();
        let profile = CovariateProfile::from_stored([
            ("timezone", "Europe/London"),
            ("llm_model", "gpt-z"),
        ]);
        let candidates = vec![candidate("a.yaml", "gpt-x", 95, 5)];

        let err = evaluate_against_baseline(&request(&declaration, &profile, &candidates))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("a.yaml"));
    }

    #[test]
    fn test_failing_run_and_compliance_warning() {
        let declaration = CovariateDeclaration::from_toml_str(DECLARATION).unwrap();
        let profile = CovariateProfile::from_stored([
            ("timezone", "Europe/London"),
            ("llm_model", "gpt-x"),
        ]);
        let candidates = vec![candidate("a.yaml", "gpt-x", 99, 1)];
        let mut req = request(&declaration, &profile, &candidates);
        req.test_successes = 60;
        req.compliance_target = Some(0.9999);

        let evaluation = evaluate_against_baseline(&req).unwrap();
        assert!(!evaluation.passed());
        let compliance = evaluation.compliance.unwrap();
        assert!(compliance.undersized);
        assert!(compliance.required_samples.unwrap() > 90_000);
        assert!(evaluation
            .warnings
            .iter()
            .any(|w| w.contains("cannot evidence")));
        assert!(matches!(evaluation.expiration, ExpirationStatus::Valid { .. }));
    }
}
