//! CLI argument parsing for covbase

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "covbase")]
#[command(version)]
#[command(
    about = "Covariate-aware baseline selection and pass-rate thresholds for non-deterministic tests",
    long_about = None
)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Enable debug tracing output (to stderr)
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the current covariate profile and select a baseline
    Select(SelectArgs),

    /// Select a baseline and judge a test run's counts against it
    Evaluate(EvaluateArgs),

    /// Validate a stored baseline record, listing every violation
    Validate {
        /// Baseline record (.yaml, .yml or .json)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check whether a sample size can evidence a target pass rate
    SampleSize {
        /// Target pass rate in (0, 1)
        #[arg(long = "target", value_name = "RATE")]
        target: f64,

        /// Planned sample count to check against the target
        #[arg(long = "samples", value_name = "N")]
        samples: Option<u64>,

        /// One-sided confidence for the compliance bound (default: 0.999)
        #[arg(long = "confidence", value_name = "LEVEL")]
        confidence: Option<f64>,
    },

    /// Resolve an approved execution specification by id
    Spec {
        /// Specification directory
        #[arg(long = "dir", value_name = "DIR")]
        dir: PathBuf,

        /// Specification id (useCaseId:vN)
        #[arg(value_name = "ID")]
        id: String,
    },
}

/// Where baselines live and how the current context is resolved
#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    /// Directory of stored baseline records
    #[arg(long = "baselines", value_name = "DIR")]
    pub baselines: PathBuf,

    /// Use case identifier
    #[arg(long = "use-case", value_name = "ID")]
    pub use_case: String,

    /// Covariate declaration (TOML)
    #[arg(long = "declaration", value_name = "FILE")]
    pub declaration: PathBuf,

    /// Evaluate at this instant instead of the system clock (RFC 3339)
    #[arg(long = "now", value_name = "RFC3339")]
    pub now: Option<String>,

    /// Timezone identifier to report (default: TZ or the clock's offset)
    #[arg(long = "tz-id", value_name = "ID")]
    pub tz_id: Option<String>,

    /// Region code, taking priority over COVBASE_REGION
    #[arg(long = "region", value_name = "CODE")]
    pub region: Option<String>,

    /// Custom covariate value (repeatable)
    #[arg(long = "custom", value_name = "KEY=VALUE")]
    pub custom: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Successful samples in the test run
    #[arg(long = "successes", value_name = "N")]
    pub successes: u64,

    /// Total samples in the test run
    #[arg(long = "samples", value_name = "N")]
    pub samples: u64,

    /// Compliance target the run should evidence
    #[arg(long = "target", value_name = "RATE")]
    pub target: Option<f64>,
}

/// Split a `KEY=VALUE` argument
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}
