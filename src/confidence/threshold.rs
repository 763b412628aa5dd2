// Pass/fail thresholds derived from a baseline's raw counts
//
// The threshold is the one-sided Wilson lower bound on the baseline's rate at
// the test's sample size: the worst observed rate a healthy service (one still
// performing at the baseline rate) would plausibly show over that many samples.

use crate::confidence::config::ConfidenceConfig;
use crate::confidence::interval::{wilson_interval, wilson_lower_bound, WilsonInterval};
use crate::error::{CovbaseError, Result};
use serde::{Deserialize, Serialize};

/// Minimum pass rate derived from a baseline for a given test size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedThreshold {
    pub baseline_successes: u64,
    pub baseline_samples: u64,
    pub observed_rate: f64,
    /// Two-sided interval on the baseline rate, for reporting
    pub baseline_interval: WilsonInterval,
    pub test_samples: u64,
    pub min_pass_rate: f64,
    pub confidence_level: f64,
}

/// Outcome of a test run against a derived threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass { observed_rate: f64, min_pass_rate: f64 },
    Fail { observed_rate: f64, min_pass_rate: f64 },
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }

    pub fn observed_rate(&self) -> f64 {
        match self {
            Verdict::Pass { observed_rate, .. } | Verdict::Fail { observed_rate, .. } => {
                *observed_rate
            }
        }
    }
}

fn check_counts(successes: u64, samples: u64, what: &str) -> Result<()> {
    if samples == 0 {
        return Err(CovbaseError::validation(format!(
            "{} sample count must be positive",
            what
        )));
    }
    if successes > samples {
        return Err(CovbaseError::validation(format!(
            "{} successes ({}) exceed samples ({})",
            what, successes, samples
        )));
    }
    Ok(())
}

/// Derive the minimum pass rate a run of `test_samples` must reach
pub fn derive_threshold(
    baseline_successes: u64,
    baseline_samples: u64,
    test_samples: u64,
    config: &ConfidenceConfig,
) -> Result<DerivedThreshold> {
    config.validate().map_err(CovbaseError::validation)?;
    check_counts(baseline_successes, baseline_samples, "Baseline")?;
    if test_samples == 0 {
        return Err(CovbaseError::validation(
            "Test sample count must be positive",
        ));
    }

    let observed_rate = baseline_successes as f64 / baseline_samples as f64;
    let min_pass_rate = wilson_lower_bound(observed_rate, test_samples, config.confidence_level);

    tracing::debug!(
        "Derived threshold {:.4} from baseline {}/{} for {} test samples",
        min_pass_rate,
        baseline_successes,
        baseline_samples,
        test_samples
    );

    Ok(DerivedThreshold {
        baseline_successes,
        baseline_samples,
        observed_rate,
        baseline_interval: wilson_interval(
            baseline_successes,
            baseline_samples,
            config.confidence_level,
        ),
        test_samples,
        min_pass_rate,
        confidence_level: config.confidence_level,
    })
}

/// Judge a test run's counts against a derived threshold
pub fn evaluate(successes: u64, samples: u64, threshold: &DerivedThreshold) -> Result<Verdict> {
    check_counts(successes, samples, "Test")?;
    let observed_rate = successes as f64 / samples as f64;
    let min_pass_rate = threshold.min_pass_rate;
    if observed_rate >= min_pass_rate {
        Ok(Verdict::Pass {
            observed_rate,
            min_pass_rate,
        })
    } else {
        Ok(Verdict::Fail {
            observed_rate,
            min_pass_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_below_baseline_rate() {
        let config = ConfidenceConfig::default();
        let threshold = derive_threshold(950, 1000, 100, &config).unwrap();
        assert!((threshold.observed_rate - 0.95).abs() < 1e-12);
        assert!(threshold.min_pass_rate < 0.95);
        assert!(threshold.min_pass_rate > 0.85);
        assert!(threshold.baseline_interval.contains(0.95));
    }

    #[test]
    fn test_larger_test_runs_get_tighter_thresholds() {
        let config = ConfidenceConfig::default();
        let small = derive_threshold(900, 1000, 50, &config).unwrap();
        let large = derive_threshold(900, 1000, 5000, &config).unwrap();
        assert!(large.min_pass_rate > small.min_pass_rate);
    }

    #[test]
    fn test_evaluate_pass_and_fail() {
        let config = ConfidenceConfig::default();
        let threshold = derive_threshold(950, 1000, 100, &config).unwrap();

        let pass = evaluate(94, 100, &threshold).unwrap();
        assert!(pass.passed());
        assert!((pass.observed_rate() - 0.94).abs() < 1e-12);

        let fail = evaluate(70, 100, &threshold).unwrap();
        assert!(!fail.passed());
    }

    #[test]
    fn test_invalid_counts_rejected() {
        let config = ConfidenceConfig::default();
        assert!(derive_threshold(0, 0, 10, &config).is_err());
        assert!(derive_threshold(11, 10, 10, &config).is_err());
        assert!(derive_threshold(5, 10, 0, &config).is_err());

        let threshold = derive_threshold(9, 10, 10, &config).unwrap();
        assert!(evaluate(1, 0, &threshold).is_err());
        assert!(evaluate(11, 10, &threshold).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ConfidenceConfig {
            confidence_level: 1.5,
            ..ConfidenceConfig::default()
        };
        let err = derive_threshold(9, 10, 10, &config).unwrap_err();
        assert!(err.to_string().contains("confidence_level"));
    }
}
