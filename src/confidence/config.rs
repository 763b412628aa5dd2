// Configuration for confidence intervals and compliance gating
//
// Only confidence levels are stored. The matching significance levels
// (alpha = 1 - confidence) are always derived, so reporting and gating can
// never disagree about which level is in force.

use serde::{Deserialize, Serialize};

/// Default two-sided confidence for reported intervals and derived thresholds
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Default one-sided confidence backing compliance claims (alpha = 0.001)
pub const DEFAULT_COMPLIANCE_CONFIDENCE: f64 = 0.999;

/// Confidence settings for the statistical engine
///
/// # Example
/// ```
/// use covbase::confidence::ConfidenceConfig;
///
/// let config = ConfidenceConfig::default();
/// assert_eq!(config.confidence_level, 0.95);
/// assert!((config.compliance_alpha() - 0.001).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    /// Confidence level for reported intervals and baseline-derived thresholds
    ///
    /// - 0.95 (default): standard reporting level
    /// - 0.99: stricter thresholds, fewer false failures
    /// - 0.90: looser thresholds, catches regressions earlier
    pub confidence_level: f64,

    /// One-sided confidence for compliance claims against an external target
    ///
    /// Default: 0.999. A perfect run of n samples supports a target p only if
    /// n / (n + z²) >= p with z the normal quantile at this level.
    pub compliance_confidence: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            compliance_confidence: DEFAULT_COMPLIANCE_CONFIDENCE,
        }
    }
}

impl ConfidenceConfig {
    /// Higher confidence: lower thresholds from the same baseline, fewer false failures
    pub fn strict() -> Self {
        Self {
            confidence_level: 0.99,
            compliance_confidence: 0.9999,
        }
    }

    /// Lower confidence: tighter thresholds, regressions flagged earlier
    pub fn permissive() -> Self {
        Self {
            confidence_level: 0.90,
            compliance_confidence: 0.99,
        }
    }

    pub fn alpha(&self) -> f64 {
        1.0 - self.confidence_level
    }

    pub fn compliance_alpha(&self) -> f64 {
        1.0 - self.compliance_confidence
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            ));
        }

        if !(self.compliance_confidence > 0.0 && self.compliance_confidence < 1.0) {
            return Err(format!(
                "compliance_confidence must be in (0, 1), got {}",
                self.compliance_confidence
            ));
        }

        Ok(())
    }
}
