//! Error types shared by the covariate, baseline and specification layers
//!
//! Three kinds matter to callers:
//! - `Validation`: a declaration is malformed and was rejected at extraction time
//! - `NotFound`: nothing stored matches what was asked for (recoverable by
//!   establishing a baseline or approving a specification)
//! - `Schema`: a stored document exists but fails validation; every violation
//!   is listed
//!
//! Ambiguous selection and soft covariate mismatches are not errors. They are
//! reported as warnings on an otherwise successful result.

use thiserror::Error;

/// Errors produced by covbase
#[derive(Error, Debug)]
pub enum CovbaseError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("No match for '{searched}' (available: {})", format_available(.available))]
    NotFound {
        searched: String,
        available: Vec<String>,
    },

    #[error("{origin} failed validation with {} violation(s):\n{}", .violations.len(), format_violations(.violations))]
    Schema {
        origin: String,
        violations: Vec<String>,
    },

    #[error("Malformed specification id '{0}': expected '<useCaseId>:v<N>' (e.g. 'shopping.search:v1')")]
    MalformedSpecId(String),

    #[error("Failed to parse {format} document {origin}: {message}")]
    Parse {
        format: String,
        origin: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CovbaseError {
    pub fn validation(message: impl Into<String>) -> Self {
        CovbaseError::Validation {
            message: message.into(),
        }
    }

    /// Whether the caller can recover by establishing the missing artifact
    pub fn is_not_found(&self) -> bool {
        matches!(self, CovbaseError::NotFound { .. })
    }
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

fn format_violations(violations: &[String]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, CovbaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_available() {
        let err = CovbaseError::NotFound {
            searched: "checkout".to_string(),
            available: vec!["a1b2c3d4".to_string(), "deadbeef".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("checkout"));
        assert!(msg.contains("a1b2c3d4, deadbeef"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_not_found_with_nothing_available() {
        let err = CovbaseError::NotFound {
            searched: "checkout".to_string(),
            available: vec![],
        };
        assert!(err.to_string().contains("available: none"));
    }

    #[test]
    fn test_schema_error_itemizes_every_violation() {
        let err = CovbaseError::Schema {
            origin: "baseline.yaml".to_string(),
            violations: vec![
                "missing field 'useCaseId'".to_string(),
                "execution.samplesPlanned must be > 0".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 violation(s)"));
        assert!(msg.contains("  - missing field 'useCaseId'"));
        assert!(msg.contains("  - execution.samplesPlanned must be > 0"));
        assert!(!err.is_not_found());
    }
}
