use crate::covariate::declaration::REGION_KEY;
use crate::covariate::value::CovariateValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Outcome of comparing a baseline's covariate value to the test's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchResult {
    Conforms,
    DoesNotConform,
}

impl MatchResult {
    pub fn conforms(&self) -> bool {
        matches!(self, MatchResult::Conforms)
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchResult::Conforms => f.write_str("CONFORMS"),
            MatchResult::DoesNotConform => f.write_str("DOES_NOT_CONFORM"),
        }
    }
}

/// Equality semantics applied to canonical values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    CaseInsensitive,
}

impl MatchStrategy {
    pub fn compare(&self, baseline: &CovariateValue, test: &CovariateValue) -> MatchResult {
        let equal = match self {
            MatchStrategy::Exact => baseline.canonical() == test.canonical(),
            MatchStrategy::CaseInsensitive => {
                baseline.canonical().to_lowercase() == test.canonical().to_lowercase()
            }
        };
        if equal {
            MatchResult::Conforms
        } else {
            MatchResult::DoesNotConform
        }
    }
}

/// Registry of per-key matching strategies
///
/// Unregistered keys use exact, case-sensitive matching. `region` is
/// registered case-insensitive by default.
#[derive(Debug, Clone)]
pub struct CovariateMatcherRegistry {
    strategies: HashMap<String, MatchStrategy>,
}

impl Default for CovariateMatcherRegistry {
    fn default() -> Self {
        let mut strategies = HashMap::new();
        strategies.insert(REGION_KEY.to_string(), MatchStrategy::CaseInsensitive);
        Self { strategies }
    }
}

impl CovariateMatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, strategy: MatchStrategy) {
        self.strategies.insert(key.into(), strategy);
    }

    pub fn with(mut self, key: impl Into<String>, strategy: MatchStrategy) -> Self {
        self.register(key, strategy);
        self
    }

    pub fn strategy_for(&self, key: &str) -> MatchStrategy {
        self.strategies
            .get(key)
            .copied()
            .unwrap_or(MatchStrategy::Exact)
    }

    pub fn match_values(
        &self,
        key: &str,
        baseline: &CovariateValue,
        test: &CovariateValue,
    ) -> MatchResult {
        self.strategy_for(key).compare(baseline, test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CovariateValue {
        CovariateValue::Text(s.to_string())
    }

    #[test]
    fn test_default_is_case_sensitive() {
        let registry = CovariateMatcherRegistry::new();
        assert_eq!(
            registry.match_values("llm_model", &text("gpt-x"), &text("gpt-x")),
            MatchResult::Conforms
        );
        assert_eq!(
            registry.match_values("llm_model", &text("GPT-X"), &text("gpt-x")),
            MatchResult::DoesNotConform
        );
    }

    #[test]
    fn test_region_is_case_insensitive() {
        let registry = CovariateMatcherRegistry::new();
        assert_eq!(registry.strategy_for("region"), MatchStrategy::CaseInsensitive);
        assert_eq!(
            registry.match_values("region", &text("DE_FR"), &text("de_fr")),
            MatchResult::Conforms
        );
    }

    #[test]
    fn test_register_overrides() {
        let registry =
            CovariateMatcherRegistry::new().with("timezone", MatchStrategy::CaseInsensitive);
        assert_eq!(
            registry.match_values("timezone", &text("utc"), &text("UTC")),
            MatchResult::Conforms
        );
    }

    #[test]
    fn test_undefined_matches_only_undefined() {
        let registry = CovariateMatcherRegistry::new();
        assert!(registry
            .match_values("region", &CovariateValue::Undefined, &text("UNDEFINED"))
            .conforms());
        assert!(!registry
            .match_values("region", &CovariateValue::Undefined, &text("OTHER"))
            .conforms());
    }

    #[test]
    fn test_display() {
        assert_eq!(MatchResult::Conforms.to_string(), "CONFORMS");
        assert_eq!(MatchResult::DoesNotConform.to_string(), "DOES_NOT_CONFORM");
    }
}
