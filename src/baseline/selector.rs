// Baseline selection: score candidates by covariate conformance, rank them,
// and flag when the winner cannot be told apart from a runner-up.
//
// Ranking order: conforming-key count (desc), then generation time (desc).
// Ambiguous when the declaration is empty, or when the top two candidates
// tie on both score and generation time. A candidate is always chosen when
// any exist.

use crate::baseline::repository::BaselineCandidate;
use crate::covariate::{
    CovariateDeclaration, CovariateMatcherRegistry, CovariateProfile, CovariateValue, MatchResult,
};
use serde::Serialize;

/// Comparison of one covariate between the selected baseline and the test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConformanceDetail {
    pub key: String,
    pub baseline_value: CovariateValue,
    pub test_value: CovariateValue,
    pub result: MatchResult,
}

impl ConformanceDetail {
    pub fn conforms(&self) -> bool {
        self.result.conforms()
    }
}

/// Outcome of a selection call; borrows the chosen candidate
#[derive(Debug, Clone)]
pub struct SelectionResult<'a> {
    pub selected: Option<&'a BaselineCandidate>,
    pub ambiguous: bool,
    /// Every compared key for the selected candidate, in declaration order
    pub conformance: Vec<ConformanceDetail>,
    /// The DOES_NOT_CONFORM subset of `conformance`
    pub non_conforming: Vec<ConformanceDetail>,
    pub score: usize,
    pub candidates_considered: usize,
}

impl<'a> SelectionResult<'a> {
    fn none() -> Self {
        Self {
            selected: None,
            ambiguous: false,
            conformance: Vec::new(),
            non_conforming: Vec::new(),
            score: 0,
            candidates_considered: 0,
        }
    }

    pub fn has_selection(&self) -> bool {
        self.selected.is_some()
    }

    pub fn has_non_conformance(&self) -> bool {
        !self.non_conforming.is_empty()
    }

    /// Non-conforming keys whose category invalidates the baseline outright
    pub fn hard_gate_violations(&self, declaration: &CovariateDeclaration) -> Vec<&ConformanceDetail> {
        self.non_conforming
            .iter()
            .filter(|d| {
                declaration
                    .category(&d.key)
                    .is_some_and(|c| c.is_hard_gate())
            })
            .collect()
    }

    /// Caller-facing warning lines: ambiguity first, then each soft mismatch
    pub fn warnings(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.ambiguous {
            if let Some(selected) = self.selected {
                lines.push(format!(
                    "Ambiguous baseline selection among {} candidates; using {}",
                    self.candidates_considered,
                    selected.filename()
                ));
            }
        }
        for detail in &self.non_conforming {
            lines.push(format!(
                "Covariate '{}' does not conform: baseline={}, test={}",
                detail.key, detail.baseline_value, detail.test_value
            ));
        }
        lines
    }
}

struct Scored<'a> {
    candidate: &'a BaselineCandidate,
    score: usize,
    details: Vec<ConformanceDetail>,
}

/// Picks the best-matching baseline for a test profile
#[derive(Debug, Clone, Default)]
pub struct BaselineSelector {
    matchers: CovariateMatcherRegistry,
}

impl BaselineSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matchers(matchers: CovariateMatcherRegistry) -> Self {
        Self { matchers }
    }

    pub fn matchers(&self) -> &CovariateMatcherRegistry {
        &self.matchers
    }

    /// Compare one candidate's profile against the test's on the declared keys
    pub fn conformance(
        &self,
        baseline: &CovariateProfile,
        test: &CovariateProfile,
        declaration: &CovariateDeclaration,
    ) -> Vec<ConformanceDetail> {
        declaration
            .active_keys()
            .into_iter()
            .filter_map(|key| {
                let baseline_value = baseline.get(&key)?;
                let test_value = test.get(&key)?;
                let result = self.matchers.match_values(&key, baseline_value, test_value);
                Some(ConformanceDetail {
                    key,
                    baseline_value: baseline_value.clone(),
                    test_value: test_value.clone(),
                    result,
                })
            })
            .collect()
    }

    pub fn select<'a>(
        &self,
        candidates: &'a [BaselineCandidate],
        test_profile: &CovariateProfile,
        declaration: &CovariateDeclaration,
    ) -> SelectionResult<'a> {
        if candidates.is_empty() {
            return SelectionResult::none();
        }

        let mut scored: Vec<Scored<'a>> = candidates
            .iter()
            .map(|candidate| {
                let details = if declaration.is_empty() {
                    Vec::new()
                } else {
                    self.conformance(candidate.profile(), test_profile, declaration)
                };
                let score = details.iter().filter(|d| d.conforms()).count();
                Scored {
                    candidate,
                    score,
                    details,
                }
            })
            .collect();

        // Stable: full ties keep scan order
        scored.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.candidate.generated_at().cmp(&a.candidate.generated_at()))
        });

        let ambiguous = declaration.is_empty()
            || scored.get(1).is_some_and(|runner_up| {
                runner_up.score == scored[0].score
                    && runner_up.candidate.generated_at() == scored[0].candidate.generated_at()
            });

        let considered = scored.len();
        let best = scored.swap_remove(0);
        if ambiguous {
            tracing::warn!(
                "Ambiguous baseline selection for {} candidates; choosing {}",
                considered,
                best.candidate.filename()
            );
        } else {
            tracing::debug!(
                "Selected baseline {} with score {} of {} candidates",
                best.candidate.filename(),
                best.score,
                considered
            );
        }

        let non_conforming = best
            .details
            .iter()
            .filter(|d| !d.conforms())
            .cloned()
            .collect();
        SelectionResult {
            selected: Some(best.candidate),
            ambiguous,
            conformance: best.details,
            non_conforming,
            score: best.score,
            candidates_considered: considered,
        }
    }
}
