// Statistical confidence engine for binomial pass/fail samples
//
// Two jobs:
// - Reporting: two-sided Wilson intervals on observed pass rates, and the
//   baseline-derived minimum pass rate a new run must reach.
// - Gating: a one-sided lower bound deciding whether a sample size can support
//   an externally anchored (SLA/SLO/policy) pass-rate claim at all.
//
// Scientific Foundation:
// Wilson, E. B. (1927). Probable inference, the law of succession, and
//     statistical inference. JASA 22(158). Score interval stays in [0, 1] and
//     is well behaved at observed rates of 0 and 1.
// Acklam, P. J. (2003). An algorithm for computing the inverse normal
//     cumulative distribution function.

mod config;
mod interval;
mod threshold;

pub use config::{ConfidenceConfig, DEFAULT_COMPLIANCE_CONFIDENCE, DEFAULT_CONFIDENCE_LEVEL};
pub use interval::{
    is_undersized, normal_quantile, perfect_run_lower_bound, required_samples_for_compliance,
    wilson_interval, wilson_lower_bound, WilsonInterval,
};
pub use threshold::{derive_threshold, evaluate, DerivedThreshold, Verdict};
