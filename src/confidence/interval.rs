// Wilson score intervals and one-sided lower bounds over binomial proportions
//
// The Wilson interval stays inside [0, 1] and behaves at p = 0 and p = 1,
// where the normal approximation collapses to a zero-width interval. That
// matters here: LLM-backed services are routinely observed at 100%.

use crate::confidence::config::ConfidenceConfig;
use serde::{Deserialize, Serialize};

/// Two-sided interval around an observed proportion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WilsonInterval {
    pub lower: f64,
    pub upper: f64,
    pub confidence: f64,
}

impl WilsonInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, rate: f64) -> bool {
        rate >= self.lower && rate <= self.upper
    }
}

/// Inverse of the standard normal CDF
///
/// Acklam's rational approximation; relative error below 1.2e-9 over (0, 1).
/// Returns ±infinity at the endpoints.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Wilson bounds for proportion `p` over `n` trials at critical value `z`
fn wilson_bounds(p: f64, n: f64, z: f64) -> (f64, f64) {
    let z2 = z * z;
    let denominator = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denominator;
    let spread = (z / denominator) * ((p * (1.0 - p) / n) + (z2 / (4.0 * n * n))).sqrt();
    ((center - spread).max(0.0), (center + spread).min(1.0))
}

/// Two-sided Wilson score interval for `successes` out of `trials`
///
/// Zero trials carry no information and yield `[0, 1]`.
pub fn wilson_interval(successes: u64, trials: u64, confidence: f64) -> WilsonInterval {
    if trials == 0 {
        return WilsonInterval {
            lower: 0.0,
            upper: 1.0,
            confidence,
        };
    }
    let n = trials as f64;
    let p = successes.min(trials) as f64 / n;
    let z = normal_quantile(1.0 - (1.0 - confidence) / 2.0);
    let (lower, upper) = wilson_bounds(p, n, z);
    WilsonInterval {
        lower,
        upper,
        confidence,
    }
}

/// One-sided Wilson lower bound for proportion `rate` observed over `trials`
pub fn wilson_lower_bound(rate: f64, trials: u64, confidence: f64) -> f64 {
    if trials == 0 {
        return 0.0;
    }
    let z = normal_quantile(confidence);
    wilson_bounds(rate.clamp(0.0, 1.0), trials as f64, z).0
}

/// Lower bound after a flawless run: n / (n + z²)
pub fn perfect_run_lower_bound(samples: u64, confidence: f64) -> f64 {
    if samples == 0 {
        return 0.0;
    }
    let z = normal_quantile(confidence);
    let n = samples as f64;
    n / (n + z * z)
}

/// Whether even a flawless run of `samples` cannot support `target`
///
/// # Example
/// ```
/// use covbase::confidence::{is_undersized, ConfidenceConfig};
///
/// let config = ConfidenceConfig::default();
/// assert!(is_undersized(200, 0.9999, &config));
/// assert!(!is_undersized(100_000, 0.9999, &config));
/// ```
pub fn is_undersized(samples: u64, target: f64, config: &ConfidenceConfig) -> bool {
    perfect_run_lower_bound(samples, config.compliance_confidence) < target
}

/// Smallest sample count whose flawless run supports `target`
///
/// `None` when the target is 1.0 or above, which no finite sample can justify.
pub fn required_samples_for_compliance(target: f64, config: &ConfidenceConfig) -> Option<u64> {
    if target >= 1.0 || target.is_nan() {
        return None;
    }
    if target <= 0.0 {
        return Some(1);
    }
    let z = normal_quantile(config.compliance_confidence);
    let estimate = (target * z * z / (1.0 - target)).ceil().max(1.0);
    if !estimate.is_finite() || estimate > u64::MAX as f64 {
        return None;
    }

    // Settle float rounding at the boundary against the exact gate
    let mut n = estimate as u64;
    while is_undersized(n, target, config) {
        n += 1;
    }
    while n > 1 && !is_undersized(n - 1, target, config) {
        n -= 1;
    }
    Some(n)
}
