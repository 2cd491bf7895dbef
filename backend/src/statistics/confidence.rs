//! Confidence intervals over per-day samples
//!
//! Each simulated day contributes one sample per metric. Only the sum and the
//! sum of squares are stored, so replicas can be merged by addition.

use serde::{Deserialize, Serialize};

use crate::rng::inverse_standard_normal_cdf;

/// Running sum and sum of squares of per-day samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSums {
    pub sum: f64,
    pub sum2: f64,
}

impl SampleSums {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum2 += value * value;
    }

    pub fn merge(&mut self, other: &SampleSums) {
        self.sum += other.sum;
        self.sum2 += other.sum2;
    }

    /// Interval over `days` samples, see [`confidence_interval`].
    pub fn confidence_interval(&self, days: u64, level: f64) -> Option<ConfidenceInterval> {
        confidence_interval(self.sum, self.sum2, days, level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub half_width: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Two-sided normal confidence interval for the mean of `n` samples.
///
/// `mean = sum / n`, `sd = sqrt(sum2 / n - mean²)` and the half width is
/// `z · sd / sqrt(n)` with `z` the `(1 + level) / 2` quantile of the standard
/// normal distribution.
///
/// Returns `None` for `n == 0` or a level outside `(0, 1)`.
///
/// # Example
/// ```
/// use callcenter_simulator_core_rs::statistics::confidence_interval;
///
/// // Samples 1, 2, 3
/// let ci = confidence_interval(6.0, 14.0, 3, 0.95).unwrap();
/// assert!((ci.mean - 2.0).abs() < 1e-12);
/// assert!(ci.lower < 2.0 && ci.upper > 2.0);
/// ```
pub fn confidence_interval(sum: f64, sum2: f64, n: u64, level: f64) -> Option<ConfidenceInterval> {
    if n == 0 || !(level > 0.0 && level < 1.0) {
        return None;
    }
    let n = n as f64;
    let mean = sum / n;
    let variance = (sum2 / n - mean * mean).max(0.0);
    let z = inverse_standard_normal_cdf((1.0 + level) / 2.0);
    let half_width = z * variance.sqrt() / n.sqrt();
    Some(ConfidenceInterval {
        mean,
        half_width,
        lower: mean - half_width,
        upper: mean + half_width,
    })
}
