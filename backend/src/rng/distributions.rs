//! Probability distributions used by the model
//!
//! Durations (waiting-time tolerance, service and post-processing times,
//! retry delays) are configured in seconds. Arrival times over the day use
//! the `Empirical` histogram form.

use serde::{Deserialize, Serialize};

use super::RngManager;

/// A distribution of non-negative values, usually seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    /// Always the same value
    Fixed { value: f64 },

    /// Exponential distribution with the given mean
    Exponential { mean: f64 },

    /// Uniform distribution on `[min, max)`
    Uniform { min: f64, max: f64 },

    /// Normal distribution
    Normal { mean: f64, std_dev: f64 },

    /// Log-normal distribution parameterised by the mean and standard
    /// deviation of the resulting values
    LogNormal { mean: f64, std_dev: f64 },

    /// Piecewise uniform histogram: `weights.len()` equal-width bins on
    /// `[0, upper_bound)`
    Empirical { weights: Vec<f64>, upper_bound: f64 },
}

impl Distribution {
    /// Draws one value. Negative draws are clamped to zero.
    pub fn sample(&self, rng: &mut RngManager) -> f64 {
        let value = match self {
            Distribution::Fixed { value } => *value,
            Distribution::Exponential { mean } => {
                let u = 1.0 - rng.next_f64();
                -u.ln() * mean
            }
            Distribution::Uniform { min, max } => min + (max - min) * rng.next_f64(),
            Distribution::Normal { mean, std_dev } => mean + std_dev * rng.standard_normal(),
            Distribution::LogNormal { mean, std_dev } => {
                if *mean <= 0.0 {
                    return 0.0;
                }
                let sigma2 = (1.0 + (std_dev * std_dev) / (mean * mean)).ln();
                let mu = mean.ln() - sigma2 / 2.0;
                (mu + sigma2.sqrt() * rng.standard_normal()).exp()
            }
            Distribution::Empirical {
                weights,
                upper_bound,
            } => sample_histogram(weights, *upper_bound, rng),
        };
        value.max(0.0)
    }

    /// Expected value (before clamping).
    pub fn mean(&self) -> f64 {
        match self {
            Distribution::Fixed { value } => *value,
            Distribution::Exponential { mean } => *mean,
            Distribution::Uniform { min, max } => (min + max) / 2.0,
            Distribution::Normal { mean, .. } => *mean,
            Distribution::LogNormal { mean, .. } => *mean,
            Distribution::Empirical {
                weights,
                upper_bound,
            } => {
                let total: f64 = weights.iter().sum();
                if total <= 0.0 {
                    return 0.0;
                }
                let width = upper_bound / weights.len() as f64;
                weights
                    .iter()
                    .enumerate()
                    .map(|(i, w)| w * (i as f64 + 0.5) * width)
                    .sum::<f64>()
                    / total
            }
        }
    }

    /// Checks the parameters; the message names the offending parameter.
    pub fn check(&self) -> Result<(), String> {
        let finite = |name: &str, v: f64| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(format!("{} must be finite", name))
            }
        };
        match self {
            Distribution::Fixed { value } => finite("value", *value),
            Distribution::Exponential { mean } => {
                finite("mean", *mean)?;
                if *mean < 0.0 {
                    return Err("exponential mean must not be negative".to_string());
                }
                Ok(())
            }
            Distribution::Uniform { min, max } => {
                finite("min", *min)?;
                finite("max", *max)?;
                if max < min {
                    return Err(format!("uniform max {} is below min {}", max, min));
                }
                Ok(())
            }
            Distribution::Normal { mean, std_dev } | Distribution::LogNormal { mean, std_dev } => {
                finite("mean", *mean)?;
                finite("std_dev", *std_dev)?;
                if *std_dev < 0.0 {
                    return Err("std_dev must not be negative".to_string());
                }
                Ok(())
            }
            Distribution::Empirical {
                weights,
                upper_bound,
            } => {
                if weights.is_empty() {
                    return Err("empirical distribution has no bins".to_string());
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err("empirical weights must be finite and non-negative".to_string());
                }
                if !(upper_bound.is_finite() && *upper_bound > 0.0) {
                    return Err("empirical upper_bound must be positive".to_string());
                }
                Ok(())
            }
        }
    }

    /// True if an empirical histogram has no mass at all.
    pub fn is_empty_histogram(&self) -> bool {
        match self {
            Distribution::Empirical { weights, .. } => weights.iter().sum::<f64>() <= 0.0,
            _ => false,
        }
    }
}

fn sample_histogram(weights: &[f64], upper_bound: f64, rng: &mut RngManager) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || weights.is_empty() {
        return 0.0;
    }
    let width = upper_bound / weights.len() as f64;
    let mut target = rng.next_f64() * total;
    let mut bin = weights.len() - 1;
    for (i, w) in weights.iter().enumerate() {
        if target < *w {
            bin = i;
            break;
        }
        target -= w;
    }
    (bin as f64 + rng.next_f64()) * width
}

/// Quantile function of the standard normal distribution.
///
/// Rational approximation by P. J. Acklam (relative error below 1.2e-9).
/// `p` outside `(0, 1)` yields `±inf`.
///
/// # Example
/// ```
/// use callcenter_simulator_core_rs::rng::inverse_standard_normal_cdf;
///
/// assert!((inverse_standard_normal_cdf(0.975) - 1.959964).abs() < 1e-5);
/// assert!(inverse_standard_normal_cdf(0.5).abs() < 1e-9);
/// ```
pub fn inverse_standard_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}
