//! Interval accumulator
//!
//! Splits a continuous span of simulated time into the 48 half-hour buckets
//! of a day, weighting each bucket by its overlap with the span. Queue-length
//! means, agent status times and per-caller-type agent times are all booked
//! through here.
//!
//! Bucket `j` covers exactly `[j * 1_800_000, (j + 1) * 1_800_000)`, so the
//! shares of a span inside one day always sum to the span length.

use serde::{Deserialize, Serialize};

use super::time::{DAY_MS, INTERVAL_COUNT, INTERVAL_MS};

/// Per-interval values of one day (48 half-hour buckets).
///
/// Serializes as a plain array of 48 numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalDistribution {
    values: Vec<f64>,
}

impl Default for IntervalDistribution {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalDistribution {
    /// All-zero distribution.
    pub fn new() -> Self {
        Self {
            values: vec![0.0; INTERVAL_COUNT],
        }
    }

    /// Distribution with every bucket set to `value`.
    pub fn filled(value: f64) -> Self {
        Self {
            values: vec![value; INTERVAL_COUNT],
        }
    }

    /// Builds a distribution from exactly 48 values.
    ///
    /// Returns `None` if `values` does not have 48 entries.
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        if values.len() != INTERVAL_COUNT {
            return None;
        }
        Some(Self { values })
    }

    pub fn get(&self, interval: usize) -> f64 {
        self.values[interval]
    }

    pub fn add(&mut self, interval: usize, value: f64) {
        self.values[interval] += value;
    }

    /// Increments one bucket by 1.
    pub fn increment(&mut self, interval: usize) {
        self.values[interval] += 1.0;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Adds `other` bucket by bucket.
    pub fn merge(&mut self, other: &IntervalDistribution) {
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a += *b;
        }
    }

    /// Divides every bucket by `divisor`.
    pub fn divide(&mut self, divisor: f64) {
        for v in self.values.iter_mut() {
            *v /= divisor;
        }
    }
}

/// Reusable scratch buffer for [`interval_parts_without_div`].
///
/// One instance lives in each replica's run state so bookkeeping a status
/// change never allocates.
#[derive(Debug, Clone)]
pub struct IntervalScratch {
    parts: [f64; INTERVAL_COUNT],
}

impl Default for IntervalScratch {
    fn default() -> Self {
        Self {
            parts: [0.0; INTERVAL_COUNT],
        }
    }
}

impl IntervalScratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(&self, interval: usize) -> f64 {
        self.parts[interval]
    }
}

fn clip_span(from: i64, to: i64) -> Option<(i64, i64)> {
    let from = from.clamp(0, DAY_MS);
    let to = to.clamp(0, DAY_MS);
    if to <= from {
        None
    } else {
        Some((from, to))
    }
}

fn bucket_range(from: i64, to: i64) -> (usize, usize) {
    let first = (from / INTERVAL_MS) as usize;
    let last = (((to - 1) / INTERVAL_MS) as usize).min(INTERVAL_COUNT - 1);
    (first, last)
}

fn overlap(bucket: usize, from: i64, to: i64) -> i64 {
    let start = bucket as i64 * INTERVAL_MS;
    let end = start + INTERVAL_MS;
    (to.min(end) - from.max(start)).max(0)
}

/// Adds `multiplier × overlap / 1_800_000` into every bucket overlapped by
/// `[from, to)`.
///
/// Spans are clipped to the day; an empty span is a no-op.
///
/// # Example
/// ```
/// use callcenter_simulator_core_rs::core::interval::{add_interval_parts, IntervalDistribution};
///
/// let mut dist = IntervalDistribution::new();
/// // 45 minutes at queue length 2, starting at 00:15
/// add_interval_parts(&mut dist, 900_000, 3_600_000, 2.0);
/// assert!((dist.get(0) - 1.0).abs() < 1e-12);
/// assert!((dist.get(1) - 2.0).abs() < 1e-12);
/// ```
pub fn add_interval_parts(dist: &mut IntervalDistribution, from: i64, to: i64, multiplier: f64) {
    let Some((from, to)) = clip_span(from, to) else {
        return;
    };
    let (first, last) = bucket_range(from, to);
    let factor = multiplier / INTERVAL_MS as f64;
    for bucket in first..=last {
        let ms = overlap(bucket, from, to);
        if ms > 0 {
            dist.add(bucket, ms as f64 * factor);
        }
    }
}

/// Overwrites `scratch` with the raw overlap in milliseconds of `[from, to)`
/// with each bucket and returns the inclusive bucket range touched.
///
/// Buckets outside the returned range keep stale values and must not be read.
/// Returns `None` for an empty span.
pub fn interval_parts_without_div(
    scratch: &mut IntervalScratch,
    from: i64,
    to: i64,
) -> Option<(usize, usize)> {
    let (from, to) = clip_span(from, to)?;
    let (first, last) = bucket_range(from, to);
    for bucket in first..=last {
        scratch.parts[bucket] = overlap(bucket, from, to) as f64;
    }
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_length_span_is_noop() {
        let mut dist = IntervalDistribution::new();
        add_interval_parts(&mut dist, 5_000, 5_000, 3.0);
        assert_eq!(dist.sum(), 0.0);

        let mut scratch = IntervalScratch::new();
        assert!(interval_parts_without_div(&mut scratch, 7, 7).is_none());
    }

    #[test]
    fn test_span_inside_single_bucket() {
        let mut scratch = IntervalScratch::new();
        let range = interval_parts_without_div(&mut scratch, 1_000, 61_000);
        assert_eq!(range, Some((0, 0)));
        assert_eq!(scratch.part(0), 60_000.0);
    }

    #[test]
    fn test_span_crossing_boundaries() {
        let mut scratch = IntervalScratch::new();
        let (first, last) =
            interval_parts_without_div(&mut scratch, 1_700_000, 3_700_000).unwrap();
        assert_eq!((first, last), (0, 2));
        assert_eq!(scratch.part(0), 100_000.0);
        assert_eq!(scratch.part(1), 1_800_000.0);
        assert_eq!(scratch.part(2), 100_000.0);
    }

    #[test]
    fn test_span_clipped_to_day() {
        let mut dist = IntervalDistribution::new();
        add_interval_parts(&mut dist, DAY_MS - 900_000, DAY_MS + 5_000_000, 1.0);
        assert!((dist.get(47) - 0.5).abs() < 1e-12);
        assert!((dist.sum() - 0.5).abs() < 1e-12);

        add_interval_parts(&mut dist, -10_000, 0, 1.0);
        assert!((dist.sum() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_distribution_from_values_requires_48() {
        assert!(IntervalDistribution::from_values(vec![1.0; 47]).is_none());
        assert!(IntervalDistribution::from_values(vec![1.0; 48]).is_some());
    }

    #[test]
    fn test_merge_and_divide() {
        let mut a = IntervalDistribution::filled(2.0);
        let b = IntervalDistribution::filled(1.0);
        a.merge(&b);
        a.divide(3.0);
        assert!(a.values().iter().all(|v| (*v - 1.0).abs() < 1e-12));
    }
}
