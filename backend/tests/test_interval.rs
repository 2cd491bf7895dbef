//! Half-hour interval accounting
//!
//! A time span booked into the 48 interval buckets must keep its total
//! length, whatever buckets it touches.

use callcenter_simulator_core_rs::core::interval::{
    add_interval_parts, interval_parts_without_div, IntervalDistribution, IntervalScratch,
};
use callcenter_simulator_core_rs::core::time::{interval_index, DAY_MS, INTERVAL_COUNT, INTERVAL_MS};
use proptest::prelude::*;

#[test]
fn test_span_inside_one_interval() {
    let mut dist = IntervalDistribution::new();
    add_interval_parts(&mut dist, 60_000, 960_000, 1.0);
    assert!((dist.get(0) - 0.5).abs() < 1e-12);
    assert_eq!(dist.values().iter().filter(|v| **v != 0.0).count(), 1);
}

#[test]
fn test_span_on_bucket_boundaries() {
    let mut dist = IntervalDistribution::new();
    // 09:00 to 10:00 covers buckets 18 and 19 fully
    add_interval_parts(&mut dist, 18 * INTERVAL_MS, 20 * INTERVAL_MS, 3.0);
    assert!((dist.get(17)).abs() < 1e-12);
    assert!((dist.get(18) - 3.0).abs() < 1e-12);
    assert!((dist.get(19) - 3.0).abs() < 1e-12);
    assert!((dist.get(20)).abs() < 1e-12);
}

#[test]
fn test_span_is_clipped_to_the_day() {
    let mut dist = IntervalDistribution::new();
    add_interval_parts(&mut dist, DAY_MS - INTERVAL_MS / 2, DAY_MS + 3_600_000, 1.0);
    assert!((dist.sum() - 0.5).abs() < 1e-12);
    assert!((dist.get(INTERVAL_COUNT - 1) - 0.5).abs() < 1e-12);

    let mut dist = IntervalDistribution::new();
    add_interval_parts(&mut dist, -5_000, 0, 1.0);
    assert_eq!(dist.sum(), 0.0);
}

#[test]
fn test_raw_parts_report_touched_range() {
    let mut scratch = IntervalScratch::new();
    let range = interval_parts_without_div(&mut scratch, 1_700_000, 3_700_000).unwrap();
    assert_eq!(range, (0, 2));
    assert_eq!(scratch.part(0), 100_000.0);
    assert_eq!(scratch.part(1), 1_800_000.0);
    assert_eq!(scratch.part(2), 100_000.0);
}

#[test]
fn test_interval_index_boundaries() {
    assert_eq!(interval_index(INTERVAL_MS - 1), 0);
    assert_eq!(interval_index(INTERVAL_MS), 1);
    assert_eq!(interval_index(DAY_MS - 1), INTERVAL_COUNT - 1);
    assert_eq!(interval_index(DAY_MS + 1_000), INTERVAL_COUNT - 1);
}

#[test]
fn test_from_values_needs_48_entries() {
    assert!(IntervalDistribution::from_values(vec![1.0; 47]).is_none());
    let dist = IntervalDistribution::from_values(vec![1.0; 48]).unwrap();
    assert_eq!(dist.sum(), 48.0);
}

proptest! {
    #[test]
    fn prop_booked_parts_sum_to_span(from in 0i64..DAY_MS, len in 0i64..DAY_MS, multiplier in 0.1f64..10.0) {
        let to = (from + len).min(DAY_MS);
        let mut dist = IntervalDistribution::new();
        add_interval_parts(&mut dist, from, to, multiplier);
        let expected = (to - from) as f64 / INTERVAL_MS as f64 * multiplier;
        prop_assert!((dist.sum() - expected).abs() < 1e-6);
    }

    #[test]
    fn prop_raw_parts_sum_to_span(from in 0i64..DAY_MS, len in 1i64..DAY_MS) {
        let to = (from + len).min(DAY_MS);
        prop_assume!(to > from);
        let mut scratch = IntervalScratch::new();
        let (first, last) = interval_parts_without_div(&mut scratch, from, to).unwrap();
        prop_assert_eq!(first, interval_index(from));
        prop_assert_eq!(last, interval_index(to - 1));
        let total: f64 = (first..=last).map(|i| scratch.part(i)).sum();
        prop_assert_eq!(total as i64, to - from);
    }

    #[test]
    fn prop_adjacent_spans_add_up(from in 0i64..DAY_MS / 2, a in 0i64..DAY_MS / 4, b in 0i64..DAY_MS / 4) {
        let mut split = IntervalDistribution::new();
        add_interval_parts(&mut split, from, from + a, 1.0);
        add_interval_parts(&mut split, from + a, from + a + b, 1.0);
        let mut whole = IntervalDistribution::new();
        add_interval_parts(&mut whole, from, from + a + b, 1.0);
        for i in 0..INTERVAL_COUNT {
            prop_assert!((split.get(i) - whole.get(i)).abs() < 1e-9);
        }
    }
}
