//! Caller statistics
//!
//! One [`CallerStatistics`] exists per caller type plus one global record.
//! Every counter is kept twice: per **client** (a person, counted once no
//! matter how often they retry or are forwarded) and per **call** (every
//! single attempt).
//!
//! Time sums are in whole seconds. The waiting, residence and cancel sums of
//! clients and the residence and cancel sums of calls are rebuilt from their
//! per-interval distributions in [`CallerStatistics::finalize_sums`]; only
//! the call waiting sum is needed (for costs) while the run is going on and
//! is accumulated directly.

use serde::{Deserialize, Serialize};

use super::confidence::SampleSums;
use crate::core::interval::IntervalDistribution;

/// Buckets of the short (one-second) and the long (half-hour) histograms.
pub const HISTOGRAM_BUCKETS: usize = 1800;

/// Seconds per bucket of the long histograms.
pub const LONG_HISTOGRAM_SECONDS: i64 = 1800;

fn histogram() -> Vec<u64> {
    vec![0; HISTOGRAM_BUCKETS]
}

fn add_to_histograms(short: &mut [u64], long: &mut [u64], seconds: i64) {
    let seconds = seconds.max(0);
    let index = (seconds as usize).min(short.len() - 1);
    short[index] += 1;
    let index = ((seconds / LONG_HISTOGRAM_SECONDS) as usize).min(long.len() - 1);
    long[index] += 1;
}

fn merge_histogram(target: &mut [u64], other: &[u64]) {
    for (a, b) in target.iter_mut().zip(other) {
        *a += *b;
    }
}

/// Counters, sums, interval distributions and histograms of one view
/// (clients or calls).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStatistics {
    pub count: u64,
    pub success: u64,
    pub blocked: u64,
    pub cancelled: u64,
    pub carried_over: u64,
    /// Recalls after successful service (client view only)
    pub recalls: u64,
    pub forwarded: u64,
    pub retries: u64,
    pub service_level: u64,

    pub waiting_sum: i64,
    pub waiting_sum2: i64,
    pub residence_sum: i64,
    pub residence_sum2: i64,
    pub cancel_sum: i64,
    pub cancel_sum2: i64,

    pub count_by_interval: IntervalDistribution,
    pub success_by_interval: IntervalDistribution,
    pub blocked_by_interval: IntervalDistribution,
    pub cancelled_by_interval: IntervalDistribution,
    pub recalls_by_interval: IntervalDistribution,
    pub forwarded_by_interval: IntervalDistribution,
    pub retries_by_interval: IntervalDistribution,
    pub service_level_by_interval: IntervalDistribution,
    /// Waiting seconds by interval
    pub waiting_by_interval: IntervalDistribution,
    pub residence_by_interval: IntervalDistribution,
    pub cancel_by_interval: IntervalDistribution,

    /// One-second buckets
    pub waiting_histogram: Vec<u64>,
    pub residence_histogram: Vec<u64>,
    pub cancel_histogram: Vec<u64>,
    /// Half-hour buckets
    pub waiting_histogram_long: Vec<u64>,
    pub residence_histogram_long: Vec<u64>,
    pub cancel_histogram_long: Vec<u64>,
}

impl Default for FlowStatistics {
    fn default() -> Self {
        Self {
            count: 0,
            success: 0,
            blocked: 0,
            cancelled: 0,
            carried_over: 0,
            recalls: 0,
            forwarded: 0,
            retries: 0,
            service_level: 0,
            waiting_sum: 0,
            waiting_sum2: 0,
            residence_sum: 0,
            residence_sum2: 0,
            cancel_sum: 0,
            cancel_sum2: 0,
            count_by_interval: IntervalDistribution::new(),
            success_by_interval: IntervalDistribution::new(),
            blocked_by_interval: IntervalDistribution::new(),
            cancelled_by_interval: IntervalDistribution::new(),
            recalls_by_interval: IntervalDistribution::new(),
            forwarded_by_interval: IntervalDistribution::new(),
            retries_by_interval: IntervalDistribution::new(),
            service_level_by_interval: IntervalDistribution::new(),
            waiting_by_interval: IntervalDistribution::new(),
            residence_by_interval: IntervalDistribution::new(),
            cancel_by_interval: IntervalDistribution::new(),
            waiting_histogram: histogram(),
            residence_histogram: histogram(),
            cancel_histogram: histogram(),
            waiting_histogram_long: histogram(),
            residence_histogram_long: histogram(),
            cancel_histogram_long: histogram(),
        }
    }
}

impl FlowStatistics {
    /// Records a cancellation after `seconds` of waiting.
    fn add_cancel(&mut self, interval: usize, seconds: i64) {
        self.cancelled += 1;
        self.cancelled_by_interval.increment(interval);
        self.cancel_sum2 = self.cancel_sum2.saturating_add(seconds.saturating_mul(seconds));
        self.cancel_by_interval.add(interval, seconds as f64);
        add_to_histograms(
            &mut self.cancel_histogram,
            &mut self.cancel_histogram_long,
            seconds,
        );
    }

    fn merge(&mut self, other: &FlowStatistics) {
        self.count += other.count;
        self.success += other.success;
        self.blocked += other.blocked;
        self.cancelled += other.cancelled;
        self.carried_over += other.carried_over;
        self.recalls += other.recalls;
        self.forwarded += other.forwarded;
        self.retries += other.retries;
        self.service_level += other.service_level;

        self.waiting_sum = self.waiting_sum.saturating_add(other.waiting_sum);
        self.waiting_sum2 = self.waiting_sum2.saturating_add(other.waiting_sum2);
        self.residence_sum = self.residence_sum.saturating_add(other.residence_sum);
        self.residence_sum2 = self.residence_sum2.saturating_add(other.residence_sum2);
        self.cancel_sum = self.cancel_sum.saturating_add(other.cancel_sum);
        self.cancel_sum2 = self.cancel_sum2.saturating_add(other.cancel_sum2);

        self.count_by_interval.merge(&other.count_by_interval);
        self.success_by_interval.merge(&other.success_by_interval);
        self.blocked_by_interval.merge(&other.blocked_by_interval);
        self.cancelled_by_interval.merge(&other.cancelled_by_interval);
        self.recalls_by_interval.merge(&other.recalls_by_interval);
        self.forwarded_by_interval.merge(&other.forwarded_by_interval);
        self.retries_by_interval.merge(&other.retries_by_interval);
        self.service_level_by_interval
            .merge(&other.service_level_by_interval);
        self.waiting_by_interval.merge(&other.waiting_by_interval);
        self.residence_by_interval.merge(&other.residence_by_interval);
        self.cancel_by_interval.merge(&other.cancel_by_interval);

        merge_histogram(&mut self.waiting_histogram, &other.waiting_histogram);
        merge_histogram(&mut self.residence_histogram, &other.residence_histogram);
        merge_histogram(&mut self.cancel_histogram, &other.cancel_histogram);
        merge_histogram(
            &mut self.waiting_histogram_long,
            &other.waiting_histogram_long,
        );
        merge_histogram(
            &mut self.residence_histogram_long,
            &other.residence_histogram_long,
        );
        merge_histogram(&mut self.cancel_histogram_long, &other.cancel_histogram_long);
    }

    /// Successful share of all non-carried-over attempts.
    pub fn success_part(&self) -> f64 {
        let base = self.count.saturating_sub(self.carried_over).max(1);
        self.success as f64 / base as f64
    }

    pub fn mean_waiting_time(&self) -> f64 {
        self.waiting_sum as f64 / self.success.max(1) as f64
    }

    pub fn mean_residence_time(&self) -> f64 {
        self.residence_sum as f64 / self.success.max(1) as f64
    }
}

/// Per-day samples for the confidence intervals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterDayStatistics {
    pub waiting_time: SampleSums,
    pub success_calls: SampleSums,
    pub success_clients: SampleSums,
    pub service_level_calls_success: SampleSums,
    pub service_level_calls_all: SampleSums,
    pub service_level_clients_success: SampleSums,
    pub service_level_clients_all: SampleSums,
}

impl InterDayStatistics {
    fn merge(&mut self, other: &InterDayStatistics) {
        self.waiting_time.merge(&other.waiting_time);
        self.success_calls.merge(&other.success_calls);
        self.success_clients.merge(&other.success_clients);
        self.service_level_calls_success
            .merge(&other.service_level_calls_success);
        self.service_level_calls_all
            .merge(&other.service_level_calls_all);
        self.service_level_clients_success
            .merge(&other.service_level_clients_success);
        self.service_level_clients_all
            .merge(&other.service_level_clients_all);
    }
}

/// Counter values at the end of the previous day of this replica.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct DayMarks {
    calls: u64,
    calls_success: u64,
    clients: u64,
    clients_success: u64,
    calls_waiting_sum: i64,
    calls_service_level: u64,
    clients_service_level: u64,
}

/// Statistics of one caller type (or of all caller types).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerStatistics {
    /// Caller type name; empty for the global record
    pub name: String,
    pub clients: FlowStatistics,
    pub calls: FlowStatistics,
    pub inter_day: InterDayStatistics,

    pub revenue: f64,
    pub cost_waiting: f64,
    pub cost_cancel: f64,

    /// Clients lost (cancelled or blocked without retry) per simulated day
    pub cancelled_by_day: Vec<u64>,
    /// Next-day retry times (ms after midnight) per simulated day
    pub next_day_retries_by_day: Vec<Vec<i64>>,
    /// Waiting time so far (ms) of callers still queued at midnight
    pub next_day_waiting_by_day: Vec<Vec<i64>>,
    /// Remaining tolerance (ms) of those callers
    pub next_day_tolerance_by_day: Vec<Vec<i64>>,

    #[serde(skip)]
    cancelled_this_day: u64,
    #[serde(skip)]
    next_day_retries: Vec<i64>,
    #[serde(skip)]
    next_day_waiting: Vec<i64>,
    #[serde(skip)]
    next_day_tolerance: Vec<i64>,
    #[serde(skip)]
    marks: DayMarks,
}

impl CallerStatistics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clients: FlowStatistics::default(),
            calls: FlowStatistics::default(),
            inter_day: InterDayStatistics::default(),
            revenue: 0.0,
            cost_waiting: 0.0,
            cost_cancel: 0.0,
            cancelled_by_day: Vec::new(),
            next_day_retries_by_day: Vec::new(),
            next_day_waiting_by_day: Vec::new(),
            next_day_tolerance_by_day: Vec::new(),
            cancelled_this_day: 0,
            next_day_retries: Vec::new(),
            next_day_waiting: Vec::new(),
            next_day_tolerance: Vec::new(),
            marks: DayMarks::default(),
        }
    }

    // ------------------------------------------------------------------------
    // Call-side recording (current caller type)
    // ------------------------------------------------------------------------

    /// Counts one call attempt arriving in `interval`.
    pub fn record_call(&mut self, interval: usize, retry_count: u32) {
        self.calls.count += 1;
        self.calls.count_by_interval.increment(interval);
        if retry_count > 0 {
            self.calls.retries += 1;
            self.calls.retries_by_interval.increment(interval);
        }
    }

    pub fn record_call_blocked(&mut self, interval: usize) {
        self.calls.blocked += 1;
        self.calls.blocked_by_interval.increment(interval);
    }

    /// Counts a give-up after `seconds` of waiting, or a carry-over into the
    /// next day.
    pub fn record_call_give_up(&mut self, interval: usize, seconds: i64, end_of_day: bool) {
        if end_of_day {
            self.calls.carried_over += 1;
        } else {
            self.calls.add_cancel(interval, seconds);
        }
    }

    /// Counts a service start after `wait_ms` of waiting and a total stay of
    /// `stay_ms`.
    pub fn record_service_start(
        &mut self,
        interval: usize,
        wait_ms: i64,
        stay_ms: i64,
        service_level_seconds: i64,
    ) {
        let wait = wait_ms / 1000;
        let stay = stay_ms / 1000;
        let calls = &mut self.calls;
        calls.success += 1;
        calls.success_by_interval.increment(interval);
        calls.waiting_sum = calls.waiting_sum.saturating_add(wait);
        calls.waiting_sum2 = calls.waiting_sum2.saturating_add(wait.saturating_mul(wait));
        calls.residence_sum2 = calls.residence_sum2.saturating_add(stay.saturating_mul(stay));
        calls.waiting_by_interval.add(interval, wait_ms as f64 / 1000.0);
        calls
            .residence_by_interval
            .add(interval, stay_ms as f64 / 1000.0);
        add_to_histograms(&mut calls.waiting_histogram, &mut calls.waiting_histogram_long, wait);
        add_to_histograms(
            &mut calls.residence_histogram,
            &mut calls.residence_histogram_long,
            stay,
        );
        if wait <= service_level_seconds {
            calls.service_level += 1;
            calls.service_level_by_interval.increment(interval);
        }
    }

    pub fn record_call_forwarded(&mut self, interval: usize) {
        self.calls.forwarded += 1;
        self.calls.forwarded_by_interval.increment(interval);
    }

    /// Stores the retry time of a caller that will retry on the next day.
    pub fn push_next_day_retry(&mut self, retry_time_ms: i64) {
        self.next_day_retries.push(retry_time_ms);
    }

    /// Stores a caller still queued at midnight.
    pub fn push_next_day_waiting(&mut self, waited_ms: i64, rest_tolerance_ms: i64) {
        self.next_day_waiting.push(waited_ms);
        self.next_day_tolerance.push(rest_tolerance_ms);
    }

    // ------------------------------------------------------------------------
    // Client-side recording (type of the first call)
    // ------------------------------------------------------------------------

    pub fn record_new_client(&mut self, interval: usize) {
        self.clients.count += 1;
        self.clients.count_by_interval.increment(interval);
    }

    /// Counts the first retry of a client.
    pub fn record_client_retry(&mut self, interval: usize) {
        self.clients.retries += 1;
        self.clients.retries_by_interval.increment(interval);
    }

    /// A client blocked without retrying.
    pub fn record_client_blocked(&mut self, interval: usize) {
        self.clients.blocked += 1;
        self.clients.blocked_by_interval.increment(interval);
        self.cancelled_this_day += 1;
    }

    pub fn record_client_carried_over(&mut self) {
        self.clients.carried_over += 1;
    }

    /// A client that gave up for good after `seconds`.
    pub fn record_client_cancelled(&mut self, interval: usize, seconds: i64) {
        self.clients.add_cancel(interval, seconds);
        self.cancelled_this_day += 1;
    }

    /// A client served without further forwarding. Waiting and stay times are
    /// summed over all forwarded legs.
    pub fn record_client_done(
        &mut self,
        interval: usize,
        wait_ms: i64,
        stay_ms: i64,
        service_level_seconds: i64,
    ) {
        let wait = wait_ms / 1000;
        let stay = stay_ms / 1000;
        let clients = &mut self.clients;
        clients.success += 1;
        clients.success_by_interval.increment(interval);
        clients.waiting_sum2 = clients.waiting_sum2.saturating_add(wait.saturating_mul(wait));
        clients.residence_sum2 = clients.residence_sum2.saturating_add(stay.saturating_mul(stay));
        clients
            .waiting_by_interval
            .add(interval, wait_ms as f64 / 1000.0);
        clients
            .residence_by_interval
            .add(interval, stay_ms as f64 / 1000.0);
        add_to_histograms(
            &mut clients.waiting_histogram,
            &mut clients.waiting_histogram_long,
            wait,
        );
        add_to_histograms(
            &mut clients.residence_histogram,
            &mut clients.residence_histogram_long,
            stay,
        );
        if wait <= service_level_seconds {
            clients.service_level += 1;
            clients.service_level_by_interval.increment(interval);
        }
    }

    /// First forwarding of a client.
    pub fn record_client_forwarded(&mut self, interval: usize) {
        self.clients.forwarded += 1;
        self.clients.forwarded_by_interval.increment(interval);
    }

    pub fn record_recall(&mut self, interval: usize) {
        self.clients.recalls += 1;
        self.clients.recalls_by_interval.increment(interval);
    }

    // ------------------------------------------------------------------------
    // Day and run boundaries
    // ------------------------------------------------------------------------

    /// Adds one sample per confidence-interval metric for the day that just
    /// ended and files the per-day carryover lists.
    pub fn update_inter_day_data(&mut self) {
        let m = self.marks;
        let calls = &self.calls;
        let clients = &self.clients;

        let calls_success = calls.success.saturating_sub(m.calls_success);
        let clients_success = clients.success.saturating_sub(m.clients_success);

        let waiting =
            (calls.waiting_sum - m.calls_waiting_sum) as f64 / calls_success.max(1) as f64;
        self.inter_day.waiting_time.add(waiting);

        let calls_base = (calls.count as i64 - calls.carried_over as i64) - m.calls as i64;
        self.inter_day
            .success_calls
            .add(calls_success as f64 / calls_base.max(1) as f64);
        let clients_base =
            (clients.count as i64 - clients.carried_over as i64) - m.clients as i64;
        self.inter_day
            .success_clients
            .add(clients_success as f64 / clients_base.max(1) as f64);

        let calls_sl = calls.service_level.saturating_sub(m.calls_service_level) as f64;
        self.inter_day
            .service_level_calls_success
            .add(calls_sl / calls_success.max(1) as f64);
        let calls_all = (calls.count as i64 - m.calls as i64).max(1);
        self.inter_day
            .service_level_calls_all
            .add(calls_sl / calls_all as f64);

        let clients_sl = clients.service_level.saturating_sub(m.clients_service_level) as f64;
        self.inter_day
            .service_level_clients_success
            .add(clients_sl / clients_success.max(1) as f64);
        let clients_all = (clients.count as i64 - m.clients as i64).max(1);
        self.inter_day
            .service_level_clients_all
            .add(clients_sl / clients_all as f64);

        self.marks = DayMarks {
            calls: calls.count.saturating_sub(calls.carried_over),
            calls_success: calls.success,
            clients: clients.count.saturating_sub(clients.carried_over),
            clients_success: clients.success,
            calls_waiting_sum: calls.waiting_sum,
            calls_service_level: calls.service_level,
            clients_service_level: clients.service_level,
        };

        self.cancelled_by_day.push(self.cancelled_this_day);
        self.cancelled_this_day = 0;
        self.next_day_retries_by_day
            .push(std::mem::take(&mut self.next_day_retries));
        self.next_day_waiting_by_day
            .push(std::mem::take(&mut self.next_day_waiting));
        self.next_day_tolerance_by_day
            .push(std::mem::take(&mut self.next_day_tolerance));
    }

    /// Rebuilds the time sums that are only tracked per interval.
    pub fn finalize_sums(&mut self) {
        self.calls.residence_sum = self.calls.residence_by_interval.sum().round() as i64;
        self.calls.cancel_sum = self.calls.cancel_by_interval.sum().round() as i64;
        self.clients.waiting_sum = self.clients.waiting_by_interval.sum().round() as i64;
        self.clients.residence_sum = self.clients.residence_by_interval.sum().round() as i64;
        self.clients.cancel_sum = self.clients.cancel_by_interval.sum().round() as i64;
    }

    /// Adds `other` into this record. Per-day lists are appended in order.
    pub fn merge(&mut self, other: &CallerStatistics) {
        self.clients.merge(&other.clients);
        self.calls.merge(&other.calls);
        self.inter_day.merge(&other.inter_day);
        self.revenue += other.revenue;
        self.cost_waiting += other.cost_waiting;
        self.cost_cancel += other.cost_cancel;
        self.cancelled_by_day
            .extend_from_slice(&other.cancelled_by_day);
        self.next_day_retries_by_day
            .extend(other.next_day_retries_by_day.iter().cloned());
        self.next_day_waiting_by_day
            .extend(other.next_day_waiting_by_day.iter().cloned());
        self.next_day_tolerance_by_day
            .extend(other.next_day_tolerance_by_day.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_start_books_sums_and_service_level() {
        let mut stats = CallerStatistics::new("A");
        stats.record_service_start(3, 12_500, 72_500, 20);
        stats.record_service_start(3, 30_000, 90_000, 20);
        assert_eq!(stats.calls.success, 2);
        assert_eq!(stats.calls.waiting_sum, 42);
        assert_eq!(stats.calls.waiting_sum2, 12 * 12 + 30 * 30);
        assert_eq!(stats.calls.service_level, 1);
        assert!((stats.calls.waiting_by_interval.get(3) - 42.5).abs() < 1e-9);
        assert_eq!(stats.calls.waiting_histogram[12], 1);
        assert_eq!(stats.calls.waiting_histogram_long[0], 2);
    }

    #[test]
    fn test_squared_sums_saturate() {
        let mut stats = CallerStatistics::new("A");
        stats.record_service_start(0, i64::MAX, i64::MAX, 20);
        stats.record_call_give_up(0, i64::MAX / 1000, false);
        assert_eq!(stats.calls.waiting_sum2, i64::MAX);
        assert_eq!(stats.calls.residence_sum2, i64::MAX);
        assert_eq!(stats.calls.cancel_sum2, i64::MAX);
        let other = stats.clone();
        stats.merge(&other);
        assert_eq!(stats.calls.waiting_sum, 2 * (i64::MAX / 1000));
        assert_eq!(stats.calls.waiting_sum2, i64::MAX);
        assert_eq!(stats.calls.success, 2);
    }

    #[test]
    fn test_histograms_cap_at_last_bucket() {
        let mut stats = CallerStatistics::new("A");
        stats.record_call_give_up(0, 10_000_000, false);
        assert_eq!(stats.calls.cancel_histogram[HISTOGRAM_BUCKETS - 1], 1);
        assert_eq!(stats.calls.cancel_histogram_long[HISTOGRAM_BUCKETS - 1], 1);
    }

    #[test]
    fn test_inter_day_uses_day_differences() {
        let mut stats = CallerStatistics::new("A");
        for _ in 0..4 {
            stats.record_call(0, 0);
            stats.record_new_client(0);
        }
        stats.record_service_start(0, 10_000, 10_000, 20);
        stats.record_service_start(0, 30_000, 30_000, 20);
        stats.update_inter_day_data();

        for _ in 0..2 {
            stats.record_call(0, 0);
            stats.record_new_client(0);
        }
        stats.record_service_start(0, 0, 0, 20);
        stats.record_service_start(0, 0, 0, 20);
        stats.update_inter_day_data();

        // Day 1: 20 s mean wait, 2/4 success; day 2: 0 s, 2/2 success
        assert!((stats.inter_day.waiting_time.sum - 20.0).abs() < 1e-9);
        assert!((stats.inter_day.success_calls.sum - 1.5).abs() < 1e-9);
        assert!((stats.inter_day.success_calls.sum2 - 1.25).abs() < 1e-9);
        assert_eq!(stats.cancelled_by_day, vec![0, 0]);
        assert_eq!(stats.next_day_retries_by_day.len(), 2);
    }

    #[test]
    fn test_finalize_sums_rounds_interval_totals() {
        let mut stats = CallerStatistics::new("A");
        stats.record_client_done(0, 1_400, 2_600, 20);
        stats.record_client_done(1, 1_400, 2_600, 20);
        stats.finalize_sums();
        assert_eq!(stats.clients.waiting_sum, 3);
        assert_eq!(stats.clients.residence_sum, 5);
    }

    #[test]
    fn test_merge_appends_day_lists() {
        let mut a = CallerStatistics::new("A");
        a.record_client_cancelled(0, 5);
        a.update_inter_day_data();
        let mut b = CallerStatistics::new("A");
        b.push_next_day_retry(1_000);
        b.update_inter_day_data();

        a.merge(&b);
        assert_eq!(a.cancelled_by_day, vec![1, 0]);
        assert_eq!(a.next_day_retries_by_day, vec![vec![], vec![1_000]]);
        assert_eq!(a.clients.cancelled, 1);
    }
}
