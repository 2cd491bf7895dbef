//! Agent statistics
//!
//! One [`AgentStatistics`] exists globally, per callcenter and per skill
//! level. Status times are booked in milliseconds while the run is going on
//! and converted to seconds once by [`AgentStatistics::convert_to_seconds`].

use serde::{Deserialize, Serialize};

use crate::core::interval::{IntervalDistribution, IntervalScratch};

/// Agent status times that are accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentTime {
    Idle,
    Technical,
    Service,
    PostProcessing,
}

/// Agent times spent on one caller type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCallerStatistics {
    pub caller_type: String,
    pub technical: i64,
    pub technical_by_interval: IntervalDistribution,
    pub service: i64,
    pub service_by_interval: IntervalDistribution,
    pub post_processing: i64,
    pub post_processing_by_interval: IntervalDistribution,
    pub calls: u64,
    pub calls_by_interval: IntervalDistribution,
}

impl AgentCallerStatistics {
    fn new(caller_type: &str) -> Self {
        Self {
            caller_type: caller_type.to_string(),
            technical: 0,
            technical_by_interval: IntervalDistribution::new(),
            service: 0,
            service_by_interval: IntervalDistribution::new(),
            post_processing: 0,
            post_processing_by_interval: IntervalDistribution::new(),
            calls: 0,
            calls_by_interval: IntervalDistribution::new(),
        }
    }
}

/// Per-day totals of one agent, added to its statistics groups at day end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentDayTotals {
    pub idle: i64,
    pub technical: i64,
    pub service: i64,
    pub post_processing: i64,
    pub calls: u64,
    pub technical_by_caller: Vec<i64>,
    pub service_by_caller: Vec<i64>,
    pub post_processing_by_caller: Vec<i64>,
}

impl AgentDayTotals {
    pub fn new(caller_types: usize) -> Self {
        Self {
            technical_by_caller: vec![0; caller_types],
            service_by_caller: vec![0; caller_types],
            post_processing_by_caller: vec![0; caller_types],
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        self.idle = 0;
        self.technical = 0;
        self.service = 0;
        self.post_processing = 0;
        self.calls = 0;
        self.technical_by_caller.iter_mut().for_each(|v| *v = 0);
        self.service_by_caller.iter_mut().for_each(|v| *v = 0);
        self.post_processing_by_caller.iter_mut().for_each(|v| *v = 0);
    }

    pub fn present(&self) -> i64 {
        self.idle + self.technical + self.service + self.post_processing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatistics {
    /// Callcenter or skill level name; empty for the global record
    pub name: String,
    pub agent_count: u32,

    pub idle: i64,
    pub technical: i64,
    pub service: i64,
    pub post_processing: i64,
    pub calls: u64,

    pub idle_by_interval: IntervalDistribution,
    pub technical_by_interval: IntervalDistribution,
    pub service_by_interval: IntervalDistribution,
    pub post_processing_by_interval: IntervalDistribution,
    pub calls_by_interval: IntervalDistribution,

    pub by_caller: Vec<AgentCallerStatistics>,

    pub cost_office_time: f64,
    pub cost_calls: f64,
    pub cost_process_time: f64,
}

fn add_parts(dist: &mut IntervalDistribution, scratch: &IntervalScratch, range: (usize, usize)) {
    for i in range.0..=range.1 {
        let part = scratch.part(i);
        if part != 0.0 {
            dist.add(i, part);
        }
    }
}

impl AgentStatistics {
    pub fn new(name: impl Into<String>, caller_types: &[String]) -> Self {
        Self {
            name: name.into(),
            agent_count: 0,
            idle: 0,
            technical: 0,
            service: 0,
            post_processing: 0,
            calls: 0,
            idle_by_interval: IntervalDistribution::new(),
            technical_by_interval: IntervalDistribution::new(),
            service_by_interval: IntervalDistribution::new(),
            post_processing_by_interval: IntervalDistribution::new(),
            calls_by_interval: IntervalDistribution::new(),
            by_caller: caller_types
                .iter()
                .map(|name| AgentCallerStatistics::new(name))
                .collect(),
            cost_office_time: 0.0,
            cost_calls: 0.0,
            cost_process_time: 0.0,
        }
    }

    /// Books interval parts (ms) computed into `scratch` for the given
    /// status. Busy statuses also book into the caller type's distribution.
    pub fn add_time_parts(
        &mut self,
        time: AgentTime,
        caller_type: Option<usize>,
        scratch: &IntervalScratch,
        range: (usize, usize),
    ) {
        let by_caller = caller_type.and_then(|i| self.by_caller.get_mut(i));
        match time {
            AgentTime::Idle => add_parts(&mut self.idle_by_interval, scratch, range),
            AgentTime::Technical => {
                add_parts(&mut self.technical_by_interval, scratch, range);
                if let Some(c) = by_caller {
                    add_parts(&mut c.technical_by_interval, scratch, range);
                }
            }
            AgentTime::Service => {
                add_parts(&mut self.service_by_interval, scratch, range);
                if let Some(c) = by_caller {
                    add_parts(&mut c.service_by_interval, scratch, range);
                }
            }
            AgentTime::PostProcessing => {
                add_parts(&mut self.post_processing_by_interval, scratch, range);
                if let Some(c) = by_caller {
                    add_parts(&mut c.post_processing_by_interval, scratch, range);
                }
            }
        }
    }

    /// Counts a finished conversation.
    pub fn count_call(&mut self, caller_type: usize, interval: usize, cost_per_call: f64) {
        self.calls_by_interval.increment(interval);
        if let Some(c) = self.by_caller.get_mut(caller_type) {
            c.calls += 1;
            c.calls_by_interval.increment(interval);
        }
        if cost_per_call > 0.0 {
            self.cost_calls += cost_per_call;
        }
    }

    /// Adds the totals of one agent day.
    pub fn add_day(&mut self, day: &AgentDayTotals) {
        self.idle += day.idle;
        self.technical += day.technical;
        self.service += day.service;
        self.post_processing += day.post_processing;
        self.calls += day.calls;
        for (i, c) in self.by_caller.iter_mut().enumerate() {
            c.technical += day.technical_by_caller[i];
            c.service += day.service_by_caller[i];
            c.post_processing += day.post_processing_by_caller[i];
        }
    }

    pub fn add_costs(&mut self, office_time: f64, process_time: f64) {
        self.cost_office_time += office_time;
        self.cost_process_time += process_time;
    }

    /// Total present time (idle plus busy).
    pub fn present(&self) -> i64 {
        self.idle + self.technical + self.service + self.post_processing
    }

    /// Share of present time not spent idle.
    pub fn workload(&self) -> f64 {
        1.0 - self.idle as f64 / self.present().max(1) as f64
    }

    /// Converts all times from milliseconds to seconds. Totals use integer
    /// division.
    pub fn convert_to_seconds(&mut self) {
        self.idle /= 1000;
        self.technical /= 1000;
        self.service /= 1000;
        self.post_processing /= 1000;
        self.idle_by_interval.divide(1000.0);
        self.technical_by_interval.divide(1000.0);
        self.service_by_interval.divide(1000.0);
        self.post_processing_by_interval.divide(1000.0);
        for c in self.by_caller.iter_mut() {
            c.technical /= 1000;
            c.service /= 1000;
            c.post_processing /= 1000;
            c.technical_by_interval.divide(1000.0);
            c.service_by_interval.divide(1000.0);
            c.post_processing_by_interval.divide(1000.0);
        }
    }

    pub fn merge(&mut self, other: &AgentStatistics) {
        // Every replica creates the same agents
        self.agent_count = self.agent_count.max(other.agent_count);
        self.idle += other.idle;
        self.technical += other.technical;
        self.service += other.service;
        self.post_processing += other.post_processing;
        self.calls += other.calls;
        self.idle_by_interval.merge(&other.idle_by_interval);
        self.technical_by_interval.merge(&other.technical_by_interval);
        self.service_by_interval.merge(&other.service_by_interval);
        self.post_processing_by_interval
            .merge(&other.post_processing_by_interval);
        self.calls_by_interval.merge(&other.calls_by_interval);
        for (a, b) in self.by_caller.iter_mut().zip(other.by_caller.iter()) {
            a.technical += b.technical;
            a.technical_by_interval.merge(&b.technical_by_interval);
            a.service += b.service;
            a.service_by_interval.merge(&b.service_by_interval);
            a.post_processing += b.post_processing;
            a.post_processing_by_interval
                .merge(&b.post_processing_by_interval);
            a.calls += b.calls;
            a.calls_by_interval.merge(&b.calls_by_interval);
        }
        self.cost_office_time += other.cost_office_time;
        self.cost_calls += other.cost_calls;
        self.cost_process_time += other.cost_process_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interval::interval_parts_without_div;

    fn names() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    #[test]
    fn test_time_parts_book_caller_distribution() {
        let mut stats = AgentStatistics::new("", &names());
        let mut scratch = IntervalScratch::new();
        let range = interval_parts_without_div(&mut scratch, 1_700_000, 1_900_000).unwrap();
        stats.add_time_parts(AgentTime::Service, Some(1), &scratch, range);
        assert_eq!(stats.service_by_interval.get(0), 100_000.0);
        assert_eq!(stats.service_by_interval.get(1), 100_000.0);
        assert_eq!(stats.by_caller[1].service_by_interval.sum(), 200_000.0);
        assert_eq!(stats.by_caller[0].service_by_interval.sum(), 0.0);
    }

    #[test]
    fn test_convert_to_seconds_truncates_totals() {
        let mut stats = AgentStatistics::new("", &names());
        let mut day = AgentDayTotals::new(2);
        day.idle = 1_999;
        day.service = 60_500;
        day.service_by_caller[0] = 60_500;
        stats.add_day(&day);
        stats.convert_to_seconds();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.service, 60);
        assert_eq!(stats.by_caller[0].service, 60);
    }

    #[test]
    fn test_merge_keeps_agent_count() {
        let mut a = AgentStatistics::new("CC", &names());
        a.agent_count = 5;
        a.calls = 3;
        let mut b = a.clone();
        b.calls = 4;
        a.merge(&b);
        assert_eq!(a.agent_count, 5);
        assert_eq!(a.calls, 7);
    }

    #[test]
    fn test_workload() {
        let mut stats = AgentStatistics::new("", &names());
        stats.idle = 30;
        stats.service = 70;
        assert!((stats.workload() - 0.7).abs() < 1e-12);
        let empty = AgentStatistics::new("", &names());
        assert_eq!(empty.workload(), 1.0);
    }
}
