//! Replica thread planning
//!
//! The number of replica threads is limited by memory: each replica holds
//! its own copy of all agent and caller records. The tables below give the
//! largest thread count whose records still fit, depending on the memory
//! available and the model size (thousands of agents or of fresh calls per
//! day).

use sysinfo::System;

/// Agent thresholds (whole thousands, inclusive) for 1, 2, 4, 8, 16 and 32 threads.
const AGENT_LIMITS_SMALL: [u64; 6] = [192, 96, 48, 24, 12, 8];
const AGENT_LIMITS_MEDIUM: [u64; 6] = [384, 192, 96, 48, 24, 12];
const AGENT_LIMITS_LARGE: [u64; 6] = [768, 384, 192, 96, 48, 24];

/// Fresh call thresholds (whole thousands, inclusive) for 1, 2, 4, 8, 16 and 32 threads.
const CALL_LIMITS_SMALL: [u64; 6] = [7680, 3840, 1920, 960, 480, 240];
const CALL_LIMITS_LARGE: [u64; 6] = [15360, 7680, 3840, 1920, 960, 480];

const THREADS_BY_STEP: [usize; 6] = [1, 2, 4, 8, 16, 32];
const MAX_THREADS: usize = 64;

fn by_limits(value: u64, limits: &[u64; 6]) -> usize {
    for (limit, threads) in limits.iter().zip(THREADS_BY_STEP.iter()) {
        if value >= *limit {
            return *threads;
        }
    }
    MAX_THREADS
}

/// Thread limit from the number of agents.
pub fn threads_by_agents(memory_mb: u64, kilo_agents: u64) -> usize {
    let limits = if memory_mb < 3600 {
        &AGENT_LIMITS_SMALL
    } else if memory_mb < 5500 {
        &AGENT_LIMITS_MEDIUM
    } else {
        &AGENT_LIMITS_LARGE
    };
    by_limits(kilo_agents, limits)
}

/// Thread limit from the number of fresh calls per day.
pub fn threads_by_calls(memory_mb: u64, kilo_calls: u64) -> usize {
    let limits = if memory_mb < 3600 {
        &CALL_LIMITS_SMALL
    } else {
        &CALL_LIMITS_LARGE
    };
    by_limits(kilo_calls, limits)
}

/// Thread count for a run.
///
/// A run with execution log uses one thread. Otherwise the memory limits
/// apply, capped by `max_threads` and the number of days.
pub fn plan_threads(
    memory_mb: u64,
    agents: usize,
    fresh_calls_per_day: f64,
    days: u64,
    max_threads: usize,
    execution_log: bool,
) -> usize {
    if execution_log {
        return 1;
    }
    let kilo_agents = agents as u64 / 1000;
    let kilo_calls = fresh_calls_per_day.max(0.0) as u64 / 1000;
    let by_memory =
        threads_by_agents(memory_mb, kilo_agents).min(threads_by_calls(memory_mb, kilo_calls));
    by_memory
        .min(max_threads.max(1))
        .min(days.max(1) as usize)
        .max(1)
}

/// Memory available to a new run in MB.
pub fn system_memory_mb() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    system.available_memory() / 1024 / 1024
}

/// Splits `days` over `threads` replicas: `(first global day, day count)`
/// per replica. The first `days % threads` replicas get one extra day.
pub fn partition_days(days: u64, threads: usize) -> Vec<(u64, u64)> {
    let threads = threads.max(1) as u64;
    let base = days / threads;
    let rest = days % threads;
    let mut first = 0;
    (0..threads)
        .map(|i| {
            let count = base + u64::from(rest > i);
            let part = (first, count);
            first += count;
            part
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_models_get_all_threads() {
        assert_eq!(threads_by_agents(2000, 0), 64);
        assert_eq!(threads_by_calls(2000, 10), 64);
    }

    #[test]
    fn test_large_models_get_few_threads() {
        assert_eq!(threads_by_agents(2000, 200), 1);
        assert_eq!(threads_by_agents(2000, 50), 4);
        assert_eq!(threads_by_agents(4000, 50), 8);
        assert_eq!(threads_by_agents(8000, 50), 16);
        assert_eq!(threads_by_calls(2000, 1000), 8);
        assert_eq!(threads_by_calls(8000, 1000), 16);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        assert_eq!(threads_by_agents(2000, 192), 1);
        assert_eq!(threads_by_agents(2000, 191), 2);
        assert_eq!(threads_by_agents(2000, 8), 32);
        assert_eq!(threads_by_agents(2000, 7), 64);
        assert_eq!(threads_by_calls(2000, 240), 32);
        assert_eq!(threads_by_calls(2000, 239), 64);
    }

    #[test]
    fn test_plan_threads_uses_whole_thousands() {
        assert_eq!(plan_threads(2000, 192_000, 0.0, 100, 64, false), 1);
        assert_eq!(plan_threads(2000, 191_999, 0.0, 100, 64, false), 2);
        assert_eq!(plan_threads(2000, 0, 240_000.0, 100, 64, false), 32);
        assert_eq!(plan_threads(2000, 0, 239_999.9, 100, 64, false), 64);
    }

    #[test]
    fn test_plan_threads_caps() {
        assert_eq!(plan_threads(8000, 10, 100.0, 3, 16, false), 3);
        assert_eq!(plan_threads(8000, 10, 100.0, 100, 4, false), 4);
        assert_eq!(plan_threads(8000, 10, 100.0, 100, 4, true), 1);
        assert_eq!(plan_threads(8000, 10, 100.0, 100, 0, false), 1);
    }

    #[test]
    fn test_partition_days() {
        assert_eq!(partition_days(10, 3), vec![(0, 4), (4, 3), (7, 3)]);
        assert_eq!(partition_days(2, 4), vec![(0, 1), (1, 1), (2, 0), (2, 0)]);
        let parts = partition_days(1000, 7);
        assert_eq!(parts.iter().map(|p| p.1).sum::<u64>(), 1000);
    }
}
