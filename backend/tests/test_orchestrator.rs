//! Run orchestration
//!
//! Thread planning, lifecycle errors, memoized collection and result
//! independence from the thread count.

use callcenter_simulator_core_rs::config::CallcenterModel;
use callcenter_simulator_core_rs::orchestrator::{SimulationError, Simulator, SimulatorOptions};
use callcenter_simulator_core_rs::ModelError;
use serde_json::json;

fn model(days: u32) -> CallcenterModel {
    serde_json::from_value(json!({
        "name": "Orchestrator",
        "days": days,
        "seed": 99,
        "caller_types": [{
            "name": "Hotline",
            "fresh_calls_mean": 150,
            "fresh_calls_std_dev": 10,
            "arrival_distribution": {"type": "uniform", "min": 28800, "max": 64800},
            "waiting_time_tolerance": {"type": "exponential", "mean": 200},
            "retry": {"probability_after_give_up_first": 0.4}
        }],
        "callcenters": [{
            "name": "CC",
            "technical_free_time": 2,
            "agent_groups": [{"count": 5, "working_time_start": 28800, "working_time_end": 64800, "skill_level": "S"}]
        }],
        "skill_levels": [{
            "name": "S",
            "entries": [{"caller_type": "Hotline", "working_time": {"type": "exponential", "mean": 150}, "post_processing_time": {"type": "fixed", "value": 15}}]
        }]
    }))
    .unwrap()
}

fn options(threads: usize) -> SimulatorOptions {
    SimulatorOptions {
        max_threads: threads,
        memory_mb: Some(8000),
        ..SimulatorOptions::default()
    }
}

fn run(days: u32, threads: usize) -> Simulator {
    let mut simulator = Simulator::new(model(days), options(threads)).unwrap();
    simulator.start().unwrap();
    simulator.finalize_run().unwrap();
    simulator
}

#[test]
fn test_thread_count_is_capped() {
    let simulator = Simulator::new(model(2), options(8)).unwrap();
    assert_eq!(simulator.thread_count(), 2);
    let simulator = Simulator::new(model(10), options(3)).unwrap();
    assert_eq!(simulator.thread_count(), 3);
    let simulator = Simulator::new(
        model(10),
        SimulatorOptions {
            execution_log: true,
            ..options(4)
        },
    )
    .unwrap();
    assert_eq!(simulator.thread_count(), 1);
}

#[test]
fn test_thread_count_does_not_change_results() {
    let mut one = run(6, 1);
    let mut three = run(6, 3);
    assert_eq!(three.thread_count(), 3);
    let a = one.collect_statistic().unwrap().clone();
    let b = three.collect_statistic().unwrap();

    assert_eq!(a.sim_days, 6);
    assert_eq!(b.sim_days, 6);
    assert_eq!(a.metadata.events, b.metadata.events);
    let (x, y) = (&a.callers[0], &b.callers[0]);
    assert_eq!(x.calls.count, y.calls.count);
    assert_eq!(x.calls.success, y.calls.success);
    assert_eq!(x.calls.cancelled, y.calls.cancelled);
    assert_eq!(x.calls.retries, y.calls.retries);
    assert_eq!(x.calls.waiting_sum, y.calls.waiting_sum);
    assert_eq!(x.clients.count, y.clients.count);
    assert_eq!(x.cancelled_by_day, y.cancelled_by_day);
    assert_eq!(a.agents_global.present(), b.agents_global.present());
    assert_eq!(a.agents_global.calls, b.agents_global.calls);
    assert_eq!(a.max_queue_length, b.max_queue_length);
}

#[test]
fn test_collect_statistic_is_memoized() {
    let mut simulator = run(2, 2);
    let first = simulator.collect_statistic().unwrap().metadata.run_id.clone();
    let second = simulator.collect_statistic().unwrap().metadata.run_id.clone();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_metadata_is_stamped() {
    let mut simulator = run(2, 2);
    let stats = simulator.collect_statistic().unwrap();
    assert_eq!(stats.metadata.model_name, "Orchestrator");
    assert_eq!(stats.metadata.threads, 2);
    assert!(!stats.metadata.os.is_empty());
    assert!(!stats.metadata.date.is_empty());
    assert!(!stats.metadata.model_fingerprint.is_empty());
    assert!(stats.finalized);
}

#[test]
fn test_progress_counters_after_run() {
    let simulator = run(4, 2);
    assert_eq!(simulator.sim_day_count(), 4);
    assert_eq!(simulator.sim_days_count(), 4);
    assert!(simulator.event_count() > 0);
    assert!(!simulator.is_running());
}

#[test]
fn test_event_count_matches_statistics() {
    let mut simulator = run(3, 3);
    let events = simulator.event_count();
    let stats = simulator.collect_statistic().unwrap();
    assert_eq!(stats.metadata.events, events);
}

#[test]
fn test_lifecycle_errors() {
    let mut simulator = Simulator::new(model(1), options(1)).unwrap();
    assert_eq!(simulator.finalize_run(), Err(SimulationError::NotStarted));
    simulator.start().unwrap();
    assert_eq!(simulator.start(), Err(SimulationError::AlreadyStarted));
    simulator.finalize_run().unwrap();
    // Joining twice is harmless
    simulator.finalize_run().unwrap();
}

#[test]
fn test_invalid_model_refused() {
    let mut model = model(1);
    model.days = 0;
    let err = Simulator::new(model, options(1)).err();
    assert_eq!(err, Some(SimulationError::InvalidModel(ModelError::NoDays)));
}

#[test]
fn test_cancelled_run_has_no_statistics() {
    let mut simulator = Simulator::new(model(5), options(2)).unwrap();
    simulator.cancel();
    simulator.start().unwrap();
    assert_eq!(simulator.finalize_run(), Err(SimulationError::Cancelled));
    assert!(matches!(
        simulator.collect_statistic(),
        Err(SimulationError::StatisticsUnavailable(_))
    ));
    assert_eq!(simulator.sim_day_count(), 0);
}

#[test]
fn test_execution_log_is_collected() {
    let mut simulator = Simulator::new(
        model(1),
        SimulatorOptions {
            execution_log: true,
            ..options(4)
        },
    )
    .unwrap();
    simulator.start().unwrap();
    simulator.finalize_run().unwrap();
    assert!(simulator.execution_log().is_none());
    let success = simulator.collect_statistic().unwrap().callers[0].calls.success;

    let log = simulator.execution_log().unwrap();
    assert!(!log.is_empty());
    assert_eq!(log.entries_of_kind("ServiceStart").len() as u64, success);
    assert!(log.entries().windows(2).all(|w| w[0].time_ms <= w[1].time_ms));
}

#[test]
fn test_low_priority_run_completes() {
    let mut simulator = Simulator::new(
        model(2),
        SimulatorOptions {
            low_priority: true,
            ..options(2)
        },
    )
    .unwrap();
    simulator.set_priority(true);
    simulator.start().unwrap();
    simulator.finalize_run().unwrap();
    assert_eq!(simulator.collect_statistic().unwrap().sim_days, 2);
}
