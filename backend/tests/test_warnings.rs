//! Threshold warnings on finished runs
//!
//! Three calls at 09:00 meet one agent with 60 s talk time: waits of 0, 60
//! and 120 seconds, one call inside the 20 s service level.

use callcenter_simulator_core_rs::config::CallcenterModel;
use callcenter_simulator_core_rs::orchestrator::{simulate, SimulatorOptions};
use callcenter_simulator_core_rs::statistics::{Statistics, WarningStatus};
use serde_json::{json, Value};

fn model(warnings: Value) -> Value {
    json!({
        "name": "Warnings",
        "days": 1,
        "seed": 5,
        "caller_types": [{
            "name": "A",
            "fresh_calls_mean": 3,
            "arrival_distribution": {"type": "fixed", "value": 32400}
        }],
        "callcenters": [{
            "name": "CC",
            "agent_groups": [{"count": 1, "working_time_start": 0, "working_no_end_time": true, "skill_level": "S"}]
        }],
        "skill_levels": [{
            "name": "S",
            "entries": [{"caller_type": "A", "working_time": {"type": "fixed", "value": 60}, "post_processing_time": {"type": "fixed", "value": 0}}]
        }],
        "warnings": warnings
    })
}

fn run(warnings: Value) -> Statistics {
    let model: CallcenterModel = serde_json::from_value(model(warnings)).unwrap();
    let options = SimulatorOptions {
        max_threads: 1,
        memory_mb: Some(8000),
        ..SimulatorOptions::default()
    };
    simulate(model, options).unwrap()
}

#[test]
fn test_no_rules_no_results() {
    let stats = run(json!([]));
    assert!(stats.warnings.is_empty());
}

#[test]
fn test_waiting_time_rules() {
    let stats = run(json!([
        {"metric": "waiting_time_call", "yellow": 20, "red": 50},
        {"metric": "waiting_time_call", "yellow": 30, "red": 90},
        {"metric": "waiting_time_call", "yellow": 70, "red": 90}
    ]));
    let results = &stats.warnings;
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| (r.value - 60.0).abs() < 1e-9));
    assert_eq!(results[0].status, WarningStatus::Red);
    assert_eq!(results[1].status, WarningStatus::Yellow);
    assert_eq!(results[2].status, WarningStatus::Ok);
}

#[test]
fn test_service_level_rule_for_named_type() {
    let stats = run(json!([
        {"metric": "service_level_call_all", "group_mode": "selected", "group": "a", "yellow": 0.8, "red": 0.5},
        {"metric": "service_level_call_successful", "yellow": 0.3, "red": -1}
    ]));
    let results = &stats.warnings;
    assert!((results[0].value - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(results[0].status, WarningStatus::Red);
    assert_eq!(results[1].status, WarningStatus::Ok);
}

#[test]
fn test_selected_interval_rule() {
    let mut weights = vec![0.0; 48];
    weights[18] = 1.0;
    let stats = run(json!([
        {"metric": "waiting_time_call", "time_mode": "selected", "intervals": weights, "yellow": 30, "red": 100}
    ]));
    let result = &stats.warnings[0];
    assert!((result.value - 60.0).abs() < 1e-9);
    assert_eq!(result.status, WarningStatus::Yellow);
}

#[test]
fn test_low_workload_warns() {
    let stats = run(json!([
        {"metric": "workload", "yellow": 0.5, "red": -1},
        {"metric": "workload", "group_mode": "each", "yellow": -1, "red": 0.01}
    ]));
    let results = &stats.warnings;
    let expected = 180.0 / 86_400.0;
    assert!((results[0].value - expected).abs() < 1e-9);
    assert_eq!(results[0].status, WarningStatus::Yellow);
    assert_eq!(results[1].status, WarningStatus::Red);
}

#[test]
fn test_results_are_serialized_with_the_statistics() {
    let stats = run(json!([{"metric": "success_part_call", "yellow": 0.9, "red": 0.5}]));
    let value = serde_json::to_value(&stats).unwrap();
    assert_eq!(value["warnings"][0]["status"], json!("ok"));
    assert_eq!(value["warnings"][0]["rule"]["metric"], json!("success_part_call"));
}
