//! Agent time and cost accounting
//!
//! Fixed arrival and service times make every booked second predictable.

use callcenter_simulator_core_rs::config::CallcenterModel;
use callcenter_simulator_core_rs::orchestrator::{simulate, SimulatorOptions};
use callcenter_simulator_core_rs::statistics::Statistics;
use serde_json::{json, Value};

const SHIFT_SECONDS: i64 = 8 * 3600;

/// One agent 08:00-16:00, one call per day at `arrival` seconds, 5 s
/// technical free time, 60 s talk and 10 s wrap-up.
fn model(arrival: u32) -> Value {
    json!({
        "name": "Accounting",
        "days": 2,
        "seed": 3,
        "caller_types": [{
            "name": "A",
            "fresh_calls_mean": 1,
            "arrival_distribution": {"type": "fixed", "value": arrival},
            "waiting_time_tolerance": {"type": "fixed", "value": 600}
        }],
        "callcenters": [{
            "name": "CC",
            "technical_free_time": 5,
            "agent_groups": [{
                "count": 1,
                "working_time_start": 28800,
                "working_time_end": 57600,
                "skill_level": "S",
                "cost_per_working_hour": 20,
                "costs_by_caller_type": [{"caller_type": "A", "per_call": 1.5, "per_call_minute": 0.6}]
            }]
        }],
        "skill_levels": [{
            "name": "S",
            "entries": [{
                "caller_type": "A",
                "working_time": {"type": "fixed", "value": 60},
                "post_processing_time": {"type": "fixed", "value": 10}
            }]
        }]
    })
}

fn run(value: Value) -> Statistics {
    let model: CallcenterModel = serde_json::from_value(value).unwrap();
    let options = SimulatorOptions {
        max_threads: 1,
        memory_mb: Some(8000),
        ..SimulatorOptions::default()
    };
    simulate(model, options).unwrap()
}

#[test]
fn test_busy_times_are_booked_exactly() {
    let stats = run(model(32_400));
    let agents = &stats.agents_global;
    assert_eq!(agents.agent_count, 1);
    assert_eq!(agents.calls, 2);
    assert_eq!(agents.technical, 2 * 5);
    assert_eq!(agents.service, 2 * 60);
    assert_eq!(agents.post_processing, 2 * 10);
    assert_eq!(agents.present(), 2 * SHIFT_SECONDS);
    assert_eq!(agents.idle, 2 * (SHIFT_SECONDS - 75));
}

#[test]
fn test_busy_times_land_in_their_interval() {
    let stats = run(model(32_400));
    let agents = &stats.agents_global;
    // 09:00 is interval 18
    assert!((agents.technical_by_interval.get(18) - 10.0).abs() < 1e-9);
    assert!((agents.service_by_interval.get(18) - 120.0).abs() < 1e-9);
    assert!((agents.post_processing_by_interval.get(18) - 20.0).abs() < 1e-9);
    assert_eq!(agents.calls_by_interval.get(18), 2.0);
    assert!((agents.service_by_interval.sum() - 120.0).abs() < 1e-9);

    let by_caller = &agents.by_caller[0];
    assert_eq!(by_caller.calls, 2);
    assert_eq!(by_caller.service, 120);
}

#[test]
fn test_group_records_match_global() {
    let stats = run(model(32_400));
    let global = &stats.agents_global;
    let callcenter = &stats.agents_by_callcenter[0];
    let skill = &stats.agents_by_skill_level[0];
    assert_eq!(callcenter.present(), global.present());
    assert_eq!(skill.service, global.service);
    assert_eq!(callcenter.calls, global.calls);
}

#[test]
fn test_costs() {
    let stats = run(model(32_400));
    let agents = &stats.agents_global;
    assert!((agents.cost_office_time - 2.0 * 8.0 * 20.0).abs() < 1e-9);
    assert!((agents.cost_calls - 2.0 * 1.5).abs() < 1e-9);
    // 75 busy seconds per day at 0.6 per minute
    assert!((agents.cost_process_time - 2.0 * 0.75).abs() < 1e-9);
}

#[test]
fn test_waiting_includes_technical_free_time() {
    let stats = run(model(32_400));
    let calls = &stats.callers[0].calls;
    assert_eq!(calls.success, 2);
    assert_eq!(calls.waiting_sum, 2 * 5);
    assert_eq!(calls.service_level, 2);
}

#[test]
fn test_shift_overrun_is_booked() {
    // Call at 15:59:30 keeps the agent busy until 16:00:45
    let stats = run(model(57_570));
    let agents = &stats.agents_global;
    assert_eq!(agents.calls, 2);
    assert_eq!(agents.present(), 2 * (SHIFT_SECONDS + 45));
}

#[test]
fn test_open_ended_shift_lasts_until_midnight() {
    let mut value = model(32_400);
    value["callcenters"][0]["agent_groups"][0]["working_no_end_time"] = json!(true);
    let stats = run(value);
    assert_eq!(stats.agents_global.present(), 2 * 16 * 3600);
}

#[test]
fn test_workload() {
    let stats = run(model(32_400));
    let expected = 75.0 / SHIFT_SECONDS as f64;
    assert!((stats.agents_global.workload() - expected).abs() < 1e-9);
}
