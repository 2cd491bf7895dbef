//! Model loading and validation
//!
//! Tests the serde document, its resolution into a run model and the
//! consistency checks that refuse broken models.

use callcenter_simulator_core_rs::config::{compute_fingerprint, CallcenterModel, ModelError, QueueLimit, RunModel};
use serde_json::{json, Value};

fn base() -> Value {
    json!({
        "name": "Config test",
        "days": 3,
        "seed": 11,
        "caller_types": [
            {
                "name": "Hotline",
                "fresh_calls_mean": 120,
                "arrival_distribution": {"type": "uniform", "min": 28800, "max": 61200},
                "waiting_time_tolerance": {"type": "exponential", "mean": 180}
            },
            {
                "name": "Sales",
                "fresh_calls_mean": 40,
                "arrival_distribution": {"type": "normal", "mean": 43200, "std_dev": 3600}
            }
        ],
        "callcenters": [{
            "name": "Main",
            "agent_groups": [
                {"count": 4, "working_time_start": 28800, "working_time_end": 61200, "skill_level": "Generalist"},
                {"count": 2, "working_time_start": 36000, "working_no_end_time": true, "skill_level": "Sales only"}
            ]
        }],
        "skill_levels": [
            {
                "name": "Generalist",
                "entries": [
                    {"caller_type": "Hotline", "working_time": {"type": "exponential", "mean": 180}, "post_processing_time": {"type": "fixed", "value": 20}},
                    {"caller_type": "Sales", "working_time": {"type": "exponential", "mean": 300}, "post_processing_time": {"type": "fixed", "value": 30}}
                ]
            },
            {
                "name": "Sales only",
                "entries": [
                    {"caller_type": "Sales", "score": 2, "working_time": {"type": "exponential", "mean": 240}, "post_processing_time": {"type": "fixed", "value": 30}}
                ]
            }
        ]
    })
}

fn parse(value: Value) -> CallcenterModel {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_defaults_are_filled_in() {
    let mut value = base();
    value.as_object_mut().unwrap().remove("days");
    let model = parse(value);
    assert_eq!(model.days, 100);
    assert_eq!(model.service_level_seconds, 20);
    assert!(model.max_queue_length.is_none());
    assert!(model.caller_types[0].active);
    assert!(model.caller_types[0].carryover.is_empty());
}

#[test]
fn test_run_model_resolves_names() {
    let run = RunModel::new(parse(base())).unwrap();
    assert_eq!(run.caller_types.len(), 2);
    assert_eq!(run.callcenters.len(), 1);
    assert_eq!(run.skill_levels.len(), 2);
    assert_eq!(run.agents.len(), 6);

    let sales_only = &run.agents[5];
    assert_eq!(sales_only.skill_level, 1);
    assert_eq!(sales_only.start_ms, 36_000_000);
    assert_eq!(sales_only.end_ms, None);

    assert!(run.skill_levels[0].serves(0));
    assert!(run.skill_levels[0].serves(1));
    assert!(!run.skill_levels[1].serves(0));
    assert_eq!(run.fresh_calls_per_day(), 160.0);
}

#[test]
fn test_inactive_caller_type_is_left_out() {
    let mut value = base();
    value["caller_types"][1]["active"] = json!(false);
    value["skill_levels"] = json!([{
        "name": "Generalist",
        "entries": [
            {"caller_type": "Hotline", "working_time": {"type": "fixed", "value": 60}, "post_processing_time": {"type": "fixed", "value": 0}}
        ]
    }]);
    value["callcenters"][0]["agent_groups"] = json!([
        {"count": 1, "working_time_start": 0, "working_no_end_time": true, "skill_level": "Generalist"}
    ]);
    let run = RunModel::new(parse(value)).unwrap();
    assert_eq!(run.caller_types.len(), 1);
    assert_eq!(run.caller_types[0].name, "Hotline");
}

#[test]
fn test_zero_days_refused() {
    let mut model = parse(base());
    model.days = 0;
    assert_eq!(RunModel::new(model).unwrap_err(), ModelError::NoDays);
}

#[test]
fn test_duplicate_caller_type_refused() {
    let mut value = base();
    value["caller_types"][1]["name"] = json!("Hotline");
    let err = RunModel::new(parse(value)).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateName { ref kind, ref name } if kind == "caller type" && name == "Hotline"));
}

#[test]
fn test_unknown_caller_type_in_skill_refused() {
    let mut value = base();
    value["skill_levels"][1]["entries"][0]["caller_type"] = json!("Support");
    let err = RunModel::new(parse(value)).unwrap_err();
    assert!(matches!(err, ModelError::UnknownCallerType { .. }));
    assert!(err.to_string().contains("Support"));
}

#[test]
fn test_model_without_calls_refused() {
    let mut value = base();
    value["caller_types"][0]["fresh_calls_mean"] = json!(0);
    value["caller_types"][1]["fresh_calls_mean"] = json!(0);
    assert_eq!(RunModel::new(parse(value)).unwrap_err(), ModelError::NoCalls);
}

#[test]
fn test_invalid_distribution_refused() {
    let mut value = base();
    value["caller_types"][0]["waiting_time_tolerance"] = json!({"type": "exponential", "mean": -5});
    let err = RunModel::new(parse(value)).unwrap_err();
    assert!(matches!(err, ModelError::InvalidDistribution { .. }));
}

#[test]
fn test_unknown_distribution_type_fails_to_parse() {
    let mut value = base();
    value["caller_types"][0]["arrival_distribution"] = json!({"type": "poisson", "mean": 3});
    assert!(serde_json::from_value::<CallcenterModel>(value).is_err());
}

#[test]
fn test_unstaffed_model_is_valid_with_note() {
    let mut value = base();
    value["callcenters"][0]["agent_groups"][0]["count"] = json!(0);
    value["callcenters"][0]["agent_groups"][1]["count"] = json!(0);
    let run = RunModel::new(parse(value)).unwrap();
    assert!(run.agents.is_empty());
    let notes = run.plausibility_notes();
    assert!(notes.iter().any(|n| n.contains("No agents")));
}

#[test]
fn test_unserved_caller_type_noted() {
    let mut value = base();
    value["callcenters"][0]["agent_groups"][0]["skill_level"] = json!("Sales only");
    let run = RunModel::new(parse(value)).unwrap();
    let notes = run.plausibility_notes();
    assert!(notes.iter().any(|n| n.contains("Hotline")));
}

#[test]
fn test_queue_limit_per_working_agent() {
    let mut value = base();
    value["max_queue_length"] = json!({"type": "per_working_agent", "factor": 1.5, "offset": 2});
    let model = parse(value);
    let limit = model.max_queue_length.clone().unwrap();
    assert_eq!(limit.limit(4), 8.0);
    assert!(matches!(limit, QueueLimit::PerWorkingAgent { .. }));
    assert!(RunModel::new(model).is_ok());
}

#[test]
fn test_fingerprint_tracks_model_but_not_carryover() {
    let model = parse(base());
    let run = RunModel::new(model.clone()).unwrap();
    assert_eq!(run.fingerprint, compute_fingerprint(&model).unwrap());

    let mut carried = model.clone();
    carried.caller_types[0].carryover.retries_by_day = vec![vec![1_000], vec![], vec![]];
    assert_eq!(compute_fingerprint(&carried).unwrap(), run.fingerprint);

    let mut reseeded = model;
    reseeded.seed += 1;
    assert_ne!(compute_fingerprint(&reseeded).unwrap(), run.fingerprint);
}
