//! Caller/agent matching
//!
//! Exercises the two greedy matching directions on a hand-built replica
//! state: a new caller looking for the best free agent, and a freed agent
//! looking for the best waiting caller.

use callcenter_simulator_core_rs::config::{CallcenterModel, RunModel};
use callcenter_simulator_core_rs::events::{EventQueue, SimEvent};
use callcenter_simulator_core_rs::models::{AgentRecord, AgentStatus, CallerId, CallerRecord, RunState};
use callcenter_simulator_core_rs::statistics::Statistics;
use serde_json::json;

/// Caller types A and B. Agent 0 sits in callcenter "Low" with skill "Both";
/// agents 1 and 2 sit in callcenter "High" with skill "A only".
fn model() -> CallcenterModel {
    serde_json::from_value(json!({
        "name": "Matching",
        "days": 1,
        "caller_types": [
            {"name": "A", "fresh_calls_mean": 10, "arrival_distribution": {"type": "fixed", "value": 36000}},
            {"name": "B", "fresh_calls_mean": 10, "score_base": 10, "arrival_distribution": {"type": "fixed", "value": 36000}}
        ],
        "callcenters": [
            {
                "name": "Low",
                "min_waiting_times": [{"caller_type": "A", "seconds": 30}],
                "agent_groups": [{"count": 1, "working_time_start": 0, "working_no_end_time": true, "skill_level": "Both"}]
            },
            {
                "name": "High",
                "score": 1,
                "technical_free_time": 5,
                "agent_groups": [{"count": 2, "working_time_start": 0, "working_no_end_time": true, "skill_level": "A only"}]
            }
        ],
        "skill_levels": [
            {
                "name": "Both",
                "entries": [
                    {"caller_type": "A", "working_time": {"type": "fixed", "value": 60}, "post_processing_time": {"type": "fixed", "value": 0}},
                    {"caller_type": "B", "working_time": {"type": "fixed", "value": 60}, "post_processing_time": {"type": "fixed", "value": 0}}
                ]
            },
            {
                "name": "A only",
                "entries": [
                    {"caller_type": "A", "score": 3, "working_time": {"type": "fixed", "value": 60}, "post_processing_time": {"type": "fixed", "value": 0}}
                ]
            }
        ]
    }))
    .unwrap()
}

struct Fixture {
    run: RunModel,
    state: RunState,
    stats: Statistics,
    queue: EventQueue,
}

impl Fixture {
    fn new(model: CallcenterModel) -> Self {
        let run = RunModel::new(model).unwrap();
        let mut state = RunState::new(&run);
        let mut stats = Statistics::new(&run);
        for agent in &run.agents {
            state.agents.push(AgentRecord::new(agent, run.caller_types.len()));
        }
        for i in 0..run.agents.len() {
            state.transition_agent(i, 0, AgentStatus::Idle, None, &run, &mut stats);
        }
        Self {
            run,
            state,
            stats,
            queue: EventQueue::new(),
        }
    }

    fn free(&mut self, agents: &[usize]) {
        for &agent in agents {
            self.state.push_free_agent(agent);
        }
    }

    fn caller(&mut self, caller_type: usize, start_wait: i64) -> CallerId {
        let mut record = CallerRecord::new(caller_type);
        record.start_wait = start_wait;
        record.first_call_time = start_wait;
        self.state.callers.allocate(record)
    }

    fn waiting(&mut self, caller_type: usize, start_wait: i64) -> CallerId {
        let id = self.caller(caller_type, start_wait);
        self.state.enqueue(id, start_wait, &self.run, &mut self.stats);
        id
    }
}

#[test]
fn test_best_scoring_agent_wins() {
    let mut f = Fixture::new(model());
    f.free(&[0, 1, 2]);
    let id = f.caller(0, 100_000);
    let agent = f.state.find_agent_for_caller(160_000, id, false, &f.run, &mut f.stats, &mut f.queue);
    // "High" 1 + skill 3 beats "Low" 0 + skill 0; agents 1 and 2 tie, the first wins
    assert_eq!(agent, Some(1));
    assert_eq!(f.state.free_agents(), &[0, 2]);
    assert_eq!(f.state.agents[1].status, AgentStatus::TechnicalFreeTime);
    assert_eq!(f.state.agents[1].caller_type, Some(0));
}

#[test]
fn test_match_schedules_service_after_technical_time() {
    let mut f = Fixture::new(model());
    f.free(&[1]);
    let id = f.caller(0, 100_000);
    f.state
        .find_agent_for_caller(100_000, id, false, &f.run, &mut f.stats, &mut f.queue)
        .unwrap();
    let (time, _, event) = f.queue.pop().unwrap();
    assert_eq!(time, 105_000);
    assert_eq!(event, SimEvent::ServiceStart { caller: id, agent: 1 });
    let record = f.state.callers.get(id).unwrap();
    assert_eq!(record.assigned.map(|(_, agent)| agent), Some(1));
}

#[test]
fn test_no_agent_for_unserved_type() {
    let mut f = Fixture::new(model());
    f.free(&[1, 2]);
    let id = f.caller(1, 0);
    let agent = f.state.find_agent_for_caller(0, id, false, &f.run, &mut f.stats, &mut f.queue);
    assert_eq!(agent, None);
    assert_eq!(f.state.free_agents().len(), 2);
    assert!(f.queue.is_empty());
}

#[test]
fn test_min_waiting_time_holds_back_callcenter() {
    let mut f = Fixture::new(model());
    f.free(&[0]);
    let id = f.caller(0, 100_000);
    // Waited 10 s, "Low" requires 30 s for type A
    assert_eq!(
        f.state.find_agent_for_caller(110_000, id, false, &f.run, &mut f.stats, &mut f.queue),
        None
    );
    assert_eq!(
        f.state.find_agent_for_caller(130_000, id, false, &f.run, &mut f.stats, &mut f.queue),
        Some(0)
    );
}

#[test]
fn test_agent_takes_highest_scoring_caller() {
    let mut f = Fixture::new(model());
    let a = f.waiting(0, 0);
    let b = f.waiting(1, 50_000);
    assert_eq!(f.state.queue_length(), 2);

    let found = f.state.find_caller_for_agent(60_000, 0, false, &f.run, &mut f.stats, &mut f.queue);
    assert_eq!(found, Some(b));
    assert!(f.state.queued(1).is_empty());
    assert_eq!(f.state.queued(0), &[a]);
    assert_eq!(f.state.queue_length(), 1);
}

#[test]
fn test_waiting_time_score_overtakes_base_score() {
    let mut value = serde_json::to_value(model()).unwrap();
    value["caller_types"][0]["score_per_second"] = json!(1.0);
    let mut f = Fixture::new(serde_json::from_value(value).unwrap());
    let a = f.waiting(0, 0);
    f.waiting(1, 50_000);
    // A waited 60 s: 60 points beat B's base score of 10
    let found = f.state.find_caller_for_agent(60_000, 0, false, &f.run, &mut f.stats, &mut f.queue);
    assert_eq!(found, Some(a));
}

#[test]
fn test_equal_scores_keep_queue_order() {
    let mut f = Fixture::new(model());
    let first = f.waiting(0, 0);
    f.waiting(0, 1_000);
    let found = f.state.find_caller_for_agent(40_000, 1, false, &f.run, &mut f.stats, &mut f.queue);
    assert_eq!(found, Some(first));
}

#[test]
fn test_agent_removed_from_free_list_on_match() {
    let mut f = Fixture::new(model());
    f.free(&[2]);
    f.waiting(0, 0);
    let found = f.state.find_caller_for_agent(10_000, 2, true, &f.run, &mut f.stats, &mut f.queue);
    assert!(found.is_some());
    assert!(f.state.free_agents().is_empty());
}

#[test]
fn test_agent_ignores_types_outside_its_skill() {
    let mut f = Fixture::new(model());
    f.waiting(1, 0);
    let found = f.state.find_caller_for_agent(10_000, 1, false, &f.run, &mut f.stats, &mut f.queue);
    assert_eq!(found, None);
    assert_eq!(f.state.queue_length(), 1);
}

#[test]
fn test_agent_scoring_minus_one_or_less_is_never_chosen() {
    let with_score = |score: f64| {
        let mut value = serde_json::to_value(model()).unwrap();
        value["callcenters"][0]["score"] = json!(score);
        let mut f = Fixture::new(serde_json::from_value(value).unwrap());
        f.free(&[0]);
        let id = f.caller(1, 0);
        f.state.find_agent_for_caller(0, id, false, &f.run, &mut f.stats, &mut f.queue)
    };
    assert_eq!(with_score(-5.0), None);
    assert_eq!(with_score(-1.0), None);
    assert_eq!(with_score(-0.5), Some(0));
}
