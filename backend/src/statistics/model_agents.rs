//! Configured agent counts
//!
//! Derived from the model, not from the simulation: how many agents the
//! shift plan puts into each half-hour interval.

use serde::{Deserialize, Serialize};

use crate::config::model::{AgentGroupConfig, CallcenterModel};
use crate::core::interval::IntervalDistribution;
use crate::core::time::INTERVAL_COUNT;

const INTERVAL_SECONDS: f64 = 1800.0;
const DAY_SECONDS: f64 = 86_400.0;

/// Agent counts of one agent group (or of all groups).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAgents {
    /// `"<callcenter> - Agent group <n>"`; empty for the global record
    pub name: String,
    /// Skill level of the group; empty for the global record
    pub skill_level: String,
    /// Agents on shift per interval (fractional at shift boundaries)
    pub model: IntervalDistribution,
    /// `model × efficiency`, rounded
    pub sim: IntervalDistribution,
    /// `model × (1 + surcharge)`, rounded
    pub full: IntervalDistribution,
}

impl ModelAgents {
    fn empty(name: String, skill_level: String) -> Self {
        Self {
            name,
            skill_level,
            model: IntervalDistribution::new(),
            sim: IntervalDistribution::new(),
            full: IntervalDistribution::new(),
        }
    }

    fn for_group(callcenter: &str, number: usize, group: &AgentGroupConfig) -> Self {
        let mut agents = Self::empty(
            format!("{} - Agent group {}", callcenter, number),
            group.skill_level.clone(),
        );
        let start = group.working_time_start as f64;
        let end = if group.working_no_end_time {
            DAY_SECONDS
        } else {
            group.working_time_end as f64
        };
        for i in 0..INTERVAL_COUNT {
            let from = i as f64 * INTERVAL_SECONDS;
            let to = from + INTERVAL_SECONDS;
            let share = (to.min(end) - from.max(start)).max(0.0) / INTERVAL_SECONDS;
            let model = share * group.count as f64;
            agents.model.add(i, model);
            agents.sim.add(i, (model * group.efficiency).round());
            agents.full.add(i, (model * (1.0 + group.surcharge)).round());
        }
        agents
    }
}

/// Builds one record per active agent group of every active callcenter and
/// the global sum of all of them.
pub fn build_model_agents(model: &CallcenterModel) -> (Vec<ModelAgents>, ModelAgents) {
    let mut global = ModelAgents::empty(String::new(), String::new());
    let mut groups = Vec::new();
    for callcenter in model.callcenters.iter().filter(|c| c.active) {
        for (n, group) in callcenter.agent_groups.iter().enumerate() {
            if !group.active {
                continue;
            }
            let agents = ModelAgents::for_group(&callcenter.name, n + 1, group);
            global.model.merge(&agents.model);
            global.sim.merge(&agents.sim);
            global.full.merge(&agents.full);
            groups.push(agents);
        }
    }
    (groups, global)
}
