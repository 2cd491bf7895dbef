//! Statistics accumulator
//!
//! Every replica owns one [`Statistics`] while it runs. After all replicas
//! finished, the orchestrator merges them into the first one and finalizes
//! the result once:
//!
//! 1. queue lengths are normalized to per-day means
//! 2. agent times are converted from milliseconds to seconds
//! 3. caller-driven costs are computed
//! 4. threshold warnings are evaluated
//!
//! Later steps read values produced by earlier ones, so the order is fixed.

pub mod agents;
pub mod callers;
pub mod confidence;
pub mod model_agents;
pub mod warnings;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RunModel;
use crate::core::interval::IntervalDistribution;

pub use agents::{AgentCallerStatistics, AgentDayTotals, AgentStatistics, AgentTime};
pub use callers::{CallerStatistics, FlowStatistics, InterDayStatistics};
pub use confidence::{confidence_interval, ConfidenceInterval, SampleSums};
pub use model_agents::{build_model_agents, ModelAgents};
pub use warnings::{warning_status, warning_value, WarningResult, WarningStatus};

/// Reasons a merge is refused.
#[derive(Debug, Error, PartialEq)]
pub enum StatisticsError {
    #[error("Cannot merge statistics of a replica that did not finish")]
    Unusable,

    #[error("Statistics are already finalized")]
    Finalized,

    #[error("Statistics shapes differ: {what} ({left} vs {right})")]
    ShapeMismatch {
        what: String,
        left: usize,
        right: usize,
    },
}

/// Who ran what, where and how long.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub model_name: String,
    pub model_fingerprint: String,
    pub user: String,
    pub host: String,
    pub os: String,
    /// RFC 3339
    pub date: String,
    pub runtime_ms: u64,
    pub threads: usize,
    pub events: u64,
}

/// Statistics of one replica, or the merged result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub metadata: RunMetadata,

    /// Cleared when the owning replica failed; such statistics are never
    /// merged.
    pub usable: bool,
    pub finalized: bool,

    pub sim_days: u64,

    pub callers_global: CallerStatistics,
    pub callers: Vec<CallerStatistics>,

    pub agents_global: AgentStatistics,
    pub agents_by_callcenter: Vec<AgentStatistics>,
    pub agents_by_skill_level: Vec<AgentStatistics>,

    /// Time-weighted mean number of waiting callers (whole day)
    pub mean_queue_length: f64,
    pub mean_queue_length_by_interval: IntervalDistribution,
    pub max_queue_length: u64,

    pub model_agents: Vec<ModelAgents>,
    pub model_agents_global: ModelAgents,

    pub warnings: Vec<WarningResult>,
}

impl Statistics {
    /// Empty statistics shaped after `run`.
    pub fn new(run: &RunModel) -> Self {
        let caller_names: Vec<String> =
            run.caller_types.iter().map(|c| c.name.clone()).collect();
        let (model_agents, model_agents_global) = build_model_agents(&run.model);
        Self {
            metadata: RunMetadata {
                model_name: run.model.name.clone(),
                model_fingerprint: run.fingerprint.clone(),
                ..Default::default()
            },
            usable: true,
            finalized: false,
            sim_days: 0,
            callers_global: CallerStatistics::new(""),
            callers: caller_names
                .iter()
                .map(|name| CallerStatistics::new(name.as_str()))
                .collect(),
            agents_global: AgentStatistics::new("", &caller_names),
            agents_by_callcenter: run
                .callcenters
                .iter()
                .map(|c| AgentStatistics::new(c.name.as_str(), &caller_names))
                .collect(),
            agents_by_skill_level: run
                .skill_levels
                .iter()
                .map(|s| AgentStatistics::new(s.name.as_str(), &caller_names))
                .collect(),
            mean_queue_length: 0.0,
            mean_queue_length_by_interval: IntervalDistribution::new(),
            max_queue_length: 0,
            model_agents,
            model_agents_global,
            warnings: Vec::new(),
        }
    }

    /// Applies `f` to the global caller record and to the record of
    /// `caller_type`.
    pub fn for_caller<F>(&mut self, caller_type: usize, mut f: F)
    where
        F: FnMut(&mut CallerStatistics),
    {
        f(&mut self.callers_global);
        if let Some(typed) = self.callers.get_mut(caller_type) {
            f(typed);
        }
    }

    /// Applies `f` to the global agent record and to the records of the
    /// agent's callcenter and skill level.
    pub fn for_agent<F>(&mut self, callcenter: usize, skill_level: usize, mut f: F)
    where
        F: FnMut(&mut AgentStatistics),
    {
        f(&mut self.agents_global);
        if let Some(cc) = self.agents_by_callcenter.get_mut(callcenter) {
            f(cc);
        }
        if let Some(skill) = self.agents_by_skill_level.get_mut(skill_level) {
            f(skill);
        }
    }

    /// Records a new queue length maximum candidate.
    pub fn observe_queue_length(&mut self, length: u64) {
        if length > self.max_queue_length {
            self.max_queue_length = length;
        }
    }

    /// Closes one simulated day.
    pub fn update_inter_day_data(&mut self) {
        self.sim_days += 1;
        self.callers_global.update_inter_day_data();
        for caller in self.callers.iter_mut() {
            caller.update_inter_day_data();
        }
    }

    /// Rebuilds the sums that are only tracked per interval. Called once per
    /// replica after its last day.
    pub fn finalize_sums(&mut self) {
        self.callers_global.finalize_sums();
        for caller in self.callers.iter_mut() {
            caller.finalize_sums();
        }
    }

    /// Adds `other` into `self`.
    ///
    /// # Errors
    /// Refuses unusable or finalized statistics on either side and
    /// statistics built from differently shaped models.
    pub fn merge(&mut self, other: &Statistics) -> Result<(), StatisticsError> {
        if !self.usable || !other.usable {
            return Err(StatisticsError::Unusable);
        }
        if self.finalized || other.finalized {
            return Err(StatisticsError::Finalized);
        }
        check_shape("caller types", self.callers.len(), other.callers.len())?;
        check_shape(
            "callcenters",
            self.agents_by_callcenter.len(),
            other.agents_by_callcenter.len(),
        )?;
        check_shape(
            "skill levels",
            self.agents_by_skill_level.len(),
            other.agents_by_skill_level.len(),
        )?;

        self.sim_days += other.sim_days;
        self.metadata.events += other.metadata.events;

        self.callers_global.merge(&other.callers_global);
        for (a, b) in self.callers.iter_mut().zip(other.callers.iter()) {
            a.merge(b);
        }

        self.agents_global.merge(&other.agents_global);
        for (a, b) in self
            .agents_by_callcenter
            .iter_mut()
            .zip(other.agents_by_callcenter.iter())
        {
            a.merge(b);
        }
        for (a, b) in self
            .agents_by_skill_level
            .iter_mut()
            .zip(other.agents_by_skill_level.iter())
        {
            a.merge(b);
        }

        self.mean_queue_length += other.mean_queue_length;
        self.mean_queue_length_by_interval
            .merge(&other.mean_queue_length_by_interval);
        self.max_queue_length = self.max_queue_length.max(other.max_queue_length);
        Ok(())
    }

    /// Computes all derived values of the merged result. Runs at most once.
    pub fn finalize(&mut self, run: &RunModel) {
        if self.finalized {
            return;
        }
        self.finalize_queue_length();
        self.agents_global.convert_to_seconds();
        for agents in self
            .agents_by_callcenter
            .iter_mut()
            .chain(self.agents_by_skill_level.iter_mut())
        {
            agents.convert_to_seconds();
        }
        self.calc_caller_costs(run);
        self.calc_warnings(run);
        self.finalized = true;
    }

    fn finalize_queue_length(&mut self) {
        let days = self.sim_days.max(1) as f64;
        self.mean_queue_length /= days;
        self.mean_queue_length_by_interval.divide(days);
    }

    fn calc_caller_costs(&mut self, run: &RunModel) {
        let (mut revenue, mut waiting, mut cancel) = (0.0, 0.0, 0.0);
        for (stats, caller) in self.callers.iter_mut().zip(run.caller_types.iter()) {
            stats.revenue = stats.clients.success as f64 * caller.revenue_per_client;
            stats.cost_waiting = stats.calls.waiting_sum as f64 * caller.cost_per_waiting_second;
            stats.cost_cancel = stats.calls.cancelled as f64 * caller.cost_per_cancel;
            revenue += stats.revenue;
            waiting += stats.cost_waiting;
            cancel += stats.cost_cancel;
        }
        self.callers_global.revenue = revenue;
        self.callers_global.cost_waiting = waiting;
        self.callers_global.cost_cancel = cancel;
    }

    fn calc_warnings(&mut self, run: &RunModel) {
        self.warnings = run
            .warnings
            .iter()
            .map(|rule| {
                let value = warning_value(
                    rule,
                    &self.callers_global,
                    &self.callers,
                    &self.agents_global,
                    &self.agents_by_callcenter,
                );
                WarningResult {
                    rule: rule.clone(),
                    value,
                    status: warning_status(rule, value),
                }
            })
            .collect();
    }

    /// Confidence interval of the daily mean waiting time of `caller_type`
    /// (all types for `None`).
    pub fn waiting_time_confidence(
        &self,
        caller_type: Option<usize>,
        level: f64,
    ) -> Option<ConfidenceInterval> {
        let caller = match caller_type {
            Some(i) => self.callers.get(i)?,
            None => &self.callers_global,
        };
        caller
            .inter_day
            .waiting_time
            .confidence_interval(self.sim_days, level)
    }
}

fn check_shape(what: &str, left: usize, right: usize) -> Result<(), StatisticsError> {
    if left != right {
        return Err(StatisticsError::ShapeMismatch {
            what: what.to_string(),
            left,
            right,
        });
    }
    Ok(())
}
