//! Serializable callcenter model
//!
//! This is the document a planner edits: caller types with their arrival and
//! patience behaviour, callcenters with agent shift groups, skill levels with
//! service times, and threshold warnings. All times are in seconds. Names tie
//! the parts together and are resolved to indices by
//! [`RunModel::new`](super::RunModel::new).

use serde::{Deserialize, Serialize};

use crate::rng::Distribution;

fn yes() -> bool {
    true
}

fn default_days() -> u32 {
    100
}

fn default_service_level() -> u32 {
    20
}

fn default_retry_time() -> Distribution {
    Distribution::Exponential { mean: 900.0 }
}

fn default_recall_time() -> Distribution {
    Distribution::Exponential { mean: 3600.0 }
}

fn default_efficiency() -> f64 {
    1.0
}

// ============================================================================
// Model root
// ============================================================================

/// Complete model of one or more callcenters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallcenterModel {
    /// Display name of the model
    pub name: String,

    /// Number of days to simulate
    #[serde(default = "default_days")]
    pub days: u32,

    /// Seed for all random draws
    #[serde(default)]
    pub seed: u64,

    /// Global service-level target in seconds
    #[serde(default = "default_service_level")]
    pub service_level_seconds: u32,

    /// Limit for callers occupying a telephone line while waiting.
    /// `None` means unbounded.
    #[serde(default)]
    pub max_queue_length: Option<QueueLimit>,

    pub caller_types: Vec<CallerTypeConfig>,

    pub callcenters: Vec<CallcenterConfig>,

    pub skill_levels: Vec<SkillLevelConfig>,

    /// Threshold warnings evaluated on the final statistics
    #[serde(default)]
    pub warnings: Vec<WarningRule>,
}

/// Maximum number of waiting callers that block a telephone line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueLimit {
    /// Fixed number of lines
    Fixed { limit: u32 },

    /// `offset + factor × working agents`, evaluated on every arrival
    PerWorkingAgent {
        factor: f64,
        #[serde(default)]
        offset: f64,
    },
}

impl QueueLimit {
    /// Current limit for the given number of agents on shift.
    pub fn limit(&self, working_agents: i64) -> f64 {
        match self {
            QueueLimit::Fixed { limit } => *limit as f64,
            QueueLimit::PerWorkingAgent { factor, offset } => {
                offset + factor * working_agents.max(0) as f64
            }
        }
    }
}

// ============================================================================
// Caller types
// ============================================================================

/// Target caller type with a selection rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRate {
    pub caller_type: String,
    pub rate: f64,
}

/// One category of callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerTypeConfig {
    pub name: String,

    #[serde(default = "yes")]
    pub active: bool,

    /// Mean number of fresh calls per day
    pub fresh_calls_mean: f64,

    /// Standard deviation of the daily fresh call count
    #[serde(default)]
    pub fresh_calls_std_dev: f64,

    /// Arrival time of fresh calls in seconds since midnight
    pub arrival_distribution: Distribution,

    #[serde(default)]
    pub score_base: f64,

    /// Score gained per second of waiting
    #[serde(default)]
    pub score_per_second: f64,

    /// Bonus for forwarded calls
    #[serde(default)]
    pub score_continued: f64,

    /// Whether a waiting caller occupies a telephone line
    #[serde(default = "yes")]
    pub blocks_line: bool,

    /// Overrides the model-wide service level target
    #[serde(default)]
    pub service_level_seconds: Option<u32>,

    /// Waiting-time tolerance; `None` means callers never give up
    #[serde(default)]
    pub waiting_time_tolerance: Option<Distribution>,

    /// Delay until a retry after blocking or giving up
    #[serde(default = "default_retry_time")]
    pub retry_time: Distribution,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub forwarding: ForwardingConfig,

    #[serde(default)]
    pub recall: RecallConfig,

    #[serde(default)]
    pub revenue_per_client: f64,

    #[serde(default)]
    pub cost_per_waiting_second: f64,

    #[serde(default)]
    pub cost_per_cancel: f64,

    /// Per-day injections coming from a previous chained run
    #[serde(default)]
    pub carryover: CarryoverTables,
}

/// Retry behaviour after a blocked line or a give-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub probability_after_blocked_first: f64,
    pub probability_after_blocked: f64,
    pub probability_after_give_up_first: f64,
    pub probability_after_give_up: f64,
    pub type_switch_after_blocked_first: Vec<TypeRate>,
    pub type_switch_after_blocked: Vec<TypeRate>,
    pub type_switch_after_give_up_first: Vec<TypeRate>,
    pub type_switch_after_give_up: Vec<TypeRate>,
}

/// Forwarding rule specific to the skill level that served the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillForwarding {
    pub skill_level: String,
    pub probability: f64,
    #[serde(default)]
    pub targets: Vec<TypeRate>,
}

/// Forwarding of a served call to another caller type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardingConfig {
    pub probability: f64,
    pub targets: Vec<TypeRate>,
    pub by_skill_level: Vec<SkillForwarding>,
}

/// Recall: a served client calls again later as a new call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    pub probability: f64,
    pub delay: Distribution,
    pub targets: Vec<TypeRate>,
    pub by_skill_level: Vec<SkillForwarding>,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            probability: 0.0,
            delay: default_recall_time(),
            targets: Vec::new(),
            by_skill_level: Vec::new(),
        }
    }
}

/// Per-day tables of callers carried into this run, indexed by global day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarryoverTables {
    /// Extra fresh calls per day
    pub additional_calls_by_day: Vec<u32>,
    /// Retry times (ms after midnight) per day
    pub retries_by_day: Vec<Vec<i64>>,
    /// Time already waited (ms) of callers still queued at midnight
    pub waiting_by_day: Vec<Vec<i64>>,
    /// Remaining tolerance (ms) of those callers, parallel to `waiting_by_day`
    pub tolerance_by_day: Vec<Vec<i64>>,
}

impl CarryoverTables {
    pub fn is_empty(&self) -> bool {
        self.additional_calls_by_day.is_empty()
            && self.retries_by_day.is_empty()
            && self.waiting_by_day.is_empty()
            && self.tolerance_by_day.is_empty()
    }
}

// ============================================================================
// Callcenters and agents
// ============================================================================

/// Minimum time a caller type must have waited before this callcenter may
/// take it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinWaitingTime {
    pub caller_type: String,
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallcenterConfig {
    pub name: String,

    #[serde(default = "yes")]
    pub active: bool,

    /// Delay between assignment and service start, in seconds
    #[serde(default)]
    pub technical_free_time: f64,

    /// Whether callers may still give up during the technical free time
    #[serde(default)]
    pub technical_free_time_is_waiting_time: bool,

    #[serde(default)]
    pub score: f64,

    /// Weight of the agent's idle share of the day
    #[serde(default)]
    pub agent_score_free_time_part: f64,

    /// Weight of the agent's idle time since the last call (per ms)
    #[serde(default)]
    pub agent_score_free_time_since_last_call: f64,

    #[serde(default)]
    pub min_waiting_times: Vec<MinWaitingTime>,

    pub agent_groups: Vec<AgentGroupConfig>,
}

/// Agent costs for one caller type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCallCosts {
    pub caller_type: String,
    #[serde(default)]
    pub per_call: f64,
    #[serde(default)]
    pub per_call_minute: f64,
}

/// A number of agents sharing a shift and a skill level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentGroupConfig {
    #[serde(default = "yes")]
    pub active: bool,

    pub count: u32,

    /// Shift start in seconds since midnight
    pub working_time_start: u32,

    /// Shift end in seconds since midnight
    #[serde(default)]
    pub working_time_end: u32,

    /// Agents stay until no caller is left
    #[serde(default)]
    pub working_no_end_time: bool,

    pub skill_level: String,

    #[serde(default)]
    pub cost_per_working_hour: f64,

    #[serde(default)]
    pub costs_by_caller_type: Vec<AgentCallCosts>,

    /// Share of present agents actually available (model agent statistics)
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,

    /// Planning surcharge on top of present agents (model agent statistics)
    #[serde(default)]
    pub surcharge: f64,
}

// ============================================================================
// Skill levels
// ============================================================================

/// Service parameters of one skill level for one caller type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub caller_type: String,

    #[serde(default)]
    pub score: f64,

    /// Service time in seconds
    pub working_time: Distribution,

    /// Per-interval service times (48 entries) overriding `working_time`
    #[serde(default)]
    pub working_time_by_interval: Option<Vec<Distribution>>,

    /// Post-processing time in seconds
    pub post_processing_time: Distribution,

    /// Per-interval post-processing times (48 entries)
    #[serde(default)]
    pub post_processing_time_by_interval: Option<Vec<Distribution>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillLevelConfig {
    pub name: String,
    pub entries: Vec<SkillEntry>,
}

// ============================================================================
// Threshold warnings
// ============================================================================

/// Metric watched by a warning rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningMetric {
    WaitingTimeCall,
    WaitingTimeClient,
    ResidenceTimeCall,
    ResidenceTimeClient,
    SuccessPartCall,
    SuccessPartClient,
    ServiceLevelCallSuccessful,
    ServiceLevelCallAll,
    ServiceLevelClientSuccessful,
    ServiceLevelClientAll,
    Workload,
}

impl WarningMetric {
    /// Larger values are worse for time metrics, smaller values for all others.
    pub fn larger_is_worse(self) -> bool {
        matches!(
            self,
            WarningMetric::WaitingTimeCall
                | WarningMetric::WaitingTimeClient
                | WarningMetric::ResidenceTimeCall
                | WarningMetric::ResidenceTimeClient
        )
    }
}

/// Which groups a warning rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSelection {
    /// The global record
    #[default]
    Average,
    /// Every caller type (or callcenter for workload) individually
    Each,
    /// One named group, falling back to the global record
    Selected,
}

/// Which part of the day a warning rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSelection {
    /// Whole-day totals
    #[default]
    Average,
    /// Every half-hour interval
    Each,
    /// Intervals whose weight exceeds 0.1
    Selected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningRule {
    pub metric: WarningMetric,

    #[serde(default)]
    pub group_mode: GroupSelection,

    /// Group name for [`GroupSelection::Selected`] (case-insensitive)
    #[serde(default)]
    pub group: Option<String>,

    #[serde(default)]
    pub time_mode: TimeSelection,

    /// 48 weights for [`TimeSelection::Selected`]
    #[serde(default)]
    pub intervals: Option<Vec<f64>>,

    /// Yellow threshold; negative disables it
    pub yellow: f64,

    /// Red threshold; negative disables it
    pub red: f64,
}
