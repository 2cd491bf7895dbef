//! Model configuration
//!
//! - [`model`]: serde document as edited by planners
//! - [`run_model`]: validated, index-resolved form shared by all replicas
//! - [`fingerprint`]: stable model hash

pub mod fingerprint;
pub mod model;
pub mod run_model;

pub use fingerprint::compute_fingerprint;
pub use model::{
    AgentCallCosts, AgentGroupConfig, CallcenterConfig, CallcenterModel, CallerTypeConfig,
    CarryoverTables, ForwardingConfig, GroupSelection, MinWaitingTime, QueueLimit, RecallConfig,
    RetryConfig, SkillEntry, SkillForwarding, SkillLevelConfig, TimeSelection, TypeRate,
    WarningMetric, WarningRule,
};
pub use run_model::{
    ModelError, RunAgent, RunCallcenter, RunCallerType, RunModel, RunSkillEntry, RunSkillLevel,
    SkillSwitch, TypeSwitch,
};
