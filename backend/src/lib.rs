//! Callcenter Simulator Core - Rust Engine
//!
//! Discrete-event simulation of inbound callcenters with deterministic,
//! multi-threaded execution.
//!
//! # Architecture
//!
//! - **config**: Model document, validation into the run model, fingerprint
//! - **core**: Simulated clock and half-hour interval accounting
//! - **events**: Event queue and event handlers
//! - **models**: Per-replica state (callers, agents, queues, matching)
//! - **replica**: Day lifecycle of one worker thread
//! - **orchestrator**: Thread planning, run control, merge, chained runs
//! - **statistics**: Accumulators, confidence intervals, warnings
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All simulated times are i64 milliseconds since midnight of the day
//! 2. All randomness is deterministic (seeded per global day)
//! 3. Merged counters do not depend on the number of replica threads

// Module declarations
pub mod config;
pub mod core;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod replica;
pub mod rng;
pub mod statistics;

// Re-exports for convenience
pub use config::{CallcenterModel, ModelError, RunModel};
pub use core::interval::IntervalDistribution;
pub use models::{AgentStatus, ExecutionEntry, ExecutionLog};
pub use orchestrator::{
    simulate, CarryoverSnapshot, SimulationError, Simulator, SimulatorOptions,
};
pub use rng::{Distribution, RngManager};
pub use statistics::{Statistics, StatisticsError, WarningResult, WarningStatus};
