//! Orchestrator - multi-threaded run control
//!
//! Splits the simulated days over replica threads, tracks their progress
//! and merges their statistics.
//!
//! See `engine.rs` for the run lifecycle.

pub mod carryover;
pub mod engine;
pub mod threads;

// Re-export main types for convenience
pub use carryover::{CallerTypeCarryover, CarryoverSnapshot};
pub use engine::{simulate, SimulationError, Simulator, SimulatorOptions};
pub use threads::{partition_days, plan_threads};
