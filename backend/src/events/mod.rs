//! Discrete-event machinery
//!
//! - [`kernel`]: time-ordered event queue with cancellable handles
//! - [`types`]: event kinds and the scheduling trait
//! - [`handler`]: what each event does to a replica day

pub mod handler;
pub mod kernel;
pub mod types;

pub use handler::EventContext;
pub use kernel::EventQueue;
pub use types::{AgentId, EventHandle, EventScheduler, SimEvent};
