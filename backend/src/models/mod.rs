//! Dynamic simulation state: caller and agent records, queues, execution log

pub mod agent;
pub mod caller;
pub mod event;
pub mod run_state;

// Re-exports
pub use agent::{AgentBooking, AgentRecord, AgentStatus};
pub use caller::{CallerId, CallerPool, CallerRecord};
pub use event::{ExecutionEntry, ExecutionLog};
pub use run_state::RunState;
