//! Simulation event types
//!
//! Every state change of a replica day is driven by one of the events
//! defined here. Events carry only ids; the state they act on lives in
//! [`RunState`](crate::models::RunState).
//!
//! # Event Kinds
//!
//! - **Caller**: fresh call, call arrival (retry, recall, carry-over),
//!   cancel, recheck
//! - **Agent**: ready, quit
//! - **Service**: start (end of technical free time), end (start of post
//!   processing)
//! - **Day end**: stop test guard

use serde::{Deserialize, Serialize};

use crate::models::caller::CallerId;

/// Index of an agent record in [`RunState`](crate::models::RunState).
pub type AgentId = usize;

/// Identifies a scheduled event for cancellation.
///
/// Handles are generation tagged: cancelling or querying a handle whose event
/// already ran is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventHandle {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

/// A scheduled simulation event.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// First call of a new client; the caller record is created on arrival
    FreshCall { caller_type: usize },

    /// Arrival of an existing caller record (retry, recall, carry-over)
    CallArrival { caller: CallerId },

    /// Waiting time tolerance exhausted
    CallCancel { caller: CallerId },

    /// Queued caller checks again for an agent after a minimum waiting time
    Recheck { caller: CallerId },

    /// Technical free time over, conversation begins
    ServiceStart { caller: CallerId, agent: AgentId },

    /// Conversation over, post processing begins
    ServiceEnd {
        caller: CallerId,
        agent: AgentId,
        wait_ms: i64,
        work_ms: i64,
    },

    /// Shift start or end of post processing
    AgentReady { agent: AgentId },

    /// Scheduled shift end
    AgentQuit { agent: AgentId },

    /// Runs the stop test once the day is over
    StopTest,
}

impl SimEvent {
    /// Short kind name used by the execution log.
    pub fn kind(&self) -> &'static str {
        match self {
            SimEvent::FreshCall { .. } => "FreshCall",
            SimEvent::CallArrival { .. } => "CallArrival",
            SimEvent::CallCancel { .. } => "CallCancel",
            SimEvent::Recheck { .. } => "Recheck",
            SimEvent::ServiceStart { .. } => "ServiceStart",
            SimEvent::ServiceEnd { .. } => "ServiceEnd",
            SimEvent::AgentReady { .. } => "AgentReady",
            SimEvent::AgentQuit { .. } => "AgentQuit",
            SimEvent::StopTest => "StopTest",
        }
    }

    /// Agent involved in the event, if any.
    pub fn agent(&self) -> Option<AgentId> {
        match self {
            SimEvent::ServiceStart { agent, .. }
            | SimEvent::ServiceEnd { agent, .. }
            | SimEvent::AgentReady { agent }
            | SimEvent::AgentQuit { agent } => Some(*agent),
            _ => None,
        }
    }

    /// Caller record involved in the event, if any.
    pub fn caller(&self) -> Option<CallerId> {
        match self {
            SimEvent::CallArrival { caller }
            | SimEvent::CallCancel { caller }
            | SimEvent::Recheck { caller }
            | SimEvent::ServiceStart { caller, .. }
            | SimEvent::ServiceEnd { caller, .. } => Some(*caller),
            _ => None,
        }
    }
}

/// Scheduling seam between the matching logic and the event kernel.
pub trait EventScheduler {
    /// Schedules `event` at absolute time `time_ms`.
    fn schedule(&mut self, time_ms: i64, event: SimEvent) -> EventHandle;

    /// Removes a pending event. Returns `false` if it is no longer pending.
    fn cancel(&mut self, handle: EventHandle) -> bool;

    /// Time of a pending event.
    fn scheduled_time(&self, handle: EventHandle) -> Option<i64>;
}
