//! Caller records and their pool
//!
//! A caller record follows one client through all of its calls of a day:
//! retries keep the record, forwarding keeps it, a recall starts a new one.
//!
//! Records are recycled through [`CallerPool`]. Ids carry a generation so an
//! event that outlives its record (a stale id) finds nothing instead of a
//! recycled stranger.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::events::types::{AgentId, EventHandle};

/// Id of a pooled caller record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId {
    index: u32,
    generation: u32,
}

impl CallerId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Dynamic state of one client.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerRecord {
    /// Caller type of the first call; client statistics go here
    pub client_type: usize,
    /// Current caller type; call statistics go here
    pub caller_type: usize,

    /// Start of the current waiting period (ms, may be negative for callers
    /// carried over from yesterday)
    pub start_wait: i64,
    pub first_call_time: i64,
    pub retry_count: u32,
    /// Set after a forwarding until the next retry
    pub continued: bool,
    pub is_recall: bool,

    pub cancel_event: Option<EventHandle>,
    pub recheck_events: Vec<EventHandle>,
    pub retry_event: Option<EventHandle>,
    /// Pending service start and the agent reserved for it
    pub assigned: Option<(EventHandle, AgentId)>,

    /// Start of waiting for callers carried over from yesterday
    pub initial_start_wait: Option<i64>,
    /// Remaining waiting time tolerance (ms) carried over from yesterday
    pub initial_rest_tolerance: Option<i64>,

    /// Waiting and stay seconds of earlier forwarded legs
    pub carried_waiting_s: i64,
    pub carried_staying_s: i64,
}

impl CallerRecord {
    pub fn new(caller_type: usize) -> Self {
        Self {
            client_type: caller_type,
            caller_type,
            start_wait: 0,
            first_call_time: 0,
            retry_count: 0,
            continued: false,
            is_recall: false,
            cancel_event: None,
            recheck_events: Vec::new(),
            retry_event: None,
            assigned: None,
            initial_start_wait: None,
            initial_rest_tolerance: None,
            carried_waiting_s: 0,
            carried_staying_s: 0,
        }
    }
}

#[derive(Debug)]
struct PoolSlot {
    generation: u32,
    record: Option<CallerRecord>,
}

/// Recycling store for caller records.
#[derive(Debug)]
pub struct CallerPool {
    slots: Vec<PoolSlot>,
    free: Vec<u32>,
    /// Upper bound of the free list; further releases wait for the next
    /// day reset
    free_limit: usize,
    live: usize,
}

impl CallerPool {
    /// `max(1024, min(8192, expected fresh calls per day))`
    pub fn capacity_for(fresh_calls_per_day: f64) -> usize {
        (fresh_calls_per_day.max(0.0) as usize).min(8192).max(1024)
    }

    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            free_limit: capacity,
            live: 0,
        }
    }

    /// Stores `record` and returns its id.
    pub fn allocate(&mut self, record: CallerRecord) -> CallerId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            return CallerId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(PoolSlot {
            generation: 0,
            record: Some(record),
        });
        CallerId {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    pub fn get(&self, id: CallerId) -> Option<&CallerRecord> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.record.as_ref())
    }

    pub fn get_mut(&mut self, id: CallerId) -> Option<&mut CallerRecord> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.record.as_mut())
    }

    /// Returns a record to the pool. Releasing a stale id does nothing.
    pub fn release(&mut self, id: CallerId) -> bool {
        let Some(slot) = self
            .slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation && s.record.is_some())
        else {
            return false;
        };
        slot.record = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        if self.free.len() < self.free_limit {
            self.free.push(id.index);
        } else {
            trace!(index = id.index, "Caller pool free list full");
        }
        true
    }

    /// Reclaims every record at the start of a day.
    pub fn reset_for_day(&mut self) {
        self.free.clear();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.record.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(i as u32);
        }
        // Lowest indices are handed out first
        self.free.reverse();
        self.live = 0;
    }

    /// Records currently in use.
    pub fn live(&self) -> usize {
        self.live
    }
}
