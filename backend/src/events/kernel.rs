//! Event kernel
//!
//! A time-ordered queue with O(log n) insertion and removal of the earliest
//! event. Events at equal times run in scheduling order.
//!
//! Cancelled events stay in the heap until they surface; their slot
//! generation no longer matches and [`EventQueue::pop`] skips them.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::types::{EventHandle, EventScheduler, SimEvent};

#[derive(Debug)]
struct Slot {
    generation: u32,
    time_ms: i64,
    event: Option<SimEvent>,
}

/// Pending events of one replica day.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<(i64, u64, u32, u32)>>,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    next_seq: u64,
    pending: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the earliest pending event.
    pub fn pop(&mut self) -> Option<(i64, EventHandle, SimEvent)> {
        while let Some(Reverse((time_ms, _, slot, generation))) = self.heap.pop() {
            let entry = &mut self.slots[slot as usize];
            if entry.generation != generation {
                continue;
            }
            let Some(event) = entry.event.take() else {
                continue;
            };
            entry.generation = entry.generation.wrapping_add(1);
            self.free_slots.push(slot);
            self.pending -= 1;
            return Some((time_ms, EventHandle { slot, generation }, event));
        }
        None
    }

    /// Time of the earliest pending event.
    pub fn peek_time(&mut self) -> Option<i64> {
        while let Some(Reverse((time_ms, _, slot, generation))) = self.heap.peek().copied() {
            if self.slots[slot as usize].generation == generation {
                return Some(time_ms);
            }
            self.heap.pop();
        }
        None
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.slots
            .get(handle.slot as usize)
            .map(|s| s.generation == handle.generation && s.event.is_some())
            .unwrap_or(false)
    }

    /// Number of pending (not cancelled) events.
    pub fn len(&self) -> usize {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// Drops every pending event.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.free_slots.clear();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.generation = slot.generation.wrapping_add(1);
            slot.event = None;
            self.free_slots.push(i as u32);
        }
        self.pending = 0;
    }
}

impl EventScheduler for EventQueue {
    fn schedule(&mut self, time_ms: i64, event: SimEvent) -> EventHandle {
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.time_ms = time_ms;
                entry.event = Some(event);
                slot
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    time_ms,
                    event: Some(event),
                });
                (self.slots.len() - 1) as u32
            }
        };
        let generation = self.slots[slot as usize].generation;
        self.heap
            .push(Reverse((time_ms, self.next_seq, slot, generation)));
        self.next_seq += 1;
        self.pending += 1;
        EventHandle { slot, generation }
    }

    fn cancel(&mut self, handle: EventHandle) -> bool {
        if !self.is_pending(handle) {
            return false;
        }
        let entry = &mut self.slots[handle.slot as usize];
        entry.event = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free_slots.push(handle.slot);
        self.pending -= 1;
        true
    }

    fn scheduled_time(&self, handle: EventHandle) -> Option<i64> {
        if self.is_pending(handle) {
            Some(self.slots[handle.slot as usize].time_ms)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_time_then_insertion_order() {
        let mut queue = EventQueue::new();
        queue.schedule(20, SimEvent::AgentReady { agent: 2 });
        queue.schedule(10, SimEvent::AgentReady { agent: 0 });
        queue.schedule(10, SimEvent::AgentReady { agent: 1 });

        let order: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|(t, _, e)| (t, e.agent().unwrap()))
            .collect();
        assert_eq!(order, vec![(10, 0), (10, 1), (20, 2)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cancelled_event_never_runs() {
        let mut queue = EventQueue::new();
        let a = queue.schedule(5, SimEvent::StopTest);
        queue.schedule(7, SimEvent::AgentQuit { agent: 3 });
        assert_eq!(queue.scheduled_time(a), Some(5));
        assert!(queue.cancel(a));
        assert!(!queue.cancel(a));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_time(), Some(7));
        let (t, _, event) = queue.pop().unwrap();
        assert_eq!(t, 7);
        assert_eq!(event, SimEvent::AgentQuit { agent: 3 });
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_reused_slot_does_not_revive_old_handle() {
        let mut queue = EventQueue::new();
        let old = queue.schedule(1, SimEvent::StopTest);
        queue.pop();
        let new = queue.schedule(2, SimEvent::StopTest);
        assert_eq!(old.slot, new.slot);
        assert!(!queue.is_pending(old));
        assert!(!queue.cancel(old));
        assert!(queue.is_pending(new));
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut queue = EventQueue::new();
        let h = queue.schedule(1, SimEvent::StopTest);
        queue.schedule(2, SimEvent::StopTest);
        queue.clear();
        assert!(queue.is_empty());
        assert!(!queue.is_pending(h));
        assert!(queue.pop().is_none());
    }
}
