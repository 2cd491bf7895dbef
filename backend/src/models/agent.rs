//! Agent records
//!
//! One record per staffed shift instance. Each status change books the time
//! spent in the old status into the day totals of the record and, split into
//! half-hour parts, into the agent statistics of the global, callcenter and
//! skill level groups.
//!
//! # Status Machine
//!
//! ```text
//! BeforeShift -> Idle -> TechnicalFreeTime -> Service -> PostProcessing -> Idle
//!                  |             |
//!                  |             +-> Idle (caller gave up)
//!                  +-> AfterShift
//! ```

use serde::{Deserialize, Serialize};

use crate::config::RunAgent;
use crate::core::interval::{interval_parts_without_div, IntervalScratch};
use crate::core::time::{interval_index, DAY_MS};
use crate::statistics::{AgentDayTotals, AgentTime, Statistics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    BeforeShift,
    Idle,
    TechnicalFreeTime,
    Service,
    PostProcessing,
    AfterShift,
}

impl AgentStatus {
    fn busy_time(self) -> Option<AgentTime> {
        match self {
            AgentStatus::TechnicalFreeTime => Some(AgentTime::Technical),
            AgentStatus::Service => Some(AgentTime::Service),
            AgentStatus::PostProcessing => Some(AgentTime::PostProcessing),
            _ => None,
        }
    }
}

/// Mutable state shared by all agent records of a replica.
pub struct AgentBooking<'a> {
    pub stats: &'a mut Statistics,
    pub scratch: &'a mut IntervalScratch,
    pub working_agents: &'a mut i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentRecord {
    pub callcenter: usize,
    pub skill_level: usize,
    pub status: AgentStatus,
    /// Caller type of the current or last conversation
    pub caller_type: Option<usize>,
    pub last_change: i64,
    pub day: AgentDayTotals,
}

impl AgentRecord {
    pub fn new(config: &RunAgent, caller_types: usize) -> Self {
        Self {
            callcenter: config.callcenter,
            skill_level: config.skill_level,
            status: AgentStatus::BeforeShift,
            caller_type: None,
            last_change: 0,
            day: AgentDayTotals::new(caller_types),
        }
    }

    /// Prepares the record for another day.
    pub fn reinit(&mut self) {
        self.status = AgentStatus::BeforeShift;
        self.caller_type = None;
        self.last_change = 0;
        self.day.reset();
    }

    /// Leaves the current status at `now` and enters `new_status`.
    ///
    /// `caller_type` is taken over when entering technical free time or
    /// service.
    pub fn transition(
        &mut self,
        now: i64,
        new_status: AgentStatus,
        caller_type: Option<usize>,
        config: &RunAgent,
        booking: &mut AgentBooking<'_>,
    ) {
        let mut time = now;
        match self.status {
            AgentStatus::BeforeShift => *booking.working_agents += 1,
            AgentStatus::Idle => {
                time = now.min(DAY_MS).max(self.last_change);
                let delta = time - self.last_change;
                if delta > 0 {
                    self.day.idle += delta;
                    self.book_parts(AgentTime::Idle, time, booking);
                }
            }
            AgentStatus::AfterShift => {}
            busy => {
                let delta = now - self.last_change;
                if let Some(kind) = busy.busy_time() {
                    self.book_busy(kind, delta);
                    if delta > 0 {
                        self.book_parts(kind, now, booking);
                    }
                }
                if busy == AgentStatus::Service {
                    self.count_call(now, config, booking);
                }
            }
        }

        if new_status == AgentStatus::AfterShift && self.status != AgentStatus::AfterShift {
            *booking.working_agents -= 1;
        }
        if matches!(
            new_status,
            AgentStatus::TechnicalFreeTime | AgentStatus::Service
        ) {
            self.caller_type = caller_type;
        }
        self.last_change = time;
        self.status = new_status;
    }

    fn book_busy(&mut self, kind: AgentTime, delta: i64) {
        let by_caller = self.caller_type;
        let (total, per_caller) = match kind {
            AgentTime::Technical => (&mut self.day.technical, &mut self.day.technical_by_caller),
            AgentTime::Service => (&mut self.day.service, &mut self.day.service_by_caller),
            AgentTime::PostProcessing => (
                &mut self.day.post_processing,
                &mut self.day.post_processing_by_caller,
            ),
            AgentTime::Idle => return,
        };
        *total += delta;
        if delta > 0 {
            if let Some(slot) = by_caller.and_then(|c| per_caller.get_mut(c)) {
                *slot += delta;
            }
        }
    }

    fn book_parts(&self, kind: AgentTime, until: i64, booking: &mut AgentBooking<'_>) {
        let Some(range) = interval_parts_without_div(booking.scratch, self.last_change, until)
        else {
            return;
        };
        let caller_type = self.caller_type;
        let scratch = &*booking.scratch;
        booking
            .stats
            .for_agent(self.callcenter, self.skill_level, |agents| {
                agents.add_time_parts(kind, caller_type, scratch, range)
            });
    }

    fn count_call(&mut self, now: i64, config: &RunAgent, booking: &mut AgentBooking<'_>) {
        self.day.calls += 1;
        let Some(caller_type) = self.caller_type else {
            return;
        };
        let interval = interval_index(now);
        let cost = config.cost_per_call.get(caller_type).copied().unwrap_or(0.0);
        booking
            .stats
            .for_agent(self.callcenter, self.skill_level, |agents| {
                agents.count_call(caller_type, interval, cost)
            });
    }

    /// Closes the agent's day: leaves any open status and adds the day totals
    /// and costs to the statistics.
    pub fn done_day(
        &mut self,
        now: i64,
        config: &RunAgent,
        agent_costs_used: bool,
        booking: &mut AgentBooking<'_>,
    ) {
        if self.status != AgentStatus::AfterShift {
            let time = now.min(DAY_MS).max(self.last_change);
            self.transition(time, AgentStatus::AfterShift, None, config, booking);
        }

        let day = &self.day;
        booking
            .stats
            .for_agent(self.callcenter, self.skill_level, |agents| agents.add_day(day));

        if agent_costs_used {
            let mut office = 0.0;
            if config.cost_per_working_hour > 0.0 {
                office = day.present() as f64 / 1000.0 / 3600.0 * config.cost_per_working_hour;
            }
            let mut process = 0.0;
            for (i, per_minute) in config.cost_per_call_minute.iter().enumerate() {
                if *per_minute <= 0.0 {
                    continue;
                }
                let busy = day.technical_by_caller.get(i).copied().unwrap_or(0)
                    + day.service_by_caller.get(i).copied().unwrap_or(0)
                    + day.post_processing_by_caller.get(i).copied().unwrap_or(0);
                process += busy as f64 / 1000.0 / 60.0 * per_minute;
            }
            booking
                .stats
                .for_agent(self.callcenter, self.skill_level, |agents| {
                    agents.add_costs(office, process)
                });
        }
    }

    /// `(idle + technical) / present` of the running day.
    pub fn free_time_part(&self) -> f64 {
        let free = self.day.idle + self.day.technical;
        if free == 0 {
            return 0.0;
        }
        free as f64 / self.day.present() as f64
    }

    /// Milliseconds since the agent became idle; 0 while busy.
    pub fn free_time_since_last_call(&self, now: i64) -> i64 {
        if self.status == AgentStatus::Idle {
            now - self.last_change
        } else {
            0
        }
    }
}
