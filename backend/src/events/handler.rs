//! Event handlers
//!
//! [`EventContext::dispatch`] applies one event to the state of a replica
//! day. All handlers share the same borrowed state: the run model, the
//! dynamic [`RunState`], the replica's [`Statistics`], the event kernel and
//! the day's random number generator.
//!
//! # Statistics Attribution
//!
//! Call statistics go to the caller's current type, client statistics to
//! the type of its first call. Both are also booked globally.
//!
//! # Day End
//!
//! Once the clock passes midnight every handler that may end a shift or add
//! a waiting caller runs the stop test: waiting and retrying callers of
//! types no remaining agent can serve are carried over into the next day.

use tracing::trace;

use super::kernel::EventQueue;
use super::types::{AgentId, EventHandle, EventScheduler, SimEvent};
use crate::config::{RunModel, RunSkillEntry};
use crate::core::time::{interval_index, seconds_to_ms, DAY_MS};
use crate::models::{AgentStatus, CallerId, CallerRecord, ExecutionEntry, ExecutionLog, RunState};
use crate::rng::RngManager;
use crate::statistics::Statistics;

/// Values of a caller record needed for statistics after the record may
/// have changed or been released.
#[derive(Debug, Clone, Copy)]
struct CallerSnapshot {
    caller_type: usize,
    client_type: usize,
    start_wait: i64,
    first_call_time: i64,
    retry_count: u32,
}

impl CallerSnapshot {
    fn of(record: &CallerRecord) -> Self {
        Self {
            caller_type: record.caller_type,
            client_type: record.client_type,
            start_wait: record.start_wait,
            first_call_time: record.first_call_time,
            retry_count: record.retry_count,
        }
    }

    /// Whole seconds since the start of waiting; waiting that started
    /// yesterday is counted across midnight.
    fn waited_seconds(&self, now: i64) -> i64 {
        let seconds = (now - self.start_wait) / 1000;
        if seconds < 0 {
            seconds + 86_400
        } else {
            seconds
        }
    }
}

fn skill_entry(run: &RunModel, skill_level: usize, caller_type: usize) -> Option<&RunSkillEntry> {
    let skill = run.skill_levels.get(skill_level)?;
    let slot = skill.slot_by_caller_type.get(caller_type).copied().flatten()?;
    skill.entries.get(slot)
}

/// Borrowed state of one replica day.
pub struct EventContext<'a> {
    pub run: &'a RunModel,
    pub state: &'a mut RunState,
    pub stats: &'a mut Statistics,
    pub queue: &'a mut EventQueue,
    pub rng: &'a mut RngManager,
    pub log: Option<&'a mut ExecutionLog>,
    /// Global day index
    pub day: u64,
}

impl EventContext<'_> {
    /// Applies one event at time `now`.
    pub fn dispatch(&mut self, now: i64, handle: EventHandle, event: SimEvent) {
        self.note(now, &event);
        match event {
            SimEvent::FreshCall { caller_type } => {
                let id = self.state.callers.allocate(CallerRecord::new(caller_type));
                self.on_call_arrival(now, id);
            }
            SimEvent::CallArrival { caller } => self.on_call_arrival(now, caller),
            SimEvent::CallCancel { caller } => self.on_call_cancel(now, caller),
            SimEvent::Recheck { caller } => self.on_recheck(now, caller, handle),
            SimEvent::ServiceStart { caller, agent } => self.on_service_start(now, caller, agent),
            SimEvent::ServiceEnd {
                caller,
                agent,
                wait_ms,
                work_ms,
            } => self.on_service_end(now, caller, agent, wait_ms, work_ms),
            SimEvent::AgentReady { agent } => self.on_agent_ready(now, agent),
            SimEvent::AgentQuit { agent } => self.on_agent_quit(now, agent),
            SimEvent::StopTest => self.stop_test(now),
        }
    }

    fn note(&mut self, now: i64, event: &SimEvent) {
        let Some(log) = self.log.as_deref_mut() else {
            return;
        };
        let caller_type = match event {
            SimEvent::FreshCall { caller_type } => Some(*caller_type),
            _ => event
                .caller()
                .and_then(|id| self.state.callers.get(id))
                .map(|c| c.caller_type),
        };
        log.log(ExecutionEntry {
            time_ms: now,
            day: self.day,
            kind: event.kind().to_string(),
            caller_type: caller_type.map(|t| self.run.caller_types[t].name.clone()),
            agent: event.agent(),
            message: format!("queue={}", self.state.queue_length()),
        });
    }

    // ========================================================================
    // Callers
    // ========================================================================

    fn on_call_arrival(&mut self, now: i64, id: CallerId) {
        let Some(caller) = self.state.callers.get_mut(id) else {
            trace!(?id, "Arrival of a released caller ignored");
            return;
        };
        caller.start_wait = caller.initial_start_wait.take().unwrap_or(now);
        let is_retry = caller.retry_count > 0;
        if is_retry {
            caller.retry_event = None;
            self.state.remove_external(id);
        } else {
            caller.first_call_time = now;
        }
        self.process_call(now, id);
    }

    /// Counts the call, checks for a blocked line, looks for an agent and
    /// otherwise queues the caller.
    fn process_call(&mut self, now: i64, id: CallerId) {
        let run = self.run;
        let Some(caller) = self.state.callers.get(id) else {
            return;
        };
        let snapshot = CallerSnapshot::of(caller);
        let new_client = caller.retry_count == 0 && !caller.continued && !caller.is_recall;

        let interval = interval_index(now);
        self.stats.for_caller(snapshot.caller_type, |s| {
            s.record_call(interval, snapshot.retry_count)
        });
        if new_client {
            self.stats
                .for_caller(snapshot.client_type, |s| s.record_new_client(interval));
        }
        if snapshot.retry_count == 1 {
            self.stats
                .for_caller(snapshot.client_type, |s| s.record_client_retry(interval));
        }

        let config = &run.caller_types[snapshot.caller_type];
        if config.blocks_line {
            if let Some(limit) = &run.max_queue_length {
                let lines = limit.limit(self.state.working_agents);
                if lines <= self.state.phone_queue_length() as f64 {
                    self.block_call(now, id, snapshot);
                    return;
                }
            }
        }

        let agent =
            self.state
                .find_agent_for_caller(now, id, false, run, self.stats, self.queue);
        self.build_events(now, id, agent);
        if agent.is_none() {
            self.state.enqueue(id, now, run, self.stats);
        }
        self.stop_test(now);
    }

    fn block_call(&mut self, now: i64, id: CallerId, snapshot: CallerSnapshot) {
        let config = &self.run.caller_types[snapshot.caller_type];
        let first = snapshot.retry_count == 0;
        let probability = if first {
            config.retry_probability_after_blocked_first
        } else {
            config.retry_probability_after_blocked
        };
        let retry = self.rng.chance(probability);

        let interval = interval_index(now);
        self.stats
            .for_caller(snapshot.caller_type, |s| s.record_call_blocked(interval));
        if retry {
            self.retry_call(now, id, first, true);
        } else {
            let interval = interval_index(snapshot.first_call_time);
            self.stats
                .for_caller(snapshot.client_type, |s| s.record_client_blocked(interval));
            self.state.callers.release(id);
        }
    }

    /// Schedules the cancel event and, for callers without an agent, the
    /// minimum waiting time rechecks.
    fn build_events(&mut self, now: i64, id: CallerId, agent: Option<AgentId>) {
        let run = self.run;
        let Some(caller) = self.state.callers.get_mut(id) else {
            return;
        };
        let config = &run.caller_types[caller.caller_type];

        let mut cancel_at = None;
        if let Some(tolerance) = &config.waiting_time_tolerance {
            let waiting_s = match caller.initial_rest_tolerance.take() {
                Some(rest_ms) => rest_ms as f64 / 1000.0,
                None => tolerance.sample(self.rng),
            };
            let needed = match agent {
                None => true,
                Some(agent) => {
                    let callcenter = &run.callcenters[self.state.agents[agent].callcenter];
                    callcenter.technical_free_time_is_waiting_time
                        && callcenter.technical_free_time_seconds > waiting_s
                }
            };
            if needed {
                let at = now.checked_add(seconds_to_ms(waiting_s)).unwrap_or(DAY_MS);
                let Some(caller) = self.state.callers.get_mut(id) else {
                    return;
                };
                caller.cancel_event = Some(self.queue.schedule(at, SimEvent::CallCancel { caller: id }));
                cancel_at = Some(at);
            }
        }

        if agent.is_some() || !run.min_waiting_time_used || config.recheck_times_ms.is_empty() {
            return;
        }
        let Some(caller) = self.state.callers.get_mut(id) else {
            return;
        };
        for &offset in &config.recheck_times_ms {
            let at = now.saturating_add(offset);
            if cancel_at.map_or(false, |cancel| at >= cancel) {
                continue;
            }
            caller
                .recheck_events
                .push(self.queue.schedule(at, SimEvent::Recheck { caller: id }));
        }
    }

    /// Sends a caller away to call again later, possibly as another type.
    fn retry_call(&mut self, now: i64, id: CallerId, first: bool, blocked: bool) {
        let run = self.run;
        let Some(caller) = self.state.callers.get_mut(id) else {
            return;
        };
        let config = &run.caller_types[caller.caller_type];
        let switch = match (first, blocked) {
            (true, true) => &config.retry_switch_after_blocked_first,
            (false, true) => &config.retry_switch_after_blocked,
            (true, false) => &config.retry_switch_after_give_up_first,
            (false, false) => &config.retry_switch_after_give_up,
        };
        if let Some(i) = self.rng.pick_by_rates(&switch.rates) {
            caller.caller_type = switch.targets[i];
        }
        let delay = seconds_to_ms(run.caller_types[caller.caller_type].retry_time.sample(self.rng));
        caller.retry_count += 1;
        caller.continued = false;
        caller.retry_event = Some(
            self.queue
                .schedule(now.saturating_add(delay), SimEvent::CallArrival { caller: id }),
        );
        self.state.add_external(id);
    }

    fn on_call_cancel(&mut self, now: i64, id: CallerId) {
        let run = self.run;
        let Some(caller) = self.state.callers.get_mut(id) else {
            trace!(?id, "Cancel of a released caller ignored");
            return;
        };
        caller.cancel_event = None;
        let assigned = caller.assigned.take();
        let rechecks: Vec<EventHandle> = caller.recheck_events.drain(..).collect();
        let snapshot = CallerSnapshot::of(caller);
        for recheck in rechecks {
            self.queue.cancel(recheck);
        }

        self.state.dequeue(id, now, run, self.stats);
        if let Some((start, agent)) = assigned {
            // Gave up during technical free time
            self.queue.cancel(start);
            self.state
                .transition_agent(agent, now, AgentStatus::Idle, None, run, self.stats);
            self.mark_agent_as_free(now, agent);
        }

        let config = &run.caller_types[snapshot.caller_type];
        let first = snapshot.retry_count == 0;
        let probability = if first {
            config.retry_probability_after_give_up_first
        } else {
            config.retry_probability_after_give_up
        };
        let retry = self.rng.chance(probability);
        self.log_give_up(now, snapshot, retry, false);
        if retry {
            self.retry_call(now, id, first, false);
        } else {
            self.state.callers.release(id);
        }
    }

    fn log_give_up(&mut self, now: i64, snapshot: CallerSnapshot, retry: bool, end_of_day: bool) {
        let seconds = snapshot.waited_seconds(now);
        let interval = interval_index(snapshot.start_wait);
        self.stats.for_caller(snapshot.caller_type, |s| {
            s.record_call_give_up(interval, seconds, end_of_day)
        });
        if end_of_day {
            self.stats
                .for_caller(snapshot.client_type, |s| s.record_client_carried_over());
        }
        if !retry {
            self.log_give_up_while_external(now, snapshot, 0, end_of_day);
        }
    }

    /// Final give-up of a client. At day end a pending retry (`planned_retry`
    /// ms after midnight) is carried into the next day instead.
    fn log_give_up_while_external(
        &mut self,
        now: i64,
        snapshot: CallerSnapshot,
        planned_retry: i64,
        end_of_day: bool,
    ) {
        if end_of_day {
            if planned_retry > 0 {
                self.stats
                    .for_caller(snapshot.client_type, |s| s.record_client_carried_over());
                self.stats
                    .for_caller(snapshot.caller_type, |s| s.push_next_day_retry(planned_retry));
            }
            return;
        }
        let seconds = snapshot.waited_seconds(now);
        let interval = interval_index(snapshot.first_call_time);
        self.stats.for_caller(snapshot.client_type, |s| {
            s.record_client_cancelled(interval, seconds)
        });
    }

    fn on_recheck(&mut self, now: i64, id: CallerId, handle: EventHandle) {
        let Some(caller) = self.state.callers.get_mut(id) else {
            return;
        };
        caller.recheck_events.retain(|h| *h != handle);
        self.state
            .find_agent_for_caller(now, id, true, self.run, self.stats, self.queue);
    }

    // ========================================================================
    // Service
    // ========================================================================

    fn on_service_start(&mut self, now: i64, id: CallerId, agent: AgentId) {
        let run = self.run;
        let Some(caller) = self.state.callers.get_mut(id) else {
            trace!(?id, "Service start of a released caller ignored");
            return;
        };
        caller.assigned = None;
        let cancel = caller.cancel_event.take();
        let snapshot = CallerSnapshot::of(caller);
        if let Some(cancel) = cancel {
            self.queue.cancel(cancel);
        }

        self.state.transition_agent(
            agent,
            now,
            AgentStatus::Service,
            Some(snapshot.caller_type),
            run,
            self.stats,
        );

        let interval = interval_index(now);
        let skill_level = self.state.agents[agent].skill_level;
        let work_ms = skill_entry(run, skill_level, snapshot.caller_type)
            .map(|entry| seconds_to_ms(entry.working_time_at(interval).sample(self.rng)))
            .unwrap_or(0);
        let wait_ms = now - snapshot.start_wait;
        let service_level = run.caller_types[snapshot.caller_type].service_level_seconds;
        let wait_interval = interval_index(snapshot.start_wait);
        self.stats.for_caller(snapshot.caller_type, |s| {
            s.record_service_start(wait_interval, wait_ms, wait_ms.saturating_add(work_ms), service_level)
        });

        self.queue.schedule(
            now.saturating_add(work_ms),
            SimEvent::ServiceEnd {
                caller: id,
                agent,
                wait_ms,
                work_ms,
            },
        );
    }

    fn on_service_end(&mut self, now: i64, id: CallerId, agent: AgentId, wait_ms: i64, work_ms: i64) {
        let run = self.run;
        let Some(snapshot) = self.state.callers.get(id).map(CallerSnapshot::of) else {
            trace!(?id, "Service end of a released caller ignored");
            return;
        };
        let caller_type = snapshot.caller_type;

        self.state
            .transition_agent(agent, now, AgentStatus::PostProcessing, None, run, self.stats);
        let skill_level = self.state.agents[agent].skill_level;
        let interval = interval_index(now);
        let post_ms = skill_entry(run, skill_level, caller_type)
            .map(|entry| seconds_to_ms(entry.post_processing_time_at(interval).sample(self.rng)))
            .unwrap_or(0);
        self.queue
            .schedule(now.saturating_add(post_ms), SimEvent::AgentReady { agent });

        let config = &run.caller_types[caller_type];
        let continue_rule = config.continue_rule_for(skill_level);
        let forwarded = self.rng.chance(
            continue_rule.map_or(config.continue_probability, |r| r.probability),
        );
        self.log_call_done(id, wait_ms, work_ms, forwarded);

        if forwarded {
            self.log_call_continue(snapshot, id);
            let switch = continue_rule.map_or(&config.continue_switch, |r| &r.switch);
            let target = self.rng.pick_by_rates(&switch.rates).map(|i| switch.targets[i]);
            if let Some(caller) = self.state.callers.get_mut(id) {
                caller.start_wait = now;
                caller.continued = true;
                if let Some(target) = target {
                    caller.caller_type = target;
                }
            }
            self.process_call(now, id);
            return;
        }

        let recall_rule = config.recall_rule_for(skill_level);
        let recall = self.rng.chance(
            recall_rule.map_or(config.recall_probability, |r| r.probability),
        );
        if recall {
            let switch = recall_rule.map_or(&config.recall_switch, |r| &r.switch);
            let target = self
                .rng
                .pick_by_rates(&switch.rates)
                .map(|i| switch.targets[i])
                .unwrap_or(caller_type);
            self.schedule_recall(now, caller_type, target);
        }
        self.state.callers.release(id);
    }

    fn log_call_done(&mut self, id: CallerId, wait_ms: i64, work_ms: i64, forwarded: bool) {
        let run = self.run;
        let Some(caller) = self.state.callers.get_mut(id) else {
            return;
        };
        let stay_ms = wait_ms.saturating_add(work_ms);
        if forwarded {
            caller.carried_waiting_s = caller.carried_waiting_s.saturating_add(wait_ms / 1000);
            caller.carried_staying_s = caller.carried_staying_s.saturating_add(stay_ms / 1000);
            return;
        }
        let waited = caller.carried_waiting_s.saturating_mul(1000).saturating_add(wait_ms);
        let stayed = caller.carried_staying_s.saturating_mul(1000).saturating_add(stay_ms);
        let interval = interval_index(caller.first_call_time);
        let service_level = run.caller_types[caller.caller_type].service_level_seconds;
        let client_type = caller.client_type;
        self.stats.for_caller(client_type, |s| {
            s.record_client_done(interval, waited, stayed, service_level)
        });
    }

    fn log_call_continue(&mut self, snapshot: CallerSnapshot, id: CallerId) {
        let interval = interval_index(snapshot.start_wait);
        self.stats
            .for_caller(snapshot.caller_type, |s| s.record_call_forwarded(interval));
        let first_forwarding = self
            .state
            .callers
            .get(id)
            .map_or(false, |c| !c.continued);
        if first_forwarding {
            let interval = interval_index(snapshot.first_call_time);
            self.stats
                .for_caller(snapshot.client_type, |s| s.record_client_forwarded(interval));
        }
    }

    /// Starts a new client of `target` type after the recall delay of
    /// `origin`.
    fn schedule_recall(&mut self, now: i64, origin: usize, target: usize) {
        let delay = seconds_to_ms(self.run.caller_types[origin].recall_time.sample(self.rng));
        let at = now.saturating_add(delay);
        let mut record = CallerRecord::new(target);
        record.is_recall = true;
        let id = self.state.callers.allocate(record);
        self.queue.schedule(at, SimEvent::CallArrival { caller: id });
        let interval = interval_index(at);
        self.stats.for_caller(target, |s| s.record_recall(interval));
    }

    // ========================================================================
    // Agents
    // ========================================================================

    fn on_agent_ready(&mut self, now: i64, agent: AgentId) {
        let run = self.run;
        let Some(status) = self.state.agents.get(agent).map(|a| a.status) else {
            return;
        };
        self.state
            .transition_agent(agent, now, AgentStatus::Idle, None, run, self.stats);
        if status == AgentStatus::BeforeShift {
            if let Some(end) = run.agents[agent].end_ms {
                self.queue.schedule(end, SimEvent::AgentQuit { agent });
            }
        }
        self.mark_agent_as_free(now, agent);
    }

    /// An idle agent looks for a waiting caller, or joins the free list, or
    /// ends its shift if it is already over.
    fn mark_agent_as_free(&mut self, now: i64, agent: AgentId) {
        let run = self.run;
        if run.agents[agent].end_ms.map_or(false, |end| end < now) {
            self.state
                .transition_agent(agent, now, AgentStatus::AfterShift, None, run, self.stats);
            self.stop_test(now);
            return;
        }
        let found = self
            .state
            .find_caller_for_agent(now, agent, false, run, self.stats, self.queue);
        if found.is_none() {
            self.state.push_free_agent(agent);
        }
    }

    fn on_agent_quit(&mut self, now: i64, agent: AgentId) {
        let run = self.run;
        if self.state.agents.get(agent).map(|a| a.status) != Some(AgentStatus::Idle) {
            return;
        }
        self.state.remove_free_agent(agent);
        self.state
            .transition_agent(agent, now, AgentStatus::AfterShift, None, run, self.stats);
        self.stop_test(now);
    }

    // ========================================================================
    // Day end
    // ========================================================================

    /// After midnight, carries over all waiting and retrying callers of types
    /// that no agent still on shift can serve.
    pub fn stop_test(&mut self, now: i64) {
        if now <= DAY_MS {
            return;
        }
        let run = self.run;
        let lost: Vec<usize> = (0..run.caller_types.len())
            .filter(|&t| !self.state.caller_type_servable(t, run))
            .collect();
        if lost.is_empty() {
            return;
        }
        for &caller_type in &lost {
            let waiting = self.state.queued(caller_type).to_vec();
            for id in waiting {
                self.carry_over_waiting(now, id);
            }
        }
        for &caller_type in &lost {
            let retrying = self.state.external(caller_type).to_vec();
            for id in retrying {
                self.carry_over_external(now, id);
            }
        }
    }

    /// Carries over every caller still waiting or retrying, regardless of
    /// agents. Used when a day is cut off.
    pub fn carry_over_remaining(&mut self, now: i64) {
        for caller_type in 0..self.run.caller_types.len() {
            let waiting = self.state.queued(caller_type).to_vec();
            for id in waiting {
                self.carry_over_waiting(now, id);
            }
            let retrying = self.state.external(caller_type).to_vec();
            for id in retrying {
                self.carry_over_external(now, id);
            }
        }
    }

    fn carry_over_waiting(&mut self, now: i64, id: CallerId) {
        let run = self.run;
        let Some(caller) = self.state.callers.get_mut(id) else {
            return;
        };
        let snapshot = CallerSnapshot::of(caller);
        let cancel = caller.cancel_event.take();
        let rechecks: Vec<EventHandle> = caller.recheck_events.drain(..).collect();

        let rest = cancel
            .and_then(|h| self.queue.scheduled_time(h))
            .map_or(0, |at| at - now);
        let waited = now - snapshot.start_wait;
        self.stats.for_caller(snapshot.caller_type, |s| {
            s.push_next_day_waiting(waited, rest)
        });

        self.state.dequeue(id, now, run, self.stats);
        if let Some(cancel) = cancel {
            self.queue.cancel(cancel);
        }
        for recheck in rechecks {
            self.queue.cancel(recheck);
        }
        self.log_give_up(now, snapshot, false, true);
        self.state.callers.release(id);
    }

    fn carry_over_external(&mut self, now: i64, id: CallerId) {
        self.state.remove_external(id);
        let Some(caller) = self.state.callers.get_mut(id) else {
            return;
        };
        let snapshot = CallerSnapshot::of(caller);
        if let Some(retry) = caller.retry_event.take() {
            let planned = self
                .queue
                .scheduled_time(retry)
                .map_or(0, |at| at - DAY_MS);
            self.log_give_up_while_external(now, snapshot, planned, true);
            self.queue.cancel(retry);
        }
        self.state.callers.release(id);
    }
}
