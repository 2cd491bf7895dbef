//! Replica: one thread's share of the simulated days
//!
//! A replica simulates a consecutive range of global days. Each day runs in
//! three steps:
//!
//! 1. [`Replica::init_day`]: reset the day state, schedule fresh calls,
//!    carried over callers, agent shift starts and the stop test guard
//! 2. the event loop: dispatch events until none are left
//! 3. [`Replica::terminate_clean_up`]: close agent days and per-day
//!    statistics
//!
//! After the last day [`Replica::final_terminate_clean_up`] hands the
//! statistics to the orchestrator.
//!
//! # Determinism
//!
//! Each day draws from `RngManager::for_day(seed, global day)`, so a day's
//! outcome does not depend on which replica simulates it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RunModel;
use crate::core::time::{seconds_to_ms, DAY_END_GUARD_MS, DAY_MS};
use crate::events::{EventContext, EventQueue, EventScheduler, SimEvent};
use crate::models::{AgentRecord, CallerRecord, ExecutionLog, RunState};
use crate::rng::RngManager;
use crate::statistics::Statistics;

/// Events past this time are dropped and the day is cut off.
pub const DAY_HORIZON_MS: i64 = 2 * DAY_MS;

/// Events processed between two progress updates.
const PROGRESS_BATCH: u64 = 4096;

/// Flags and counters shared between the orchestrator and its replicas.
#[derive(Debug, Default)]
pub struct RunControl {
    pub events: AtomicU64,
    pub days_done: AtomicU64,
    pub cancelled: AtomicBool,
    pub low_priority: AtomicBool,
}

impl RunControl {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// What a finished replica hands back.
#[derive(Debug)]
pub struct ReplicaOutput {
    pub index: usize,
    pub statistics: Statistics,
    pub log: Option<ExecutionLog>,
}

pub struct Replica {
    index: usize,
    run: Arc<RunModel>,
    first_day: u64,
    days: u64,
    state: RunState,
    stats: Statistics,
    queue: EventQueue,
    log: Option<ExecutionLog>,
    events: u64,
}

impl Replica {
    /// A replica simulating global days `first_day..first_day + days`.
    pub fn new(
        index: usize,
        run: Arc<RunModel>,
        first_day: u64,
        days: u64,
        execution_log: bool,
    ) -> Self {
        Self {
            index,
            state: RunState::new(&run),
            stats: Statistics::new(&run),
            run,
            first_day,
            days,
            queue: EventQueue::new(),
            log: execution_log.then(ExecutionLog::new),
            events: 0,
        }
    }

    pub fn first_day(&self) -> u64 {
        self.first_day
    }

    pub fn days(&self) -> u64 {
        self.days
    }

    /// Events processed so far.
    pub fn event_count(&self) -> u64 {
        self.events
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Prepares global day `day_global` and returns its generator.
    pub fn init_day(&mut self, day_global: u64) -> RngManager {
        let run = Arc::clone(&self.run);
        let mut rng = RngManager::for_day(run.seed, day_global);
        let day = day_global as usize;

        self.state.begin_day();
        self.queue.clear();

        for (caller_type, caller) in run.caller_types.iter().enumerate() {
            let mut count = caller.fresh_calls_mean.round() as i64;
            if caller.fresh_calls_std_dev > 0.0 {
                let drawn = caller.fresh_calls_mean + rng.standard_normal() * caller.fresh_calls_std_dev;
                count = drawn.round().max(0.0) as i64;
            }
            count += caller.additional_calls_by_day.get(day).copied().unwrap_or(0) as i64;
            for _ in 0..count {
                let at = seconds_to_ms(caller.arrival.sample(&mut rng));
                self.queue.schedule(at, SimEvent::FreshCall { caller_type });
            }

            for &at in caller.retries_by_day.get(day).into_iter().flatten() {
                let id = self.state.callers.allocate(CallerRecord::new(caller_type));
                self.queue.schedule(at, SimEvent::CallArrival { caller: id });
            }

            let waiting = caller.waiting_by_day.get(day).into_iter().flatten();
            let tolerance = caller.tolerance_by_day.get(day);
            for (i, &waited) in waiting.enumerate() {
                let mut record = CallerRecord::new(caller_type);
                record.initial_start_wait = Some(-waited);
                record.initial_rest_tolerance = tolerance
                    .and_then(|t| t.get(i).copied())
                    .filter(|rest| *rest > 0);
                let id = self.state.callers.allocate(record);
                self.queue.schedule(0, SimEvent::CallArrival { caller: id });
            }
        }

        if self.state.agents.is_empty() {
            let types = run.caller_types.len();
            for agent in &run.agents {
                self.state.agents.push(AgentRecord::new(agent, types));
                self.stats
                    .for_agent(agent.callcenter, agent.skill_level, |a| a.agent_count += 1);
            }
        } else {
            self.state.agents.iter_mut().for_each(AgentRecord::reinit);
        }
        for (i, agent) in run.agents.iter().enumerate() {
            self.queue
                .schedule(agent.start_ms, SimEvent::AgentReady { agent: i });
        }

        self.queue.schedule(DAY_END_GUARD_MS, SimEvent::StopTest);
        debug!(
            replica = self.index,
            day = day_global,
            events = self.queue.len(),
            "Day initialized"
        );
        rng
    }

    /// Simulates global day `day_global`. Returns `false` if the run was
    /// cancelled before the day finished.
    pub fn run_day(&mut self, day_global: u64, control: &RunControl) -> bool {
        let mut rng = self.init_day(day_global);
        let mut now = 0;
        let mut batch = 0;

        loop {
            let Some(next) = self.queue.peek_time() else {
                break;
            };
            if next > DAY_HORIZON_MS {
                warn!(
                    replica = self.index,
                    day = day_global,
                    pending = self.queue.len(),
                    "Day cut off with pending events"
                );
                break;
            }
            let Some((time, handle, event)) = self.queue.pop() else {
                break;
            };
            now = time;
            let mut ctx = EventContext {
                run: &self.run,
                state: &mut self.state,
                stats: &mut self.stats,
                queue: &mut self.queue,
                rng: &mut rng,
                log: self.log.as_mut(),
                day: day_global,
            };
            ctx.dispatch(time, handle, event);

            self.events += 1;
            batch += 1;
            if batch == PROGRESS_BATCH {
                control.events.fetch_add(batch, Ordering::Relaxed);
                batch = 0;
                if control.is_cancelled() {
                    return false;
                }
                if control.low_priority.load(Ordering::Relaxed) {
                    std::thread::yield_now();
                }
            }
        }
        control.events.fetch_add(batch, Ordering::Relaxed);

        self.terminate_clean_up(now, day_global, &mut rng);
        true
    }

    /// Closes the day: carries over callers still waiting, ends every agent's
    /// day and adds the day to the inter-day statistics.
    pub fn terminate_clean_up(&mut self, now: i64, day_global: u64, rng: &mut RngManager) {
        let now = now.max(DAY_MS);
        let mut ctx = EventContext {
            run: &self.run,
            state: &mut self.state,
            stats: &mut self.stats,
            queue: &mut self.queue,
            rng,
            log: self.log.as_mut(),
            day: day_global,
        };
        ctx.carry_over_remaining(now);
        self.queue.clear();

        self.state.done_day_all(now, &self.run, &mut self.stats);
        self.state.clear_free_agents();
        self.stats.update_inter_day_data();
    }

    /// Finishes the replica and hands over its statistics.
    pub fn final_terminate_clean_up(mut self) -> ReplicaOutput {
        self.stats.metadata.events = self.events;
        self.stats.finalize_sums();
        ReplicaOutput {
            index: self.index,
            statistics: self.stats,
            log: self.log,
        }
    }

    /// Simulates all days of the replica.
    pub fn run(mut self, control: &RunControl) -> ReplicaOutput {
        info!(
            replica = self.index,
            first_day = self.first_day,
            days = self.days,
            "Replica started"
        );
        for day in self.first_day..self.first_day + self.days {
            if control.is_cancelled() || !self.run_day(day, control) {
                info!(replica = self.index, day, "Replica cancelled");
                self.stats.usable = false;
                break;
            }
            control.days_done.fetch_add(1, Ordering::Relaxed);
        }
        info!(replica = self.index, events = self.events, "Replica finished");
        self.final_terminate_clean_up()
    }
}
