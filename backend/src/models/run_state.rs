//! Dynamic state of one replica day
//!
//! Holds the queues, the free agent list, the agent and caller records and
//! the queue length accounting, and implements the two matching directions:
//!
//! - [`RunState::find_agent_for_caller`]: a caller arrives or rechecks
//! - [`RunState::find_caller_for_agent`]: an agent becomes free
//!
//! # Critical Invariants
//!
//! 1. A caller is in at most one of: a waiting queue, an external list,
//!    in technical free time with an agent, in service
//! 2. An agent is in the free list only while `Idle`
//! 3. `queue_length` equals the sum of all queue lengths
//! 4. Ties in scoring go to the earliest candidate

use tracing::trace;

use super::agent::{AgentBooking, AgentRecord, AgentStatus};
use super::caller::{CallerId, CallerPool};
use crate::config::RunModel;
use crate::core::interval::{add_interval_parts, IntervalScratch};
use crate::core::time::DAY_MS;
use crate::events::types::{AgentId, EventScheduler, SimEvent};
use crate::statistics::Statistics;

/// Per-ms waiting scores smaller than this are ignored.
const SCORE_EPSILON: f64 = 1e-7;

/// Agents must score above this to take a caller.
const MIN_AGENT_SCORE: f64 = -1.0;

#[derive(Debug)]
pub struct RunState {
    pub callers: CallerPool,
    pub agents: Vec<AgentRecord>,

    queues: Vec<Vec<CallerId>>,
    external: Vec<Vec<CallerId>>,
    free_agents: Vec<AgentId>,

    queue_length: usize,
    /// Waiting callers that occupy a telephone line
    phone_queue_length: usize,
    last_queue_change: i64,
    last_queue_length: usize,

    /// Agents between shift start and shift end
    pub working_agents: i64,
    scratch: IntervalScratch,
    min_waiting_time_used: bool,
}

impl RunState {
    pub fn new(run: &RunModel) -> Self {
        let types = run.caller_types.len();
        Self {
            callers: CallerPool::new(CallerPool::capacity_for(run.fresh_calls_per_day())),
            agents: Vec::new(),
            queues: vec![Vec::new(); types],
            external: vec![Vec::new(); types],
            free_agents: Vec::new(),
            queue_length: 0,
            phone_queue_length: 0,
            last_queue_change: 0,
            last_queue_length: 0,
            working_agents: 0,
            scratch: IntervalScratch::new(),
            min_waiting_time_used: run.min_waiting_time_used,
        }
    }

    /// Clears everything that does not survive midnight.
    pub fn begin_day(&mut self) {
        self.callers.reset_for_day();
        self.queues.iter_mut().for_each(Vec::clear);
        self.external.iter_mut().for_each(Vec::clear);
        self.free_agents.clear();
        self.queue_length = 0;
        self.phone_queue_length = 0;
        self.last_queue_change = 0;
        self.last_queue_length = 0;
        self.working_agents = 0;
    }

    // ========================================================================
    // Queues
    // ========================================================================

    pub fn queue_length(&self) -> usize {
        self.queue_length
    }

    pub fn phone_queue_length(&self) -> usize {
        self.phone_queue_length
    }

    /// Waiting callers of one caller type, in arrival order.
    pub fn queued(&self, caller_type: usize) -> &[CallerId] {
        &self.queues[caller_type]
    }

    /// Callers of one caller type waiting for a retry.
    pub fn external(&self, caller_type: usize) -> &[CallerId] {
        &self.external[caller_type]
    }

    pub fn enqueue(&mut self, id: CallerId, now: i64, run: &RunModel, stats: &mut Statistics) {
        let Some(caller_type) = self.callers.get(id).map(|c| c.caller_type) else {
            return;
        };
        self.queues[caller_type].push(id);
        if run.caller_types[caller_type].blocks_line {
            self.phone_queue_length += 1;
        }
        self.queue_length += 1;
        self.queue_length_changed(now, stats);
    }

    /// Removes a caller from its waiting queue. Returns `false` if it was not
    /// queued.
    pub fn dequeue(&mut self, id: CallerId, now: i64, run: &RunModel, stats: &mut Statistics) -> bool {
        let Some(caller_type) = self.callers.get(id).map(|c| c.caller_type) else {
            return false;
        };
        let queue = &mut self.queues[caller_type];
        let Some(pos) = queue.iter().position(|c| *c == id) else {
            return false;
        };
        queue.remove(pos);
        if run.caller_types[caller_type].blocks_line {
            self.phone_queue_length -= 1;
        }
        self.queue_length -= 1;
        self.queue_length_changed(now, stats);
        true
    }

    pub fn add_external(&mut self, id: CallerId) {
        if let Some(caller_type) = self.callers.get(id).map(|c| c.caller_type) {
            self.external[caller_type].push(id);
        }
    }

    pub fn remove_external(&mut self, id: CallerId) -> bool {
        for list in self.external.iter_mut() {
            if let Some(pos) = list.iter().position(|c| *c == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    fn queue_length_changed(&mut self, now: i64, stats: &mut Statistics) {
        if now < self.last_queue_change {
            self.last_queue_change = now;
            self.last_queue_length = self.queue_length;
            return;
        }
        stats.observe_queue_length(self.queue_length as u64);
        let delta = now - self.last_queue_change;
        if self.last_queue_length != 0 && delta > 0 {
            let len = self.last_queue_length as f64;
            stats.mean_queue_length += len * delta as f64 / DAY_MS as f64;
            add_interval_parts(
                &mut stats.mean_queue_length_by_interval,
                self.last_queue_change,
                now,
                len,
            );
        }
        self.last_queue_length = self.queue_length;
        self.last_queue_change = now;
    }

    // ========================================================================
    // Agents
    // ========================================================================

    pub fn free_agents(&self) -> &[AgentId] {
        &self.free_agents
    }

    pub fn push_free_agent(&mut self, agent: AgentId) {
        self.free_agents.push(agent);
    }

    pub fn remove_free_agent(&mut self, agent: AgentId) -> bool {
        match self.free_agents.iter().position(|a| *a == agent) {
            Some(pos) => {
                self.free_agents.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear_free_agents(&mut self) {
        self.free_agents.clear();
    }

    /// Changes an agent's status and books the time spent in the old one.
    pub fn transition_agent(
        &mut self,
        agent: AgentId,
        now: i64,
        new_status: AgentStatus,
        caller_type: Option<usize>,
        run: &RunModel,
        stats: &mut Statistics,
    ) {
        let Self {
            agents,
            scratch,
            working_agents,
            ..
        } = self;
        let mut booking = AgentBooking {
            stats,
            scratch,
            working_agents,
        };
        if let Some(record) = agents.get_mut(agent) {
            record.transition(now, new_status, caller_type, &run.agents[agent], &mut booking);
        }
    }

    /// Closes the day of every agent.
    pub fn done_day_all(&mut self, now: i64, run: &RunModel, stats: &mut Statistics) {
        let Self {
            agents,
            scratch,
            working_agents,
            ..
        } = self;
        let mut booking = AgentBooking {
            stats,
            scratch,
            working_agents,
        };
        for (i, record) in agents.iter_mut().enumerate() {
            record.done_day(now, &run.agents[i], run.agent_costs_used, &mut booking);
        }
    }

    /// Whether any agent not yet past its shift can serve `caller_type`.
    pub fn caller_type_servable(&self, caller_type: usize, run: &RunModel) -> bool {
        self.agents.iter().any(|agent| {
            agent.status != AgentStatus::AfterShift
                && run.skill_levels[agent.skill_level].serves(caller_type)
        })
    }

    // ========================================================================
    // Matching
    // ========================================================================

    fn min_wait_blocks(&self, run: &RunModel, callcenter: usize, caller_type: usize, waited: i64) -> bool {
        if !self.min_waiting_time_used {
            return false;
        }
        matches!(
            run.callcenters[callcenter].min_waiting_ms.get(caller_type),
            Some(Some(min)) if *min > waited
        )
    }

    /// Looks for the best free agent for a caller and matches them.
    ///
    /// Score of a free agent: callcenter score + skill entry score, plus the
    /// callcenter's weights times the agent's free time part and idle time.
    /// The first agent with the strictly highest score above -1 wins.
    pub fn find_agent_for_caller<S: EventScheduler>(
        &mut self,
        now: i64,
        id: CallerId,
        caller_in_queue: bool,
        run: &RunModel,
        stats: &mut Statistics,
        scheduler: &mut S,
    ) -> Option<AgentId> {
        if self.free_agents.is_empty() {
            return None;
        }
        let caller = self.callers.get(id)?;
        let caller_type = caller.caller_type;
        let waited = now - caller.start_wait;

        let mut best: Option<(usize, f64)> = None;
        for (pos, &agent_id) in self.free_agents.iter().enumerate() {
            let agent = &self.agents[agent_id];
            let skill = &run.skill_levels[agent.skill_level];
            let Some(slot) = skill.slot_by_caller_type.get(caller_type).copied().flatten() else {
                continue;
            };
            if self.min_wait_blocks(run, agent.callcenter, caller_type, waited) {
                continue;
            }
            let callcenter = &run.callcenters[agent.callcenter];
            let mut score = callcenter.score + skill.entries[slot].score;
            if callcenter.agent_score_free_time_part != 0.0 {
                score += callcenter.agent_score_free_time_part * agent.free_time_part();
            }
            if callcenter.agent_score_free_time_since_last_call != 0.0 {
                score += callcenter.agent_score_free_time_since_last_call
                    * agent.free_time_since_last_call(now) as f64;
            }
            if score > best.map_or(MIN_AGENT_SCORE, |(_, s)| s) {
                best = Some((pos, score));
            }
        }

        let (pos, score) = best?;
        let agent = self.free_agents.remove(pos);
        trace!(agent, score, caller_type, "Agent found for caller");
        self.match_caller_agent(now, id, agent, caller_in_queue, run, stats, scheduler);
        Some(agent)
    }

    /// Looks for the best waiting caller for a free agent and matches them.
    ///
    /// Queues are scanned in caller type order. Score of a caller: type base
    /// score, plus the forwarding bonus, plus the per-ms score times its
    /// current waiting time.
    pub fn find_caller_for_agent<S: EventScheduler>(
        &mut self,
        now: i64,
        agent: AgentId,
        remove_from_free_list: bool,
        run: &RunModel,
        stats: &mut Statistics,
        scheduler: &mut S,
    ) -> Option<CallerId> {
        let record = self.agents.get(agent)?;
        let skill = &run.skill_levels[record.skill_level];

        let mut best: Option<(CallerId, f64)> = None;
        for (caller_type, queue) in self.queues.iter().enumerate() {
            if queue.is_empty() || !skill.serves(caller_type) {
                continue;
            }
            let config = &run.caller_types[caller_type];
            for &id in queue {
                let Some(caller) = self.callers.get(id) else {
                    continue;
                };
                let waited = now - caller.start_wait;
                if self.min_wait_blocks(run, record.callcenter, caller_type, waited) {
                    continue;
                }
                let mut score = config.score_base;
                if caller.continued {
                    score += config.score_continued;
                }
                if config.score_per_ms.abs() >= SCORE_EPSILON {
                    score += config.score_per_ms * waited as f64;
                }
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((id, score));
                }
            }
        }

        let (id, score) = best?;
        if remove_from_free_list {
            self.remove_free_agent(agent);
        }
        trace!(agent, score, "Caller found for agent");
        self.match_caller_agent(now, id, agent, true, run, stats, scheduler);
        Some(id)
    }

    /// Reserves `agent` for caller `id`: the agent enters technical free
    /// time and the service start is scheduled after it.
    #[allow(clippy::too_many_arguments)]
    fn match_caller_agent<S: EventScheduler>(
        &mut self,
        now: i64,
        id: CallerId,
        agent: AgentId,
        caller_in_queue: bool,
        run: &RunModel,
        stats: &mut Statistics,
        scheduler: &mut S,
    ) {
        if caller_in_queue {
            self.dequeue(id, now, run, stats);
        }
        let Some(caller_type) = self.callers.get(id).map(|c| c.caller_type) else {
            return;
        };
        self.transition_agent(
            agent,
            now,
            AgentStatus::TechnicalFreeTime,
            Some(caller_type),
            run,
            stats,
        );

        let callcenter = &run.callcenters[self.agents[agent].callcenter];
        let start = scheduler.schedule(
            now.saturating_add(callcenter.technical_free_time_ms),
            SimEvent::ServiceStart { caller: id, agent },
        );

        let Some(caller) = self.callers.get_mut(id) else {
            return;
        };
        caller.assigned = Some((start, agent));
        if !callcenter.technical_free_time_is_waiting_time {
            if let Some(cancel) = caller.cancel_event.take() {
                scheduler.cancel(cancel);
            }
        }
        for recheck in caller.recheck_events.drain(..) {
            scheduler.cancel(recheck);
        }
    }
}
