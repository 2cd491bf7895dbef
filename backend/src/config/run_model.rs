//! Validated run model
//!
//! [`RunModel::new`] checks a [`CallcenterModel`] for consistency and
//! resolves every name reference to an index. Inactive caller types,
//! callcenters and agent groups are left out. Agent groups are expanded into
//! one [`RunAgent`] per staffed agent so the simulation can create exactly
//! one agent record per shift instance.

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use super::fingerprint::compute_fingerprint;
use super::model::{
    CallcenterModel, QueueLimit, SkillForwarding, TypeRate, WarningRule,
};
use crate::core::time::{seconds_to_ms, INTERVAL_COUNT};
use crate::rng::Distribution;

/// Consistency failures of a model. Each message names the failing check and
/// the entity it concerns.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Model must simulate at least one day")]
    NoDays,

    #[error("Model has no active caller type")]
    NoCallerTypes,

    #[error("Model has no active callcenter")]
    NoCallcenters,

    #[error("Model has no skill level")]
    NoSkillLevels,

    #[error("Model has no active agent group in any callcenter")]
    NoAgentGroups,

    #[error("Model generates no calls: the fresh call means of all caller types are zero")]
    NoCalls,

    #[error("Duplicate {kind} name \"{name}\"")]
    DuplicateName { kind: String, name: String },

    #[error("{context}: unknown or inactive caller type \"{name}\"")]
    UnknownCallerType { context: String, name: String },

    #[error("{context}: unknown skill level \"{name}\"")]
    UnknownSkillLevel { context: String, name: String },

    #[error("Skill level \"{skill_level}\" has no entry for any active caller type")]
    SkillWithoutCallerTypes { skill_level: String },

    #[error("Skill level \"{skill_level}\" lists caller type \"{caller_type}\" twice")]
    DuplicateSkillEntry {
        skill_level: String,
        caller_type: String,
    },

    #[error("{context}: invalid distribution: {reason}")]
    InvalidDistribution { context: String, reason: String },

    #[error("{context}: {reason}")]
    InvalidValue { context: String, reason: String },

    #[error("Caller type \"{caller_type}\" has calls but an empty arrival distribution")]
    EmptyArrivalProfile { caller_type: String },

    #[error("Callcenter \"{callcenter}\", agent group {group}: shift end {end}s is before start {start}s")]
    InvalidShift {
        callcenter: String,
        group: usize,
        start: u32,
        end: u32,
    },

    #[error("{context}: expected 48 interval values, got {len}")]
    IntervalTableLength { context: String, len: usize },

    #[error("Model serialization failed: {0}")]
    Serialization(String),
}

// ============================================================================
// Resolved model types
// ============================================================================

/// A resolved caller-type switch: pick `targets[i]` by cumulative `rates`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeSwitch {
    pub targets: Vec<usize>,
    pub rates: Vec<f64>,
}

impl TypeSwitch {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Forwarding/recall rule bound to one skill level.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillSwitch {
    pub skill_level: usize,
    pub probability: f64,
    pub switch: TypeSwitch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunCallerType {
    pub name: String,
    pub index: usize,
    pub fresh_calls_mean: f64,
    pub fresh_calls_std_dev: f64,
    pub arrival: Distribution,
    pub score_base: f64,
    /// Score per millisecond of waiting
    pub score_per_ms: f64,
    pub score_continued: f64,
    pub blocks_line: bool,
    pub service_level_seconds: i64,
    pub waiting_time_tolerance: Option<Distribution>,
    pub retry_time: Distribution,
    pub retry_probability_after_blocked_first: f64,
    pub retry_probability_after_blocked: f64,
    pub retry_probability_after_give_up_first: f64,
    pub retry_probability_after_give_up: f64,
    pub retry_switch_after_blocked_first: TypeSwitch,
    pub retry_switch_after_blocked: TypeSwitch,
    pub retry_switch_after_give_up_first: TypeSwitch,
    pub retry_switch_after_give_up: TypeSwitch,
    pub continue_probability: f64,
    pub continue_switch: TypeSwitch,
    pub continue_by_skill: Vec<SkillSwitch>,
    pub recall_probability: f64,
    pub recall_time: Distribution,
    pub recall_switch: TypeSwitch,
    pub recall_by_skill: Vec<SkillSwitch>,
    pub revenue_per_client: f64,
    pub cost_per_waiting_second: f64,
    pub cost_per_cancel: f64,
    pub additional_calls_by_day: Vec<u32>,
    pub retries_by_day: Vec<Vec<i64>>,
    pub waiting_by_day: Vec<Vec<i64>>,
    pub tolerance_by_day: Vec<Vec<i64>>,
    /// Distinct minimum waiting times (ms) of all callcenters for this type,
    /// ascending
    pub recheck_times_ms: Vec<i64>,
}

impl RunCallerType {
    /// Skill-specific rule for the given skill level, if configured.
    pub fn continue_rule_for(&self, skill_level: usize) -> Option<&SkillSwitch> {
        self.continue_by_skill
            .iter()
            .find(|rule| rule.skill_level == skill_level)
    }

    pub fn recall_rule_for(&self, skill_level: usize) -> Option<&SkillSwitch> {
        self.recall_by_skill
            .iter()
            .find(|rule| rule.skill_level == skill_level)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunCallcenter {
    pub name: String,
    pub index: usize,
    pub technical_free_time_ms: i64,
    pub technical_free_time_seconds: f64,
    pub technical_free_time_is_waiting_time: bool,
    pub score: f64,
    pub agent_score_free_time_part: f64,
    pub agent_score_free_time_since_last_call: f64,
    /// Minimum waiting time (ms) by caller type index
    pub min_waiting_ms: Vec<Option<i64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSkillEntry {
    pub caller_type: usize,
    pub score: f64,
    pub working_time: Distribution,
    pub working_time_by_interval: Option<Vec<Distribution>>,
    pub post_processing_time: Distribution,
    pub post_processing_time_by_interval: Option<Vec<Distribution>>,
}

impl RunSkillEntry {
    pub fn working_time_at(&self, interval: usize) -> &Distribution {
        match &self.working_time_by_interval {
            Some(table) => &table[interval],
            None => &self.working_time,
        }
    }

    pub fn post_processing_time_at(&self, interval: usize) -> &Distribution {
        match &self.post_processing_time_by_interval {
            Some(table) => &table[interval],
            None => &self.post_processing_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSkillLevel {
    pub name: String,
    pub index: usize,
    pub entries: Vec<RunSkillEntry>,
    /// Entry slot by caller type index; `None` if this skill cannot serve it
    pub slot_by_caller_type: Vec<Option<usize>>,
}

impl RunSkillLevel {
    pub fn serves(&self, caller_type: usize) -> bool {
        self.slot_by_caller_type[caller_type].is_some()
    }
}

/// One staffed agent (one shift instance).
#[derive(Debug, Clone, PartialEq)]
pub struct RunAgent {
    pub callcenter: usize,
    pub skill_level: usize,
    /// Position of the agent group inside its callcenter's configuration
    pub group: usize,
    pub start_ms: i64,
    /// `None` for agents without shift end
    pub end_ms: Option<i64>,
    pub cost_per_working_hour: f64,
    /// By caller type index
    pub cost_per_call: Vec<f64>,
    /// By caller type index
    pub cost_per_call_minute: Vec<f64>,
}

/// Validated, index-resolved model shared read-only by all replicas.
#[derive(Debug, Clone)]
pub struct RunModel {
    /// The model as handed in
    pub model: CallcenterModel,
    pub days: u32,
    pub seed: u64,
    pub max_queue_length: Option<QueueLimit>,
    pub caller_types: Vec<RunCallerType>,
    pub callcenters: Vec<RunCallcenter>,
    pub skill_levels: Vec<RunSkillLevel>,
    pub agents: Vec<RunAgent>,
    pub warnings: Vec<WarningRule>,
    /// Any callcenter has a positive minimum waiting time
    pub min_waiting_time_used: bool,
    /// Any agent group has costs configured
    pub agent_costs_used: bool,
    /// SHA-256 of the model without its carryover tables
    pub fingerprint: String,
}

// ============================================================================
// Validation and resolution
// ============================================================================

fn check_distribution(context: &str, dist: &Distribution) -> Result<(), ModelError> {
    dist.check().map_err(|reason| ModelError::InvalidDistribution {
        context: context.to_string(),
        reason,
    })
}

fn check_probability(context: &str, p: f64) -> Result<(), ModelError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(ModelError::InvalidValue {
            context: context.to_string(),
            reason: format!("probability {} is outside [0, 1]", p),
        });
    }
    Ok(())
}

fn check_interval_table(
    context: &str,
    table: &Option<Vec<Distribution>>,
) -> Result<(), ModelError> {
    if let Some(table) = table {
        if table.len() != INTERVAL_COUNT {
            return Err(ModelError::IntervalTableLength {
                context: context.to_string(),
                len: table.len(),
            });
        }
        for (i, dist) in table.iter().enumerate() {
            check_distribution(&format!("{}, interval {}", context, i), dist)?;
        }
    }
    Ok(())
}

fn name_index<'a, I>(kind: &str, names: I) -> Result<HashMap<String, usize>, ModelError>
where
    I: Iterator<Item = &'a str>,
{
    let mut map = HashMap::new();
    for (i, name) in names.enumerate() {
        if map.insert(name.to_string(), i).is_some() {
            return Err(ModelError::DuplicateName {
                kind: kind.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(map)
}

fn resolve_caller(
    caller_index: &HashMap<String, usize>,
    context: &str,
    name: &str,
) -> Result<usize, ModelError> {
    caller_index
        .get(name)
        .copied()
        .ok_or_else(|| ModelError::UnknownCallerType {
            context: context.to_string(),
            name: name.to_string(),
        })
}

fn resolve_switch(
    caller_index: &HashMap<String, usize>,
    context: &str,
    rates: &[TypeRate],
) -> Result<TypeSwitch, ModelError> {
    let mut switch = TypeSwitch::default();
    for entry in rates {
        if !(entry.rate.is_finite() && entry.rate >= 0.0) {
            return Err(ModelError::InvalidValue {
                context: context.to_string(),
                reason: format!("rate {} for \"{}\" is negative", entry.rate, entry.caller_type),
            });
        }
        switch
            .targets
            .push(resolve_caller(caller_index, context, &entry.caller_type)?);
        switch.rates.push(entry.rate);
    }
    let total: f64 = switch.rates.iter().sum();
    if total > 0.0 {
        for rate in switch.rates.iter_mut() {
            *rate /= total;
        }
    }
    Ok(switch)
}

fn resolve_skill_switches(
    caller_index: &HashMap<String, usize>,
    skill_index: &HashMap<String, usize>,
    context: &str,
    rules: &[SkillForwarding],
) -> Result<Vec<SkillSwitch>, ModelError> {
    rules
        .iter()
        .map(|rule| {
            let skill_level = skill_index.get(&rule.skill_level).copied().ok_or_else(|| {
                ModelError::UnknownSkillLevel {
                    context: context.to_string(),
                    name: rule.skill_level.clone(),
                }
            })?;
            check_probability(context, rule.probability)?;
            Ok(SkillSwitch {
                skill_level,
                probability: rule.probability,
                switch: resolve_switch(caller_index, context, &rule.targets)?,
            })
        })
        .collect()
}

impl RunModel {
    /// Validates `model` and resolves it for simulation.
    ///
    /// # Errors
    /// Returns the first failed consistency check.
    pub fn new(model: CallcenterModel) -> Result<Self, ModelError> {
        if model.days == 0 {
            return Err(ModelError::NoDays);
        }
        if model.service_level_seconds == 0 {
            return Err(ModelError::InvalidValue {
                context: "Model".to_string(),
                reason: "service level target must be positive".to_string(),
            });
        }
        if let Some(QueueLimit::PerWorkingAgent { factor, offset }) = &model.max_queue_length {
            if !factor.is_finite() || !offset.is_finite() {
                return Err(ModelError::InvalidValue {
                    context: "Queue limit".to_string(),
                    reason: "factor and offset must be finite".to_string(),
                });
            }
        }

        // Name tables
        let active_callers: Vec<_> = model.caller_types.iter().filter(|c| c.active).collect();
        if active_callers.is_empty() {
            return Err(ModelError::NoCallerTypes);
        }
        let caller_index = name_index("caller type", active_callers.iter().map(|c| c.name.as_str()))?;
        let inactive_callers: Vec<&str> = model
            .caller_types
            .iter()
            .filter(|c| !c.active)
            .map(|c| c.name.as_str())
            .collect();

        if model.skill_levels.is_empty() {
            return Err(ModelError::NoSkillLevels);
        }
        let skill_index = name_index(
            "skill level",
            model.skill_levels.iter().map(|s| s.name.as_str()),
        )?;

        let active_callcenters: Vec<_> = model.callcenters.iter().filter(|c| c.active).collect();
        if active_callcenters.is_empty() {
            return Err(ModelError::NoCallcenters);
        }
        name_index(
            "callcenter",
            active_callcenters.iter().map(|c| c.name.as_str()),
        )?;
        if !active_callcenters
            .iter()
            .any(|cc| cc.agent_groups.iter().any(|g| g.active))
        {
            return Err(ModelError::NoAgentGroups);
        }

        let caller_count = active_callers.len();

        // Skill levels
        let mut skill_levels = Vec::with_capacity(model.skill_levels.len());
        for (index, skill) in model.skill_levels.iter().enumerate() {
            let mut entries = Vec::new();
            let mut slot_by_caller_type = vec![None; caller_count];
            for entry in &skill.entries {
                let context = format!(
                    "Skill level \"{}\", caller type \"{}\"",
                    skill.name, entry.caller_type
                );
                if inactive_callers.contains(&entry.caller_type.as_str()) {
                    continue;
                }
                let caller_type = resolve_caller(&caller_index, &context, &entry.caller_type)?;
                if slot_by_caller_type[caller_type].is_some() {
                    return Err(ModelError::DuplicateSkillEntry {
                        skill_level: skill.name.clone(),
                        caller_type: entry.caller_type.clone(),
                    });
                }
                check_distribution(&format!("{}, working time", context), &entry.working_time)?;
                check_distribution(
                    &format!("{}, post-processing time", context),
                    &entry.post_processing_time,
                )?;
                check_interval_table(
                    &format!("{}, working time by interval", context),
                    &entry.working_time_by_interval,
                )?;
                check_interval_table(
                    &format!("{}, post-processing time by interval", context),
                    &entry.post_processing_time_by_interval,
                )?;
                slot_by_caller_type[caller_type] = Some(entries.len());
                entries.push(RunSkillEntry {
                    caller_type,
                    score: entry.score,
                    working_time: entry.working_time.clone(),
                    working_time_by_interval: entry.working_time_by_interval.clone(),
                    post_processing_time: entry.post_processing_time.clone(),
                    post_processing_time_by_interval: entry
                        .post_processing_time_by_interval
                        .clone(),
                });
            }
            if entries.is_empty() {
                return Err(ModelError::SkillWithoutCallerTypes {
                    skill_level: skill.name.clone(),
                });
            }
            skill_levels.push(RunSkillLevel {
                name: skill.name.clone(),
                index,
                entries,
                slot_by_caller_type,
            });
        }

        // Callcenters and agents
        let mut callcenters = Vec::with_capacity(active_callcenters.len());
        let mut agents = Vec::new();
        let mut agent_costs_used = false;
        for (cc_index, cc) in active_callcenters.iter().enumerate() {
            let context = format!("Callcenter \"{}\"", cc.name);
            if !(cc.technical_free_time.is_finite() && cc.technical_free_time >= 0.0) {
                return Err(ModelError::InvalidValue {
                    context,
                    reason: "technical free time must not be negative".to_string(),
                });
            }
            let mut min_waiting_ms = vec![None; caller_count];
            for rule in &cc.min_waiting_times {
                let caller_type = resolve_caller(
                    &caller_index,
                    &format!("{}, minimum waiting time", context),
                    &rule.caller_type,
                )?;
                if !(rule.seconds.is_finite() && rule.seconds >= 0.0) {
                    return Err(ModelError::InvalidValue {
                        context: format!("{}, minimum waiting time", context),
                        reason: format!("{} seconds is negative", rule.seconds),
                    });
                }
                min_waiting_ms[caller_type] = Some(seconds_to_ms(rule.seconds));
            }

            for (group_index, group) in cc.agent_groups.iter().enumerate() {
                if !group.active {
                    continue;
                }
                let group_context = format!("{}, agent group {}", context, group_index + 1);
                let skill_level = skill_index.get(&group.skill_level).copied().ok_or_else(|| {
                    ModelError::UnknownSkillLevel {
                        context: group_context.clone(),
                        name: group.skill_level.clone(),
                    }
                })?;
                if !group.working_no_end_time && group.working_time_end < group.working_time_start
                {
                    return Err(ModelError::InvalidShift {
                        callcenter: cc.name.clone(),
                        group: group_index + 1,
                        start: group.working_time_start,
                        end: group.working_time_end,
                    });
                }
                if group.cost_per_working_hour < 0.0 || group.efficiency < 0.0 || group.surcharge < 0.0
                {
                    return Err(ModelError::InvalidValue {
                        context: group_context,
                        reason: "costs, efficiency and surcharge must not be negative".to_string(),
                    });
                }
                let mut cost_per_call = vec![0.0; caller_count];
                let mut cost_per_call_minute = vec![0.0; caller_count];
                for costs in &group.costs_by_caller_type {
                    let caller_type =
                        resolve_caller(&caller_index, &group_context, &costs.caller_type)?;
                    cost_per_call[caller_type] = costs.per_call;
                    cost_per_call_minute[caller_type] = costs.per_call_minute;
                }
                if group.cost_per_working_hour > 0.0
                    || cost_per_call.iter().any(|c| *c != 0.0)
                    || cost_per_call_minute.iter().any(|c| *c != 0.0)
                {
                    agent_costs_used = true;
                }
                let end_ms = if group.working_no_end_time {
                    None
                } else {
                    Some(group.working_time_end as i64 * 1000)
                };
                for _ in 0..group.count {
                    agents.push(RunAgent {
                        callcenter: cc_index,
                        skill_level,
                        group: group_index,
                        start_ms: group.working_time_start as i64 * 1000,
                        end_ms,
                        cost_per_working_hour: group.cost_per_working_hour,
                        cost_per_call: cost_per_call.clone(),
                        cost_per_call_minute: cost_per_call_minute.clone(),
                    });
                }
            }

            callcenters.push(RunCallcenter {
                name: cc.name.clone(),
                index: cc_index,
                technical_free_time_ms: seconds_to_ms(cc.technical_free_time),
                technical_free_time_seconds: cc.technical_free_time,
                technical_free_time_is_waiting_time: cc.technical_free_time_is_waiting_time,
                score: cc.score,
                agent_score_free_time_part: cc.agent_score_free_time_part,
                agent_score_free_time_since_last_call: cc.agent_score_free_time_since_last_call,
                min_waiting_ms,
            });
        }

        let min_waiting_time_used = callcenters
            .iter()
            .any(|cc| cc.min_waiting_ms.iter().flatten().any(|ms| *ms > 0));

        // Caller types
        let mut caller_types = Vec::with_capacity(caller_count);
        let mut total_calls = 0.0;
        for (index, caller) in active_callers.iter().enumerate() {
            let context = format!("Caller type \"{}\"", caller.name);
            if !(caller.fresh_calls_mean.is_finite() && caller.fresh_calls_mean >= 0.0) {
                return Err(ModelError::InvalidValue {
                    context,
                    reason: "fresh call mean must not be negative".to_string(),
                });
            }
            if !(caller.fresh_calls_std_dev.is_finite() && caller.fresh_calls_std_dev >= 0.0) {
                return Err(ModelError::InvalidValue {
                    context,
                    reason: "fresh call standard deviation must not be negative".to_string(),
                });
            }
            check_distribution(&format!("{}, arrivals", context), &caller.arrival_distribution)?;
            if caller.fresh_calls_mean > 0.0 && caller.arrival_distribution.is_empty_histogram() {
                return Err(ModelError::EmptyArrivalProfile {
                    caller_type: caller.name.clone(),
                });
            }
            if let Some(seconds) = caller.service_level_seconds {
                if seconds == 0 {
                    return Err(ModelError::InvalidValue {
                        context,
                        reason: "service level target must be positive".to_string(),
                    });
                }
            }
            if let Some(tolerance) = &caller.waiting_time_tolerance {
                check_distribution(&format!("{}, waiting-time tolerance", context), tolerance)?;
            }
            check_distribution(&format!("{}, retry time", context), &caller.retry_time)?;
            check_distribution(&format!("{}, recall delay", context), &caller.recall.delay)?;
            for p in [
                caller.retry.probability_after_blocked_first,
                caller.retry.probability_after_blocked,
                caller.retry.probability_after_give_up_first,
                caller.retry.probability_after_give_up,
                caller.forwarding.probability,
                caller.recall.probability,
            ] {
                check_probability(&context, p)?;
            }

            let retry = &caller.retry;
            let carry = &caller.carryover;
            total_calls += caller.fresh_calls_mean
                + carry.additional_calls_by_day.iter().sum::<u32>() as f64
                + carry.retries_by_day.iter().map(Vec::len).sum::<usize>() as f64
                + carry.waiting_by_day.iter().map(Vec::len).sum::<usize>() as f64;

            let mut recheck_times_ms: Vec<i64> = callcenters
                .iter()
                .filter_map(|cc| cc.min_waiting_ms[index])
                .filter(|ms| *ms > 0)
                .collect();
            recheck_times_ms.sort_unstable();
            recheck_times_ms.dedup();

            caller_types.push(RunCallerType {
                name: caller.name.clone(),
                index,
                fresh_calls_mean: caller.fresh_calls_mean,
                fresh_calls_std_dev: caller.fresh_calls_std_dev,
                arrival: caller.arrival_distribution.clone(),
                score_base: caller.score_base,
                score_per_ms: caller.score_per_second / 1000.0,
                score_continued: caller.score_continued,
                blocks_line: caller.blocks_line,
                service_level_seconds: caller
                    .service_level_seconds
                    .unwrap_or(model.service_level_seconds) as i64,
                waiting_time_tolerance: caller.waiting_time_tolerance.clone(),
                retry_time: caller.retry_time.clone(),
                retry_probability_after_blocked_first: retry.probability_after_blocked_first,
                retry_probability_after_blocked: retry.probability_after_blocked,
                retry_probability_after_give_up_first: retry.probability_after_give_up_first,
                retry_probability_after_give_up: retry.probability_after_give_up,
                retry_switch_after_blocked_first: resolve_switch(
                    &caller_index,
                    &context,
                    &retry.type_switch_after_blocked_first,
                )?,
                retry_switch_after_blocked: resolve_switch(
                    &caller_index,
                    &context,
                    &retry.type_switch_after_blocked,
                )?,
                retry_switch_after_give_up_first: resolve_switch(
                    &caller_index,
                    &context,
                    &retry.type_switch_after_give_up_first,
                )?,
                retry_switch_after_give_up: resolve_switch(
                    &caller_index,
                    &context,
                    &retry.type_switch_after_give_up,
                )?,
                continue_probability: caller.forwarding.probability,
                continue_switch: resolve_switch(
                    &caller_index,
                    &format!("{}, forwarding", context),
                    &caller.forwarding.targets,
                )?,
                continue_by_skill: resolve_skill_switches(
                    &caller_index,
                    &skill_index,
                    &format!("{}, forwarding", context),
                    &caller.forwarding.by_skill_level,
                )?,
                recall_probability: caller.recall.probability,
                recall_time: caller.recall.delay.clone(),
                recall_switch: resolve_switch(
                    &caller_index,
                    &format!("{}, recall", context),
                    &caller.recall.targets,
                )?,
                recall_by_skill: resolve_skill_switches(
                    &caller_index,
                    &skill_index,
                    &format!("{}, recall", context),
                    &caller.recall.by_skill_level,
                )?,
                revenue_per_client: caller.revenue_per_client,
                cost_per_waiting_second: caller.cost_per_waiting_second,
                cost_per_cancel: caller.cost_per_cancel,
                additional_calls_by_day: carry.additional_calls_by_day.clone(),
                retries_by_day: carry.retries_by_day.clone(),
                waiting_by_day: carry.waiting_by_day.clone(),
                tolerance_by_day: carry.tolerance_by_day.clone(),
                recheck_times_ms,
            });
        }
        if total_calls <= 0.0 {
            return Err(ModelError::NoCalls);
        }

        for rule in &model.warnings {
            if let Some(intervals) = &rule.intervals {
                if intervals.len() != INTERVAL_COUNT {
                    return Err(ModelError::IntervalTableLength {
                        context: format!("Warning {:?}", rule.metric),
                        len: intervals.len(),
                    });
                }
            }
        }

        let fingerprint = compute_fingerprint(&model)?;

        let run_model = Self {
            days: model.days,
            seed: model.seed,
            max_queue_length: model.max_queue_length.clone(),
            warnings: model.warnings.clone(),
            model,
            caller_types,
            callcenters,
            skill_levels,
            agents,
            min_waiting_time_used,
            agent_costs_used,
            fingerprint,
        };
        for note in run_model.plausibility_notes() {
            warn!(model = %run_model.model.name, "{}", note);
        }
        Ok(run_model)
    }

    /// Sum of the mean fresh call counts of all caller types.
    pub fn fresh_calls_per_day(&self) -> f64 {
        self.caller_types.iter().map(|c| c.fresh_calls_mean).sum()
    }

    /// Non-fatal hints about a model that is consistent but probably not
    /// what the planner meant.
    pub fn plausibility_notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.agents.is_empty() {
            notes.push("No agents are staffed; no call can be served".to_string());
        }
        for caller in &self.caller_types {
            let served = self.agents.iter().any(|agent| {
                self.skill_levels[agent.skill_level].serves(caller.index)
            });
            if !served && !self.agents.is_empty() {
                notes.push(format!(
                    "Caller type \"{}\" cannot be served by any staffed agent",
                    caller.name
                ));
            }
            if caller.fresh_calls_mean > 1_000_000.0 {
                notes.push(format!(
                    "Caller type \"{}\" has more than one million fresh calls per day",
                    caller.name
                ));
            }
        }
        for skill in &self.skill_levels {
            for entry in &skill.entries {
                let mean = entry.working_time.mean();
                let caller = &self.caller_types[entry.caller_type].name;
                if mean <= 0.0 {
                    notes.push(format!(
                        "Skill level \"{}\" serves \"{}\" with a mean working time of zero",
                        skill.name, caller
                    ));
                } else if mean > 3600.0 {
                    notes.push(format!(
                        "Skill level \"{}\" serves \"{}\" with a mean working time above one hour",
                        skill.name, caller
                    ));
                }
            }
        }
        notes
    }
}
