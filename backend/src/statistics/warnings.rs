//! Threshold warnings
//!
//! Evaluates the model's [`WarningRule`]s on the merged statistics.

use serde::{Deserialize, Serialize};

use super::agents::AgentStatistics;
use super::callers::CallerStatistics;
use crate::config::model::{GroupSelection, TimeSelection, WarningMetric, WarningRule};
use crate::core::time::INTERVAL_COUNT;

/// Minimum interval weight for [`TimeSelection::Selected`].
const INTERVAL_WEIGHT_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningStatus {
    Ok,
    Yellow,
    Red,
}

/// A rule together with the measured value and the resulting status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningResult {
    pub rule: WarningRule,
    pub value: f64,
    pub status: WarningStatus,
}

fn caller_groups<'a>(
    rule: &WarningRule,
    global: &'a CallerStatistics,
    by_type: &'a [CallerStatistics],
) -> Vec<&'a CallerStatistics> {
    match rule.group_mode {
        GroupSelection::Average => vec![global],
        GroupSelection::Each => by_type.iter().collect(),
        GroupSelection::Selected => {
            let selected = rule.group.as_deref().and_then(|name| {
                by_type.iter().find(|c| c.name.eq_ignore_ascii_case(name))
            });
            vec![selected.unwrap_or(global)]
        }
    }
}

fn agent_groups<'a>(
    rule: &WarningRule,
    global: &'a AgentStatistics,
    by_callcenter: &'a [AgentStatistics],
) -> Vec<&'a AgentStatistics> {
    match rule.group_mode {
        GroupSelection::Average => vec![global],
        GroupSelection::Each => by_callcenter.iter().collect(),
        GroupSelection::Selected => {
            let selected = rule.group.as_deref().and_then(|name| {
                by_callcenter
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case(name))
            });
            vec![selected.unwrap_or(global)]
        }
    }
}

fn ratio(a: f64, b: f64) -> f64 {
    a / b.max(1.0)
}

fn whole_day_value(metric: WarningMetric, c: &CallerStatistics) -> f64 {
    match metric {
        WarningMetric::WaitingTimeCall => ratio(c.calls.waiting_sum as f64, c.calls.success as f64),
        WarningMetric::WaitingTimeClient => {
            ratio(c.clients.waiting_sum as f64, c.clients.success as f64)
        }
        WarningMetric::ResidenceTimeCall => {
            ratio(c.calls.residence_sum as f64, c.calls.success as f64)
        }
        WarningMetric::ResidenceTimeClient => {
            ratio(c.clients.residence_sum as f64, c.clients.success as f64)
        }
        WarningMetric::SuccessPartCall => ratio(
            c.calls.success as f64,
            c.calls.count as f64 - c.calls.carried_over as f64,
        ),
        WarningMetric::SuccessPartClient => ratio(
            c.clients.success as f64,
            c.clients.count as f64 - c.clients.carried_over as f64,
        ),
        WarningMetric::ServiceLevelCallSuccessful => {
            ratio(c.calls.service_level as f64, c.calls.success as f64)
        }
        WarningMetric::ServiceLevelCallAll => {
            ratio(c.calls.service_level as f64, c.calls.count as f64)
        }
        WarningMetric::ServiceLevelClientSuccessful => {
            ratio(c.clients.service_level as f64, c.clients.success as f64)
        }
        WarningMetric::ServiceLevelClientAll => {
            ratio(c.clients.service_level as f64, c.clients.count as f64)
        }
        WarningMetric::Workload => 0.0,
    }
}

fn interval_value(metric: WarningMetric, c: &CallerStatistics, i: usize) -> f64 {
    let calls = &c.calls;
    let clients = &c.clients;
    match metric {
        WarningMetric::WaitingTimeCall => ratio(
            calls.waiting_by_interval.get(i),
            calls.success_by_interval.get(i),
        ),
        WarningMetric::WaitingTimeClient => ratio(
            clients.waiting_by_interval.get(i),
            clients.success_by_interval.get(i),
        ),
        WarningMetric::ResidenceTimeCall => ratio(
            calls.residence_by_interval.get(i),
            calls.success_by_interval.get(i),
        ),
        WarningMetric::ResidenceTimeClient => ratio(
            clients.residence_by_interval.get(i),
            clients.success_by_interval.get(i),
        ),
        WarningMetric::SuccessPartCall => ratio(
            calls.success_by_interval.get(i),
            calls.count_by_interval.get(i),
        ),
        WarningMetric::SuccessPartClient => ratio(
            clients.success_by_interval.get(i),
            clients.count_by_interval.get(i),
        ),
        WarningMetric::ServiceLevelCallSuccessful => ratio(
            calls.service_level_by_interval.get(i),
            calls.success_by_interval.get(i),
        ),
        WarningMetric::ServiceLevelCallAll => ratio(
            calls.service_level_by_interval.get(i),
            calls.count_by_interval.get(i),
        ),
        WarningMetric::ServiceLevelClientSuccessful => ratio(
            clients.service_level_by_interval.get(i),
            clients.success_by_interval.get(i),
        ),
        WarningMetric::ServiceLevelClientAll => ratio(
            clients.service_level_by_interval.get(i),
            clients.count_by_interval.get(i),
        ),
        WarningMetric::Workload => 0.0,
    }
}

fn interval_workload(a: &AgentStatistics, i: usize) -> f64 {
    let idle = a.idle_by_interval.get(i);
    let present = idle
        + a.technical_by_interval.get(i)
        + a.service_by_interval.get(i)
        + a.post_processing_by_interval.get(i);
    1.0 - ratio(idle, present)
}

/// Measures the rule's metric: the worst value over all selected groups
/// (and intervals).
pub fn warning_value(
    rule: &WarningRule,
    callers_global: &CallerStatistics,
    callers_by_type: &[CallerStatistics],
    agents_global: &AgentStatistics,
    agents_by_callcenter: &[AgentStatistics],
) -> f64 {
    let larger_is_worse = rule.metric.larger_is_worse();
    let mut value = if larger_is_worse { 0.0 } else { 1.0 };
    let mut worst = |v: f64| {
        value = if larger_is_worse {
            f64::max(value, v)
        } else {
            f64::min(value, v)
        };
    };

    let intervals: Vec<usize> = match rule.time_mode {
        TimeSelection::Average => Vec::new(),
        TimeSelection::Each => (0..INTERVAL_COUNT).collect(),
        TimeSelection::Selected => rule
            .intervals
            .as_ref()
            .map(|weights| {
                weights
                    .iter()
                    .enumerate()
                    .filter(|(_, w)| **w > INTERVAL_WEIGHT_THRESHOLD)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default(),
    };

    if rule.metric == WarningMetric::Workload {
        let groups = agent_groups(rule, agents_global, agents_by_callcenter);
        if rule.time_mode == TimeSelection::Average {
            groups.iter().for_each(|a| worst(a.workload()));
        } else {
            for &i in &intervals {
                groups.iter().for_each(|a| worst(interval_workload(a, i)));
            }
        }
    } else {
        let groups = caller_groups(rule, callers_global, callers_by_type);
        if rule.time_mode == TimeSelection::Average {
            groups
                .iter()
                .for_each(|c| worst(whole_day_value(rule.metric, c)));
        } else {
            for &i in &intervals {
                groups
                    .iter()
                    .for_each(|c| worst(interval_value(rule.metric, c, i)));
            }
        }
    }
    value
}

/// Classifies a measured value. A negative threshold is disabled; red
/// overrides yellow.
pub fn warning_status(rule: &WarningRule, value: f64) -> WarningStatus {
    let exceeds = |threshold: f64| {
        threshold >= 0.0
            && if rule.metric.larger_is_worse() {
                value > threshold
            } else {
                value < threshold
            }
    };
    let mut status = WarningStatus::Ok;
    if exceeds(rule.yellow) {
        status = WarningStatus::Yellow;
    }
    if exceeds(rule.red) {
        status = WarningStatus::Red;
    }
    status
}
