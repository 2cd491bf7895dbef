//! Chained runs
//!
//! A finished run leaves callers behind: clients that will retry on the
//! next day, callers still queued at midnight and clients that gave up.
//! [`CarryoverSnapshot`] collects them per caller type and simulated day so
//! that a follow-up run of the same model can start with them.
//!
//! Day `d` of the follow-up run receives what day `d` of the source run
//! left behind.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::SimulationError;
use crate::config::{CallcenterModel, CarryoverTables};
use crate::statistics::Statistics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerTypeCarryover {
    pub caller_type: String,
    pub tables: CarryoverTables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarryoverSnapshot {
    /// Fingerprint of the model the data was taken from
    pub model_fingerprint: String,
    pub days: usize,
    pub caller_types: Vec<CallerTypeCarryover>,
}

impl CarryoverSnapshot {
    /// Extracts the carryover tables of a finished run.
    ///
    /// `retry_probability` is the share of lost clients that call again as
    /// additional fresh calls on the same day of the follow-up run.
    pub fn from_statistics(
        statistics: &Statistics,
        retry_probability: f64,
    ) -> Result<Self, SimulationError> {
        if !statistics.usable {
            return Err(SimulationError::StatisticsUnavailable(
                "statistics of an incomplete run".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&retry_probability) {
            return Err(SimulationError::CarryoverMismatch(format!(
                "retry probability {} outside [0, 1]",
                retry_probability
            )));
        }

        let days = statistics.sim_days as usize;
        let caller_types = statistics
            .callers
            .iter()
            .map(|caller| {
                let additional_calls_by_day = (0..days)
                    .map(|d| {
                        let lost = caller.cancelled_by_day.get(d).copied().unwrap_or(0);
                        (retry_probability * lost as f64).round() as u32
                    })
                    .collect();
                let day_lists = |lists: &Vec<Vec<i64>>| -> Vec<Vec<i64>> {
                    (0..days)
                        .map(|d| lists.get(d).cloned().unwrap_or_default())
                        .collect()
                };
                CallerTypeCarryover {
                    caller_type: caller.name.clone(),
                    tables: CarryoverTables {
                        additional_calls_by_day,
                        retries_by_day: day_lists(&caller.next_day_retries_by_day),
                        waiting_by_day: day_lists(&caller.next_day_waiting_by_day),
                        tolerance_by_day: day_lists(&caller.next_day_tolerance_by_day),
                    },
                }
            })
            .collect();

        Ok(Self {
            model_fingerprint: statistics.metadata.model_fingerprint.clone(),
            days,
            caller_types,
        })
    }

    /// Number of callers the snapshot carries: retries, waiting callers and
    /// additional fresh calls.
    pub fn caller_count(&self) -> u64 {
        self.caller_types
            .iter()
            .map(|c| {
                let t = &c.tables;
                t.additional_calls_by_day.iter().map(|&n| u64::from(n)).sum::<u64>()
                    + t.retries_by_day.iter().map(|d| d.len() as u64).sum::<u64>()
                    + t.waiting_by_day.iter().map(|d| d.len() as u64).sum::<u64>()
            })
            .sum()
    }

    /// Writes the tables into the active caller types of `model`.
    ///
    /// # Errors
    /// Refuses models with a different day count or a different set of
    /// active caller types. `model` is left unchanged in that case.
    pub fn apply_to(&self, model: &mut CallcenterModel) -> Result<(), SimulationError> {
        if model.days as usize != self.days {
            return Err(SimulationError::CarryoverMismatch(format!(
                "snapshot covers {} days, model simulates {}",
                self.days, model.days
            )));
        }
        let active: Vec<usize> = model
            .caller_types
            .iter()
            .enumerate()
            .filter(|(_, c)| c.active)
            .map(|(i, _)| i)
            .collect();
        if active.len() != self.caller_types.len() {
            return Err(SimulationError::CarryoverMismatch(format!(
                "snapshot has {} caller types, model has {} active ones",
                self.caller_types.len(),
                active.len()
            )));
        }

        let mut targets = Vec::with_capacity(self.caller_types.len());
        for carried in &self.caller_types {
            let target = active
                .iter()
                .copied()
                .find(|&i| model.caller_types[i].name == carried.caller_type)
                .ok_or_else(|| {
                    SimulationError::CarryoverMismatch(format!(
                        "caller type {} is not active in the model",
                        carried.caller_type
                    ))
                })?;
            targets.push(target);
        }

        for (carried, target) in self.caller_types.iter().zip(targets) {
            model.caller_types[target].carryover = carried.tables.clone();
        }
        info!(
            model = %model.name,
            callers = self.caller_count(),
            "Carryover applied"
        );
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, SimulationError> {
        serde_json::to_string_pretty(self).map_err(|e| SimulationError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        serde_json::from_str(json).map_err(|e| SimulationError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> CallcenterModel {
        serde_json::from_value(serde_json::json!({
            "name": "carryover unit",
            "days": 2,
            "caller_types": [
                {"name": "A", "fresh_calls_mean": 1.0, "arrival_distribution": {"type": "fixed", "value": 30000}},
                {"name": "B", "fresh_calls_mean": 1.0, "arrival_distribution": {"type": "fixed", "value": 30000}}
            ],
            "callcenters": [],
            "skill_levels": []
        }))
        .unwrap()
    }

    fn snapshot() -> CarryoverSnapshot {
        let tables = CarryoverTables {
            additional_calls_by_day: vec![1, 0],
            retries_by_day: vec![vec![1000], vec![]],
            waiting_by_day: vec![vec![], vec![5000, 6000]],
            tolerance_by_day: vec![vec![], vec![100, 200]],
        };
        CarryoverSnapshot {
            model_fingerprint: "abc".to_string(),
            days: 2,
            caller_types: vec![
                CallerTypeCarryover { caller_type: "B".to_string(), tables: tables.clone() },
                CallerTypeCarryover { caller_type: "A".to_string(), tables: CarryoverTables::default() },
            ],
        }
    }

    #[test]
    fn test_apply_matches_by_name() {
        let mut model = model();
        snapshot().apply_to(&mut model).unwrap();
        assert!(model.caller_types[0].carryover.is_empty());
        assert_eq!(model.caller_types[1].carryover.waiting_by_day[1], vec![5000, 6000]);
        assert_eq!(snapshot().caller_count(), 4);
    }

    #[test]
    fn test_day_count_mismatch_is_refused() {
        let mut model = model();
        model.days = 3;
        let err = snapshot().apply_to(&mut model).unwrap_err();
        assert!(matches!(err, SimulationError::CarryoverMismatch(_)));
    }

    #[test]
    fn test_unknown_caller_type_leaves_model_unchanged() {
        let mut model = model();
        model.caller_types[0].name = "C".to_string();
        let before = model.clone();
        assert!(snapshot().apply_to(&mut model).is_err());
        assert_eq!(model, before);
    }

    #[test]
    fn test_json_round_trip() {
        let json = snapshot().to_json().unwrap();
        assert_eq!(CarryoverSnapshot::from_json(&json).unwrap(), snapshot());
    }
}
