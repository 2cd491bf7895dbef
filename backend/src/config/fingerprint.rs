//! Model fingerprint
//!
//! Identifies the model a statistics record or a carryover snapshot was
//! produced from. Carryover tables are excluded so every run of a chain
//! reports the same fingerprint for the same planning model.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::model::{CallcenterModel, CarryoverTables};
use super::run_model::ModelError;

// Object keys sorted recursively so the hash does not depend on field order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// SHA-256 (lower-case hex) of the canonical JSON form of `model` with all
/// carryover tables cleared.
pub fn compute_fingerprint(model: &CallcenterModel) -> Result<String, ModelError> {
    let mut stripped = model.clone();
    for caller in stripped.caller_types.iter_mut() {
        caller.carryover = CarryoverTables::default();
    }

    let value = serde_json::to_value(&stripped)
        .map_err(|e| ModelError::Serialization(e.to_string()))?;
    let json = serde_json::to_string(&canonicalize(value))
        .map_err(|e| ModelError::Serialization(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
