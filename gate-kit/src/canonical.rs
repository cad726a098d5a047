//! Canonical JSON serialization
//!
//! UTF-8, object keys sorted byte-wise at every depth, compact separators
//! (`,` and `:`), no trailing whitespace. Non-ASCII characters are emitted
//! as raw UTF-8, never `\u` escaped. Packet self-anchors and evidence
//! reports both depend on this exact byte layout.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::anchor::Anchor;
use crate::error::{EvGateError, Result};

/// Rebuild `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical compact string for a JSON value.
pub fn to_canonical_string(value: &Value) -> Result<String> {
    serde_json::to_string(&canonicalize(value)).map_err(EvGateError::Serialize)
}

/// Canonical compact string for any serializable value.
pub fn serialize_canonical<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value).map_err(EvGateError::Serialize)?;
    to_canonical_string(&value)
}

/// Anchor of the canonical serialization of `value`.
pub fn anchor_value(value: &Value) -> Result<Anchor> {
    Ok(Anchor::of_bytes(to_canonical_string(value)?.as_bytes()))
}
