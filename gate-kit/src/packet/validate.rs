//! Fail-closed packet validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//! top-level key set, nested required fields, then the self-anchor.

use serde_json::{Map, Value};

use super::schema::{FAIL_PACKET, KeyRule, PacketSchema};
use crate::anchor::Anchor;
use crate::canonical;
use crate::error::{EvGateError, Result};

/// An accepted packet together with its recomputed anchor.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationResult {
    pub packet: Value,
    pub anchor: Anchor,
}

/// Validate a FAIL_PACKET.
pub fn validate(packet: &Value) -> Result<ValidationResult> {
    validate_with(packet, &FAIL_PACKET)
}

/// Validate a packet against an explicit schema.
pub fn validate_with(packet: &Value, schema: &PacketSchema) -> Result<ValidationResult> {
    let object = as_object(packet)?;

    check_key_set(object, schema)?;
    check_required_fields(object, schema)?;

    let anchor = compute_self_anchor_with(packet, schema)?;
    if let Some(anchor_key) = schema.anchor_key() {
        // Type already checked by check_required_fields.
        let stored = object.get(anchor_key).and_then(Value::as_str).unwrap_or_default();
        if !anchor.matches_hex(stored) {
            return Err(EvGateError::AnchorMismatch {
                subject: format!("{} {anchor_key}", schema.name),
                expected: anchor.to_string(),
                actual: stored.to_string(),
            });
        }
    }

    tracing::debug!(schema = schema.name, anchor = %anchor, "packet accepted");
    Ok(ValidationResult {
        packet: packet.clone(),
        anchor,
    })
}

/// Anchor a FAIL_PACKET must carry: the hash of its canonical form with
/// the self-anchor key removed. Works on packets with or without the key.
pub fn compute_self_anchor(packet: &Value) -> Result<Anchor> {
    compute_self_anchor_with(packet, &FAIL_PACKET)
}

pub fn compute_self_anchor_with(packet: &Value, schema: &PacketSchema) -> Result<Anchor> {
    let mut payload = as_object(packet)?.clone();
    if let Some(anchor_key) = schema.anchor_key() {
        payload.remove(anchor_key);
    }
    canonical::anchor_value(&Value::Object(payload))
}

fn as_object(packet: &Value) -> Result<&Map<String, Value>> {
    packet
        .as_object()
        .ok_or_else(|| EvGateError::schema("packet must be a JSON object", "$"))
}

fn check_key_set(object: &Map<String, Value>, schema: &PacketSchema) -> Result<()> {
    let mut unexpected: Vec<&String> = object
        .keys()
        .filter(|key| !schema.is_required_key(key))
        .collect();
    unexpected.sort();
    if let Some(key) = unexpected.first() {
        return Err(EvGateError::schema("unexpected top-level key", key.as_str()));
    }

    if let Some((key, _)) = schema.keys.iter().find(|(key, _)| !object.contains_key(*key)) {
        return Err(EvGateError::schema("missing top-level key", *key));
    }
    Ok(())
}

fn check_required_fields(object: &Map<String, Value>, schema: &PacketSchema) -> Result<()> {
    for (key, rule) in schema.keys {
        let Some(value) = object.get(*key) else {
            return Err(EvGateError::schema("missing top-level key", *key));
        };
        match rule {
            KeyRule::Object(fields) => {
                let Some(nested) = value.as_object() else {
                    return Err(EvGateError::schema("required field must be an object", *key));
                };
                for (field, field_rule) in *fields {
                    let satisfied = nested
                        .get(*field)
                        .is_some_and(|v| field_rule.is_satisfied_by(v));
                    if !satisfied {
                        return Err(EvGateError::schema(
                            "missing/empty required field",
                            format!("{key}.{field}"),
                        ));
                    }
                }
            }
            KeyRule::NonEmptyString => {
                if !value.as_str().is_some_and(|s| !s.trim().is_empty()) {
                    return Err(EvGateError::schema("missing/empty required field", *key));
                }
            }
            KeyRule::SelfAnchor => {
                if !value.is_string() {
                    return Err(EvGateError::schema("self-anchor must be a string", *key));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::schema::SELF_ANCHOR_KEY;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn unsealed() -> Value {
        json!({
            "failure": {
                "summary": "lint gate fails on generated bindings",
                "signals": ["clippy::needless_borrow"],
                "reproduction": "cargo clippy -p bindings",
            },
            "mutation_plan": {
                "summary": "regenerate bindings with borrow fix",
                "targets": ["bindings/src/lib.rs"],
            },
            "verification_script": "cargo clippy -p bindings -- -D warnings",
            "regression_test": {
                "name": "bindings_lint_clean",
                "command": "cargo test -p bindings lint_clean",
            },
        })
    }

    fn sealed() -> Value {
        let mut packet = unsealed();
        let anchor = compute_self_anchor(&packet).expect("anchor");
        packet[SELF_ANCHOR_KEY] = json!(anchor.to_string());
        packet
    }

    fn schema_key(err: EvGateError) -> String {
        match err {
            EvGateError::Schema { key, .. } => key,
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn sealed_packet_round_trips() {
        let packet = sealed();
        let result = validate(&packet).expect("valid");
        assert_eq!(result.packet, packet);
        assert_eq!(
            result.anchor.as_str(),
            packet[SELF_ANCHOR_KEY].as_str().expect("anchor string")
        );
    }

    #[test]
    fn self_anchor_ignores_existing_anchor_field() {
        assert_eq!(
            compute_self_anchor(&unsealed()).expect("anchor"),
            compute_self_anchor(&sealed()).expect("anchor")
        );
    }

    #[test]
    fn uppercase_anchor_is_accepted() {
        let mut packet = sealed();
        let upper = packet[SELF_ANCHOR_KEY]
            .as_str()
            .expect("anchor string")
            .to_ascii_uppercase();
        packet[SELF_ANCHOR_KEY] = json!(upper);
        assert!(validate(&packet).is_ok());
    }

    #[test]
    fn padded_anchor_is_rejected() {
        let mut packet = sealed();
        let padded = format!(
            " {}\n",
            packet[SELF_ANCHOR_KEY].as_str().expect("anchor string")
        );
        packet[SELF_ANCHOR_KEY] = json!(padded);
        assert!(matches!(
            validate(&packet),
            Err(EvGateError::AnchorMismatch { .. })
        ));
    }

    #[test]
    fn extra_key_rejected_before_anchor_check() {
        let mut packet = sealed();
        packet["notes"] = json!("added after sealing");
        assert_eq!(schema_key(validate(&packet).unwrap_err()), "notes");

        // Re-sealing with the extra key does not make it acceptable.
        let anchor = compute_self_anchor(&packet).expect("anchor");
        packet[SELF_ANCHOR_KEY] = json!(anchor.to_string());
        assert_eq!(schema_key(validate(&packet).unwrap_err()), "notes");
    }

    #[test]
    fn missing_key_rejected() {
        let packet = unsealed();
        assert_eq!(schema_key(validate(&packet).unwrap_err()), SELF_ANCHOR_KEY);
    }

    #[test]
    fn empty_nested_field_rejected() {
        let mut packet = sealed();
        packet["failure"]["signals"] = json!([]);
        assert_eq!(
            schema_key(validate(&packet).unwrap_err()),
            "failure.signals"
        );
    }

    #[test]
    fn blank_script_rejected() {
        let mut packet = sealed();
        packet["verification_script"] = json!("  ");
        assert_eq!(
            schema_key(validate(&packet).unwrap_err()),
            "verification_script"
        );
    }

    #[test]
    fn non_object_rejected() {
        assert_eq!(schema_key(validate(&json!([1, 2])).unwrap_err()), "$");
    }

    #[test]
    fn tampered_anchor_reports_both_digests() {
        let mut packet = sealed();
        let original = packet[SELF_ANCHOR_KEY]
            .as_str()
            .expect("anchor string")
            .to_string();
        let flipped = if original.starts_with('0') { "1" } else { "0" };
        let tampered = format!("{flipped}{}", &original[1..]);
        packet[SELF_ANCHOR_KEY] = json!(tampered);

        match validate(&packet).unwrap_err() {
            EvGateError::AnchorMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, original);
                assert_eq!(actual, tampered);
            }
            other => panic!("expected anchor mismatch, got {other:?}"),
        }
    }

    #[test]
    fn tampered_payload_is_detected() {
        let mut packet = sealed();
        packet["failure"]["summary"] = json!("something else");
        assert!(matches!(
            validate(&packet).unwrap_err(),
            EvGateError::AnchorMismatch { .. }
        ));
    }
}
