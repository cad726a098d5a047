//! Packet schema definitions and typed producer structures.
//!
//! A schema is plain data: the exact set of top-level keys, the rule each
//! key must satisfy, and which key carries the self-anchor. The validator
//! in [`super::validate`] interprets it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::anchor::Anchor;
use crate::error::{EvGateError, Result};

/// Rule for one required sub-field of a nested object.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldRule {
    /// String with at least one non-whitespace character.
    NonEmptyString,
    /// Array with at least one element.
    NonEmptyArray,
}

impl FieldRule {
    pub fn is_satisfied_by(self, value: &Value) -> bool {
        match self {
            Self::NonEmptyString => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            Self::NonEmptyArray => value.as_array().is_some_and(|a| !a.is_empty()),
        }
    }
}

/// Rule for one required top-level key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyRule {
    /// JSON object whose listed sub-fields must all be present and non-empty.
    Object(&'static [(&'static str, FieldRule)]),
    /// Non-empty string.
    NonEmptyString,
    /// The self-anchor string (checked against the recomputed hash).
    SelfAnchor,
}

/// Fixed structure of one packet family.
#[derive(Clone, Copy, Debug)]
pub struct PacketSchema {
    pub name: &'static str,
    pub keys: &'static [(&'static str, KeyRule)],
}

impl PacketSchema {
    /// Name of the key holding the self-anchor.
    pub fn anchor_key(&self) -> Option<&'static str> {
        self.keys
            .iter()
            .find(|(_, rule)| matches!(rule, KeyRule::SelfAnchor))
            .map(|(key, _)| *key)
    }

    pub fn is_required_key(&self, key: &str) -> bool {
        self.keys.iter().any(|(name, _)| *name == key)
    }
}

/// Key carrying the self-anchor in [`FAIL_PACKET`].
pub const SELF_ANCHOR_KEY: &str = "self_anchor";

/// FAIL_PACKET: failure evidence, mutation plan, verification script and
/// regression test, sealed by a self-anchor.
pub const FAIL_PACKET: PacketSchema = PacketSchema {
    name: "FAIL_PACKET",
    keys: &[
        (
            "failure",
            KeyRule::Object(&[
                ("summary", FieldRule::NonEmptyString),
                ("signals", FieldRule::NonEmptyArray),
                ("reproduction", FieldRule::NonEmptyString),
            ]),
        ),
        (
            "mutation_plan",
            KeyRule::Object(&[
                ("summary", FieldRule::NonEmptyString),
                ("targets", FieldRule::NonEmptyArray),
            ]),
        ),
        ("verification_script", KeyRule::NonEmptyString),
        (
            "regression_test",
            KeyRule::Object(&[
                ("name", FieldRule::NonEmptyString),
                ("command", FieldRule::NonEmptyString),
            ]),
        ),
        (SELF_ANCHOR_KEY, KeyRule::SelfAnchor),
    ],
};

/// Failure evidence carried by a packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub summary: String,
    pub signals: Vec<String>,
    pub reproduction: String,
}

/// Planned change that addresses the failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationPlan {
    pub summary: String,
    pub targets: Vec<String>,
}

/// Regression test guarding against the failure coming back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionTest {
    pub name: String,
    pub command: String,
}

/// Packet contents before sealing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PacketDraft {
    pub failure: Failure,
    pub mutation_plan: MutationPlan,
    pub verification_script: String,
    pub regression_test: RegressionTest,
}

/// A sealed FAIL_PACKET.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Packet {
    pub failure: Failure,
    pub mutation_plan: MutationPlan,
    pub verification_script: String,
    pub regression_test: RegressionTest,
    pub self_anchor: Anchor,
}

impl PacketDraft {
    /// Compute the self-anchor, embed it, and re-validate the result.
    pub fn seal(self) -> Result<Packet> {
        let mut value = serde_json::to_value(&self).map_err(EvGateError::Serialize)?;
        let anchor = super::validate::compute_self_anchor(&value)?;
        if let Value::Object(map) = &mut value {
            map.insert(SELF_ANCHOR_KEY.to_string(), Value::String(anchor.to_string()));
        }
        super::validate::validate(&value)?;

        Ok(Packet {
            failure: self.failure,
            mutation_plan: self.mutation_plan,
            verification_script: self.verification_script,
            regression_test: self.regression_test,
            self_anchor: anchor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fail_packet_declares_anchor_key() {
        assert_eq!(FAIL_PACKET.anchor_key(), Some(SELF_ANCHOR_KEY));
        assert!(FAIL_PACKET.is_required_key("verification_script"));
        assert!(!FAIL_PACKET.is_required_key("notes"));
    }

    #[test]
    fn field_rules() {
        assert!(FieldRule::NonEmptyString.is_satisfied_by(&json!("x")));
        assert!(!FieldRule::NonEmptyString.is_satisfied_by(&json!("   ")));
        assert!(!FieldRule::NonEmptyString.is_satisfied_by(&json!(3)));
        assert!(FieldRule::NonEmptyArray.is_satisfied_by(&json!(["a"])));
        assert!(!FieldRule::NonEmptyArray.is_satisfied_by(&json!([])));
        assert!(!FieldRule::NonEmptyArray.is_satisfied_by(&json!("a")));
    }
}
