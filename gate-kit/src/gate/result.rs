//! Gate results as reported by individual checks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome reported by one gate.
///
/// Anything outside the known vocabulary is kept verbatim as
/// [`GateStatus::Unknown`] so it can be reported, never silently mapped.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GateStatus {
    Pass,
    Fail,
    Skip,
    Pending,
    Unknown(String),
}

impl GateStatus {
    /// Parse a status string. Only the exact upper-case vocabulary is
    /// recognised; anything else stays [`GateStatus::Unknown`].
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PASS" => Self::Pass,
            "FAIL" => Self::Fail,
            "SKIP" => Self::Skip,
            "PENDING" => Self::Pending,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
            Self::Pending => "PENDING",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// FAIL or a status outside the known vocabulary.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail | Self::Unknown(_))
    }

    /// SKIP or PENDING: the gate did not produce a decision.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Skip | Self::Pending)
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for GateStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<GateStatus> for String {
    fn from(status: GateStatus) -> Self {
        status.as_str().to_string()
    }
}

/// One check's outcome. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: String,
    pub status: GateStatus,
    /// Path or URL of the supporting output.
    #[serde(default)]
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl GateResult {
    pub fn new(gate_id: impl Into<String>, status: GateStatus, evidence: impl Into<String>) -> Self {
        Self {
            gate_id: gate_id.into(),
            status,
            evidence: evidence.into(),
            message: None,
            exit_code: None,
        }
    }

    pub fn pass(gate_id: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self::new(gate_id, GateStatus::Pass, evidence)
    }

    pub fn fail(gate_id: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self::new(gate_id, GateStatus::Fail, evidence)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn has_evidence(&self) -> bool {
        !self.evidence.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parse_accepts_exact_vocabulary_only() {
        assert_eq!(GateStatus::parse("PASS"), GateStatus::Pass);
        assert_eq!(GateStatus::parse("PENDING"), GateStatus::Pending);
        assert_eq!(GateStatus::parse("pass"), GateStatus::Unknown("pass".into()));
        assert_eq!(GateStatus::parse(" PASS"), GateStatus::Unknown(" PASS".into()));
        assert!(GateStatus::parse(" Fail ").is_failure());
        assert_eq!(
            GateStatus::parse("PASSED"),
            GateStatus::Unknown("PASSED".into())
        );
    }

    #[test]
    fn unknown_status_survives_serde() {
        let result: GateResult = serde_json::from_value(json!({
            "gate_id": "sbom",
            "status": "MAYBE",
            "evidence": "out/sbom.log",
        }))
        .expect("deserialize");
        assert_eq!(result.status, GateStatus::Unknown("MAYBE".into()));
        assert!(result.status.is_failure());

        let back = serde_json::to_value(&result).expect("serialize");
        assert_eq!(back["status"], json!("MAYBE"));
        assert!(back.get("message").is_none());
    }

    #[test]
    fn evidence_defaults_to_empty() {
        let result: GateResult =
            serde_json::from_value(json!({"gate_id": "lint", "status": "PASS"}))
                .expect("deserialize");
        assert!(!result.has_evidence());
    }
}
