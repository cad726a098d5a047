//! Fail-closed reduction of gate results into one verdict.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::policy::{BlockingPolicy, ClassSource, GateClass};
use super::result::{GateResult, GateStatus};
use crate::error::EvGateError;

/// Overall decision for a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
    /// Cannot determine; treat as not mergeable.
    Blocked,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Blocked => "BLOCKED",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A result with the class the policy assigned to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedGate {
    pub result: GateResult,
    pub class: GateClass,
    pub source: ClassSource,
}

/// Reduction of a run's results under a policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub reasons: Vec<String>,
    /// Every reported gate in id order (first report wins for duplicates).
    pub gates: Vec<ClassifiedGate>,
    /// Blocking gates with no result or no evidence pointer.
    pub missing: Vec<String>,
    /// Blocking gates that failed, reported an unknown status, or reported twice.
    pub failing: Vec<String>,
    /// Blocking gates that reported SKIP or PENDING.
    pub incomplete: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        self.status.is_pass()
    }

    /// Error describing the first reason this verdict is not PASS, when the
    /// reason maps onto the error taxonomy.
    pub fn primary_error(&self) -> Option<EvGateError> {
        if let Some(gate_id) = self.missing.first() {
            return Some(EvGateError::MissingEvidence {
                gate_id: gate_id.clone(),
            });
        }
        self.failing.iter().find_map(|gate_id| {
            let gate = self.gates.iter().find(|g| &g.result.gate_id == gate_id)?;
            match &gate.result.status {
                GateStatus::Unknown(raw) => Some(EvGateError::AmbiguousResult {
                    gate_id: gate_id.clone(),
                    status: raw.clone(),
                }),
                _ => None,
            }
        })
    }
}

/// Reduce `results` to a single verdict.
///
/// Outcome precedence: missing evidence for a blocking gate → BLOCKED;
/// otherwise any blocking FAIL/unknown/duplicate → FAIL; otherwise any
/// blocking SKIP/PENDING → BLOCKED; otherwise PASS. With no blocking gate
/// at all the verdict is BLOCKED.
pub fn aggregate(results: &[GateResult], policy: &BlockingPolicy) -> Verdict {
    let mut by_id: BTreeMap<&str, &GateResult> = BTreeMap::new();
    let mut duplicated: BTreeSet<&str> = BTreeSet::new();
    for result in results {
        if by_id.contains_key(result.gate_id.as_str()) {
            duplicated.insert(result.gate_id.as_str());
        } else {
            by_id.insert(result.gate_id.as_str(), result);
        }
    }

    let mut gates = Vec::with_capacity(by_id.len());
    let mut blocking_ids: BTreeSet<String> = BTreeSet::new();
    let mut missing: BTreeSet<String> = BTreeSet::new();
    let mut failing: BTreeSet<String> = BTreeSet::new();
    let mut incomplete: BTreeSet<String> = BTreeSet::new();

    for (id, result) in &by_id {
        let (class, source) = policy.classify(id);
        if source == ClassSource::Default {
            tracing::warn!(gate = id, "gate not in policy; treating as blocking");
        }

        match class {
            GateClass::Blocking => {
                blocking_ids.insert(id.to_string());
                if duplicated.contains(id) || result.status.is_failure() {
                    failing.insert(id.to_string());
                } else if result.status.is_incomplete() {
                    incomplete.insert(id.to_string());
                } else if !result.has_evidence() {
                    missing.insert(id.to_string());
                }
            }
            GateClass::Advisory => {
                if !result.status.is_pass() {
                    tracing::info!(
                        gate = id,
                        status = %result.status,
                        source = ?source,
                        "advisory gate not passing"
                    );
                }
            }
        }

        gates.push(ClassifiedGate {
            result: (*result).clone(),
            class,
            source,
        });
    }

    for id in policy.expected_blocking() {
        blocking_ids.insert(id.to_string());
        if !by_id.contains_key(id) {
            missing.insert(id.to_string());
        }
    }

    let mut reasons = Vec::new();
    for id in &missing {
        reasons.push(format!("missing evidence for gate {id}"));
    }
    for id in &failing {
        if duplicated.contains(id.as_str()) {
            reasons.push(format!("gate {id} reported more than once"));
        } else if let Some(result) = by_id.get(id.as_str()) {
            reasons.push(format!("gate {id} reported {}", result.status));
        }
    }
    for id in &incomplete {
        if let Some(result) = by_id.get(id.as_str()) {
            reasons.push(format!("gate {id} did not complete ({})", result.status));
        }
    }

    let status = if blocking_ids.is_empty() {
        reasons.push("no blocking gates defined".to_string());
        VerdictStatus::Blocked
    } else if !missing.is_empty() {
        VerdictStatus::Blocked
    } else if !failing.is_empty() {
        VerdictStatus::Fail
    } else if !incomplete.is_empty() {
        VerdictStatus::Blocked
    } else {
        reasons.push(format!("all {} blocking gates passed", blocking_ids.len()));
        VerdictStatus::Pass
    };

    tracing::info!(
        status = %status,
        blocking = blocking_ids.len(),
        reported = gates.len(),
        "gate verdict"
    );

    Verdict {
        status,
        reasons,
        gates,
        missing: missing.into_iter().collect(),
        failing: failing.into_iter().collect(),
        incomplete: incomplete.into_iter().collect(),
        mode: policy.mode.clone(),
    }
}
