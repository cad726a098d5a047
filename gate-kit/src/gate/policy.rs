//! Blocking policy: which gates must pass.
//!
//! Classification is declared ahead of time and never inferred from a
//! gate's own output. Lookup order is gate entry, then category, then the
//! fail-closed default (blocking).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a gate's status can hold back the verdict.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateClass {
    /// Must be PASS for the verdict to be PASS.
    Blocking,
    /// Logged, never blocks.
    Advisory,
}

impl GateClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Advisory => "advisory",
        }
    }
}

/// Why a gate ended up with its class.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassSource {
    Gate,
    Category,
    /// Declared as expected to be non-PASS in the current mode.
    ReleaseMode,
    /// Not covered by the policy at all.
    Default,
}

/// Policy entry for one gate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<GateClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Modes in which a non-PASS status from this gate is expected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_non_pass_modes: Vec<String>,
}

impl GatePolicy {
    pub fn blocking(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class: Some(GateClass::Blocking),
            ..Default::default()
        }
    }

    pub fn advisory(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class: Some(GateClass::Advisory),
            ..Default::default()
        }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn expected_non_pass_in(mut self, mode: impl Into<String>) -> Self {
        self.expected_non_pass_modes.push(mode.into());
        self
    }
}

/// The single policy every aggregation runs under.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingPolicy {
    /// Current release/operating mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default)]
    pub gates: Vec<GatePolicy>,
    #[serde(default)]
    pub categories: BTreeMap<String, GateClass>,
}

impl BlockingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_gate(mut self, gate: GatePolicy) -> Self {
        self.gates.push(gate);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>, class: GateClass) -> Self {
        self.categories.insert(category.into(), class);
        self
    }

    pub fn gate(&self, id: &str) -> Option<&GatePolicy> {
        self.gates.iter().find(|g| g.id == id)
    }

    /// Effective class of a gate, from policy declarations only.
    pub fn classify(&self, id: &str) -> (GateClass, ClassSource) {
        let entry = self.gate(id);

        if let (Some(entry), Some(mode)) = (entry, self.mode.as_deref())
            && entry.expected_non_pass_modes.iter().any(|m| m == mode)
        {
            return (GateClass::Advisory, ClassSource::ReleaseMode);
        }

        if let Some(class) = entry.and_then(|e| e.class) {
            return (class, ClassSource::Gate);
        }

        let category = entry.and_then(|e| e.category.as_deref());
        if let Some(class) = category.and_then(|c| self.categories.get(c)) {
            return (*class, ClassSource::Category);
        }

        if entry.is_some() {
            (GateClass::Blocking, ClassSource::Gate)
        } else {
            (GateClass::Blocking, ClassSource::Default)
        }
    }

    /// Declared gates that are blocking in the current mode, sorted by id.
    pub fn expected_blocking(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .gates
            .iter()
            .filter(|g| self.classify(&g.id).0 == GateClass::Blocking)
            .map(|g| g.id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
