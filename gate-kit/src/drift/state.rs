//! Drift state and baseline values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::anchor::{self, Anchor};

/// Modes of the scan/heal state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftMode {
    Nominal,
    Scanning,
    Drift,
    Healing,
    Healed,
    /// Source drift; waits for a human to update the baseline.
    Alert,
    /// Absorbing. Only a fresh baseline clears it.
    Halt,
}

impl DriftMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nominal => "NOMINAL",
            Self::Scanning => "SCANNING",
            Self::Drift => "DRIFT",
            Self::Healing => "HEALING",
            Self::Healed => "HEALED",
            Self::Alert => "ALERT",
            Self::Halt => "HALT",
        }
    }

    /// Whether a cycle ending in this mode needs attention. Only NOMINAL
    /// and HEALED are settled.
    pub fn needs_attention(&self) -> bool {
        !matches!(self, Self::Nominal | Self::Healed)
    }
}

impl fmt::Display for DriftMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured record of a component that could not be reconciled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftFailure {
    pub component: String,
    /// Baseline anchor, absent when the component was never baselined.
    pub expected: Option<Anchor>,
    /// Live anchor, absent when the tracked path no longer exists.
    pub actual: Option<Anchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Contents of the drift status file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftState {
    pub mode: DriftMode,
    pub baseline_anchor: Anchor,
    pub live_anchor: Option<Anchor>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drifted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DriftFailure>,
}

impl DriftState {
    /// State right after a baseline capture.
    pub fn initial(baseline: &Baseline) -> Self {
        Self {
            mode: DriftMode::Nominal,
            baseline_anchor: baseline.baseline_anchor.clone(),
            live_anchor: Some(baseline.baseline_anchor.clone()),
            timestamp: baseline.captured_at.clone(),
            drifted: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Recorded per-component anchors plus their combination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub baseline_anchor: Anchor,
    pub components: BTreeMap<String, Anchor>,
    pub captured_at: String,
}

impl Baseline {
    pub fn new(components: BTreeMap<String, Anchor>, captured_at: impl Into<String>) -> Self {
        Self {
            baseline_anchor: combined_anchor(&components),
            components,
            captured_at: captured_at.into(),
        }
    }

    /// Whether the stored combined anchor still agrees with the components.
    pub fn is_consistent(&self) -> bool {
        combined_anchor(&self.components) == self.baseline_anchor
    }
}

/// Combined anchor over named component anchors, same layout as a tree.
pub fn combined_anchor(components: &BTreeMap<String, Anchor>) -> Anchor {
    anchor::combine(
        components
            .iter()
            .map(|(name, anchor)| (name.clone(), anchor.clone())),
    )
}
