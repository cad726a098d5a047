//! Scan/heal cycle.
//!
//! One call to [`DriftMonitor::scan`] is one full cycle: it takes the
//! previous [`DriftState`] and returns the next one together with the
//! modes visited on the way. Nothing is kept between calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use super::component::TrackedComponent;
use super::state::{Baseline, DriftFailure, DriftMode, DriftState, combined_anchor};
use crate::anchor::{self, Anchor, Exclusions};
use crate::error::{EvGateError, Result};
use crate::evidence;

/// Outcome of one cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Modes visited in order, ending with the resulting mode.
    pub transitions: Vec<DriftMode>,
    pub state: DriftState,
}

impl ScanReport {
    pub fn mode(&self) -> DriftMode {
        self.state.mode
    }

    pub fn healed(&self) -> bool {
        self.transitions.contains(&DriftMode::Healed)
    }
}

pub struct DriftMonitor {
    root: PathBuf,
    components: Vec<TrackedComponent>,
    exclusions: Exclusions,
}

impl DriftMonitor {
    pub fn new(
        root: impl Into<PathBuf>,
        components: Vec<TrackedComponent>,
        exclusions: Exclusions,
    ) -> Self {
        Self {
            root: root.into(),
            components,
            exclusions,
        }
    }

    /// Anchor every tracked component. Every path must exist.
    pub fn capture_baseline(&self, now: DateTime<Utc>) -> Result<Baseline> {
        let mut components = BTreeMap::new();
        for component in &self.components {
            let anchor = anchor::anchor_path(&component.resolve(&self.root), &self.exclusions)?;
            components.insert(component.name.clone(), anchor);
        }
        let baseline = Baseline::new(components, evidence::timestamp(now));
        tracing::info!(
            anchor = %baseline.baseline_anchor,
            components = baseline.components.len(),
            "baseline captured"
        );
        Ok(baseline)
    }

    /// Live anchors per component; `None` when the tracked path is gone.
    pub fn live_anchors(&self) -> Result<BTreeMap<String, Option<Anchor>>> {
        let mut live = BTreeMap::new();
        for component in &self.components {
            let anchor = match anchor::anchor_path(&component.resolve(&self.root), &self.exclusions)
            {
                Ok(anchor) => Some(anchor),
                Err(EvGateError::NotFound { path }) => {
                    tracing::warn!(component = %component.name, path = %path.display(), "tracked path missing");
                    None
                }
                Err(e) => return Err(e),
            };
            live.insert(component.name.clone(), anchor);
        }
        Ok(live)
    }

    /// Run one scan cycle from `previous`.
    ///
    /// Errors are returned only when the initial scan itself cannot read
    /// the tree. Anything that goes wrong while healing ends in HALT.
    pub fn scan(
        &self,
        previous: &DriftState,
        baseline: &Baseline,
        now: DateTime<Utc>,
    ) -> Result<ScanReport> {
        let timestamp = evidence::timestamp(now);

        if previous.mode == DriftMode::Halt {
            tracing::warn!("drift monitor halted; baseline reset required");
            let mut state = previous.clone();
            state.timestamp = timestamp;
            return Ok(ScanReport {
                transitions: vec![DriftMode::Halt],
                state,
            });
        }

        let mut transitions = vec![DriftMode::Scanning];
        let live = self.live_anchors()?;
        let live_anchor = live_combined(&live);
        let drifted = drifted_components(baseline, &live);

        let mut state = DriftState {
            mode: DriftMode::Nominal,
            baseline_anchor: baseline.baseline_anchor.clone(),
            live_anchor,
            timestamp,
            drifted: drifted.clone(),
            failures: Vec::new(),
        };

        if drifted.is_empty() {
            transitions.push(DriftMode::Nominal);
            return Ok(self.finish(transitions, state, previous.mode));
        }

        transitions.push(DriftMode::Drift);
        tracing::info!(components = ?drifted, "drift detected");

        let unhealable: Vec<&String> = drifted
            .iter()
            .filter(|name| {
                self.component(name)
                    .is_none_or(|c| !c.is_regeneratable())
            })
            .collect();

        if !unhealable.is_empty() {
            state.failures = drifted
                .iter()
                .map(|name| failure(baseline, &live, name, None))
                .collect();
            state.mode = DriftMode::Alert;
            transitions.push(DriftMode::Alert);
            return Ok(self.finish(transitions, state, previous.mode));
        }

        transitions.push(DriftMode::Healing);
        match self.heal(&drifted, baseline) {
            Ok((healed_live, remaining)) => {
                state.live_anchor = live_combined(&healed_live);
                if remaining.is_empty() {
                    state.drifted = Vec::new();
                    transitions.push(DriftMode::Healed);
                    transitions.push(DriftMode::Nominal);
                    state.mode = DriftMode::Nominal;
                } else {
                    state.failures = remaining
                        .iter()
                        .map(|name| {
                            failure(
                                baseline,
                                &healed_live,
                                name,
                                Some("regenerated content does not match baseline".to_string()),
                            )
                        })
                        .collect();
                    state.mode = DriftMode::Halt;
                    transitions.push(DriftMode::Halt);
                }
            }
            Err((name, err)) => {
                state.failures = vec![failure(baseline, &live, &name, Some(err.to_string()))];
                state.mode = DriftMode::Halt;
                transitions.push(DriftMode::Halt);
            }
        }

        Ok(self.finish(transitions, state, previous.mode))
    }

    /// Regenerate every drifted component, then re-anchor the whole set.
    /// Returns the post-heal live anchors and the components still off.
    fn heal(
        &self,
        drifted: &[String],
        baseline: &Baseline,
    ) -> std::result::Result<(BTreeMap<String, Option<Anchor>>, Vec<String>), (String, EvGateError)>
    {
        for name in drifted {
            let Some(component) = self.component(name) else {
                continue;
            };
            tracing::info!(component = %name, "regenerating");
            component
                .regenerate(&self.root)
                .map_err(|e| (name.clone(), e))?;
        }

        let live = self
            .live_anchors()
            .map_err(|e| (drifted.join(","), e))?;
        let remaining = drifted_components(baseline, &live);
        Ok((live, remaining))
    }

    fn component(&self, name: &str) -> Option<&TrackedComponent> {
        self.components.iter().find(|c| c.name == name)
    }

    fn finish(
        &self,
        transitions: Vec<DriftMode>,
        state: DriftState,
        previous: DriftMode,
    ) -> ScanReport {
        if state.mode != previous {
            tracing::info!(from = %previous, to = %state.mode, "drift state changed");
        }
        match state.mode {
            DriftMode::Alert => {
                tracing::warn!(components = ?state.drifted, "source drift; baseline update required")
            }
            DriftMode::Halt => tracing::warn!(failures = state.failures.len(), "heal failed; halted"),
            _ => {}
        }
        ScanReport { transitions, state }
    }
}

fn live_combined(live: &BTreeMap<String, Option<Anchor>>) -> Option<Anchor> {
    let present: BTreeMap<String, Anchor> = live
        .iter()
        .filter_map(|(name, anchor)| anchor.clone().map(|a| (name.clone(), a)))
        .collect();
    if present.len() == live.len() {
        Some(combined_anchor(&present))
    } else {
        None
    }
}

/// Names whose live anchor differs from the baseline, including components
/// that appear on only one side.
fn drifted_components(baseline: &Baseline, live: &BTreeMap<String, Option<Anchor>>) -> Vec<String> {
    let names: BTreeSet<&String> = baseline.components.keys().chain(live.keys()).collect();
    names
        .into_iter()
        .filter(|name| {
            let expected = baseline.components.get(*name);
            let actual = live.get(*name).and_then(Option::as_ref);
            expected != actual
        })
        .cloned()
        .collect()
}

fn failure(
    baseline: &Baseline,
    live: &BTreeMap<String, Option<Anchor>>,
    name: &str,
    reason: Option<String>,
) -> DriftFailure {
    DriftFailure {
        component: name.to_string(),
        expected: baseline.components.get(name).cloned(),
        actual: live.get(name).cloned().flatten(),
        reason,
    }
}
