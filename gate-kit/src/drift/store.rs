//! Status and baseline files.
//!
//! State is only ever read or written here, at the caller's boundary; the
//! monitor itself takes and returns values.

use serde::de::DeserializeOwned;
use std::path::Path;

use super::state::{Baseline, DriftState};
use crate::error::{EvGateError, Result};
use crate::evidence;

pub fn read_baseline(path: &Path) -> Result<Baseline> {
    read_json(path)
}

pub fn write_baseline(path: &Path, baseline: &Baseline) -> Result<()> {
    evidence::write_report(baseline, path)
}

/// Previous status, or `None` before the first scan.
pub fn read_state(path: &Path) -> Result<Option<DriftState>> {
    match read_json(path) {
        Ok(state) => Ok(Some(state)),
        Err(EvGateError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn write_state(path: &Path, state: &DriftState) -> Result<()> {
    evidence::write_report(state, path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| EvGateError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| EvGateError::Json {
        path: path.to_path_buf(),
        source,
    })
}
