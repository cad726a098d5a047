//! Evidence writer
//!
//! Reports are written as canonical JSON (sorted keys, compact, one
//! trailing newline) through a temp file in the destination directory,
//! `sync_all`, then `rename`. The same logical report always yields the
//! same bytes, so a regenerated report can be compared byte-for-byte with
//! a committed one.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::canonical;
use crate::error::{EvGateError, Result};
use crate::gate::{GateClass, Verdict, VerdictStatus};

/// Reason recorded when a checker produced nothing.
pub const NO_REPORT_REASON: &str = "no report produced";

/// One gate line in a report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateEntry {
    pub gate_id: String,
    pub status: String,
    pub evidence: String,
    pub class: GateClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Gate report file consumed by merge gating and the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub status: VerdictStatus,
    pub reason: Vec<String>,
    pub gates: Vec<GateEntry>,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl GateReport {
    pub fn from_verdict(verdict: &Verdict, generated_at: DateTime<Utc>) -> Self {
        let gates = verdict
            .gates
            .iter()
            .map(|g| GateEntry {
                gate_id: g.result.gate_id.clone(),
                status: g.result.status.to_string(),
                evidence: g.result.evidence.clone(),
                class: g.class,
                message: g.result.message.clone(),
                exit_code: g.result.exit_code,
            })
            .collect();

        Self {
            status: verdict.status,
            reason: verdict.reasons.clone(),
            gates,
            generated_at: timestamp(generated_at),
            mode: verdict.mode.clone(),
        }
    }

    /// Minimal report for a checker that crashed before reporting.
    pub fn fallback(generated_at: DateTime<Utc>) -> Self {
        Self {
            status: VerdictStatus::Blocked,
            reason: vec![NO_REPORT_REASON.to_string()],
            gates: Vec::new(),
            generated_at: timestamp(generated_at),
            mode: None,
        }
    }
}

/// UTC timestamp in the report layout: `2026-01-02T03:04:05Z`.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Canonical bytes of a report: sorted keys, compact, trailing newline.
pub fn render<T: Serialize>(report: &T) -> Result<String> {
    let mut rendered = canonical::serialize_canonical(report)?;
    rendered.push('\n');
    Ok(rendered)
}

/// Write an arbitrary JSON report to `dest`.
pub fn write_json(report: &Value, dest: &Path) -> Result<()> {
    write_report(report, dest)
}

/// Write any serializable report to `dest`.
pub fn write_report<T: Serialize>(report: &T, dest: &Path) -> Result<()> {
    let rendered = render(report)?;
    write_atomic(dest, rendered.as_bytes())?;
    tracing::debug!(path = %dest.display(), bytes = rendered.len(), "report written");
    Ok(())
}

/// Write the BLOCKED fallback report to `dest`.
pub fn write_fallback(dest: &Path, generated_at: DateTime<Utc>) -> Result<()> {
    tracing::warn!(path = %dest.display(), "writing fallback report");
    write_report(&GateReport::fallback(generated_at), dest)
}

/// Whether `dest` already holds exactly the bytes `report` renders to.
pub fn matches_existing<T: Serialize>(report: &T, dest: &Path) -> Result<bool> {
    let rendered = render(report)?;
    let existing = std::fs::read(dest).map_err(|e| EvGateError::io(dest, e))?;
    Ok(existing == rendered.as_bytes())
}

/// Replace `dest` with `bytes` so readers see either the old or the new
/// file, never a partial one.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| EvGateError::io(&parent, e))?;

    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let temp_path = parent.join(format!(".{name}.{}.tmp", std::process::id()));

    let result = (|| {
        let mut file =
            std::fs::File::create(&temp_path).map_err(|e| EvGateError::io(&temp_path, e))?;
        file.write_all(bytes)
            .map_err(|e| EvGateError::io(&temp_path, e))?;
        file.sync_all().map_err(|e| EvGateError::io(&temp_path, e))?;
        std::fs::rename(&temp_path, dest).map_err(|e| EvGateError::Io {
            path: dest.to_path_buf(),
            source: e,
        })
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}
