//! Packet file persistence.
//!
//! Reads fail deterministically on missing or unparsable files. Writes go
//! through the evidence writer, so packet files are canonical JSON with a
//! trailing newline and are replaced atomically.

use serde_json::Value;
use std::path::Path;

use crate::error::{EvGateError, Result};
use crate::evidence;

/// Read a packet document from disk without validating it.
pub fn read_packet(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| EvGateError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| EvGateError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a packet document atomically in canonical form.
pub fn write_packet(path: &Path, packet: &Value) -> Result<()> {
    evidence::write_json(packet, path)
}
