//! Canonical content anchors
//!
//! An anchor is the lowercase hex SHA-256 of either raw file bytes or a
//! canonical listing of a directory tree. For a tree, every non-excluded
//! regular file contributes one record
//!
//! ```text
//! <relative/posix/path> \0 <sha256 of file bytes> \n
//! ```
//!
//! and records are concatenated in byte-wise order of their relative path.
//! Directories and symlinks inside the tree are never hashed, so the anchor
//! is independent of creation order, mtimes and the host path separator.
//! An empty tree anchors to the SHA-256 of the empty string.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use walkdir::WalkDir;
use wildmatch::WildMatch;

use crate::error::{EvGateError, Result};

/// Length of a hex-encoded SHA-256 digest.
pub const ANCHOR_HEX_LEN: usize = 64;

/// 64-char lowercase hex SHA-256 digest.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Anchor(String);

impl Anchor {
    /// Anchor of an in-memory byte slice.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a hex string from an untrusted
    /// source. Surrounding whitespace is a mismatch.
    pub fn matches_hex(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Anchor {
    type Err = EvGateError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != ANCHOR_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(EvGateError::schema(
                "anchor must be 64 hexadecimal characters",
                s,
            ));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Anchor {
    type Error = EvGateError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Anchor> for String {
    fn from(anchor: Anchor) -> Self {
        anchor.0
    }
}

/// Paths left out of directory anchors.
///
/// A pattern matches a relative path when it is equal to it, is a
/// directory prefix of it, or matches it as a wildcard glob (`*`, `?`).
#[derive(Clone, Debug, Default)]
pub struct Exclusions {
    patterns: Vec<String>,
}

impl Exclusions {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| normalize_pattern(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Whether `relative` (forward-slash separated) is excluded.
    pub fn is_excluded(&self, relative: &str) -> bool {
        self.patterns.iter().any(|pattern| {
            relative == pattern
                || relative
                    .strip_prefix(pattern.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
                || (is_glob(pattern) && WildMatch::new(pattern).matches(relative))
        })
    }
}

fn normalize_pattern(pattern: &str) -> String {
    let unified = pattern.trim().replace('\\', "/");
    let stripped = unified.strip_prefix("./").unwrap_or(&unified);
    stripped.trim_end_matches('/').to_string()
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Anchor a file or directory tree.
pub fn anchor_path(path: &Path, exclusions: &Exclusions) -> Result<Anchor> {
    let metadata = std::fs::metadata(path).map_err(|e| EvGateError::io(path, e))?;
    if metadata.is_file() {
        return hash_file(path);
    }

    let entries = tree_entries(path, exclusions)?;
    tracing::debug!(root = %path.display(), files = entries.len(), "anchored tree");
    Ok(combine(entries))
}

/// Stream a file through SHA-256.
pub fn hash_file(path: &Path) -> Result<Anchor> {
    let file = File::open(path).map_err(|e| EvGateError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| EvGateError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Anchor(format!("{:x}", hasher.finalize())))
}

/// `(relative_path, file_anchor)` for every tracked file under `root`.
///
/// Returned unsorted; [`combine`] orders them.
pub fn tree_entries(root: &Path, exclusions: &Exclusions) -> Result<Vec<(String, Anchor)>> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || relative_posix(root, entry.path())
                    .is_none_or(|rel| !exclusions.is_excluded(&rel))
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            EvGateError::io(path, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = relative_posix(root, entry.path()) else {
            continue;
        };
        entries.push((relative, hash_file(entry.path())?));
    }

    Ok(entries)
}

/// Combine named anchors into one, in byte-wise name order.
pub fn combine<I>(entries: I) -> Anchor
where
    I: IntoIterator<Item = (String, Anchor)>,
{
    let mut entries: Vec<(String, Anchor)> = entries.into_iter().collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut hasher = Sha256::new();
    for (name, anchor) in &entries {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(anchor.as_str().as_bytes());
        hasher.update(b"\n");
    }
    Anchor(format!("{:x}", hasher.finalize()))
}

fn relative_posix(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
