//! Error taxonomy for evidence gate operations
//!
//! Every variant is terminal for the operation that raised it. Nothing in
//! this crate retries internally.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias
pub type Result<T> = std::result::Result<T, EvGateError>;

/// Evidence gate error taxonomy
#[derive(Debug, Error)]
pub enum EvGateError {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{message}: `{key}`")]
    Schema { message: String, key: String },

    #[error("anchor mismatch for {subject}: expected {expected}, actual {actual}")]
    AnchorMismatch {
        subject: String,
        expected: String,
        actual: String,
    },

    #[error("missing evidence for gate {gate_id}")]
    MissingEvidence { gate_id: String },

    #[error("ambiguous result for gate {gate_id}: {status}")]
    AmbiguousResult { gate_id: String, status: String },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize JSON: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot regenerate {component}: {reason}")]
    Regeneration { component: String, reason: String },
}

/// Exit codes shared by every CLI entry point
pub mod exit_codes {
    pub const PASS: i32 = 0;
    pub const FAIL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const FATAL: i32 = 3;
}

impl EvGateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub(crate) fn schema(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            key: key.into(),
        }
    }

    /// Stable short identifier used in one-line diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not-found",
            Self::Io { .. } => "io",
            Self::Schema { .. } => "schema",
            Self::AnchorMismatch { .. } => "anchor-mismatch",
            Self::MissingEvidence { .. } => "missing-evidence",
            Self::AmbiguousResult { .. } => "ambiguous-result",
            Self::Json { .. } | Self::Serialize(_) => "json",
            Self::Config(_) => "config",
            Self::Regeneration { .. } => "regeneration",
        }
    }

    /// Documented process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Schema { .. }
            | Self::AnchorMismatch { .. }
            | Self::MissingEvidence { .. }
            | Self::AmbiguousResult { .. } => exit_codes::FAIL,
            Self::NotFound { .. } | Self::Json { .. } | Self::Config(_) => exit_codes::USAGE,
            Self::Io { .. } | Self::Serialize(_) | Self::Regeneration { .. } => exit_codes::FATAL,
        }
    }

    /// Single-line diagnostic: `error[<kind>]: <message>`
    pub fn diagnostic(&self) -> String {
        let message = self.to_string().replace('\n', "; ");
        format!("error[{}]: {message}", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = EvGateError::io("/tmp/missing", Error::new(ErrorKind::NotFound, "gone"));
        assert!(matches!(err, EvGateError::NotFound { .. }));
        assert_eq!(err.exit_code(), exit_codes::USAGE);
    }

    #[test]
    fn io_other_stays_io() {
        let err = EvGateError::io("/tmp/x", Error::new(ErrorKind::PermissionDenied, "denied"));
        assert_eq!(err.kind(), "io");
        assert_eq!(err.exit_code(), exit_codes::FATAL);
    }

    #[test]
    fn validation_errors_exit_one() {
        let errors = [
            EvGateError::schema("unexpected top-level key", "extra"),
            EvGateError::AnchorMismatch {
                subject: "packet".into(),
                expected: "aa".into(),
                actual: "bb".into(),
            },
            EvGateError::MissingEvidence {
                gate_id: "lint".into(),
            },
            EvGateError::AmbiguousResult {
                gate_id: "lint".into(),
                status: "MAYBE".into(),
            },
        ];
        for err in errors {
            assert_eq!(err.exit_code(), exit_codes::FAIL, "{err}");
        }
    }

    #[test]
    fn diagnostic_is_single_line() {
        let err = EvGateError::Regeneration {
            component: "index".into(),
            reason: "line one\nline two".into(),
        };
        let line = err.diagnostic();
        assert!(line.starts_with("error[regeneration]: "));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn schema_message_names_key() {
        let err = EvGateError::schema("unexpected or missing top-level key", "extra");
        assert_eq!(err.to_string(), "unexpected or missing top-level key: `extra`");
    }
}
