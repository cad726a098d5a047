//! Evidence gate toolkit
//!
//! Deterministic primitives for CI merge gating:
//!
//! - [`anchor`]: SHA-256 content anchors over files and directory trees
//! - [`packet`]: self-anchored packet validation (fail-closed)
//! - [`gate`]: gate runners and the single blocking-policy aggregator
//! - [`evidence`]: canonical, atomic, idempotent report persistence
//! - [`drift`]: baseline drift detection with a scan/heal state machine
//!
//! Every operation is synchronous and runs to completion or fails; retries
//! belong to the caller.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod anchor;
pub mod canonical;
pub mod config;
pub mod drift;
pub mod error;
pub mod evidence;
pub mod gate;
pub mod packet;

pub use anchor::{Anchor, Exclusions};
pub use error::{EvGateError, Result};
pub use gate::{BlockingPolicy, GateClass, GateResult, GateStatus, Verdict, VerdictStatus};

/// Default configuration filename looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "evgate.toml";

/// Default state directory (excluded from hashing by default)
pub const DEFAULT_STATE_DIR: &str = ".evgate";
