//! Drift/heal monitor
//!
//! Compares live anchors of tracked components against a recorded
//! baseline. Drift confined to regeneratable components is healed from
//! declared inputs; drift in source components raises ALERT and is left
//! untouched. A heal that cannot be reconciled ends in HALT, which only a
//! fresh baseline clears.

pub mod component;
pub mod monitor;
pub mod state;
pub mod store;

pub use component::{ComponentClass, Generator, TrackedComponent};
pub use monitor::{DriftMonitor, ScanReport};
pub use state::{Baseline, DriftFailure, DriftMode, DriftState};
pub use store::{read_baseline, read_state, write_baseline, write_state};
