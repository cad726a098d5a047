//! Gates and the blocking-policy aggregator
//!
//! Gate runners turn declared checks into [`GateResult`]s. One aggregator
//! reduces a run's results under one [`BlockingPolicy`] into a
//! [`Verdict`]. Missing, ambiguous or unclassified blocking gates never
//! reduce to PASS.

pub mod aggregate;
pub mod policy;
pub mod result;
pub mod runner;

pub use aggregate::{ClassifiedGate, Verdict, VerdictStatus, aggregate};
pub use policy::{BlockingPolicy, ClassSource, GateClass, GatePolicy};
pub use result::{GateResult, GateStatus};
pub use runner::{GateCheck, GateDefinition, GateRunner};
