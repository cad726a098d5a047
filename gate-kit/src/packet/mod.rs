//! Self-anchored packets
//!
//! A packet is one unit of auditable work. It is accepted only when its
//! top-level keys are exactly the schema's set, every required nested
//! field is present and non-empty, and its `self_anchor` equals the SHA-256
//! of its own canonical serialization with `self_anchor` removed. There is
//! no partially valid packet.

pub mod io;
pub mod schema;
pub mod validate;

pub use io::{read_packet, write_packet};
pub use schema::{
    FAIL_PACKET, Failure, FieldRule, KeyRule, MutationPlan, Packet, PacketDraft, PacketSchema,
    RegressionTest, SELF_ANCHOR_KEY,
};
pub use validate::{
    ValidationResult, compute_self_anchor, compute_self_anchor_with, validate, validate_with,
};
