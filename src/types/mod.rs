//! Shared value types.
//!
//! - `encoding`: deterministic binary codec behind checkpoints
//! - `hash`: SHA3-256 digests used for genotype identity

pub mod encoding;
pub mod hash;
