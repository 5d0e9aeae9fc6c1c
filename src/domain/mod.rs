//! Domain layer types and invariants.

pub mod block;
pub mod entities;
pub mod error;
pub mod fingerprint;
pub mod merge;
pub mod sanitize;
pub mod snapshot;
