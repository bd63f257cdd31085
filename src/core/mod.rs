//! Core bookkeeping for a single decode call.
//!
//! - Sequence: the append-only token buffer with its target length

pub mod sequence;

pub use sequence::Sequence;
