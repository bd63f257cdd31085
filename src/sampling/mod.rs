//! Sampling primitives shared by both decoding loops.
//!
//! - [`Distribution`]: a validated probability row, the only thing decoders
//!   sample from or index into.
//! - [`Sampler`]: temperature, top-k and top-p shaping of model logits into
//!   probability rows.

pub mod distribution;
pub mod sampler;

pub use distribution::Distribution;
pub use sampler::Sampler;
