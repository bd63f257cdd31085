//! Decoding engines.
//!
//! This module provides:
//! - AutoregressiveDecoder: one scorer call per generated token
//! - TextGenerator: tokenizer front end timing either decoder

pub mod autoregressive;
pub mod generator;

pub use autoregressive::AutoregressiveDecoder;
pub use generator::{GenerationOutput, TextGenerator};
