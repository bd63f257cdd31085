//! speculative-sampling: autoregressive and speculative decoding in Rust.
//!
//! This crate implements:
//! - A shared token-sampling primitive over validated distributions
//! - Plain autoregressive decoding over any scoring function
//! - Speculative decoding: a draft scorer proposes K tokens, a target
//!   scorer verifies them, and rejection sampling keeps the output
//!   distributed exactly as the target alone
//! - GPT-2 checkpoints as scorers for end-to-end comparisons

pub mod config;
pub mod error;

pub mod core;
pub mod engine;
pub mod model;
pub mod sampling;
pub mod scorer;
pub mod speculative;

pub use config::{DecodeConfig, SamplingConfig};
pub use engine::{AutoregressiveDecoder, GenerationOutput, TextGenerator};
pub use error::{Error, Result};
pub use model::{load_scorer, Gpt2Config, Gpt2Model, ModelScorer, ModelSize};
pub use sampling::{Distribution, Sampler};
pub use scorer::{FnScorer, Scorer, StaticScorer};
pub use speculative::{
    DecodeStats, FinalToken, Phase, RejectionSampler, SpeculativeConfig, SpeculativeDecoder,
    SpeculativeStep, Verification,
};
