//! Error types for speculative-sampling.

use thiserror::Error;

/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for speculative-sampling.
#[derive(Error, Debug)]
pub enum Error {
    /// A probability row was empty, negative, non-finite or summed to zero.
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    /// The scoring function failed; aborts the whole decode call.
    #[error("scorer failed: {0}")]
    Scorer(String),

    /// The scoring function returned a matrix of the wrong shape.
    #[error("scorer returned shape {actual:?} for a sequence of length {expected_rows} (vocab {vocab_size})")]
    ScoreShape {
        expected_rows: usize,
        vocab_size: usize,
        actual: Vec<usize>,
    },

    /// Decoding needs at least one token to condition on.
    #[error("prompt must contain at least one token")]
    EmptyPrompt,

    /// The sequence does not fit the model's position embeddings.
    #[error("sequence of {len} tokens exceeds context window of {max}")]
    ContextOverflow { len: usize, max: usize },

    /// Prompt length plus the token budget does not fit in `usize`.
    #[error("budget of {requested} tokens after {len} tokens overflows")]
    BudgetOverflow { len: usize, requested: usize },

    /// A token was appended past the requested target length.
    #[error("sequence already holds its target length of {0} tokens")]
    SequenceFull(usize),

    /// A speculative step was driven through an impossible transition.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: &'static str,
        to: &'static str,
    },

    /// Draft tokens and their distributions do not line up.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Model loading failed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Tokenization error.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
