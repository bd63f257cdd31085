//! Configuration types for speculative-sampling.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::speculative::SpeculativeConfig;

/// Sampling configuration.
///
/// Applied by scorers when turning logits into probability rows, so draft
/// and target distributions are shaped the same way before the
/// accept/reject test compares them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Temperature for sampling (1.0 = no change, 0.0 = greedy).
    pub temperature: f32,
    /// Top-k sampling (0 = disabled).
    pub top_k: usize,
    /// Top-p (nucleus) sampling (1.0 = disabled).
    pub top_p: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 0,
            top_p: 1.0,
        }
    }
}

impl SamplingConfig {
    /// Greedy decoding: every row collapses onto its argmax.
    pub fn greedy() -> Self {
        Self {
            temperature: 0.0,
            ..Default::default()
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(Error::Config(format!(
                "temperature must be a non-negative number, got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(Error::Config(format!(
                "top_p must be in (0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// Configuration for one decode run, as read from a JSON file.
///
/// ```json
/// {
///   "max_tokens": 40,
///   "seed": 123,
///   "sampling": { "temperature": 1.0 },
///   "speculative": { "num_speculative_tokens": 4, "draft_model": "124M", "target_model": "1558M" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Number of tokens to generate beyond the prompt (N).
    pub max_tokens: usize,
    /// Seed for the random source; `None` draws one from OS entropy.
    pub seed: Option<u64>,
    /// How logits become probability rows.
    pub sampling: SamplingConfig,
    /// Draft/target selection and lookahead.
    pub speculative: SpeculativeConfig,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_tokens: 40,
            seed: None,
            sampling: SamplingConfig::default(),
            speculative: SpeculativeConfig::default(),
        }
    }
}

impl DecodeConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// The configured seed, or a fresh one from OS entropy.
    ///
    /// Resolve once and hand the result to every decoder that should share
    /// the random stream.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        self.sampling.validate()?;
        self.speculative.validate()
    }
}
