//! Speculative decoding configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::ModelSize;

/// Which GPT-2 sizes play draft and target, and how far to draft ahead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeculativeConfig {
    /// Number of tokens to speculate per iteration (K).
    /// Higher values pay off when the draft agrees with the target often,
    /// but waste draft calls when early drafts are rejected.
    /// K = 0 reduces to plain decoding through the target model.
    pub num_speculative_tokens: usize,

    /// Draft model size. Must share the target's vocabulary.
    pub draft_model: ModelSize,

    /// Target model size; its distribution is the one reproduced.
    pub target_model: ModelSize,

    /// Hub revision (branch, tag, or commit hash) for both checkpoints.
    pub revision: String,
}

impl Default for SpeculativeConfig {
    fn default() -> Self {
        Self {
            num_speculative_tokens: 4,
            draft_model: ModelSize::Small,
            target_model: ModelSize::Xl,
            revision: "main".to_string(),
        }
    }
}

impl SpeculativeConfig {
    /// Create a new speculative config for the given draft/target pair.
    pub fn new(draft_model: ModelSize, target_model: ModelSize) -> Self {
        Self {
            draft_model,
            target_model,
            ..Default::default()
        }
    }

    /// Set the number of speculative tokens.
    pub fn num_tokens(mut self, k: usize) -> Self {
        self.num_speculative_tokens = k;
        self
    }

    /// Set the checkpoint revision.
    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Whether the draft and target are the same checkpoint.
    ///
    /// Every draft is then accepted; useful only as a sanity check.
    pub fn is_self_draft(&self) -> bool {
        self.draft_model == self.target_model
    }

    /// Check the configuration can be used to load checkpoints.
    pub fn validate(&self) -> Result<()> {
        if self.revision.trim().is_empty() {
            return Err(Error::Config("revision must not be empty".into()));
        }
        Ok(())
    }
}
