//! Plain autoregressive decoding.
//!
//! ```text
//! while len < target_len:
//!     rows  = score(tokens)          one call per token
//!     token ~ rows[len - 1]
//!     tokens.push(token)
//! ```
//!
//! This is the baseline speculative decoding is measured against, and the
//! distribution it must reproduce when driven by the target scorer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::core::Sequence;
use crate::error::{Error, Result};
use crate::sampling::Distribution;
use crate::scorer::{score_checked, Scorer};
use crate::speculative::DecodeStats;

/// Decodes one token per scorer call.
pub struct AutoregressiveDecoder<S, R = StdRng> {
    /// The scorer sampled from.
    model: S,
    /// Random source for token draws.
    rng: R,
    /// Counters from the last `generate` call.
    stats: DecodeStats,
}

impl<S: Scorer> AutoregressiveDecoder<S, StdRng> {
    /// Create a decoder seeded from OS entropy.
    pub fn new(model: S) -> Self {
        Self::with_rng(model, StdRng::from_entropy())
    }

    /// Create a decoder with a specific seed for reproducibility.
    pub fn with_seed(model: S, seed: u64) -> Self {
        Self::with_rng(model, StdRng::seed_from_u64(seed))
    }
}

impl<S: Scorer, R: Rng> AutoregressiveDecoder<S, R> {
    /// Create a decoder over an arbitrary random source.
    pub fn with_rng(model: S, rng: R) -> Self {
        Self {
            model,
            rng,
            stats: DecodeStats::default(),
        }
    }

    /// Extend `prompt` by exactly `max_tokens` tokens.
    ///
    /// A scorer failure aborts the call; the prompt is never modified.
    ///
    /// # Returns
    ///
    /// Prompt followed by the generated tokens
    pub fn generate(&mut self, prompt: &[u32], max_tokens: usize) -> Result<Vec<u32>> {
        let mut sequence = Sequence::new(prompt, max_tokens)?;
        let mut stats = DecodeStats::default();

        while !sequence.is_finished() {
            let token = self.next_token(sequence.all_token_ids())?;
            sequence.append_token(token)?;

            stats.iterations += 1;
            stats.target_calls += 1;
            stats.generated_tokens += 1;
        }

        info!(
            generated = stats.generated_tokens,
            target_calls = stats.target_calls,
            "autoregressive decoding finished"
        );
        self.stats = stats;

        Ok(sequence.into_token_ids())
    }

    /// Score `tokens` and sample from the last row.
    pub fn next_token(&mut self, tokens: &[u32]) -> Result<u32> {
        if tokens.is_empty() {
            return Err(Error::EmptyPrompt);
        }
        let scores = score_checked(&mut self.model, tokens)?;
        let row = Distribution::from_row(&scores, tokens.len() - 1)?;
        row.sample(&mut self.rng)
    }

    /// Counters from the last `generate` call.
    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Get reference to the scorer.
    pub fn model(&self) -> &S {
        &self.model
    }

    /// Get mutable reference to the scorer.
    pub fn model_mut(&mut self) -> &mut S {
        &mut self.model
    }

    /// Release the scorer.
    pub fn into_model(self) -> S {
        self.model
    }
}
