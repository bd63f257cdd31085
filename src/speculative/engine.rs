//! Speculative decoding engine.
//!
//! Orchestrates draft scorer, target scorer, and rejection sampling
//! for faster token generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::config::SpeculativeConfig;
use super::sampler::{RejectionSampler, Verification};
use super::state::SpeculativeStep;
use super::stats::DecodeStats;
use crate::core::Sequence;
use crate::error::{Error, Result};
use crate::scorer::Scorer;

/// Speculative decoding engine.
///
/// Coordinates between a small draft scorer and a large target scorer
/// to accelerate autoregressive text generation.
///
/// ## Workflow
///
/// 1. **Draft**: Generate K tokens with the fast draft scorer
/// 2. **Score**: Run both scorers once over the drafted sequence
/// 3. **Accept/Reject**: Use rejection sampling to determine final tokens
///
/// ## Example
///
/// ```text
/// Input:  [The, quick, brown]
/// Draft:  [fox, jumps, over, the]     <- 4 speculative tokens
/// Target: Score all 7 positions       <- 1 target call
/// Result: [fox, jumps, over, a]       <- 3 accepted + 1 resampled
/// ```
///
/// The output is distributed exactly as sampling from the target alone.
pub struct SpeculativeDecoder<D, T, R = StdRng> {
    /// Small draft scorer (fast approximation).
    draft_model: D,
    /// Large target scorer (ground truth).
    target_model: T,
    /// Configuration.
    config: SpeculativeConfig,
    /// Rejection sampler; owns the random source.
    rejection_sampler: RejectionSampler<R>,
    /// Counters from the last `generate` call.
    stats: DecodeStats,
}

impl<D: Scorer, T: Scorer> SpeculativeDecoder<D, T, StdRng> {
    /// Create a new speculative decoder seeded from OS entropy.
    ///
    /// # Arguments
    ///
    /// * `draft_model` - Fast scorer for drafting
    /// * `target_model` - Scorer whose distribution is reproduced
    /// * `config` - Speculative decoding configuration
    pub fn new(draft_model: D, target_model: T, config: SpeculativeConfig) -> Result<Self> {
        Self::with_rng(draft_model, target_model, config, StdRng::from_entropy())
    }

    /// Create with a seeded RNG for reproducibility.
    pub fn with_seed(
        draft_model: D,
        target_model: T,
        config: SpeculativeConfig,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(draft_model, target_model, config, StdRng::seed_from_u64(seed))
    }
}

impl<D: Scorer, T: Scorer, R: Rng> SpeculativeDecoder<D, T, R> {
    /// Create over an arbitrary random source.
    ///
    /// Fails if the two scorers disagree on vocabulary size.
    pub fn with_rng(draft_model: D, target_model: T, config: SpeculativeConfig, rng: R) -> Result<Self> {
        if draft_model.vocab_size() != target_model.vocab_size() {
            return Err(Error::Config(format!(
                "draft vocabulary ({}) differs from target vocabulary ({})",
                draft_model.vocab_size(),
                target_model.vocab_size()
            )));
        }

        Ok(Self {
            draft_model,
            target_model,
            config,
            rejection_sampler: RejectionSampler::with_rng(rng),
            stats: DecodeStats::default(),
        })
    }

    /// Extend `prompt` by exactly `max_tokens` tokens.
    ///
    /// Each iteration drafts `min(K, remaining - 1)` tokens so no iteration
    /// emits more than the remaining budget. A scorer failure aborts the
    /// call; the prompt is never modified.
    ///
    /// # Returns
    ///
    /// Prompt followed by the generated tokens
    pub fn generate(&mut self, prompt: &[u32], max_tokens: usize) -> Result<Vec<u32>> {
        let mut sequence = Sequence::new(prompt, max_tokens)?;
        let mut stats = DecodeStats::default();

        while !sequence.is_finished() {
            let lookahead = self
                .config
                .num_speculative_tokens
                .min(sequence.remaining() - 1);

            let step = self.run_step(sequence.all_token_ids(), lookahead)?;
            sequence.extend(step.emitted())?;

            debug!(
                iteration = stats.iterations + 1,
                drafted = step.drafted().len(),
                accepted = step.stats().accepted_tokens,
                emitted = step.emitted().len(),
                outcome = ?step.final_token(),
                "speculative iteration"
            );
            stats.merge(step.stats());
        }

        info!(
            generated = stats.generated_tokens,
            iterations = stats.iterations,
            target_calls = stats.target_calls,
            draft_calls = stats.draft_calls,
            acceptance_rate = ?stats.acceptance_rate(),
            tokens_per_iteration = stats.tokens_per_iteration(),
            "speculative decoding finished"
        );
        self.stats = stats;

        Ok(sequence.into_token_ids())
    }

    /// Perform one speculative iteration with the configured K.
    ///
    /// # Arguments
    ///
    /// * `tokens` - Current committed sequence
    ///
    /// # Returns
    ///
    /// Accepted drafts plus the resampled or bonus token (1 to K+1 tokens)
    pub fn speculative_step(&mut self, tokens: &[u32]) -> Result<Verification> {
        let step = self.run_step(tokens, self.config.num_speculative_tokens)?;
        self.stats.merge(step.stats());
        step.into_verification()
    }

    fn run_step(&mut self, tokens: &[u32], lookahead: usize) -> Result<SpeculativeStep> {
        let mut step = SpeculativeStep::new(tokens, lookahead)?;
        step.run(
            &mut self.draft_model,
            &mut self.target_model,
            &mut self.rejection_sampler,
        )?;
        Ok(step)
    }

    /// Counters from the last `generate` call (plus any later single steps).
    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Get the speculative configuration.
    pub fn config(&self) -> &SpeculativeConfig {
        &self.config
    }

    /// Get reference to the target scorer.
    pub fn target_model(&self) -> &T {
        &self.target_model
    }

    /// Get mutable reference to the target scorer.
    pub fn target_model_mut(&mut self) -> &mut T {
        &mut self.target_model
    }

    /// Get reference to the draft scorer.
    pub fn draft_model(&self) -> &D {
        &self.draft_model
    }

    /// Get mutable reference to the draft scorer.
    pub fn draft_model_mut(&mut self) -> &mut D {
        &mut self.draft_model
    }

    /// Release the scorers.
    pub fn into_models(self) -> (D, T) {
        (self.draft_model, self.target_model)
    }
}
