//! GPT-2 as a [`Scorer`].

use candle_core::Tensor;

use super::gpt2::Gpt2Model;
use crate::config::SamplingConfig;
use crate::error::Result;
use crate::sampling::Sampler;
use crate::scorer::Scorer;

/// Scores sequences with a GPT-2 model.
///
/// Logits are turned into probability rows by a [`Sampler`], so the
/// temperature and top-k/top-p settings shape both the draft and target
/// distributions before they are compared.
#[derive(Debug, Clone)]
pub struct ModelScorer {
    model: Gpt2Model,
    sampler: Sampler,
}

impl ModelScorer {
    /// Wrap `model` with the given sampling configuration.
    pub fn new(model: Gpt2Model, sampling: &SamplingConfig) -> Self {
        Self {
            model,
            sampler: Sampler::new(sampling),
        }
    }

    /// Returns the wrapped model.
    pub fn model(&self) -> &Gpt2Model {
        &self.model
    }
}

impl Scorer for ModelScorer {
    fn vocab_size(&self) -> usize {
        self.model.config().vocab_size
    }

    fn score(&mut self, tokens: &[u32]) -> Result<Tensor> {
        let input_ids = Tensor::new(tokens, self.model.device())?.unsqueeze(0)?;
        let logits = self.model.forward_all(&input_ids)?.squeeze(0)?;
        self.sampler.probabilities(&logits)
    }
}
