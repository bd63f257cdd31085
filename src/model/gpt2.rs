//! GPT-2 model.
//!
//! ## Architecture
//!
//! ```text
//! Input Token IDs
//!       │
//!       ▼
//! ┌───────────────┐
//! │ wte + wpe     │  token + learned position embeddings
//! └───────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │  Gpt2Block    │ × n_layer
//! └───────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │   ln_f        │  Final layer norm
//! └───────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │   LM Head     │  tied to wte
//! └───────────────┘
//!       │
//!       ▼
//! Logits for every position
//! ```
//!
//! There is no KV cache: every call scores the whole sequence, matching the
//! stateless scorer contract the decoders rely on.

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{embedding, layer_norm, Embedding, LayerNorm, Linear, VarBuilder};
use serde::Deserialize;

use super::attention::causal_mask;
use super::block::Gpt2Block;
use crate::error::{Error, Result};

/// GPT-2 configuration from HuggingFace config.json.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Gpt2Config {
    /// Vocabulary size.
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    /// Maximum sequence length (learned position embeddings).
    #[serde(default = "default_n_positions")]
    pub n_positions: usize,
    /// Hidden dimension.
    pub n_embd: usize,
    /// Number of transformer blocks.
    pub n_layer: usize,
    /// Number of attention heads.
    pub n_head: usize,
    /// LayerNorm epsilon.
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
}

fn default_vocab_size() -> usize {
    50257
}

fn default_n_positions() -> usize {
    1024
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

/// GPT-2 language model with tied input/output embeddings.
#[derive(Debug, Clone)]
pub struct Gpt2Model {
    /// Token embeddings.
    wte: Embedding,
    /// Position embeddings.
    wpe: Embedding,
    /// Transformer blocks.
    blocks: Vec<Gpt2Block>,
    /// Final layer normalization.
    ln_f: LayerNorm,
    /// Language model head sharing `wte`'s weight.
    lm_head: Linear,
    /// Configuration.
    config: Gpt2Config,
    /// Device.
    device: Device,
    /// Data type.
    dtype: DType,
}

impl Gpt2Model {
    /// Creates a new Gpt2Model from a VarBuilder.
    ///
    /// # Arguments
    ///
    /// * `config` - Model configuration
    /// * `vb` - VarBuilder rooted where `wte.weight` lives
    pub fn new(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let wte = embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let wpe = embedding(config.n_positions, config.n_embd, vb.pp("wpe"))?;

        let mut blocks = Vec::with_capacity(config.n_layer);
        for i in 0..config.n_layer {
            blocks.push(Gpt2Block::new(
                config.n_embd,
                config.n_head,
                config.layer_norm_epsilon,
                vb.pp(format!("h.{i}")),
            )?);
        }

        let ln_f = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_f"))?;
        let lm_head = Linear::new(wte.embeddings().clone(), None);

        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            lm_head,
            config: config.clone(),
            device: vb.device().clone(),
            dtype: vb.dtype(),
        })
    }

    /// Forward pass returning logits for all positions.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Token IDs [batch, seq_len]
    ///
    /// # Returns
    ///
    /// Logits [batch, seq_len, vocab_size]
    pub fn forward_all(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_, seq_len) = input_ids.dims2()?;
        if seq_len == 0 {
            return Err(Error::EmptyPrompt);
        }
        if seq_len > self.config.n_positions {
            return Err(Error::ContextOverflow {
                len: seq_len,
                max: self.config.n_positions,
            });
        }

        let positions = Tensor::arange(0u32, seq_len as u32, &self.device)?;
        let mut hidden_states = self
            .wte
            .forward(input_ids)?
            .broadcast_add(&self.wpe.forward(&positions)?)?;

        let mask = causal_mask(seq_len, &self.device)?;
        for block in &self.blocks {
            hidden_states = block.forward(&hidden_states, &mask)?;
        }

        let hidden_states = self.ln_f.forward(&hidden_states)?;
        Ok(self.lm_head.forward(&hidden_states)?)
    }

    /// Forward pass returning logits for the last position [batch, vocab_size].
    pub fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let logits = self.forward_all(input_ids)?;
        let seq_len = logits.dim(1)?;
        Ok(logits.narrow(1, seq_len - 1, 1)?.squeeze(1)?)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Gpt2Config {
        &self.config
    }

    /// Returns the device.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Returns the data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the number of blocks.
    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpt2_config_defaults() {
        let json = r#"{
            "n_embd": 64,
            "n_layer": 2,
            "n_head": 4
        }"#;

        let config: Gpt2Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.vocab_size, 50257);
        assert_eq!(config.n_positions, 1024);
        assert_eq!(config.n_layer, 2);
        assert!((config.layer_norm_epsilon - 1e-5).abs() < 1e-12);
    }
}
