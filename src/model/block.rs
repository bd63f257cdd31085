//! GPT-2 transformer block.
//!
//! Pre-norm residual layout:
//!
//! ```text
//! x = x + attn(ln_1(x))
//! x = x + mlp(ln_2(x))
//! ```

use candle_core::{Module, Result, Tensor};
use candle_nn::{layer_norm, LayerNorm, VarBuilder};

use super::attention::Gpt2Attention;
use super::mlp::Gpt2Mlp;

/// One GPT-2 block.
#[derive(Debug, Clone)]
pub struct Gpt2Block {
    /// Layer norm before attention.
    ln_1: LayerNorm,
    /// Causal self-attention.
    attn: Gpt2Attention,
    /// Layer norm before the MLP.
    ln_2: LayerNorm,
    /// Feed-forward MLP.
    mlp: Gpt2Mlp,
}

impl Gpt2Block {
    /// Creates a new Gpt2Block from a VarBuilder positioned at `h.{i}`.
    ///
    /// # Arguments
    ///
    /// * `hidden_size` - Model hidden dimension
    /// * `num_heads` - Number of attention heads
    /// * `layer_norm_eps` - Epsilon for both layer norms
    /// * `vb` - VarBuilder for loading weights
    pub fn new(
        hidden_size: usize,
        num_heads: usize,
        layer_norm_eps: f64,
        vb: VarBuilder,
    ) -> Result<Self> {
        let ln_1 = layer_norm(hidden_size, layer_norm_eps, vb.pp("ln_1"))?;
        let attn = Gpt2Attention::new(hidden_size, num_heads, vb.pp("attn"))?;
        let ln_2 = layer_norm(hidden_size, layer_norm_eps, vb.pp("ln_2"))?;
        let mlp = Gpt2Mlp::new(hidden_size, vb.pp("mlp"))?;

        Ok(Self {
            ln_1,
            attn,
            ln_2,
            mlp,
        })
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `hidden_states` - Input [batch, seq_len, hidden_size]
    /// * `mask` - Causal mask [seq_len, seq_len]
    pub fn forward(&self, hidden_states: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let residual = hidden_states;
        let attn_out = self.attn.forward(&self.ln_1.forward(hidden_states)?, mask)?;
        let hidden_states = (residual + attn_out)?;

        let mlp_out = self.mlp.forward(&self.ln_2.forward(&hidden_states)?)?;
        &hidden_states + mlp_out
    }
}
