//! GPT-2 feed-forward network.
//!
//! `output = c_proj(gelu(c_fc(x)))` with a 4x expansion. GPT-2 uses the
//! tanh approximation of GELU, which is what `Tensor::gelu` computes.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Linear, VarBuilder};

use super::attention::conv1d;

/// GPT-2 MLP.
#[derive(Debug, Clone)]
pub struct Gpt2Mlp {
    /// Expansion [n_embd] -> [4 * n_embd].
    c_fc: Linear,
    /// Projection back [4 * n_embd] -> [n_embd].
    c_proj: Linear,
    /// Hidden dimension.
    hidden_size: usize,
    /// Intermediate dimension.
    intermediate_size: usize,
}

impl Gpt2Mlp {
    /// Creates a new Gpt2Mlp from a VarBuilder positioned at `h.{i}.mlp`.
    pub fn new(hidden_size: usize, vb: VarBuilder) -> Result<Self> {
        let intermediate_size = 4 * hidden_size;
        let c_fc = conv1d(hidden_size, intermediate_size, vb.pp("c_fc"))?;
        let c_proj = conv1d(intermediate_size, hidden_size, vb.pp("c_proj"))?;

        Ok(Self {
            c_fc,
            c_proj,
            hidden_size,
            intermediate_size,
        })
    }

    /// Returns the hidden size.
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Returns the intermediate size.
    pub fn intermediate_size(&self) -> usize {
        self.intermediate_size
    }
}

impl Module for Gpt2Mlp {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let hidden = self.c_fc.forward(x)?.gelu()?;
        self.c_proj.forward(&hidden)
    }
}
