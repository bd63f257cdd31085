//! GPT-2 causal self-attention.
//!
//! Multi-head attention with a fused QKV projection and a causal mask.
//! Every position attends to itself and everything before it, which is
//! what lets one forward pass score all positions of a drafted sequence.

use candle_core::{Device, Module, Result, Tensor, D};
use candle_nn::{Linear, VarBuilder};

/// Loads a GPT-2 `Conv1D` layer as a [`Linear`].
///
/// GPT-2 checkpoints store projection weights as `[in, out]`; `Linear`
/// expects `[out, in]`, so the weight is transposed once at load time.
pub fn conv1d(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    let weight = vb.get((in_dim, out_dim), "weight")?.t()?.contiguous()?;
    let bias = vb.get(out_dim, "bias")?;
    Ok(Linear::new(weight, Some(bias)))
}

/// GPT-2 multi-head causal self-attention.
#[derive(Debug, Clone)]
pub struct Gpt2Attention {
    /// Fused projection [n_embd] -> [3 * n_embd] (Q, K, V).
    c_attn: Linear,
    /// Output projection [n_embd] -> [n_embd].
    c_proj: Linear,
    /// Number of attention heads.
    num_heads: usize,
    /// Dimension per head.
    head_dim: usize,
    /// Scaling factor for attention scores.
    scale: f64,
}

impl Gpt2Attention {
    /// Creates a new Gpt2Attention from a VarBuilder.
    ///
    /// # Arguments
    ///
    /// * `hidden_size` - Model hidden dimension (n_embd)
    /// * `num_heads` - Number of attention heads
    /// * `vb` - VarBuilder positioned at `h.{i}.attn`
    pub fn new(hidden_size: usize, num_heads: usize, vb: VarBuilder) -> Result<Self> {
        if hidden_size % num_heads != 0 {
            candle_core::bail!("n_embd {hidden_size} is not divisible by n_head {num_heads}");
        }

        let c_attn = conv1d(hidden_size, 3 * hidden_size, vb.pp("c_attn"))?;
        let c_proj = conv1d(hidden_size, hidden_size, vb.pp("c_proj"))?;
        let head_dim = hidden_size / num_heads;

        Ok(Self {
            c_attn,
            c_proj,
            num_heads,
            head_dim,
            scale: 1.0 / (head_dim as f64).sqrt(),
        })
    }

    /// Returns the number of heads.
    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    /// Returns the head dimension.
    pub fn head_dim(&self) -> usize {
        self.head_dim
    }

    /// Forward pass through the attention layer.
    ///
    /// # Arguments
    ///
    /// * `hidden_states` - Input tensor [batch, seq_len, hidden_size]
    /// * `mask` - Additive causal mask [seq_len, seq_len]
    ///
    /// # Returns
    ///
    /// Output tensor [batch, seq_len, hidden_size]
    pub fn forward(&self, hidden_states: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let (batch_size, seq_len, hidden_size) = hidden_states.dims3()?;

        // 1. Fused QKV projection, then split
        let qkv = self.c_attn.forward(hidden_states)?;
        let q = qkv.narrow(D::Minus1, 0, hidden_size)?;
        let k = qkv.narrow(D::Minus1, hidden_size, hidden_size)?;
        let v = qkv.narrow(D::Minus1, 2 * hidden_size, hidden_size)?;

        // 2. [batch, seq_len, hidden] -> [batch, num_heads, seq_len, head_dim]
        let q = self.split_heads(&q, batch_size, seq_len)?;
        let k = self.split_heads(&k, batch_size, seq_len)?;
        let v = self.split_heads(&v, batch_size, seq_len)?;

        // 3. Q @ K^T / sqrt(d), masked
        let attn_weights = (q.matmul(&k.t()?)? * self.scale)?;
        let attn_weights = attn_weights.broadcast_add(&mask.to_dtype(attn_weights.dtype())?)?;
        let attn_weights = candle_nn::ops::softmax_last_dim(&attn_weights)?;

        // 4. Attention @ V, merge heads
        let attn_output = attn_weights.matmul(&v)?;
        let attn_output = attn_output
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch_size, seq_len, hidden_size))?;

        self.c_proj.forward(&attn_output)
    }

    fn split_heads(&self, x: &Tensor, batch_size: usize, seq_len: usize) -> Result<Tensor> {
        x.contiguous()?
            .reshape((batch_size, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }
}

/// Creates an additive causal mask [seq_len, seq_len].
///
/// Entry (i, j) is 0 when key j may be attended from query i (j <= i) and
/// negative infinity otherwise.
pub fn causal_mask(seq_len: usize, device: &Device) -> Result<Tensor> {
    let mask: Vec<f32> = (0..seq_len)
        .flat_map(|query_pos| {
            (0..seq_len).map(move |key_pos| {
                if key_pos > query_pos {
                    f32::NEG_INFINITY
                } else {
                    0.0
                }
            })
        })
        .collect();

    Tensor::from_vec(mask, (seq_len, seq_len), device)
}
