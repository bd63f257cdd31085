//! Turning model logits into probability rows.
//!
//! ## Pipeline
//!
//! ```text
//! Logits [L, vocab_size]
//!     │
//!     ▼ Temperature scaling (0 = one-hot argmax)
//! Logits / temperature
//!     │
//!     ▼ Softmax
//! Probabilities
//!     │
//!     ▼ Top-k / top-p filtering (optional)
//! Keep k most likely / smallest set covering p
//!     │
//!     ▼ Renormalize
//! Probabilities [L, vocab_size]
//! ```
//!
//! Unlike a sampler that returns a token directly, this one returns whole
//! rows: speculative decoding needs the full draft and target distributions
//! to compute acceptance ratios and residuals.

use candle_core::{DType, Tensor, D};

use crate::config::SamplingConfig;
use crate::error::Result;

/// Shapes logits into probability rows according to a [`SamplingConfig`].
#[derive(Debug, Clone)]
pub struct Sampler {
    /// Temperature for scaling logits.
    temperature: f32,
    /// Top-k value (0 = disabled).
    top_k: usize,
    /// Top-p value (1.0 = disabled).
    top_p: f32,
}

impl Sampler {
    /// Creates a new sampler with the given configuration.
    pub fn new(config: &SamplingConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
        }
    }

    /// Convert logits to probabilities.
    ///
    /// # Arguments
    ///
    /// * `logits` - Raw logits [seq_len, vocab_size]
    ///
    /// # Returns
    ///
    /// Probability matrix [seq_len, vocab_size], `f32`, rows summing to 1
    pub fn probabilities(&self, logits: &Tensor) -> Result<Tensor> {
        let logits = logits.to_dtype(DType::F32)?;

        if self.temperature == 0.0 {
            return self.one_hot_argmax(&logits);
        }

        let logits = if self.temperature != 1.0 {
            (logits / self.temperature as f64)?
        } else {
            logits
        };

        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;

        if !self.filters_enabled(probs.dim(D::Minus1)?) {
            return Ok(probs);
        }

        let rows: Vec<Vec<f32>> = probs.to_vec2()?;
        let (seq_len, vocab_size) = probs.dims2()?;
        let mut filtered = Vec::with_capacity(seq_len * vocab_size);
        for row in rows {
            filtered.extend(self.filter_row(row));
        }

        Ok(Tensor::from_vec(filtered, (seq_len, vocab_size), probs.device())?)
    }

    fn filters_enabled(&self, vocab_size: usize) -> bool {
        (self.top_k > 0 && self.top_k < vocab_size) || (self.top_p > 0.0 && self.top_p < 1.0)
    }

    /// Greedy rows: all mass on the highest logit.
    fn one_hot_argmax(&self, logits: &Tensor) -> Result<Tensor> {
        let (seq_len, vocab_size) = logits.dims2()?;
        let best: Vec<u32> = logits.argmax(D::Minus1)?.to_vec1()?;

        let mut data = vec![0.0f32; seq_len * vocab_size];
        for (row, &token) in best.iter().enumerate() {
            data[row * vocab_size + token as usize] = 1.0;
        }

        Ok(Tensor::from_vec(data, (seq_len, vocab_size), logits.device())?)
    }

    /// Zero out everything outside top-k and the top-p nucleus, then renormalize.
    fn filter_row(&self, probs: Vec<f32>) -> Vec<f32> {
        let vocab_size = probs.len();

        let mut order: Vec<usize> = (0..vocab_size).collect();
        order.sort_by(|&a, &b| {
            probs[b]
                .partial_cmp(&probs[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut keep = if self.top_k > 0 {
            self.top_k.min(vocab_size)
        } else {
            vocab_size
        };

        if self.top_p > 0.0 && self.top_p < 1.0 {
            let mut cumulative = 0.0f32;
            for (rank, &token) in order.iter().take(keep).enumerate() {
                cumulative += probs[token];
                if cumulative > self.top_p {
                    // Include the token that pushed us over
                    keep = rank + 1;
                    break;
                }
            }
        }

        let mut filtered = vec![0.0f32; vocab_size];
        let mut sum = 0.0f32;
        for &token in order.iter().take(keep) {
            filtered[token] = probs[token];
            sum += probs[token];
        }

        if sum > 0.0 {
            for p in filtered.iter_mut() {
                *p /= sum;
            }
        }
        filtered
    }

    /// Set temperature.
    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    /// Set top-k.
    pub fn set_top_k(&mut self, top_k: usize) {
        self.top_k = top_k;
    }

    /// Set top-p.
    pub fn set_top_p(&mut self, top_p: f32) {
        self.top_p = top_p;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn rows(sampler: &Sampler, logits: &[[f32; 5]]) -> Vec<Vec<f32>> {
        let flat: Vec<f32> = logits.iter().flatten().copied().collect();
        let logits = Tensor::from_vec(flat, (logits.len(), 5), &Device::Cpu).unwrap();
        sampler.probabilities(&logits).unwrap().to_vec2().unwrap()
    }

    #[test]
    fn test_greedy_rows_are_one_hot() {
        let sampler = Sampler::new(&SamplingConfig::greedy());
        let probs = rows(&sampler, &[[0.1, 0.2, 0.3, 10.0, 0.4], [0.1, 10.0, 0.3, 0.4, 0.5]]);

        assert_eq!(probs[0], vec![0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(probs[1], vec![0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_uniform_logits_give_uniform_rows() {
        let sampler = Sampler::new(&SamplingConfig::default());
        let probs = rows(&sampler, &[[1.0; 5]]);

        for p in &probs[0] {
            assert!((p - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_top_k_keeps_k_tokens() {
        let sampler = Sampler::new(&SamplingConfig {
            top_k: 2,
            ..Default::default()
        });
        let probs = rows(&sampler, &[[0.1, 0.2, 0.3, 10.0, 9.0]]);

        assert_eq!(probs[0][0], 0.0);
        assert_eq!(probs[0][1], 0.0);
        assert_eq!(probs[0][2], 0.0);
        assert!((probs[0][3] + probs[0][4] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_top_p_keeps_dominant_token() {
        let sampler = Sampler::new(&SamplingConfig {
            top_p: 0.5,
            ..Default::default()
        });
        let probs = rows(&sampler, &[[0.0, 0.0, 0.0, 10.0, 0.0]]);

        assert!((probs[0][3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_low_temperature_sharpens() {
        let mut sampler = Sampler::new(&SamplingConfig::default());
        let warm = rows(&sampler, &[[1.0, 2.0, 0.0, 0.0, 0.0]]);
        sampler.set_temperature(0.25);
        let cold = rows(&sampler, &[[1.0, 2.0, 0.0, 0.0, 0.0]]);

        assert!(cold[0][1] > warm[0][1]);
    }
}
