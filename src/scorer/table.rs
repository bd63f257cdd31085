//! In-memory scorers.
//!
//! Useful for simulating draft/target pairs with known distributions, which
//! is how the decoding guarantees are checked without loading a model.

use candle_core::{Device, Tensor};

use super::Scorer;
use crate::error::{Error, Result};
use crate::sampling::Distribution;

/// Returns the same distribution at every position.
#[derive(Debug, Clone)]
pub struct StaticScorer {
    row: Distribution,
    device: Device,
}

impl StaticScorer {
    /// Create a scorer that always predicts `probs` (validated and normalized).
    pub fn new(probs: Vec<f32>) -> Result<Self> {
        Ok(Self {
            row: Distribution::new(probs)?,
            device: Device::Cpu,
        })
    }

    /// The distribution returned at every position.
    pub fn distribution(&self) -> &Distribution {
        &self.row
    }
}

impl Scorer for StaticScorer {
    fn vocab_size(&self) -> usize {
        self.row.vocab_size()
    }

    fn score(&mut self, tokens: &[u32]) -> Result<Tensor> {
        let vocab_size = self.row.vocab_size();
        let mut data = Vec::with_capacity(tokens.len() * vocab_size);
        for _ in tokens {
            data.extend_from_slice(self.row.probs());
        }
        Ok(Tensor::from_vec(data, (tokens.len(), vocab_size), &self.device)?)
    }
}

/// Computes each row from its prefix with a closure.
///
/// Row `i` is `f(&tokens[..=i])`. The closure may return an error to
/// simulate a failing backend.
pub struct FnScorer<F> {
    vocab_size: usize,
    f: F,
    device: Device,
}

impl<F> FnScorer<F>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>>,
{
    /// Create a scorer over a vocabulary of `vocab_size` tokens.
    pub fn new(vocab_size: usize, f: F) -> Self {
        Self {
            vocab_size,
            f,
            device: Device::Cpu,
        }
    }
}

impl<F> Scorer for FnScorer<F>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>>,
{
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn score(&mut self, tokens: &[u32]) -> Result<Tensor> {
        let mut data = Vec::with_capacity(tokens.len() * self.vocab_size);
        for end in 1..=tokens.len() {
            let row = (self.f)(&tokens[..end])?;
            if row.len() != self.vocab_size {
                return Err(Error::Scorer(format!(
                    "row for prefix of length {end} has {} entries, expected {}",
                    row.len(),
                    self.vocab_size
                )));
            }
            data.extend(row);
        }
        Ok(Tensor::from_vec(data, (tokens.len(), self.vocab_size), &self.device)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_rows_repeat() {
        let mut scorer = StaticScorer::new(vec![2.0, 2.0]).unwrap();
        let rows: Vec<Vec<f32>> = scorer.score(&[0, 1, 0]).unwrap().to_vec2().unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r == &vec![0.5, 0.5]));
    }

    #[test]
    fn test_fn_rows_see_prefix() {
        // Predict the last token again with certainty.
        let mut scorer = FnScorer::new(3, |prefix: &[u32]| {
            let mut row = vec![0.0; 3];
            row[*prefix.last().unwrap() as usize] = 1.0;
            Ok(row)
        });
        let rows: Vec<Vec<f32>> = scorer.score(&[2, 0]).unwrap().to_vec2().unwrap();

        assert_eq!(rows[0], vec![0.0, 0.0, 1.0]);
        assert_eq!(rows[1], vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fn_row_length_checked() {
        let mut scorer = FnScorer::new(3, |_: &[u32]| Ok(vec![1.0]));
        assert!(matches!(scorer.score(&[0]), Err(Error::Scorer(_))));
    }
}
