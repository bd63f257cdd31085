//! Validated probability distributions over a vocabulary.
//!
//! Every row a scorer returns passes through [`Distribution::new`] before
//! anything samples from it or indexes into it. A row that is empty, has a
//! negative or non-finite entry, or sums to zero is refused with
//! [`Error::InvalidDistribution`].

use candle_core::{DType, IndexOp, Tensor};
use rand::distributions::{Distribution as _, WeightedIndex};
use rand::Rng;

use crate::error::{Error, Result};

/// A probability vector indexed by token id, normalized to sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    probs: Vec<f32>,
}

impl Distribution {
    /// Validate and normalize a probability vector.
    pub fn new(probs: Vec<f32>) -> Result<Self> {
        if probs.is_empty() {
            return Err(Error::InvalidDistribution("empty row".into()));
        }

        let mut sum = 0.0f64;
        for (token, &p) in probs.iter().enumerate() {
            if !p.is_finite() {
                return Err(Error::InvalidDistribution(format!(
                    "non-finite probability {p} for token {token}"
                )));
            }
            if p < 0.0 {
                return Err(Error::InvalidDistribution(format!(
                    "negative probability {p} for token {token}"
                )));
            }
            sum += p as f64;
        }

        if sum <= 0.0 {
            return Err(Error::InvalidDistribution("row sums to zero".into()));
        }

        let probs = probs.into_iter().map(|p| (p as f64 / sum) as f32).collect();
        Ok(Self { probs })
    }

    /// Extract row `row` of a `[L, V]` probability matrix.
    pub fn from_row(matrix: &Tensor, row: usize) -> Result<Self> {
        let values: Vec<f32> = matrix.i(row)?.to_dtype(DType::F32)?.to_vec1()?;
        Self::new(values)
    }

    /// Extract every row of a `[L, V]` probability matrix.
    pub fn rows(matrix: &Tensor) -> Result<Vec<Self>> {
        let values: Vec<Vec<f32>> = matrix.to_dtype(DType::F32)?.to_vec2()?;
        values.into_iter().map(Self::new).collect()
    }

    /// Probability of `token`; zero for ids outside the vocabulary.
    pub fn prob(&self, token: u32) -> f32 {
        self.probs.get(token as usize).copied().unwrap_or(0.0)
    }

    /// Number of entries.
    pub fn vocab_size(&self) -> usize {
        self.probs.len()
    }

    /// The normalized probabilities.
    pub fn probs(&self) -> &[f32] {
        &self.probs
    }

    /// Most likely token. Ties go to the lowest id.
    pub fn argmax(&self) -> u32 {
        let mut best = 0;
        for (token, &p) in self.probs.iter().enumerate() {
            if p > self.probs[best] {
                best = token;
            }
        }
        best as u32
    }

    /// Draw one token id.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<u32> {
        let dist = WeightedIndex::new(&self.probs).map_err(|e| {
            Error::InvalidDistribution(format!("failed to build sampling table: {e}"))
        })?;
        Ok(dist.sample(rng) as u32)
    }

    /// Residual distribution `normalize(max(0, target - draft))`.
    ///
    /// The positive part is zero everywhere only when `target == draft`, in
    /// which case a rejection has probability zero; `target` itself is
    /// returned so a rounding-induced rejection still samples correctly.
    pub fn residual(target: &Self, draft: &Self) -> Result<Self> {
        if target.vocab_size() != draft.vocab_size() {
            return Err(Error::ShapeMismatch(format!(
                "target vocab {} != draft vocab {}",
                target.vocab_size(),
                draft.vocab_size()
            )));
        }

        let diff: Vec<f32> = target
            .probs
            .iter()
            .zip(&draft.probs)
            .map(|(&q, &p)| (q - p).max(0.0))
            .collect();

        if diff.iter().all(|&d| d == 0.0) {
            return Ok(target.clone());
        }
        Self::new(diff)
    }
}
