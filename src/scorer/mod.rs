//! The scoring-function capability.
//!
//! A scorer maps a token sequence of length `L` to an `[L, vocab_size]`
//! matrix whose row `i` is the distribution over the token that follows
//! position `i`. Decoders only ever talk to models through this trait, so a
//! GPT-2 checkpoint, a table of fixed rows or a closure can stand in for
//! either the draft or the target role.
//!
//! ```text
//! tokens:  [t0,  t1,  t2]
//!            │    │    │
//!            ▼    ▼    ▼
//! rows:    [P(·|t0), P(·|t0 t1), P(·|t0 t1 t2)]
//! ```

pub mod table;

use candle_core::Tensor;

use crate::error::{Error, Result};

pub use table::{FnScorer, StaticScorer};

/// A language model seen as a pure scoring function.
pub trait Scorer {
    /// Number of entries in every returned row.
    fn vocab_size(&self) -> usize;

    /// Score a token sequence.
    ///
    /// # Returns
    ///
    /// Probability matrix [tokens.len(), vocab_size]
    fn score(&mut self, tokens: &[u32]) -> Result<Tensor>;
}

impl<S: Scorer + ?Sized> Scorer for &mut S {
    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn score(&mut self, tokens: &[u32]) -> Result<Tensor> {
        (**self).score(tokens)
    }
}

impl<S: Scorer + ?Sized> Scorer for Box<S> {
    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn score(&mut self, tokens: &[u32]) -> Result<Tensor> {
        (**self).score(tokens)
    }
}

/// Score `tokens` and check the matrix is `[tokens.len(), vocab_size]`.
pub fn score_checked<S: Scorer + ?Sized>(scorer: &mut S, tokens: &[u32]) -> Result<Tensor> {
    let scores = scorer.score(tokens)?;
    let vocab_size = scorer.vocab_size();

    match scores.dims() {
        &[rows, cols] if rows == tokens.len() && cols == vocab_size => Ok(scores),
        dims => Err(Error::ScoreShape {
            expected_rows: tokens.len(),
            vocab_size,
            actual: dims.to_vec(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_checked_accepts_well_formed() {
        let mut scorer = StaticScorer::new(vec![0.5, 0.5]).unwrap();
        let scores = score_checked(&mut scorer, &[0, 1, 1]).unwrap();
        assert_eq!(scores.dims(), &[3, 2]);
    }

    #[test]
    fn test_score_checked_rejects_wrong_rows() {
        // Always returns a single row regardless of input length.
        struct OneRow;
        impl Scorer for OneRow {
            fn vocab_size(&self) -> usize {
                2
            }
            fn score(&mut self, _tokens: &[u32]) -> Result<Tensor> {
                Ok(Tensor::new(&[[0.5f32, 0.5]], &candle_core::Device::Cpu)?)
            }
        }

        let err = score_checked(&mut OneRow, &[0, 1]).unwrap_err();
        assert!(matches!(err, Error::ScoreShape { expected_rows: 2, .. }));
    }

    #[test]
    fn test_boxed_scorer() {
        let mut boxed: Box<dyn Scorer> = Box::new(StaticScorer::new(vec![1.0, 0.0, 0.0]).unwrap());
        assert_eq!(boxed.vocab_size(), 3);
        assert_eq!(score_checked(&mut boxed, &[2]).unwrap().dims(), &[1, 3]);
    }
}
