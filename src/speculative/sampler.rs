//! Rejection sampling for speculative decoding.
//!
//! For a drafted token `t` with draft probability `p(t)` and target
//! probability `q(t)`:
//!
//! ```text
//! r ~ U[0, 1)
//! accept t          if r < min(1, q(t) / p(t))
//! else resample t'  ~  normalize(max(0, q - p))
//! ```
//!
//! Marginalized over `r` and the resample, every emitted token is
//! distributed exactly as `q`:
//!
//! ```text
//! P(t) = p(t)·min(1, q(t)/p(t)) + (1 - Σ p·min(1, q/p)) · normalize(max(0, q - p))(t)
//!      = q(t)
//! ```
//!
//! Both the threshold and the residual must stay exact; any clipping or
//! smoothing breaks the equality.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use super::state::SpeculativeStep;
use crate::error::Result;
use crate::sampling::Distribution;

/// Probability of keeping a drafted token: `min(1, q / p)`.
///
/// A token the draft model gives zero probability is rejected outright; the
/// ratio is undefined and such a token cannot have been drawn from `p`.
pub fn acceptance_probability(draft_prob: f32, target_prob: f32) -> f64 {
    if draft_prob <= 0.0 {
        return 0.0;
    }
    (target_prob as f64 / draft_prob as f64).min(1.0)
}

/// How a verification pass produced its last token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalToken {
    /// The draft at `position` was rejected and replaced from the residual.
    Resampled { position: usize },
    /// Every draft was accepted; one extra token came from the target.
    Bonus,
}

/// Result of verifying one batch of drafted tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Drafted tokens that passed the acceptance test, in order.
    pub accepted: Vec<u32>,
    /// The resampled or bonus token that ends the pass.
    pub final_token: u32,
    /// Which of the two the final token is.
    pub outcome: FinalToken,
}

impl Verification {
    /// Number of accepted drafts.
    pub fn num_accepted(&self) -> usize {
        self.accepted.len()
    }

    /// Accepted drafts followed by the final token.
    pub fn tokens(&self) -> Vec<u32> {
        let mut tokens = self.accepted.clone();
        tokens.push(self.final_token);
        tokens
    }
}

/// Rejection sampler holding the random source for a decode call.
///
/// Every random draw of speculative decoding (draft sampling, acceptance
/// tests, residual and bonus sampling) goes through one sampler, so a seed
/// or an injected RNG reproduces a whole run.
#[derive(Debug, Clone)]
pub struct RejectionSampler<R = StdRng> {
    rng: R,
}

impl RejectionSampler<StdRng> {
    /// Create a sampler seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a sampler with a specific seed for reproducibility.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RejectionSampler<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RejectionSampler<R> {
    /// Create a sampler over an arbitrary random source.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Mutable access to the random source.
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Draw a token from `dist`.
    pub fn sample(&mut self, dist: &Distribution) -> Result<u32> {
        dist.sample(&mut self.rng)
    }

    /// Run the acceptance test for `token`.
    pub fn accepts(&mut self, token: u32, draft: &Distribution, target: &Distribution) -> bool {
        let alpha = acceptance_probability(draft.prob(token), target.prob(token));
        let r: f64 = self.rng.gen();
        trace!(token, alpha, r, "acceptance test");
        r < alpha
    }

    /// Draw a replacement from `normalize(max(0, target - draft))`.
    pub fn resample(&mut self, target: &Distribution, draft: &Distribution) -> Result<u32> {
        let residual = Distribution::residual(target, draft)?;
        self.sample(&residual)
    }

    /// Verify drafted tokens against precomputed distributions.
    ///
    /// # Arguments
    ///
    /// * `draft_tokens` - K drafted token IDs
    /// * `draft_dists` - Draft distribution at each drafted position (K rows)
    /// * `target_dists` - Target distribution at each drafted position plus
    ///   the one after the last draft (K+1 rows)
    ///
    /// # Returns
    ///
    /// Accepted drafts and the resampled or bonus token that follows them.
    pub fn verify(
        &mut self,
        draft_tokens: &[u32],
        draft_dists: &[Distribution],
        target_dists: &[Distribution],
    ) -> Result<Verification> {
        let mut step =
            SpeculativeStep::from_scores(draft_tokens, draft_dists.to_vec(), target_dists.to_vec())?;
        step.run_verification(self)?;
        step.into_verification()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceptance_probability() {
        assert!((acceptance_probability(0.5, 0.1) - 0.2).abs() < 1e-6);
        assert_eq!(acceptance_probability(0.1, 0.5), 1.0);
        assert_eq!(acceptance_probability(0.3, 0.3), 1.0);
        assert_eq!(acceptance_probability(0.0, 0.5), 0.0);
        assert_eq!(acceptance_probability(0.4, 0.0), 0.0);
    }

    #[test]
    fn test_verification_tokens() {
        let v = Verification {
            accepted: vec![3, 4],
            final_token: 9,
            outcome: FinalToken::Resampled { position: 2 },
        };
        assert_eq!(v.num_accepted(), 2);
        assert_eq!(v.tokens(), vec![3, 4, 9]);
    }

    #[test]
    fn test_same_seed_same_draws() {
        let dist = Distribution::new(vec![0.25; 4]).unwrap();
        let mut a = RejectionSampler::with_seed(42);
        let mut b = RejectionSampler::with_seed(42);

        for _ in 0..20 {
            assert_eq!(a.sample(&dist).unwrap(), b.sample(&dist).unwrap());
        }
    }
}
