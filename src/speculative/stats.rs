//! Counters collected while decoding.

use serde::Serialize;

/// Statistics for one or more decode calls.
///
/// Two rates are reported and they are deliberately different:
///
/// - [`acceptance_rate`](Self::acceptance_rate): drafted tokens that passed
///   the `r < min(1, q/p)` test, divided by drafted tokens.
/// - [`tokens_per_iteration`](Self::tokens_per_iteration): every emitted
///   token (accepted, resampled and bonus) per outer iteration. This is the
///   number often quoted as "acceptance rate" in speculative sampling papers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Outer iterations (one per target call for plain decoding).
    pub iterations: usize,
    /// Draft scorer invocations, including the joint scoring call.
    pub draft_calls: usize,
    /// Target scorer invocations.
    pub target_calls: usize,
    /// Tokens proposed by the draft model.
    pub drafted_tokens: usize,
    /// Drafted tokens kept by the acceptance test.
    pub accepted_tokens: usize,
    /// Tokens drawn from the residual after a rejection.
    pub resampled_tokens: usize,
    /// Tokens drawn from the target after full acceptance.
    pub bonus_tokens: usize,
    /// Tokens appended to the sequence.
    pub generated_tokens: usize,
}

impl DecodeStats {
    /// Accepted / drafted, or `None` when nothing was drafted (K = 0).
    pub fn acceptance_rate(&self) -> Option<f32> {
        (self.drafted_tokens > 0)
            .then(|| self.accepted_tokens as f32 / self.drafted_tokens as f32)
    }

    /// Emitted tokens per outer iteration.
    pub fn tokens_per_iteration(&self) -> f32 {
        if self.iterations == 0 {
            0.0
        } else {
            self.generated_tokens as f32 / self.iterations as f32
        }
    }

    /// Add another set of counters into this one.
    pub fn merge(&mut self, other: &DecodeStats) {
        self.iterations += other.iterations;
        self.draft_calls += other.draft_calls;
        self.target_calls += other.target_calls;
        self.drafted_tokens += other.drafted_tokens;
        self.accepted_tokens += other.accepted_tokens;
        self.resampled_tokens += other.resampled_tokens;
        self.bonus_tokens += other.bonus_tokens;
        self.generated_tokens += other.generated_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_on_empty_stats() {
        let stats = DecodeStats::default();
        assert_eq!(stats.acceptance_rate(), None);
        assert_eq!(stats.tokens_per_iteration(), 0.0);
    }

    #[test]
    fn test_no_drafts_has_no_acceptance_rate() {
        // K = 0: every iteration is one bonus token.
        let stats = DecodeStats {
            iterations: 3,
            target_calls: 3,
            bonus_tokens: 3,
            generated_tokens: 3,
            ..Default::default()
        };
        assert_eq!(stats.acceptance_rate(), None);
        assert_eq!(stats.tokens_per_iteration(), 1.0);
    }

    #[test]
    fn test_rates_differ() {
        // Two iterations of K=4: one full acceptance (4 + bonus),
        // one rejection at the second draft (1 + resample).
        let stats = DecodeStats {
            iterations: 2,
            drafted_tokens: 8,
            accepted_tokens: 5,
            resampled_tokens: 1,
            bonus_tokens: 1,
            generated_tokens: 7,
            ..Default::default()
        };

        let rate = stats.acceptance_rate().unwrap();
        assert!((rate - 0.625).abs() < 1e-6);
        assert!((stats.tokens_per_iteration() - 3.5).abs() < 1e-6);
    }

    #[test]
    fn test_merge() {
        let mut total = DecodeStats {
            iterations: 1,
            generated_tokens: 3,
            ..Default::default()
        };
        total.merge(&DecodeStats {
            iterations: 2,
            generated_tokens: 2,
            target_calls: 2,
            ..Default::default()
        });

        assert_eq!(total.iterations, 3);
        assert_eq!(total.generated_tokens, 5);
        assert_eq!(total.target_calls, 2);
    }
}
