//! One speculative iteration as an explicit state machine.
//!
//! ```text
//!            ┌──────────┐  K drafts sampled
//!   start ──▶│ Drafting │──────────────────┐
//!            └──────────┘                  ▼
//!                                    ┌──────────┐
//!                                    │ Scoring  │  one draft + one target call
//!                                    └──────────┘
//!                                          │
//!                                          ▼
//!            accept draft i    ┌──────────────────────┐
//!           ┌─────────────────│  Accepting { i }     │
//!           └────────────────▶└──────────────────────┘
//!                               │ reject        │ i == K
//!                               ▼               ▼
//!                  ┌────────────────────┐  ┌─────────┐
//!                  │ Resampling { i }   │  │  Bonus  │
//!                  └────────────────────┘  └─────────┘
//!                               │               │
//!                               └──────┬────────┘
//!                                      ▼
//!                                  ┌──────┐
//!                                  │ Done │
//!                                  └──────┘
//! ```
//!
//! Each call to [`SpeculativeStep::advance`] performs exactly one
//! transition, so tests can stop the machine at any phase and inspect what
//! it drafted, scored and emitted.

use candle_core::Tensor;
use rand::Rng;

use super::sampler::{FinalToken, RejectionSampler, Verification};
use super::stats::DecodeStats;
use crate::error::{Error, Result};
use crate::sampling::Distribution;
use crate::scorer::{score_checked, Scorer};

/// Drafts reserved up front; longer lookaheads grow on demand.
const MAX_RESERVED_DRAFTS: usize = 64;

/// Phase of a speculative iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Sampling drafts one at a time from the draft model.
    Drafting,
    /// Scoring the drafted sequence with both models.
    Scoring,
    /// Testing the draft at `index`.
    Accepting { index: usize },
    /// Replacing the rejected draft at `index` from the residual.
    Resampling { index: usize },
    /// Sampling the extra target token after full acceptance.
    Bonus,
    /// Finished; emitted tokens are ready.
    Done,
}

impl Phase {
    /// Check if the iteration has finished.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Get the phase name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drafting => "Drafting",
            Self::Scoring => "Scoring",
            Self::Accepting { .. } => "Accepting",
            Self::Resampling { .. } => "Resampling",
            Self::Bonus => "Bonus",
            Self::Done => "Done",
        }
    }
}

/// A single outer iteration of speculative decoding.
#[derive(Debug, Clone)]
pub struct SpeculativeStep {
    /// Current phase.
    phase: Phase,
    /// Number of tokens to draft (K).
    lookahead: usize,
    /// Committed prefix followed by drafted tokens.
    tokens: Vec<u32>,
    /// Length of the committed prefix.
    prefix_len: usize,
    /// Draft distribution at each drafted position (K rows).
    draft_rows: Vec<Distribution>,
    /// Target distribution at each drafted position plus one (K+1 rows).
    target_rows: Vec<Distribution>,
    /// Tokens this iteration commits.
    emitted: Vec<u32>,
    /// How the last emitted token was produced.
    final_token: Option<FinalToken>,
    /// Counters for this iteration.
    stats: DecodeStats,
}

impl SpeculativeStep {
    /// Start an iteration that drafts `lookahead` tokens after `prefix`.
    ///
    /// Fails with [`Error::BudgetOverflow`] when the prefix plus the K+1
    /// tokens the iteration may emit does not fit in `usize`.
    pub fn new(prefix: &[u32], lookahead: usize) -> Result<Self> {
        if prefix.is_empty() {
            return Err(Error::EmptyPrompt);
        }

        prefix
            .len()
            .checked_add(lookahead)
            .and_then(|len| len.checked_add(1))
            .ok_or(Error::BudgetOverflow {
                len: prefix.len(),
                requested: lookahead,
            })?;

        let reserved = lookahead.min(MAX_RESERVED_DRAFTS);
        let mut tokens = Vec::with_capacity(prefix.len() + reserved);
        tokens.extend_from_slice(prefix);

        Ok(Self {
            phase: Phase::Drafting,
            lookahead,
            tokens,
            prefix_len: prefix.len(),
            draft_rows: Vec::with_capacity(reserved),
            target_rows: Vec::with_capacity(reserved + 1),
            emitted: Vec::with_capacity(reserved + 1),
            final_token: None,
            stats: DecodeStats {
                iterations: 1,
                ..Default::default()
            },
        })
    }

    /// Start an iteration at the acceptance test with precomputed scores.
    ///
    /// `draft_rows` must hold one row per drafted token and `target_rows`
    /// one more than that, all over the same vocabulary.
    pub fn from_scores(
        drafted: &[u32],
        draft_rows: Vec<Distribution>,
        target_rows: Vec<Distribution>,
    ) -> Result<Self> {
        let k = drafted.len();
        if draft_rows.len() != k {
            return Err(Error::ShapeMismatch(format!(
                "{k} drafted tokens but {} draft rows",
                draft_rows.len()
            )));
        }
        if target_rows.len() != k + 1 {
            return Err(Error::ShapeMismatch(format!(
                "{k} drafted tokens need {} target rows, got {}",
                k + 1,
                target_rows.len()
            )));
        }

        let vocab_size = target_rows[0].vocab_size();
        if let Some(row) = draft_rows
            .iter()
            .chain(&target_rows)
            .find(|row| row.vocab_size() != vocab_size)
        {
            return Err(Error::ShapeMismatch(format!(
                "rows over vocabularies of {vocab_size} and {} tokens",
                row.vocab_size()
            )));
        }

        Ok(Self {
            phase: Phase::Accepting { index: 0 },
            lookahead: k,
            tokens: drafted.to_vec(),
            prefix_len: 0,
            draft_rows,
            target_rows,
            emitted: Vec::with_capacity(k + 1),
            final_token: None,
            stats: DecodeStats {
                iterations: 1,
                drafted_tokens: k,
                ..Default::default()
            },
        })
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of tokens this iteration drafts (K).
    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    /// Tokens drafted so far.
    pub fn drafted(&self) -> &[u32] {
        &self.tokens[self.prefix_len..]
    }

    /// Tokens committed so far.
    pub fn emitted(&self) -> &[u32] {
        &self.emitted
    }

    /// Draft distributions from the joint scoring call.
    pub fn draft_rows(&self) -> &[Distribution] {
        &self.draft_rows
    }

    /// Target distributions from the joint scoring call.
    pub fn target_rows(&self) -> &[Distribution] {
        &self.target_rows
    }

    /// How the final token was produced, once known.
    pub fn final_token(&self) -> Option<FinalToken> {
        self.final_token
    }

    /// Counters for this iteration.
    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Perform one transition.
    ///
    /// Calling this on a finished step is a no-op returning [`Phase::Done`].
    pub fn advance<D, T, R>(
        &mut self,
        draft: &mut D,
        target: &mut T,
        sampler: &mut RejectionSampler<R>,
    ) -> Result<Phase>
    where
        D: Scorer + ?Sized,
        T: Scorer + ?Sized,
        R: Rng,
    {
        match self.phase {
            Phase::Drafting => self.draft_one(draft, sampler)?,
            Phase::Scoring => self.score(draft, target)?,
            _ => return self.advance_verification(sampler),
        }
        Ok(self.phase)
    }

    /// Perform one transition of the accept/reject/resample part.
    ///
    /// Fails with [`Error::InvalidStateTransition`] while drafting or
    /// scoring is still pending, since those need the scorers.
    pub fn advance_verification<R: Rng>(
        &mut self,
        sampler: &mut RejectionSampler<R>,
    ) -> Result<Phase> {
        self.phase = match self.phase {
            Phase::Drafting | Phase::Scoring => {
                return Err(Error::InvalidStateTransition {
                    from: self.phase.as_str(),
                    to: "Accepting",
                })
            }
            Phase::Accepting { index } if index == self.lookahead => Phase::Bonus,
            Phase::Accepting { index } => {
                let token = self.drafted()[index];
                if sampler.accepts(token, &self.draft_rows[index], &self.target_rows[index]) {
                    self.emit(token);
                    self.stats.accepted_tokens += 1;
                    Phase::Accepting { index: index + 1 }
                } else {
                    Phase::Resampling { index }
                }
            }
            Phase::Resampling { index } => {
                let token = sampler.resample(&self.target_rows[index], &self.draft_rows[index])?;
                self.emit(token);
                self.stats.resampled_tokens += 1;
                self.final_token = Some(FinalToken::Resampled { position: index });
                Phase::Done
            }
            Phase::Bonus => {
                let token = sampler.sample(&self.target_rows[self.lookahead])?;
                self.emit(token);
                self.stats.bonus_tokens += 1;
                self.final_token = Some(FinalToken::Bonus);
                Phase::Done
            }
            Phase::Done => Phase::Done,
        };
        Ok(self.phase)
    }

    /// Drive the step to [`Phase::Done`].
    pub fn run<D, T, R>(
        &mut self,
        draft: &mut D,
        target: &mut T,
        sampler: &mut RejectionSampler<R>,
    ) -> Result<()>
    where
        D: Scorer + ?Sized,
        T: Scorer + ?Sized,
        R: Rng,
    {
        while !self.phase.is_done() {
            self.advance(draft, target, sampler)?;
        }
        Ok(())
    }

    /// Drive a step built with [`from_scores`](Self::from_scores) to [`Phase::Done`].
    pub fn run_verification<R: Rng>(&mut self, sampler: &mut RejectionSampler<R>) -> Result<()> {
        while !self.phase.is_done() {
            self.advance_verification(sampler)?;
        }
        Ok(())
    }

    /// Split the emitted tokens into accepted drafts and the final token.
    pub fn into_verification(mut self) -> Result<Verification> {
        match (self.phase, self.final_token, self.emitted.pop()) {
            (Phase::Done, Some(outcome), Some(final_token)) => Ok(Verification {
                accepted: self.emitted,
                final_token,
                outcome,
            }),
            (phase, _, _) => Err(Error::InvalidStateTransition {
                from: phase.as_str(),
                to: "Done",
            }),
        }
    }

    fn emit(&mut self, token: u32) {
        self.emitted.push(token);
        self.stats.generated_tokens += 1;
    }

    fn draft_one<D, R>(&mut self, draft: &mut D, sampler: &mut RejectionSampler<R>) -> Result<()>
    where
        D: Scorer + ?Sized,
        R: Rng,
    {
        if self.drafted().len() < self.lookahead {
            let scores = score_checked(draft, &self.tokens)?;
            self.stats.draft_calls += 1;

            let row = Distribution::from_row(&scores, self.tokens.len() - 1)?;
            let token = sampler.sample(&row)?;
            self.tokens.push(token);
            self.stats.drafted_tokens += 1;
        }

        if self.drafted().len() == self.lookahead {
            self.phase = Phase::Scoring;
        }
        Ok(())
    }

    /// Joint scoring: one call per model over prefix + drafts.
    ///
    /// Row `prefix_len - 1 + j` conditions on everything before draft `j`,
    /// so the draft rows are `[prefix_len - 1, prefix_len - 1 + K)` and the
    /// target rows extend one further for the bonus position.
    fn score<D, T>(&mut self, draft: &mut D, target: &mut T) -> Result<()>
    where
        D: Scorer + ?Sized,
        T: Scorer + ?Sized,
    {
        if draft.vocab_size() != target.vocab_size() {
            return Err(Error::Config(format!(
                "draft vocabulary ({}) differs from target vocabulary ({})",
                draft.vocab_size(),
                target.vocab_size()
            )));
        }

        let start = self.prefix_len - 1;

        // With nothing drafted the draft rows are never read.
        if self.lookahead > 0 {
            let draft_scores = score_checked(draft, &self.tokens)?;
            self.stats.draft_calls += 1;
            self.draft_rows = rows_from(&draft_scores, start, self.lookahead)?;
        }

        let target_scores = score_checked(target, &self.tokens)?;
        self.stats.target_calls += 1;
        self.target_rows = rows_from(&target_scores, start, self.lookahead + 1)?;

        self.phase = Phase::Accepting { index: 0 };
        Ok(())
    }
}

fn rows_from(scores: &Tensor, start: usize, len: usize) -> Result<Vec<Distribution>> {
    Distribution::rows(&scores.narrow(0, start, len)?)
}
