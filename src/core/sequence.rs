//! Sequence tracking for one decode call.
//!
//! A sequence owns the growing token buffer and knows how long it is
//! allowed to become. Both decoders append through it, so the length
//! invariant (prompt length + generated tokens, never past the target) is
//! enforced in one place.

use crate::error::{Error, Result};

/// Upper bound on the output capacity reserved up front.
const RESERVE_LIMIT: usize = 4096;

/// The token buffer of a single decode call.
///
/// # Example
///
/// ```
/// use speculative_sampling::core::Sequence;
///
/// let mut seq = Sequence::new(&[1, 2, 3], 2).unwrap();
/// assert_eq!(seq.prompt_len(), 3);
/// assert_eq!(seq.remaining(), 2);
///
/// seq.append_token(5).unwrap();
/// seq.append_token(6).unwrap();
/// assert!(seq.is_finished());
/// assert!(seq.append_token(7).is_err());
/// assert_eq!(seq.output_token_ids(), &[5, 6]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// Prompt followed by generated tokens.
    token_ids: Vec<u32>,
    /// Number of prompt tokens at the front of `token_ids`.
    prompt_len: usize,
    /// Length at which decoding stops.
    target_len: usize,
}

impl Sequence {
    /// Start a sequence from `prompt` that will grow by `max_tokens`.
    ///
    /// Fails with [`Error::EmptyPrompt`]: the first generated token has to be
    /// conditioned on something. Fails with [`Error::BudgetOverflow`] when the
    /// target length does not fit in `usize`.
    pub fn new(prompt: &[u32], max_tokens: usize) -> Result<Self> {
        if prompt.is_empty() {
            return Err(Error::EmptyPrompt);
        }

        let target_len = prompt
            .len()
            .checked_add(max_tokens)
            .ok_or(Error::BudgetOverflow {
                len: prompt.len(),
                requested: max_tokens,
            })?;

        // Large budgets grow the buffer on demand.
        let mut token_ids = Vec::with_capacity(prompt.len() + max_tokens.min(RESERVE_LIMIT));
        token_ids.extend_from_slice(prompt);

        Ok(Self {
            token_ids,
            prompt_len: prompt.len(),
            target_len,
        })
    }

    /// All token ids, prompt first.
    pub fn all_token_ids(&self) -> &[u32] {
        &self.token_ids
    }

    /// Prompt token ids.
    pub fn prompt_token_ids(&self) -> &[u32] {
        &self.token_ids[..self.prompt_len]
    }

    /// Generated token ids.
    pub fn output_token_ids(&self) -> &[u32] {
        &self.token_ids[self.prompt_len..]
    }

    /// Get the prompt length.
    pub fn prompt_len(&self) -> usize {
        self.prompt_len
    }

    /// Get the number of generated tokens.
    pub fn output_len(&self) -> usize {
        self.token_ids.len() - self.prompt_len
    }

    /// Get the total length (prompt + output).
    pub fn total_len(&self) -> usize {
        self.token_ids.len()
    }

    /// Length at which decoding stops.
    pub fn target_len(&self) -> usize {
        self.target_len
    }

    /// Tokens still to generate.
    pub fn remaining(&self) -> usize {
        self.target_len - self.token_ids.len()
    }

    /// Whether the target length has been reached.
    pub fn is_finished(&self) -> bool {
        self.token_ids.len() == self.target_len
    }

    /// Get the last token ID.
    pub fn last_token_id(&self) -> Option<u32> {
        self.token_ids.last().copied()
    }

    /// Append a generated token.
    pub fn append_token(&mut self, token_id: u32) -> Result<()> {
        if self.is_finished() {
            return Err(Error::SequenceFull(self.target_len));
        }
        self.token_ids.push(token_id);
        Ok(())
    }

    /// Append several generated tokens; all or nothing.
    pub fn extend(&mut self, token_ids: &[u32]) -> Result<()> {
        if token_ids.len() > self.remaining() {
            return Err(Error::SequenceFull(self.target_len));
        }
        self.token_ids.extend_from_slice(token_ids);
        Ok(())
    }

    /// Consume the sequence, returning prompt + output.
    pub fn into_token_ids(self) -> Vec<u32> {
        self.token_ids
    }
}
