//! Text-level generation.
//!
//! Wraps either decoder with a tokenizer and a wall-clock timer:
//!
//! ```text
//! prompt text ──encode──▶ token ids ──decoder──▶ token ids ──decode──▶ text
//!                                        │
//!                                        └── elapsed time, DecodeStats
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use rand::Rng;
use tokenizers::Tokenizer;

use super::autoregressive::AutoregressiveDecoder;
use crate::error::{Error, Result};
use crate::scorer::Scorer;
use crate::speculative::{DecodeStats, SpeculativeDecoder};

/// Output from a generation call.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// Decoded prompt followed by the generated continuation.
    pub text: String,
    /// Prompt token IDs followed by generated token IDs.
    pub token_ids: Vec<u32>,
    /// Number of prompt tokens at the front of `token_ids`.
    pub prompt_len: usize,
    /// Wall-clock time spent decoding (tokenization excluded).
    pub elapsed: Duration,
    /// Decoder counters for this call.
    pub stats: DecodeStats,
}

impl GenerationOutput {
    /// Generated token IDs.
    pub fn output_tokens(&self) -> &[u32] {
        &self.token_ids[self.prompt_len..]
    }

    /// Generated tokens per second.
    pub fn tokens_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.output_tokens().len() as f64 / secs
        }
    }
}

/// Tokenizer-backed front end for the decoders.
pub struct TextGenerator {
    /// Tokenizer for encoding/decoding text.
    tokenizer: Tokenizer,
}

impl TextGenerator {
    /// Create a generator from a loaded tokenizer.
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Load the tokenizer from a tokenizer.json file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path.as_ref())
            .map_err(|e| Error::Tokenization(format!("Failed to load tokenizer: {e}")))?;
        Ok(Self::new(tokenizer))
    }

    /// Encode text to token IDs.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::Tokenization(e.to_string()))?;

        let ids = encoding.get_ids().to_vec();
        if ids.is_empty() {
            return Err(Error::EmptyPrompt);
        }
        Ok(ids)
    }

    /// Decode token IDs to text.
    pub fn decode(&self, token_ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(token_ids, false)
            .map_err(|e| Error::Tokenization(e.to_string()))
    }

    /// Generate `max_tokens` tokens after `prompt` one target call at a time.
    pub fn generate_autoregressive<S: Scorer, R: Rng>(
        &self,
        decoder: &mut AutoregressiveDecoder<S, R>,
        prompt: &str,
        max_tokens: usize,
    ) -> Result<GenerationOutput> {
        let prompt_ids = self.encode(prompt)?;

        let start = Instant::now();
        let token_ids = decoder.generate(&prompt_ids, max_tokens)?;
        let elapsed = start.elapsed();

        self.output(token_ids, prompt_ids.len(), elapsed, decoder.stats().clone())
    }

    /// Generate `max_tokens` tokens after `prompt` with speculative decoding.
    pub fn generate_speculative<D: Scorer, T: Scorer, R: Rng>(
        &self,
        decoder: &mut SpeculativeDecoder<D, T, R>,
        prompt: &str,
        max_tokens: usize,
    ) -> Result<GenerationOutput> {
        let prompt_ids = self.encode(prompt)?;

        let start = Instant::now();
        let token_ids = decoder.generate(&prompt_ids, max_tokens)?;
        let elapsed = start.elapsed();

        self.output(token_ids, prompt_ids.len(), elapsed, decoder.stats().clone())
    }

    fn output(
        &self,
        token_ids: Vec<u32>,
        prompt_len: usize,
        elapsed: Duration,
        stats: DecodeStats,
    ) -> Result<GenerationOutput> {
        Ok(GenerationOutput {
            text: self.decode(&token_ids)?,
            token_ids,
            prompt_len,
            elapsed,
            stats,
        })
    }

    /// Get reference to the tokenizer.
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }
}
