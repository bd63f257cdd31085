//! Model implementations.
//!
//! This module contains:
//! - GPT-2 architecture (causal attention, GELU MLP, tied LM head)
//! - Checkpoint loading from HuggingFace
//! - [`ModelScorer`], which exposes a model through the `Scorer` trait

pub mod attention;
pub mod block;
pub mod gpt2;
pub mod loader;
pub mod mlp;
pub mod scorer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use attention::Gpt2Attention;
pub use block::Gpt2Block;
pub use gpt2::{Gpt2Config, Gpt2Model};
pub use loader::{download_model, load_config, load_model, load_safetensors, load_scorer, CheckpointFiles};
pub use mlp::Gpt2Mlp;
pub use scorer::ModelScorer;

/// GPT-2 checkpoint size, named by parameter count.
///
/// All sizes share one tokenizer and vocabulary, so any two can serve as a
/// draft/target pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelSize {
    #[serde(rename = "124M")]
    Small,
    #[serde(rename = "355M")]
    Medium,
    #[serde(rename = "774M")]
    Large,
    #[serde(rename = "1558M")]
    Xl,
}

impl ModelSize {
    /// Every size, smallest first.
    pub const ALL: [ModelSize; 4] = [Self::Small, Self::Medium, Self::Large, Self::Xl];

    /// HuggingFace model ID.
    pub fn hub_id(&self) -> &'static str {
        match self {
            Self::Small => "openai-community/gpt2",
            Self::Medium => "openai-community/gpt2-medium",
            Self::Large => "openai-community/gpt2-large",
            Self::Xl => "openai-community/gpt2-xl",
        }
    }

    /// Get the size label as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "124M",
            Self::Medium => "355M",
            Self::Large => "774M",
            Self::Xl => "1558M",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let choices: Vec<&str> = Self::ALL.iter().map(|size| size.as_str()).collect();
                format!("unknown model size '{s}', expected one of {}", choices.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_parse_roundtrip() {
        for size in ModelSize::ALL {
            assert_eq!(size.as_str().parse::<ModelSize>().unwrap(), size);
        }
        assert_eq!("1558m".parse::<ModelSize>().unwrap(), ModelSize::Xl);
        assert!("7B".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_model_size_serde_labels() {
        assert_eq!(serde_json::to_string(&ModelSize::Medium).unwrap(), "\"355M\"");
        let size: ModelSize = serde_json::from_str("\"774M\"").unwrap();
        assert_eq!(size, ModelSize::Large);
    }
}
