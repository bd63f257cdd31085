//! Model loading utilities.
//!
//! This module provides functions for:
//! - Downloading GPT-2 checkpoints from HuggingFace Hub
//! - Loading SafeTensors weights
//! - Building a ready-to-use [`ModelScorer`]

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use tracing::info;

use super::gpt2::{Gpt2Config, Gpt2Model};
use super::scorer::ModelScorer;
use super::ModelSize;
use crate::config::SamplingConfig;
use crate::error::{Error, Result};

/// Paths to downloaded checkpoint files.
#[derive(Debug, Clone)]
pub struct CheckpointFiles {
    /// Path to config.json.
    pub config: PathBuf,
    /// Paths to weight files (SafeTensors).
    pub weights: Vec<PathBuf>,
    /// Path to tokenizer.json.
    pub tokenizer: PathBuf,
}

/// Downloads checkpoint files from HuggingFace Hub.
///
/// # Arguments
///
/// * `model_id` - HuggingFace model ID (e.g., "openai-community/gpt2")
/// * `revision` - Git revision (branch, tag, or commit hash). Use "main" for latest.
pub fn download_model(model_id: &str, revision: &str) -> Result<CheckpointFiles> {
    let api = Api::new().map_err(|e| Error::ModelLoad(format!("Failed to create HF API: {e}")))?;

    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    info!(model_id, revision, "fetching checkpoint");

    let config = fetch(&repo, "config.json")?;
    let weights = download_weights(&repo)?;
    let tokenizer = fetch(&repo, "tokenizer.json")?;

    Ok(CheckpointFiles {
        config,
        weights,
        tokenizer,
    })
}

fn fetch(repo: &ApiRepo, filename: &str) -> Result<PathBuf> {
    repo.get(filename)
        .map_err(|e| Error::ModelLoad(format!("Failed to download {filename}: {e}")))
}

/// Downloads weight files: a single `model.safetensors`, or every shard
/// named in `model.safetensors.index.json`.
fn download_weights(repo: &ApiRepo) -> Result<Vec<PathBuf>> {
    if let Ok(path) = repo.get("model.safetensors") {
        return Ok(vec![path]);
    }

    let index_path = repo.get("model.safetensors.index.json").map_err(|_| {
        Error::ModelLoad("No SafeTensors weights found; only SafeTensors is supported".into())
    })?;

    let index: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&index_path)?)?;
    let weight_map = index["weight_map"]
        .as_object()
        .ok_or_else(|| Error::ModelLoad("Invalid safetensors index: missing weight_map".into()))?;

    let mut shards: Vec<&str> = weight_map.values().filter_map(|v| v.as_str()).collect();
    shards.sort_unstable();
    shards.dedup();

    shards.into_iter().map(|shard| fetch(repo, shard)).collect()
}

/// Creates a VarBuilder from SafeTensors files.
///
/// Some GPT-2 exports nest every tensor under `transformer.`; the returned
/// builder is rooted so that `wte.weight` resolves either way.
///
/// # Safety
///
/// Uses memory-mapped file access. This is safe as long as the files are
/// not modified while being read.
#[allow(unsafe_code)]
pub fn load_safetensors(
    paths: &[PathBuf],
    dtype: DType,
    device: &Device,
) -> Result<VarBuilder<'static>> {
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(paths, dtype, device)? };
    if vb.contains_tensor("transformer.wte.weight") {
        Ok(vb.pp("transformer"))
    } else {
        Ok(vb)
    }
}

/// Loads GPT-2 configuration from config.json.
pub fn load_config(path: &Path) -> Result<Gpt2Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::ModelLoad(format!("Failed to read config.json: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::ModelLoad(format!("Failed to parse config.json: {e}")))
}

/// Downloads and loads a GPT-2 checkpoint.
pub fn load_model(size: ModelSize, revision: &str, device: &Device) -> Result<(Gpt2Model, CheckpointFiles)> {
    let files = download_model(size.hub_id(), revision)?;
    let config = load_config(&files.config)?;
    let vb = load_safetensors(&files.weights, DType::F32, device)?;
    let model = Gpt2Model::new(&config, vb)?;

    info!(
        model = %size,
        layers = config.n_layer,
        hidden = config.n_embd,
        vocab = config.vocab_size,
        "model loaded"
    );

    Ok((model, files))
}

/// Downloads a GPT-2 checkpoint and wraps it as a scorer.
pub fn load_scorer(
    size: ModelSize,
    revision: &str,
    sampling: &SamplingConfig,
    device: &Device,
) -> Result<(ModelScorer, CheckpointFiles)> {
    let (model, files) = load_model(size, revision, device)?;
    Ok((ModelScorer::new(model, sampling), files))
}
