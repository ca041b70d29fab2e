//! Model metadata parsing
//!
//! Reads the fields of a hub `config.json` that matter when deciding how to
//! serve a model. Multimodal checkpoints (e.g. Qwen3-VL) keep the language
//! model's sizes under `text_config`, so those are consulted as a fallback.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Model metadata extracted from config.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ModelMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,

    /// Checkpoint dtype as published (the engine may override it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torch_dtype: Option<String>,

    /// Quantization method, e.g. "fp8"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_size: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_hidden_layers: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_position_embeddings: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocab_size: Option<u32>,
}

/// Raw config.json structure (partial)
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    model_type: Option<String>,
    #[serde(default)]
    architectures: Vec<String>,
    torch_dtype: Option<String>,
    hidden_size: Option<u32>,
    num_hidden_layers: Option<u32>,
    max_position_embeddings: Option<u32>,
    vocab_size: Option<u32>,
    quantization_config: Option<RawQuantization>,
    text_config: Option<Box<RawConfig>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawQuantization {
    quant_method: Option<String>,
}

impl From<RawConfig> for ModelMetadata {
    fn from(raw: RawConfig) -> Self {
        let text = raw.text_config.map(|t| *t).unwrap_or_default();
        Self {
            model_type: raw.model_type,
            architectures: raw.architectures,
            torch_dtype: raw.torch_dtype.or(text.torch_dtype),
            quantization: raw
                .quantization_config
                .or(text.quantization_config)
                .and_then(|q| q.quant_method),
            hidden_size: raw.hidden_size.or(text.hidden_size),
            num_hidden_layers: raw.num_hidden_layers.or(text.num_hidden_layers),
            max_position_embeddings: raw.max_position_embeddings.or(text.max_position_embeddings),
            vocab_size: raw.vocab_size.or(text.vocab_size),
        }
    }
}

/// Read and parse `config.json` from a model directory
pub fn read_model_config(model_dir: &Path) -> Result<ModelMetadata> {
    let config_path = model_dir.join("config.json");
    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {:?}", config_path))?;
    let raw: RawConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {:?}", config_path))?;
    Ok(raw.into())
}

/// Like [`read_model_config`] but for listings, where a missing or broken
/// config is simply absent metadata
pub fn parse_model_config(model_dir: &Path) -> Option<ModelMetadata> {
    read_model_config(model_dir).ok()
}
