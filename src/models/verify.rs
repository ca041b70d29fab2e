//! Post-download verification
//!
//! Lists what landed on disk and checks that the tokenizer and processor
//! configuration load from local files only. Weights are not loaded.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use walkdir::WalkDir;

use super::cache::bytes_to_mb;
use super::metadata::{ModelMetadata, read_model_config};

/// A file inside a model directory
#[derive(Debug, Clone, Serialize)]
pub struct ModelFile {
    /// Path relative to the model directory
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl ModelFile {
    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size_bytes)
    }
}

/// Outcome of [`verify_model_dir`]
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub model_dir: PathBuf,
    /// Every file found, in listing order
    pub files: Vec<ModelFile>,
    pub file_count: usize,
    pub total_bytes: u64,
    pub metadata: ModelMetadata,
    pub tokenizer_vocab_size: usize,
    /// `processor_class` from the processor config, if one was shipped
    pub processor_class: Option<String>,
    pub has_processor: bool,
}

/// List every regular file under `model_dir`, sorted by path
pub fn list_model_files(model_dir: &Path) -> Result<Vec<ModelFile>> {
    if !model_dir.is_dir() {
        anyhow::bail!("Model directory does not exist: {:?}", model_dir);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(model_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", model_dir))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let path = entry
            .path()
            .strip_prefix(model_dir)
            .unwrap_or(entry.path())
            .to_path_buf();
        files.push(ModelFile { path, size_bytes });
    }
    Ok(files)
}

/// Load `tokenizer.json` and return its vocabulary size
pub fn verify_tokenizer(model_dir: &Path) -> Result<usize> {
    let path = model_dir.join("tokenizer.json");
    let tokenizer = Tokenizer::from_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load tokenizer from {:?}: {}", path, e))?;
    Ok(tokenizer.get_vocab_size(true))
}

/// Validate the processor configuration if the checkpoint ships one
///
/// Returns `Ok(None)` when there is no `preprocessor_config.json`.
pub fn verify_processor(model_dir: &Path) -> Result<Option<serde_json::Value>> {
    let path = model_dir.join("preprocessor_config.json");
    if !path.exists() {
        return Ok(None);
    }

    let content =
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
    if !value.is_object() {
        anyhow::bail!("Processor config {:?} is not a JSON object", path);
    }
    Ok(Some(value))
}

/// Run every local check against a downloaded model directory
pub fn verify_model_dir(model_dir: &Path) -> Result<VerificationReport> {
    let files = list_model_files(model_dir)?;
    for file in &files {
        tracing::info!(
            file = %file.path.display(),
            size_mb = %format!("{:.1}", file.size_mb()),
            "Model file"
        );
    }

    let metadata = read_model_config(model_dir)?;
    tracing::info!(
        model_type = ?metadata.model_type,
        architectures = ?metadata.architectures,
        quantization = ?metadata.quantization,
        "Parsed model config"
    );

    let tokenizer_vocab_size = verify_tokenizer(model_dir)?;
    let processor = verify_processor(model_dir)?;
    let processor_class = processor
        .as_ref()
        .and_then(|p| p.get("processor_class"))
        .and_then(|c| c.as_str())
        .map(str::to_string);
    tracing::info!(
        vocab_size = tokenizer_vocab_size,
        processor = processor.is_some(),
        "Tokenizer and processor loaded"
    );

    Ok(VerificationReport {
        model_dir: model_dir.to_path_buf(),
        file_count: files.len(),
        total_bytes: files.iter().map(|f| f.size_bytes).sum(),
        files,
        metadata,
        tokenizer_vocab_size,
        processor_class,
        has_processor: processor.is_some(),
    })
}
