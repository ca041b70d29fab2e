//! Local model cache bookkeeping
//!
//! Every model lives in its own directory directly under the cache root:
//! ```text
//! /tmp/model_cache/
//! ├── Qwen--Qwen3-VL-32B-Instruct-FP8/
//! │   ├── config.json          <- marks a complete download
//! │   ├── model-00001-of-00007.safetensors
//! │   └── tokenizer.json
//! └── BAAI--bge-small-en-v1.5/
//!     └── ...
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// File whose presence marks a model directory as fully downloaded
pub const COMPLETION_MARKER: &str = "config.json";

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Location of the HuggingFace Hub blob cache
///
/// Follows the HuggingFace lookup order:
/// 1. `$HF_HOME/hub`
/// 2. `$XDG_CACHE_HOME/huggingface/hub`
/// 3. `~/.cache/huggingface/hub`
pub fn hub_cache_dir() -> PathBuf {
    if let Ok(hf_home) = std::env::var("HF_HOME") {
        return PathBuf::from(hf_home).join("hub");
    }
    if let Ok(xdg_cache) = std::env::var("XDG_CACHE_HOME") {
        return PathBuf::from(xdg_cache).join("huggingface/hub");
    }
    dirs::home_dir()
        .map(|h| h.join(".cache/huggingface/hub"))
        .unwrap_or_else(|| PathBuf::from("/tmp/huggingface/hub"))
}

/// Convert model ID to cache directory name
///
/// e.g., "Qwen/Qwen3-VL-32B-Instruct-FP8" -> "Qwen--Qwen3-VL-32B-Instruct-FP8"
pub fn cache_dir_name(model_id: &str) -> String {
    model_id.replace('/', "--")
}

/// Convert cache directory name back to model ID
///
/// Only the first separator is restored, since repo names may contain `--`.
pub fn model_id_from_dir_name(name: &str) -> String {
    name.replacen("--", "/", 1)
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Recursively calculate the size of all regular files under `path`
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

/// One model directory found in the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedModel {
    pub model_id: String,
    /// Directory name under the cache root
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Whether the completion marker is present
    pub complete: bool,
    pub modified: DateTime<Utc>,
}

/// Cache root holding one directory per downloaded model
#[derive(Debug, Clone)]
pub struct ModelCache {
    root: PathBuf,
}

impl ModelCache {
    /// Open the cache, creating the root directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create cache directory: {:?}", root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `model_id`, always a direct child of the cache root
    pub fn model_dir(&self, model_id: &str) -> Result<PathBuf> {
        self.entry_dir(&cache_dir_name(model_id))
            .with_context(|| format!("Invalid model id: {:?}", model_id))
    }

    /// Resolve a cache entry name to its directory without touching disk
    ///
    /// Names that would map onto the root itself, a hidden entry, or anything
    /// outside the root are rejected.
    pub fn entry_dir(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains('\0')
            || name.contains('\\')
            || name.contains("..")
        {
            anyhow::bail!("Invalid cache entry name: {:?}", name);
        }

        let mut components = Path::new(name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        let path = self.root.join(name);
        if !single_normal || path.parent() != Some(self.root.as_path()) {
            anyhow::bail!("Invalid cache entry name: {:?}", name);
        }
        Ok(path)
    }

    /// True if the model directory holds the completion marker
    pub fn is_complete(&self, model_id: &str) -> bool {
        self.model_dir(model_id)
            .is_ok_and(|dir| dir.join(COMPLETION_MARKER).is_file())
    }

    /// Free space on the filesystem holding the cache, in GB
    pub fn free_space_gb(&self) -> Result<f64> {
        let stats = nix::sys::statvfs::statvfs(&self.root)
            .with_context(|| format!("statvfs failed for {:?}", self.root))?;
        let bytes = stats.fragment_size() as f64 * stats.blocks_available() as f64;
        Ok(bytes / BYTES_PER_GB)
    }

    /// Immediate subdirectories of the cache root with their modification times
    fn model_dirs(&self) -> Result<Vec<(PathBuf, std::time::SystemTime)>> {
        let mut dirs = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read cache directory: {:?}", self.root))?;

        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_dir() {
                continue;
            }
            let modified = metadata
                .modified()
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            dirs.push((entry.path(), modified));
        }

        // Newest first
        dirs.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(dirs)
    }

    /// List cached model directories, newest first
    pub fn list(&self) -> Result<Vec<CachedModel>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let models = self
            .model_dirs()?
            .into_iter()
            .map(|(path, modified)| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                CachedModel {
                    model_id: model_id_from_dir_name(&name),
                    complete: path.join(COMPLETION_MARKER).is_file(),
                    size_bytes: dir_size(&path),
                    modified: DateTime::<Utc>::from(modified),
                    name,
                    path,
                }
            })
            .collect();

        Ok(models)
    }

    /// Remove all but the `keep_latest` most recently modified model directories
    ///
    /// Returns the removed directories.
    pub fn cleanup_old_models(&self, keep_latest: usize) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let dirs = self.model_dirs()?;
        if dirs.len() <= keep_latest {
            return Ok(Vec::new());
        }

        let mut removed = Vec::new();
        for (old_dir, _) in dirs.into_iter().skip(keep_latest) {
            tracing::info!(path = ?old_dir, "Removing old model cache");
            std::fs::remove_dir_all(&old_dir)
                .with_context(|| format!("Failed to remove {:?}", old_dir))?;
            removed.push(old_dir);
        }

        crate::metrics::record_models_removed(removed.len());
        Ok(removed)
    }

    /// Remove a single cache entry by directory name
    ///
    /// Returns `Ok(false)` if no such entry exists.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.entry_dir(name)?;
        if !path.is_dir() {
            return Ok(false);
        }

        tracing::info!(path = ?path, "Removing model cache entry");
        std::fs::remove_dir_all(&path).with_context(|| format!("Failed to remove {:?}", path))?;
        crate::metrics::record_models_removed(1);
        Ok(true)
    }
}
