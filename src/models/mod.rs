//! Model management module
//!
//! Provides functionality for:
//! - Naming, listing and pruning per-model cache directories
//! - Downloading repository snapshots from HuggingFace Hub
//! - Parsing model metadata from config.json
//! - Verifying that a downloaded model's tokenizer and processor load

pub mod cache;
pub mod download;
pub mod metadata;
pub mod verify;

pub use cache::{
    CachedModel, ModelCache, bytes_to_gb, bytes_to_mb, cache_dir_name, dir_size,
    hub_cache_dir, model_id_from_dir_name,
};
pub use download::{
    DEFAULT_IGNORE_PATTERNS, HfHubSource, IgnorePatterns, ModelDownloader, RepoFiles,
    SnapshotRequest, SnapshotSource, materialize,
};
pub use metadata::{ModelMetadata, parse_model_config, read_model_config};
pub use verify::{ModelFile, VerificationReport, list_model_files, verify_model_dir};
