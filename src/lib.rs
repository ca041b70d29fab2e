//! vLLM Manager - model cache downloader and generation service
//!
//! Downloads HuggingFace model snapshots into a named local cache, prunes
//! old entries, and serves a single text generation endpoint backed by a
//! vLLM inference engine.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod metrics;
pub mod models;
pub mod service;

pub use config::{DownloaderConfig, EngineConfig, ManagerConfig};
pub use engine::{EngineArgs, InferenceEngine, SamplingParams, VllmEngine};
pub use error::{ManagerError, ManagerResult};
pub use models::{HfHubSource, ModelCache, ModelDownloader, SnapshotSource};
pub use service::{ChatMessage, GenerationService};
