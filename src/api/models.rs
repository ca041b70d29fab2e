//! API request and response models

use crate::models::{CachedModel, ModelMetadata};
use crate::service::{ChatMessage, default_messages};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Body of `POST /generate`; every field is optional
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default = "default_messages")]
    pub messages: Vec<ChatMessage>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            messages: default_messages(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.7
}

/// Body of `POST /models/download`
#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub model_id: String,
    #[serde(default)]
    pub force_download: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub model_id: String,
    pub path: PathBuf,
}

/// Body of `POST /models/cleanup`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CleanupRequest {
    /// Falls back to the configured default
    #[serde(default)]
    pub keep_latest: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub removed: Vec<PathBuf>,
}

/// One entry of `GET /models`
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedModelInfo {
    pub model_id: String,
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub complete: bool,
    pub modified: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ModelMetadata>,
}

impl From<CachedModel> for CachedModelInfo {
    fn from(model: CachedModel) -> Self {
        let metadata = if model.complete {
            crate::models::parse_model_config(&model.path)
        } else {
            None
        };
        Self {
            model_id: model.model_id,
            name: model.name,
            path: model.path,
            size_bytes: model.size_bytes,
            complete: model.complete,
            modified: model.modified,
            metadata,
        }
    }
}
