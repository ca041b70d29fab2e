//! API request handlers

use super::models::{
    CachedModelInfo, CleanupRequest, CleanupResponse, DownloadRequest, DownloadResponse,
    GenerateRequest, HealthResponse,
};
use super::routes::AppState;
use crate::engine::SamplingParams;
use crate::error::{ManagerError, ManagerResult};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// GET /health - Engine health check
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let engine = state.service.engine();
    let healthy = match engine.health().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Engine health check failed");
            false
        }
    };
    crate::metrics::update_engine_health(healthy);

    let (status, label) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            model: engine.model_name().to_string(),
            timestamp: chrono::Utc::now(),
        }),
    )
}

/// GET /metrics - Prometheus metrics
pub async fn metrics(State(state): State<AppState>) -> String {
    state.prometheus_handle.render()
}

/// POST /generate - Generate a reply and return it as plain text
pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> ManagerResult<String> {
    SamplingParams::new(req.temperature, req.max_tokens)
        .validate()
        .map_err(|e| ManagerError::BadRequest {
            message: e.to_string(),
        })?;

    let generation = state
        .service
        .generate(&req.messages, req.max_tokens, req.temperature);

    match tokio::time::timeout(state.request_timeout, generation).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ManagerError::Generation {
            message: e.to_string(),
        }),
        Err(_) => {
            tracing::warn!(
                timeout_secs = state.request_timeout.as_secs(),
                "Generation timed out"
            );
            Err(ManagerError::Timeout {
                secs: state.request_timeout.as_secs(),
            })
        }
    }
}

/// GET /models - List cached models, newest first
pub async fn list_models(
    State(state): State<AppState>,
) -> ManagerResult<Json<Vec<CachedModelInfo>>> {
    let downloader = state.downloader.clone();
    let models = tokio::task::spawn_blocking(move || downloader.cache().list())
        .await
        .map_err(anyhow::Error::from)??;

    Ok(Json(models.into_iter().map(CachedModelInfo::from).collect()))
}

/// POST /models/download - Download a model into the cache
pub async fn download_model(
    State(state): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> ManagerResult<(StatusCode, Json<DownloadResponse>)> {
    if req.model_id.trim().is_empty() {
        return Err(ManagerError::BadRequest {
            message: "model_id must not be empty".to_string(),
        });
    }
    state
        .downloader
        .cache()
        .model_dir(&req.model_id)
        .map_err(|e| ManagerError::BadRequest {
            message: format!("{:#}", e),
        })?;

    let path = state
        .downloader
        .download_model(&req.model_id, req.force_download)
        .await
        .map_err(|e| ManagerError::Download {
            message: e.to_string(),
        })?;

    Ok((
        StatusCode::OK,
        Json(DownloadResponse {
            model_id: req.model_id,
            path,
        }),
    ))
}

/// POST /models/cleanup - Keep only the newest cached models
pub async fn cleanup_models(
    State(state): State<AppState>,
    Json(req): Json<CleanupRequest>,
) -> ManagerResult<Json<CleanupResponse>> {
    let keep_latest = req.keep_latest.unwrap_or(state.keep_latest);

    if keep_latest == 0 {
        return Err(ManagerError::BadRequest {
            message: "keep_latest must be >= 1".to_string(),
        });
    }

    let downloader = state.downloader.clone();
    let removed = tokio::task::spawn_blocking(move || downloader.cleanup_old_models(keep_latest))
        .await
        .map_err(anyhow::Error::from)??;

    tracing::info!(keep_latest, removed = removed.len(), "Cache cleanup finished");

    Ok(Json(CleanupResponse { removed }))
}

/// DELETE /models/{name} - Remove one cache entry by directory name
pub async fn delete_model(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ManagerResult<StatusCode> {
    let cache = state.downloader.cache().clone();
    cache.entry_dir(&name).map_err(|e| ManagerError::BadRequest {
        message: e.to_string(),
    })?;

    let lookup = name.clone();
    let removed = tokio::task::spawn_blocking(move || cache.remove(&lookup))
        .await
        .map_err(anyhow::Error::from)??;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ManagerError::ModelNotFound { name })
    }
}
