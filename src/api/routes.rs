//! API route definitions

use crate::models::ModelDownloader;
use crate::service::GenerationService;
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GenerationService>,
    pub downloader: Arc<ModelDownloader>,
    /// Upper bound on a single generation
    pub request_timeout: Duration,
    /// Used when a cleanup request omits `keep_latest`
    pub keep_latest: usize,
    pub prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health and status
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Generation
        .route("/generate", post(handlers::generate))
        // Model cache
        .route("/models", get(handlers::list_models))
        .route("/models/download", post(handlers::download_model))
        .route("/models/cleanup", post(handlers::cleanup_models))
        .route("/models/{name}", delete(handlers::delete_model))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
