//! Error types for API responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced through the HTTP API
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("model not found: {name}")]
    ModelNotFound { name: String },

    #[error("inference engine unavailable: {message}")]
    EngineUnavailable { message: String },

    #[error("generation timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("download failed: {message}")]
    Download { message: String },

    #[error("generation failed: {message}")]
    Generation { message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ManagerResult<T> = Result<T, ManagerError>;

impl ManagerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ManagerError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ManagerError::ModelNotFound { .. } => StatusCode::NOT_FOUND,
            ManagerError::EngineUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ManagerError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ManagerError::Download { .. }
            | ManagerError::Generation { .. }
            | ManagerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ManagerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ManagerError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                "Internal server error".to_string()
            }
            other => {
                if status.is_server_error() {
                    tracing::error!(error = %other, "Request failed");
                }
                other.to_string()
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            timestamp: chrono::Utc::now(),
        });

        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}
