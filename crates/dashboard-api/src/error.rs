//! Error types for the dashboard API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use pipeline::PipelineError;
use thiserror::Error;

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Could not start a run.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// A query parameter or body field was invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A response body could not be encoded.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Database(err) => {
                tracing::error!("Database error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Pipeline(PipelineError::AlreadyRunning) => StatusCode::CONFLICT,
            ApiError::Pipeline(err) => {
                tracing::error!("Pipeline error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Encode(err) => {
                tracing::error!("Encoding error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
