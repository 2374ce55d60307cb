//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    pub status: String,
    /// Whether a pipeline run is in progress.
    pub running: bool,
    pub model_version: String,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        running: state.pipeline.is_running(),
        model_version: state.pipeline.model_version().to_string(),
    })
}
