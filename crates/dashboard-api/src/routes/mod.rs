//! Route handlers for the dashboard API.

pub mod alerts;
pub mod export;
pub mod health;
pub mod records;
pub mod runs;
pub mod stats;

use axum::routing::get;
use axum::Router;
use event_core::Severity;

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Results
        .route("/api/records", get(records::list_records))
        .route("/api/records/:id", get(records::get_record))
        .route("/api/alerts", get(alerts::list_alerts))
        .route("/api/failures", get(alerts::list_failures))
        .route("/api/stats", get(stats::stats))
        .route("/api/export/:format", get(export::export))
        // Pipeline runs
        .route("/api/runs", get(runs::list_runs).post(runs::start_run))
        .route("/api/runs/:id", get(runs::get_run))
}

/// A severity given as a label (`severe`) or a score (`4`).
fn parse_severity(value: &str) -> Result<Severity> {
    if let Ok(score) = value.trim().parse::<i64>() {
        return Severity::from_score(score)
            .ok_or_else(|| ApiError::BadRequest(format!("severity score out of range: {}", score)));
    }
    value
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{}", e)))
}
