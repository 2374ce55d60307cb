//! Alert and failure queue routes.

use axum::extract::{Query, State};
use axum::Json;
use database::FailureEntry;
use event_core::{AlertEvent, DeliveryStatus};
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    /// Only alerts in this delivery state.
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub(crate) fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 1000)
}

/// `GET /api/alerts`
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<AlertEvent>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<DeliveryStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(state.store.list_alerts(status, clamp_limit(query.limit)).await?))
}

/// `GET /api/failures`
pub async fn list_failures(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<FailureEntry>>> {
    Ok(Json(state.store.list_failures(clamp_limit(query.limit)).await?))
}
