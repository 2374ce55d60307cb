//! Dashboard statistics.

use axum::extract::{Query, State};
use axum::Json;
use database::StoreStats;
use serde::{Deserialize, Serialize};

use super::parse_severity;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// Severity counted as critical (label or score).
    pub threshold: Option<String>,
    pub model_version: Option<String>,
}

/// Timing of the most recent finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastRun {
    pub run_id: String,
    pub outcome: String,
    pub duration_ms: Option<u64>,
    pub mean_record_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    #[serde(flatten)]
    pub store: StoreStats,
    pub last_run: Option<LastRun>,
}

/// `GET /api/stats`
pub async fn stats(State(state): State<AppState>, Query(query): Query<StatsQuery>) -> Result<Json<Stats>> {
    let threshold = match query.threshold.as_deref() {
        Some(value) => parse_severity(value)?,
        None => state.stats_threshold,
    };

    let store = state
        .store
        .stats(threshold, query.model_version.as_deref())
        .await?;

    let last_run = state
        .store
        .list_runs(10)
        .await?
        .into_iter()
        .find(|run| run.finished_at.is_some())
        .map(|run| {
            let summary = run.summary.unwrap_or_default();
            LastRun {
                duration_ms: summary["duration_ms"].as_u64(),
                mean_record_ms: summary["mean_record_ms"].as_f64(),
                run_id: run.run_id,
                outcome: run.outcome,
            }
        });

    Ok(Json(Stats { store, last_run }))
}
