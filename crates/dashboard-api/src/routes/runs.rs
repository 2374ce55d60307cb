//! Pipeline run routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use database::RunEntry;
use pipeline::{RunRequest, RunTrigger};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::alerts::{clamp_limit, LimitQuery};
use crate::error::Result;
use crate::state::AppState;

/// Body of `POST /api/runs`; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct StartRun {
    pub record_count: Option<usize>,
    #[serde(default)]
    pub reclassify: bool,
}

#[derive(Debug, Serialize)]
pub struct RunStarted {
    pub run_id: String,
    pub status: &'static str,
}

/// `POST /api/runs` starts a run in the background.
///
/// Answers 202 with the run id, or 409 while another run is in progress.
pub async fn start_run(
    State(state): State<AppState>,
    body: Option<Json<StartRun>>,
) -> Result<(StatusCode, Json<RunStarted>)> {
    let Json(body) = body.unwrap_or_default();
    let request = RunRequest {
        record_count: body.record_count,
        trigger: RunTrigger::Manual,
        reclassify: body.reclassify,
    };

    let (run_id, handle) = state.pipeline.spawn(request, state.shutdown.child_token())?;
    info!(run_id = %run_id, "Run started from dashboard");

    let id = run_id.clone();
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(run_id = %id, "Run failed: {}", e),
            Err(e) => error!(run_id = %id, "Run task panicked: {}", e),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(RunStarted {
            run_id,
            status: "started",
        }),
    ))
}

/// `GET /api/runs`, newest first.
pub async fn list_runs(State(state): State<AppState>, Query(query): Query<LimitQuery>) -> Result<Json<Vec<RunEntry>>> {
    Ok(Json(state.store.list_runs(clamp_limit(query.limit)).await?))
}

/// `GET /api/runs/:id`
pub async fn get_run(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<RunEntry>> {
    Ok(Json(state.store.get_run(&id).await?))
}
