//! Pipeline run history.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{to_db_time, RunEntry, RunRow};

/// Outcome stored while a run is in progress.
pub const RUNNING: &str = "running";

/// Insert a run in the `running` state.
pub async fn start_run(
    pool: &SqlitePool,
    run_id: &str,
    trigger: &str,
    started_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pipeline_runs (run_id, trigger, outcome, started_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(run_id)
    .bind(trigger)
    .bind(RUNNING)
    .bind(to_db_time(&started_at))
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "PipelineRun",
                    id: run_id.to_string(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// Close a run with its outcome and summary.
pub async fn finish_run(
    pool: &SqlitePool,
    run_id: &str,
    outcome: &str,
    finished_at: DateTime<Utc>,
    summary: &serde_json::Value,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE pipeline_runs
        SET outcome = ?, finished_at = ?, summary = ?
        WHERE run_id = ?
        "#,
    )
    .bind(outcome)
    .bind(to_db_time(&finished_at))
    .bind(summary.to_string())
    .bind(run_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "PipelineRun",
            id: run_id.to_string(),
        });
    }

    Ok(())
}

/// Most recent runs first.
pub async fn list_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<RunEntry>> {
    sqlx::query_as::<_, RunRow>(
        r#"
        SELECT run_id, trigger, outcome, started_at, finished_at, summary
        FROM pipeline_runs
        ORDER BY started_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(RunRow::into_entry)
    .collect()
}

pub async fn get_run(pool: &SqlitePool, run_id: &str) -> Result<RunEntry> {
    sqlx::query_as::<_, RunRow>(
        r#"
        SELECT run_id, trigger, outcome, started_at, finished_at, summary
        FROM pipeline_runs
        WHERE run_id = ?
        "#,
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "PipelineRun",
        id: run_id.to_string(),
    })?
    .into_entry()
}
