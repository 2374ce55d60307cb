//! Classification failure queue.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};

use crate::error::Result;
use crate::models::{to_db_time, FailureEntry, FailureRow};

/// Record that a record could not be classified.
///
/// One entry is kept per record and model version; a repeat failure
/// overwrites the error and adds to the attempt count.
#[allow(clippy::too_many_arguments)]
pub async fn record_failure(
    pool: &SqlitePool,
    record_id: &str,
    model_version: &str,
    kind: &str,
    error: &str,
    attempts: u32,
    run_id: Option<&str>,
    failed_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO classification_failures
            (record_id, model_version, kind, error, attempts, run_id, failed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (record_id, model_version) DO UPDATE SET
            kind = excluded.kind,
            error = excluded.error,
            attempts = classification_failures.attempts + excluded.attempts,
            run_id = excluded.run_id,
            failed_at = excluded.failed_at
        "#,
    )
    .bind(record_id)
    .bind(model_version)
    .bind(kind)
    .bind(error)
    .bind(i64::from(attempts))
    .bind(run_id)
    .bind(to_db_time(&failed_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove a record's failure entry once it has a verdict.
pub async fn resolve_failure<'e, E>(executor: E, record_id: &str, model_version: &str) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM classification_failures
        WHERE record_id = ? AND model_version = ?
        "#,
    )
    .bind(record_id)
    .bind(model_version)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Most recent failures first.
pub async fn list_failures(pool: &SqlitePool, limit: i64) -> Result<Vec<FailureEntry>> {
    sqlx::query_as::<_, FailureRow>(
        r#"
        SELECT id, record_id, model_version, kind, error, attempts, run_id, failed_at
        FROM classification_failures
        ORDER BY failed_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(FailureRow::into_entry)
    .collect()
}

pub async fn count_failures(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM classification_failures")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
