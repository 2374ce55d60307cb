//! Verdict persistence and the record + verdict upsert.

use event_core::{AdverseEventRecord, SeverityVerdict};
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DatabaseError, Result};
use crate::failure;
use crate::models::{to_db_time, UpsertOutcome, VerdictRow, VerdictWrite};
use crate::record::insert_record;

pub(crate) const VERDICT_COLUMNS: &str = "record_id, model_version, severity, confidence, rationale, \
     category, urgency, recommended_action, classified_at";

/// Store a record and its verdict.
///
/// The record is inserted once. The verdict for `(record_id, model_version)`
/// is inserted, or replaced only when the incoming `classified_at` is newer
/// or equal with a higher confidence; anything else is a no-op. A stored
/// verdict clears the record's entry in the failure queue.
pub async fn upsert(
    pool: &SqlitePool,
    record: &AdverseEventRecord,
    verdict: &SeverityVerdict,
) -> Result<UpsertOutcome> {
    if verdict.record_id != record.record_id() {
        return Err(DatabaseError::InvalidState {
            entity: "Verdict",
            id: verdict.record_id.clone(),
            expected: "for the record being stored",
        });
    }

    // The record insert comes first so the transaction holds the write lock
    // before the existing verdict is read.
    let mut tx = pool.begin().await?;
    let outcome = upsert_in_transaction(&mut *tx, record, verdict).await?;
    tx.commit().await?;

    debug!(
        record_id = %record.record_id(),
        model_version = %verdict.model_version,
        ?outcome,
        "Upserted verdict"
    );
    Ok(outcome)
}

async fn upsert_in_transaction(
    conn: &mut sqlx::SqliteConnection,
    record: &AdverseEventRecord,
    verdict: &SeverityVerdict,
) -> Result<UpsertOutcome> {
    let record_inserted = insert_record(&mut *conn, record).await?;

    let existed: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM verdicts WHERE record_id = ? AND model_version = ?",
    )
    .bind(&verdict.record_id)
    .bind(&verdict.model_version)
    .fetch_optional(&mut *conn)
    .await?;

    let written = sqlx::query(
        r#"
        INSERT INTO verdicts
            (record_id, model_version, severity, severity_score, confidence, rationale,
             category, urgency, recommended_action, classified_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (record_id, model_version) DO UPDATE SET
            severity = excluded.severity,
            severity_score = excluded.severity_score,
            confidence = excluded.confidence,
            rationale = excluded.rationale,
            category = excluded.category,
            urgency = excluded.urgency,
            recommended_action = excluded.recommended_action,
            classified_at = excluded.classified_at
        WHERE excluded.classified_at > verdicts.classified_at
           OR (excluded.classified_at = verdicts.classified_at
               AND excluded.confidence > verdicts.confidence)
        "#,
    )
    .bind(&verdict.record_id)
    .bind(&verdict.model_version)
    .bind(verdict.severity.as_str())
    .bind(i64::from(verdict.severity.score()))
    .bind(verdict.confidence.value())
    .bind(&verdict.rationale)
    .bind(&verdict.category)
    .bind(&verdict.urgency)
    .bind(&verdict.recommended_action)
    .bind(to_db_time(&verdict.classified_at))
    .execute(&mut *conn)
    .await?
    .rows_affected()
        == 1;

    let verdict_write = match (existed.is_some(), written) {
        (false, _) => VerdictWrite::Inserted,
        (true, true) => VerdictWrite::Replaced,
        (true, false) => VerdictWrite::Unchanged,
    };

    if verdict_write != VerdictWrite::Unchanged {
        failure::resolve_failure(&mut *conn, &verdict.record_id, &verdict.model_version).await?;
    }

    Ok(UpsertOutcome {
        record_inserted,
        verdict: verdict_write,
    })
}

/// All verdicts for a record, newest first.
pub async fn verdicts_for_record(pool: &SqlitePool, record_id: &str) -> Result<Vec<SeverityVerdict>> {
    let sql = format!(
        "SELECT {} FROM verdicts WHERE record_id = ? ORDER BY classified_at DESC, model_version ASC",
        VERDICT_COLUMNS
    );

    sqlx::query_as::<_, VerdictRow>(&sql)
        .bind(record_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(VerdictRow::into_verdict)
        .collect()
}

/// Most recent verdict for a record, across model versions.
pub async fn latest_verdict(pool: &SqlitePool, record_id: &str) -> Result<Option<SeverityVerdict>> {
    let sql = format!(
        "SELECT {} FROM verdicts WHERE record_id = ? ORDER BY classified_at DESC LIMIT 1",
        VERDICT_COLUMNS
    );

    sqlx::query_as::<_, VerdictRow>(&sql)
        .bind(record_id)
        .fetch_optional(pool)
        .await?
        .map(VerdictRow::into_verdict)
        .transpose()
}

/// Whether the record already has a verdict from `model_version`.
pub async fn has_verdict<'e, E>(executor: E, record_id: &str, model_version: &str) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM verdicts WHERE record_id = ? AND model_version = ?",
    )
    .bind(record_id)
    .bind(model_version)
    .fetch_optional(executor)
    .await?;

    Ok(found.is_some())
}
