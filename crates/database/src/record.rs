//! Record persistence.

use chrono::{DateTime, Utc};
use event_core::AdverseEventRecord;
use sqlx::{Sqlite, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{to_db_time, RecordRow};

pub(crate) const RECORD_COLUMNS: &str =
    "record_id, source, drug_name, reaction_text, reported_at, raw_payload, ingested_at";

/// Insert a record unless one with the same id exists.
///
/// Returns `true` when the row was created. Records are immutable, so a
/// second insert of the same id leaves the first one untouched.
pub async fn insert_record<'e, E>(executor: E, record: &AdverseEventRecord) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO records
            (record_id, source, drug_name, drug_key, reaction_text, reported_at, raw_payload, ingested_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (record_id) DO NOTHING
        "#,
    )
    .bind(record.record_id())
    .bind(record.source().as_str())
    .bind(record.drug_name())
    .bind(record.drug_key())
    .bind(record.reaction_text())
    .bind(record.reported_at().as_ref().map(to_db_time))
    .bind(record.raw_payload())
    .bind(to_db_time(&record.ingested_at()))
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Get a record by id.
pub async fn get_record(pool: &SqlitePool, record_id: &str) -> Result<AdverseEventRecord> {
    let sql = format!("SELECT {} FROM records WHERE record_id = ?", RECORD_COLUMNS);

    sqlx::query_as::<_, RecordRow>(&sql)
        .bind(record_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Record",
            id: record_id.to_string(),
        })?
        .into_record()
}

/// Delete records ingested before `cutoff`, with their verdicts, alert
/// events and failure entries.
///
/// Returns the number of records deleted.
pub async fn purge_before(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM records
        WHERE ingested_at < ?
        "#,
    )
    .bind(to_db_time(&cutoff))
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
