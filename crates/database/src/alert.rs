//! Alert event state machine.
//!
//! ```text
//! pending --claim--> dispatching --mark_sent--> sent
//!    ^                    |
//!    |                mark_failed
//!    |                    v
//!    +----requeue----- failed --abandon--> abandoned
//! ```
//!
//! Every transition is a single conditional `UPDATE`, so two dispatchers
//! racing for the same `(record_id, sink)` cannot both deliver.

use chrono::{DateTime, Utc};
use event_core::{AlertEvent, DeliveryStatus, Severity, SinkKind};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{to_db_time, AlertRow};

const ALERT_COLUMNS: &str =
    "record_id, sink, severity, delivery_status, attempts, last_error, dispatched_at, created_at";

fn alert_id(record_id: &str, sink: SinkKind) -> String {
    format!("{}/{}", record_id, sink.as_str())
}

/// Create a pending alert unless one already exists for `(record_id, sink)`.
///
/// Returns `true` when the row was created.
pub async fn insert_pending(
    pool: &SqlitePool,
    record_id: &str,
    sink: SinkKind,
    severity: Severity,
    now: DateTime<Utc>,
) -> Result<bool> {
    let now = to_db_time(&now);
    let result = sqlx::query(
        r#"
        INSERT INTO alert_events (record_id, sink, severity, delivery_status, attempts, created_at, updated_at)
        VALUES (?, ?, ?, 'pending', 0, ?, ?)
        ON CONFLICT (record_id, sink) DO NOTHING
        "#,
    )
    .bind(record_id)
    .bind(sink.as_str())
    .bind(severity.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Move a pending alert to `dispatching` and count the attempt.
///
/// Returns `None` when the alert is not pending, meaning another caller
/// owns it or it is already settled. Only the caller that gets `Some` may
/// deliver.
pub async fn claim(
    pool: &SqlitePool,
    record_id: &str,
    sink: SinkKind,
    now: DateTime<Utc>,
) -> Result<Option<AlertEvent>> {
    let sql = format!(
        r#"
        UPDATE alert_events
        SET delivery_status = 'dispatching', attempts = attempts + 1, updated_at = ?
        WHERE record_id = ? AND sink = ? AND delivery_status = 'pending'
        RETURNING {}
        "#,
        ALERT_COLUMNS
    );

    sqlx::query_as::<_, AlertRow>(&sql)
        .bind(to_db_time(&now))
        .bind(record_id)
        .bind(sink.as_str())
        .fetch_optional(pool)
        .await?
        .map(AlertRow::into_alert)
        .transpose()
}

async fn transition(
    pool: &SqlitePool,
    record_id: &str,
    sink: SinkKind,
    from: DeliveryStatus,
    set_clause: &str,
    binds: &[Option<String>],
) -> Result<AlertEvent> {
    let sql = format!(
        r#"
        UPDATE alert_events
        SET {}
        WHERE record_id = ? AND sink = ? AND delivery_status = ?
        RETURNING {}
        "#,
        set_clause, ALERT_COLUMNS
    );

    let mut query = sqlx::query_as::<_, AlertRow>(&sql);
    for bind in binds {
        query = query.bind(bind.clone());
    }

    query
        .bind(record_id)
        .bind(sink.as_str())
        .bind(from.as_str())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::InvalidState {
            entity: "AlertEvent",
            id: alert_id(record_id, sink),
            expected: from.as_str(),
        })?
        .into_alert()
}

/// `dispatching` → `sent`.
pub async fn mark_sent(
    pool: &SqlitePool,
    record_id: &str,
    sink: SinkKind,
    now: DateTime<Utc>,
) -> Result<AlertEvent> {
    let now = to_db_time(&now);
    transition(
        pool,
        record_id,
        sink,
        DeliveryStatus::Dispatching,
        "delivery_status = 'sent', last_error = NULL, dispatched_at = ?, updated_at = ?",
        &[Some(now.clone()), Some(now)],
    )
    .await
}

/// `dispatching` → `failed`, keeping the error for the operator.
pub async fn mark_failed(
    pool: &SqlitePool,
    record_id: &str,
    sink: SinkKind,
    error: &str,
    now: DateTime<Utc>,
) -> Result<AlertEvent> {
    transition(
        pool,
        record_id,
        sink,
        DeliveryStatus::Dispatching,
        "delivery_status = 'failed', last_error = ?, updated_at = ?",
        &[Some(error.to_string()), Some(to_db_time(&now))],
    )
    .await
}

/// `failed` → `pending`, making the alert claimable again.
pub async fn requeue(
    pool: &SqlitePool,
    record_id: &str,
    sink: SinkKind,
    now: DateTime<Utc>,
) -> Result<AlertEvent> {
    transition(
        pool,
        record_id,
        sink,
        DeliveryStatus::Failed,
        "delivery_status = 'pending', updated_at = ?",
        &[Some(to_db_time(&now))],
    )
    .await
}

/// `failed` → `abandoned` (terminal).
pub async fn abandon(
    pool: &SqlitePool,
    record_id: &str,
    sink: SinkKind,
    now: DateTime<Utc>,
) -> Result<AlertEvent> {
    transition(
        pool,
        record_id,
        sink,
        DeliveryStatus::Failed,
        "delivery_status = 'abandoned', updated_at = ?",
        &[Some(to_db_time(&now))],
    )
    .await
}

/// Fail alerts stuck in `dispatching` since before `cutoff`.
///
/// A dispatcher that dies mid-delivery leaves its claim behind; this makes
/// such alerts eligible for retry.
pub async fn release_stale_claims(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE alert_events
        SET delivery_status = 'failed', last_error = 'delivery interrupted', updated_at = ?
        WHERE delivery_status = 'dispatching' AND updated_at < ?
        "#,
    )
    .bind(to_db_time(&Utc::now()))
    .bind(to_db_time(&cutoff))
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn get_alert(pool: &SqlitePool, record_id: &str, sink: SinkKind) -> Result<AlertEvent> {
    let sql = format!(
        "SELECT {} FROM alert_events WHERE record_id = ? AND sink = ?",
        ALERT_COLUMNS
    );

    sqlx::query_as::<_, AlertRow>(&sql)
        .bind(record_id)
        .bind(sink.as_str())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "AlertEvent",
            id: alert_id(record_id, sink),
        })?
        .into_alert()
}

pub async fn alerts_for_record(pool: &SqlitePool, record_id: &str) -> Result<Vec<AlertEvent>> {
    let sql = format!(
        "SELECT {} FROM alert_events WHERE record_id = ? ORDER BY sink",
        ALERT_COLUMNS
    );

    sqlx::query_as::<_, AlertRow>(&sql)
        .bind(record_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(AlertRow::into_alert)
        .collect()
}

/// Alerts, optionally restricted to one status, most recently updated first.
pub async fn list_alerts(
    pool: &SqlitePool,
    status: Option<DeliveryStatus>,
    limit: i64,
) -> Result<Vec<AlertEvent>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM alert_events
        WHERE (?1 IS NULL OR delivery_status = ?1)
        ORDER BY updated_at DESC, record_id, sink
        LIMIT ?2
        "#,
        ALERT_COLUMNS
    );

    sqlx::query_as::<_, AlertRow>(&sql)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(AlertRow::into_alert)
        .collect()
}

/// Alerts in `status` for the given sinks, least recently updated first.
///
/// Used by retry passes, so alerts for sinks nobody can deliver to never
/// crowd out the ones that can be driven.
pub async fn list_for_sinks(
    pool: &SqlitePool,
    status: DeliveryStatus,
    sinks: &[SinkKind],
    limit: i64,
) -> Result<Vec<AlertEvent>> {
    if sinks.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; sinks.len()].join(", ");
    let sql = format!(
        r#"
        SELECT {}
        FROM alert_events
        WHERE delivery_status = ? AND sink IN ({})
        ORDER BY updated_at ASC, record_id, sink
        LIMIT ?
        "#,
        ALERT_COLUMNS, placeholders
    );

    let mut query = sqlx::query_as::<_, AlertRow>(&sql).bind(status.as_str());
    for sink in sinks {
        query = query.bind(sink.as_str());
    }

    query
        .bind(limit)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(AlertRow::into_alert)
        .collect()
}
