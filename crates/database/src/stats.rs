//! Dashboard statistics.

use event_core::{DeliveryStatus, Severity, Source};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::error::Result;
use crate::failure::count_failures;

/// Aggregate figures over the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_records: i64,
    /// Records with at least one verdict.
    pub classified_records: i64,
    /// Record counts for every source, including empty ones.
    pub records_by_source: Vec<SourceCount>,
    /// Verdict counts per severity, most severe first.
    pub verdicts_by_severity: Vec<SeverityCount>,
    /// Verdict counts per oracle category, largest first.
    pub verdicts_by_category: Vec<LabelCount>,
    /// Verdict counts per urgency label, largest first.
    pub verdicts_by_urgency: Vec<LabelCount>,
    /// Threshold used for `at_or_above_threshold`.
    pub threshold: Severity,
    /// Records whose most severe verdict is at or above `threshold`.
    pub at_or_above_threshold: i64,
    /// Mean severity score (1-5) over all verdicts.
    pub mean_severity_score: Option<f64>,
    pub alerts_by_status: Vec<StatusCount>,
    /// Open entries in the classification failure queue.
    pub open_failures: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source: Source,
    pub records: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCount {
    pub severity: Severity,
    pub verdicts: i64,
}

/// Count for a free-text verdict label; missing labels count as `unspecified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LabelCount {
    pub label: String,
    pub verdicts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: DeliveryStatus,
    pub alerts: i64,
}

/// Compute statistics, optionally restricted to one model version.
pub async fn stats(
    pool: &SqlitePool,
    threshold: Severity,
    model_version: Option<&str>,
) -> Result<StoreStats> {
    let total_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
        .fetch_one(pool)
        .await?;

    let by_source: Vec<(String, i64)> =
        sqlx::query_as("SELECT source, COUNT(*) FROM records GROUP BY source")
            .fetch_all(pool)
            .await?;
    let records_by_source = Source::ALL
        .iter()
        .map(|source| SourceCount {
            source: *source,
            records: count_for(&by_source, source.as_str()),
        })
        .collect();

    let (classified_records, at_or_above_threshold, mean_severity_score): (i64, i64, Option<f64>) =
        sqlx::query_as(
            r#"
            SELECT
                COUNT(DISTINCT record_id),
                COUNT(DISTINCT CASE WHEN severity_score >= ?1 THEN record_id END),
                AVG(severity_score)
            FROM verdicts
            WHERE (?2 IS NULL OR model_version = ?2)
            "#,
        )
        .bind(i64::from(threshold.score()))
        .bind(model_version)
        .fetch_one(pool)
        .await?;

    let by_severity: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT severity, COUNT(*)
        FROM verdicts
        WHERE (?1 IS NULL OR model_version = ?1)
        GROUP BY severity
        "#,
    )
    .bind(model_version)
    .fetch_all(pool)
    .await?;
    let verdicts_by_severity = Severity::ALL
        .iter()
        .rev()
        .map(|severity| SeverityCount {
            severity: *severity,
            verdicts: count_for(&by_severity, severity.as_str()),
        })
        .collect();

    let verdicts_by_category = label_counts(pool, "category", model_version).await?;
    let verdicts_by_urgency = label_counts(pool, "urgency", model_version).await?;

    let by_status: Vec<(String, i64)> =
        sqlx::query_as("SELECT delivery_status, COUNT(*) FROM alert_events GROUP BY delivery_status")
            .fetch_all(pool)
            .await?;
    let alerts_by_status = [
        DeliveryStatus::Pending,
        DeliveryStatus::Dispatching,
        DeliveryStatus::Sent,
        DeliveryStatus::Failed,
        DeliveryStatus::Abandoned,
    ]
    .iter()
    .map(|status| StatusCount {
        status: *status,
        alerts: count_for(&by_status, status.as_str()),
    })
    .collect();

    Ok(StoreStats {
        total_records,
        classified_records,
        records_by_source,
        verdicts_by_severity,
        verdicts_by_category,
        verdicts_by_urgency,
        threshold,
        at_or_above_threshold,
        mean_severity_score,
        alerts_by_status,
        open_failures: count_failures(pool).await?,
    })
}

/// Group verdicts by a label column, case-insensitively.
///
/// `column` is always one of our own column names, never user input.
async fn label_counts(
    pool: &SqlitePool,
    column: &'static str,
    model_version: Option<&str>,
) -> Result<Vec<LabelCount>> {
    let sql = format!(
        r#"
        SELECT COALESCE(NULLIF(LOWER(TRIM({col})), ''), 'unspecified') AS label, COUNT(*) AS verdicts
        FROM verdicts
        WHERE (?1 IS NULL OR model_version = ?1)
        GROUP BY label
        ORDER BY verdicts DESC, label ASC
        "#,
        col = column
    );

    Ok(sqlx::query_as::<_, LabelCount>(&sql)
        .bind(model_version)
        .fetch_all(pool)
        .await?)
}

fn count_for(counts: &[(String, i64)], key: &str) -> i64 {
    counts
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, n)| *n)
        .unwrap_or(0)
}
