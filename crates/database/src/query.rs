//! Filtered result queries.

use chrono::{DateTime, Utc};
use event_core::{Severity, Source};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::Result;
use crate::models::{to_db_time, ResultRow, StoredResult};

/// Filter for [`query`]. Every field is optional; an empty filter matches
/// every stored result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultFilter {
    /// Lowest severity to include.
    pub min_severity: Option<Severity>,
    /// Highest severity to include.
    pub max_severity: Option<Severity>,
    /// Records ingested at or after this time.
    pub ingested_after: Option<DateTime<Utc>>,
    /// Records ingested strictly before this time.
    pub ingested_before: Option<DateTime<Utc>>,
    pub source: Option<Source>,
    pub model_version: Option<String>,
    /// Drug name, matched case-insensitively.
    pub drug: Option<String>,
    pub limit: Option<u32>,
}

impl ResultFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn max_severity(mut self, severity: Severity) -> Self {
        self.max_severity = Some(severity);
        self
    }

    pub fn ingested_between(mut self, after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.ingested_after = Some(after);
        self.ingested_before = Some(before);
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn drug(mut self, drug: impl Into<String>) -> Self {
        self.drug = Some(drug.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Stored results matching `filter`, most severe first, then most recently
/// ingested. One row per record and model version.
pub async fn query(pool: &SqlitePool, filter: &ResultFilter) -> Result<Vec<StoredResult>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT r.record_id, r.source, r.drug_name, r.reaction_text, r.reported_at,
               r.raw_payload, r.ingested_at,
               v.model_version, v.severity, v.confidence, v.rationale, v.category,
               v.urgency, v.recommended_action, v.classified_at
        FROM records r
        JOIN verdicts v ON v.record_id = r.record_id
        WHERE 1 = 1
        "#,
    );

    if let Some(min) = filter.min_severity {
        qb.push(" AND v.severity_score >= ")
            .push_bind(i64::from(min.score()));
    }
    if let Some(max) = filter.max_severity {
        qb.push(" AND v.severity_score <= ")
            .push_bind(i64::from(max.score()));
    }
    if let Some(after) = filter.ingested_after {
        qb.push(" AND r.ingested_at >= ").push_bind(to_db_time(&after));
    }
    if let Some(before) = filter.ingested_before {
        qb.push(" AND r.ingested_at < ").push_bind(to_db_time(&before));
    }
    if let Some(source) = filter.source {
        qb.push(" AND r.source = ").push_bind(source.as_str());
    }
    if let Some(ref version) = filter.model_version {
        qb.push(" AND v.model_version = ").push_bind(version.clone());
    }
    if let Some(ref drug) = filter.drug {
        qb.push(" AND r.drug_key = ")
            .push_bind(drug.trim().to_lowercase());
    }

    qb.push(" ORDER BY v.severity_score DESC, r.ingested_at DESC, r.record_id ASC, v.model_version ASC");

    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(i64::from(limit));
    }

    qb.build_query_as::<ResultRow>()
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| {
            Ok(StoredResult {
                record: row.record.into_record()?,
                verdict: row.verdict.into_verdict()?,
            })
        })
        .collect()
}
