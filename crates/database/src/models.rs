//! Database models.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with nanosecond
//! precision so that string order equals time order.

use chrono::{DateTime, SecondsFormat, Utc};
use event_core::{
    AdverseEventRecord, AlertEvent, Confidence, DeliveryStatus, Severity, SeverityVerdict,
    SinkKind, Source,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{DatabaseError, Result};

/// Format a timestamp for storage.
pub fn to_db_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn from_db_time(entity: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::corrupt(entity, format!("timestamp {:?}: {}", value, e)))
}

fn from_db_time_opt(entity: &'static str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| from_db_time(entity, v)).transpose()
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct RecordRow {
    pub record_id: String,
    pub source: String,
    pub drug_name: String,
    pub reaction_text: String,
    pub reported_at: Option<String>,
    pub raw_payload: String,
    pub ingested_at: String,
}

impl RecordRow {
    pub fn into_record(self) -> Result<AdverseEventRecord> {
        let source: Source = self
            .source
            .parse()
            .map_err(|e| DatabaseError::corrupt("Record", e))?;

        Ok(AdverseEventRecord::new(
            self.record_id,
            source,
            self.drug_name,
            self.reaction_text,
            from_db_time_opt("Record", self.reported_at.as_deref())?,
            self.raw_payload,
            from_db_time("Record", &self.ingested_at)?,
        ))
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct VerdictRow {
    pub record_id: String,
    pub model_version: String,
    pub severity: String,
    pub confidence: f64,
    pub rationale: String,
    pub category: Option<String>,
    pub urgency: Option<String>,
    pub recommended_action: Option<String>,
    pub classified_at: String,
}

impl VerdictRow {
    pub fn into_verdict(self) -> Result<SeverityVerdict> {
        let severity: Severity = self
            .severity
            .parse()
            .map_err(|e| DatabaseError::corrupt("Verdict", e))?;
        let confidence = Confidence::new(self.confidence).ok_or_else(|| {
            DatabaseError::corrupt("Verdict", format!("confidence {}", self.confidence))
        })?;

        Ok(SeverityVerdict {
            record_id: self.record_id,
            severity,
            confidence,
            rationale: self.rationale,
            model_version: self.model_version,
            category: self.category,
            urgency: self.urgency,
            recommended_action: self.recommended_action,
            classified_at: from_db_time("Verdict", &self.classified_at)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ResultRow {
    #[sqlx(flatten)]
    pub record: RecordRow,
    #[sqlx(flatten)]
    pub verdict: VerdictRow,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AlertRow {
    pub record_id: String,
    pub sink: String,
    pub severity: String,
    pub delivery_status: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub dispatched_at: Option<String>,
    pub created_at: String,
}

impl AlertRow {
    pub fn into_alert(self) -> Result<AlertEvent> {
        let sink: SinkKind = self
            .sink
            .parse()
            .map_err(|e| DatabaseError::corrupt("AlertEvent", e))?;
        let severity: Severity = self
            .severity
            .parse()
            .map_err(|e| DatabaseError::corrupt("AlertEvent", e))?;
        let delivery_status: DeliveryStatus = self
            .delivery_status
            .parse()
            .map_err(|e| DatabaseError::corrupt("AlertEvent", e))?;

        Ok(AlertEvent {
            record_id: self.record_id,
            severity,
            sink,
            delivery_status,
            attempts: u32::try_from(self.attempts).unwrap_or(u32::MAX),
            last_error: self.last_error,
            dispatched_at: from_db_time_opt("AlertEvent", self.dispatched_at.as_deref())?,
            created_at: from_db_time("AlertEvent", &self.created_at)?,
        })
    }
}

/// A record together with one of its verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub record: AdverseEventRecord,
    pub verdict: SeverityVerdict,
}

/// Everything stored about one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDetail {
    pub record: AdverseEventRecord,
    /// One per model version, newest first.
    pub verdicts: Vec<SeverityVerdict>,
    pub alerts: Vec<AlertEvent>,
}

/// What an upsert changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictWrite {
    /// First verdict for this record and model version.
    Inserted,
    /// An older (or less confident) verdict was replaced.
    Replaced,
    /// The stored verdict is at least as recent; nothing changed.
    Unchanged,
}

/// Result of [`upsert`](crate::verdict::upsert).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    /// Whether the record row was created by this call.
    pub record_inserted: bool,
    pub verdict: VerdictWrite,
}

impl UpsertOutcome {
    /// True when the call changed nothing.
    pub fn is_noop(&self) -> bool {
        !self.record_inserted && self.verdict == VerdictWrite::Unchanged
    }
}

/// A record the oracle could not classify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub id: i64,
    pub record_id: String,
    pub model_version: String,
    /// "oracle", "timeout" or "parse".
    pub kind: String,
    pub error: String,
    /// Oracle calls spent on the record across runs.
    pub attempts: i64,
    pub run_id: Option<String>,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct FailureRow {
    pub id: i64,
    pub record_id: String,
    pub model_version: String,
    pub kind: String,
    pub error: String,
    pub attempts: i64,
    pub run_id: Option<String>,
    pub failed_at: String,
}

impl FailureRow {
    pub fn into_entry(self) -> Result<FailureEntry> {
        Ok(FailureEntry {
            failed_at: from_db_time("ClassificationFailure", &self.failed_at)?,
            id: self.id,
            record_id: self.record_id,
            model_version: self.model_version,
            kind: self.kind,
            error: self.error,
            attempts: self.attempts,
            run_id: self.run_id,
        })
    }
}

/// One pipeline run in the history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub run_id: String,
    /// "manual" or "scheduled".
    pub trigger: String,
    /// "running" until the run finishes.
    pub outcome: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Run summary as written by the pipeline.
    pub summary: Option<serde_json::Value>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct RunRow {
    pub run_id: String,
    pub trigger: String,
    pub outcome: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub summary: Option<String>,
}

impl RunRow {
    pub fn into_entry(self) -> Result<RunEntry> {
        let summary = self
            .summary
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| DatabaseError::corrupt("PipelineRun", e))?;

        Ok(RunEntry {
            started_at: from_db_time("PipelineRun", &self.started_at)?,
            finished_at: from_db_time_opt("PipelineRun", self.finished_at.as_deref())?,
            run_id: self.run_id,
            trigger: self.trigger,
            outcome: self.outcome,
            summary,
        })
    }
}
