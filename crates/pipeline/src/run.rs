//! Run requests and run summaries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use event_core::{Severity, Source};
use serde::{Deserialize, Serialize};

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    /// An operator asked for it.
    #[default]
    Manual,
    /// The interval scheduler fired.
    Scheduled,
}

impl RunTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for RunTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(format!("unknown trigger: {:?}", other)),
        }
    }
}

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunRequest {
    /// Records to read from each source. `None` uses the configured default.
    #[serde(default)]
    pub record_count: Option<usize>,
    #[serde(default)]
    pub trigger: RunTrigger,
    /// Classify records again even when they already have a verdict from
    /// the current model.
    #[serde(default)]
    pub reclassify: bool,
}

impl RunRequest {
    pub fn manual() -> Self {
        Self::default()
    }

    pub fn scheduled() -> Self {
        Self {
            trigger: RunTrigger::Scheduled,
            ..Self::default()
        }
    }

    pub fn with_record_count(mut self, count: usize) -> Self {
        self.record_count = Some(count);
        self
    }

    pub fn with_reclassify(mut self, reclassify: bool) -> Self {
        self.reclassify = reclassify;
        self
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every record read was classified or skipped.
    Completed,
    /// Some records or sources failed; the rest were processed.
    Partial,
    /// Every classification attempt failed at the transport level, or no
    /// source could be read.
    Failed,
    /// Stopped by cancellation. Results stored before that point are kept.
    Cancelled,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    /// A verdict was stored.
    Classified {
        severity: Severity,
        model_version: String,
    },
    /// Already classified by the current model.
    Skipped,
    /// Classification failed; the record is in the failure queue.
    Failed { kind: String, error: String },
    /// The run was cancelled before this record finished.
    Cancelled,
}

/// Per-record detail of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub record_id: String,
    pub source: Source,
    #[serde(flatten)]
    pub status: RecordStatus,
    /// Oracle calls made for this record.
    pub attempts: u32,
    /// Share of its batch's classification time, retries included.
    pub elapsed_ms: u64,
}

/// A raw item that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub source: String,
    pub origin: String,
    pub reason: String,
}

/// Counts of alert activity during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub sent: usize,
    pub failed: usize,
    /// Retry bound exceeded during this run's retry pass.
    pub abandoned: usize,
    /// Urgent-case digests posted (at most one per run).
    #[serde(default)]
    pub digests: usize,
}

/// The single result a run reports to its trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub trigger: RunTrigger,
    pub outcome: RunOutcome,
    pub model_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Raw items read across all sources.
    pub read: usize,
    pub classified: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rejected: Vec<RejectedRecord>,
    /// Sources that failed or were aborted.
    pub source_errors: Vec<String>,
    pub alerts: AlertCounts,
    /// Mean classification time per classified record.
    pub mean_record_ms: Option<f64>,
    pub records: Vec<RecordResult>,
}

impl RunSummary {
    /// Records that reached the oracle.
    pub fn attempted(&self) -> usize {
        self.classified + self.failed
    }
}

/// Decide the outcome from what the run saw.
pub(crate) fn decide_outcome(
    cancelled: bool,
    records: &[RecordResult],
    sources_total: usize,
    source_errors: usize,
    rejected: usize,
) -> RunOutcome {
    if cancelled {
        return RunOutcome::Cancelled;
    }

    if sources_total > 0 && source_errors == sources_total {
        return RunOutcome::Failed;
    }

    let mut attempted = 0usize;
    let mut transport_failures = 0usize;
    let mut failures = 0usize;
    for r in records {
        match &r.status {
            RecordStatus::Classified { .. } => attempted += 1,
            RecordStatus::Failed { kind, .. } => {
                attempted += 1;
                failures += 1;
                if kind == "oracle" || kind == "timeout" {
                    transport_failures += 1;
                }
            }
            RecordStatus::Skipped | RecordStatus::Cancelled => {}
        }
    }

    if attempted > 0 && transport_failures == attempted {
        RunOutcome::Failed
    } else if failures > 0 || source_errors > 0 || rejected > 0 {
        RunOutcome::Partial
    } else {
        RunOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: RecordStatus) -> RecordResult {
        RecordResult {
            record_id: "corpus:1".into(),
            source: Source::Corpus,
            status,
            attempts: 1,
            elapsed_ms: 0,
        }
    }

    fn classified() -> RecordResult {
        result(RecordStatus::Classified {
            severity: Severity::Mild,
            model_version: "m".into(),
        })
    }

    fn failed(kind: &str) -> RecordResult {
        result(RecordStatus::Failed {
            kind: kind.into(),
            error: "e".into(),
        })
    }

    #[test]
    fn test_outcomes() {
        assert_eq!(decide_outcome(false, &[classified()], 1, 0, 0), RunOutcome::Completed);
        assert_eq!(decide_outcome(false, &[], 1, 0, 0), RunOutcome::Completed);
        assert_eq!(decide_outcome(true, &[classified()], 1, 0, 0), RunOutcome::Cancelled);
        assert_eq!(
            decide_outcome(false, &[classified(), failed("parse")], 1, 0, 0),
            RunOutcome::Partial
        );
        assert_eq!(
            decide_outcome(false, &[failed("oracle"), failed("timeout")], 1, 0, 0),
            RunOutcome::Failed
        );
        // A parse failure means the oracle answered.
        assert_eq!(
            decide_outcome(false, &[failed("oracle"), failed("parse")], 1, 0, 0),
            RunOutcome::Partial
        );
        assert_eq!(decide_outcome(false, &[classified()], 2, 1, 0), RunOutcome::Partial);
        assert_eq!(decide_outcome(false, &[], 2, 2, 0), RunOutcome::Failed);
        assert_eq!(decide_outcome(false, &[classified()], 1, 0, 1), RunOutcome::Partial);
    }

    #[test]
    fn test_record_result_json_shape() {
        let json = serde_json::to_value(failed("parse")).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "parse");
        assert_eq!(json["source"], "corpus");
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: RunRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, RunRequest::manual());

        let request: RunRequest =
            serde_json::from_str(r#"{"record_count": 3, "trigger": "scheduled", "reclassify": true}"#).unwrap();
        assert_eq!(request.record_count, Some(3));
        assert_eq!(request.trigger, RunTrigger::Scheduled);
        assert!(request.reclassify);
    }
}
