//! Urgent-case digest.
//!
//! One Discord message per run listing the most severe cases the oracle
//! marked `urgent` or `immediate`, on top of the per-record alerts.

use chrono::{DateTime, Utc};
use event_core::{Severity, SeverityVerdict};

use crate::message::AlertMessage;

/// Cases listed by name; the rest are counted.
pub const DIGEST_TOP_CASES: usize = 5;

/// `record_id` carried by digest messages, which cover many records.
pub const DIGEST_ID: &str = "urgent-digest";

/// Render the digest for `verdicts`, or `None` when none is urgent.
///
/// Cases are ranked by severity, then confidence, then record id.
pub fn urgent_digest<'a>(
    verdicts: impl IntoIterator<Item = &'a SeverityVerdict>,
    at: DateTime<Utc>,
) -> Option<AlertMessage> {
    let mut urgent: Vec<&SeverityVerdict> = verdicts.into_iter().filter(|v| v.is_urgent()).collect();
    if urgent.is_empty() {
        return None;
    }

    urgent.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.confidence.value().total_cmp(&a.confidence.value()))
            .then_with(|| a.record_id.cmp(&b.record_id))
    });

    let top = urgent.iter().take(DIGEST_TOP_CASES);
    let severity = urgent.first().map(|v| v.severity).unwrap_or(Severity::Informational);

    let mut body = format!("🚨 URGENT ALERTS ({} total)\n", urgent.len());
    body.push_str(&format!("⏰ {}\n\nTop cases:\n", at.format("%m/%d/%Y, %I:%M %p UTC")));
    for (rank, verdict) in top.enumerate() {
        body.push_str(&format!(
            "{}. Severity {}/5 | {} | {}\n",
            rank + 1,
            verdict.severity.score(),
            verdict.category.as_deref().unwrap_or("unspecified"),
            verdict.record_id
        ));
    }
    if urgent.len() > DIGEST_TOP_CASES {
        body.push_str(&format!("\n+{} more\n", urgent.len() - DIGEST_TOP_CASES));
    }
    body.push_str("\n⚡ REVIEW REQUIRED");

    Some(AlertMessage {
        record_id: DIGEST_ID.to_string(),
        severity,
        subject: format!("Urgent adverse events: {} cases", urgent.len()),
        body,
    })
}
