//! Alert text.

use event_core::{AdverseEventRecord, Severity, SeverityVerdict};
use serde::Serialize;

/// Reaction text longer than this is cut in alerts.
const REACTION_EXCERPT_CHARS: usize = 280;

/// A rendered alert, ready for any sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMessage {
    pub record_id: String,
    pub severity: Severity,
    /// One-line summary, used as the email subject.
    pub subject: String,
    /// Full alert text.
    pub body: String,
}

impl AlertMessage {
    pub fn new(record: &AdverseEventRecord, verdict: &SeverityVerdict) -> Self {
        let headline = headline(verdict.severity);
        let subject = format!("{}: {}", headline, record.drug_name());

        let mut body = String::new();
        body.push_str(&headline);
        body.push_str("\n\n");
        body.push_str(&format!("Drug: {}\n", record.drug_name()));
        body.push_str(&format!("Reaction: {}\n", excerpt(record.reaction_text())));
        body.push_str(&format!(
            "Severity: {}/5 ({})\n",
            verdict.severity.score(),
            verdict.severity
        ));
        body.push_str(&format!(
            "Category: {}\n",
            verdict.category.as_deref().unwrap_or("unspecified")
        ));
        if let Some(ref urgency) = verdict.urgency {
            body.push_str(&format!("Urgency: {}\n", urgency));
        }
        body.push_str(&format!(
            "\nAction: {}\n",
            verdict.recommended_action.as_deref().unwrap_or("review report")
        ));
        body.push_str(&format!("\nConfidence: {}\n", verdict.confidence));
        body.push_str(&format!(
            "Record: {} ({})\n",
            record.record_id(),
            record.source()
        ));
        body.push_str(&format!("Model: {}", verdict.model_version));

        if verdict.severity == Severity::Critical {
            body.push_str("\n\n⚡ IMMEDIATE REVIEW REQUIRED");
        }

        Self {
            record_id: record.record_id().to_string(),
            severity: verdict.severity,
            subject,
            body,
        }
    }
}

fn headline(severity: Severity) -> String {
    match severity {
        Severity::Critical => "🚨 CRITICAL ADVERSE EVENT".to_string(),
        other => format!("⚠️ {} ADVERSE EVENT", other.as_str().to_uppercase()),
    }
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= REACTION_EXCERPT_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(REACTION_EXCERPT_CHARS).collect();
    cut.push('…');
    cut
}
