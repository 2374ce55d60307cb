//! The run report email.

use std::collections::BTreeMap;

use database::StoredResult;
use event_core::{Severity, Source};
use mailer::{Attachment, Email, Mailer, MailerError};
use tracing::info;

use crate::run::RunSummary;

/// Attachment holding every record classified in the run.
pub const REPORT_ATTACHMENT: &str = "analysis.json";

/// Sends a summary email after each run.
#[derive(Debug, Clone)]
pub struct RunReporter {
    mailer: Mailer,
    recipients: Vec<String>,
    threshold: Severity,
}

impl RunReporter {
    /// Report to `recipients`; "critical" means severe or worse.
    pub fn new(mailer: Mailer, recipients: Vec<String>) -> Self {
        Self {
            mailer,
            recipients,
            threshold: Severity::Severe,
        }
    }

    pub fn with_threshold(mut self, threshold: Severity) -> Self {
        self.threshold = threshold;
        self
    }

    pub async fn send(&self, summary: &RunSummary, results: &[StoredResult]) -> Result<(), MailerError> {
        let email = render_report(&self.recipients, summary, results, self.threshold)?;
        self.mailer.send(&email).await?;
        info!(run_id = %summary.run_id, recipients = self.recipients.len(), "Run report sent");
        Ok(())
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn tally<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value.to_string()).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

fn source_label(source: Source) -> &'static str {
    match source {
        Source::Corpus => "Patient reports (corpus)",
        Source::Regulatory => "Regulatory reports (openFDA)",
        Source::Literature => "Literature (PubMed)",
    }
}

/// Build the report email with the analyzed records attached as JSON.
pub fn render_report(
    recipients: &[String],
    summary: &RunSummary,
    results: &[StoredResult],
    threshold: Severity,
) -> Result<Email, MailerError> {
    let total = results.len();
    let critical = results
        .iter()
        .filter(|r| r.verdict.severity >= threshold)
        .count();
    let mean_score = if total == 0 {
        0.0
    } else {
        results
            .iter()
            .map(|r| f64::from(r.verdict.severity.score()))
            .sum::<f64>()
            / total as f64
    };

    let rule = "━".repeat(48);
    let mut body = String::new();

    body.push_str("ADVERSE EVENT ANALYSIS REPORT\n\n");
    body.push_str(&format!(
        "Run: {} ({}, {})\nGenerated: {}\nModel: {}\n\n",
        summary.run_id,
        summary.trigger,
        summary.outcome,
        summary.finished_at.format("%B %d, %Y at %H:%M UTC"),
        summary.model_version
    ));

    body.push_str(&format!("{}\nEXECUTIVE SUMMARY\n{}\n\n", rule, rule));
    body.push_str(&format!("Records analyzed: {}\n", total));
    body.push_str(&format!(
        "Critical cases (severity >= {}): {} ({:.1}%)\n",
        threshold,
        critical,
        percent(critical, total)
    ));
    body.push_str(&format!("Average severity score: {:.2}/5.0\n", mean_score));
    body.push_str(&format!(
        "Processing time: {:.1} seconds\n",
        summary.duration_ms as f64 / 1000.0
    ));
    if let Some(ms) = summary.mean_record_ms {
        body.push_str(&format!("Speed: {:.2} seconds per record\n", ms / 1000.0));
    }

    body.push_str(&format!("\n{}\nDATA SOURCE BREAKDOWN\n{}\n\n", rule, rule));
    for source in Source::ALL {
        let n = results.iter().filter(|r| r.record.source() == source).count();
        body.push_str(&format!(
            "{}: {} records ({:.1}%)\n",
            source_label(source),
            n,
            percent(n, total)
        ));
    }

    body.push_str(&format!("\n{}\nMEDICAL CATEGORY DISTRIBUTION\n{}\n\n", rule, rule));
    for (category, n) in tally(
        results
            .iter()
            .map(|r| r.verdict.category.as_deref().unwrap_or("Unspecified")),
    ) {
        body.push_str(&format!("{}: {} cases ({:.1}%)\n", category, n, percent(n, total)));
    }

    body.push_str(&format!("\n{}\nURGENCY LEVEL BREAKDOWN\n{}\n\n", rule, rule));
    for (urgency, n) in tally(
        results
            .iter()
            .map(|r| r.verdict.urgency.as_deref().unwrap_or("unspecified")),
    ) {
        body.push_str(&format!(
            "{}: {} cases ({:.1}%)\n",
            urgency.to_uppercase(),
            n,
            percent(n, total)
        ));
    }

    body.push_str(&format!("\n{}\nACTIONS TAKEN\n{}\n\n", rule, rule));
    body.push_str(&format!("Alerts sent: {}\n", summary.alerts.sent));
    body.push_str(&format!("Alerts failed (will retry): {}\n", summary.alerts.failed));
    let urgent = results.iter().filter(|r| r.verdict.is_urgent()).count();
    body.push_str(&format!(
        "Urgent cases: {} (digest {})\n",
        urgent,
        if summary.alerts.digests > 0 { "sent" } else { "not sent" }
    ));
    body.push_str(&format!("Alerts abandoned: {}\n", summary.alerts.abandoned));
    body.push_str(&format!("Full analysis attached as {}\n", REPORT_ATTACHMENT));

    if summary.failed > 0 || !summary.rejected.is_empty() || !summary.source_errors.is_empty() {
        body.push_str(&format!("\n{}\nPROBLEMS\n{}\n\n", rule, rule));
        body.push_str(&format!("Classification failures: {}\n", summary.failed));
        body.push_str(&format!("Rejected records: {}\n", summary.rejected.len()));
        for error in &summary.source_errors {
            body.push_str(&format!("Source error: {}\n", error));
        }
    }

    let data = serde_json::to_vec_pretty(results)
        .map_err(|e| MailerError::Build(format!("cannot encode results: {}", e)))?;

    let subject = format!(
        "Adverse event report: {} records, {} critical ({})",
        total, critical, summary.outcome
    );

    Ok(Email::new(recipients.iter().cloned(), subject, body)
        .with_attachment(Attachment::json(REPORT_ATTACHMENT, data)))
}
