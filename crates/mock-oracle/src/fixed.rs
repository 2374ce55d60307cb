//! Fixed classifier - one verdict for everything.

use std::sync::atomic::{AtomicUsize, Ordering};

use event_core::{
    async_trait, AdverseEventRecord, Classifier, ClassifyError, Confidence, Severity,
    SeverityVerdict,
};

/// Returns the same severity and confidence for every record.
#[derive(Debug)]
pub struct FixedClassifier {
    severity: Severity,
    confidence: Confidence,
    model_version: String,
    calls: AtomicUsize,
}

impl FixedClassifier {
    /// Create a classifier; `confidence` is clamped into `[0, 1]`.
    pub fn new(severity: Severity, confidence: f64) -> Self {
        let confidence = Confidence::new(confidence.clamp(0.0, 1.0)).unwrap_or(Confidence::ZERO);
        Self {
            severity,
            confidence,
            model_version: "mock-fixed".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    /// Number of records classified so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(&self, record: &AdverseEventRecord) -> Result<SeverityVerdict, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SeverityVerdict::new(
            record.record_id(),
            self.severity,
            self.confidence,
            format!("fixed {} verdict", self.severity),
            &self.model_version,
        ))
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }

    fn name(&self) -> &str {
        "FixedClassifier"
    }
}
