//! The Classifier trait definition.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClassifyError;
use crate::record::AdverseEventRecord;
use crate::verdict::SeverityVerdict;

/// A classification oracle: maps a record to a severity verdict.
///
/// Implementations range from hosted language models to scripted test
/// doubles. This trait is object-safe and can be used as `Arc<dyn Classifier>`.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a single record.
    async fn classify(&self, record: &AdverseEventRecord) -> Result<SeverityVerdict, ClassifyError>;

    /// Classify a small batch of records.
    ///
    /// Returns exactly one result per input record, in input order, so a
    /// failure for one record never hides the others. The default
    /// implementation classifies the records one after another.
    async fn classify_batch(
        &self,
        records: &[AdverseEventRecord],
    ) -> Vec<Result<SeverityVerdict, ClassifyError>> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(self.classify(record).await);
        }
        results
    }

    /// Whether `classify_batch` sends the whole batch in one oracle call.
    ///
    /// When false, callers may drive the records one at a time and keep
    /// the results that finished before a deadline or cancellation.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Identifier of the oracle and version producing verdicts.
    fn model_version(&self) -> &str;

    /// Human-readable name of this implementation.
    fn name(&self) -> &str;

    /// Check if the oracle is ready to accept requests.
    ///
    /// Default implementation always returns true.
    async fn is_ready(&self) -> bool {
        true
    }
}

#[async_trait]
impl<C: Classifier + ?Sized> Classifier for Arc<C> {
    async fn classify(&self, record: &AdverseEventRecord) -> Result<SeverityVerdict, ClassifyError> {
        (**self).classify(record).await
    }

    async fn classify_batch(
        &self,
        records: &[AdverseEventRecord],
    ) -> Vec<Result<SeverityVerdict, ClassifyError>> {
        (**self).classify_batch(records).await
    }

    fn supports_batch(&self) -> bool {
        (**self).supports_batch()
    }

    fn model_version(&self) -> &str {
        (**self).model_version()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn is_ready(&self) -> bool {
        (**self).is_ready().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;
    use crate::severity::{Confidence, Severity};
    use chrono::Utc;

    struct LengthClassifier;

    #[async_trait]
    impl Classifier for LengthClassifier {
        async fn classify(
            &self,
            record: &AdverseEventRecord,
        ) -> Result<SeverityVerdict, ClassifyError> {
            if record.reaction_text().len() > 20 {
                Ok(SeverityVerdict::new(
                    record.record_id(),
                    Severity::Severe,
                    Confidence::new(0.8).unwrap(),
                    "long description",
                    self.model_version(),
                ))
            } else {
                Err(ClassifyError::Oracle("too short".into()))
            }
        }

        fn model_version(&self) -> &str {
            "length-1"
        }

        fn name(&self) -> &str {
            "LengthClassifier"
        }
    }

    fn record(id: &str, reaction: &str) -> AdverseEventRecord {
        AdverseEventRecord::new(id, Source::Corpus, "drug", reaction, None, "{}", Utc::now())
    }

    #[tokio::test]
    async fn test_default_batch_keeps_order_and_partial_results() {
        let classifier = LengthClassifier;
        let records = vec![
            record("corpus:1", "severe gastric bleeding episode"),
            record("corpus:2", "rash"),
            record("corpus:3", "loss of consciousness for hours"),
        ];

        let results = classifier.classify_batch(&records).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().record_id, "corpus:1");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().record_id, "corpus:3");
    }

    #[tokio::test]
    async fn test_arc_dyn_classifier() {
        let classifier: Arc<dyn Classifier> = Arc::new(LengthClassifier);
        assert_eq!(classifier.name(), "LengthClassifier");
        assert!(!classifier.supports_batch());
        assert!(classifier.is_ready().await);
    }
}
