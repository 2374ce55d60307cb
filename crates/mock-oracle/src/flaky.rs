//! Flaky classifier - transient failures before success.

use std::sync::atomic::{AtomicUsize, Ordering};

use event_core::{async_trait, AdverseEventRecord, Classifier, ClassifyError, SeverityVerdict};

/// Fails the first `failures` calls with a transient oracle error, then
/// delegates to the wrapped classifier.
pub struct FlakyClassifier<C: Classifier> {
    inner: C,
    failures: usize,
    calls: AtomicUsize,
}

impl<C: Classifier> FlakyClassifier<C> {
    pub fn new(inner: C, failures: usize) -> Self {
        Self {
            inner,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Classifier> Classifier for FlakyClassifier<C> {
    async fn classify(&self, record: &AdverseEventRecord) -> Result<SeverityVerdict, ClassifyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ClassifyError::Oracle(format!(
                "simulated outage (call {})",
                call + 1
            )));
        }
        self.inner.classify(record).await
    }

    fn model_version(&self) -> &str {
        self.inner.model_version()
    }

    fn name(&self) -> &str {
        "FlakyClassifier"
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;
    use crate::FixedClassifier;
    use event_core::Severity;

    #[tokio::test]
    async fn test_recovers_after_failures() {
        let classifier = FlakyClassifier::new(FixedClassifier::new(Severity::Mild, 0.5), 2);
        let r = record("1", "x");

        assert!(classifier.classify(&r).await.unwrap_err().is_transient());
        assert!(classifier.classify(&r).await.is_err());
        assert!(classifier.classify(&r).await.is_ok());
        assert_eq!(classifier.calls(), 3);
        assert_eq!(classifier.model_version(), "mock-fixed");
    }
}
