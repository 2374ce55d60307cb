//! Delayed classifier - wraps another classifier with artificial delay.

use std::time::Duration;

use event_core::{async_trait, AdverseEventRecord, Classifier, ClassifyError, SeverityVerdict};
use tokio::time::sleep;

/// A classifier that wraps another classifier and adds artificial delay.
///
/// Useful for testing timeouts, cancellation and overlapping runs.
pub struct DelayedClassifier<C: Classifier> {
    inner: C,
    delay: Duration,
}

impl<C: Classifier> DelayedClassifier<C> {
    pub fn new(inner: C, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create a classifier with a delay in milliseconds.
    pub fn with_millis(inner: C, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }
}

#[async_trait]
impl<C: Classifier> Classifier for DelayedClassifier<C> {
    async fn classify(&self, record: &AdverseEventRecord) -> Result<SeverityVerdict, ClassifyError> {
        sleep(self.delay).await;
        self.inner.classify(record).await
    }

    fn model_version(&self) -> &str {
        self.inner.model_version()
    }

    fn name(&self) -> &str {
        "DelayedClassifier"
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}
