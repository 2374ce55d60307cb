//! Mock classifiers for exercising the pipeline without a live oracle.
//!
//! - `FixedClassifier` - same severity for every record
//! - `ScriptedClassifier` - per-drug oracle replies, parsed like real ones
//! - `FlakyClassifier` - fails a number of calls before delegating
//! - `DelayedClassifier` - wraps another classifier with artificial delay
//!
//! For production classification, use the `openai-oracle` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_oracle::{Classifier, FixedClassifier, Severity};
//!
//! let classifier = FixedClassifier::new(Severity::Severe, 0.9);
//! assert_eq!(classifier.model_version(), "mock-fixed");
//! ```

mod delayed;
mod fixed;
mod flaky;
mod scripted;

pub use event_core::{async_trait, Classifier, ClassifyError, Severity};

pub use delayed::DelayedClassifier;
pub use fixed::FixedClassifier;
pub use flaky::FlakyClassifier;
pub use scripted::{Script, ScriptedClassifier};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use event_core::{AdverseEventRecord, Source};

    pub fn record(id: &str, drug: &str) -> AdverseEventRecord {
        AdverseEventRecord::new(
            format!("corpus:{}", id),
            Source::Corpus,
            drug,
            "reaction",
            None,
            "{}",
            Utc::now(),
        )
    }
}
