//! Core types and traits for the adverse event pipeline.
//!
//! Every stage after ingestion speaks in terms of the types defined here:
//!
//! - [`AdverseEventRecord`] - the canonical, normalized record
//! - [`SeverityVerdict`] - a classification result for one record
//! - [`AlertEvent`] - a notification attempt for one `(record, sink)` pair
//! - [`Classifier`] - the trait every classification oracle implements
//!
//! # Example
//!
//! ```rust
//! use event_core::{
//!     async_trait, AdverseEventRecord, ClassifyError, Classifier, Confidence, Severity,
//!     SeverityVerdict,
//! };
//!
//! struct AlwaysMild;
//!
//! #[async_trait]
//! impl Classifier for AlwaysMild {
//!     async fn classify(&self, record: &AdverseEventRecord) -> Result<SeverityVerdict, ClassifyError> {
//!         Ok(SeverityVerdict::new(
//!             record.record_id(),
//!             Severity::Mild,
//!             Confidence::new(0.5).unwrap(),
//!             "rule of thumb",
//!             self.model_version(),
//!         ))
//!     }
//!
//!     fn model_version(&self) -> &str {
//!         "always-mild-1"
//!     }
//!
//!     fn name(&self) -> &str {
//!         "AlwaysMild"
//!     }
//! }
//! ```

mod alert;
mod error;
mod record;
mod request;
mod severity;
mod trait_def;
mod verdict;

pub use alert::{AlertEvent, DeliveryStatus, SinkKind};
pub use error::{ClassifyError, InvalidRecord, ParseError, UnknownVariant};
pub use record::{derive_original_id, parse_timestamp, record_id_for, AdverseEventRecord, Source};
pub use request::ClassificationRequest;
pub use severity::{Confidence, Severity};
pub use trait_def::Classifier;
pub use verdict::{extract_json_object, parse_oracle_reply, OracleReply, SeverityVerdict, URGENCY_LEVELS};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
