//! Error types shared across the pipeline.

use std::time::Duration;

use thiserror::Error;

/// A string did not name a known variant of one of the core enums.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    /// Which enum was being parsed (e.g. "severity").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// A serialized record that breaks the record invariants.
// `Display`/`Error` are implemented by hand: thiserror would treat the
// `source` field as the underlying error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidRecord {
    /// `record_id` is not `<source>:<original id>`.
    RecordId { record_id: String, source: String },

    /// A required text field is blank.
    Empty(&'static str),
}

impl std::fmt::Display for InvalidRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidRecord::RecordId { record_id, source } => {
                write!(f, "record id {record_id:?} does not belong to source {source}")
            }
            InvalidRecord::Empty(field) => write!(f, "{field} is empty"),
        }
    }
}

impl std::error::Error for InvalidRecord {}

/// The oracle replied, but the reply is unusable.
///
/// A parse error is final for the record it concerns: no severity is ever
/// guessed from a malformed reply.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The reply contained no JSON object.
    #[error("no JSON object found in oracle reply")]
    NoJson,

    /// The JSON could not be decoded.
    #[error("invalid JSON in oracle reply: {0}")]
    InvalidJson(String),

    /// A required field was absent or null.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// The severity was not one of the fixed labels or scores.
    #[error("invalid severity: {0}")]
    InvalidSeverity(String),

    /// The confidence was not a number in [0, 1].
    #[error("invalid confidence: {0}")]
    InvalidConfidence(String),

    /// A field had the wrong JSON type.
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Errors returned by a [`Classifier`](crate::Classifier).
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    /// Transport failure or non-success status from the oracle.
    #[error("oracle error: {0}")]
    Oracle(String),

    /// The oracle did not answer in time.
    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),

    /// The oracle answered with something that is not a valid verdict.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The classification was cancelled before it finished.
    #[error("classification cancelled")]
    Cancelled,
}

impl ClassifyError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClassifyError::Oracle(_) | ClassifyError::Timeout(_))
    }

    /// Short machine-readable kind, used by the failure queue.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifyError::Oracle(_) => "oracle",
            ClassifyError::Timeout(_) => "timeout",
            ClassifyError::Parse(_) => "parse",
            ClassifyError::Cancelled => "cancelled",
        }
    }
}
