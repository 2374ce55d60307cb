//! Error types for readers and the normalizer.

use thiserror::Error;

/// A raw record could not be turned into a canonical record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The payload is not a JSON object.
    #[error("payload is not a JSON object: {0}")]
    NotAnObject(String),

    /// A key required by the declared source is absent or null.
    #[error("{source_tag} record is missing key {key:?}")]
    MissingKey { source_tag: &'static str, key: &'static str },

    /// A key holds a value of the wrong JSON type.
    #[error("key {key:?} should be {expected}")]
    WrongType { key: &'static str, expected: &'static str },

    /// A required text field is empty after trimming.
    #[error("{0} is empty")]
    Empty(&'static str),

    /// A date field could not be parsed.
    #[error("key {key:?} has an unrecognized date: {value:?}")]
    InvalidDate { key: &'static str, value: String },
}

/// Errors returned by [`normalize`](crate::normalize).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The record is malformed; skip it and continue.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The source tag is not one the normalizer knows.
    #[error("unsupported source: {0:?}")]
    UnsupportedSource(String),
}

/// Errors returned by a [`SourceReader`](crate::SourceReader).
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Reading a local file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The remote API answered with a body we cannot decode.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The reader is configured for a source the pipeline does not support.
    #[error("unsupported source: {0:?}")]
    UnsupportedSource(String),
}
