//! The SourceReader trait and the raw record it yields.

use async_trait::async_trait;

use crate::error::ReaderError;

/// A record exactly as it came from its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// The original JSON text, byte for byte.
    pub payload: String,
    /// Where the record came from (file and line, or URL and page), for logs.
    pub origin: String,
}

impl RawRecord {
    pub fn new(payload: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            origin: origin.into(),
        }
    }
}

/// Pulls raw records from one origin.
///
/// Readers do not interpret payloads; they only fetch them.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Source tag handed to the normalizer for records from this reader.
    fn source_tag(&self) -> &str;

    /// Fetch up to `limit` raw records.
    async fn read(&self, limit: usize) -> Result<Vec<RawRecord>, ReaderError>;
}
