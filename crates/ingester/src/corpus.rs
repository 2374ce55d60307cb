//! JSON-lines corpus file reader.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::ReaderError;
use crate::reader::{RawRecord, SourceReader};

/// Reads a corpus export where every non-blank line is one JSON record.
#[derive(Debug, Clone)]
pub struct CorpusFileReader {
    path: PathBuf,
    tag: String,
}

impl CorpusFileReader {
    /// Create a reader for `path`, tagged as `corpus`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            tag: "corpus".to_string(),
        }
    }

    /// Override the source tag (e.g. `cadec`).
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SourceReader for CorpusFileReader {
    fn source_tag(&self) -> &str {
        &self.tag
    }

    async fn read(&self, limit: usize) -> Result<Vec<RawRecord>, ReaderError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let shown = self.path.display();

        let records: Vec<RawRecord> = content
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty())
            .take(limit)
            .map(|(idx, line)| RawRecord::new(line, format!("{}:{}", shown, idx + 1)))
            .collect();

        info!(path = %shown, count = records.len(), "Loaded corpus records");

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_lines_verbatim_and_skips_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"doc_id":"a1","drug":"Aspirin","reaction":"bleeding"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"doc_id":"a2", "drug":"Lipitor","reaction":"muscle pain"}}"#).unwrap();

        let reader = CorpusFileReader::new(file.path());
        let records = reader.read(10).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1].payload,
            r#"{"doc_id":"a2", "drug":"Lipitor","reaction":"muscle pain"}"#
        );
        assert!(records[1].origin.ends_with(":3"));
    }

    #[tokio::test]
    async fn test_respects_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..5 {
            writeln!(file, r#"{{"doc_id":"{}","drug":"d","reaction":"r"}}"#, i).unwrap();
        }

        let reader = CorpusFileReader::new(file.path()).with_tag("cadec");
        assert_eq!(reader.source_tag(), "cadec");
        assert_eq!(reader.read(3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let reader = CorpusFileReader::new("/definitely/not/here.jsonl");
        assert!(matches!(reader.read(1).await, Err(ReaderError::Io(_))));
    }
}
