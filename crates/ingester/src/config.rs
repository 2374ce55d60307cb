//! Reader configuration.

use std::env;
use std::path::PathBuf;

use crate::corpus::CorpusFileReader;
use crate::error::ReaderError;
use crate::literature::LiteratureFeedReader;
use crate::openfda::OpenFdaReader;
use crate::reader::SourceReader;

/// Public openFDA API.
pub const DEFAULT_OPENFDA_URL: &str = "https://api.fda.gov";

/// Default openFDA search: serious reports only.
pub const DEFAULT_OPENFDA_SEARCH: &str = "serious:1";

/// Default literature feed query.
pub const DEFAULT_LITERATURE_QUERY: &str = "adverse drug reaction";

/// Which sources to read from. A source without its location is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderConfig {
    /// JSON-lines corpus export.
    pub corpus_path: Option<PathBuf>,

    /// openFDA base URL.
    pub openfda_url: Option<String>,

    /// openFDA `search` expression.
    pub openfda_search: Option<String>,

    /// openFDA API key (raises rate limits).
    pub openfda_api_key: Option<String>,

    /// Literature feed endpoint.
    pub literature_url: Option<String>,

    /// Literature feed query.
    pub literature_query: String,
}

impl ReaderConfig {
    /// Create configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `CORPUS_PATH` - JSON-lines corpus file
    /// - `OPENFDA_URL` - openFDA base URL (default: https://api.fda.gov
    ///   when `OPENFDA_API_KEY` is set, otherwise openFDA is disabled)
    /// - `OPENFDA_SEARCH` - openFDA search expression (default: serious:1)
    /// - `OPENFDA_API_KEY` - openFDA API key
    /// - `LITERATURE_URL` - literature feed endpoint
    /// - `LITERATURE_QUERY` - literature query (default: adverse drug reaction)
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        let openfda_api_key = non_empty("OPENFDA_API_KEY");
        let openfda_url = non_empty("OPENFDA_URL")
            .or_else(|| openfda_api_key.as_ref().map(|_| DEFAULT_OPENFDA_URL.to_string()));

        Self {
            corpus_path: non_empty("CORPUS_PATH").map(PathBuf::from),
            openfda_url,
            openfda_search: Some(
                non_empty("OPENFDA_SEARCH").unwrap_or_else(|| DEFAULT_OPENFDA_SEARCH.to_string()),
            ),
            openfda_api_key,
            literature_url: non_empty("LITERATURE_URL"),
            literature_query: non_empty("LITERATURE_QUERY")
                .unwrap_or_else(|| DEFAULT_LITERATURE_QUERY.to_string()),
        }
    }

    pub fn with_corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = Some(path.into());
        self
    }

    pub fn with_openfda_url(mut self, url: impl Into<String>) -> Self {
        self.openfda_url = Some(url.into());
        self
    }

    pub fn with_literature_url(mut self, url: impl Into<String>) -> Self {
        self.literature_url = Some(url.into());
        self
    }

    /// True when no source is configured.
    pub fn is_empty(&self) -> bool {
        self.corpus_path.is_none() && self.openfda_url.is_none() && self.literature_url.is_none()
    }

    /// Build one reader per configured source.
    pub fn build_readers(&self) -> Result<Vec<Box<dyn SourceReader>>, ReaderError> {
        let mut readers: Vec<Box<dyn SourceReader>> = Vec::new();

        if let Some(ref path) = self.corpus_path {
            readers.push(Box::new(CorpusFileReader::new(path)));
        }

        if let Some(ref url) = self.openfda_url {
            let mut reader = OpenFdaReader::new(url.clone())?;
            if let Some(ref search) = self.openfda_search {
                reader = reader.with_search(search.clone());
            }
            if let Some(ref key) = self.openfda_api_key {
                reader = reader.with_api_key(key.clone());
            }
            readers.push(Box::new(reader));
        }

        if let Some(ref url) = self.literature_url {
            readers.push(Box::new(LiteratureFeedReader::new(
                url.clone(),
                self.literature_query.clone(),
            )?));
        }

        Ok(readers)
    }
}
