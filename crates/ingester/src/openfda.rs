//! openFDA drug adverse event reader.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::{debug, info};

use crate::error::ReaderError;
use crate::reader::{RawRecord, SourceReader};

/// openFDA caps `limit` per request.
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct OpenFdaPage {
    #[serde(default)]
    results: Vec<Box<RawValue>>,
}

/// Pages through `drug/event.json` on the openFDA API.
///
/// Each element of `results` is kept as its original JSON text.
#[derive(Debug, Clone)]
pub struct OpenFdaReader {
    http: Client,
    base_url: String,
    search: Option<String>,
    api_key: Option<String>,
    page_size: usize,
}

impl OpenFdaReader {
    /// Create a reader against `base_url` (e.g. `https://api.fda.gov`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ReaderError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            search: None,
            api_key: None,
            page_size: MAX_PAGE_SIZE,
        })
    }

    /// openFDA `search` expression (e.g. `serious:1`).
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Records per request, clamped to `1..=100`.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/drug/event.json", self.base_url)
    }

    /// Fetch one page. `None` means openFDA has no more matches.
    async fn fetch_page(&self, skip: usize, limit: usize) -> Result<Option<Vec<Box<RawValue>>>, ReaderError> {
        let mut query: Vec<(&str, String)> = vec![
            ("limit", limit.to_string()),
            ("skip", skip.to_string()),
        ];
        if let Some(ref search) = self.search {
            query.push(("search", search.clone()));
        }
        if let Some(ref key) = self.api_key {
            query.push(("api_key", key.clone()));
        }

        debug!(url = %self.endpoint(), skip, limit, "Fetching openFDA page");

        let response = self.http.get(self.endpoint()).query(&query).send().await?;
        let status = response.status();

        // openFDA answers 404 once the search has no (more) matches.
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReaderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let page: OpenFdaPage = serde_json::from_str(&body)?;
        Ok(Some(page.results))
    }
}

#[async_trait]
impl SourceReader for OpenFdaReader {
    fn source_tag(&self) -> &str {
        "regulatory"
    }

    async fn read(&self, limit: usize) -> Result<Vec<RawRecord>, ReaderError> {
        let mut records = Vec::new();

        while records.len() < limit {
            let skip = records.len();
            let want = (limit - skip).min(self.page_size);

            let Some(page) = self.fetch_page(skip, want).await? else {
                break;
            };
            let fetched = page.len();

            for (offset, raw) in page.into_iter().enumerate() {
                records.push(RawRecord::new(
                    raw.get(),
                    format!("{}?skip={}#{}", self.endpoint(), skip, offset),
                ));
            }

            if fetched < want {
                break;
            }
        }

        records.truncate(limit);
        info!(count = records.len(), "Loaded openFDA records");
        Ok(records)
    }
}
