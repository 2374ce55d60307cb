//! Literature / abstract feed reader.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::{debug, info};

use crate::error::ReaderError;
use crate::reader::{RawRecord, SourceReader};

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    records: Vec<Box<RawValue>>,
    #[serde(default)]
    has_more: bool,
}

/// Pages through a literature feed.
///
/// The feed answers `GET <url>?query=..&page=N&page_size=M` with
/// `{"records": [...], "has_more": bool}`; pages start at 1.
#[derive(Debug, Clone)]
pub struct LiteratureFeedReader {
    http: Client,
    url: String,
    query: String,
    page_size: usize,
}

impl LiteratureFeedReader {
    pub fn new(url: impl Into<String>, query: impl Into<String>) -> Result<Self, ReaderError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            url: url.into(),
            query: query.into(),
            page_size: 20,
        })
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }
}

#[async_trait]
impl SourceReader for LiteratureFeedReader {
    fn source_tag(&self) -> &str {
        "literature"
    }

    async fn read(&self, limit: usize) -> Result<Vec<RawRecord>, ReaderError> {
        let mut records = Vec::new();
        let mut page_no = 1usize;

        while records.len() < limit {
            debug!(url = %self.url, page = page_no, "Fetching literature page");

            let response = self
                .http
                .get(&self.url)
                .query(&[
                    ("query", self.query.clone()),
                    ("page", page_no.to_string()),
                    ("page_size", self.page_size.to_string()),
                ])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ReaderError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let body = response.text().await?;
            let page: FeedPage = serde_json::from_str(&body)?;
            let empty = page.records.is_empty();

            for (offset, raw) in page.records.into_iter().enumerate() {
                records.push(RawRecord::new(
                    raw.get(),
                    format!("{}?page={}#{}", self.url, page_no, offset),
                ));
            }

            if !page.has_more || empty {
                break;
            }
            page_no += 1;
        }

        records.truncate(limit);
        info!(count = records.len(), "Loaded literature records");
        Ok(records)
    }
}
