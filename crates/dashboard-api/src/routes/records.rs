//! Record and verdict routes.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use database::{RecordDetail, ResultFilter, StoredResult};
use event_core::Source;
use serde::Deserialize;

use super::parse_severity;
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Query string accepted by `GET /api/records`.
#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    pub min_severity: Option<String>,
    pub max_severity: Option<String>,
    pub source: Option<String>,
    pub drug: Option<String>,
    pub model_version: Option<String>,
    pub ingested_after: Option<DateTime<Utc>>,
    pub ingested_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl RecordsQuery {
    /// Validate the query string into a store filter.
    pub fn into_filter(self) -> Result<ResultFilter> {
        let mut filter = ResultFilter::new();

        if let Some(ref s) = self.min_severity {
            filter = filter.min_severity(parse_severity(s)?);
        }
        if let Some(ref s) = self.max_severity {
            filter = filter.max_severity(parse_severity(s)?);
        }
        if let Some(ref tag) = self.source {
            let source = Source::from_tag(tag)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown source: {:?}", tag)))?;
            filter = filter.source(source);
        }
        if let Some(drug) = self.drug {
            filter = filter.drug(drug);
        }
        if let Some(version) = self.model_version {
            filter = filter.model_version(version);
        }
        filter.ingested_after = self.ingested_after;
        filter.ingested_before = self.ingested_before;
        if let Some(limit) = self.limit {
            filter = filter.limit(limit.min(1000));
        }

        Ok(filter)
    }
}

/// `GET /api/records`
pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<Vec<StoredResult>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.store.query(&filter).await?))
}

/// `GET /api/records/:id`
pub async fn get_record(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<RecordDetail>> {
    Ok(Json(state.store.get(&id).await?))
}
