//! Result downloads.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use database::StoredResult;

use super::records::RecordsQuery;
use crate::error::{ApiError, Result};
use crate::state::AppState;

const CSV_HEADER: [&str; 12] = [
    "record_id",
    "source",
    "drug_name",
    "severity_score",
    "severity",
    "confidence",
    "category",
    "urgency",
    "recommended_action",
    "model_version",
    "classified_at",
    "ingested_at",
];

/// `GET /api/export/:format`
///
/// `format` is `csv` or `json`; the records query string applies.
pub async fn export(
    State(state): State<AppState>,
    Path(format): Path<String>,
    Query(query): Query<RecordsQuery>,
) -> Result<Response> {
    let (content_type, extension) = match format.as_str() {
        "csv" => ("text/csv; charset=utf-8", "csv"),
        "json" => ("application/json", "json"),
        other => return Err(ApiError::BadRequest(format!("unknown export format: {:?}", other))),
    };

    let filter = query.into_filter()?;
    let results = state.store.query(&filter).await?;

    let body = match extension {
        "csv" => to_csv(&results),
        _ => serde_json::to_string_pretty(&results)?,
    };

    let disposition = format!(
        "attachment; filename=\"adverse_events_{}.{}\"",
        Utc::now().format("%Y%m%d_%H%M"),
        extension
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// One row per result, RFC 4180 quoting.
pub fn to_csv(results: &[StoredResult]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push_str("\r\n");

    for StoredResult { record, verdict } in results {
        let row = [
            record.record_id().to_string(),
            record.source().to_string(),
            record.drug_name().to_string(),
            verdict.severity.score().to_string(),
            verdict.severity.to_string(),
            verdict.confidence.to_string(),
            verdict.category.clone().unwrap_or_default(),
            verdict.urgency.clone().unwrap_or_default(),
            verdict.recommended_action.clone().unwrap_or_default(),
            verdict.model_version.clone(),
            verdict.classified_at.to_rfc3339(),
            record.ingested_at().to_rfc3339(),
        ];
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }

    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
