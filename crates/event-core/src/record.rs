//! The canonical adverse event record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{InvalidRecord, UnknownVariant};

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Structured adverse event corpus (patient forum reports, CADEC).
    Corpus,
    /// Regulatory database export (openFDA / MedWatch).
    Regulatory,
    /// Literature and abstract feed (PubMed).
    Literature,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Corpus, Source::Regulatory, Source::Literature];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Corpus => "corpus",
            Self::Regulatory => "regulatory",
            Self::Literature => "literature",
        }
    }

    /// Resolve a source tag, including the historical aliases
    /// (`cadec`, `fda`, `openfda`, `pubmed`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "corpus" | "cadec" => Some(Self::Corpus),
            "regulatory" | "fda" | "openfda" => Some(Self::Regulatory),
            "literature" | "pubmed" => Some(Self::Literature),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::from_tag(s).ok_or_else(|| UnknownVariant::new("source", s))
    }
}

/// A normalized adverse event record.
///
/// `record_id`, `source` and `raw_payload` are fixed at construction; the
/// type exposes no way to change them. Deserializing checks that the id
/// belongs to the source and that drug and reaction are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecordFields")]
pub struct AdverseEventRecord {
    record_id: String,
    source: Source,
    drug_name: String,
    reaction_text: String,
    reported_at: Option<DateTime<Utc>>,
    raw_payload: String,
    ingested_at: DateTime<Utc>,
}

impl AdverseEventRecord {
    /// Assemble a record from already-validated parts.
    ///
    /// The normalizer is the usual entry point; this constructor is also used
    /// when rehydrating rows from the store.
    pub fn new(
        record_id: impl Into<String>,
        source: Source,
        drug_name: impl Into<String>,
        reaction_text: impl Into<String>,
        reported_at: Option<DateTime<Utc>>,
        raw_payload: impl Into<String>,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            source,
            drug_name: drug_name.into(),
            reaction_text: reaction_text.into(),
            reported_at,
            raw_payload: raw_payload.into(),
            ingested_at,
        }
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn drug_name(&self) -> &str {
        &self.drug_name
    }

    pub fn reaction_text(&self) -> &str {
        &self.reaction_text
    }

    pub fn reported_at(&self) -> Option<DateTime<Utc>> {
        self.reported_at
    }

    pub fn raw_payload(&self) -> &str {
        &self.raw_payload
    }

    pub fn ingested_at(&self) -> DateTime<Utc> {
        self.ingested_at
    }

    /// Lowercased drug name for matching and lookups.
    pub fn drug_key(&self) -> String {
        self.drug_name.to_lowercase()
    }
}

/// Serialized form of [`AdverseEventRecord`], validated on the way in.
#[derive(Deserialize)]
struct RecordFields {
    record_id: String,
    source: Source,
    drug_name: String,
    reaction_text: String,
    reported_at: Option<DateTime<Utc>>,
    raw_payload: String,
    ingested_at: DateTime<Utc>,
}

impl TryFrom<RecordFields> for AdverseEventRecord {
    type Error = InvalidRecord;

    fn try_from(fields: RecordFields) -> Result<Self, Self::Error> {
        let original_id = fields
            .record_id
            .strip_prefix(fields.source.as_str())
            .and_then(|rest| rest.strip_prefix(':'));
        if original_id.map_or(true, |id| id.trim().is_empty()) {
            return Err(InvalidRecord::RecordId {
                record_id: fields.record_id,
                source: fields.source.to_string(),
            });
        }
        if fields.drug_name.trim().is_empty() {
            return Err(InvalidRecord::Empty("drug_name"));
        }
        if fields.reaction_text.trim().is_empty() {
            return Err(InvalidRecord::Empty("reaction_text"));
        }

        Ok(Self::new(
            fields.record_id,
            fields.source,
            fields.drug_name,
            fields.reaction_text,
            fields.reported_at,
            fields.raw_payload,
            fields.ingested_at,
        ))
    }
}

/// Build the stable record id for a source and its original identifier.
pub fn record_id_for(source: Source, original_id: &str) -> String {
    format!("{}:{}", source.as_str(), original_id.trim())
}

/// Content-derived identifier for raw records that carry no id of their own.
pub fn derive_original_id(raw_payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_payload.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest.chars().take(16).collect()
}

/// Parse the timestamp formats found in the supported sources.
///
/// Accepts RFC 3339, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and the compact
/// `YYYYMMDD` used by openFDA. Dates without a time are midnight UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_compact_date(value))?;

    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

fn parse_compact_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = value[0..4].parse().ok()?;
    let month = value[4..6].parse().ok()?;
    let day = value[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
