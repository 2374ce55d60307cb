//! Mapping of source-specific raw records to canonical records.

use chrono::{DateTime, Utc};
use event_core::{
    derive_original_id, parse_timestamp, record_id_for, AdverseEventRecord, Source,
};
use serde_json::{Map, Value};

use crate::error::{NormalizeError, ValidationError};
use crate::reader::RawRecord;

/// Normalize a raw record declared as coming from `source_tag`.
///
/// Pure apart from stamping `ingested_at` with the current time; see
/// [`normalize_at`].
pub fn normalize(raw: &RawRecord, source_tag: &str) -> Result<AdverseEventRecord, NormalizeError> {
    normalize_at(raw, source_tag, Utc::now())
}

/// Normalize with an explicit ingestion time.
pub fn normalize_at(
    raw: &RawRecord,
    source_tag: &str,
    ingested_at: DateTime<Utc>,
) -> Result<AdverseEventRecord, NormalizeError> {
    let source = Source::from_tag(source_tag)
        .ok_or_else(|| NormalizeError::UnsupportedSource(source_tag.to_string()))?;

    let value: Value = serde_json::from_str(&raw.payload)
        .map_err(|e| ValidationError::NotAnObject(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationError::NotAnObject("top-level value is not an object".into()))?;

    let fields = match source {
        Source::Corpus => corpus_fields(obj, &raw.payload)?,
        Source::Regulatory => regulatory_fields(obj)?,
        Source::Literature => literature_fields(obj)?,
    };

    Ok(AdverseEventRecord::new(
        record_id_for(source, &fields.original_id),
        source,
        fields.drug_name,
        fields.reaction_text,
        fields.reported_at,
        raw.payload.clone(),
        ingested_at,
    ))
}

struct Fields {
    original_id: String,
    drug_name: String,
    reaction_text: String,
    reported_at: Option<DateTime<Utc>>,
}

/// `{ "doc_id"?, "drug", "reaction", "posted_at"? }`
fn corpus_fields(obj: &Map<String, Value>, payload: &str) -> Result<Fields, ValidationError> {
    const TAG: &str = "corpus";

    let original_id = match optional_id(obj, "doc_id")? {
        Some(id) => id,
        None => derive_original_id(payload),
    };

    Ok(Fields {
        original_id,
        drug_name: required_text(obj, TAG, "drug", "drug_name")?,
        reaction_text: required_text(obj, TAG, "reaction", "reaction_text")?,
        reported_at: optional_date(obj, "posted_at")?,
    })
}

/// openFDA drug event:
/// `{ "safetyreportid", "receivedate"?, "patient": { "drug": [..], "reaction": [..] } }`
fn regulatory_fields(obj: &Map<String, Value>) -> Result<Fields, ValidationError> {
    const TAG: &str = "regulatory";

    let original_id = optional_id(obj, "safetyreportid")?.ok_or(ValidationError::MissingKey {
        source_tag: TAG,
        key: "safetyreportid",
    })?;

    let patient = match obj.get("patient") {
        None | Some(Value::Null) => {
            return Err(ValidationError::MissingKey {
                source_tag: TAG,
                key: "patient",
            })
        }
        Some(Value::Object(p)) => p,
        Some(_) => {
            return Err(ValidationError::WrongType {
                key: "patient",
                expected: "an object",
            })
        }
    };

    let drugs = required_array(patient, TAG, "drug")?;
    let drug_name = drugs
        .iter()
        .filter_map(|d| d.get("medicinalproduct").and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .ok_or(ValidationError::Empty("drug_name"))?
        .to_string();

    let reactions = required_array(patient, TAG, "reaction")?;
    let reaction_text = reactions
        .iter()
        .filter_map(|r| r.get("reactionmeddrapt").and_then(Value::as_str))
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    if reaction_text.is_empty() {
        return Err(ValidationError::Empty("reaction_text"));
    }

    Ok(Fields {
        original_id,
        drug_name,
        reaction_text,
        reported_at: optional_date(obj, "receivedate")?,
    })
}

/// `{ "pmid", "drug", "abstract", "title"?, "published"? }`
fn literature_fields(obj: &Map<String, Value>) -> Result<Fields, ValidationError> {
    const TAG: &str = "literature";

    let original_id = optional_id(obj, "pmid")?.ok_or(ValidationError::MissingKey {
        source_tag: TAG,
        key: "pmid",
    })?;

    Ok(Fields {
        original_id,
        drug_name: required_text(obj, TAG, "drug", "drug_name")?,
        reaction_text: required_text(obj, TAG, "abstract", "reaction_text")?,
        reported_at: optional_date(obj, "published")?,
    })
}

fn required_text(
    obj: &Map<String, Value>,
    source_tag: &'static str,
    key: &'static str,
    field: &'static str,
) -> Result<String, ValidationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(ValidationError::MissingKey { source_tag, key }),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Err(ValidationError::Empty(field))
            } else {
                Ok(trimmed.to_string())
            }
        }
        Some(_) => Err(ValidationError::WrongType {
            key,
            expected: "a string",
        }),
    }
}

fn required_array<'a>(
    obj: &'a Map<String, Value>,
    source_tag: &'static str,
    key: &'static str,
) -> Result<&'a Vec<Value>, ValidationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(ValidationError::MissingKey { source_tag, key }),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ValidationError::WrongType {
            key,
            expected: "an array",
        }),
    }
}

/// Identifiers show up as strings or bare integers depending on the export.
fn optional_id(obj: &Map<String, Value>, key: &'static str) -> Result<Option<String>, ValidationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.trim().to_string())),
        Some(Value::String(_)) => Ok(None),
        Some(Value::Number(n)) if n.is_u64() || n.is_i64() => Ok(Some(n.to_string())),
        Some(_) => Err(ValidationError::WrongType {
            key,
            expected: "a string or integer id",
        }),
    }
}

fn optional_date(obj: &Map<String, Value>, key: &'static str) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidDate {
                key,
                value: s.clone(),
            }),
        Some(_) => Err(ValidationError::WrongType {
            key,
            expected: "a date string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn raw(payload: &str) -> RawRecord {
        RawRecord::new(payload, "test")
    }

    #[test]
    fn test_corpus_record() {
        let payload = r#"{"doc_id":"ARTHROTEC.12","drug":"  Aspirin ","reaction":" severe gastric bleeding ","posted_at":"2015-06-01"}"#;
        let record = normalize(&raw(payload), "cadec").unwrap();

        assert_eq!(record.record_id(), "corpus:ARTHROTEC.12");
        assert_eq!(record.source(), Source::Corpus);
        assert_eq!(record.drug_name(), "Aspirin");
        assert_eq!(record.reaction_text(), "severe gastric bleeding");
        assert_eq!(record.reported_at().unwrap().year(), 2015);
        assert_eq!(record.raw_payload(), payload);
    }

    #[test]
    fn test_corpus_record_without_id_gets_content_id() {
        let payload = r#"{"drug":"Aspirin","reaction":"nausea"}"#;
        let a = normalize(&raw(payload), "corpus").unwrap();
        let b = normalize(&raw(payload), "corpus").unwrap();

        assert_eq!(a.record_id(), b.record_id());
        assert_eq!(a.record_id(), format!("corpus:{}", derive_original_id(payload)));
    }

    #[test]
    fn test_regulatory_record() {
        let payload = r#"{
            "safetyreportid": "10003301",
            "receivedate": "20140312",
            "patient": {
                "drug": [{"medicinalproduct": ""}, {"medicinalproduct": "DURAGESIC-100"}],
                "reaction": [{"reactionmeddrapt": "Drug ineffective"}, {"reactionmeddrapt": "Pain"}]
            }
        }"#;
        let record = normalize(&raw(payload), "openfda").unwrap();

        assert_eq!(record.record_id(), "regulatory:10003301");
        assert_eq!(record.drug_name(), "DURAGESIC-100");
        assert_eq!(record.reaction_text(), "Drug ineffective; Pain");
        assert_eq!(record.reported_at().unwrap().month(), 3);
    }

    #[test]
    fn test_regulatory_missing_patient() {
        let payload = r#"{"safetyreportid":"1"}"#;
        assert_eq!(
            normalize(&raw(payload), "regulatory"),
            Err(NormalizeError::Validation(ValidationError::MissingKey {
                source_tag: "regulatory",
                key: "patient"
            }))
        );
    }

    #[test]
    fn test_regulatory_without_reactions() {
        let payload = r#"{"safetyreportid":"1","patient":{"drug":[{"medicinalproduct":"X"}],"reaction":[]}}"#;
        assert_eq!(
            normalize(&raw(payload), "regulatory"),
            Err(NormalizeError::Validation(ValidationError::Empty("reaction_text")))
        );
    }

    #[test]
    fn test_literature_record() {
        let payload = r#"{"pmid":34567890,"drug":"Metformin","title":"Lactic acidosis","abstract":"Case of lactic acidosis.","published":"2021-02-03T00:00:00Z"}"#;
        let record = normalize(&raw(payload), "pubmed").unwrap();

        assert_eq!(record.record_id(), "literature:34567890");
        assert_eq!(record.reaction_text(), "Case of lactic acidosis.");
    }

    #[test]
    fn test_empty_required_text() {
        let payload = r#"{"doc_id":"x","drug":"   ","reaction":"rash"}"#;
        assert_eq!(
            normalize(&raw(payload), "corpus"),
            Err(NormalizeError::Validation(ValidationError::Empty("drug_name")))
        );
    }

    #[test]
    fn test_missing_key_for_declared_source() {
        // A literature-shaped record declared as corpus lacks "reaction".
        let payload = r#"{"pmid":"1","drug":"X","abstract":"y"}"#;
        assert_eq!(
            normalize(&raw(payload), "corpus"),
            Err(NormalizeError::Validation(ValidationError::MissingKey {
                source_tag: "corpus",
                key: "reaction"
            }))
        );
    }

    #[test]
    fn test_wrong_types() {
        let payload = r#"{"doc_id":"x","drug":42,"reaction":"rash"}"#;
        assert!(matches!(
            normalize(&raw(payload), "corpus"),
            Err(NormalizeError::Validation(ValidationError::WrongType { key: "drug", .. }))
        ));
    }

    #[test]
    fn test_invalid_date() {
        let payload = r#"{"doc_id":"x","drug":"d","reaction":"r","posted_at":"last week"}"#;
        assert!(matches!(
            normalize(&raw(payload), "corpus"),
            Err(NormalizeError::Validation(ValidationError::InvalidDate { .. }))
        ));
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            normalize(&raw("drug=aspirin"), "corpus"),
            Err(NormalizeError::Validation(ValidationError::NotAnObject(_)))
        ));
        assert!(matches!(
            normalize(&raw("[1,2]"), "corpus"),
            Err(NormalizeError::Validation(ValidationError::NotAnObject(_)))
        ));
    }

    #[test]
    fn test_unsupported_source() {
        let payload = r#"{"doc_id":"x","drug":"d","reaction":"r"}"#;
        assert_eq!(
            normalize(&raw(payload), "twitter"),
            Err(NormalizeError::UnsupportedSource("twitter".to_string()))
        );
    }
}
