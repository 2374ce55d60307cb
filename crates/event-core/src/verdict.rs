//! Severity verdicts and strict parsing of oracle replies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::severity::{Confidence, Severity};

/// Urgency labels the oracle is asked to use, least pressing first.
pub const URGENCY_LEVELS: [&str; 3] = ["routine", "urgent", "immediate"];

/// Classification result for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityVerdict {
    /// The record this verdict belongs to.
    pub record_id: String,
    pub severity: Severity,
    pub confidence: Confidence,
    /// Oracle explanation, stored verbatim.
    pub rationale: String,
    /// Which oracle and version produced the verdict.
    pub model_version: String,
    /// Event category as labelled by the oracle (e.g. "gastrointestinal").
    pub category: Option<String>,
    /// Urgency label, one of [`URGENCY_LEVELS`] when the oracle behaves.
    pub urgency: Option<String>,
    /// Suggested follow-up action.
    pub recommended_action: Option<String>,
    /// When the verdict was produced; drives last-write-wins in the store.
    pub classified_at: DateTime<Utc>,
}

impl SeverityVerdict {
    /// Create a verdict stamped with the current time.
    pub fn new(
        record_id: impl Into<String>,
        severity: Severity,
        confidence: Confidence,
        rationale: impl Into<String>,
        model_version: impl Into<String>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            severity,
            confidence,
            rationale: rationale.into(),
            model_version: model_version.into(),
            category: None,
            urgency: None,
            recommended_action: None,
            classified_at: Utc::now(),
        }
    }

    /// Override the classification timestamp.
    pub fn with_classified_at(mut self, at: DateTime<Utc>) -> Self {
        self.classified_at = at;
        self
    }

    /// Whether the oracle marked this case `urgent` or `immediate`.
    pub fn is_urgent(&self) -> bool {
        self.urgency.as_deref().map(str::trim).is_some_and(|u| {
            URGENCY_LEVELS[1..]
                .iter()
                .any(|level| u.eq_ignore_ascii_case(level))
        })
    }
}

/// The validated content of an oracle reply, before it is bound to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleReply {
    pub severity: Severity,
    pub confidence: Confidence,
    pub rationale: String,
    pub category: Option<String>,
    pub urgency: Option<String>,
    pub recommended_action: Option<String>,
}

impl OracleReply {
    /// Validate a decoded JSON object.
    ///
    /// Expected shape:
    ///
    /// ```json
    /// {"severity": "severe", "confidence": 0.91, "rationale": "...",
    ///  "category": "gastrointestinal", "urgency": "urgent",
    ///  "recommended_action": "..."}
    /// ```
    ///
    /// `severity` may also be an integer score from 1 to 5.
    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        let obj = value.as_object().ok_or_else(|| ParseError::InvalidField {
            field: "reply",
            reason: "expected a JSON object".to_string(),
        })?;

        let severity = parse_severity(required(obj, "severity")?)?;
        let confidence = parse_confidence(required(obj, "confidence")?)?;

        let rationale = match required(obj, "rationale")? {
            Value::String(s) => s.clone(),
            other => {
                return Err(ParseError::InvalidField {
                    field: "rationale",
                    reason: format!("expected string, got {}", json_type(other)),
                })
            }
        };

        Ok(Self {
            severity,
            confidence,
            rationale,
            category: optional_string(obj, "category")?,
            urgency: optional_string(obj, "urgency")?,
            recommended_action: optional_string(obj, "recommended_action")?,
        })
    }

    /// Bind the reply to a record and model version.
    pub fn into_verdict(
        self,
        record_id: impl Into<String>,
        model_version: impl Into<String>,
    ) -> SeverityVerdict {
        SeverityVerdict {
            record_id: record_id.into(),
            severity: self.severity,
            confidence: self.confidence,
            rationale: self.rationale,
            model_version: model_version.into(),
            category: self.category,
            urgency: self.urgency,
            recommended_action: self.recommended_action,
            classified_at: Utc::now(),
        }
    }
}

/// Parse free-form oracle text into a validated reply.
///
/// Models occasionally wrap JSON in prose or code fences, so the outermost
/// `{ ... }` span is extracted before decoding.
pub fn parse_oracle_reply(text: &str) -> Result<OracleReply, ParseError> {
    let value = extract_json_object(text)?;
    OracleReply::from_value(&value)
}

/// Locate and decode the outermost JSON object in `text`.
pub fn extract_json_object(text: &str) -> Result<Value, ParseError> {
    let start = text.find('{').ok_or(ParseError::NoJson)?;
    let end = text.rfind('}').ok_or(ParseError::NoJson)?;
    if end < start {
        return Err(ParseError::NoJson);
    }

    serde_json::from_str(&text[start..=end]).map_err(|e| ParseError::InvalidJson(e.to_string()))
}

fn required<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ParseError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

fn optional_string(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(other) => Err(ParseError::InvalidField {
            field,
            reason: format!("expected string, got {}", json_type(other)),
        }),
    }
}

fn parse_severity(value: &Value) -> Result<Severity, ParseError> {
    match value {
        Value::String(label) => label
            .parse::<Severity>()
            .map_err(|_| ParseError::InvalidSeverity(label.clone())),
        Value::Number(n) => n
            .as_i64()
            .and_then(Severity::from_score)
            .ok_or_else(|| ParseError::InvalidSeverity(n.to_string())),
        other => Err(ParseError::InvalidSeverity(other.to_string())),
    }
}

fn parse_confidence(value: &Value) -> Result<Confidence, ParseError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(Confidence::new)
            .ok_or_else(|| ParseError::InvalidConfidence(n.to_string())),
        other => Err(ParseError::InvalidConfidence(other.to_string())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_reply() {
        let text = r#"{"severity":"severe","confidence":0.91,"rationale":"GI bleed requires care","category":"gastrointestinal","urgency":"urgent","recommended_action":"Review within 24h"}"#;
        let reply = parse_oracle_reply(text).unwrap();

        assert_eq!(reply.severity, Severity::Severe);
        assert_eq!(reply.confidence.value(), 0.91);
        assert_eq!(reply.rationale, "GI bleed requires care");
        assert_eq!(reply.category.as_deref(), Some("gastrointestinal"));
        assert_eq!(reply.urgency.as_deref(), Some("urgent"));
        assert_eq!(reply.recommended_action.as_deref(), Some("Review within 24h"));
    }

    #[test]
    fn test_parse_reply_wrapped_in_prose() {
        let text = "Here is my assessment:\n```json\n{\"severity\": \"mild\", \"confidence\": 0.4, \"rationale\": \"rash\"}\n```";
        let reply = parse_oracle_reply(text).unwrap();
        assert_eq!(reply.severity, Severity::Mild);
        assert!(reply.category.is_none());
    }

    #[test]
    fn test_parse_numeric_score() {
        let reply =
            parse_oracle_reply(r#"{"severity":5,"confidence":1,"rationale":"anaphylaxis"}"#).unwrap();
        assert_eq!(reply.severity, Severity::Critical);
    }

    #[test]
    fn test_confidence_boundaries() {
        let ok_zero = r#"{"severity":"mild","confidence":0,"rationale":""}"#;
        let ok_one = r#"{"severity":"mild","confidence":1.0,"rationale":""}"#;
        let too_high = r#"{"severity":"mild","confidence":1.01,"rationale":""}"#;
        let too_low = r#"{"severity":"mild","confidence":-0.01,"rationale":""}"#;

        assert_eq!(parse_oracle_reply(ok_zero).unwrap().confidence.value(), 0.0);
        assert_eq!(parse_oracle_reply(ok_one).unwrap().confidence.value(), 1.0);
        assert!(matches!(
            parse_oracle_reply(too_high),
            Err(ParseError::InvalidConfidence(_))
        ));
        assert!(matches!(
            parse_oracle_reply(too_low),
            Err(ParseError::InvalidConfidence(_))
        ));
    }

    #[test]
    fn test_confidence_as_string_is_rejected() {
        let text = r#"{"severity":"mild","confidence":"0.5","rationale":"x"}"#;
        assert!(matches!(
            parse_oracle_reply(text),
            Err(ParseError::InvalidConfidence(_))
        ));
    }

    #[test]
    fn test_unknown_severity_is_rejected() {
        let label = r#"{"severity":"catastrophic","confidence":0.5,"rationale":"x"}"#;
        let score = r#"{"severity":7,"confidence":0.5,"rationale":"x"}"#;
        let fractional = r#"{"severity":3.5,"confidence":0.5,"rationale":"x"}"#;

        assert!(matches!(parse_oracle_reply(label), Err(ParseError::InvalidSeverity(_))));
        assert!(matches!(parse_oracle_reply(score), Err(ParseError::InvalidSeverity(_))));
        assert!(matches!(
            parse_oracle_reply(fractional),
            Err(ParseError::InvalidSeverity(_))
        ));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            parse_oracle_reply(r#"{"confidence":0.5,"rationale":"x"}"#),
            Err(ParseError::MissingField("severity"))
        );
        assert_eq!(
            parse_oracle_reply(r#"{"severity":"mild","confidence":null,"rationale":"x"}"#),
            Err(ParseError::MissingField("confidence"))
        );
        assert_eq!(
            parse_oracle_reply(r#"{"severity":"mild","confidence":0.2}"#),
            Err(ParseError::MissingField("rationale"))
        );
    }

    #[test]
    fn test_no_json() {
        assert_eq!(parse_oracle_reply("I cannot help with that."), Err(ParseError::NoJson));
        assert!(matches!(
            parse_oracle_reply("{ not json }"),
            Err(ParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_wrong_optional_type() {
        let text = r#"{"severity":"mild","confidence":0.5,"rationale":"x","category":3}"#;
        assert!(matches!(
            parse_oracle_reply(text),
            Err(ParseError::InvalidField { field: "category", .. })
        ));
    }

    #[test]
    fn test_into_verdict() {
        let reply =
            parse_oracle_reply(r#"{"severity":"moderate","confidence":0.6,"rationale":"r"}"#).unwrap();
        let verdict = reply.into_verdict("corpus:1", "gpt-4o-2024-08-06");
        assert_eq!(verdict.record_id, "corpus:1");
        assert_eq!(verdict.model_version, "gpt-4o-2024-08-06");
        assert_eq!(verdict.severity, Severity::Moderate);
    }

    #[test]
    fn test_is_urgent() {
        let mut verdict = SeverityVerdict::new(
            "corpus:1",
            Severity::Severe,
            Confidence::new(0.8).unwrap(),
            "r",
            "gpt-4o",
        );
        assert!(!verdict.is_urgent());

        for (label, urgent) in [("routine", false), ("Urgent", true), (" immediate ", true), ("soon", false)] {
            verdict.urgency = Some(label.to_string());
            assert_eq!(verdict.is_urgent(), urgent, "{}", label);
        }
    }
}
