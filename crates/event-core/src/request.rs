//! The payload sent to a classification oracle.

use serde::{Deserialize, Serialize};

use crate::record::AdverseEventRecord;

/// What an oracle gets to see about a record.
///
/// Only the drug name and the reaction text leave the pipeline; the raw
/// payload stays local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub drug_name: String,
    pub reaction_text: String,
}

impl ClassificationRequest {
    pub fn from_record(record: &AdverseEventRecord) -> Self {
        Self {
            drug_name: record.drug_name().to_string(),
            reaction_text: record.reaction_text().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;
    use chrono::Utc;

    #[test]
    fn test_request_omits_raw_payload() {
        let record = AdverseEventRecord::new(
            "corpus:42",
            Source::Corpus,
            "Aspirin",
            "severe gastric bleeding",
            None,
            r#"{"patient_name":"do not leak"}"#,
            Utc::now(),
        );

        let request = ClassificationRequest::from_record(&record);
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("Aspirin"));
        assert!(json.contains("severe gastric bleeding"));
        assert!(!json.contains("do not leak"));
        assert!(!json.contains("corpus:42"));
    }
}
