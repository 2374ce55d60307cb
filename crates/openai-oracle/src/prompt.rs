//! Prompts sent to the oracle.
//!
//! Only `drug_name` and `reaction_text` ever leave the process; the raw
//! payload and record id stay local.

use event_core::ClassificationRequest;
use serde_json::json;

/// Built-in system prompt describing the verdict schema.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a pharmacovigilance analyst grading adverse drug event reports.

For each report, assess how serious the described reaction is and answer with a JSON object:

{
  "severity": one of "informational", "mild", "moderate", "severe", "critical",
  "confidence": a number between 0 and 1,
  "rationale": a short explanation,
  "category": the affected body system (e.g. "gastrointestinal", "cardiovascular"),
  "urgency": one of "routine", "urgent", "immediate",
  "recommended_action": the follow-up a safety reviewer should take
}

Use "critical" only for life-threatening or fatal outcomes. Respond with JSON only."#;

/// User message for a single record.
pub fn single_prompt(request: &ClassificationRequest) -> String {
    let report = json!({
        "drug_name": request.drug_name,
        "reaction_text": request.reaction_text,
    });
    format!("Grade this adverse event report:\n{}", report)
}

/// User message for a batch of records.
///
/// The reply must carry one entry per report, keyed by `index`.
pub fn batch_prompt(requests: &[ClassificationRequest]) -> String {
    let reports: Vec<_> = requests
        .iter()
        .enumerate()
        .map(|(index, r)| {
            json!({
                "index": index,
                "drug_name": r.drug_name,
                "reaction_text": r.reaction_text,
            })
        })
        .collect();

    format!(
        "Grade each of these {} adverse event reports. Answer with {{\"verdicts\": [...]}} \
         where every element is the verdict object for one report plus its \"index\".\n{}",
        requests.len(),
        serde_json::Value::Array(reports)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(drug: &str, reaction: &str) -> ClassificationRequest {
        ClassificationRequest {
            drug_name: drug.to_string(),
            reaction_text: reaction.to_string(),
        }
    }

    #[test]
    fn test_single_prompt_carries_only_drug_and_reaction() {
        let prompt = single_prompt(&request("Aspirin", "gastric \"bleeding\""));
        assert!(prompt.contains(r#""drug_name":"Aspirin""#));
        assert!(prompt.contains(r#"gastric \"bleeding\""#));
    }

    #[test]
    fn test_system_prompt_lists_urgency_levels() {
        for level in event_core::URGENCY_LEVELS {
            assert!(DEFAULT_SYSTEM_PROMPT.contains(&format!("\"{}\"", level)));
        }
    }

    #[test]
    fn test_batch_prompt_indexes_reports() {
        let prompt = batch_prompt(&[request("A", "x"), request("B", "y")]);
        assert!(prompt.contains("these 2 adverse event reports"));
        assert!(prompt.contains(r#""index":1"#));
        assert!(prompt.contains(r#""drug_name":"B""#));
    }
}
