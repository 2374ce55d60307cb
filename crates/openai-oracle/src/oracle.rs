//! OpenAiClassifier implementation.

use event_core::{
    async_trait, extract_json_object, AdverseEventRecord, ClassificationRequest, Classifier,
    ClassifyError, OracleReply, ParseError, SeverityVerdict,
};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::api_types::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseFormat,
};
use crate::config::{ConfigError, OpenAiConfig};
use crate::prompt::{batch_prompt, single_prompt, DEFAULT_SYSTEM_PROMPT};

/// A classifier backed by the OpenAI chat-completions API.
pub struct OpenAiClassifier {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClassifier {
    /// Create a new classifier with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        info!(
            model = %config.model,
            timeout_secs = config.timeout.as_secs(),
            "OpenAiClassifier initialized"
        );

        Ok(Self { client, config })
    }

    /// Create a classifier from environment variables.
    ///
    /// See [`OpenAiConfig::from_env`] for the variables read.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(OpenAiConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn system_prompt(&self) -> &str {
        self.config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Send one chat completion and return the reply text.
    async fn complete(&self, user_message: String) -> Result<String, ClassifyError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(self.system_prompt()),
                ChatMessage::user(user_message),
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: ResponseFormat::json_object(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if let Ok(api_error) = serde_json::from_str::<ApiError>(&error_text) {
                return Err(ClassifyError::Oracle(format!(
                    "API error ({}): {}",
                    status.as_u16(),
                    api_error.error.message
                )));
            }

            return Err(ClassifyError::Oracle(format!(
                "API error ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;

        if let Some(usage) = completion.usage {
            debug!(
                served_model = %completion.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Oracle token usage"
            );
        }

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClassifyError::Oracle("response contained no choices".to_string()))?;

        match choice.message.content {
            Some(text) => Ok(text),
            None => {
                warn!(finish_reason = ?choice.finish_reason, "Oracle returned no content");
                Err(ParseError::NoJson.into())
            }
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> ClassifyError {
        if error.is_timeout() {
            ClassifyError::Timeout(self.config.timeout)
        } else {
            ClassifyError::Oracle(error.to_string())
        }
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    #[instrument(skip(self, record), fields(record_id = %record.record_id()))]
    async fn classify(&self, record: &AdverseEventRecord) -> Result<SeverityVerdict, ClassifyError> {
        let request = ClassificationRequest::from_record(record);
        let text = self.complete(single_prompt(&request)).await?;

        let reply = event_core::parse_oracle_reply(&text).inspect_err(|e| {
            warn!(error = %e, "Rejected oracle reply");
        })?;

        Ok(reply.into_verdict(record.record_id(), &self.config.model))
    }

    #[instrument(skip(self, records), fields(batch = records.len()))]
    async fn classify_batch(
        &self,
        records: &[AdverseEventRecord],
    ) -> Vec<Result<SeverityVerdict, ClassifyError>> {
        match records.len() {
            0 => return Vec::new(),
            1 => return vec![self.classify(&records[0]).await],
            _ => {}
        }

        let requests: Vec<ClassificationRequest> =
            records.iter().map(ClassificationRequest::from_record).collect();

        let text = match self.complete(batch_prompt(&requests)).await {
            Ok(text) => text,
            Err(e) => return records.iter().map(|_| Err(e.clone())).collect(),
        };

        parse_batch_reply(&text, records.len())
            .into_iter()
            .zip(records)
            .map(|(reply, record)| {
                reply
                    .map(|r| r.into_verdict(record.record_id(), &self.config.model))
                    .map_err(|e| {
                        warn!(record_id = %record.record_id(), error = %e, "Rejected oracle reply");
                        ClassifyError::Parse(e)
                    })
            })
            .collect()
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn model_version(&self) -> &str {
        &self.config.model
    }

    fn name(&self) -> &str {
        "OpenAiClassifier"
    }

    async fn is_ready(&self) -> bool {
        self.config.has_api_key()
    }
}

/// Split a `{"verdicts": [...]}` reply into one result per report.
///
/// Entries are matched by their `index`; a report with no entry, a
/// duplicated entry or an invalid entry gets its own `ParseError` while the
/// rest of the batch is kept.
fn parse_batch_reply(text: &str, expected: usize) -> Vec<Result<OracleReply, ParseError>> {
    let envelope = match extract_json_object(text) {
        Ok(value) => value,
        Err(e) => return vec![Err(e); expected],
    };

    let entries = match envelope.get("verdicts") {
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            let err = ParseError::InvalidField {
                field: "verdicts",
                reason: "expected an array".to_string(),
            };
            return vec![Err(err); expected];
        }
        None => return vec![Err(ParseError::MissingField("verdicts")); expected],
    };

    let mut slots: Vec<Option<Result<OracleReply, ParseError>>> = vec![None; expected];

    for entry in entries {
        let Some(index) = entry.get("index").and_then(Value::as_u64).map(|i| i as usize) else {
            continue;
        };
        let Some(slot) = slots.get_mut(index) else {
            continue;
        };
        let parsed = if slot.is_none() {
            OracleReply::from_value(entry)
        } else {
            Err(ParseError::InvalidField {
                field: "index",
                reason: format!("duplicate verdict for report {}", index),
            })
        };
        *slot = Some(parsed);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                Err(ParseError::InvalidField {
                    field: "verdicts",
                    reason: format!("no verdict for report {}", index),
                })
            })
        })
        .collect()
}
