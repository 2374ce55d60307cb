//! Scripted classifier - canned oracle replies per drug.

use std::collections::HashMap;
use std::sync::Mutex;

use event_core::{
    async_trait, parse_oracle_reply, AdverseEventRecord, Classifier, ClassifyError,
    SeverityVerdict,
};

/// What the scripted oracle does for a drug.
#[derive(Debug, Clone)]
pub enum Script {
    /// Reply with this text; it is parsed exactly like a live reply.
    Reply(String),
    /// Fail with this error.
    Fail(ClassifyError),
}

/// Answers each record according to a script keyed by drug name.
///
/// Drug names are matched case-insensitively. Replies go through the same
/// strict parser as live oracle replies, so malformed scripts produce
/// `ParseError`s.
#[derive(Debug)]
pub struct ScriptedClassifier {
    scripts: HashMap<String, Script>,
    fallback: Option<Script>,
    model_version: String,
    seen: Mutex<Vec<String>>,
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            fallback: None,
            model_version: "mock-scripted".to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` for records about `drug`.
    pub fn on_drug(mut self, drug: &str, text: impl Into<String>) -> Self {
        self.scripts
            .insert(drug.to_lowercase(), Script::Reply(text.into()));
        self
    }

    /// Fail with `error` for records about `drug`.
    pub fn fail_drug(mut self, drug: &str, error: ClassifyError) -> Self {
        self.scripts.insert(drug.to_lowercase(), Script::Fail(error));
        self
    }

    /// Reply with `text` for drugs without a script.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(Script::Reply(text.into()));
        self
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    /// Record ids classified so far, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, record: &AdverseEventRecord) -> Result<SeverityVerdict, ClassifyError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(record.record_id().to_string());
        }

        let script = self
            .scripts
            .get(&record.drug_key())
            .or(self.fallback.as_ref())
            .ok_or_else(|| {
                ClassifyError::Oracle(format!("no script for drug {:?}", record.drug_name()))
            })?;

        match script {
            Script::Reply(text) => {
                let reply = parse_oracle_reply(text)?;
                Ok(reply.into_verdict(record.record_id(), &self.model_version))
            }
            Script::Fail(error) => Err(error.clone()),
        }
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }

    fn name(&self) -> &str {
        "ScriptedClassifier"
    }
}
