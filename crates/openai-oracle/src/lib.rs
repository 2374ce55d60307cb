//! OpenAI-backed severity classifier.
//!
//! [`OpenAiClassifier`] implements [`event_core::Classifier`] on top of the
//! OpenAI chat-completions API. Only the drug name and reaction text of a
//! record are sent; replies are validated strictly and never coerced.
//!
//! # Usage
//!
//! ```rust,no_run
//! use openai_oracle::OpenAiClassifier;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let classifier = OpenAiClassifier::from_env()?;
//! # Ok(())
//! # }
//! ```

mod api_types;
mod config;
mod oracle;
mod prompt;

pub use config::{ConfigError, OpenAiConfig, OpenAiConfigBuilder, DEFAULT_PROMPT_FILE};
pub use oracle::OpenAiClassifier;
pub use prompt::{batch_prompt, single_prompt, DEFAULT_SYSTEM_PROMPT};

pub use event_core::{async_trait, Classifier, ClassifyError};
