//! Configuration for OpenAiClassifier.

use std::env;
use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Default system prompt file name.
pub const DEFAULT_PROMPT_FILE: &str = "CLASSIFIER_PROMPT.md";

const DEFAULT_API_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{0} not set")]
    MissingEnvVar(&'static str),

    /// An environment variable holds an unusable value.
    #[error("invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    /// The HTTP client could not be built.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// Configuration for OpenAiClassifier.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// OpenAI API base URL.
    pub api_url: String,

    api_key: SecretString,

    /// Model name; also recorded as the verdicts' model version.
    pub model: String,

    /// Overrides the built-in system prompt.
    pub system_prompt: Option<String>,

    pub max_tokens: Option<u32>,

    /// Sampling temperature. Classification wants 0.
    pub temperature: Option<f32>,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: SecretString::from(String::new()),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            max_tokens: Some(1024),
            temperature: Some(0.0),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl OpenAiConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `OPENAI_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `OPENAI_API_URL` - API URL (default: https://api.openai.com)
    /// - `OPENAI_MODEL` - Model name (default: gpt-4o)
    /// - `OPENAI_SYSTEM_PROMPT` - System prompt (overrides prompt file)
    /// - `OPENAI_PROMPT_FILE` - Path to system prompt file (default: CLASSIFIER_PROMPT.md)
    /// - `OPENAI_MAX_TOKENS` - Max tokens (default: 1024)
    /// - `OPENAI_TEMPERATURE` - Temperature (default: 0.0)
    /// - `OPENAI_TIMEOUT_SECS` - Request timeout (default: 30)
    ///
    /// System prompt priority:
    /// 1. `OPENAI_SYSTEM_PROMPT` env var (if set)
    /// 2. Contents of prompt file (if exists)
    /// 3. The built-in classification prompt
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar("OPENAI_API_KEY"))?;

        let api_url = env::var("OPENAI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let system_prompt = if let Ok(prompt) = env::var("OPENAI_SYSTEM_PROMPT") {
            Some(prompt)
        } else {
            let prompt_file =
                env::var("OPENAI_PROMPT_FILE").unwrap_or_else(|_| DEFAULT_PROMPT_FILE.to_string());
            load_prompt_file(&prompt_file)
        };

        let max_tokens = parse_var::<u32>("OPENAI_MAX_TOKENS")?.or(Some(1024));
        let temperature = parse_var::<f32>("OPENAI_TEMPERATURE")?.or(Some(0.0));
        let timeout_secs = parse_var::<u64>("OPENAI_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            api_url,
            api_key: SecretString::from(api_key),
            model,
            system_prompt,
            max_tokens,
            temperature,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Create a new config builder.
    pub fn builder() -> OpenAiConfigBuilder {
        OpenAiConfigBuilder::default()
    }

    /// Get the API key (exposes the secret).
    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    pub(crate) fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }
}

/// Builder for OpenAiConfig.
#[derive(Debug, Default)]
pub struct OpenAiConfigBuilder {
    config: OpenAiConfig,
}

impl OpenAiConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = SecretString::from(key.into());
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Load system prompt from a file, if it exists and is non-empty.
    pub fn load_prompt_file(mut self, path: impl AsRef<Path>) -> Self {
        if let Some(prompt) = load_prompt_file(path) {
            self.config.system_prompt = Some(prompt);
        }
        self
    }

    pub fn build(self) -> OpenAiConfig {
        self.config
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(None),
    }
}

/// Load a prompt file, returning None if not found or empty.
fn load_prompt_file(path: impl AsRef<Path>) -> Option<String> {
    let content = std::fs::read_to_string(path.as_ref()).ok()?;
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = OpenAiConfig::default();

        assert_eq!(config.api_url, "https://api.openai.com");
        assert!(!config.has_api_key());
        assert_eq!(config.model, "gpt-4o");
        assert!(config.system_prompt.is_none());
        assert_eq!(config.temperature, Some(0.0));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_all_options() {
        let config = OpenAiConfig::builder()
            .api_key("sk-test")
            .api_url("http://127.0.0.1:9999")
            .model("gpt-4o-mini")
            .system_prompt("Classify.")
            .max_tokens(256)
            .temperature(0.2)
            .timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.api_key(), "sk-test");
        assert_eq!(config.api_url, "http://127.0.0.1:9999");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.system_prompt.as_deref(), Some("Classify."));
        assert_eq!(config.max_tokens, Some(256));
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let config = OpenAiConfig::builder().api_key("sk-very-secret").build();
        assert!(!format!("{:?}", config).contains("sk-very-secret"));
    }

    #[test]
    fn test_load_prompt_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  You grade adverse events.  ").unwrap();

        let config = OpenAiConfig::builder().load_prompt_file(file.path()).build();
        assert_eq!(config.system_prompt.as_deref(), Some("You grade adverse events."));

        let config = OpenAiConfig::builder()
            .load_prompt_file("/no/such/prompt.md")
            .build();
        assert!(config.system_prompt.is_none());
    }

    // Env vars are process-global; keep every scenario in one test.
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        fn clear_all_openai_vars() {
            for var in [
                "OPENAI_API_KEY",
                "OPENAI_API_URL",
                "OPENAI_MODEL",
                "OPENAI_SYSTEM_PROMPT",
                "OPENAI_PROMPT_FILE",
                "OPENAI_MAX_TOKENS",
                "OPENAI_TEMPERATURE",
                "OPENAI_TIMEOUT_SECS",
            ] {
                std::env::remove_var(var);
            }
        }

        // Missing API key
        clear_all_openai_vars();
        match OpenAiConfig::from_env() {
            Err(ConfigError::MissingEnvVar(var)) => assert_eq!(var, "OPENAI_API_KEY"),
            other => panic!("expected MissingEnvVar, got {:?}", other),
        }

        // Defaults
        clear_all_openai_vars();
        std::env::set_var("OPENAI_API_KEY", "sk-env");
        std::env::set_var("OPENAI_PROMPT_FILE", "/no/such/prompt.md");
        let config = OpenAiConfig::from_env().unwrap();
        assert_eq!(config.api_key(), "sk-env");
        assert_eq!(config.model, "gpt-4o");
        assert!(config.system_prompt.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));

        // Everything set
        clear_all_openai_vars();
        std::env::set_var("OPENAI_API_KEY", "sk-env");
        std::env::set_var("OPENAI_API_URL", "http://localhost:1234");
        std::env::set_var("OPENAI_MODEL", "gpt-4o-mini");
        std::env::set_var("OPENAI_SYSTEM_PROMPT", "Custom");
        std::env::set_var("OPENAI_MAX_TOKENS", "300");
        std::env::set_var("OPENAI_TEMPERATURE", "0.1");
        std::env::set_var("OPENAI_TIMEOUT_SECS", "12");
        let config = OpenAiConfig::from_env().unwrap();
        assert_eq!(config.api_url, "http://localhost:1234");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.system_prompt.as_deref(), Some("Custom"));
        assert_eq!(config.max_tokens, Some(300));
        assert_eq!(config.temperature, Some(0.1));
        assert_eq!(config.timeout, Duration::from_secs(12));

        // Unparseable number
        std::env::set_var("OPENAI_TIMEOUT_SECS", "soon");
        assert!(matches!(
            OpenAiConfig::from_env(),
            Err(ConfigError::Invalid { var: "OPENAI_TIMEOUT_SECS", .. })
        ));

        clear_all_openai_vars();
    }
}
