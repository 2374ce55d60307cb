use secrecy::{ExposeSecret, SecretString};
use std::env;

use crate::MailerError;

/// Submission port used with STARTTLS.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Configuration for an SMTP relay.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// SMTP host
    pub smtp_host: String,
    /// SMTP port (default: 587)
    pub smtp_port: u16,
    /// SMTP login
    pub username: String,
    /// SMTP password
    password: SecretString,
    /// Sender address (default: the login)
    pub from_address: String,
}

impl MailerConfig {
    /// Create a new configuration with explicit values.
    pub fn new(
        smtp_host: impl Into<String>,
        smtp_port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let username = username.into();
        Self {
            smtp_host: smtp_host.into(),
            smtp_port,
            from_address: username.clone(),
            username,
            password: SecretString::from(password.into()),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `SMTP_HOST` - Relay host
    /// - `SMTP_USERNAME` - Login
    /// - `SMTP_PASSWORD` - Password or app token
    ///
    /// Optional (with defaults):
    /// - `SMTP_PORT` - Default: 587
    /// - `SMTP_FROM` - Default: `SMTP_USERNAME`
    pub fn from_env() -> Result<Self, MailerError> {
        let smtp_host =
            env::var("SMTP_HOST").map_err(|_| MailerError::MissingEnvVar("SMTP_HOST"))?;

        let smtp_port = match env::var("SMTP_PORT") {
            Ok(port) => port
                .trim()
                .parse::<u16>()
                .map_err(|e| MailerError::Config(format!("Invalid SMTP_PORT: {}", e)))?,
            Err(_) => DEFAULT_SMTP_PORT,
        };

        let username =
            env::var("SMTP_USERNAME").map_err(|_| MailerError::MissingEnvVar("SMTP_USERNAME"))?;

        let password =
            env::var("SMTP_PASSWORD").map_err(|_| MailerError::MissingEnvVar("SMTP_PASSWORD"))?;

        let mut config = Self::new(smtp_host, smtp_port, username, password);
        if let Ok(from) = env::var("SMTP_FROM") {
            if !from.trim().is_empty() {
                config.from_address = from.trim().to_string();
            }
        }
        Ok(config)
    }

    /// Get the password (exposes the secret).
    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Builder method to set the sender address.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from_address = from.into();
        self
    }

    /// Builder method to set SMTP port.
    pub fn with_smtp_port(mut self, port: u16) -> Self {
        self.smtp_port = port;
        self
    }
}

/// Split a comma separated recipient list, dropping blanks.
pub fn parse_recipients(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipients() {
        assert_eq!(
            parse_recipients(" a@example.org, ,b@example.org,"),
            vec!["a@example.org", "b@example.org"]
        );
        assert!(parse_recipients("").is_empty());
    }

    // Env vars are process-global; keep every scenario in one test.
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        const VARS: [&str; 5] = ["SMTP_HOST", "SMTP_PORT", "SMTP_USERNAME", "SMTP_PASSWORD", "SMTP_FROM"];
        for var in VARS {
            std::env::remove_var(var);
        }
        assert!(matches!(MailerConfig::from_env(), Err(MailerError::MissingEnvVar(v)) if v == "SMTP_HOST"));

        std::env::set_var("SMTP_HOST", "smtp.example.org");
        std::env::set_var("SMTP_USERNAME", "alerts@example.org");
        std::env::set_var("SMTP_PASSWORD", "hunter2");
        let config = MailerConfig::from_env().unwrap();
        assert_eq!(config.smtp_port, DEFAULT_SMTP_PORT);
        assert_eq!(config.from_address, "alerts@example.org");
        assert_eq!(config.password(), "hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));

        std::env::set_var("SMTP_PORT", "2525");
        std::env::set_var("SMTP_FROM", "ADE Monitor <noreply@example.org>");
        let config = MailerConfig::from_env().unwrap();
        assert_eq!(config.smtp_port, 2525);
        assert_eq!(config.from_address, "ADE Monitor <noreply@example.org>");

        std::env::set_var("SMTP_PORT", "smtp");
        assert!(matches!(MailerConfig::from_env(), Err(MailerError::Config(_))));

        for var in VARS {
            std::env::remove_var(var);
        }
    }
}
