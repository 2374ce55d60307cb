//! Configuration types for discord-webhook.

use std::env;
use std::time::Duration;

use crate::error::DiscordError;

/// Name the webhook posts under unless overridden.
pub const DEFAULT_USERNAME: &str = "ADE Monitor";

/// Configuration for posting to a Discord webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Full webhook URL (https://discord.com/api/webhooks/<id>/<token>).
    pub url: String,
    /// Display name for posted messages.
    pub username: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: Some(DEFAULT_USERNAME.to_string()),
            timeout: Duration::from_secs(10),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `DISCORD_WEBHOOK_URL`
    ///
    /// Optional:
    /// - `DISCORD_USERNAME` - Default: ADE Monitor
    pub fn from_env() -> Result<Self, DiscordError> {
        let url = env::var("DISCORD_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| DiscordError::Config("DISCORD_WEBHOOK_URL is not set".to_string()))?;

        let mut config = Self::new(url.trim());
        if let Ok(name) = env::var("DISCORD_USERNAME") {
            config.username = Some(name).filter(|n| !n.trim().is_empty());
        }
        Ok(config)
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Webhook URL that waits for Discord to accept the message.
    pub(crate) fn execute_url(&self) -> String {
        if self.url.contains('?') {
            format!("{}&wait=true", self.url)
        } else {
            format!("{}?wait=true", self.url)
        }
    }
}
