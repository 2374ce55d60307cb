//! Discord webhook HTTP client.

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::config::WebhookConfig;
use crate::error::DiscordError;
use crate::types::{RateLimitBody, WebhookMessage};

/// Client for a single Discord webhook.
#[derive(Debug, Clone)]
pub struct DiscordClient {
    http: Client,
    config: WebhookConfig,
}

impl DiscordClient {
    pub fn new(config: WebhookConfig) -> Result<Self, DiscordError> {
        if config.url.trim().is_empty() {
            return Err(DiscordError::Config("webhook URL is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DiscordError::Http)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Send plain text under the configured username.
    pub async fn send_text(&self, content: &str) -> Result<(), DiscordError> {
        let mut message = WebhookMessage::new(content);
        if let Some(ref name) = self.config.username {
            message = message.with_username(name.clone());
        }
        self.send(&message).await
    }

    /// Execute the webhook with `message`.
    pub async fn send(&self, message: &WebhookMessage) -> Result<(), DiscordError> {
        if message.content.trim().is_empty() {
            return Err(DiscordError::EmptyMessage);
        }

        debug!(chars = message.content.chars().count(), "Posting to Discord webhook");

        let response = self
            .http
            .post(self.config.execute_url())
            .json(message)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            info!("Discord webhook accepted message");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = serde_json::from_str::<RateLimitBody>(&body)
                .ok()
                .and_then(|b| b.retry_after);
            warn!(?retry_after, "Discord webhook rate limited");
            return Err(DiscordError::RateLimited { retry_after });
        }

        warn!(status = status.as_u16(), "Discord webhook rejected message");
        Err(DiscordError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
