//! Error types for discord-webhook.

use thiserror::Error;

/// Errors that can occur when posting to a webhook.
#[derive(Debug, Error)]
pub enum DiscordError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Discord rejected the message.
    #[error("webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Discord is rate limiting this webhook.
    #[error("rate limited, retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<f64> },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Nothing to send.
    #[error("message content is empty")]
    EmptyMessage,
}

impl DiscordError {
    /// Errors worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            DiscordError::Http(e) => e.is_timeout() || e.is_connect(),
            DiscordError::RateLimited { .. } => true,
            DiscordError::Rejected { status, .. } => *status >= 500,
            DiscordError::Config(_) | DiscordError::EmptyMessage => false,
        }
    }
}
