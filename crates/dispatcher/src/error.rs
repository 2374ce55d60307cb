//! Error types for alert dispatch.

use database::DatabaseError;
use discord_webhook::DiscordError;
use mailer::MailerError;
use thiserror::Error;

/// A sink could not deliver an alert.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("discord: {0}")]
    Discord(#[from] DiscordError),

    #[error("email: {0}")]
    Mail(#[from] MailerError),

    /// Delivery failed for another reason (test sinks, misconfiguration).
    #[error("{0}")]
    Failed(String),
}

/// Errors that stop dispatch as a whole.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The alert state could not be read or written.
    #[error("store error: {0}")]
    Store(#[from] DatabaseError),

    /// Invalid dispatcher configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
