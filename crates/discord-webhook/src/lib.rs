//! Discord webhook client library.
//!
//! Posts plain-text messages to a Discord channel through an incoming
//! webhook URL.
//!
//! # Example
//!
//! ```no_run
//! use discord_webhook::{DiscordClient, WebhookConfig};
//!
//! # async fn example() -> Result<(), discord_webhook::DiscordError> {
//! let client = DiscordClient::new(WebhookConfig::from_env()?)?;
//! client.send_text("Severe adverse event reported for Warfarin").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::DiscordClient;
pub use config::{WebhookConfig, DEFAULT_USERNAME};
pub use error::DiscordError;
pub use types::{WebhookMessage, MAX_CONTENT_CHARS};
