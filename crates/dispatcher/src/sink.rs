//! Alert sinks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use discord_webhook::DiscordClient;
use event_core::SinkKind;
use mailer::{Email, Mailer};
use tracing::info;

use crate::error::SinkError;
use crate::message::AlertMessage;

/// A notification channel.
///
/// Abstracted to support different transports (Discord, email, tests).
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// The channel this sink delivers to.
    fn kind(&self) -> SinkKind;

    /// Deliver one alert. `Ok` means the transport accepted it.
    async fn deliver(&self, message: &AlertMessage) -> Result<(), SinkError>;
}

/// Posts alerts to a Discord webhook.
#[derive(Debug, Clone)]
pub struct DiscordSink {
    client: DiscordClient,
}

impl DiscordSink {
    pub fn new(client: DiscordClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlertSink for DiscordSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Discord
    }

    async fn deliver(&self, message: &AlertMessage) -> Result<(), SinkError> {
        self.client.send_text(&message.body).await?;
        Ok(())
    }
}

/// Emails alerts to a fixed recipient list.
#[derive(Debug, Clone)]
pub struct EmailSink {
    mailer: Mailer,
    recipients: Vec<String>,
}

impl EmailSink {
    pub fn new(mailer: Mailer, recipients: Vec<String>) -> Result<Self, SinkError> {
        if recipients.is_empty() {
            return Err(SinkError::Failed("email sink has no recipients".to_string()));
        }
        Ok(Self { mailer, recipients })
    }
}

#[async_trait]
impl AlertSink for EmailSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Email
    }

    async fn deliver(&self, message: &AlertMessage) -> Result<(), SinkError> {
        let email = Email::new(self.recipients.clone(), &message.subject, &message.body);
        self.mailer.send(&email).await?;
        Ok(())
    }
}

/// A sink that accepts and discards every alert.
#[derive(Debug, Clone)]
pub struct NoOpSink(pub SinkKind);

#[async_trait]
impl AlertSink for NoOpSink {
    fn kind(&self) -> SinkKind {
        self.0
    }

    async fn deliver(&self, _message: &AlertMessage) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A sink that logs alerts instead of sending them.
#[derive(Debug, Clone)]
pub struct LoggingSink(pub SinkKind);

#[async_trait]
impl AlertSink for LoggingSink {
    fn kind(&self) -> SinkKind {
        self.0
    }

    async fn deliver(&self, message: &AlertMessage) -> Result<(), SinkError> {
        info!(sink = %self.0, record_id = %message.record_id, "{}", message.body);
        Ok(())
    }
}

/// Keeps every delivery attempt; can be told to fail.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    kind: SinkKind,
    attempts: Arc<Mutex<Vec<AlertMessage>>>,
    failures_left: Arc<AtomicU32>,
}

impl RecordingSink {
    pub fn new(kind: SinkKind) -> Self {
        Self {
            kind,
            attempts: Arc::new(Mutex::new(Vec::new())),
            failures_left: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail the next `n` deliveries.
    pub fn failing(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Every delivery attempt so far, failed ones included.
    pub fn attempts(&self) -> Vec<AlertMessage> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().map(|a| a.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn kind(&self) -> SinkKind {
        self.kind
    }

    async fn deliver(&self, message: &AlertMessage) -> Result<(), SinkError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(message.clone());
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SinkError::Failed(format!("{} sink unavailable", self.kind)));
        }
        Ok(())
    }
}
