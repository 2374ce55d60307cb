//! Alert events and their delivery states.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;
use crate::severity::Severity;

/// A notification delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Chat webhook.
    Discord,
    /// Email transport.
    Email,
}

impl SinkKind {
    pub const ALL: [SinkKind; 2] = [SinkKind::Discord, SinkKind::Email];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discord" => Ok(Self::Discord),
            "email" => Ok(Self::Email),
            _ => Err(UnknownVariant::new("sink", s)),
        }
    }
}

/// Delivery state of an alert for one `(record_id, sink)` pair.
///
/// ```text
/// pending -> dispatching -> sent
///                        -> failed -> pending (retry) ...
///                                  -> abandoned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Threshold crossed, not yet attempted (or re-queued for retry).
    Pending,
    /// Claimed by a dispatcher; delivery in flight.
    Dispatching,
    /// The sink acknowledged delivery. Terminal.
    Sent,
    /// The sink rejected the alert or timed out. Eligible for retry.
    Failed,
    /// Retry bound exceeded. Terminal.
    Abandoned,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatching => "dispatching",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Abandoned)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "dispatching" => Ok(Self::Dispatching),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(UnknownVariant::new("delivery status", s)),
        }
    }
}

/// A dispatched (or to-be-dispatched) notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub record_id: String,
    pub severity: Severity,
    pub sink: SinkKind,
    pub delivery_status: DeliveryStatus,
    /// Delivery attempts made so far.
    pub attempts: u32,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
    /// When the sink acknowledged delivery.
    pub dispatched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
