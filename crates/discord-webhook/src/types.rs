//! Webhook payloads.

use serde::{Deserialize, Serialize};

/// Discord's limit on message content.
pub const MAX_CONTENT_CHARS: usize = 2000;

/// Body of an execute-webhook request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl WebhookMessage {
    /// Build a message, cutting content that exceeds Discord's limit.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: truncate(content.into()),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitBody {
    pub retry_after: Option<f64>,
}

fn truncate(content: String) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content;
    }
    let mut cut: String = content.chars().take(MAX_CONTENT_CHARS - 1).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_without_username() {
        let json = serde_json::to_value(WebhookMessage::new("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"content": "hello"}));
    }

    #[test]
    fn test_long_content_is_truncated() {
        let message = WebhookMessage::new("é".repeat(MAX_CONTENT_CHARS + 10));
        assert_eq!(message.content.chars().count(), MAX_CONTENT_CHARS);
        assert!(message.content.ends_with('…'));
    }
}
