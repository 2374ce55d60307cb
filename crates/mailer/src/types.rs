//! Outgoing messages.

/// A plain-text message sent to one or more recipients.
///
/// Alerts and run reports are both plain text; a report carries its full
/// results as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Address the same message to every recipient.
    pub fn new(
        recipients: impl IntoIterator<Item = impl Into<String>>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: recipients.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// A file carried by an email, such as the JSON results of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    /// MIME type, e.g. `application/json`.
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn json(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(filename, "application/json", data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_builder() {
        let email = Email::new(["qa@example.org", "pv@example.org"], "Run report", "2 records")
            .with_attachment(Attachment::json("analysis.json", b"[]".to_vec()));

        assert_eq!(email.to, vec!["qa@example.org", "pv@example.org"]);
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].content_type, "application/json");
    }
}
