use lettre::{
    message::{header::ContentType, Attachment as LettreAttachment, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info, instrument};

use crate::{Email, MailerConfig, MailerError};

/// Client for sending email through an SMTP relay.
///
/// Uses connection pooling for efficient batch sending.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

impl Mailer {
    /// Create a new client with the given configuration.
    ///
    /// Connections are opened lazily on the first send.
    pub fn new(config: MailerConfig) -> Result<Self, MailerError> {
        let creds = Credentials::new(config.username.clone(), config.password().to_string());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| MailerError::Relay(e.to_string()))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            from = %config.from_address,
            "Created SMTP client"
        );

        Ok(Self {
            transport,
            from_address: config.from_address,
        })
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    /// Send an email.
    #[instrument(skip(self, email), fields(to = ?email.to, subject = %email.subject))]
    pub async fn send(&self, email: &Email) -> Result<(), MailerError> {
        let message = build_message(&self.from_address, email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::Relay(e.to_string()))?;

        info!(to = ?email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Build a lettre Message from our Email type.
fn build_message(from_address: &str, email: &Email) -> Result<Message, MailerError> {
    if email.to.is_empty() {
        return Err(MailerError::InvalidAddress("no recipients".to_string()));
    }

    let from = from_address
        .parse()
        .map_err(|e| MailerError::InvalidAddress(format!("From: {}", e)))?;

    let mut builder = Message::builder().from(from).subject(&email.subject);

    for to in &email.to {
        let addr = to
            .parse()
            .map_err(|e| MailerError::InvalidAddress(format!("To '{}': {}", to, e)))?;
        builder = builder.to(addr);
    }

    if email.attachments.is_empty() {
        return builder
            .body(email.body.clone())
            .map_err(|e| MailerError::Build(e.to_string()));
    }

    let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(email.body.clone()));

    for attachment in &email.attachments {
        debug!(filename = %attachment.filename, content_type = %attachment.content_type, "Adding attachment");

        let content_type: ContentType = attachment
            .content_type
            .parse()
            .map_err(|e| MailerError::Build(format!("Invalid content type: {}", e)))?;

        multipart = multipart.singlepart(
            LettreAttachment::new(attachment.filename.clone()).body(attachment.data.clone(), content_type),
        );
    }

    builder
        .multipart(multipart)
        .map_err(|e| MailerError::Build(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Attachment;

    fn formatted(email: &Email) -> String {
        let message = build_message("ADE Monitor <alerts@example.org>", email).unwrap();
        String::from_utf8(message.formatted()).unwrap()
    }

    #[test]
    fn test_plain_message_headers() {
        let email = Email::new(
            ["a@example.org", "b@example.org"],
            "Critical adverse event",
            "Severity: 5/5",
        );
        let text = formatted(&email);

        assert!(text.contains("Subject: Critical adverse event"));
        assert!(text.contains("a@example.org"));
        assert!(text.contains("b@example.org"));
        assert!(text.contains("Severity: 5/5"));
    }

    #[test]
    fn test_attachment_is_multipart() {
        let email = Email::new(["a@example.org"], "Run report", "see attachment")
            .with_attachment(Attachment::json("analysis.json", br#"[{"id":1}]"#.to_vec()));
        let text = formatted(&email);

        assert!(text.contains("multipart/mixed"));
        assert!(text.contains("analysis.json"));
        assert!(text.contains("application/json"));
    }

    #[test]
    fn test_rejects_bad_addresses() {
        let email = Email::new(["not an address"], "s", "b");
        assert!(matches!(
            build_message("alerts@example.org", &email),
            Err(MailerError::InvalidAddress(_))
        ));

        let nobody = Email::new(Vec::<String>::new(), "s", "b");
        assert!(matches!(
            build_message("alerts@example.org", &nobody),
            Err(MailerError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_rejects_bad_content_type() {
        let email = Email::new(["a@example.org"], "s", "b")
            .with_attachment(Attachment::new("x.bin", "not a mime", vec![1, 2, 3]));
        assert!(matches!(
            build_message("alerts@example.org", &email),
            Err(MailerError::Build(_))
        ));
    }
}
