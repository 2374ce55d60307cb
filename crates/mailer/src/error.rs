//! Mailer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailerError {
    /// A required `SMTP_*` variable is unset.
    #[error("{0} is not set")]
    MissingEnvVar(&'static str),

    /// A variable is set but unusable.
    #[error("invalid mailer configuration: {0}")]
    Config(String),

    #[error("invalid address {0}")]
    InvalidAddress(String),

    /// The message could not be assembled (bad attachment type or encoding).
    #[error("cannot build message: {0}")]
    Build(String),

    /// The relay could not be reached or refused the message.
    #[error("relay error: {0}")]
    Relay(String),
}
