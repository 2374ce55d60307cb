//! # mailer
//!
//! SMTP client for sending alert and run report email through a STARTTLS
//! relay.
//!
//! ```no_run
//! use mailer::{Attachment, Email, Mailer, MailerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mailer::MailerError> {
//!     let config = MailerConfig::from_env()?;
//!     let mailer = Mailer::new(config)?;
//!
//!     let email = Email::new(["safety@example.org"], "Run report", "3 records analyzed")
//!         .with_attachment(Attachment::json("analysis.json", b"[]".to_vec()));
//!     mailer.send(&email).await?;
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod types;

pub use client::Mailer;
pub use config::{parse_recipients, MailerConfig, DEFAULT_SMTP_PORT};
pub use error::MailerError;
pub use types::{Attachment, Email};
