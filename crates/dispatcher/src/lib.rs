//! Alert dispatch for classified adverse events.
//!
//! A verdict whose severity crosses a sink's threshold becomes one alert
//! per `(record_id, sink)`, tracked in the result store:
//!
//! ```text
//! pending -> dispatching -> sent
//!                        -> failed -> pending (attempts <= max_retries)
//!                                  -> abandoned
//! ```
//!
//! # Example
//!
//! ```no_run
//! use database::{ResultStore, StoreConfig};
//! use dispatcher::Dispatcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ResultStore::open(StoreConfig::from_env()?).await?;
//! let dispatcher = Dispatcher::from_env(store)?;
//! let report = dispatcher.retry_failed().await?;
//! println!("{} abandoned", report.abandoned.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod digest;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod sink;
pub mod threshold;

pub use config::DispatcherConfig;
pub use digest::{urgent_digest, DIGEST_ID, DIGEST_TOP_CASES};
pub use dispatcher::{Dispatcher, RetryReport};
pub use error::{DispatchError, SinkError};
pub use message::AlertMessage;
pub use sink::{AlertSink, DiscordSink, EmailSink, LoggingSink, NoOpSink, RecordingSink};
pub use threshold::ThresholdTable;
