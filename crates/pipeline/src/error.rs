//! Error types for pipeline runs.

use database::DatabaseError;
use dispatcher::DispatchError;
use ingester::ReaderError;
use mailer::MailerError;
use thiserror::Error;

/// Errors that stop a run (or stop it from starting).
///
/// Per-record problems never surface here; they are reported in the
/// [`RunSummary`](crate::RunSummary).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Another run holds this pipeline.
    #[error("a pipeline run is already in progress")]
    AlreadyRunning,

    #[error("store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("mail error: {0}")]
    Mail(#[from] MailerError),

    /// Invalid pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
