//! Application state shared across handlers.

use std::sync::Arc;

use database::ResultStore;
use event_core::Severity;
use pipeline::Pipeline;
use tokio_util::sync::CancellationToken;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Result store the pipeline writes to.
    pub store: ResultStore,
    /// Pipeline started by `POST /api/runs`.
    pub pipeline: Arc<Pipeline>,
    /// Default critical threshold for `/api/stats`.
    pub stats_threshold: Severity,
    /// Cancelled on shutdown; runs get a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: ResultStore, pipeline: Arc<Pipeline>, stats_threshold: Severity) -> Self {
        Self {
            store,
            pipeline,
            stats_threshold,
            shutdown: CancellationToken::new(),
        }
    }
}
