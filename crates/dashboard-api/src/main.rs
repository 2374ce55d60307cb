//! Dashboard API for the adverse event pipeline.
//!
//! Serves stored records, verdicts, alerts, failures, statistics and run
//! history as JSON, and starts pipeline runs on request.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use database::{ResultStore, StoreConfig};
use dispatcher::Dispatcher;
use ingester::ReaderConfig;
use mailer::{Mailer, MailerConfig};
use openai_oracle::OpenAiClassifier;
use pipeline::{Pipeline, PipelineConfig, RunReporter};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting dashboard API");

    // Open the result store
    let store = ResultStore::open(StoreConfig::from_env()?).await?;

    // Build the pipeline the dashboard triggers
    let pipeline_config = PipelineConfig::from_env()?;
    let recipients = pipeline_config.report_recipients.clone();
    let mut pipeline = Pipeline::new(
        Arc::new(OpenAiClassifier::from_env()?),
        store.clone(),
        Dispatcher::from_env(store.clone())?,
        pipeline_config,
    )
    .with_readers(ReaderConfig::from_env().build_readers()?);
    if !recipients.is_empty() {
        let mailer = Mailer::new(MailerConfig::from_env()?)?;
        pipeline = pipeline.with_reporter(RunReporter::new(mailer, recipients));
    }

    // Build application state
    let state = AppState::new(store, Arc::new(pipeline), config.stats_threshold);
    let shutdown = state.shutdown.clone();

    // Build router
    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    info!(addr = %config.addr, "Dashboard API listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, cancelling runs");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
