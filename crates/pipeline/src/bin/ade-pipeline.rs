use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use database::{ResultStore, StoreConfig};
use dispatcher::Dispatcher;
use ingester::ReaderConfig;
use mailer::{Mailer, MailerConfig};
use openai_oracle::OpenAiClassifier;
use pipeline::{Pipeline, PipelineConfig, RunReporter, RunRequest};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ade-pipeline")]
#[command(about = "Classify adverse drug event reports and alert on severe ones")]
struct Args {
    /// Run once and print the summary instead of running on a schedule.
    #[arg(long)]
    once: bool,
    #[arg(long, default_value_t = 3600)]
    interval_secs: u64,
    /// Records to read from each source.
    #[arg(long)]
    record_count: Option<usize>,
    /// Classify records again even if the current model already did.
    #[arg(long)]
    reclassify: bool,
    /// SQLite database file (overrides SQLITE_PATH).
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut store_config = StoreConfig::from_env()?;
    if let Some(path) = args.database {
        store_config = store_config.with_path(path);
    }
    let store = ResultStore::open(store_config).await?;

    let readers = ReaderConfig::from_env().build_readers()?;
    if readers.is_empty() {
        warn!("No sources configured; set CORPUS_PATH, OPENFDA_URL or LITERATURE_URL");
    }

    let classifier = Arc::new(OpenAiClassifier::from_env()?);
    let dispatcher = Dispatcher::from_env(store.clone())?;
    let config = PipelineConfig::from_env()?;
    let recipients = config.report_recipients.clone();

    let mut pipeline = Pipeline::new(classifier, store, dispatcher, config).with_readers(readers);
    if !recipients.is_empty() {
        let mailer = Mailer::new(MailerConfig::from_env()?)?;
        pipeline = pipeline.with_reporter(RunReporter::new(mailer, recipients));
    }
    info!(?pipeline, "Pipeline ready");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, cancelling");
            on_signal.cancel();
        }
    });

    let request = RunRequest {
        record_count: args.record_count,
        reclassify: args.reclassify,
        ..RunRequest::manual()
    };

    if args.once {
        let summary = pipeline.run(request, cancel).await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        pipeline
            .run_scheduled(Duration::from_secs(args.interval_secs.max(1)), request, cancel)
            .await;
    }

    Ok(())
}
