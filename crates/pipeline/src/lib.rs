//! The adverse event pipeline.
//!
//! One run reads every configured source, normalizes what it reads,
//! classifies new records in bounded batches, stores the verdicts and hands
//! them to the [`Dispatcher`](dispatcher::Dispatcher) for alerting:
//!
//! ```text
//! readers ─► normalize ─► skip known ─► batches ─► classifier ─► store ─► dispatcher
//!                │                                     │
//!                └─► rejected                          └─► failure queue
//! ```
//!
//! A per-record problem (bad payload, oracle failure, unparseable reply)
//! never aborts the run; it is recorded in the [`RunSummary`] and, for
//! classification failures, in the store's failure queue. Only one run is
//! in flight per [`Pipeline`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use database::{ResultStore, StoreConfig};
//! use dispatcher::{Dispatcher, DispatcherConfig};
//! use ingester::CorpusFileReader;
//! use openai_oracle::OpenAiClassifier;
//! use pipeline::{Pipeline, PipelineConfig, RunRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ResultStore::open(StoreConfig::from_env()?).await?;
//! let dispatcher = Dispatcher::new(store.clone(), DispatcherConfig::default());
//! let classifier = Arc::new(OpenAiClassifier::from_env()?);
//!
//! let pipeline = Pipeline::new(classifier, store, dispatcher, PipelineConfig::default())
//!     .with_reader(CorpusFileReader::new("data/cadec.jsonl"));
//!
//! let summary = pipeline
//!     .run(RunRequest::manual().with_record_count(20), CancellationToken::new())
//!     .await?;
//! println!("{}: {} classified", summary.outcome, summary.classified);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod pipeline;
mod report;
mod run;

pub use config::{PipelineConfig, RetryPolicy};
pub use error::PipelineError;
pub use pipeline::Pipeline;
pub use report::{render_report, RunReporter, REPORT_ATTACHMENT};
pub use run::{
    AlertCounts, RecordResult, RecordStatus, RejectedRecord, RunOutcome, RunRequest, RunSummary,
    RunTrigger,
};
