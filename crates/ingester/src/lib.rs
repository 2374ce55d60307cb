//! Ingestion for the adverse event pipeline.
//!
//! Source readers pull raw records from their origin without interpreting
//! them; the [`normalize`] function is the only place that understands the
//! source-specific shapes and turns them into [`AdverseEventRecord`]s.
//!
//! | Reader | Origin | Transport |
//! |--------|--------|-----------|
//! | [`CorpusFileReader`] | adverse event corpus (CADEC) | JSON-lines file |
//! | [`OpenFdaReader`] | openFDA drug event export | paginated HTTP API |
//! | [`LiteratureFeedReader`] | literature / abstract feed | paginated HTTP API |
//!
//! # Example
//!
//! ```no_run
//! use ingester::{normalize, CorpusFileReader, SourceReader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = CorpusFileReader::new("data/cadec.jsonl");
//! for raw in reader.read(10).await? {
//!     match normalize(&raw, reader.source_tag()) {
//!         Ok(record) => println!("{} {}", record.record_id(), record.drug_name()),
//!         Err(e) => eprintln!("skipping {}: {}", raw.origin, e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`AdverseEventRecord`]: event_core::AdverseEventRecord

mod config;
mod corpus;
mod error;
mod literature;
mod normalizer;
mod openfda;
mod reader;

pub use config::ReaderConfig;
pub use corpus::CorpusFileReader;
pub use error::{NormalizeError, ReaderError, ValidationError};
pub use literature::LiteratureFeedReader;
pub use normalizer::{normalize, normalize_at};
pub use openfda::OpenFdaReader;
pub use reader::{RawRecord, SourceReader};
