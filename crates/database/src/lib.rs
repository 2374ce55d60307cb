//! SQLite result store for the adverse event pipeline.
//!
//! This crate persists normalized records, severity verdicts, alert delivery
//! state, the classification failure queue and pipeline run history using
//! SQLx with SQLite. Each table has a module of free functions over a
//! `SqlitePool`; [`ResultStore`] wraps them with write timeouts and busy
//! retries for use by the pipeline.
//!
//! # Example
//!
//! ```no_run
//! use database::{ResultFilter, ResultStore, StoreConfig};
//! use event_core::Severity;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ResultStore::open(StoreConfig::from_env()?).await?;
//!
//!     let severe = store
//!         .query(&ResultFilter::new().min_severity(Severity::Severe).limit(20))
//!         .await?;
//!     for result in severe {
//!         println!("{} {}", result.record.record_id(), result.verdict.severity);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod error;
pub mod failure;
pub mod models;
pub mod query;
pub mod record;
pub mod run;
pub mod stats;
pub mod store;
pub mod verdict;

pub use error::{DatabaseError, Result};
pub use models::{
    FailureEntry, RecordDetail, RunEntry, StoredResult, UpsertOutcome, VerdictWrite,
};
pub use query::ResultFilter;
pub use stats::{LabelCount, SeverityCount, SourceCount, StatusCount, StoreStats};
pub use store::{ResultStore, StoreConfig, DEFAULT_SQLITE_PATH};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 8;

    /// How long SQLite waits on a locked database before reporting busy.
    const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/adverse_events.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, Self::DEFAULT_POOL_SIZE, Self::DEFAULT_BUSY_TIMEOUT).await
    }

    /// Connect with a custom SQLite busy timeout.
    pub async fn connect_with_busy_timeout(url: &str, busy_timeout: Duration) -> Result<Self> {
        Self::connect_with(url, Self::DEFAULT_POOL_SIZE, busy_timeout).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        Self::connect_with(url, pool_size, Self::DEFAULT_BUSY_TIMEOUT).await
    }

    async fn connect_with(url: &str, pool_size: u32, busy_timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
