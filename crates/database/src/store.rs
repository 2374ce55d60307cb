//! The result store: bounded, retried writes over [`Database`].

use std::env;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use event_core::{
    AdverseEventRecord, AlertEvent, DeliveryStatus, Severity, SeverityVerdict, SinkKind,
};
use tracing::warn;

use crate::error::{DatabaseError, Result};
use crate::models::{FailureEntry, RecordDetail, RunEntry, StoredResult, UpsertOutcome};
use crate::query::ResultFilter;
use crate::stats::StoreStats;
use crate::{alert, failure, query, record, run, stats, verdict, Database};

/// Default database file.
pub const DEFAULT_SQLITE_PATH: &str = "data/adverse_events.db";

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// SQLite file, or `:memory:`.
    pub path: PathBuf,
    /// Upper bound on a single write, including lock waits.
    pub write_timeout: Duration,
    /// Extra attempts for writes that hit a busy or locked database.
    pub write_retries: u32,
    /// First delay between busy retries; doubles each attempt.
    pub retry_delay: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SQLITE_PATH),
            write_timeout: Duration::from_secs(5),
            write_retries: 3,
            retry_delay: Duration::from_millis(50),
        }
    }
}

impl StoreConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `SQLITE_PATH` - Default: data/adverse_events.db
    /// - `STORE_WRITE_TIMEOUT_SECS` - Default: 5
    /// - `STORE_WRITE_RETRIES` - Default: 3
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let path = env::var("SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.path);

        let write_timeout = match env::var("STORE_WRITE_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.trim().parse().map_err(|_| {
                DatabaseError::Config(format!("invalid STORE_WRITE_TIMEOUT_SECS: {:?}", v))
            })?),
            Err(_) => defaults.write_timeout,
        };

        let write_retries = match env::var("STORE_WRITE_RETRIES") {
            Ok(v) => v.trim().parse().map_err(|_| {
                DatabaseError::Config(format!("invalid STORE_WRITE_RETRIES: {:?}", v))
            })?,
            Err(_) => defaults.write_retries,
        };

        Ok(Self {
            path,
            write_timeout,
            write_retries,
            retry_delay: defaults.retry_delay,
        })
    }

    /// In-memory database, for tests.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_write_retries(mut self, retries: u32) -> Self {
        self.write_retries = retries;
        self
    }

    /// SQLx connection URL for `path`.
    pub fn database_url(&self) -> String {
        if self.path.as_os_str() == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", self.path.display())
        }
    }
}

/// Record, verdict, alert, failure and run storage for the pipeline.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ResultStore {
    db: Database,
    config: StoreConfig,
}

impl ResultStore {
    /// Connect and run migrations.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() && config.path.as_os_str() != ":memory:" {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Config(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let db = Database::connect_with_busy_timeout(&config.database_url(), config.write_timeout).await?;
        db.migrate().await?;
        Ok(Self { db, config })
    }

    /// Wrap an already-migrated database.
    pub fn with_database(db: Database, config: StoreConfig) -> Self {
        Self { db, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Run a write with the configured timeout, retrying busy errors.
    async fn write<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match tokio::time::timeout(self.config.write_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if e.is_busy() && attempt < self.config.write_retries => {
                    let delay = self.config.retry_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Database busy, retrying write"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(DatabaseError::Timeout {
                        operation,
                        after: self.config.write_timeout,
                    })
                }
            }
        }
    }

    // Records and verdicts

    pub async fn upsert(&self, record: &AdverseEventRecord, verdict: &SeverityVerdict) -> Result<UpsertOutcome> {
        self.write("upsert", || verdict::upsert(self.db.pool(), record, verdict))
            .await
    }

    /// Store a record without a verdict (e.g. one that failed classification).
    pub async fn insert_record(&self, record: &AdverseEventRecord) -> Result<bool> {
        self.write("insert_record", || record::insert_record(self.db.pool(), record))
            .await
    }

    pub async fn query(&self, filter: &ResultFilter) -> Result<Vec<StoredResult>> {
        query::query(self.db.pool(), filter).await
    }

    /// A record with all its verdicts and alert events.
    pub async fn get(&self, record_id: &str) -> Result<RecordDetail> {
        let pool = self.db.pool();
        let record = record::get_record(pool, record_id).await?;
        let verdicts = verdict::verdicts_for_record(pool, record_id).await?;
        let alerts = alert::alerts_for_record(pool, record_id).await?;
        Ok(RecordDetail {
            record,
            verdicts,
            alerts,
        })
    }

    pub async fn has_verdict(&self, record_id: &str, model_version: &str) -> Result<bool> {
        verdict::has_verdict(self.db.pool(), record_id, model_version).await
    }

    pub async fn latest_verdict(&self, record_id: &str) -> Result<Option<SeverityVerdict>> {
        verdict::latest_verdict(self.db.pool(), record_id).await
    }

    /// Explicitly delete everything ingested before `cutoff`.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.write("purge_before", || record::purge_before(self.db.pool(), cutoff))
            .await
    }

    // Alerts

    pub async fn insert_pending_alert(
        &self,
        record_id: &str,
        sink: SinkKind,
        severity: Severity,
    ) -> Result<bool> {
        self.write("insert_pending_alert", || {
            alert::insert_pending(self.db.pool(), record_id, sink, severity, Utc::now())
        })
        .await
    }

    pub async fn claim_alert(&self, record_id: &str, sink: SinkKind) -> Result<Option<AlertEvent>> {
        self.write("claim_alert", || alert::claim(self.db.pool(), record_id, sink, Utc::now()))
            .await
    }

    pub async fn mark_alert_sent(&self, record_id: &str, sink: SinkKind) -> Result<AlertEvent> {
        self.write("mark_alert_sent", || {
            alert::mark_sent(self.db.pool(), record_id, sink, Utc::now())
        })
        .await
    }

    pub async fn mark_alert_failed(&self, record_id: &str, sink: SinkKind, error: &str) -> Result<AlertEvent> {
        self.write("mark_alert_failed", || {
            alert::mark_failed(self.db.pool(), record_id, sink, error, Utc::now())
        })
        .await
    }

    pub async fn requeue_alert(&self, record_id: &str, sink: SinkKind) -> Result<AlertEvent> {
        self.write("requeue_alert", || alert::requeue(self.db.pool(), record_id, sink, Utc::now()))
            .await
    }

    pub async fn abandon_alert(&self, record_id: &str, sink: SinkKind) -> Result<AlertEvent> {
        self.write("abandon_alert", || alert::abandon(self.db.pool(), record_id, sink, Utc::now()))
            .await
    }

    pub async fn release_stale_claims(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.write("release_stale_claims", || {
            alert::release_stale_claims(self.db.pool(), cutoff)
        })
        .await
    }

    pub async fn get_alert(&self, record_id: &str, sink: SinkKind) -> Result<AlertEvent> {
        alert::get_alert(self.db.pool(), record_id, sink).await
    }

    pub async fn list_alerts(&self, status: Option<DeliveryStatus>, limit: i64) -> Result<Vec<AlertEvent>> {
        alert::list_alerts(self.db.pool(), status, limit).await
    }

    pub async fn list_alerts_for_sinks(
        &self,
        status: DeliveryStatus,
        sinks: &[SinkKind],
        limit: i64,
    ) -> Result<Vec<AlertEvent>> {
        alert::list_for_sinks(self.db.pool(), status, sinks, limit).await
    }

    // Failure queue

    pub async fn record_failure(
        &self,
        record_id: &str,
        model_version: &str,
        kind: &str,
        error: &str,
        attempts: u32,
        run_id: Option<&str>,
    ) -> Result<()> {
        self.write("record_failure", || {
            failure::record_failure(
                self.db.pool(),
                record_id,
                model_version,
                kind,
                error,
                attempts,
                run_id,
                Utc::now(),
            )
        })
        .await
    }

    pub async fn list_failures(&self, limit: i64) -> Result<Vec<FailureEntry>> {
        failure::list_failures(self.db.pool(), limit).await
    }

    // Runs

    pub async fn start_run(&self, run_id: &str, trigger: &str, started_at: DateTime<Utc>) -> Result<()> {
        self.write("start_run", || run::start_run(self.db.pool(), run_id, trigger, started_at))
            .await
    }

    pub async fn finish_run(
        &self,
        run_id: &str,
        outcome: &str,
        finished_at: DateTime<Utc>,
        summary: &serde_json::Value,
    ) -> Result<()> {
        self.write("finish_run", || {
            run::finish_run(self.db.pool(), run_id, outcome, finished_at, summary)
        })
        .await
    }

    pub async fn list_runs(&self, limit: i64) -> Result<Vec<RunEntry>> {
        run::list_runs(self.db.pool(), limit).await
    }

    pub async fn get_run(&self, run_id: &str) -> Result<RunEntry> {
        run::get_run(self.db.pool(), run_id).await
    }

    // Statistics

    pub async fn stats(&self, threshold: Severity, model_version: Option<&str>) -> Result<StoreStats> {
        stats::stats(self.db.pool(), threshold, model_version).await
    }
}
