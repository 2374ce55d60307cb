//! The pipeline: ingest, classify, store and alert.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use database::{ResultStore, StoredResult};
use dispatcher::Dispatcher;
use event_core::{AdverseEventRecord, Classifier, ClassifyError, DeliveryStatus, SeverityVerdict};
use futures::stream::{self, StreamExt};
use ingester::{normalize, NormalizeError, SourceReader};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::report::RunReporter;
use crate::run::{
    decide_outcome, AlertCounts, RecordResult, RecordStatus, RejectedRecord, RunOutcome, RunRequest,
    RunSummary, RunTrigger,
};

/// Records read and normalized at the start of a run.
#[derive(Debug, Default)]
struct Ingested {
    read: usize,
    records: Vec<AdverseEventRecord>,
    rejected: Vec<RejectedRecord>,
    source_errors: Vec<String>,
}

/// What one batch produced.
#[derive(Debug, Default)]
struct BatchOutput {
    results: Vec<RecordResult>,
    stored: Vec<StoredResult>,
    alerts: AlertCounts,
}

/// Runs the adverse event pipeline.
///
/// At most one run is in flight per `Pipeline`; a second trigger while a
/// run holds the pipeline gets [`PipelineError::AlreadyRunning`].
pub struct Pipeline {
    readers: Vec<Box<dyn SourceReader>>,
    classifier: Arc<dyn Classifier>,
    store: ResultStore,
    dispatcher: Dispatcher,
    config: PipelineConfig,
    reporter: Option<RunReporter>,
    running: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<&str> = self.readers.iter().map(|r| r.source_tag()).collect();
        f.debug_struct("Pipeline")
            .field("sources", &sources)
            .field("classifier", &self.classifier.name())
            .field("model_version", &self.classifier.model_version())
            .field("config", &self.config)
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: ResultStore,
        dispatcher: Dispatcher,
        config: PipelineConfig,
    ) -> Self {
        Self {
            readers: Vec::new(),
            classifier,
            store,
            dispatcher,
            config,
            reporter: None,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_reader(mut self, reader: impl SourceReader + 'static) -> Self {
        self.readers.push(Box::new(reader));
        self
    }

    pub fn with_readers(mut self, readers: Vec<Box<dyn SourceReader>>) -> Self {
        self.readers.extend(readers);
        self
    }

    /// Email a report after every run that classified something.
    pub fn with_reporter(mut self, reporter: RunReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn model_version(&self) -> &str {
        self.classifier.model_version()
    }

    /// Whether a run currently holds the pipeline.
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    fn acquire(&self) -> Result<OwnedMutexGuard<()>, PipelineError> {
        Arc::clone(&self.running)
            .try_lock_owned()
            .map_err(|_| PipelineError::AlreadyRunning)
    }

    /// Execute one run to completion.
    pub async fn run(&self, request: RunRequest, cancel: CancellationToken) -> Result<RunSummary, PipelineError> {
        let guard = self.acquire()?;
        let run_id = Uuid::new_v4().to_string();
        self.execute(guard, run_id, request, cancel).await
    }

    /// Start a run in the background.
    ///
    /// The pipeline is claimed before this returns, so a concurrent trigger
    /// fails immediately instead of queueing.
    pub fn spawn(
        self: &Arc<Self>,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<(String, JoinHandle<Result<RunSummary, PipelineError>>), PipelineError> {
        let guard = self.acquire()?;
        let run_id = Uuid::new_v4().to_string();

        let pipeline = Arc::clone(self);
        let id = run_id.clone();
        let handle = tokio::spawn(async move { pipeline.execute(guard, id, request, cancel).await });

        Ok((run_id, handle))
    }

    /// Run every `every` until `cancel` fires. The first run starts immediately.
    pub async fn run_scheduled(&self, every: Duration, request: RunRequest, cancel: CancellationToken) {
        let request = RunRequest {
            trigger: RunTrigger::Scheduled,
            ..request
        };
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Scheduler started, interval {:?}", every);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!("Scheduler stopped");
                    return;
                }

                _ = ticker.tick() => {}
            }

            match self.run(request.clone(), cancel.child_token()).await {
                Ok(summary) => info!(
                    run_id = %summary.run_id,
                    outcome = %summary.outcome,
                    classified = summary.classified,
                    "Scheduled run finished"
                ),
                Err(PipelineError::AlreadyRunning) => {
                    warn!("Skipping scheduled run: another run is in progress")
                }
                Err(e) => error!("Scheduled run failed: {}", e),
            }
        }
    }

    async fn execute(
        &self,
        _guard: OwnedMutexGuard<()>,
        run_id: String,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunSummary, PipelineError> {
        let started_at = Utc::now();
        self.store
            .start_run(&run_id, request.trigger.as_str(), started_at)
            .await?;

        info!(
            run_id = %run_id,
            trigger = %request.trigger,
            model = %self.classifier.model_version(),
            "Pipeline run started"
        );

        match self.execute_inner(&run_id, &request, &cancel, started_at).await {
            Ok((summary, stored)) => {
                let value = serde_json::to_value(&summary).unwrap_or(serde_json::Value::Null);
                self.store
                    .finish_run(&run_id, summary.outcome.as_str(), summary.finished_at, &value)
                    .await?;

                info!(
                    run_id = %run_id,
                    outcome = %summary.outcome,
                    read = summary.read,
                    classified = summary.classified,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    rejected = summary.rejected.len(),
                    alerts_sent = summary.alerts.sent,
                    duration_ms = summary.duration_ms,
                    "Pipeline run finished"
                );

                if let Some(ref reporter) = self.reporter {
                    if summary.outcome != RunOutcome::Cancelled && !stored.is_empty() {
                        if let Err(e) = reporter.send(&summary, &stored).await {
                            warn!(run_id = %run_id, "Failed to send run report: {}", e);
                        }
                    }
                }

                Ok(summary)
            }
            Err(e) => {
                error!(run_id = %run_id, "Pipeline run aborted: {}", e);
                let detail = serde_json::json!({ "error": e.to_string() });
                if let Err(store_err) = self
                    .store
                    .finish_run(&run_id, RunOutcome::Failed.as_str(), Utc::now(), &detail)
                    .await
                {
                    warn!(run_id = %run_id, "Could not record aborted run: {}", store_err);
                }
                Err(e)
            }
        }
    }

    async fn execute_inner(
        &self,
        run_id: &str,
        request: &RunRequest,
        cancel: &CancellationToken,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<(RunSummary, Vec<StoredResult>), PipelineError> {
        let clock = Instant::now();
        let model_version = self.classifier.model_version().to_string();
        let mut alerts = AlertCounts::default();

        // Earlier failed deliveries go first so they are not starved by new ones.
        match self.dispatcher.retry_failed().await {
            Ok(report) => {
                alerts.sent += report.sent.len();
                alerts.failed += report.failed.len();
                alerts.abandoned += report.abandoned.len();
            }
            Err(e) => warn!("Alert retry pass failed: {}", e),
        }

        let limit = request
            .record_count
            .unwrap_or(self.config.default_record_count);
        let ingested = self.ingest(limit, cancel).await;

        let mut records: Vec<RecordResult> = Vec::new();
        let mut pending: Vec<AdverseEventRecord> = Vec::new();
        for record in ingested.records {
            if !request.reclassify && self.store.has_verdict(record.record_id(), &model_version).await? {
                debug!(record_id = %record.record_id(), "Already classified, skipping");
                records.push(RecordResult {
                    record_id: record.record_id().to_string(),
                    source: record.source(),
                    status: RecordStatus::Skipped,
                    attempts: 0,
                    elapsed_ms: 0,
                });
            } else {
                pending.push(record);
            }
        }

        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<Vec<AdverseEventRecord>> =
            pending.chunks(batch_size).map(|chunk| chunk.to_vec()).collect();

        info!(
            run_id = %run_id,
            pending = pending.len(),
            batches = batches.len(),
            "Classifying records"
        );

        let mut outputs: Vec<(usize, BatchOutput)> = stream::iter(batches.into_iter().enumerate())
            .map(|(idx, batch)| async move { (idx, self.process_batch(run_id, batch, cancel).await) })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        outputs.sort_by_key(|(idx, _)| *idx);

        let mut stored = Vec::new();
        for (_, output) in outputs {
            records.extend(output.results);
            stored.extend(output.stored);
            alerts.sent += output.alerts.sent;
            alerts.failed += output.alerts.failed;
        }

        if !cancel.is_cancelled() {
            match self
                .dispatcher
                .send_urgent_digest(stored.iter().map(|r| &r.verdict))
                .await
            {
                Ok(true) => alerts.digests += 1,
                Ok(false) => {}
                Err(e) => warn!(run_id = %run_id, "Urgent digest not delivered: {}", e),
            }
        }

        let count = |pred: fn(&RecordStatus) -> bool| records.iter().filter(|r| pred(&r.status)).count();
        let classified = count(|s| matches!(s, RecordStatus::Classified { .. }));
        let skipped = count(|s| matches!(s, RecordStatus::Skipped));
        let failed = count(|s| matches!(s, RecordStatus::Failed { .. }));

        let classified_ms: Vec<u64> = records
            .iter()
            .filter(|r| matches!(r.status, RecordStatus::Classified { .. }))
            .map(|r| r.elapsed_ms)
            .collect();
        let mean_record_ms = if classified_ms.is_empty() {
            None
        } else {
            Some(classified_ms.iter().sum::<u64>() as f64 / classified_ms.len() as f64)
        };

        let outcome = decide_outcome(
            cancel.is_cancelled(),
            &records,
            self.readers.len(),
            ingested.source_errors.len(),
            ingested.rejected.len(),
        );

        let summary = RunSummary {
            run_id: run_id.to_string(),
            trigger: request.trigger,
            outcome,
            model_version,
            started_at,
            finished_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
            read: ingested.read,
            classified,
            skipped,
            failed,
            rejected: ingested.rejected,
            source_errors: ingested.source_errors,
            alerts,
            mean_record_ms,
            records,
        };

        Ok((summary, stored))
    }

    /// Read every source and normalize what it returns.
    ///
    /// A failing source is reported and skipped; the others still run.
    async fn ingest(&self, limit: usize, cancel: &CancellationToken) -> Ingested {
        let mut ingested = Ingested::default();
        let mut seen: HashSet<String> = HashSet::new();

        for reader in &self.readers {
            let tag = reader.source_tag().to_string();

            let raws = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = reader.read(limit) => result,
            };

            let raws = match raws {
                Ok(raws) => raws,
                Err(e) => {
                    warn!(source = %tag, "Source read failed: {}", e);
                    ingested.source_errors.push(format!("{}: {}", tag, e));
                    continue;
                }
            };
            ingested.read += raws.len();

            for raw in &raws {
                match normalize(raw, &tag) {
                    Ok(record) => {
                        if seen.insert(record.record_id().to_string()) {
                            ingested.records.push(record);
                        } else {
                            debug!(record_id = %record.record_id(), "Duplicate record in run");
                        }
                    }
                    Err(NormalizeError::Validation(e)) => {
                        warn!(source = %tag, origin = %raw.origin, "Rejected record: {}", e);
                        ingested.rejected.push(RejectedRecord {
                            source: tag.clone(),
                            origin: raw.origin.clone(),
                            reason: e.to_string(),
                        });
                    }
                    Err(e @ NormalizeError::UnsupportedSource(_)) => {
                        error!(source = %tag, "Aborting source: {}", e);
                        ingested.source_errors.push(format!("{}: {}", tag, e));
                        break;
                    }
                }
            }
        }

        info!(
            read = ingested.read,
            records = ingested.records.len(),
            rejected = ingested.rejected.len(),
            "Ingestion finished"
        );
        ingested
    }

    async fn process_batch(
        &self,
        run_id: &str,
        batch: Vec<AdverseEventRecord>,
        cancel: &CancellationToken,
    ) -> BatchOutput {
        let mut output = BatchOutput::default();
        let clock = Instant::now();

        let outcomes = if cancel.is_cancelled() {
            batch.iter().map(|_| (Err(ClassifyError::Cancelled), 0)).collect()
        } else {
            self.classify_with_retry(&batch, cancel).await
        };

        let share_ms = clock.elapsed().as_millis() as u64 / batch.len().max(1) as u64;

        for (record, (result, attempts)) in batch.iter().zip(outcomes) {
            let status = match result {
                Ok(verdict) => match self.store_verdict(record, &verdict).await {
                    Ok(()) => {
                        self.dispatch(record, &verdict, &mut output.alerts).await;
                        let status = RecordStatus::Classified {
                            severity: verdict.severity,
                            model_version: verdict.model_version.clone(),
                        };
                        output.stored.push(StoredResult {
                            record: record.clone(),
                            verdict,
                        });
                        status
                    }
                    Err(e) => {
                        error!(record_id = %record.record_id(), "Failed to store verdict: {}", e);
                        let error = e.to_string();
                        self.queue_failure(run_id, record, "store", &error, attempts).await;
                        RecordStatus::Failed {
                            kind: "store".to_string(),
                            error,
                        }
                    }
                },
                Err(ClassifyError::Cancelled) => RecordStatus::Cancelled,
                Err(e) => {
                    warn!(
                        record_id = %record.record_id(),
                        attempts,
                        "Classification failed: {}", e
                    );
                    let error = e.to_string();
                    self.queue_failure(run_id, record, e.kind(), &error, attempts).await;
                    RecordStatus::Failed {
                        kind: e.kind().to_string(),
                        error,
                    }
                }
            };

            output.results.push(RecordResult {
                record_id: record.record_id().to_string(),
                source: record.source(),
                status,
                attempts,
                elapsed_ms: share_ms,
            });
        }

        output
    }

    /// Classify a batch, retrying records whose failure is transient.
    ///
    /// Returns one `(result, oracle calls)` pair per record, in batch order.
    async fn classify_with_retry(
        &self,
        batch: &[AdverseEventRecord],
        cancel: &CancellationToken,
    ) -> Vec<(Result<SeverityVerdict, ClassifyError>, u32)> {
        let policy = &self.config.retry;
        let mut outcomes: Vec<Result<SeverityVerdict, ClassifyError>> =
            batch.iter().map(|_| Err(ClassifyError::Cancelled)).collect();
        let mut attempts = vec![0u32; batch.len()];
        let mut pending: Vec<usize> = (0..batch.len()).collect();
        let mut retries = 0u32;

        loop {
            let subset: Vec<AdverseEventRecord> = pending.iter().map(|&i| batch[i].clone()).collect();
            let results = self.classify_once(&subset, cancel).await;

            let mut again = Vec::new();
            for (&i, result) in pending.iter().zip(results) {
                attempts[i] += 1;
                if matches!(&result, Err(e) if e.is_transient()) && policy.should_retry(retries) {
                    again.push(i);
                }
                outcomes[i] = result;
            }

            if again.is_empty() {
                break;
            }

            let delay = policy.delay_for_attempt(retries);
            retries += 1;
            warn!(
                records = again.len(),
                retry = retries,
                "Transient classification failure, retrying in {:?}", delay
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    for &i in &again {
                        outcomes[i] = Err(ClassifyError::Cancelled);
                    }
                    break;
                }
                () = tokio::time::sleep(delay) => {}
            }

            pending = again;
        }

        outcomes.into_iter().zip(attempts).collect()
    }

    /// Classify `records` once, bounded by the classify timeout.
    ///
    /// A classifier with a native batch call gets one call for the whole
    /// batch. Otherwise records are classified one by one, each under its
    /// own timeout, so verdicts that finished before cancellation are kept.
    async fn classify_once(
        &self,
        records: &[AdverseEventRecord],
        cancel: &CancellationToken,
    ) -> Vec<Result<SeverityVerdict, ClassifyError>> {
        if records.len() > 1 && self.classifier.supports_batch() {
            return self.classify_whole_batch(records, cancel).await;
        }

        let timeout = self.config.classify_timeout;
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(ClassifyError::Cancelled),
                result = tokio::time::timeout(timeout, self.classifier.classify(record)) => {
                    result.unwrap_or_else(|_| Err(ClassifyError::Timeout(timeout)))
                }
            };
            results.push(result);
        }

        results
    }

    async fn classify_whole_batch(
        &self,
        records: &[AdverseEventRecord],
        cancel: &CancellationToken,
    ) -> Vec<Result<SeverityVerdict, ClassifyError>> {
        let timeout = self.config.classify_timeout;
        let call = tokio::time::timeout(timeout, self.classifier.classify_batch(records));

        tokio::select! {
            biased;
            () = cancel.cancelled() => records.iter().map(|_| Err(ClassifyError::Cancelled)).collect(),
            result = call => match result {
                Ok(results) if results.len() == records.len() => results,
                Ok(results) => {
                    error!(
                        expected = records.len(),
                        got = results.len(),
                        "Classifier returned the wrong number of results"
                    );
                    records
                        .iter()
                        .map(|_| {
                            Err(ClassifyError::Oracle(format!(
                                "expected {} results, got {}",
                                records.len(),
                                results.len()
                            )))
                        })
                        .collect()
                }
                Err(_) => records.iter().map(|_| Err(ClassifyError::Timeout(timeout))).collect(),
            },
        }
    }

    async fn store_verdict(&self, record: &AdverseEventRecord, verdict: &SeverityVerdict) -> Result<(), PipelineError> {
        let outcome = self.store.upsert(record, verdict).await?;
        debug!(
            record_id = %record.record_id(),
            record_inserted = outcome.record_inserted,
            verdict = ?outcome.verdict,
            "Stored verdict"
        );
        Ok(())
    }

    async fn dispatch(&self, record: &AdverseEventRecord, verdict: &SeverityVerdict, counts: &mut AlertCounts) {
        match self.dispatcher.evaluate_and_dispatch(record, verdict).await {
            Ok(events) => {
                for event in events {
                    match event.delivery_status {
                        DeliveryStatus::Sent => counts.sent += 1,
                        DeliveryStatus::Failed => counts.failed += 1,
                        _ => {}
                    }
                }
            }
            Err(e) => warn!(record_id = %record.record_id(), "Alert dispatch failed: {}", e),
        }
    }

    /// Keep the record and put it in the failure queue for review.
    async fn queue_failure(&self, run_id: &str, record: &AdverseEventRecord, kind: &str, error: &str, attempts: u32) {
        if let Err(e) = self.store.insert_record(record).await {
            warn!(record_id = %record.record_id(), "Could not store failed record: {}", e);
            return;
        }
        if let Err(e) = self
            .store
            .record_failure(
                record.record_id(),
                self.classifier.model_version(),
                kind,
                error,
                attempts,
                Some(run_id),
            )
            .await
        {
            warn!(record_id = %record.record_id(), "Could not queue failure: {}", e);
        }
    }
}
