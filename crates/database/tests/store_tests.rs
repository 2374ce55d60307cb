//! Result store behaviour against real SQLite databases.

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use database::{DatabaseError, ResultFilter, ResultStore, StoreConfig, VerdictWrite};
use event_core::{
    AdverseEventRecord, Confidence, DeliveryStatus, Severity, SeverityVerdict, SinkKind, Source,
};
use tokio::task::JoinSet;

async fn memory_store() -> ResultStore {
    ResultStore::open(StoreConfig::in_memory()).await.unwrap()
}

fn record_at(id: &str, source: Source, drug: &str, minutes: i64) -> AdverseEventRecord {
    let ingested = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + ChronoDuration::minutes(minutes);
    AdverseEventRecord::new(
        format!("{}:{}", source.as_str(), id),
        source,
        drug,
        "reaction text",
        None,
        format!(r#"{{"id": "{}",  "drug": "{}"}}"#, id, drug),
        ingested,
    )
}

fn verdict_for(record: &AdverseEventRecord, severity: Severity, confidence: f64, minutes: i64) -> SeverityVerdict {
    let at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap() + ChronoDuration::minutes(minutes);
    SeverityVerdict::new(
        record.record_id(),
        severity,
        Confidence::new(confidence).unwrap(),
        format!("{} because reasons", severity),
        "gpt-4o",
    )
    .with_classified_at(at)
}

#[tokio::test]
async fn test_identical_upsert_is_noop() {
    let store = memory_store().await;
    let record = record_at("1", Source::Corpus, "Aspirin", 0);
    let verdict = verdict_for(&record, Severity::Severe, 0.9, 0);

    let first = store.upsert(&record, &verdict).await.unwrap();
    assert!(first.record_inserted);
    assert_eq!(first.verdict, VerdictWrite::Inserted);

    let second = store.upsert(&record, &verdict).await.unwrap();
    assert!(second.is_noop());

    let detail = store.get(record.record_id()).await.unwrap();
    assert_eq!(detail.verdicts.len(), 1);
    assert_eq!(detail.verdicts[0], verdict);
    assert_eq!(detail.record, record);
}

#[tokio::test]
async fn test_last_write_wins_by_classified_at() {
    let store = memory_store().await;
    let record = record_at("1", Source::Corpus, "Aspirin", 0);

    let original = verdict_for(&record, Severity::Moderate, 0.6, 10);
    store.upsert(&record, &original).await.unwrap();

    // Older verdict is ignored.
    let older = verdict_for(&record, Severity::Critical, 0.99, 5);
    assert_eq!(store.upsert(&record, &older).await.unwrap().verdict, VerdictWrite::Unchanged);

    // Same timestamp, lower confidence: ignored.
    let tie_low = verdict_for(&record, Severity::Mild, 0.5, 10);
    assert_eq!(store.upsert(&record, &tie_low).await.unwrap().verdict, VerdictWrite::Unchanged);

    // Same timestamp, higher confidence: replaces.
    let tie_high = verdict_for(&record, Severity::Severe, 0.8, 10);
    assert_eq!(store.upsert(&record, &tie_high).await.unwrap().verdict, VerdictWrite::Replaced);

    // Newer: replaces.
    let newer = verdict_for(&record, Severity::Mild, 0.4, 20);
    assert_eq!(store.upsert(&record, &newer).await.unwrap().verdict, VerdictWrite::Replaced);

    let detail = store.get(record.record_id()).await.unwrap();
    assert_eq!(detail.verdicts, vec![newer]);
}

#[tokio::test]
async fn test_record_is_written_once() {
    let store = memory_store().await;
    let record = record_at("1", Source::Corpus, "Aspirin", 0);
    assert!(store.insert_record(&record).await.unwrap());

    let altered = AdverseEventRecord::new(
        record.record_id(),
        Source::Corpus,
        "Something else",
        "different",
        None,
        "{}",
        Utc::now(),
    );
    assert!(!store.insert_record(&altered).await.unwrap());

    let stored = store.get(record.record_id()).await.unwrap().record;
    assert_eq!(stored.raw_payload(), record.raw_payload());
    assert_eq!(stored.drug_name(), "Aspirin");
}

#[tokio::test]
async fn test_one_verdict_per_model_version() {
    let store = memory_store().await;
    let record = record_at("1", Source::Literature, "Metformin", 0);

    let mut a = verdict_for(&record, Severity::Mild, 0.5, 0);
    a.model_version = "gpt-4o".into();
    let mut b = verdict_for(&record, Severity::Severe, 0.9, 1);
    b.model_version = "gpt-4o-mini".into();

    store.upsert(&record, &a).await.unwrap();
    store.upsert(&record, &b).await.unwrap();

    let detail = store.get(record.record_id()).await.unwrap();
    assert_eq!(detail.verdicts.len(), 2);
    assert_eq!(detail.verdicts[0].model_version, "gpt-4o-mini");
    assert!(store.has_verdict(record.record_id(), "gpt-4o").await.unwrap());
    assert!(!store.has_verdict(record.record_id(), "gpt-5").await.unwrap());
}

#[tokio::test]
async fn test_mismatched_verdict_is_rejected() {
    let store = memory_store().await;
    let record = record_at("1", Source::Corpus, "Aspirin", 0);
    let other = record_at("2", Source::Corpus, "Aspirin", 0);
    let verdict = verdict_for(&other, Severity::Mild, 0.5, 0);

    assert!(matches!(
        store.upsert(&record, &verdict).await,
        Err(DatabaseError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_get_missing_record() {
    let store = memory_store().await;
    assert!(matches!(
        store.get("corpus:nope").await,
        Err(DatabaseError::NotFound { entity: "Record", .. })
    ));
}

#[tokio::test]
async fn test_query_filters_and_order() {
    let store = memory_store().await;

    let rows = [
        ("a", Source::Corpus, "Aspirin", Severity::Severe, 0),
        ("b", Source::Regulatory, "ASPIRIN", Severity::Critical, 1),
        ("c", Source::Literature, "Warfarin", Severity::Moderate, 2),
        ("d", Source::Corpus, "Warfarin", Severity::Severe, 3),
        ("e", Source::Corpus, "Lipitor", Severity::Mild, 4),
    ];
    for (id, source, drug, severity, minute) in rows {
        let record = record_at(id, source, drug, minute);
        store
            .upsert(&record, &verdict_for(&record, severity, 0.8, 0))
            .await
            .unwrap();
    }

    let ids = |results: Vec<database::StoredResult>| -> Vec<String> {
        results.into_iter().map(|r| r.record.record_id().to_string()).collect()
    };

    // Severity desc, then ingestion time desc.
    let all = store.query(&ResultFilter::new()).await.unwrap();
    assert_eq!(ids(all), vec!["regulatory:b", "corpus:d", "corpus:a", "literature:c", "corpus:e"]);

    let severe_up = store
        .query(&ResultFilter::new().min_severity(Severity::Severe))
        .await
        .unwrap();
    assert_eq!(severe_up.len(), 3);

    let band = store
        .query(
            &ResultFilter::new()
                .min_severity(Severity::Moderate)
                .max_severity(Severity::Severe),
        )
        .await
        .unwrap();
    assert_eq!(ids(band), vec!["corpus:d", "corpus:a", "literature:c"]);

    let aspirin = store.query(&ResultFilter::new().drug("aspirin")).await.unwrap();
    assert_eq!(ids(aspirin), vec!["regulatory:b", "corpus:a"]);

    let corpus = store
        .query(&ResultFilter::new().source(Source::Corpus).limit(2))
        .await
        .unwrap();
    assert_eq!(ids(corpus), vec!["corpus:d", "corpus:a"]);

    let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 3, 0).unwrap();
    let window = store
        .query(&ResultFilter::new().ingested_between(start, end))
        .await
        .unwrap();
    assert_eq!(ids(window), vec!["regulatory:b", "literature:c"]);

    let other_model = store
        .query(&ResultFilter::new().model_version("gpt-3.5"))
        .await
        .unwrap();
    assert!(other_model.is_empty());

    // Queries never remove anything.
    assert_eq!(store.query(&ResultFilter::new()).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_purge_before_cascades() {
    let store = memory_store().await;
    let old = record_at("old", Source::Corpus, "Aspirin", 0);
    let new = record_at("new", Source::Corpus, "Aspirin", 60);

    for record in [&old, &new] {
        store
            .upsert(record, &verdict_for(record, Severity::Critical, 0.9, 0))
            .await
            .unwrap();
        store
            .insert_pending_alert(record.record_id(), SinkKind::Email, Severity::Critical)
            .await
            .unwrap();
    }

    let cutoff = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    assert_eq!(store.purge_before(cutoff).await.unwrap(), 1);

    assert!(store.get(old.record_id()).await.is_err());
    assert!(matches!(
        store.get_alert(old.record_id(), SinkKind::Email).await,
        Err(DatabaseError::NotFound { .. })
    ));
    let kept = store.get(new.record_id()).await.unwrap();
    assert_eq!(kept.verdicts.len(), 1);
    assert_eq!(kept.alerts.len(), 1);
}

#[tokio::test]
async fn test_alert_state_machine() {
    let store = memory_store().await;
    let record = record_at("1", Source::Corpus, "Aspirin", 0);
    store.insert_record(&record).await.unwrap();
    let id = record.record_id();

    assert!(store.insert_pending_alert(id, SinkKind::Discord, Severity::Severe).await.unwrap());
    assert!(!store.insert_pending_alert(id, SinkKind::Discord, Severity::Severe).await.unwrap());

    let claimed = store.claim_alert(id, SinkKind::Discord).await.unwrap().unwrap();
    assert_eq!(claimed.delivery_status, DeliveryStatus::Dispatching);
    assert_eq!(claimed.attempts, 1);

    // Second claim loses.
    assert!(store.claim_alert(id, SinkKind::Discord).await.unwrap().is_none());

    let failed = store.mark_alert_failed(id, SinkKind::Discord, "webhook 500").await.unwrap();
    assert_eq!(failed.delivery_status, DeliveryStatus::Failed);
    assert_eq!(failed.last_error.as_deref(), Some("webhook 500"));

    // Failed alerts cannot be marked sent.
    assert!(matches!(
        store.mark_alert_sent(id, SinkKind::Discord).await,
        Err(DatabaseError::InvalidState { .. })
    ));

    store.requeue_alert(id, SinkKind::Discord).await.unwrap();
    let reclaimed = store.claim_alert(id, SinkKind::Discord).await.unwrap().unwrap();
    assert_eq!(reclaimed.attempts, 2);

    let sent = store.mark_alert_sent(id, SinkKind::Discord).await.unwrap();
    assert_eq!(sent.delivery_status, DeliveryStatus::Sent);
    assert!(sent.dispatched_at.is_some());
    assert!(sent.last_error.is_none());

    // Nothing moves a sent alert.
    assert!(store.claim_alert(id, SinkKind::Discord).await.unwrap().is_none());
    assert!(store.requeue_alert(id, SinkKind::Discord).await.is_err());

    let listed = store.list_alerts(Some(DeliveryStatus::Sent), 10).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_list_alerts_for_sinks() {
    let store = memory_store().await;
    for i in 1..=3 {
        let record = record_at(&i.to_string(), Source::Corpus, "Aspirin", 0);
        store.insert_record(&record).await.unwrap();
        store
            .insert_pending_alert(record.record_id(), SinkKind::Discord, Severity::Critical)
            .await
            .unwrap();
        store
            .insert_pending_alert(record.record_id(), SinkKind::Email, Severity::Critical)
            .await
            .unwrap();
    }

    let email = store
        .list_alerts_for_sinks(DeliveryStatus::Pending, &[SinkKind::Email], 10)
        .await
        .unwrap();
    assert_eq!(email.len(), 3);
    assert!(email.iter().all(|a| a.sink == SinkKind::Email));

    let both = store
        .list_alerts_for_sinks(DeliveryStatus::Pending, &[SinkKind::Discord, SinkKind::Email], 10)
        .await
        .unwrap();
    assert_eq!(both.len(), 6);

    assert!(store
        .list_alerts_for_sinks(DeliveryStatus::Pending, &[], 10)
        .await
        .unwrap()
        .is_empty());
    assert!(store
        .list_alerts_for_sinks(DeliveryStatus::Failed, &[SinkKind::Email], 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_abandon_and_stale_claims() {
    let store = memory_store().await;
    let record = record_at("1", Source::Corpus, "Aspirin", 0);
    store.insert_record(&record).await.unwrap();
    let id = record.record_id();

    store.insert_pending_alert(id, SinkKind::Email, Severity::Critical).await.unwrap();
    store.claim_alert(id, SinkKind::Email).await.unwrap().unwrap();

    // A claim left behind by a crashed dispatcher.
    let released = store
        .release_stale_claims(Utc::now() + ChronoDuration::seconds(1))
        .await
        .unwrap();
    assert_eq!(released, 1);
    let failed = store.get_alert(id, SinkKind::Email).await.unwrap();
    assert_eq!(failed.delivery_status, DeliveryStatus::Failed);

    let abandoned = store.abandon_alert(id, SinkKind::Email).await.unwrap();
    assert_eq!(abandoned.delivery_status, DeliveryStatus::Abandoned);
    assert!(abandoned.delivery_status.is_terminal());
}

#[tokio::test]
async fn test_failure_queue_cleared_by_verdict() {
    let store = memory_store().await;
    let record = record_at("1", Source::Corpus, "Aspirin", 0);
    store.insert_record(&record).await.unwrap();

    store
        .record_failure(record.record_id(), "gpt-4o", "parse", "missing field: severity", 1, Some("run-1"))
        .await
        .unwrap();
    store
        .record_failure(record.record_id(), "gpt-4o", "oracle", "503", 3, Some("run-2"))
        .await
        .unwrap();

    let failures = store.list_failures(10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, "oracle");
    assert_eq!(failures[0].attempts, 4);
    assert_eq!(failures[0].run_id.as_deref(), Some("run-2"));

    store
        .upsert(&record, &verdict_for(&record, Severity::Mild, 0.5, 0))
        .await
        .unwrap();
    assert!(store.list_failures(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_history() {
    let store = memory_store().await;
    let started = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

    store.start_run("run-1", "manual", started).await.unwrap();
    assert!(matches!(
        store.start_run("run-1", "manual", started).await,
        Err(DatabaseError::AlreadyExists { .. })
    ));
    assert_eq!(store.get_run("run-1").await.unwrap().outcome, "running");

    let summary = serde_json::json!({"classified": 3, "failed": 0});
    store
        .finish_run("run-1", "completed", started + ChronoDuration::seconds(42), &summary)
        .await
        .unwrap();

    store
        .start_run("run-2", "scheduled", started + ChronoDuration::hours(1))
        .await
        .unwrap();

    let runs = store.list_runs(10).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, "run-2");
    assert_eq!(runs[1].outcome, "completed");
    assert_eq!(runs[1].summary, Some(summary));

    assert!(matches!(
        store.finish_run("missing", "completed", started, &serde_json::json!({})).await,
        Err(DatabaseError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_stats() {
    let store = memory_store().await;

    let rows = [
        ("a", Source::Corpus, Severity::Critical, Some("Hematologic"), Some("immediate")),
        ("b", Source::Corpus, Severity::Severe, Some("hematologic "), Some("urgent")),
        ("c", Source::Regulatory, Severity::Mild, None, Some("routine")),
    ];
    for (id, source, severity, category, urgency) in rows {
        let record = record_at(id, source, "Aspirin", 0);
        let mut verdict = verdict_for(&record, severity, 0.7, 0);
        verdict.category = category.map(String::from);
        verdict.urgency = urgency.map(String::from);
        store.upsert(&record, &verdict).await.unwrap();
    }
    let unclassified = record_at("d", Source::Literature, "Aspirin", 0);
    store.insert_record(&unclassified).await.unwrap();
    store
        .insert_pending_alert("corpus:a", SinkKind::Email, Severity::Critical)
        .await
        .unwrap();

    let stats = store.stats(Severity::Severe, None).await.unwrap();
    assert_eq!(stats.total_records, 4);
    assert_eq!(stats.classified_records, 3);
    assert_eq!(stats.at_or_above_threshold, 2);
    // (5 + 4 + 2) / 3
    let mean = stats.mean_severity_score.unwrap();
    assert!((mean - 11.0 / 3.0).abs() < 1e-9);

    let corpus = stats
        .records_by_source
        .iter()
        .find(|c| c.source == Source::Corpus)
        .unwrap();
    assert_eq!(corpus.records, 2);
    let literature = stats
        .records_by_source
        .iter()
        .find(|c| c.source == Source::Literature)
        .unwrap();
    assert_eq!(literature.records, 1);

    assert_eq!(stats.verdicts_by_severity[0].severity, Severity::Critical);
    assert_eq!(stats.verdicts_by_severity[0].verdicts, 1);
    let pending = stats
        .alerts_by_status
        .iter()
        .find(|c| c.status == DeliveryStatus::Pending)
        .unwrap();
    assert_eq!(pending.alerts, 1);

    let categories: Vec<(&str, i64)> = stats
        .verdicts_by_category
        .iter()
        .map(|c| (c.label.as_str(), c.verdicts))
        .collect();
    assert_eq!(categories, vec![("hematologic", 2), ("unspecified", 1)]);
    let urgencies: Vec<(&str, i64)> = stats
        .verdicts_by_urgency
        .iter()
        .map(|c| (c.label.as_str(), c.verdicts))
        .collect();
    assert_eq!(urgencies, vec![("immediate", 1), ("routine", 1), ("urgent", 1)]);

    let none = store.stats(Severity::Severe, Some("other-model")).await.unwrap();
    assert_eq!(none.classified_records, 0);
    assert!(none.mean_severity_score.is_none());
    assert!(none.verdicts_by_category.is_empty());
}

#[tokio::test]
async fn test_concurrent_writers_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::default().with_path(dir.path().join("store.db"));
    let store = ResultStore::open(config).await.unwrap();

    let record = record_at("shared", Source::Corpus, "Aspirin", 0);
    let mut tasks = JoinSet::new();

    for i in 0..16 {
        let store = store.clone();
        let record = record.clone();
        tasks.spawn(async move {
            let verdict = verdict_for(&record, Severity::Moderate, 0.5 + (i as f64) / 100.0, i);
            store.upsert(&record, &verdict).await
        });
    }

    let mut inserted = 0;
    while let Some(result) = tasks.join_next().await {
        let outcome = result.unwrap().unwrap();
        if outcome.record_inserted {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);

    // The newest verdict wins regardless of arrival order.
    let detail = store.get(record.record_id()).await.unwrap();
    assert_eq!(detail.verdicts.len(), 1);
    assert_eq!(detail.verdicts[0].classified_at, verdict_for(&record, Severity::Moderate, 0.5, 15).classified_at);
}

#[tokio::test]
async fn test_concurrent_claims_single_winner() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::default().with_path(dir.path().join("alerts.db"));
    let store = ResultStore::open(config).await.unwrap();

    let record = record_at("1", Source::Corpus, "Aspirin", 0);
    store.insert_record(&record).await.unwrap();
    store
        .insert_pending_alert(record.record_id(), SinkKind::Email, Severity::Critical)
        .await
        .unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let store = store.clone();
        let id = record.record_id().to_string();
        tasks.spawn(async move { store.claim_alert(&id, SinkKind::Email).await });
    }

    let mut winners = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap().unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}
