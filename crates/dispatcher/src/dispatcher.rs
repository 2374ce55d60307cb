//! Drives alerts through their delivery states.

use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;

use chrono::Utc;
use database::ResultStore;
use discord_webhook::{DiscordClient, WebhookConfig};
use event_core::{AdverseEventRecord, AlertEvent, DeliveryStatus, SeverityVerdict, SinkKind};
use mailer::{parse_recipients, Mailer, MailerConfig};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::config::DispatcherConfig;
use crate::digest::urgent_digest;
use crate::error::{DispatchError, SinkError};
use crate::message::AlertMessage;
use crate::sink::{AlertSink, DiscordSink, EmailSink};

/// Failed alerts examined per `retry_failed` pass.
const RETRY_BATCH: i64 = 500;

/// What a retry pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryReport {
    /// Interrupted claims moved back to `failed`.
    pub released: u64,
    pub sent: Vec<AlertEvent>,
    pub failed: Vec<AlertEvent>,
    pub abandoned: Vec<AlertEvent>,
}

/// Sends threshold-crossing verdicts to the configured sinks, once each.
///
/// Every `(record_id, sink)` pair gets one alert row. Delivery happens only
/// after the row is claimed (`pending` → `dispatching`), so concurrent
/// dispatchers over the same store never deliver the same alert twice.
#[derive(Clone)]
pub struct Dispatcher {
    store: ResultStore,
    sinks: BTreeMap<SinkKind, Arc<dyn AlertSink>>,
    config: DispatcherConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sinks", &self.sinks.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// A dispatcher with no sinks.
    pub fn new(store: ResultStore, config: DispatcherConfig) -> Self {
        Self {
            store,
            sinks: BTreeMap::new(),
            config,
        }
    }

    /// Register a sink, replacing any sink of the same kind.
    pub fn with_sink(self, sink: impl AlertSink + 'static) -> Self {
        self.with_shared_sink(Arc::new(sink))
    }

    pub fn with_shared_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.insert(sink.kind(), sink);
        self
    }

    /// Build a dispatcher from environment variables.
    ///
    /// The Discord sink is enabled when `DISCORD_WEBHOOK_URL` is set; the
    /// email sink when `ALERT_EMAIL_TO` is set, which then requires the
    /// `SMTP_*` variables.
    pub fn from_env(store: ResultStore) -> Result<Self, DispatchError> {
        let mut dispatcher = Self::new(store, DispatcherConfig::from_env()?);

        match WebhookConfig::from_env() {
            Ok(config) => {
                let client = DiscordClient::new(config)
                    .map_err(|e| DispatchError::Config(e.to_string()))?;
                dispatcher = dispatcher.with_sink(DiscordSink::new(client));
            }
            Err(e) => info!("Discord alerts disabled: {}", e),
        }

        let recipients = env::var("ALERT_EMAIL_TO")
            .map(|v| parse_recipients(&v))
            .unwrap_or_default();
        if recipients.is_empty() {
            info!("Email alerts disabled: ALERT_EMAIL_TO is not set");
        } else {
            let mailer = MailerConfig::from_env()
                .and_then(Mailer::new)
                .map_err(|e| DispatchError::Config(e.to_string()))?;
            let sink = EmailSink::new(mailer, recipients)
                .map_err(|e| DispatchError::Config(e.to_string()))?;
            dispatcher = dispatcher.with_sink(sink);
        }

        Ok(dispatcher)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Registered sink kinds.
    pub fn sinks(&self) -> Vec<SinkKind> {
        self.sinks.keys().copied().collect()
    }

    /// Create and deliver the alerts a verdict calls for.
    ///
    /// Returns the current state of each alert the verdict maps to. An alert
    /// that already exists is not delivered again unless it is still
    /// `pending`; failed alerts are left to [`Dispatcher::retry_failed`].
    #[instrument(skip_all, fields(record_id = %record.record_id(), severity = %verdict.severity))]
    pub async fn evaluate_and_dispatch(
        &self,
        record: &AdverseEventRecord,
        verdict: &SeverityVerdict,
    ) -> Result<Vec<AlertEvent>, DispatchError> {
        let targets: Vec<SinkKind> = self
            .config
            .thresholds
            .sinks_for(verdict.severity)
            .into_iter()
            .filter(|sink| self.sinks.contains_key(sink))
            .collect();

        if targets.is_empty() {
            debug!("Below every alert threshold");
            return Ok(Vec::new());
        }

        let message = AlertMessage::new(record, verdict);
        let record_id = record.record_id();
        let mut events = Vec::with_capacity(targets.len());

        for sink in targets {
            if !self
                .store
                .insert_pending_alert(record_id, sink, verdict.severity)
                .await?
            {
                debug!(%sink, "Alert already recorded");
            }

            let event = match self.store.claim_alert(record_id, sink).await? {
                Some(claimed) => self.deliver(claimed, &message).await?,
                None => self.store.get_alert(record_id, sink).await?,
            };
            events.push(event);
        }

        Ok(events)
    }

    /// Post the urgent-case digest for `verdicts` to Discord.
    ///
    /// Digests have no alert row: a failed post is returned to the caller
    /// and never retried. Returns whether a digest was delivered; `false`
    /// when nothing is urgent or no Discord sink is registered.
    pub async fn send_urgent_digest<'a>(
        &self,
        verdicts: impl IntoIterator<Item = &'a SeverityVerdict>,
    ) -> Result<bool, SinkError> {
        let Some(sink) = self.sinks.get(&SinkKind::Discord) else {
            return Ok(false);
        };
        let Some(message) = urgent_digest(verdicts, Utc::now()) else {
            return Ok(false);
        };

        match tokio::time::timeout(self.config.send_timeout, sink.deliver(&message)).await {
            Ok(Ok(())) => {
                info!(subject = %message.subject, "Urgent digest delivered");
                Ok(true)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SinkError::Failed(format!(
                "digest timed out after {:?}",
                self.config.send_timeout
            ))),
        }
    }

    /// Re-drive failed and stranded alerts.
    ///
    /// Alerts with `attempts <= max_retries` are re-queued and delivered
    /// again; the rest are abandoned. Claims left in `dispatching` by an
    /// interrupted dispatcher are released to `failed` first. Alerts still
    /// `pending` (created but never claimed) are claimed and delivered last.
    /// Only alerts for registered sinks are examined.
    #[instrument(skip(self))]
    pub async fn retry_failed(&self) -> Result<RetryReport, DispatchError> {
        let mut report = RetryReport::default();
        let sinks = self.sinks();

        let stale = chrono::Duration::from_std(self.config.stale_claim_after)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        report.released = self.store.release_stale_claims(Utc::now() - stale).await?;
        if report.released > 0 {
            warn!(released = report.released, "Released interrupted alert claims");
        }

        let failed = self
            .store
            .list_alerts_for_sinks(DeliveryStatus::Failed, &sinks, RETRY_BATCH)
            .await?;

        for event in failed {
            if event.attempts > self.config.max_retries {
                let abandoned = self.store.abandon_alert(&event.record_id, event.sink).await?;
                error!(
                    record_id = %event.record_id,
                    sink = %event.sink,
                    attempts = event.attempts,
                    last_error = ?event.last_error,
                    "Alert abandoned after exhausting retries"
                );
                report.abandoned.push(abandoned);
                continue;
            }

            let Some(message) = self.message_for(&event.record_id).await? else {
                continue;
            };

            self.store.requeue_alert(&event.record_id, event.sink).await?;
            self.claim_and_deliver(&event, &message, &mut report).await?;
        }

        let pending = self
            .store
            .list_alerts_for_sinks(DeliveryStatus::Pending, &sinks, RETRY_BATCH)
            .await?;

        for event in pending {
            let Some(message) = self.message_for(&event.record_id).await? else {
                continue;
            };
            debug!(record_id = %event.record_id, sink = %event.sink, "Delivering stranded alert");
            self.claim_and_deliver(&event, &message, &mut report).await?;
        }

        info!(
            sent = report.sent.len(),
            failed = report.failed.len(),
            abandoned = report.abandoned.len(),
            "Alert retry pass complete"
        );
        Ok(report)
    }

    /// Render the alert for a stored record from its latest verdict.
    async fn message_for(&self, record_id: &str) -> Result<Option<AlertMessage>, DispatchError> {
        let detail = self.store.get(record_id).await?;
        let Some(verdict) = detail.verdicts.first() else {
            warn!(record_id, "Alert has no verdict to render");
            return Ok(None);
        };
        Ok(Some(AlertMessage::new(&detail.record, verdict)))
    }

    async fn claim_and_deliver(
        &self,
        event: &AlertEvent,
        message: &AlertMessage,
        report: &mut RetryReport,
    ) -> Result<(), DispatchError> {
        let Some(claimed) = self.store.claim_alert(&event.record_id, event.sink).await? else {
            // Another dispatcher took it.
            return Ok(());
        };

        let delivered = self.deliver(claimed, message).await?;
        match delivered.delivery_status {
            DeliveryStatus::Sent => report.sent.push(delivered),
            _ => report.failed.push(delivered),
        }
        Ok(())
    }

    /// Deliver a claimed alert and record the result.
    async fn deliver(&self, claimed: AlertEvent, message: &AlertMessage) -> Result<AlertEvent, DispatchError> {
        let record_id = claimed.record_id.as_str();
        let sink_kind = claimed.sink;

        let Some(sink) = self.sinks.get(&sink_kind) else {
            return Ok(self
                .store
                .mark_alert_failed(record_id, sink_kind, "no sink registered")
                .await?);
        };

        let outcome = tokio::time::timeout(self.config.send_timeout, sink.deliver(message)).await;

        let event = match outcome {
            Ok(Ok(())) => {
                info!(record_id, sink = %sink_kind, attempt = claimed.attempts, "Alert delivered");
                self.store.mark_alert_sent(record_id, sink_kind).await?
            }
            Ok(Err(e)) => {
                warn!(record_id, sink = %sink_kind, attempt = claimed.attempts, error = %e, "Alert delivery failed");
                self.store
                    .mark_alert_failed(record_id, sink_kind, &e.to_string())
                    .await?
            }
            Err(_) => {
                let reason = format!("delivery timed out after {:?}", self.config.send_timeout);
                warn!(record_id, sink = %sink_kind, attempt = claimed.attempts, "{}", reason);
                self.store.mark_alert_failed(record_id, sink_kind, &reason).await?
            }
        };

        Ok(event)
    }
}
