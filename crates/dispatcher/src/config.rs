//! Dispatcher configuration.

use std::env;
use std::time::Duration;

use crate::error::DispatchError;
use crate::threshold::ThresholdTable;

/// Configuration for the alert dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Minimum severity per sink.
    pub thresholds: ThresholdTable,
    /// Re-deliveries after the first attempt before an alert is abandoned.
    pub max_retries: u32,
    /// Bound on a single delivery.
    pub send_timeout: Duration,
    /// A `dispatching` claim older than this is treated as interrupted.
    pub stale_claim_after: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::default(),
            max_retries: 3,
            send_timeout: Duration::from_secs(10),
            stale_claim_after: Duration::from_secs(300),
        }
    }
}

impl DispatcherConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `ALERT_THRESHOLDS` - Default: discord:moderate,email:severe
    /// - `ALERT_MAX_RETRIES` - Default: 3
    /// - `ALERT_SEND_TIMEOUT_SECS` - Default: 10
    pub fn from_env() -> Result<Self, DispatchError> {
        let defaults = Self::default();

        let thresholds = match env::var("ALERT_THRESHOLDS") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.thresholds,
        };

        let max_retries = match env::var("ALERT_MAX_RETRIES") {
            Ok(v) => v.trim().parse().map_err(|_| {
                DispatchError::Config(format!("invalid ALERT_MAX_RETRIES: {:?}", v))
            })?,
            Err(_) => defaults.max_retries,
        };

        let send_timeout = match env::var("ALERT_SEND_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.trim().parse().map_err(|_| {
                DispatchError::Config(format!("invalid ALERT_SEND_TIMEOUT_SECS: {:?}", v))
            })?),
            Err(_) => defaults.send_timeout,
        };

        Ok(Self {
            thresholds,
            max_retries,
            send_timeout,
            stale_claim_after: defaults.stale_claim_after,
        })
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_core::{Severity, SinkKind};

    // Env vars are process-global; keep every scenario in one test.
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        const VARS: [&str; 3] = ["ALERT_THRESHOLDS", "ALERT_MAX_RETRIES", "ALERT_SEND_TIMEOUT_SECS"];
        for var in VARS {
            std::env::remove_var(var);
        }
        assert_eq!(DispatcherConfig::from_env().unwrap(), DispatcherConfig::default());

        std::env::set_var("ALERT_THRESHOLDS", "discord:critical,email:severe");
        std::env::set_var("ALERT_MAX_RETRIES", "5");
        std::env::set_var("ALERT_SEND_TIMEOUT_SECS", "3");
        let config = DispatcherConfig::from_env().unwrap();
        assert_eq!(config.thresholds.minimum(SinkKind::Discord), Some(Severity::Critical));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.send_timeout, Duration::from_secs(3));

        std::env::set_var("ALERT_THRESHOLDS", "pager:critical");
        assert!(DispatcherConfig::from_env().is_err());

        for var in VARS {
            std::env::remove_var(var);
        }
    }
}
