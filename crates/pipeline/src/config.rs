//! Pipeline configuration.

use std::env;
use std::time::Duration;

use crate::error::PipelineError;

/// Backoff for transient oracle failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate delay before retry number `retry` (0-based).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(retry as i32);
        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }

    /// Whether another retry is allowed after `retries` retries.
    pub fn should_retry(&self, retries: u32) -> bool {
        retries < self.max_retries
    }
}

/// Configuration shared by every run of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Records per oracle request.
    pub batch_size: usize,
    /// Oracle requests in flight at once.
    pub concurrency: usize,
    /// Bound on a single oracle request.
    pub classify_timeout: Duration,
    pub retry: RetryPolicy,
    /// Records read from each source when a run does not say.
    pub default_record_count: usize,
    /// Run report recipients; empty disables the report.
    pub report_recipients: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            concurrency: 4,
            classify_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            default_record_count: 10,
            report_recipients: Vec::new(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, PipelineError> {
    match env::var(var) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PipelineError::Config(format!("invalid {}: {:?}", var, v))),
        Err(_) => Ok(None),
    }
}

impl PipelineConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `PIPELINE_BATCH_SIZE` - Default: 5
    /// - `PIPELINE_CONCURRENCY` - Default: 4
    /// - `PIPELINE_CLASSIFY_TIMEOUT_SECS` - Default: 60
    /// - `PIPELINE_ORACLE_MAX_RETRIES` - Default: 3
    /// - `PIPELINE_RETRY_INITIAL_MS` - Default: 500
    /// - `PIPELINE_RETRY_MAX_MS` - Default: 10000
    /// - `PIPELINE_RECORD_COUNT` - Default: 10
    /// - `REPORT_EMAIL_TO` - comma separated; unset disables the run report
    pub fn from_env() -> Result<Self, PipelineError> {
        let defaults = Self::default();

        let config = Self {
            batch_size: parse_var("PIPELINE_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            concurrency: parse_var("PIPELINE_CONCURRENCY")?.unwrap_or(defaults.concurrency),
            classify_timeout: parse_var("PIPELINE_CLASSIFY_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.classify_timeout),
            retry: RetryPolicy {
                max_retries: parse_var("PIPELINE_ORACLE_MAX_RETRIES")?
                    .unwrap_or(defaults.retry.max_retries),
                initial_delay: parse_var("PIPELINE_RETRY_INITIAL_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.initial_delay),
                max_delay: parse_var("PIPELINE_RETRY_MAX_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.max_delay),
                backoff_multiplier: defaults.retry.backoff_multiplier,
            },
            default_record_count: parse_var("PIPELINE_RECORD_COUNT")?
                .unwrap_or(defaults.default_record_count),
            report_recipients: env::var("REPORT_EMAIL_TO")
                .map(|v| mailer::parse_recipients(&v))
                .unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch size must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(PipelineError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(10));

        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::none().should_retry(0));
    }

    #[test]
    fn test_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
        assert!(PipelineConfig::default().with_batch_size(0).validate().is_err());
        assert!(PipelineConfig::default().with_concurrency(0).validate().is_err());
    }

    // Env vars are process-global; keep every scenario in one test.
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        const VARS: [&str; 8] = [
            "PIPELINE_BATCH_SIZE",
            "PIPELINE_CONCURRENCY",
            "PIPELINE_CLASSIFY_TIMEOUT_SECS",
            "PIPELINE_ORACLE_MAX_RETRIES",
            "PIPELINE_RETRY_INITIAL_MS",
            "PIPELINE_RETRY_MAX_MS",
            "PIPELINE_RECORD_COUNT",
            "REPORT_EMAIL_TO",
        ];
        for var in VARS {
            std::env::remove_var(var);
        }
        assert_eq!(PipelineConfig::from_env().unwrap(), PipelineConfig::default());

        std::env::set_var("PIPELINE_BATCH_SIZE", "10");
        std::env::set_var("PIPELINE_ORACLE_MAX_RETRIES", "1");
        std::env::set_var("PIPELINE_RETRY_INITIAL_MS", "20");
        std::env::set_var("REPORT_EMAIL_TO", "qa@example.org, safety@example.org");
        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(20));
        assert_eq!(config.report_recipients, vec!["qa@example.org", "safety@example.org"]);

        std::env::set_var("PIPELINE_CONCURRENCY", "0");
        assert!(PipelineConfig::from_env().is_err());
        std::env::set_var("PIPELINE_CONCURRENCY", "lots");
        assert!(PipelineConfig::from_env().is_err());

        for var in VARS {
            std::env::remove_var(var);
        }
    }
}
