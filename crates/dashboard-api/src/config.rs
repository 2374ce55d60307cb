//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

use event_core::Severity;

/// Dashboard API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// Severity counted as critical in `/api/stats` when the request does not say.
    pub stats_threshold: Severity,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `DASHBOARD_ADDR` | Server bind address | `127.0.0.1:8790` |
    /// | `DASHBOARD_CRITICAL_SEVERITY` | Stats threshold | `severe` |
    ///
    /// The store, sources, oracle and sinks read their own variables
    /// (`SQLITE_PATH`, `CORPUS_PATH`, `OPENAI_API_KEY`, ...).
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("DASHBOARD_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8790".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let stats_threshold = match env::var("DASHBOARD_CRITICAL_SEVERITY") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidSeverity(value))?,
            Err(_) => Severity::Severe,
        };

        Ok(Self {
            addr,
            stats_threshold,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid DASHBOARD_ADDR format")]
    InvalidAddr,

    #[error("Invalid DASHBOARD_CRITICAL_SEVERITY: {0}")]
    InvalidSeverity(String),
}
