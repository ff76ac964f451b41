//! # Controller Configuration
//!
//! Controller-level settings loaded once from environment variables at startup
//! and handed to the components that need them. Nothing here is global.

use std::time::Duration;

use tracing::warn;

use crate::constants::{
    DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_START_MS, DEFAULT_METRICS_PORT,
    DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_UPS_REQUEST_TIMEOUT_SECS, DEFAULT_UPS_SECRET_NAME,
    DEFAULT_UPS_URL, DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
};

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace for every cluster call (`NAMESPACE`).
    /// `None` means the kube client's default namespace.
    pub namespace: Option<String>,
    /// UnifiedPush REST base URL (`UPS_URL`)
    pub ups_url: String,
    /// Name of the bootstrap secret holding the push application id (`UPS_SECRET_NAME`)
    pub ups_secret_name: String,
    /// Per-request timeout on UnifiedPush calls (`UPS_REQUEST_TIMEOUT_SECS`)
    pub ups_request_timeout_secs: u64,
    /// Port for `/metrics`, `/healthz` and `/readyz` (`METRICS_PORT`)
    pub metrics_port: u16,
    /// First retry delay for transient failures (`BACKOFF_START_MS`)
    pub backoff_start_ms: u64,
    /// Retry delay cap (`BACKOFF_MAX_MS`)
    pub backoff_max_ms: u64,
    /// Attempts per retried operation, first call included (`RETRY_MAX_ATTEMPTS`)
    pub retry_max_attempts: u32,
    /// Delay before reconnecting after a watch error (`WATCH_RESTART_DELAY_SECS`)
    pub watch_restart_delay_secs: u64,
    /// Delay before reconnecting after the watch ends (`WATCH_RESTART_DELAY_AFTER_END_SECS`)
    pub watch_restart_delay_after_end_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            ups_url: DEFAULT_UPS_URL.to_string(),
            ups_secret_name: DEFAULT_UPS_SECRET_NAME.to_string(),
            ups_request_timeout_secs: DEFAULT_UPS_REQUEST_TIMEOUT_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            namespace: lookup("NAMESPACE").filter(|ns| !ns.trim().is_empty()),
            ups_url: lookup("UPS_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ups_url),
            ups_secret_name: lookup("UPS_SECRET_NAME").unwrap_or(defaults.ups_secret_name),
            ups_request_timeout_secs: parse_or_default(
                &lookup,
                "UPS_REQUEST_TIMEOUT_SECS",
                defaults.ups_request_timeout_secs,
            ),
            metrics_port: parse_or_default(&lookup, "METRICS_PORT", defaults.metrics_port),
            backoff_start_ms: parse_or_default(&lookup, "BACKOFF_START_MS", defaults.backoff_start_ms),
            backoff_max_ms: parse_or_default(&lookup, "BACKOFF_MAX_MS", defaults.backoff_max_ms),
            retry_max_attempts: parse_or_default(
                &lookup,
                "RETRY_MAX_ATTEMPTS",
                defaults.retry_max_attempts,
            )
            .max(1),
            watch_restart_delay_secs: parse_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            watch_restart_delay_after_end_secs: parse_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                defaults.watch_restart_delay_after_end_secs,
            ),
        }
    }

    /// Get UnifiedPush request timeout duration
    #[must_use]
    pub fn ups_request_timeout(&self) -> Duration {
        Duration::from_secs(self.ups_request_timeout_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get watch restart delay after end duration
    #[must_use]
    pub fn watch_restart_delay_after_end(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

/// Parse a value from the lookup, warning and falling back on bad input
fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(
                config.key = key,
                config.value = raw.as_str(),
                "Invalid value, using default {}",
                default
            );
            default
        }),
        None => default,
    }
}
