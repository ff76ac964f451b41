//! # Logging
//!
//! Installs the global `tracing` subscriber. The filter comes from `RUST_LOG`
//! (default `ups_binding_controller=info`) and the output format from
//! `LOG_FORMAT` (`text` or `json`).

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "ups_binding_controller=info";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT`, defaulting to text for unknown values
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Install the global subscriber. Must be called once, before any logging.
pub fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
