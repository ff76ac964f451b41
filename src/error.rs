//! # Errors
//!
//! Error taxonomy shared by the registry client, the mirror store and the
//! dispatcher. Not-found conditions are never errors; they are modelled as
//! `Option` / outcome values by the callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindingError {
    /// Registry could not be reached, timed out, or answered with a server-side failure
    #[error("UnifiedPush server unavailable during {operation}: {message}")]
    RegistryUnavailable { operation: &'static str, message: String },

    /// Registry answered with a status that is not the expected success status
    #[error("UnifiedPush server rejected {operation} with status {status}: {body}")]
    RegistryRejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The bootstrap record naming the push application could not be resolved
    #[error("Push application bootstrap record unavailable: {0}")]
    BootstrapUnavailable(String),

    /// Mirror ConfigMaps could not be listed
    #[error("Mirror store unavailable: {0}")]
    MirrorUnavailable(String),

    /// Mirror ConfigMap could not be created or deleted
    #[error("Failed to write mirror record {name}: {message}")]
    MirrorWriteFailed { name: String, message: String },

    /// Binding secret carries the type marker but its payload is unusable
    #[error("Malformed binding request {name}: {reason}")]
    MalformedRequest { name: String, reason: String },

    /// Binding secret could not be removed after processing
    #[error("Failed to remove binding request {name}: {message}")]
    RequestCleanupFailed { name: String, message: String },
}

impl BindingError {
    /// Whether the operation that produced this error may succeed when retried
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RegistryUnavailable { .. }
                | Self::BootstrapUnavailable(_)
                | Self::MirrorUnavailable(_)
        )
    }

    /// Short label for metrics and structured logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RegistryUnavailable { .. } => "registry_unavailable",
            Self::RegistryRejected { .. } => "registry_rejected",
            Self::BootstrapUnavailable(_) => "bootstrap_unavailable",
            Self::MirrorUnavailable(_) => "mirror_unavailable",
            Self::MirrorWriteFailed { .. } => "mirror_write_failed",
            Self::MalformedRequest { .. } => "malformed_request",
            Self::RequestCleanupFailed { .. } => "request_cleanup_failed",
        }
    }

    pub(crate) fn unavailable(operation: &'static str, err: &reqwest::Error) -> Self {
        Self::RegistryUnavailable {
            operation,
            message: err.to_string(),
        }
    }
}
