//! # Push Application Bootstrap
//!
//! Resolves the push application id from the well-known `unified-push-server`
//! secret written when the UnifiedPush service was provisioned.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use tracing::debug;

use super::{ApplicationSource, PushApplication};
use crate::binding::secret_data;
use crate::constants::APPLICATION_ID_KEY;
use crate::error::BindingError;

/// Bootstrap secret lookup
#[derive(Clone)]
pub struct BootstrapSecret {
    api: Api<Secret>,
    name: String,
}

impl std::fmt::Debug for BootstrapSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapSecret")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl BootstrapSecret {
    #[must_use]
    pub fn new(api: Api<Secret>, name: impl Into<String>) -> Self {
        Self {
            api,
            name: name.into(),
        }
    }
}

/// Extract the push application from a bootstrap secret
pub fn application_from_secret(secret: &Secret) -> Result<PushApplication, BindingError> {
    match secret_data(secret, APPLICATION_ID_KEY) {
        Ok(Some(id)) if !id.trim().is_empty() => Ok(PushApplication::new(id.trim())),
        Ok(_) => Err(BindingError::BootstrapUnavailable(format!(
            "secret has no `{APPLICATION_ID_KEY}`"
        ))),
        Err(reason) => Err(BindingError::BootstrapUnavailable(reason)),
    }
}

#[async_trait]
impl ApplicationSource for BootstrapSecret {
    async fn resolve(&self) -> Result<PushApplication, BindingError> {
        debug!(secret.name = self.name.as_str(), "Reading push application bootstrap secret");
        // A missing secret is retryable: the UnifiedPush service may still be provisioning.
        let secret = self.api.get(&self.name).await.map_err(|e| {
            BindingError::BootstrapUnavailable(format!("failed to read secret {}: {e}", self.name))
        })?;
        application_from_secret(&secret)
    }
}
