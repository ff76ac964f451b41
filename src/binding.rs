//! # Binding Requests
//!
//! A binding request is a one-shot `Secret` labelled
//! `secretType=mobile-client-binding-secret` asking for an Android variant.
//! This module decodes those secrets, decides whether a deleted secret should
//! cascade to its variant, and removes requests once they have been processed.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::DeleteParams;
use kube::Api;
use tracing::{debug, info};

use crate::constants::{
    ANDROID_APP_TYPE, BINDING_APP_TYPE_KEY, BINDING_CLIENT_ID_KEY, BINDING_GOOGLE_KEY,
    BINDING_PROJECT_NUMBER_KEY, BINDING_SECRET_TYPE, SECRET_TYPE_LABEL, SERVICE_BINDING_KIND,
};
use crate::error::BindingError;
use crate::registry::VariantRequest;

/// A decoded binding request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRequest {
    /// Name of the secret carrying the request
    pub name: String,
    pub app_type: String,
    /// Display name of the variant
    pub client_id: String,
    /// External key identifying the variant
    pub google_key: String,
    pub project_number: String,
}

impl BindingRequest {
    /// Decode a secret into a binding request.
    ///
    /// Returns `Ok(None)` when the secret is not a binding request at all, and
    /// `Err(MalformedRequest)` when it carries the marker but cannot be used.
    pub fn from_secret(secret: &Secret) -> Result<Option<Self>, BindingError> {
        if !is_binding_request(secret) {
            return Ok(None);
        }

        let name = secret.metadata.name.clone().unwrap_or_default();
        let malformed = |reason: String| BindingError::MalformedRequest {
            name: name.clone(),
            reason,
        };
        if name.is_empty() {
            return Err(malformed("secret has no name".to_string()));
        }

        let app_type = secret_data(secret, BINDING_APP_TYPE_KEY)
            .map_err(&malformed)?
            .unwrap_or_default();

        if app_type != ANDROID_APP_TYPE {
            // Only the app type is needed to skip a non-Android request
            return Ok(Some(Self {
                name,
                app_type,
                client_id: String::new(),
                google_key: String::new(),
                project_number: String::new(),
            }));
        }

        let required = |key: &str| -> Result<String, BindingError> {
            match secret_data(secret, key).map_err(&malformed)? {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(malformed(format!("missing `{key}`"))),
            }
        };
        let client_id = required(BINDING_CLIENT_ID_KEY)?;
        let google_key = required(BINDING_GOOGLE_KEY)?;
        let project_number = secret_data(secret, BINDING_PROJECT_NUMBER_KEY)
            .map_err(&malformed)?
            .unwrap_or_default();

        Ok(Some(Self {
            name,
            app_type,
            client_id,
            google_key,
            project_number,
        }))
    }

    #[must_use]
    pub fn is_android(&self) -> bool {
        self.app_type == ANDROID_APP_TYPE
    }

    /// The variant this request asks for
    #[must_use]
    pub fn variant_request(&self) -> VariantRequest {
        VariantRequest {
            name: self.client_id.clone(),
            google_key: self.google_key.clone(),
            project_number: self.project_number.clone(),
        }
    }
}

/// Whether the secret carries the binding request type marker
#[must_use]
pub fn is_binding_request(secret: &Secret) -> bool {
    secret
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(SECRET_TYPE_LABEL))
        .is_some_and(|value| value == BINDING_SECRET_TYPE)
}

/// What a deleted secret means for the variant it may have provisioned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeTarget {
    /// Not owned by a service binding; unrelated deletion
    NotOwned,
    /// Owned by a service binding but carries no external key
    MissingKey,
    /// Cascade to the variant registered under this key
    Key(String),
}

/// Inspect a deleted secret's owner references and last-known data
#[must_use]
pub fn cascade_target(secret: &Secret) -> CascadeTarget {
    let owned = secret
        .metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.kind == SERVICE_BINDING_KIND));
    if !owned {
        return CascadeTarget::NotOwned;
    }

    match secret_data(secret, BINDING_GOOGLE_KEY) {
        Ok(Some(key)) if !key.is_empty() => CascadeTarget::Key(key),
        _ => CascadeTarget::MissingKey,
    }
}

/// Read a data value as UTF-8, looking at `data` first and then `stringData`
pub(crate) fn secret_data(secret: &Secret, key: &str) -> Result<Option<String>, String> {
    if let Some(bytes) = secret.data.as_ref().and_then(|data| data.get(key)) {
        return String::from_utf8(bytes.0.clone())
            .map(Some)
            .map_err(|e| format!("`{key}` is not valid UTF-8: {e}"));
    }
    Ok(secret
        .string_data
        .as_ref()
        .and_then(|data| data.get(key))
        .cloned())
}

/// Removes processed binding requests
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Delete the request secret. An already-absent secret counts as removed.
    async fn remove(&self, name: &str) -> Result<(), BindingError>;
}

/// Binding requests stored as secrets in the controller namespace
#[derive(Clone)]
pub struct SecretRequests {
    api: Api<Secret>,
}

impl std::fmt::Debug for SecretRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRequests").finish_non_exhaustive()
    }
}

impl SecretRequests {
    #[must_use]
    pub fn new(api: Api<Secret>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RequestStore for SecretRequests {
    async fn remove(&self, name: &str) -> Result<(), BindingError> {
        match self.api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(request.name = name, "Secret `{}` has been deleted", name);
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(request.name = name, "Binding secret already gone");
                Ok(())
            }
            Err(e) => Err(BindingError::RequestCleanupFailed {
                name: name.to_string(),
                message: e.to_string(),
            }),
        }
    }
}
