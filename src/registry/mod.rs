//! # Variant Registry
//!
//! Abstract interface to the UnifiedPush server, the system of record for
//! Android variants, plus the wire types it exchanges.
//!
//! - `ups`: reqwest-based REST implementation
//! - `bootstrap`: resolves the push application from its bootstrap secret

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::BindingError;

pub mod bootstrap;
pub mod ups;

pub use bootstrap::BootstrapSecret;
pub use ups::UpsClient;

/// Registry trait for push-notification variants
///
/// Implementations never cache: every call is a live round trip, so the
/// look-before-create check always sees the registry's current state.
#[async_trait]
pub trait VariantRegistry: Send + Sync {
    /// Find the Android variant registered for `google_key`.
    /// Returns `Ok(None)` when no variant matches.
    async fn find_by_key(&self, google_key: &str) -> Result<Option<AndroidVariant>, BindingError>;

    /// Register a new Android variant with a freshly generated id and secret
    async fn create(&self, request: &VariantRequest) -> Result<AndroidVariant, BindingError>;

    /// Delete a variant by id. Returns true when the registry confirmed the deletion.
    async fn delete(&self, variant_id: &str) -> Result<bool, BindingError>;
}

/// Source of the push application whose variants are managed
#[async_trait]
pub trait ApplicationSource: Send + Sync {
    async fn resolve(&self) -> Result<PushApplication, BindingError>;
}

/// Identifies the push application all variants belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushApplication {
    pub application_id: String,
}

impl PushApplication {
    #[must_use]
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
        }
    }
}

/// A fixed application, for deployments that know the id up front
#[async_trait]
impl ApplicationSource for PushApplication {
    async fn resolve(&self) -> Result<PushApplication, BindingError> {
        Ok(self.clone())
    }
}

/// What a binding request asks the registry to provision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRequest {
    /// Display name, taken from the binding's `clientId`
    pub name: String,
    pub google_key: String,
    pub project_number: String,
}

/// Android variant as exchanged with the UnifiedPush REST API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidVariant {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "variantID", default, deserialize_with = "null_as_empty")]
    pub variant_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub secret: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub google_key: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub project_number: String,
}

impl AndroidVariant {
    /// Build a new variant for `request` with random id and secret
    #[must_use]
    pub fn from_request(request: &VariantRequest) -> Self {
        Self {
            name: request.name.clone(),
            description: String::new(),
            variant_id: uuid::Uuid::new_v4().to_string(),
            secret: uuid::Uuid::new_v4().to_string(),
            google_key: request.google_key.clone(),
            project_number: request.project_number.clone(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}
