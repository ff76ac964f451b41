//! # Mirror Store
//!
//! The mirror is a set of ConfigMaps in the controller namespace, one per
//! provisioned variant, so other tooling can discover variant credentials
//! without talking to the UnifiedPush server.
//!
//! Records carry the labels `mobile=enabled`, `serviceName=ups` and
//! `resourceType=binding`, and are named `<variant name>-config-map`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::constants::{
    MIRROR_MOBILE_LABEL, MIRROR_NAME_SUFFIX, MIRROR_RESOURCE_TYPE_LABEL, MIRROR_SERVICE_LABEL,
    MIRROR_VARIANT_TYPE,
};
use crate::error::BindingError;
use crate::registry::AndroidVariant;

pub mod config_map;

pub use config_map::ConfigMapMirror;

const NAME_KEY: &str = "name";
const DESCRIPTION_KEY: &str = "description";
const TYPE_KEY: &str = "type";
const VARIANT_ID_KEY: &str = "variantID";
const SECRET_KEY: &str = "secret";
const GOOGLE_KEY: &str = "googleKey";
const PROJECT_NUMBER_KEY: &str = "projectNumber";

/// Local record of a provisioned variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRecord {
    /// ConfigMap name
    pub name: String,
    /// Variant display name
    pub display_name: String,
    pub description: String,
    pub variant_id: String,
    pub secret: String,
    pub google_key: String,
    pub project_number: String,
}

impl MirrorRecord {
    /// Mirror a variant the registry just accepted
    #[must_use]
    pub fn from_variant(variant: &AndroidVariant) -> Self {
        Self {
            name: format!("{}{MIRROR_NAME_SUFFIX}", variant.name),
            display_name: variant.name.clone(),
            description: variant.description.clone(),
            variant_id: variant.variant_id.clone(),
            secret: variant.secret.clone(),
            google_key: variant.google_key.clone(),
            project_number: variant.project_number.clone(),
        }
    }

    #[must_use]
    pub fn labels() -> BTreeMap<String, String> {
        [
            MIRROR_MOBILE_LABEL,
            MIRROR_SERVICE_LABEL,
            MIRROR_RESOURCE_TYPE_LABEL,
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[must_use]
    pub fn to_config_map(&self) -> ConfigMap {
        let data = BTreeMap::from([
            (NAME_KEY.to_string(), self.display_name.clone()),
            (DESCRIPTION_KEY.to_string(), self.description.clone()),
            (TYPE_KEY.to_string(), MIRROR_VARIANT_TYPE.to_string()),
            (VARIANT_ID_KEY.to_string(), self.variant_id.clone()),
            (SECRET_KEY.to_string(), self.secret.clone()),
            (GOOGLE_KEY.to_string(), self.google_key.clone()),
            (PROJECT_NUMBER_KEY.to_string(), self.project_number.clone()),
        ]);

        ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                labels: Some(Self::labels()),
                ..ObjectMeta::default()
            },
            data: Some(data),
            ..ConfigMap::default()
        }
    }

    /// Read a record back. Returns `None` for ConfigMaps without a name.
    #[must_use]
    pub fn from_config_map(config_map: &ConfigMap) -> Option<Self> {
        let name = config_map.metadata.name.clone()?;
        let field = |key: &str| {
            config_map
                .data
                .as_ref()
                .and_then(|data| data.get(key))
                .cloned()
                .unwrap_or_default()
        };
        Some(Self {
            name,
            display_name: field(NAME_KEY),
            description: field(DESCRIPTION_KEY),
            variant_id: field(VARIANT_ID_KEY),
            secret: field(SECRET_KEY),
            google_key: field(GOOGLE_KEY),
            project_number: field(PROJECT_NUMBER_KEY),
        })
    }
}

/// Storage for mirror records
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Persist a new record
    async fn put(&self, record: &MirrorRecord) -> Result<(), BindingError>;

    /// Find the record mirroring the variant registered under `google_key`
    async fn find_by_external_key(
        &self,
        google_key: &str,
    ) -> Result<Option<MirrorRecord>, BindingError>;

    /// Remove a record by name. An already-absent record counts as removed.
    async fn delete(&self, name: &str) -> Result<(), BindingError>;
}
