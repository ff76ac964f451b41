//! ConfigMap-backed [`MirrorStore`].

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::Api;
use tracing::{debug, info};

use super::{MirrorRecord, MirrorStore};
use crate::constants::{CONTROLLER_NAME, MIRROR_RESOURCE_TYPE_LABEL};
use crate::error::BindingError;
use crate::observability::metrics;

/// Mirror records as ConfigMaps in one namespace
#[derive(Clone)]
pub struct ConfigMapMirror {
    api: Api<ConfigMap>,
}

impl std::fmt::Debug for ConfigMapMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigMapMirror").finish_non_exhaustive()
    }
}

impl ConfigMapMirror {
    #[must_use]
    pub fn new(api: Api<ConfigMap>) -> Self {
        Self { api }
    }
}

fn label_selector() -> String {
    let (key, value) = MIRROR_RESOURCE_TYPE_LABEL;
    format!("{key}={value}")
}

#[async_trait]
impl MirrorStore for ConfigMapMirror {
    async fn put(&self, record: &MirrorRecord) -> Result<(), BindingError> {
        let params = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..PostParams::default()
        };
        match self.api.create(&params, &record.to_config_map()).await {
            Ok(_) => {
                metrics::record_mirror_operation("put", "success");
                info!(mirror.name = record.name.as_str(), "Created mirror ConfigMap");
                Ok(())
            }
            Err(e) => {
                metrics::record_mirror_operation("put", "error");
                Err(BindingError::MirrorWriteFailed {
                    name: record.name.clone(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn find_by_external_key(
        &self,
        google_key: &str,
    ) -> Result<Option<MirrorRecord>, BindingError> {
        let params = ListParams::default().labels(&label_selector());
        let list = self.api.list(&params).await.map_err(|e| {
            metrics::record_mirror_operation("list", "error");
            BindingError::MirrorUnavailable(e.to_string())
        })?;
        metrics::record_mirror_operation("list", "success");

        let found = list
            .items
            .iter()
            .filter_map(MirrorRecord::from_config_map)
            .find(|record| record.google_key == google_key);
        debug!(
            variant.google_key = google_key,
            found = found.is_some(),
            candidates = list.items.len(),
            "Searched mirror ConfigMaps"
        );
        Ok(found)
    }

    async fn delete(&self, name: &str) -> Result<(), BindingError> {
        match self.api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                metrics::record_mirror_operation("delete", "success");
                info!(mirror.name = name, "Deleted mirror ConfigMap");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                metrics::record_mirror_operation("delete", "not_found");
                debug!(mirror.name = name, "Mirror ConfigMap already gone");
                Ok(())
            }
            Err(e) => {
                metrics::record_mirror_operation("delete", "error");
                Err(BindingError::MirrorWriteFailed {
                    name: name.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_selector() {
        assert_eq!(label_selector(), "resourceType=binding");
    }
}
