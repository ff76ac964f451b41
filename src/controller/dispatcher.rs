//! # Event Dispatcher
//!
//! Consumes secret watch events one at a time and turns them into
//! orchestrator calls.
//!
//! - `Added` binding requests are provisioned, then the request secret is
//!   removed whatever the outcome.
//! - `Deleted` secrets owned by a `ServiceBinding` cascade to the variant
//!   named by their `googleKey`.
//! - Anything else is logged and ignored.
//!
//! Every event yields a [`DispatchReport`], so a failed attempt is visible
//! (logged at `error`, counted in metrics) before its request is discarded.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use kube::api::WatchEvent;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::binding::{cascade_target, BindingRequest, CascadeTarget, RequestStore};
use crate::controller::orchestrator::{CreateOutcome, DeleteOutcome, VariantOrchestrator};
use crate::error::BindingError;
use crate::observability::metrics;

/// What processing an event achieved
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// Not a binding request, or not cascade-relevant
    Ignored,
    /// A binding request for an app type that does not provision variants
    Unsupported,
    Created(CreateOutcome),
    Deleted(DeleteOutcome),
    Failed(BindingError),
}

impl ProcessingOutcome {
    /// Metrics label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Unsupported => "unsupported",
            Self::Created(outcome) => outcome.label(),
            Self::Deleted(outcome) => outcome.label(),
            Self::Failed(_) => "failed",
        }
    }
}

/// Outcome of one event plus the request lifecycle side effect
#[derive(Debug)]
pub struct DispatchReport {
    pub outcome: ProcessingOutcome,
    /// Whether the binding request secret was removed
    pub request_removed: bool,
}

impl DispatchReport {
    fn ignored() -> Self {
        Self {
            outcome: ProcessingOutcome::Ignored,
            request_removed: false,
        }
    }
}

pub struct Dispatcher {
    orchestrator: VariantOrchestrator,
    requests: Arc<dyn RequestStore>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

fn event_label(event: &WatchEvent<Secret>) -> &'static str {
    match event {
        WatchEvent::Added(_) => "added",
        WatchEvent::Modified(_) => "modified",
        WatchEvent::Deleted(_) => "deleted",
        WatchEvent::Bookmark(_) => "bookmark",
        WatchEvent::Error(_) => "error",
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(orchestrator: VariantOrchestrator, requests: Arc<dyn RequestStore>) -> Self {
        Self {
            orchestrator,
            requests,
        }
    }

    /// Process one watch event to completion
    pub async fn dispatch(&self, event: WatchEvent<Secret>) -> DispatchReport {
        let label = event_label(&event);
        metrics::increment_events(label);

        let report = match event {
            WatchEvent::Added(secret) => {
                let span = info_span!(
                    "dispatcher.added",
                    request.name = secret.metadata.name.as_deref().unwrap_or_default()
                );
                self.on_added(&secret).instrument(span).await
            }
            WatchEvent::Deleted(secret) => {
                let span = info_span!(
                    "dispatcher.deleted",
                    secret.name = secret.metadata.name.as_deref().unwrap_or_default()
                );
                self.on_deleted(&secret).instrument(span).await
            }
            other => {
                debug!(event = event_label(&other), "Ignoring watch event");
                DispatchReport::ignored()
            }
        };

        metrics::increment_outcome(report.outcome.label());
        report
    }

    async fn on_added(&self, secret: &Secret) -> DispatchReport {
        let request = match BindingRequest::from_secret(secret) {
            Ok(None) => return DispatchReport::ignored(),
            Ok(Some(request)) => Ok(request),
            Err(e) => Err(e),
        };

        let outcome = match request {
            Ok(request) if request.is_android() => {
                info!(
                    variant.google_key = request.google_key.as_str(),
                    "Processing binding request"
                );
                match self
                    .orchestrator
                    .create_if_absent(&request.variant_request())
                    .await
                {
                    Ok(outcome) => ProcessingOutcome::Created(outcome),
                    Err(e) => {
                        error!(
                            variant.google_key = request.google_key.as_str(),
                            error.kind = e.kind(),
                            error = %e,
                            "Binding request failed; the request will be removed and must be re-submitted"
                        );
                        ProcessingOutcome::Failed(e)
                    }
                }
            }
            Ok(request) => {
                info!(
                    app_type = request.app_type.as_str(),
                    "Binding request is not for an Android app, nothing to provision"
                );
                ProcessingOutcome::Unsupported
            }
            Err(e) => {
                error!(error.kind = e.kind(), error = %e, "Binding request is malformed");
                ProcessingOutcome::Failed(e)
            }
        };

        let request_removed = self.remove_request(secret).await;
        DispatchReport {
            outcome,
            request_removed,
        }
    }

    async fn on_deleted(&self, secret: &Secret) -> DispatchReport {
        let google_key = match cascade_target(secret) {
            CascadeTarget::NotOwned => return DispatchReport::ignored(),
            CascadeTarget::MissingKey => {
                warn!("Secret does not contain a googleKey, can't delete android variant");
                return DispatchReport::ignored();
            }
            CascadeTarget::Key(key) => key,
        };

        let outcome = match self.orchestrator.delete_cascade(&google_key).await {
            Ok(outcome) => ProcessingOutcome::Deleted(outcome),
            Err(e) => {
                error!(
                    variant.google_key = google_key.as_str(),
                    error.kind = e.kind(),
                    error = %e,
                    "Variant cascade delete failed"
                );
                ProcessingOutcome::Failed(e)
            }
        };

        DispatchReport {
            outcome,
            request_removed: false,
        }
    }

    async fn remove_request(&self, secret: &Secret) -> bool {
        let Some(name) = secret.metadata.name.as_deref().filter(|n| !n.is_empty()) else {
            return false;
        };
        match self.requests.remove(name).await {
            Ok(()) => true,
            Err(e) => {
                metrics::increment_request_cleanup_errors();
                error!(error = %e, "Failed to remove processed binding request");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::backoff::RetryPolicy;
    use crate::mirror::MirrorStore;
    use crate::registry::VariantRegistry;
    use crate::testing::{unavailable, FakeMirror, FakeRegistry, Fakes};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn dispatcher(fakes: &Fakes) -> Dispatcher {
        let orchestrator = VariantOrchestrator::new(
            Arc::clone(&fakes.registry) as Arc<dyn VariantRegistry>,
            Arc::clone(&fakes.mirror) as Arc<dyn MirrorStore>,
            RetryPolicy::new(2, 1, 2),
        );
        Dispatcher::new(
            orchestrator,
            Arc::clone(&fakes.requests) as Arc<dyn RequestStore>,
        )
    }

    fn secret(name: &str, labels: &[(&str, &str)], data: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                ),
                ..ObjectMeta::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Secret::default()
        }
    }

    fn binding(name: &str, data: &[(&str, &str)]) -> Secret {
        secret(
            name,
            &[("secretType", "mobile-client-binding-secret")],
            data,
        )
    }

    fn android_binding(google_key: &str) -> Secret {
        binding(
            "binding-1",
            &[
                ("appType", "Android"),
                ("clientId", "app1"),
                ("googleKey", google_key),
                ("projectNumber", "123"),
            ],
        )
    }

    fn service_binding_secret(data: &[(&str, &str)]) -> Secret {
        let mut secret = secret("credentials", &[], data);
        secret.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "servicecatalog.k8s.io/v1beta1".to_string(),
            kind: "ServiceBinding".to_string(),
            name: "binding".to_string(),
            uid: "uid-1".to_string(),
            ..OwnerReference::default()
        }]);
        secret
    }

    #[tokio::test]
    async fn test_added_binding_creates_variant_and_mirror() {
        let fakes = Fakes::new(FakeRegistry::default(), FakeMirror::default());
        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Added(android_binding("gk-1")))
            .await;

        assert!(matches!(
            report.outcome,
            ProcessingOutcome::Created(CreateOutcome::Created { .. })
        ));
        assert!(report.request_removed);
        assert_eq!(fakes.registry.keys(), vec!["gk-1"]);
        let records = fakes.mirror.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].google_key, "gk-1");
        assert_eq!(
            records[0].to_config_map().data.unwrap()["type"],
            "android"
        );
        assert_eq!(
            fakes.all_calls().last().map(String::as_str),
            Some("request.remove:binding-1")
        );
    }

    #[tokio::test]
    async fn test_existing_variant_still_removes_request() {
        let fakes = Fakes::new(
            FakeRegistry::default().with_variant("gk-1", "v-1"),
            FakeMirror::default(),
        );
        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Added(android_binding("gk-1")))
            .await;

        assert!(matches!(
            report.outcome,
            ProcessingOutcome::Created(CreateOutcome::AlreadyExists { .. })
        ));
        assert!(report.request_removed);
        assert!(fakes.calls("registry.create").is_empty());
        assert!(fakes.calls("mirror.put").is_empty());
        assert_eq!(fakes.calls("request.remove"), vec!["request.remove:binding-1"]);
    }

    #[tokio::test]
    async fn test_failed_create_is_reported_and_request_removed() {
        let fakes = Fakes::new(FakeRegistry::default(), FakeMirror::default());
        {
            let mut failures = fakes.registry.list_failures.lock().unwrap();
            failures.push_back(unavailable("list"));
            failures.push_back(unavailable("list"));
        }

        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Added(android_binding("gk-1")))
            .await;

        assert!(matches!(
            report.outcome,
            ProcessingOutcome::Failed(BindingError::RegistryUnavailable { .. })
        ));
        assert_eq!(report.outcome.label(), "failed");
        assert!(report.request_removed);
    }

    #[tokio::test]
    async fn test_mirror_write_failure_is_reported_and_request_removed() {
        let fakes = Fakes::new(FakeRegistry::default(), FakeMirror::default());
        fakes
            .mirror
            .put_failures
            .lock()
            .unwrap()
            .push_back(BindingError::MirrorWriteFailed {
                name: "app1-config-map".to_string(),
                message: "forbidden".to_string(),
            });

        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Added(android_binding("gk-1")))
            .await;

        assert!(matches!(
            report.outcome,
            ProcessingOutcome::Failed(BindingError::MirrorWriteFailed { .. })
        ));
        assert!(report.request_removed);
        assert_eq!(fakes.registry.keys(), vec!["gk-1"]);
        assert_eq!(
            fakes.all_calls(),
            vec![
                "registry.find:gk-1",
                "registry.create:gk-1",
                "mirror.put:app1-config-map",
                "request.remove:binding-1"
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_request_is_failed_and_removed() {
        let fakes = Fakes::new(FakeRegistry::default(), FakeMirror::default());
        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Added(binding(
                "binding-2",
                &[("appType", "Android"), ("clientId", "app1")],
            )))
            .await;

        assert!(matches!(
            report.outcome,
            ProcessingOutcome::Failed(BindingError::MalformedRequest { .. })
        ));
        assert!(report.request_removed);
        assert!(fakes.calls("registry").is_empty());
        assert_eq!(fakes.calls("request.remove"), vec!["request.remove:binding-2"]);
    }

    #[tokio::test]
    async fn test_non_android_request_is_removed_without_provisioning() {
        let fakes = Fakes::new(FakeRegistry::default(), FakeMirror::default());
        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Added(binding(
                "binding-3",
                &[("appType", "IOS"), ("clientId", "app1")],
            )))
            .await;

        assert!(matches!(report.outcome, ProcessingOutcome::Unsupported));
        assert!(report.request_removed);
        assert_eq!(fakes.all_calls(), vec!["request.remove:binding-3"]);
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_reported() {
        let fakes = Fakes::new(FakeRegistry::default(), FakeMirror::default());
        fakes
            .requests
            .failures
            .lock()
            .unwrap()
            .push_back(BindingError::RequestCleanupFailed {
                name: "binding-1".to_string(),
                message: "forbidden".to_string(),
            });

        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Added(android_binding("gk-1")))
            .await;

        assert!(matches!(report.outcome, ProcessingOutcome::Created(_)));
        assert!(!report.request_removed);
    }

    #[tokio::test]
    async fn test_unmarked_secret_is_ignored() {
        let fakes = Fakes::new(FakeRegistry::default(), FakeMirror::default());
        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Added(secret(
                "tls-cert",
                &[("app", "web")],
                &[("googleKey", "gk-1")],
            )))
            .await;

        assert!(matches!(report.outcome, ProcessingOutcome::Ignored));
        assert!(!report.request_removed);
        assert!(fakes.all_calls().is_empty());
    }

    #[tokio::test]
    async fn test_modified_events_are_ignored() {
        let fakes = Fakes::new(FakeRegistry::default(), FakeMirror::default());
        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Modified(android_binding("gk-1")))
            .await;

        assert!(matches!(report.outcome, ProcessingOutcome::Ignored));
        assert!(fakes.all_calls().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_service_binding_secret_cascades() {
        let fakes = Fakes::new(
            FakeRegistry::default().with_variant("gk-2", "v-2"),
            FakeMirror::default().with_record("gk-2", "v-2"),
        );
        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Deleted(service_binding_secret(&[(
                "googleKey", "gk-2",
            )])))
            .await;

        assert!(matches!(
            report.outcome,
            ProcessingOutcome::Deleted(DeleteOutcome::Deleted { .. })
        ));
        assert!(!report.request_removed);
        assert!(fakes.mirror.records().is_empty());
        assert!(fakes.registry.keys().is_empty());
        assert!(fakes.calls("request").is_empty());
    }

    #[tokio::test]
    async fn test_deleted_without_mirror_makes_no_registry_calls() {
        let fakes = Fakes::new(
            FakeRegistry::default().with_variant("gk-2", "v-2"),
            FakeMirror::default(),
        );
        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Deleted(service_binding_secret(&[(
                "googleKey", "gk-2",
            )])))
            .await;

        assert!(matches!(
            report.outcome,
            ProcessingOutcome::Deleted(DeleteOutcome::NoMirror)
        ));
        assert!(fakes.calls("registry").is_empty());
    }

    #[tokio::test]
    async fn test_orphaned_variant_is_counted_once() {
        let fakes = Fakes::new(
            FakeRegistry::default().with_variant("gk-3", "v-3"),
            FakeMirror::default().with_record("gk-3", "v-3"),
        );
        {
            let mut failures = fakes.registry.list_failures.lock().unwrap();
            failures.push_back(unavailable("list"));
            failures.push_back(unavailable("list"));
        }
        let before = metrics::outcome_count("orphaned");

        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Deleted(service_binding_secret(&[(
                "googleKey", "gk-3",
            )])))
            .await;

        assert!(matches!(
            report.outcome,
            ProcessingOutcome::Deleted(DeleteOutcome::Orphaned { ref variant_id, .. })
                if variant_id == "v-3"
        ));
        assert_eq!(report.outcome.label(), "orphaned");
        assert_eq!(metrics::outcome_count("orphaned"), before + 1);
        assert!(fakes.mirror.records().is_empty());
        assert_eq!(fakes.registry.keys(), vec!["gk-3"]);
    }

    #[tokio::test]
    async fn test_deleted_secret_without_owner_is_ignored() {
        let fakes = Fakes::new(
            FakeRegistry::default().with_variant("gk-2", "v-2"),
            FakeMirror::default().with_record("gk-2", "v-2"),
        );
        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Deleted(android_binding("gk-2")))
            .await;

        assert!(matches!(report.outcome, ProcessingOutcome::Ignored));
        assert!(fakes.all_calls().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_service_binding_without_key_is_ignored() {
        let fakes = Fakes::new(FakeRegistry::default(), FakeMirror::default());
        let report = dispatcher(&fakes)
            .dispatch(WatchEvent::Deleted(service_binding_secret(&[(
                "clientId", "app1",
            )])))
            .await;

        assert!(matches!(report.outcome, ProcessingOutcome::Ignored));
        assert!(fakes.all_calls().is_empty());
    }
}
