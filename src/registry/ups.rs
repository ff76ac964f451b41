//! # UnifiedPush REST Client
//!
//! Native REST implementation of [`VariantRegistry`] for the UnifiedPush
//! server's Android variant endpoints:
//!
//! - `GET    {base}/applications/{appId}/android` - list variants
//! - `POST   {base}/applications/{appId}/android` - create variant (201 Created)
//! - `DELETE {base}/applications/{appId}/android/{variantId}` - delete variant (204 No Content)
//!
//! The push application id is resolved once, on first use, from the injected
//! [`ApplicationSource`] and reused for the lifetime of the client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tokio::sync::OnceCell;
use tracing::{debug, info, info_span, warn, Instrument};

use super::{AndroidVariant, ApplicationSource, PushApplication, VariantRegistry, VariantRequest};
use crate::constants::CONTROLLER_NAME;
use crate::controller::backoff::{retry_transient, RetryPolicy};
use crate::error::BindingError;
use crate::observability::metrics;

/// UnifiedPush REST client
pub struct UpsClient {
    http_client: Client,
    base_url: String,
    source: Arc<dyn ApplicationSource>,
    application: OnceCell<PushApplication>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for UpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpsClient")
            .field("base_url", &self.base_url)
            .field("application", &self.application.get())
            .finish_non_exhaustive()
    }
}

impl UpsClient {
    /// Create a new client against `base_url` (e.g. `http://localhost:8080/rest`)
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(
        base_url: &str,
        source: Arc<dyn ApplicationSource>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(CONTROLLER_NAME)
            .build()
            .context("Failed to create HTTP client")?;

        info!("Initializing UnifiedPush client for {}", base_url);

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            source,
            application: OnceCell::new(),
            retry,
        })
    }

    /// The push application, resolved on first call
    async fn application(&self) -> Result<&PushApplication, BindingError> {
        self.application
            .get_or_try_init(|| async {
                let app = retry_transient(self.retry, "bootstrap", || self.source.resolve()).await?;
                info!(
                    application.id = app.application_id.as_str(),
                    "Resolved push application"
                );
                Ok::<_, BindingError>(app)
            })
            .await
    }

    fn variants_url(&self, app: &PushApplication) -> String {
        format!(
            "{}/applications/{}/android",
            self.base_url, app.application_id
        )
    }
}

/// Map a non-success status to the error taxonomy: server-side trouble is
/// transient, everything else is a rejection.
fn status_error(operation: &'static str, status: StatusCode, body: String) -> BindingError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        BindingError::RegistryUnavailable {
            operation,
            message: format!("status {status}: {body}"),
        }
    } else {
        BindingError::RegistryRejected {
            operation,
            status: status.as_u16(),
            body,
        }
    }
}

/// Metric result label for a failed call
fn result_label(err: &BindingError) -> &'static str {
    if err.is_retryable() {
        "error"
    } else {
        "rejected"
    }
}

/// Complete a create response with the fields UPS left empty
fn completed(created: AndroidVariant, payload: AndroidVariant) -> AndroidVariant {
    let or_payload = |value: String, fallback: String| {
        if value.is_empty() {
            fallback
        } else {
            value
        }
    };
    AndroidVariant {
        name: or_payload(created.name, payload.name),
        description: or_payload(created.description, payload.description),
        variant_id: created.variant_id,
        secret: or_payload(created.secret, payload.secret),
        google_key: or_payload(created.google_key, payload.google_key),
        project_number: or_payload(created.project_number, payload.project_number),
    }
}

fn record(operation: &str, result: &str, start: Instant) {
    metrics::record_registry_operation(operation, result, start.elapsed().as_secs_f64());
}

#[async_trait]
impl VariantRegistry for UpsClient {
    async fn find_by_key(&self, google_key: &str) -> Result<Option<AndroidVariant>, BindingError> {
        let span = info_span!("ups.variant.find", variant.google_key = google_key);
        async move {
            let start = Instant::now();
            let app = self.application().await?;
            let url = self.variants_url(app);
            debug!(url = url.as_str(), "UPS request");

            let response = self
                .http_client
                .get(&url)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| {
                    record("list", "error", start);
                    BindingError::unavailable("list", &e)
                })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                record("list", "not_found", start);
                debug!("UPS has no variants for this application");
                return Ok(None);
            }

            let body = response
                .text()
                .await
                .map_err(|e| {
                    record("list", "error", start);
                    BindingError::unavailable("list", &e)
                })?;
            if !status.is_success() {
                let err = status_error("list", status, body);
                record("list", result_label(&err), start);
                return Err(err);
            }

            let variants: Vec<AndroidVariant> =
                serde_json::from_str(&body).map_err(|e| {
                    record("list", "error", start);
                    BindingError::RegistryRejected {
                        operation: "list",
                        status: status.as_u16(),
                        body: format!("invalid variant list: {e}"),
                    }
                })?;

            record("list", "success", start);
            Ok(variants
                .into_iter()
                .find(|variant| variant.google_key == google_key))
        }
        .instrument(span)
        .await
    }

    async fn create(&self, request: &VariantRequest) -> Result<AndroidVariant, BindingError> {
        let span = info_span!(
            "ups.variant.create",
            variant.google_key = request.google_key.as_str(),
            variant.name = request.name.as_str()
        );
        async move {
            let start = Instant::now();
            let app = self.application().await?;
            let url = self.variants_url(app);
            let payload = AndroidVariant::from_request(request);
            info!(
                variant.id = payload.variant_id.as_str(),
                "Creating a new android variant"
            );

            let response = self
                .http_client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    record("create", "error", start);
                    BindingError::unavailable("create", &e)
                })?;

            let status = response.status();
            info!("UPS responded with status code {}", status);
            let body = response.text().await.unwrap_or_default();

            if status != StatusCode::CREATED {
                let err = status_error("create", status, body);
                record("create", result_label(&err), start);
                return Err(err);
            }

            record("create", "success", start);
            match serde_json::from_str::<AndroidVariant>(&body) {
                Ok(created) if !created.variant_id.is_empty() => Ok(completed(created, payload)),
                Ok(_) | Err(_) => {
                    warn!("UPS create response did not describe the variant, using request payload");
                    Ok(payload)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, variant_id: &str) -> Result<bool, BindingError> {
        let span = info_span!("ups.variant.delete", variant.id = variant_id);
        async move {
            let start = Instant::now();
            let app = self.application().await?;
            let url = format!("{}/{}", self.variants_url(app), variant_id);
            info!("Deleting variant with id `{}`", variant_id);

            let response = self.http_client.delete(&url).send().await.map_err(|e| {
                record("delete", "error", start);
                BindingError::unavailable("delete", &e)
            })?;

            let status = response.status();
            if status == StatusCode::NO_CONTENT {
                record("delete", "success", start);
                info!("Variant `{}` has been deleted", variant_id);
                return Ok(true);
            }

            let body = response.text().await.unwrap_or_default();
            match status_error("delete", status, body) {
                err if err.is_retryable() => {
                    record("delete", result_label(&err), start);
                    Err(err)
                }
                err => {
                    record("delete", result_label(&err), start);
                    warn!(error = %err, "UPS did not delete variant");
                    Ok(false)
                }
            }
        }
        .instrument(span)
        .await
    }
}
