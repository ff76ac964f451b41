//! # Variant Orchestrator
//!
//! Ties the [`VariantRegistry`] and the [`MirrorStore`] together.
//!
//! - `create_if_absent` looks before it creates, so replaying a request is a no-op.
//! - `delete_cascade` removes the mirror record first and only then the registry
//!   variant. A mirror record without a variant can be detected and recreated;
//!   a variant without a mirror record is invisible to the cluster.

use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};

use crate::controller::backoff::{retry_transient, RetryPolicy};
use crate::error::BindingError;
use crate::mirror::{MirrorRecord, MirrorStore};
use crate::registry::{VariantRegistry, VariantRequest};

/// Result of [`VariantOrchestrator::create_if_absent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A variant was registered and mirrored
    Created { variant_id: String, mirror: String },
    /// The registry already knows the key; nothing was written
    AlreadyExists { variant_id: String },
}

/// Result of [`VariantOrchestrator::delete_cascade`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Mirror record and variant removed
    Deleted { variant_id: String },
    /// No mirror record for the key; the registry was not contacted
    NoMirror,
    /// Mirror record removed, the registry had no matching variant
    VariantMissing,
    /// Mirror record removed, the registry refused the delete.
    /// The variant is orphaned in the registry.
    RegistryRefused { variant_id: String },
    /// Mirror record removed, the registry could not be reached to delete the
    /// variant. `variant_id` is the id last mirrored.
    Orphaned { variant_id: String, reason: String },
}

impl CreateOutcome {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::AlreadyExists { .. } => "already_exists",
        }
    }
}

impl DeleteOutcome {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deleted { .. } => "deleted",
            Self::NoMirror => "no_mirror",
            Self::VariantMissing => "variant_missing",
            Self::RegistryRefused { .. } | Self::Orphaned { .. } => "orphaned",
        }
    }
}

pub struct VariantOrchestrator {
    registry: Arc<dyn VariantRegistry>,
    mirror: Arc<dyn MirrorStore>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for VariantOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantOrchestrator")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl VariantOrchestrator {
    #[must_use]
    pub fn new(
        registry: Arc<dyn VariantRegistry>,
        mirror: Arc<dyn MirrorStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            mirror,
            retry,
        }
    }

    /// Register the variant unless the registry already has one for the key,
    /// then mirror it.
    ///
    /// # Errors
    /// Registry failures abort before any mirror write. A mirror failure after a
    /// successful create is returned as `MirrorWriteFailed`.
    pub async fn create_if_absent(
        &self,
        request: &VariantRequest,
    ) -> Result<CreateOutcome, BindingError> {
        let span = info_span!(
            "orchestrator.create_if_absent",
            variant.google_key = request.google_key.as_str(),
            variant.name = request.name.as_str()
        );
        async move {
            let google_key = request.google_key.as_str();
            let existing = retry_transient(self.retry, "registry_list", || {
                self.registry.find_by_key(google_key)
            })
            .await?;

            if let Some(variant) = existing {
                info!(
                    variant.id = variant.variant_id.as_str(),
                    "A variant for this googleKey already exists, not creating"
                );
                return Ok(CreateOutcome::AlreadyExists {
                    variant_id: variant.variant_id,
                });
            }

            let variant = self.registry.create(request).await?;
            let record = MirrorRecord::from_variant(&variant);
            if let Err(e) = self.mirror.put(&record).await {
                error!(
                    variant.id = variant.variant_id.as_str(),
                    mirror.name = record.name.as_str(),
                    error = %e,
                    "Variant registered but its mirror record could not be written"
                );
                return Err(e);
            }

            info!(
                variant.id = variant.variant_id.as_str(),
                mirror.name = record.name.as_str(),
                "Created variant and mirror record"
            );
            Ok(CreateOutcome::Created {
                variant_id: variant.variant_id,
                mirror: record.name,
            })
        }
        .instrument(span)
        .await
    }

    /// Remove the mirror record for `google_key`, then the registry variant.
    ///
    /// A registry failure after the mirror delete is reported as
    /// [`DeleteOutcome::Orphaned`], since the mirror change cannot be undone.
    ///
    /// # Errors
    /// A failed mirror lookup or delete leaves the registry untouched.
    pub async fn delete_cascade(&self, google_key: &str) -> Result<DeleteOutcome, BindingError> {
        let span = info_span!("orchestrator.delete_cascade", variant.google_key = google_key);
        async move {
            let record = retry_transient(self.retry, "mirror_list", || {
                self.mirror.find_by_external_key(google_key)
            })
            .await?;

            let Some(record) = record else {
                info!("No mirror record for this googleKey, nothing to delete");
                return Ok(DeleteOutcome::NoMirror);
            };

            self.mirror.delete(&record.name).await?;

            match self.delete_variant(google_key).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    error!(
                        mirror.name = record.name.as_str(),
                        variant.id = record.variant_id.as_str(),
                        error = %e,
                        "Mirror record removed but the variant could not be deleted; variant is orphaned"
                    );
                    Ok(DeleteOutcome::Orphaned {
                        variant_id: record.variant_id,
                        reason: e.to_string(),
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn delete_variant(&self, google_key: &str) -> Result<DeleteOutcome, BindingError> {
        // The mirror may be stale; the registry holds the live id
        let variant = retry_transient(self.retry, "registry_list", || {
            self.registry.find_by_key(google_key)
        })
        .await?;

        let Some(variant) = variant else {
            warn!("Registry has no variant for this googleKey");
            return Ok(DeleteOutcome::VariantMissing);
        };

        let variant_id = variant.variant_id;
        let deleted = retry_transient(self.retry, "registry_delete", || {
            self.registry.delete(&variant_id)
        })
        .await?;

        if deleted {
            Ok(DeleteOutcome::Deleted { variant_id })
        } else {
            error!(
                variant.id = variant_id.as_str(),
                "Registry refused to delete variant; variant is orphaned"
            );
            Ok(DeleteOutcome::RegistryRefused { variant_id })
        }
    }
}
