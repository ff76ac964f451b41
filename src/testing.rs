//! In-memory fakes for the registry, mirror and request stores.
//!
//! All fakes append to a shared journal so tests can assert both which calls
//! were made and in what order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::binding::RequestStore;
use crate::error::BindingError;
use crate::mirror::{MirrorRecord, MirrorStore};
use crate::registry::{AndroidVariant, VariantRegistry, VariantRequest};

pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

fn log(journal: &Journal, entry: String) {
    journal.lock().unwrap().push(entry);
}

fn next_failure(queue: &Mutex<VecDeque<BindingError>>) -> Option<BindingError> {
    queue.lock().unwrap().pop_front()
}

pub(crate) fn unavailable(operation: &'static str) -> BindingError {
    BindingError::RegistryUnavailable {
        operation,
        message: "connection refused".to_string(),
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeRegistry {
    pub variants: Mutex<Vec<AndroidVariant>>,
    pub journal: Journal,
    pub list_failures: Mutex<VecDeque<BindingError>>,
    pub create_failures: Mutex<VecDeque<BindingError>>,
    pub delete_failures: Mutex<VecDeque<BindingError>>,
    pub refuse_delete: Mutex<bool>,
}

impl FakeRegistry {
    pub fn with_variant(self, google_key: &str, variant_id: &str) -> Self {
        self.variants.lock().unwrap().push(AndroidVariant {
            name: format!("variant-{google_key}"),
            variant_id: variant_id.to_string(),
            secret: "secret".to_string(),
            google_key: google_key.to_string(),
            ..AndroidVariant::default()
        });
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.variants
            .lock()
            .unwrap()
            .iter()
            .map(|v| v.google_key.clone())
            .collect()
    }
}

#[async_trait]
impl VariantRegistry for FakeRegistry {
    async fn find_by_key(&self, google_key: &str) -> Result<Option<AndroidVariant>, BindingError> {
        log(&self.journal, format!("registry.find:{google_key}"));
        if let Some(err) = next_failure(&self.list_failures) {
            return Err(err);
        }
        Ok(self
            .variants
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.google_key == google_key)
            .cloned())
    }

    async fn create(&self, request: &VariantRequest) -> Result<AndroidVariant, BindingError> {
        log(&self.journal, format!("registry.create:{}", request.google_key));
        if let Some(err) = next_failure(&self.create_failures) {
            return Err(err);
        }
        let variant = AndroidVariant::from_request(request);
        self.variants.lock().unwrap().push(variant.clone());
        Ok(variant)
    }

    async fn delete(&self, variant_id: &str) -> Result<bool, BindingError> {
        log(&self.journal, format!("registry.delete:{variant_id}"));
        if let Some(err) = next_failure(&self.delete_failures) {
            return Err(err);
        }
        if *self.refuse_delete.lock().unwrap() {
            return Ok(false);
        }
        let mut variants = self.variants.lock().unwrap();
        let before = variants.len();
        variants.retain(|v| v.variant_id != variant_id);
        Ok(variants.len() < before)
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeMirror {
    pub records: Mutex<Vec<MirrorRecord>>,
    pub journal: Journal,
    pub list_failures: Mutex<VecDeque<BindingError>>,
    pub put_failures: Mutex<VecDeque<BindingError>>,
    pub delete_failures: Mutex<VecDeque<BindingError>>,
}

impl FakeMirror {
    pub fn with_record(self, google_key: &str, variant_id: &str) -> Self {
        self.records.lock().unwrap().push(MirrorRecord {
            name: format!("variant-{google_key}-config-map"),
            display_name: format!("variant-{google_key}"),
            description: String::new(),
            variant_id: variant_id.to_string(),
            secret: "secret".to_string(),
            google_key: google_key.to_string(),
            project_number: String::new(),
        });
        self
    }

    pub fn records(&self) -> Vec<MirrorRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl MirrorStore for FakeMirror {
    async fn put(&self, record: &MirrorRecord) -> Result<(), BindingError> {
        log(&self.journal, format!("mirror.put:{}", record.name));
        if let Some(err) = next_failure(&self.put_failures) {
            return Err(err);
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn find_by_external_key(
        &self,
        google_key: &str,
    ) -> Result<Option<MirrorRecord>, BindingError> {
        log(&self.journal, format!("mirror.find:{google_key}"));
        if let Some(err) = next_failure(&self.list_failures) {
            return Err(err);
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.google_key == google_key)
            .cloned())
    }

    async fn delete(&self, name: &str) -> Result<(), BindingError> {
        log(&self.journal, format!("mirror.delete:{name}"));
        if let Some(err) = next_failure(&self.delete_failures) {
            return Err(err);
        }
        self.records.lock().unwrap().retain(|r| r.name != name);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeRequests {
    pub journal: Journal,
    pub failures: Mutex<VecDeque<BindingError>>,
}

#[async_trait]
impl RequestStore for FakeRequests {
    async fn remove(&self, name: &str) -> Result<(), BindingError> {
        log(&self.journal, format!("request.remove:{name}"));
        match next_failure(&self.failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Journal entries starting with `prefix`
pub(crate) fn calls(journal: &Journal, prefix: &str) -> Vec<String> {
    journal
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.starts_with(prefix))
        .cloned()
        .collect()
}

/// Fakes wired to one shared journal
#[derive(Debug)]
pub(crate) struct Fakes {
    pub journal: Journal,
    pub registry: Arc<FakeRegistry>,
    pub mirror: Arc<FakeMirror>,
    pub requests: Arc<FakeRequests>,
}

impl Fakes {
    pub fn new(registry: FakeRegistry, mirror: FakeMirror) -> Self {
        let journal = Journal::default();
        Self {
            registry: Arc::new(FakeRegistry {
                journal: Arc::clone(&journal),
                ..registry
            }),
            mirror: Arc::new(FakeMirror {
                journal: Arc::clone(&journal),
                ..mirror
            }),
            requests: Arc::new(FakeRequests {
                journal: Arc::clone(&journal),
                ..FakeRequests::default()
            }),
            journal,
        }
    }

    pub fn calls(&self, prefix: &str) -> Vec<String> {
        calls(&self.journal, prefix)
    }

    pub fn all_calls(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}
