//! Shared setup for the UnifiedPush contract tests.

use std::sync::{Arc, Once};
use std::time::Duration;

use ups_binding_controller::controller::backoff::RetryPolicy;
use ups_binding_controller::registry::{PushApplication, UpsClient};

pub const APPLICATION_ID: &str = "app-1";

static RUSTLS_INIT: Once = Once::new();

/// Install the ring crypto provider once per test binary
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // The Pact mock server may already have installed a process-wide provider
        if rustls::crypto::CryptoProvider::get_default().is_some() {
            return;
        }
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// A client for the mock server, bound to [`APPLICATION_ID`] and never retrying
pub fn ups_client(mock_url: &str) -> UpsClient {
    init_rustls();
    UpsClient::new(
        mock_url,
        Arc::new(PushApplication::new(APPLICATION_ID)),
        Duration::from_secs(5),
        RetryPolicy::no_retry(),
    )
    .expect("Failed to create UPS client")
}
