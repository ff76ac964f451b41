//! # Initialization
//!
//! Startup wiring: rustls, tracing, metrics, the probe server, the kube
//! client and the component graph the watch loop drives.

use std::sync::Arc;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Api, Client};
use tracing::{error, info};

use crate::binding::{RequestStore, SecretRequests};
use crate::config::ControllerConfig;
use crate::controller::backoff::RetryPolicy;
use crate::controller::dispatcher::Dispatcher;
use crate::controller::orchestrator::VariantOrchestrator;
use crate::controller::server::{start_server, ServerState};
use crate::mirror::{ConfigMapMirror, MirrorStore};
use crate::observability::{self, LogFormat};
use crate::registry::{ApplicationSource, BootstrapSecret, UpsClient, VariantRegistry};

/// Everything the watch loop needs
pub struct InitializationResult {
    /// Secrets in the controller namespace
    pub secrets: Api<Secret>,
    pub dispatcher: Arc<Dispatcher>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before any TLS client is built
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    observability::init_logging(LogFormat::from_env());
    info!("Starting {} v{}", crate::constants::CONTROLLER_NAME, env!("CARGO_PKG_VERSION"));

    let config = ControllerConfig::from_env();
    info!(?config, "Loaded configuration");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_port = config.metrics_port;
    let state_for_server = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, state_for_server).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let namespace = config
        .namespace
        .clone()
        .unwrap_or_else(|| client.default_namespace().to_string());
    info!(namespace = namespace.as_str(), "Using namespace for all cluster calls");

    let secrets: Api<Secret> = Api::namespaced(client.clone(), &namespace);
    let config_maps: Api<ConfigMap> = Api::namespaced(client, &namespace);
    let retry = RetryPolicy::from(&config);

    let source: Arc<dyn ApplicationSource> = Arc::new(BootstrapSecret::new(
        secrets.clone(),
        config.ups_secret_name.clone(),
    ));
    let registry: Arc<dyn VariantRegistry> = Arc::new(UpsClient::new(
        &config.ups_url,
        source,
        config.ups_request_timeout(),
        retry,
    )?);
    let mirror: Arc<dyn MirrorStore> = Arc::new(ConfigMapMirror::new(config_maps));
    let requests: Arc<dyn RequestStore> = Arc::new(SecretRequests::new(secrets.clone()));

    let orchestrator = VariantOrchestrator::new(registry, mirror, retry);
    let dispatcher = Arc::new(Dispatcher::new(orchestrator, requests));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        secrets,
        dispatcher,
        server_state,
        config,
    })
}
