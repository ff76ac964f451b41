//! # Watch Loop
//!
//! Watches secrets in the controller namespace and feeds every event, in
//! order, to the [`Dispatcher`]. Each event is processed to completion
//! before the next one is read.
//!
//! Every (re)connect starts from resource version "0", so the API server
//! replays an `ADDED` event for each secret that still exists. Binding
//! requests that arrived while the watch was down are picked up this way.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, WatchEvent, WatchParams};
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::ControllerConfig;
use crate::controller::dispatcher::Dispatcher;
use crate::controller::server::ServerState;
use crate::observability::metrics;

/// Why a single watch stream stopped
#[derive(Debug, Clone, PartialEq, Eq)]
enum WatchEnd {
    /// The API server closed the stream normally
    Closed,
    /// The watch could not be opened, or yielded an error
    Failed(String),
    Shutdown,
}

impl WatchEnd {
    fn restart_delay(&self, config: &ControllerConfig) -> Option<Duration> {
        match self {
            Self::Closed => Some(config.watch_restart_delay_after_end()),
            Self::Failed(_) => Some(config.watch_restart_delay()),
            Self::Shutdown => None,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Failed(_) => "error",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Resolves on the first SIGINT or SIGTERM.
///
/// The SIGTERM handler is installed before this returns, so a signal sent
/// afterwards is not lost.
#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => debug!("Received SIGINT"),
            Some(()) = terminate.recv() => debug!("Received SIGTERM"),
            else => error!("Shutdown signal listeners closed"),
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
}

/// Run the watch loop until a shutdown signal is received
pub async fn run_watch_loop(
    secrets: Api<Secret>,
    dispatcher: Arc<Dispatcher>,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) -> Result<(), anyhow::Error> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let shutdown = shutdown_signal().context("Failed to install shutdown signal handlers")?;
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        shutdown.await;
        info!("Received shutdown signal (SIGINT/SIGTERM), finishing in-flight event...");
        shutdown_state.begin_shutdown();
        let _ = shutdown_tx.send(true);
    });

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let span = info_span!("controller.watch", operation = "watch_loop");
        let end = watch_once(&secrets, &dispatcher, &server_state, &mut shutdown_rx)
            .instrument(span)
            .await;

        let Some(delay) = end.restart_delay(&config) else {
            break;
        };
        server_state.set_ready(false);
        metrics::increment_watch_restarts(end.reason());
        match &end {
            WatchEnd::Failed(reason) => warn!(
                reason = reason.as_str(),
                "Secret watch failed, restarting in {} seconds...",
                delay.as_secs()
            ),
            _ => warn!(
                "Secret watch stream ended, restarting in {} seconds...",
                delay.as_secs()
            ),
        }

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            Ok(()) = shutdown_rx.changed() => {}
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}

async fn watch_once(
    secrets: &Api<Secret>,
    dispatcher: &Dispatcher,
    server_state: &ServerState,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> WatchEnd {
    let stream = match secrets.watch(&WatchParams::default(), "0").await {
        Ok(stream) => stream,
        Err(e) => return WatchEnd::Failed(format!("failed to open watch: {e}")),
    };
    let mut stream = pin!(stream);

    server_state.set_ready(true);
    info!("Watching secrets for binding requests");

    loop {
        let next = tokio::select! {
            next = stream.next() => next,
            Ok(()) = shutdown_rx.changed() => return WatchEnd::Shutdown,
        };

        match next {
            None => return WatchEnd::Closed,
            Some(Err(e)) => return WatchEnd::Failed(e.to_string()),
            Some(Ok(WatchEvent::Error(e))) => {
                metrics::increment_events("error");
                return WatchEnd::Failed(format!("watch error event: {e:?}"));
            }
            Some(Ok(event)) => {
                let report = dispatcher.dispatch(event).await;
                debug!(
                    outcome = report.outcome.label(),
                    request_removed = report.request_removed,
                    "watch.event.processed"
                );
            }
        }

        if *shutdown_rx.borrow() {
            return WatchEnd::Shutdown;
        }
    }
}
