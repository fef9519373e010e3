// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle management for the impersonation proxy server.
//!
//! The reconciler drives the proxy through exactly one operation per sync:
//! ensure it is running or ensure it is stopped. The server itself is an
//! opaque collaborator behind the [`ProxyServer`] trait, built by a
//! [`ProxyFactory`]; the lifecycle owns the stop channel, observes completion
//! through a supervisor task, and records unexpected exits so the next sync
//! can report and recover from them.
//!
//! Invariant: the supervisor never touches lifecycle state directly. It
//! writes a one-shot error slot and pokes the sync queue, which preserves the
//! single-writer property of the reconciler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::PROXY_SERVER_PORT;
use crate::dynamic_cert::DynamicCertProvider;

/// A running proxy server.
///
/// Implementations serve until the shutdown receiver observes `true`, then
/// return `Ok(())`. Returning early, with or without an error, counts as an
/// unexpected exit and is reported on the next sync.
#[async_trait::async_trait]
pub trait ProxyServer: Send {
    /// Serve until shutdown is signalled.
    async fn serve(self: Box<Self>, shutdown: watch::Receiver<bool>) -> Result<()>;
}

/// Builds a [`ProxyServer`] bound to the given port, serving TLS from the
/// leaf provider and validating client certificates against the signer
/// provider. Both providers are long-lived; certificate rotation happens by
/// swapping their contents, never by rebuilding the server.
pub type ProxyFactory = Arc<
    dyn Fn(u16, DynamicCertProvider, DynamicCertProvider) -> Result<Box<dyn ProxyServer>>
        + Send
        + Sync,
>;

struct RunningProxy {
    stop_tx: watch::Sender<bool>,
    stop_requested: Arc<AtomicBool>,
    supervisor: Option<JoinHandle<()>>,
}

struct LifecycleState {
    running: Option<RunningProxy>,
}

/// Starts, stops, and supervises the proxy server.
pub struct ProxyLifecycle {
    factory: ProxyFactory,
    leaf_provider: DynamicCertProvider,
    signer_provider: DynamicCertProvider,
    requeue_tx: mpsc::UnboundedSender<()>,
    state: Mutex<LifecycleState>,
    // Written by the supervisor task, drained by the reconciler. Kept outside
    // the async state lock so the supervisor can never deadlock against a
    // reconciler that is awaiting it.
    exit_error: Arc<StdMutex<Option<String>>>,
}

impl ProxyLifecycle {
    /// Create a stopped lifecycle.
    ///
    /// `requeue_tx` feeds the controller's sync queue; the supervisor sends
    /// on it when the proxy exits unexpectedly.
    pub fn new(
        factory: ProxyFactory,
        leaf_provider: DynamicCertProvider,
        signer_provider: DynamicCertProvider,
        requeue_tx: mpsc::UnboundedSender<()>,
    ) -> Self {
        Self {
            factory,
            leaf_provider,
            signer_provider,
            requeue_tx,
            state: Mutex::new(LifecycleState { running: None }),
            exit_error: Arc::new(StdMutex::new(None)),
        }
    }

    /// Whether a proxy task is currently believed to be running.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running.is_some()
    }

    /// Ensure the proxy server is running.
    ///
    /// If a previous run exited unexpectedly, the recorded error is returned
    /// exactly once and the stale run is forgotten; the sync after that will
    /// start a fresh server.
    pub async fn ensure_running(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if let Some(message) = self.take_exit_error() {
            state.running = None;
            return Err(anyhow!(message));
        }

        if state.running.is_some() {
            debug!("Proxy server already running");
            return Ok(());
        }

        let server = (self.factory)(
            PROXY_SERVER_PORT,
            self.leaf_provider.clone(),
            self.signer_provider.clone(),
        )?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_requested = Arc::new(AtomicBool::new(false));
        let server_handle = tokio::spawn(server.serve(stop_rx));

        let supervisor = tokio::spawn(supervise(
            server_handle,
            Arc::clone(&stop_requested),
            Arc::clone(&self.exit_error),
            self.requeue_tx.clone(),
        ));

        state.running = Some(RunningProxy {
            stop_tx,
            stop_requested,
            supervisor: Some(supervisor),
        });

        info!(port = PROXY_SERVER_PORT, "Started impersonation proxy server");
        Ok(())
    }

    /// Ensure the proxy server is stopped, waiting for completion.
    pub async fn ensure_stopped(&self) {
        let mut state = self.state.lock().await;

        if let Some(mut running) = state.running.take() {
            running.stop_requested.store(true, Ordering::SeqCst);
            let _ = running.stop_tx.send(true);
            if let Some(supervisor) = running.supervisor.take() {
                let _ = supervisor.await;
            }
            info!("Stopped impersonation proxy server");
        }

        // A run that already died on its own has nothing left to report once
        // the desired state is stopped.
        self.exit_error
            .lock()
            .expect("exit error lock poisoned")
            .take();
    }

    fn take_exit_error(&self) -> Option<String> {
        self.exit_error
            .lock()
            .expect("exit error lock poisoned")
            .take()
    }
}

/// Observe one proxy run to completion.
///
/// A completion while stop was requested is a clean shutdown. Anything else
/// is recorded and the singleton key is re-enqueued so the next sync reports
/// the failure and restarts the server.
async fn supervise(
    server_handle: JoinHandle<Result<()>>,
    stop_requested: Arc<AtomicBool>,
    exit_error: Arc<StdMutex<Option<String>>>,
    requeue_tx: mpsc::UnboundedSender<()>,
) {
    let result = server_handle.await;

    if stop_requested.load(Ordering::SeqCst) {
        debug!("Proxy server stopped on request");
        return;
    }

    let message = match result {
        Ok(Ok(())) => "unexpected shutdown of proxy server".to_string(),
        Ok(Err(e)) => format!("{e:#}"),
        Err(join_error) => format!("proxy server task panicked: {join_error}"),
    };

    warn!(error = %message, "Impersonation proxy server exited unexpectedly");
    crate::metrics::record_proxy_unexpected_exit();

    *exit_error.lock().expect("exit error lock poisoned") = Some(message);
    let _ = requeue_tx.send(());
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod proxy_tests;
