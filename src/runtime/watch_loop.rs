// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch multiplexing and the serial sync loop.
//!
//! Three watch streams (the `CredentialIssuer` by name, Services and Secrets
//! in the install namespace) and the proxy supervisor all feed one unbounded
//! trigger channel. Because the controller has a single logical key, a
//! trigger carries no payload; the sync loop coalesces whatever has queued up
//! and runs one sync at a time. That serialization is what lets the
//! reconciler hold no locks of its own.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Resource, ResourceExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use k8s_openapi::api::core::v1::{Secret, Service};

use crate::context::Context;
use crate::crd::CredentialIssuer;
use crate::metrics;
use crate::reconcilers::reconcile_credentialissuer;
use crate::runtime::error_policy::SyncBackoff;

/// Spawn the three watch forwarder tasks.
///
/// Each task runs for the life of the process, restarting its watch with
/// backoff on stream errors, and sends a unit trigger whenever an object the
/// controller cares about is touched.
pub fn spawn_watchers(ctx: &Arc<Context>, trigger_tx: &mpsc::UnboundedSender<()>) {
    let settings = &ctx.settings;

    let credential_issuer_api: Api<CredentialIssuer> = Api::all(ctx.client.clone());
    let credential_issuer_config = watcher::Config::default().fields(&format!(
        "metadata.name={}",
        settings.credential_issuer_name
    ));
    tokio::spawn(forward_touches(
        credential_issuer_api,
        credential_issuer_config,
        trigger_tx.clone(),
        // The field selector already narrows to the singleton.
        |_: &CredentialIssuer| true,
    ));

    let service_api: Api<Service> = Api::namespaced(ctx.client.clone(), &settings.namespace);
    let watched_services = [
        settings.load_balancer_service_name.clone(),
        settings.cluster_ip_service_name.clone(),
    ];
    tokio::spawn(forward_touches(
        service_api,
        watcher::Config::default(),
        trigger_tx.clone(),
        move |service: &Service| watched_services.contains(&service.name_any()),
    ));

    let secret_api: Api<Secret> = Api::namespaced(ctx.client.clone(), &settings.namespace);
    let watched_secrets = [
        settings.tls_secret_name.clone(),
        settings.ca_secret_name.clone(),
        settings.signer_secret_name.clone(),
    ];
    tokio::spawn(forward_touches(
        secret_api,
        watcher::Config::default(),
        trigger_tx.clone(),
        move |secret: &Secret| watched_secrets.contains(&secret.name_any()),
    ));
}

/// Forward touch events for matching objects as unit triggers.
async fn forward_touches<K>(
    api: Api<K>,
    config: watcher::Config,
    trigger_tx: mpsc::UnboundedSender<()>,
    matches: impl Fn(&K) -> bool + Send + 'static,
) where
    K: Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned + Send + 'static,
    K::DynamicType: Default + std::hash::Hash + Eq + Clone,
{
    let stream = watcher(api, config).touched_objects().default_backoff();
    futures::pin_mut!(stream);

    while let Some(event) = stream.next().await {
        match event {
            Ok(object) => {
                if matches(&object) {
                    debug!(name = %object.name_any(), "Watched object touched, enqueueing sync");
                    if trigger_tx.send(()).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Watch stream error");
            }
        }
    }
}

/// Run the serial sync loop until the trigger channel closes.
///
/// One trigger means "state may have changed"; pending triggers are coalesced
/// before each sync. A failed sync retries with exponential backoff, but a
/// fresh trigger short-circuits the wait so reactions to real changes stay
/// prompt.
pub async fn run_sync_loop(ctx: Arc<Context>, mut trigger_rx: mpsc::UnboundedReceiver<()>) {
    info!("Starting credential issuer sync loop");

    while trigger_rx.recv().await.is_some() {
        drain_pending(&mut trigger_rx);

        let mut backoff = SyncBackoff::new();
        loop {
            let started = Instant::now();
            match reconcile_credentialissuer(Arc::clone(&ctx)).await {
                Ok(()) => {
                    metrics::record_sync(true, started.elapsed());
                    debug!("Sync completed");
                    break;
                }
                Err(e) => {
                    metrics::record_sync(false, started.elapsed());
                    error!(error = %format!("{e:#}"), "Failed to sync CredentialIssuer");

                    let delay = backoff.next_delay();
                    debug!(delay_ms = delay.as_millis() as u64, "Scheduling sync retry");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        received = trigger_rx.recv() => {
                            if received.is_none() {
                                return;
                            }
                            drain_pending(&mut trigger_rx);
                        }
                    }
                }
            }
        }
    }

    info!("Trigger channel closed, sync loop exiting");
}

fn drain_pending(trigger_rx: &mut mpsc::UnboundedReceiver<()>) {
    while trigger_rx.try_recv().is_ok() {}
}
