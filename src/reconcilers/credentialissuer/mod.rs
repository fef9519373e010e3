// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `CredentialIssuer` reconciliation logic.
//!
//! Each sync runs the same fixed pipeline: validate the spec, decide whether
//! the proxy should run, converge the front-door Service, resolve the
//! endpoint, converge the CA and serving-certificate secrets, load the
//! signer, ensure the proxy task, and finally publish exactly one strategy
//! entry describing the result. Every step reads current cluster state and
//! converges, so replaying a sync with nothing changed performs no writes.
//!
//! Errors from the middle of the pipeline do not abort it: later steps that
//! still make sense run anyway (a proxy with no certificates keeps serving so
//! in-flight connections drain), all failures are collected, and the
//! published strategy carries them all.
//!
//! ## Module Structure
//!
//! - [`config`] - Spec validation
//! - [`endpoint`] - Endpoint resolution
//! - [`service`] - Front-door Service lifecycle
//! - [`secrets`] - CA, TLS, and signer secret handling
//! - [`status_helpers`] - Strategy construction and publication
//! - [`types`] - Shared types and imports

// Submodules
pub mod config;
pub mod endpoint;
pub mod secrets;
pub mod service;
pub mod status_helpers;
pub mod types;

use config::{load_proxy_config, ProxyConfig, ProxyMode};
use endpoint::{resolve_endpoint, ResolvedEndpoint};
use secrets::{delete_tls_secret_if_exists, ensure_ca, ensure_tls_secret, load_signer};
use service::{delete_services, ensure_service};
use status_helpers::{
    disabled_strategy, error_strategy, pending_strategy, publish_strategy, success_strategy,
};
#[allow(clippy::wildcard_imports)]
use types::*;

use crate::constants::{NODE_ROLE_LABEL, NODE_ROLE_LABEL_PREFIX};

/// Reconcile the singleton `CredentialIssuer`.
///
/// # Errors
///
/// Returns an error when any pipeline step failed; the same failures are
/// reported in the published strategy whenever the resource exists to carry
/// them.
pub async fn reconcile_credentialissuer(ctx: Arc<Context>) -> Result<()> {
    let settings = &ctx.settings;
    info!(
        "Reconciling CredentialIssuer: {}",
        settings.credential_issuer_name
    );

    // Without the resource there is nowhere to publish status, so this is a
    // plain error.
    let api: Api<CredentialIssuer> = Api::all(ctx.client.clone());
    let issuer = api
        .get(&settings.credential_issuer_name)
        .await
        .map_err(|e| anyhow!("could not get CredentialIssuer to update: {e}"))?;

    let config = match load_proxy_config(&issuer) {
        Ok(config) => config,
        Err(spec_error) => {
            debug!(error = %spec_error, "CredentialIssuer spec failed validation");
            ctx.proxy.ensure_stopped().await;
            ctx.leaf_provider.clear();
            ctx.signer_provider.clear();

            let mut errors: Vec<anyhow::Error> = vec![spec_error.clone().into()];
            if let Err(e) =
                publish_strategy(&ctx.client, settings, error_strategy(&spec_error.to_string()))
                    .await
            {
                errors.push(e);
            }
            return Err(aggregate_errors(errors));
        }
    };

    let enabled = match should_run_proxy(&ctx, &config).await {
        Ok(enabled) => enabled,
        Err(probe_error) => {
            let message = format!("{probe_error:#}");
            let mut errors: Vec<anyhow::Error> = vec![probe_error];
            if let Err(e) = publish_strategy(&ctx.client, settings, error_strategy(&message)).await
            {
                errors.push(e);
            }
            return Err(aggregate_errors(errors));
        }
    };

    if !enabled {
        return teardown(&ctx, config.mode == ProxyMode::Auto).await;
    }

    run_proxy_pipeline(&ctx, &config).await
}

/// The enabled path: service, endpoint, certs, signer, proxy, status.
async fn run_proxy_pipeline(ctx: &Arc<Context>, config: &ProxyConfig) -> Result<()> {
    let settings = &ctx.settings;
    let mut errors: Vec<anyhow::Error> = Vec::new();

    if let Err(e) = ensure_service(&ctx.client, settings, config).await {
        warn!(error = %format!("{e:#}"), "Failed to converge front-door Service");
        errors.push(e);
    }

    let resolved = match resolve_endpoint(&ctx.client, settings, config).await {
        Ok(resolved) => resolved,
        Err(e) => {
            errors.push(e);
            return finish_with_errors(ctx, errors).await;
        }
    };

    match resolved {
        ResolvedEndpoint::Pending => {
            debug!("Endpoint not yet available, running certless");

            // Pre-create the CA so certificates can be issued the moment an
            // ingress address shows up.
            if let Err(e) = ensure_ca(&ctx.client, settings).await {
                errors.push(e);
            }

            // A leftover serving certificate cannot match an endpoint that
            // does not exist.
            if let Err(e) = delete_tls_secret_if_exists(&ctx.client, settings).await {
                errors.push(e);
            }
            ctx.leaf_provider.clear();
            ctx.signer_provider.clear();

            if let Err(e) = ctx.proxy.ensure_running().await {
                errors.push(e);
            }

            if errors.is_empty() {
                publish_strategy(&ctx.client, settings, pending_strategy()).await?;
                Ok(())
            } else {
                finish_with_errors(ctx, errors).await
            }
        }
        ResolvedEndpoint::Ready { endpoint, sans } => {
            debug!(endpoint = %endpoint, "Resolved proxy endpoint");

            let ca = match ensure_ca(&ctx.client, settings).await {
                Ok(ca) => Some(ca),
                Err(e) => {
                    errors.push(e);
                    ctx.leaf_provider.clear();
                    None
                }
            };

            if let Some(ca) = &ca {
                match ensure_tls_secret(&ctx.client, settings, ca, &sans).await {
                    Ok((cert_pem, key_pem)) => {
                        ctx.leaf_provider.set_cert_key(cert_pem, key_pem);
                    }
                    Err(e) => {
                        errors.push(e);
                        ctx.leaf_provider.clear();
                    }
                }
            }

            if let Err(e) = load_signer(&ctx.client, settings, &ctx.signer_provider).await {
                errors.push(e);
            }

            if let Err(e) = ctx.proxy.ensure_running().await {
                errors.push(e);
            }

            if errors.is_empty() {
                let ca = ca.expect("CA present when no errors were recorded");
                publish_strategy(
                    &ctx.client,
                    settings,
                    success_strategy(&endpoint, ca.cert_pem().as_bytes()),
                )
                .await?;
                Ok(())
            } else {
                finish_with_errors(ctx, errors).await
            }
        }
    }
}

/// The disabled path: tear down everything except the CA secret.
async fn teardown(ctx: &Arc<Context>, auto: bool) -> Result<()> {
    let settings = &ctx.settings;
    debug!(auto, "Impersonation proxy is disabled, tearing down");

    let mut errors: Vec<anyhow::Error> = Vec::new();

    if let Err(e) = delete_services(&ctx.client, settings).await {
        errors.push(e);
    }

    if let Err(e) = delete_tls_secret_if_exists(&ctx.client, settings).await {
        errors.push(e);
    }

    ctx.proxy.ensure_stopped().await;
    ctx.leaf_provider.clear();
    ctx.signer_provider.clear();

    if errors.is_empty() {
        publish_strategy(&ctx.client, settings, disabled_strategy(auto)).await?;
        Ok(())
    } else {
        finish_with_errors(ctx, errors).await
    }
}

/// Publish the collected failures and return them as one error.
async fn finish_with_errors(ctx: &Arc<Context>, mut errors: Vec<anyhow::Error>) -> Result<()> {
    let message = aggregate_message(&errors);
    if let Err(e) = publish_strategy(&ctx.client, &ctx.settings, error_strategy(&message)).await {
        errors.push(e);
    }
    Err(aggregate_errors(errors))
}

/// Decide whether the proxy should run under the current mode.
async fn should_run_proxy(ctx: &Arc<Context>, config: &ProxyConfig) -> Result<bool> {
    match config.mode {
        ProxyMode::Disabled => Ok(false),
        ProxyMode::Enabled => Ok(true),
        ProxyMode::Auto => {
            let has_control_plane = cluster_has_control_plane_nodes(ctx).await?;
            Ok(!has_control_plane)
        }
    }
}

/// Probe the cluster for control-plane nodes, once per process.
async fn cluster_has_control_plane_nodes(ctx: &Arc<Context>) -> Result<bool> {
    let result = ctx
        .control_plane_probe
        .get_or_try_init(|| async {
            let api: Api<Node> = Api::all(ctx.client.clone());
            let nodes = api.list(&ListParams::default()).await?;
            if nodes.items.is_empty() {
                return Err(anyhow!("no nodes found"));
            }
            let has_control_plane = nodes.items.iter().any(is_control_plane_node);
            info!(
                node_count = nodes.items.len(),
                has_control_plane, "Probed cluster topology"
            );
            Ok(has_control_plane)
        })
        .await?;
    Ok(*result)
}

/// Whether the node carries a control-plane role label in either of the two
/// conventions seen in the wild.
fn is_control_plane_node(node: &Node) -> bool {
    let labels = node.labels();

    labels.iter().any(|(key, value)| {
        if let Some(role) = key.strip_prefix(NODE_ROLE_LABEL_PREFIX) {
            return role == "control-plane" || role == "master";
        }
        key.as_str() == NODE_ROLE_LABEL
            && (value.as_str() == "control-plane" || value.as_str() == "master")
    })
}

/// Deterministic bracketed concatenation for multi-failure syncs.
fn aggregate_message(errors: &[anyhow::Error]) -> String {
    if errors.len() == 1 {
        format!("{:#}", errors[0])
    } else {
        let joined = errors
            .iter()
            .map(|e| format!("{e:#}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("[{joined}]")
    }
}

fn aggregate_errors(mut errors: Vec<anyhow::Error>) -> anyhow::Error {
    if errors.len() == 1 {
        errors.remove(0)
    } else {
        anyhow!(aggregate_message(&errors))
    }
}
