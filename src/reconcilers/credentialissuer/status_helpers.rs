// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Strategy construction and publication for the `CredentialIssuer` status.
//!
//! The strategies array is shared with peer controllers: merging is a
//! key-preserving splice on the strategy `type`, never a wholesale
//! overwrite. An entry that would be byte-identical apart from its timestamp
//! is not written at all, which keeps steady-state syncs free of API writes.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::status_reasons::{
    FRONTEND_TYPE_IMPERSONATION_PROXY, MESSAGE_AUTO_DISABLED, MESSAGE_MANUALLY_DISABLED,
    MESSAGE_PENDING, MESSAGE_SUCCESS, STRATEGY_REASON_DISABLED,
    STRATEGY_REASON_ERROR_DURING_SETUP, STRATEGY_REASON_LISTENING, STRATEGY_REASON_PENDING,
    STRATEGY_STATUS_ERROR, STRATEGY_STATUS_SUCCESS, STRATEGY_TYPE_IMPERSONATION_PROXY,
};

/// Strategy for a proxy that is serving with valid certificates.
pub(super) fn success_strategy(endpoint: &str, ca_bundle_pem: &[u8]) -> CredentialIssuerStrategy {
    CredentialIssuerStrategy {
        r#type: STRATEGY_TYPE_IMPERSONATION_PROXY.to_string(),
        status: STRATEGY_STATUS_SUCCESS.to_string(),
        reason: STRATEGY_REASON_LISTENING.to_string(),
        message: MESSAGE_SUCCESS.to_string(),
        last_update_time: Utc::now().to_rfc3339(),
        frontend: Some(CredentialIssuerFrontend {
            r#type: FRONTEND_TYPE_IMPERSONATION_PROXY.to_string(),
            impersonation_proxy_info: Some(ImpersonationProxyInfo {
                endpoint: format!("https://{endpoint}"),
                certificate_authority_data: BASE64_STANDARD.encode(ca_bundle_pem),
            }),
        }),
    }
}

/// Strategy for a proxy that is waiting for its endpoint.
pub(super) fn pending_strategy() -> CredentialIssuerStrategy {
    error_strategy_with_reason(STRATEGY_REASON_PENDING, MESSAGE_PENDING)
}

/// Strategy for a disabled proxy, distinguishing auto from manual.
pub(super) fn disabled_strategy(auto: bool) -> CredentialIssuerStrategy {
    let message = if auto {
        MESSAGE_AUTO_DISABLED
    } else {
        MESSAGE_MANUALLY_DISABLED
    };
    error_strategy_with_reason(STRATEGY_REASON_DISABLED, message)
}

/// Strategy for a sync that failed.
pub(super) fn error_strategy(message: &str) -> CredentialIssuerStrategy {
    error_strategy_with_reason(STRATEGY_REASON_ERROR_DURING_SETUP, message)
}

fn error_strategy_with_reason(reason: &str, message: &str) -> CredentialIssuerStrategy {
    CredentialIssuerStrategy {
        r#type: STRATEGY_TYPE_IMPERSONATION_PROXY.to_string(),
        status: STRATEGY_STATUS_ERROR.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        last_update_time: Utc::now().to_rfc3339(),
        frontend: None,
    }
}

/// Splice our strategy into the existing array, preserving peer entries and
/// their order. Our entry is replaced in place when present, appended when
/// absent.
pub(super) fn merge_strategy(
    mut strategies: Vec<CredentialIssuerStrategy>,
    new_strategy: CredentialIssuerStrategy,
) -> Vec<CredentialIssuerStrategy> {
    match strategies
        .iter_mut()
        .find(|strategy| strategy.r#type == new_strategy.r#type)
    {
        Some(existing) => *existing = new_strategy,
        None => strategies.push(new_strategy),
    }
    strategies
}

/// Whether two strategies are equal apart from their timestamps.
pub(super) fn strategy_unchanged(
    existing: &CredentialIssuerStrategy,
    new_strategy: &CredentialIssuerStrategy,
) -> bool {
    existing.r#type == new_strategy.r#type
        && existing.status == new_strategy.status
        && existing.reason == new_strategy.reason
        && existing.message == new_strategy.message
        && existing.frontend == new_strategy.frontend
}

/// Write our strategy into the resource status.
pub(super) async fn publish_strategy(
    client: &Client,
    settings: &Settings,
    strategy: CredentialIssuerStrategy,
) -> Result<()> {
    let api: Api<CredentialIssuer> = Api::all(client.clone());

    let mut issuer = api
        .get(&settings.credential_issuer_name)
        .await
        .map_err(|e| anyhow!("could not get CredentialIssuer to update: {e}"))?;

    let existing_strategies = issuer
        .status
        .as_ref()
        .map(|status| status.strategies.clone())
        .unwrap_or_default();

    if existing_strategies
        .iter()
        .any(|existing| strategy_unchanged(existing, &strategy))
    {
        debug!("CredentialIssuer strategy unchanged, skipping status update");
        return Ok(());
    }

    let strategies = merge_strategy(existing_strategies, strategy);
    issuer.status = Some(CredentialIssuerStatus { strategies });
    issuer.metadata.managed_fields = None;

    info!(
        "Updating CredentialIssuer {} status",
        settings.credential_issuer_name
    );
    let body = serde_json::to_vec(&issuer)?;
    api.replace_status(
        &settings.credential_issuer_name,
        &PostParams::default(),
        body,
    )
    .await
    .map_err(|e| anyhow!("failed to update CredentialIssuer status: {e}"))?;

    Ok(())
}

#[cfg(test)]
#[path = "status_helpers_tests.rs"]
mod status_helpers_tests;
