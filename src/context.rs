// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the credential-issuer reconciler.
//!
//! The reconciler is serialized by the sync loop, so nothing in here needs a
//! lock beyond what the proxy lifecycle and cert providers already carry for
//! their cross-task sharing.

use std::collections::BTreeMap;

use kube::Client;
use tokio::sync::OnceCell;

use crate::constants::{
    DEFAULT_APP_NAME, DEFAULT_CA_SECRET_NAME, DEFAULT_CLUSTER_IP_SERVICE_NAME,
    DEFAULT_CREDENTIAL_ISSUER_NAME, DEFAULT_LOAD_BALANCER_SERVICE_NAME, DEFAULT_NAMESPACE,
    DEFAULT_SIGNER_SECRET_NAME, DEFAULT_TLS_SECRET_NAME,
};
use crate::dynamic_cert::DynamicCertProvider;
use crate::labels::{
    APP_LABEL, COMPONENT_IMPERSONATION_PROXY, K8S_COMPONENT, K8S_MANAGED_BY, K8S_NAME,
    MANAGED_BY_PERSONA,
};
use crate::proxy::ProxyLifecycle;

/// Installation-time settings: where the controller lives and what its
/// managed objects are named. All of these are fixed for the life of the
/// process.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Namespace the controller manages Services and Secrets in
    pub namespace: String,
    /// Name of the singleton `CredentialIssuer` resource
    pub credential_issuer_name: String,
    /// Name of the generated LoadBalancer Service
    pub load_balancer_service_name: String,
    /// Name of the generated ClusterIP Service
    pub cluster_ip_service_name: String,
    /// Name of the serving-certificate secret
    pub tls_secret_name: String,
    /// Name of the CA secret
    pub ca_secret_name: String,
    /// Name of the signer secret maintained by the sister controller
    pub signer_secret_name: String,
    /// Value of the `app` selector label on managed Services
    pub app_name: String,
    /// Label map stamped on every managed resource
    pub labels: BTreeMap<String, String>,
}

impl Settings {
    /// Load settings from `PERSONA_*` environment variables, falling back to
    /// the installation defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let get = |key: &str, default: &str| {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let app_name = get("PERSONA_APP_NAME", DEFAULT_APP_NAME);
        let labels = Self::default_labels(&app_name);

        Self {
            namespace: std::env::var("PERSONA_NAMESPACE")
                .or_else(|_| std::env::var("POD_NAMESPACE"))
                .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string()),
            credential_issuer_name: get(
                "PERSONA_CREDENTIAL_ISSUER_NAME",
                DEFAULT_CREDENTIAL_ISSUER_NAME,
            ),
            load_balancer_service_name: get(
                "PERSONA_LOAD_BALANCER_SERVICE_NAME",
                DEFAULT_LOAD_BALANCER_SERVICE_NAME,
            ),
            cluster_ip_service_name: get(
                "PERSONA_CLUSTER_IP_SERVICE_NAME",
                DEFAULT_CLUSTER_IP_SERVICE_NAME,
            ),
            tls_secret_name: get("PERSONA_TLS_SECRET_NAME", DEFAULT_TLS_SECRET_NAME),
            ca_secret_name: get("PERSONA_CA_SECRET_NAME", DEFAULT_CA_SECRET_NAME),
            signer_secret_name: get("PERSONA_SIGNER_SECRET_NAME", DEFAULT_SIGNER_SECRET_NAME),
            app_name,
            labels,
        }
    }

    /// The controller-wide label map for a given app name.
    #[must_use]
    pub fn default_labels(app_name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (APP_LABEL.to_string(), app_name.to_string()),
            (K8S_NAME.to_string(), app_name.to_string()),
            (K8S_MANAGED_BY.to_string(), MANAGED_BY_PERSONA.to_string()),
            (
                K8S_COMPONENT.to_string(),
                COMPONENT_IMPERSONATION_PROXY.to_string(),
            ),
        ])
    }
}

/// Shared state handed to every sync.
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,
    /// Installation settings
    pub settings: Settings,
    /// Serving-certificate provider read by the proxy's TLS hot path
    pub leaf_provider: DynamicCertProvider,
    /// Signer CA provider read by the proxy's client-cert validation
    pub signer_provider: DynamicCertProvider,
    /// Proxy server lifecycle
    pub proxy: ProxyLifecycle,
    /// Cached result of the auto-mode control-plane probe. The cluster's
    /// topology is probed once per process; later syncs reuse the answer.
    pub control_plane_probe: OnceCell<bool>,
}

impl Context {
    /// Assemble a context.
    #[must_use]
    pub fn new(
        client: Client,
        settings: Settings,
        leaf_provider: DynamicCertProvider,
        signer_provider: DynamicCertProvider,
        proxy: ProxyLifecycle,
    ) -> Self {
        Self {
            client,
            settings,
            leaf_provider,
            signer_provider,
            proxy,
            control_plane_probe: OnceCell::new(),
        }
    }
}
