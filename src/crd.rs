// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions for the Persona controller.
//!
//! A single cluster-scoped [`CredentialIssuer`] resource drives the
//! controller. Its spec describes how the impersonation proxy should be
//! exposed; its status carries one strategy entry per authentication path the
//! installation advertises. This controller owns exactly the
//! `ImpersonationProxy` strategy entry and preserves all others.
//!
//! # Example
//!
//! ```rust,no_run
//! use persona::crd::{CredentialIssuerSpec, ImpersonationProxySpec, ImpersonationProxyServiceSpec};
//!
//! let spec = CredentialIssuerSpec {
//!     impersonation_proxy: Some(ImpersonationProxySpec {
//!         mode: "enabled".to_string(),
//!         external_endpoint: Some("proxy.example.com:443".to_string()),
//!         service: ImpersonationProxyServiceSpec {
//!             r#type: "None".to_string(),
//!             ..Default::default()
//!         },
//!     }),
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Spec Enumerated Values
// ============================================================================

/// Decide automatically whether the proxy should run
pub const MODE_AUTO: &str = "auto";

/// Always run the proxy
pub const MODE_ENABLED: &str = "enabled";

/// Never run the proxy
pub const MODE_DISABLED: &str = "disabled";

/// Do not create a front-door Service
pub const SERVICE_TYPE_NONE: &str = "None";

/// Create a LoadBalancer Service
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";

/// Create a ClusterIP Service
pub const SERVICE_TYPE_CLUSTER_IP: &str = "ClusterIP";

/// Spec of the singleton [`CredentialIssuer`] resource.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "persona.firestoned.io",
    version = "v1alpha1",
    kind = "CredentialIssuer",
    status = "CredentialIssuerStatus",
    shortname = "ci"
)]
#[serde(rename_all = "camelCase")]
pub struct CredentialIssuerSpec {
    /// Configuration of the impersonation proxy. Required; a missing block is
    /// rejected by the controller at reconcile time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonation_proxy: Option<ImpersonationProxySpec>,
}

/// How the impersonation proxy should be run and exposed.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationProxySpec {
    /// One of `auto`, `enabled`, or `disabled`. In `auto` mode the proxy runs
    /// only when no control-plane nodes are visible to the controller.
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Externally reachable address (`host` or `host:port`, IPv6 in brackets)
    /// at which the proxy is advertised. Required when `service.type` is
    /// `None`; otherwise the address is discovered from the Service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_endpoint: Option<String>,

    /// Front-door Service configuration.
    #[serde(default)]
    pub service: ImpersonationProxyServiceSpec,
}

impl Default for ImpersonationProxySpec {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            external_endpoint: None,
            service: ImpersonationProxyServiceSpec::default(),
        }
    }
}

/// Front-door Service settings for the impersonation proxy.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationProxyServiceSpec {
    /// One of `None`, `LoadBalancer`, or `ClusterIP`.
    #[serde(default = "default_service_type", rename = "type")]
    pub r#type: String,

    /// Annotations to place on the generated Service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// Static IP requested for a LoadBalancer Service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_ip: Option<String>,
}

impl Default for ImpersonationProxyServiceSpec {
    fn default() -> Self {
        Self {
            r#type: default_service_type(),
            annotations: None,
            load_balancer_ip: None,
        }
    }
}

fn default_mode() -> String {
    MODE_AUTO.to_string()
}

fn default_service_type() -> String {
    SERVICE_TYPE_LOAD_BALANCER.to_string()
}

/// Status of the [`CredentialIssuer`] resource.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialIssuerStatus {
    /// One entry per authentication strategy the installation advertises.
    /// Strategies are keyed by `type`; each controller owns exactly one type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strategies: Vec<CredentialIssuerStrategy>,
}

/// One advertised authentication strategy.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialIssuerStrategy {
    /// Strategy key, e.g. `ImpersonationProxy`.
    #[serde(rename = "type")]
    pub r#type: String,

    /// `Success` or `Error`.
    pub status: String,

    /// Programmatic reason, e.g. `Listening` or `Pending`.
    pub reason: String,

    /// Human-readable explanation.
    pub message: String,

    /// RFC 3339 timestamp of the last time this entry was computed.
    pub last_update_time: String,

    /// Connection details, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<CredentialIssuerFrontend>,
}

/// Frontend details describing how clients reach a successful strategy.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialIssuerFrontend {
    /// Frontend key, e.g. `ImpersonationProxyFrontend`.
    #[serde(rename = "type")]
    pub r#type: String,

    /// Connection details for the impersonation proxy frontend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonation_proxy_info: Option<ImpersonationProxyInfo>,
}

/// Connection details for the impersonation proxy.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationProxyInfo {
    /// `https://` URL clients should connect to.
    pub endpoint: String,

    /// Base64 of the PEM CA bundle clients use to verify the proxy.
    pub certificate_authority_data: String,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
