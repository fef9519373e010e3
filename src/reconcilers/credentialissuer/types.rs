// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared types and imports for `CredentialIssuer` reconciliation.

#![allow(clippy::wildcard_imports)]

// Re-export commonly used types from parent modules
pub use crate::context::{Context, Settings};
pub use crate::crd::{
    CredentialIssuer, CredentialIssuerFrontend, CredentialIssuerStatus, CredentialIssuerStrategy,
    ImpersonationProxyInfo,
};
pub use crate::dynamic_cert::DynamicCertProvider;
pub use crate::errors::{EndpointError, SignerError, SpecError};
pub use crate::pki::{CertificateAuthority, SubjectAltName};

// Re-export commonly used Kubernetes types
pub use k8s_openapi::api::core::v1::{Node, Secret, Service, ServicePort, ServiceSpec};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
pub use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
pub use k8s_openapi::ByteString;

// Re-export kube-rs types
pub use kube::{
    api::{DeleteParams, ListParams, PostParams},
    client::Client,
    Api, ResourceExt,
};

// Re-export common utilities
pub use anyhow::{anyhow, Result};
pub use chrono::Utc;
pub use std::collections::BTreeMap;
pub use std::net::IpAddr;
pub use std::sync::Arc;
pub use tracing::{debug, info, warn};
