// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Spec validation for the `CredentialIssuer` resource.
//!
//! The raw spec uses free-form strings so that a bad value produces a status
//! message instead of being silently dropped by the API server; this module
//! is where those strings become typed. It is pure: all cluster state
//! (services, nodes) is consulted later in the sync.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use crate::crd::{
    ImpersonationProxySpec, MODE_AUTO, MODE_DISABLED, MODE_ENABLED, SERVICE_TYPE_CLUSTER_IP,
    SERVICE_TYPE_LOAD_BALANCER, SERVICE_TYPE_NONE,
};

/// Validated proxy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// Run only when no control-plane nodes are visible
    Auto,
    /// Always run
    Enabled,
    /// Never run
    Disabled,
}

/// Validated front-door service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    /// No service; an explicit external endpoint is required
    None,
    /// LoadBalancer service
    LoadBalancer,
    /// ClusterIP service
    ClusterIp,
}

/// An external endpoint from the spec, split into its parts.
///
/// The raw form is what gets advertised to clients (port included); the host
/// part is what goes into the certificate SAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEndpoint {
    raw: String,
    host: String,
    port: Option<u16>,
}

impl ParsedEndpoint {
    /// The endpoint exactly as configured, advertised to clients.
    #[must_use]
    pub fn advertised(&self) -> &str {
        &self.raw
    }

    /// The host part, brackets stripped.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The explicit port, when one was configured.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The SAN this endpoint requires on the serving certificate.
    #[must_use]
    pub fn san(&self) -> SubjectAltName {
        SubjectAltName::from_host(&self.host)
    }
}

/// The spec after validation.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Validated mode
    pub mode: ProxyMode,
    /// Validated external endpoint, when configured
    pub external_endpoint: Option<ParsedEndpoint>,
    /// Validated service type
    pub service_type: ServiceType,
    /// Annotations for the generated service
    pub annotations: Option<BTreeMap<String, String>>,
    /// Static load balancer IP, already validated to parse
    pub load_balancer_ip: Option<String>,
}

/// Validate the `CredentialIssuer` spec into a [`ProxyConfig`].
pub fn load_proxy_config(issuer: &CredentialIssuer) -> Result<ProxyConfig, SpecError> {
    let proxy_spec: &ImpersonationProxySpec = issuer
        .spec
        .impersonation_proxy
        .as_ref()
        .ok_or(SpecError::MissingImpersonationProxy)?;

    let mode = match proxy_spec.mode.as_str() {
        MODE_AUTO => ProxyMode::Auto,
        MODE_ENABLED => ProxyMode::Enabled,
        MODE_DISABLED => ProxyMode::Disabled,
        other => return Err(SpecError::InvalidMode(other.to_string())),
    };

    let service_type = match proxy_spec.service.r#type.as_str() {
        SERVICE_TYPE_NONE => ServiceType::None,
        SERVICE_TYPE_LOAD_BALANCER => ServiceType::LoadBalancer,
        SERVICE_TYPE_CLUSTER_IP => ServiceType::ClusterIp,
        other => return Err(SpecError::InvalidServiceType(other.to_string())),
    };

    if let Some(ip) = proxy_spec
        .service
        .load_balancer_ip
        .as_deref()
        .filter(|ip| !ip.is_empty())
    {
        if ip.parse::<IpAddr>().is_err() {
            return Err(SpecError::InvalidLoadBalancerIp(ip.to_string()));
        }
    }

    let external_endpoint = proxy_spec
        .external_endpoint
        .as_deref()
        .filter(|e| !e.is_empty())
        .map(parse_external_endpoint)
        .transpose()?;

    if service_type == ServiceType::None && external_endpoint.is_none() {
        return Err(SpecError::MissingExternalEndpoint);
    }

    Ok(ProxyConfig {
        mode,
        external_endpoint,
        service_type,
        annotations: proxy_spec.service.annotations.clone(),
        load_balancer_ip: proxy_spec
            .service
            .load_balancer_ip
            .clone()
            .filter(|ip| !ip.is_empty()),
    })
}

/// Parse `host`, `host:port`, or `[v6]:port`. Bare IPv6 without brackets is
/// accepted when the whole string parses as an address.
pub fn parse_external_endpoint(endpoint: &str) -> Result<ParsedEndpoint, SpecError> {
    let invalid = |reason: &str| SpecError::InvalidExternalEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    // A bare address, IPv6 included, is a host with no port.
    if endpoint.parse::<IpAddr>().is_ok() {
        return Ok(ParsedEndpoint {
            raw: endpoint.to_string(),
            host: endpoint.to_string(),
            port: None,
        });
    }

    if let Some(rest) = endpoint.strip_prefix('[') {
        let Some((host, after)) = rest.split_once(']') else {
            return Err(invalid("missing ']' in address"));
        };
        if host.parse::<IpAddr>().is_err() {
            return Err(invalid("bracketed host is not an IP address"));
        }
        let port = match after {
            "" => None,
            p => {
                let Some(p) = p.strip_prefix(':') else {
                    return Err(invalid("expected ':' after ']'"));
                };
                Some(parse_port(p).ok_or_else(|| invalid("invalid port"))?)
            }
        };
        return Ok(ParsedEndpoint {
            raw: endpoint.to_string(),
            host: host.to_string(),
            port,
        });
    }

    match endpoint.matches(':').count() {
        0 => {
            if endpoint.is_empty() {
                return Err(invalid("missing host"));
            }
            Ok(ParsedEndpoint {
                raw: endpoint.to_string(),
                host: endpoint.to_string(),
                port: None,
            })
        }
        1 => {
            let (host, port) = endpoint.split_once(':').expect("one colon present");
            if host.is_empty() {
                return Err(invalid("missing host"));
            }
            let port = parse_port(port).ok_or_else(|| invalid("invalid port"))?;
            Ok(ParsedEndpoint {
                raw: endpoint.to_string(),
                host: host.to_string(),
                port: Some(port),
            })
        }
        _ => Err(invalid("too many colons in address")),
    }
}

fn parse_port(port: &str) -> Option<u16> {
    if port.is_empty() {
        return None;
    }
    port.parse::<u16>().ok().filter(|p| *p != 0)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
