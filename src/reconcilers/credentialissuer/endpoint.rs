// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resolution of the externally observed proxy endpoint.
//!
//! Precedence: an explicit endpoint from the spec wins; otherwise the
//! front-door Service is inspected (LoadBalancer ingress or ClusterIP
//! allocation). A Service that exists but has not yet been assigned an
//! address resolves to [`ResolvedEndpoint::Pending`].
//!
//! The SAN set and the advertised endpoint are resolved together so they can
//! never disagree: the serving certificate is always issued for exactly the
//! names resolved here.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use super::config::{ProxyConfig, ServiceType};

/// The outcome of endpoint resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedEndpoint {
    /// No address is available yet; certificates cannot be issued.
    Pending,
    /// An address is known.
    Ready {
        /// `host` or `host:port` advertised to clients (scheme added at
        /// publication time)
        endpoint: String,
        /// Exact SAN set required on the serving certificate
        sans: Vec<SubjectAltName>,
    },
}

/// Resolve the endpoint for the current config and cluster state.
pub async fn resolve_endpoint(
    client: &Client,
    settings: &Settings,
    config: &ProxyConfig,
) -> Result<ResolvedEndpoint> {
    if let Some(endpoint) = &config.external_endpoint {
        return Ok(ResolvedEndpoint::Ready {
            endpoint: endpoint.advertised().to_string(),
            sans: vec![endpoint.san()],
        });
    }

    match config.service_type {
        ServiceType::LoadBalancer => {
            match get_service(client, settings, &settings.load_balancer_service_name).await? {
                Some(service) => Ok(endpoint_from_load_balancer(
                    &service,
                    &settings.namespace,
                    &settings.load_balancer_service_name,
                )?),
                None => Ok(ResolvedEndpoint::Pending),
            }
        }
        ServiceType::ClusterIp => {
            match get_service(client, settings, &settings.cluster_ip_service_name).await? {
                Some(service) => Ok(endpoint_from_cluster_ip(&service)),
                None => Ok(ResolvedEndpoint::Pending),
            }
        }
        ServiceType::None => Ok(ResolvedEndpoint::Pending),
    }
}

async fn get_service(
    client: &Client,
    settings: &Settings,
    name: &str,
) -> Result<Option<Service>> {
    let api: Api<Service> = Api::namespaced(client.clone(), &settings.namespace);
    match api.get(name).await {
        Ok(service) => Ok(Some(service)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Resolve from LoadBalancer ingress entries.
///
/// Hostnames win over IPs: the first ingress entry with a non-empty hostname
/// becomes the endpoint and its single DNS SAN. Otherwise the first entry
/// with a parseable IP becomes the endpoint and its single IP SAN. Entries
/// present but nothing usable is an error rather than Pending, because
/// waiting will not fix it.
pub(super) fn endpoint_from_load_balancer(
    service: &Service,
    namespace: &str,
    name: &str,
) -> Result<ResolvedEndpoint, EndpointError> {
    let ingress = service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref());

    let Some(entries) = ingress else {
        return Ok(ResolvedEndpoint::Pending);
    };
    if entries.is_empty() {
        return Ok(ResolvedEndpoint::Pending);
    }

    let first_hostname = entries
        .iter()
        .filter_map(|entry| entry.hostname.as_deref())
        .find(|hostname| !hostname.is_empty());
    if let Some(hostname) = first_hostname {
        return Ok(ResolvedEndpoint::Ready {
            endpoint: hostname.to_string(),
            sans: vec![SubjectAltName::Dns(hostname.to_ascii_lowercase())],
        });
    }

    let first_ip = entries
        .iter()
        .filter_map(|entry| entry.ip.as_deref())
        .filter(|ip| !ip.is_empty())
        .find_map(|ip| ip.parse::<IpAddr>().ok());
    if let Some(ip) = first_ip {
        return Ok(ResolvedEndpoint::Ready {
            endpoint: advertise_host(ip),
            sans: vec![SubjectAltName::Ip(ip)],
        });
    }

    // Entries that are still empty placeholders mean the cloud provider is
    // mid-provisioning; entries with content that parsed to nothing will
    // never resolve on their own.
    let all_placeholders = entries.iter().all(|entry| {
        entry.hostname.as_deref().unwrap_or_default().is_empty()
            && entry.ip.as_deref().unwrap_or_default().is_empty()
    });
    if all_placeholders {
        return Ok(ResolvedEndpoint::Pending);
    }

    Err(EndpointError::NoUsableIngress {
        namespace: namespace.to_string(),
        name: name.to_string(),
    })
}

/// Resolve from ClusterIP allocations, preserving dual-stack ordering.
pub(super) fn endpoint_from_cluster_ip(service: &Service) -> ResolvedEndpoint {
    let spec = service.spec.as_ref();

    let mut raw_ips: Vec<String> = spec
        .and_then(|s| s.cluster_ips.clone())
        .unwrap_or_default();
    if raw_ips.is_empty() {
        if let Some(ip) = spec.and_then(|s| s.cluster_ip.clone()) {
            raw_ips.push(ip);
        }
    }

    let ips: Vec<IpAddr> = raw_ips
        .iter()
        .filter(|ip| !ip.is_empty() && ip.as_str() != "None")
        .filter_map(|ip| ip.parse::<IpAddr>().ok())
        .collect();

    match ips.first() {
        Some(first) => ResolvedEndpoint::Ready {
            endpoint: advertise_host(*first),
            sans: ips.iter().copied().map(SubjectAltName::Ip).collect(),
        },
        None => ResolvedEndpoint::Pending,
    }
}

/// Format an IP for use in an advertised endpoint; IPv6 gets brackets so the
/// eventual `https://` URL stays valid.
fn advertise_host(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod endpoint_tests;
