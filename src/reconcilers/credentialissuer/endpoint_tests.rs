// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for endpoint resolution from Service state.

#[cfg(test)]
mod tests {
    use crate::errors::EndpointError;
    use crate::pki::SubjectAltName;
    use crate::reconcilers::credentialissuer::endpoint::*;
    use k8s_openapi::api::core::v1::{
        LoadBalancerIngress, LoadBalancerStatus, Service, ServiceSpec, ServiceStatus,
    };

    fn load_balancer_with(ingress: Option<Vec<LoadBalancerIngress>>) -> Service {
        Service {
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus { ingress }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn ingress(ip: Option<&str>, hostname: Option<&str>) -> LoadBalancerIngress {
        LoadBalancerIngress {
            ip: ip.map(str::to_string),
            hostname: hostname.map(str::to_string),
            ..Default::default()
        }
    }

    fn cluster_ip_service(cluster_ip: Option<&str>, cluster_ips: Option<Vec<&str>>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                cluster_ip: cluster_ip.map(str::to_string),
                cluster_ips: cluster_ips.map(|ips| ips.into_iter().map(str::to_string).collect()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    // ========================================================================
    // LoadBalancer Resolution
    // ========================================================================

    #[test]
    fn no_ingress_is_pending() {
        for service in [
            load_balancer_with(None),
            load_balancer_with(Some(vec![])),
            Service::default(),
        ] {
            let resolved = endpoint_from_load_balancer(&service, "some-namespace", "some-lb")
                .expect("no ingress is not an error");
            assert_eq!(resolved, ResolvedEndpoint::Pending);
        }
    }

    #[test]
    fn empty_placeholder_ingress_is_pending() {
        let service = load_balancer_with(Some(vec![ingress(Some(""), Some(""))]));
        let resolved = endpoint_from_load_balancer(&service, "some-namespace", "some-lb").unwrap();
        assert_eq!(resolved, ResolvedEndpoint::Pending);
    }

    #[test]
    fn ingress_ip_becomes_ip_san() {
        let service = load_balancer_with(Some(vec![ingress(Some("127.0.0.123"), None)]));
        let resolved = endpoint_from_load_balancer(&service, "some-namespace", "some-lb").unwrap();
        assert_eq!(
            resolved,
            ResolvedEndpoint::Ready {
                endpoint: "127.0.0.123".to_string(),
                sans: vec![SubjectAltName::Ip("127.0.0.123".parse().unwrap())],
            }
        );
    }

    #[test]
    fn hostname_wins_over_ip() {
        let service = load_balancer_with(Some(vec![ingress(
            Some("127.0.0.123"),
            Some("lb.example.com"),
        )]));
        let resolved = endpoint_from_load_balancer(&service, "some-namespace", "some-lb").unwrap();
        assert_eq!(
            resolved,
            ResolvedEndpoint::Ready {
                endpoint: "lb.example.com".to_string(),
                sans: vec![SubjectAltName::Dns("lb.example.com".to_string())],
            }
        );
    }

    #[test]
    fn first_hostname_is_the_only_san() {
        let service = load_balancer_with(Some(vec![
            ingress(None, Some("first.example.com")),
            ingress(None, Some("second.example.com")),
        ]));
        let resolved = endpoint_from_load_balancer(&service, "some-namespace", "some-lb").unwrap();
        assert_eq!(
            resolved,
            ResolvedEndpoint::Ready {
                endpoint: "first.example.com".to_string(),
                sans: vec![SubjectAltName::Dns("first.example.com".to_string())],
            }
        );
    }

    #[test]
    fn first_ip_is_the_only_san() {
        let service = load_balancer_with(Some(vec![
            ingress(Some("127.0.0.123"), None),
            ingress(Some("127.0.0.124"), None),
        ]));
        let resolved = endpoint_from_load_balancer(&service, "some-namespace", "some-lb").unwrap();
        assert_eq!(
            resolved,
            ResolvedEndpoint::Ready {
                endpoint: "127.0.0.123".to_string(),
                sans: vec![SubjectAltName::Ip("127.0.0.123".parse().unwrap())],
            }
        );
    }

    #[test]
    fn unusable_ingress_is_an_error_with_exact_message() {
        let service = load_balancer_with(Some(vec![ingress(Some("not-an-ip"), None)]));
        let err = endpoint_from_load_balancer(&service, "some-namespace", "some-service-resource-name")
            .unwrap_err();
        assert_eq!(
            err,
            EndpointError::NoUsableIngress {
                namespace: "some-namespace".to_string(),
                name: "some-service-resource-name".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "could not find valid IP addresses or hostnames from load balancer \
             some-namespace/some-service-resource-name"
        );
    }

    // ========================================================================
    // ClusterIP Resolution
    // ========================================================================

    #[test]
    fn single_cluster_ip_resolves() {
        let service = cluster_ip_service(Some("127.0.0.123"), None);
        assert_eq!(
            endpoint_from_cluster_ip(&service),
            ResolvedEndpoint::Ready {
                endpoint: "127.0.0.123".to_string(),
                sans: vec![SubjectAltName::Ip("127.0.0.123".parse().unwrap())],
            }
        );
    }

    #[test]
    fn dual_stack_keeps_order_and_all_sans() {
        let service = cluster_ip_service(
            Some("127.0.0.123"),
            Some(vec!["127.0.0.123", "fd00::5118"]),
        );
        assert_eq!(
            endpoint_from_cluster_ip(&service),
            ResolvedEndpoint::Ready {
                endpoint: "127.0.0.123".to_string(),
                sans: vec![
                    SubjectAltName::Ip("127.0.0.123".parse().unwrap()),
                    SubjectAltName::Ip("fd00::5118".parse().unwrap()),
                ],
            }
        );
    }

    #[test]
    fn ipv6_first_is_advertised_with_brackets() {
        let service = cluster_ip_service(Some("fd00::5118"), Some(vec!["fd00::5118"]));
        let ResolvedEndpoint::Ready { endpoint, .. } = endpoint_from_cluster_ip(&service) else {
            panic!("expected a resolved endpoint");
        };
        assert_eq!(endpoint, "[fd00::5118]");
    }

    #[test]
    fn unallocated_cluster_ip_is_pending() {
        for service in [
            cluster_ip_service(None, None),
            cluster_ip_service(Some(""), None),
            cluster_ip_service(Some("None"), None),
        ] {
            assert_eq!(endpoint_from_cluster_ip(&service), ResolvedEndpoint::Pending);
        }
    }
}
