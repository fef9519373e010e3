// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for front-door Service construction and drift detection.

#[cfg(test)]
mod tests {
    use crate::context::Settings;
    use crate::labels::APP_LABEL;
    use crate::reconcilers::credentialissuer::config::{ProxyConfig, ProxyMode, ServiceType};
    use crate::reconcilers::credentialissuer::service::*;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use std::collections::BTreeMap;

    fn settings() -> Settings {
        Settings {
            namespace: "some-namespace".to_string(),
            credential_issuer_name: "some-credential-issuer".to_string(),
            load_balancer_service_name: "some-lb-service".to_string(),
            cluster_ip_service_name: "some-cluster-ip-service".to_string(),
            tls_secret_name: "some-tls-secret".to_string(),
            ca_secret_name: "some-ca-secret".to_string(),
            signer_secret_name: "some-signer-secret".to_string(),
            app_name: "app-name".to_string(),
            labels: Settings::default_labels("app-name"),
        }
    }

    fn config(service_type: ServiceType) -> ProxyConfig {
        ProxyConfig {
            mode: ProxyMode::Enabled,
            external_endpoint: None,
            service_type,
            annotations: None,
            load_balancer_ip: None,
        }
    }

    #[test]
    fn load_balancer_service_has_expected_shape() {
        let service = build_load_balancer_service(&settings(), &config(ServiceType::LoadBalancer));

        assert_eq!(service.metadata.name.as_deref(), Some("some-lb-service"));
        assert_eq!(service.metadata.namespace.as_deref(), Some("some-namespace"));
        assert_eq!(
            service.metadata.labels.as_ref(),
            Some(&Settings::default_labels("app-name"))
        );
        assert!(service.metadata.annotations.is_none());

        let spec = service.spec.expect("spec present");
        assert_eq!(spec.type_.as_deref(), Some("LoadBalancer"));
        assert_eq!(
            spec.selector.as_ref().and_then(|s| s.get(APP_LABEL)),
            Some(&"app-name".to_string())
        );
        assert!(spec.load_balancer_ip.is_none());

        let ports = spec.ports.expect("ports present");
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 443);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(8444)));
        assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));
    }

    #[test]
    fn load_balancer_service_carries_annotations_and_static_ip() {
        let mut cfg = config(ServiceType::LoadBalancer);
        cfg.annotations = Some(BTreeMap::from([(
            "some-annotation-key".to_string(),
            "some-annotation-value".to_string(),
        )]));
        cfg.load_balancer_ip = Some("1.2.3.4".to_string());

        let service = build_load_balancer_service(&settings(), &cfg);
        assert_eq!(
            service
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get("some-annotation-key")),
            Some(&"some-annotation-value".to_string())
        );
        assert_eq!(
            service.spec.and_then(|s| s.load_balancer_ip).as_deref(),
            Some("1.2.3.4")
        );
    }

    #[test]
    fn cluster_ip_service_has_expected_shape() {
        let service = build_cluster_ip_service(&settings(), &config(ServiceType::ClusterIp));

        assert_eq!(
            service.metadata.name.as_deref(),
            Some("some-cluster-ip-service")
        );
        let spec = service.spec.expect("spec present");
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert!(spec.load_balancer_ip.is_none());
    }

    #[test]
    fn identical_services_need_no_update() {
        let desired = build_load_balancer_service(&settings(), &config(ServiceType::LoadBalancer));
        let existing = desired.clone();
        assert!(!service_needs_update(&existing, &desired));
    }

    #[test]
    fn annotation_drift_needs_update() {
        let existing = build_load_balancer_service(&settings(), &config(ServiceType::LoadBalancer));

        let mut cfg = config(ServiceType::LoadBalancer);
        cfg.annotations = Some(BTreeMap::from([(
            "my-annotation-key".to_string(),
            "my-annotation-val".to_string(),
        )]));
        let desired = build_load_balancer_service(&settings(), &cfg);

        assert!(service_needs_update(&existing, &desired));
    }

    #[test]
    fn static_ip_drift_needs_update() {
        let existing = build_load_balancer_service(&settings(), &config(ServiceType::LoadBalancer));

        let mut cfg = config(ServiceType::LoadBalancer);
        cfg.load_balancer_ip = Some("1.2.3.4".to_string());
        let desired = build_load_balancer_service(&settings(), &cfg);

        assert!(service_needs_update(&existing, &desired));
    }

    #[test]
    fn server_assigned_fields_do_not_count_as_drift() {
        let desired = build_cluster_ip_service(&settings(), &config(ServiceType::ClusterIp));
        let mut existing = desired.clone();
        if let Some(spec) = existing.spec.as_mut() {
            spec.cluster_ip = Some("10.0.0.7".to_string());
            spec.cluster_ips = Some(vec!["10.0.0.7".to_string()]);
        }
        existing.metadata.resource_version = Some("42".to_string());

        assert!(!service_needs_update(&existing, &desired));
    }
}
