// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `CredentialIssuer` serialization.

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use serde_json::json;

    #[test]
    fn spec_fields_use_camel_case() {
        let issuer: CredentialIssuer = serde_json::from_value(json!({
            "apiVersion": "persona.firestoned.io/v1alpha1",
            "kind": "CredentialIssuer",
            "metadata": { "name": "persona-config" },
            "spec": {
                "impersonationProxy": {
                    "mode": "enabled",
                    "externalEndpoint": "proxy.example.com:8443",
                    "service": {
                        "type": "None",
                        "annotations": { "some-key": "some-value" },
                        "loadBalancerIP": "1.2.3.4"
                    }
                }
            }
        }))
        .expect("spec should deserialize");

        let proxy = issuer.spec.impersonation_proxy.expect("block present");
        assert_eq!(proxy.mode, "enabled");
        assert_eq!(proxy.external_endpoint.as_deref(), Some("proxy.example.com:8443"));
        assert_eq!(proxy.service.r#type, "None");
        assert_eq!(
            proxy.service.annotations.unwrap().get("some-key").unwrap(),
            "some-value"
        );
        assert_eq!(proxy.service.load_balancer_ip.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let issuer: CredentialIssuer = serde_json::from_value(json!({
            "apiVersion": "persona.firestoned.io/v1alpha1",
            "kind": "CredentialIssuer",
            "metadata": { "name": "persona-config" },
            "spec": { "impersonationProxy": {} }
        }))
        .expect("spec should deserialize");

        let proxy = issuer.spec.impersonation_proxy.expect("block present");
        assert_eq!(proxy.mode, MODE_AUTO);
        assert_eq!(proxy.service.r#type, SERVICE_TYPE_LOAD_BALANCER);
        assert!(proxy.external_endpoint.is_none());
        assert!(proxy.service.annotations.is_none());
        assert!(proxy.service.load_balancer_ip.is_none());
    }

    #[test]
    fn missing_impersonation_proxy_block_is_representable() {
        let issuer: CredentialIssuer = serde_json::from_value(json!({
            "apiVersion": "persona.firestoned.io/v1alpha1",
            "kind": "CredentialIssuer",
            "metadata": { "name": "persona-config" },
            "spec": {}
        }))
        .expect("spec should deserialize");

        assert!(issuer.spec.impersonation_proxy.is_none());
    }

    #[test]
    fn strategy_serializes_with_expected_field_names() {
        let strategy = CredentialIssuerStrategy {
            r#type: "ImpersonationProxy".to_string(),
            status: "Success".to_string(),
            reason: "Listening".to_string(),
            message: "ready".to_string(),
            last_update_time: "2025-06-01T00:00:00+00:00".to_string(),
            frontend: Some(CredentialIssuerFrontend {
                r#type: "ImpersonationProxyFrontend".to_string(),
                impersonation_proxy_info: Some(ImpersonationProxyInfo {
                    endpoint: "https://127.0.0.1".to_string(),
                    certificate_authority_data: "Zm9v".to_string(),
                }),
            }),
        };

        let value = serde_json::to_value(&strategy).expect("strategy should serialize");
        assert_eq!(value["type"], "ImpersonationProxy");
        assert_eq!(value["status"], "Success");
        assert_eq!(value["lastUpdateTime"], "2025-06-01T00:00:00+00:00");
        assert_eq!(value["frontend"]["type"], "ImpersonationProxyFrontend");
        assert_eq!(
            value["frontend"]["impersonationProxyInfo"]["certificateAuthorityData"],
            "Zm9v"
        );
    }

    #[test]
    fn frontend_is_omitted_when_absent() {
        let strategy = CredentialIssuerStrategy {
            r#type: "ImpersonationProxy".to_string(),
            status: "Error".to_string(),
            reason: "Pending".to_string(),
            message: "waiting".to_string(),
            last_update_time: "2025-06-01T00:00:00+00:00".to_string(),
            frontend: None,
        };

        let value = serde_json::to_value(&strategy).expect("strategy should serialize");
        assert!(value.get("frontend").is_none());
    }

    #[test]
    fn status_round_trips() {
        let status = CredentialIssuerStatus {
            strategies: vec![CredentialIssuerStrategy {
                r#type: "KubeClusterSigningCertificate".to_string(),
                status: "Success".to_string(),
                reason: "FetchedKey".to_string(),
                message: "key fetched".to_string(),
                last_update_time: "2025-06-01T00:00:00+00:00".to_string(),
                frontend: None,
            }],
        };

        let value = serde_json::to_value(&status).expect("status should serialize");
        let back: CredentialIssuerStatus =
            serde_json::from_value(value).expect("status should deserialize");
        assert_eq!(back, status);
    }
}
