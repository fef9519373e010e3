// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for spec validation and endpoint parsing.

#[cfg(test)]
mod tests {
    use crate::crd::{
        CredentialIssuer, CredentialIssuerSpec, ImpersonationProxyServiceSpec,
        ImpersonationProxySpec,
    };
    use crate::errors::SpecError;
    use crate::pki::SubjectAltName;
    use crate::reconcilers::credentialissuer::config::*;

    fn issuer_with(proxy: Option<ImpersonationProxySpec>) -> CredentialIssuer {
        CredentialIssuer::new(
            "persona-config",
            CredentialIssuerSpec {
                impersonation_proxy: proxy,
            },
        )
    }

    fn proxy_spec(mode: &str, endpoint: Option<&str>, service_type: &str) -> ImpersonationProxySpec {
        ImpersonationProxySpec {
            mode: mode.to_string(),
            external_endpoint: endpoint.map(str::to_string),
            service: ImpersonationProxyServiceSpec {
                r#type: service_type.to_string(),
                ..Default::default()
            },
        }
    }

    // ========================================================================
    // Spec Validation
    // ========================================================================

    #[test]
    fn nil_impersonation_proxy_block_is_rejected() {
        let err = load_proxy_config(&issuer_with(None)).unwrap_err();
        assert_eq!(err, SpecError::MissingImpersonationProxy);
        assert_eq!(
            err.to_string(),
            "could not load CredentialIssuer: spec.impersonationProxy is nil"
        );
    }

    #[test]
    fn valid_modes_are_accepted() {
        for (mode, expected) in [
            ("auto", ProxyMode::Auto),
            ("enabled", ProxyMode::Enabled),
            ("disabled", ProxyMode::Disabled),
        ] {
            let config = load_proxy_config(&issuer_with(Some(proxy_spec(
                mode,
                None,
                "LoadBalancer",
            ))))
            .expect("mode should validate");
            assert_eq!(config.mode, expected);
        }
    }

    #[test]
    fn invalid_mode_is_rejected_with_message() {
        let err = load_proxy_config(&issuer_with(Some(proxy_spec(
            "not-valid",
            None,
            "LoadBalancer",
        ))))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not load CredentialIssuer spec.impersonationProxy: \
             invalid proxy mode \"not-valid\" (expected auto, disabled, or enabled)"
        );
    }

    #[test]
    fn invalid_service_type_is_rejected_with_message() {
        let err = load_proxy_config(&issuer_with(Some(proxy_spec(
            "enabled",
            None,
            "not-valid",
        ))))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not load CredentialIssuer spec.impersonationProxy: \
             invalid service type \"not-valid\" (expected None, LoadBalancer, or ClusterIP)"
        );
    }

    #[test]
    fn invalid_load_balancer_ip_is_rejected_with_message() {
        let mut spec = proxy_spec("enabled", None, "LoadBalancer");
        spec.service.load_balancer_ip = Some("invalid-ip-address".to_string());

        let err = load_proxy_config(&issuer_with(Some(spec))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not load CredentialIssuer spec.impersonationProxy: \
             invalid LoadBalancerIP \"invalid-ip-address\""
        );
    }

    #[test]
    fn service_type_none_requires_external_endpoint() {
        let err = load_proxy_config(&issuer_with(Some(proxy_spec("enabled", None, "None"))))
            .unwrap_err();
        assert_eq!(err, SpecError::MissingExternalEndpoint);
        assert_eq!(
            err.to_string(),
            "could not load CredentialIssuer spec.impersonationProxy: \
             externalEndpoint must be set when service.type is None"
        );

        // An empty endpoint string counts as unset.
        let err = load_proxy_config(&issuer_with(Some(proxy_spec("enabled", Some(""), "None"))))
            .unwrap_err();
        assert_eq!(err, SpecError::MissingExternalEndpoint);
    }

    #[test]
    fn valid_spec_with_endpoint_and_no_service() {
        let config = load_proxy_config(&issuer_with(Some(proxy_spec(
            "enabled",
            Some("127.0.0.42"),
            "None",
        ))))
        .expect("spec should validate");

        assert_eq!(config.mode, ProxyMode::Enabled);
        assert_eq!(config.service_type, ServiceType::None);
        let endpoint = config.external_endpoint.expect("endpoint parsed");
        assert_eq!(endpoint.advertised(), "127.0.0.42");
        assert_eq!(endpoint.host(), "127.0.0.42");
        assert_eq!(endpoint.port(), None);
    }

    // ========================================================================
    // Endpoint Parsing
    // ========================================================================

    #[test]
    fn parses_bare_hostname() {
        let endpoint = parse_external_endpoint("proxy.example.com").unwrap();
        assert_eq!(endpoint.host(), "proxy.example.com");
        assert_eq!(endpoint.port(), None);
        assert_eq!(endpoint.advertised(), "proxy.example.com");
        assert_eq!(
            endpoint.san(),
            SubjectAltName::Dns("proxy.example.com".to_string())
        );
    }

    #[test]
    fn parses_hostname_with_port() {
        let endpoint = parse_external_endpoint("proxy.example.com:3000").unwrap();
        assert_eq!(endpoint.host(), "proxy.example.com");
        assert_eq!(endpoint.port(), Some(3000));
        assert_eq!(endpoint.advertised(), "proxy.example.com:3000");
    }

    #[test]
    fn parses_ip_with_port() {
        let endpoint = parse_external_endpoint("127.0.0.1:3000").unwrap();
        assert_eq!(endpoint.host(), "127.0.0.1");
        assert_eq!(endpoint.port(), Some(3000));
        assert_eq!(
            endpoint.san(),
            SubjectAltName::Ip("127.0.0.1".parse().unwrap())
        );
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let endpoint = parse_external_endpoint("[fd00::5118]:443").unwrap();
        assert_eq!(endpoint.host(), "fd00::5118");
        assert_eq!(endpoint.port(), Some(443));
        assert_eq!(
            endpoint.san(),
            SubjectAltName::Ip("fd00::5118".parse().unwrap())
        );

        let endpoint = parse_external_endpoint("[fd00::5118]").unwrap();
        assert_eq!(endpoint.host(), "fd00::5118");
        assert_eq!(endpoint.port(), None);
    }

    #[test]
    fn parses_bare_ipv6() {
        let endpoint = parse_external_endpoint("fd00::5118").unwrap();
        assert_eq!(endpoint.host(), "fd00::5118");
        assert_eq!(endpoint.port(), None);
    }

    #[test]
    fn rejects_unterminated_bracket() {
        let err = parse_external_endpoint("[invalid").unwrap_err();
        let message = err.to_string();
        assert!(
            message.contains("invalid ExternalEndpoint \"[invalid\""),
            "unexpected message: {message}"
        );
        assert!(
            message.contains("missing ']' in address"),
            "unexpected message: {message}"
        );
    }

    #[test]
    fn rejects_bad_ports_and_hosts() {
        assert!(parse_external_endpoint("host:notaport").is_err());
        assert!(parse_external_endpoint("host:0").is_err());
        assert!(parse_external_endpoint("host:99999").is_err());
        assert!(parse_external_endpoint(":443").is_err());
        assert!(parse_external_endpoint("a:b:c").is_err());
    }
}
