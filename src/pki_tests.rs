// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for CA generation and serving-certificate issuance.

#[cfg(test)]
mod tests {
    use crate::constants::{CA_COMMON_NAME, CERT_VALIDITY_DAYS};
    use crate::pki::*;
    use std::net::IpAddr;
    use x509_parser::prelude::*;

    #[test]
    fn generated_ca_has_expected_subject_and_validity() {
        let ca = CertificateAuthority::generate().expect("CA generation should succeed");

        let der = parse_pem(ca.cert_pem()).expect("PEM should parse");
        let (_, cert) = X509Certificate::from_der(&der).expect("CA cert should parse");

        let cn = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or("");
        assert_eq!(cn, CA_COMMON_NAME);

        let now = ::time::OffsetDateTime::now_utc().unix_timestamp();
        let not_before = cert.validity().not_before.timestamp();
        let not_after = cert.validity().not_after.timestamp();
        assert!(not_before <= now, "notBefore should be backdated");
        assert!(now - not_before < 3600, "backdate should be small");

        let expected_lifetime = CERT_VALIDITY_DAYS * 24 * 3600;
        let actual_lifetime = not_after - not_before;
        assert!((actual_lifetime - expected_lifetime).abs() < 24 * 3600);
    }

    #[test]
    fn ca_round_trips_through_pem() {
        let ca = CertificateAuthority::generate().expect("CA generation should succeed");
        let reloaded = CertificateAuthority::from_pem(ca.cert_pem(), ca.key_pem())
            .expect("reloading the CA from its own PEM should succeed");
        assert_eq!(reloaded.cert_pem(), ca.cert_pem());
    }

    #[test]
    fn ca_from_pem_rejects_mismatched_key() {
        let ca = CertificateAuthority::generate().expect("CA generation should succeed");
        let other = CertificateAuthority::generate().expect("CA generation should succeed");

        let result = CertificateAuthority::from_pem(ca.cert_pem(), other.key_pem());
        assert!(matches!(result, Err(PkiError::KeyMismatch)));
    }

    #[test]
    fn ca_from_pem_rejects_garbage() {
        assert!(CertificateAuthority::from_pem("not pem", "also not pem").is_err());
        assert!(CertificateAuthority::from_pem("", "").is_err());
    }

    #[test]
    fn serving_cert_carries_exactly_the_requested_sans() {
        let ca = CertificateAuthority::generate().expect("CA generation should succeed");
        let sans = vec![
            SubjectAltName::Ip("127.0.0.1".parse::<IpAddr>().unwrap()),
            SubjectAltName::Dns("proxy.example.com".to_string()),
        ];

        let serving = ca
            .issue_serving_cert(&sans)
            .expect("issuance should succeed");

        let mut actual = certificate_sans(&serving.cert_pem).expect("SANs should parse");
        actual.sort();
        let mut expected = sans;
        expected.sort();
        assert_eq!(actual, expected);
    }

    #[test]
    fn serving_cert_supports_ipv6_sans() {
        let ca = CertificateAuthority::generate().expect("CA generation should succeed");
        let ip: IpAddr = "fd00::5118".parse().unwrap();

        let serving = ca
            .issue_serving_cert(&[SubjectAltName::Ip(ip)])
            .expect("issuance should succeed");

        let actual = certificate_sans(&serving.cert_pem).expect("SANs should parse");
        assert_eq!(actual, vec![SubjectAltName::Ip(ip)]);
    }

    #[test]
    fn serving_cert_verifies_under_its_ca_only() {
        let ca = CertificateAuthority::generate().expect("CA generation should succeed");
        let other = CertificateAuthority::generate().expect("CA generation should succeed");

        let serving = ca
            .issue_serving_cert(&[SubjectAltName::Dns("proxy.example.com".to_string())])
            .expect("issuance should succeed");

        assert!(verify_signed_by(&serving.cert_pem, ca.cert_pem()).unwrap());
        assert!(!verify_signed_by(&serving.cert_pem, other.cert_pem()).unwrap());
    }

    #[test]
    fn serving_key_matches_its_certificate() {
        let ca = CertificateAuthority::generate().expect("CA generation should succeed");
        let serving = ca
            .issue_serving_cert(&[SubjectAltName::Dns("proxy.example.com".to_string())])
            .expect("issuance should succeed");

        assert!(key_matches_certificate(&serving.cert_pem, &serving.key_pem).unwrap());
        assert!(!key_matches_certificate(&serving.cert_pem, ca.key_pem()).unwrap());
    }

    #[test]
    fn subject_alt_name_classifies_hosts() {
        assert_eq!(
            SubjectAltName::from_host("127.0.0.1"),
            SubjectAltName::Ip("127.0.0.1".parse().unwrap())
        );
        assert_eq!(
            SubjectAltName::from_host("fd00::1"),
            SubjectAltName::Ip("fd00::1".parse().unwrap())
        );
        assert_eq!(
            SubjectAltName::from_host("Proxy.Example.COM"),
            SubjectAltName::Dns("proxy.example.com".to_string())
        );
    }
}
