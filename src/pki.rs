// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! X.509 primitives for the impersonation proxy.
//!
//! This module owns the self-signed certificate authority persisted in the CA
//! secret and the serving-certificate leaves issued under it. Certificates are
//! long-lived (about 100 years) because rotation is driven by endpoint changes
//! rather than by expiry: whenever the externally observed address of the
//! proxy changes, the leaf is reissued with a SAN set matching the new
//! address.
//!
//! Key material never leaves PEM form at rest; parsing happens on demand.

use rcgen::{
    string::Ia5String, BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, PublicKeyData, SanType,
};
use std::net::IpAddr;
use thiserror::Error;
use x509_parser::prelude::*;

use crate::constants::{
    CA_COMMON_NAME, CERT_BACKDATE_SECS, CERT_VALIDITY_DAYS, SERVING_CERT_COMMON_NAME,
};

/// Errors from certificate generation, parsing, and validation.
#[derive(Debug, Error)]
pub enum PkiError {
    /// Key pair generation failed
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Building or signing a certificate failed
    #[error("certificate generation failed: {0}")]
    CertificateGenerationFailed(String),

    /// PEM or DER data could not be parsed
    #[error("certificate parsing error: {0}")]
    ParseError(String),

    /// The private key does not belong to the certificate
    #[error("private key does not match certificate")]
    KeyMismatch,
}

/// Result type for PKI operations
pub type Result<T> = std::result::Result<T, PkiError>;

/// A single subject alternative name, preserving whether the host was an IP
/// address or a DNS name. The distinction decides which SAN field the name is
/// written to and how an existing certificate is compared against the desired
/// set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubjectAltName {
    /// DNS hostname SAN
    Dns(String),
    /// IP address SAN
    Ip(IpAddr),
}

impl SubjectAltName {
    /// Classify a host string: parseable IPs become IP SANs, everything else
    /// becomes a DNS SAN.
    #[must_use]
    pub fn from_host(host: &str) -> Self {
        match host.parse::<IpAddr>() {
            Ok(ip) => SubjectAltName::Ip(ip),
            Err(_) => SubjectAltName::Dns(host.to_ascii_lowercase()),
        }
    }
}

impl std::fmt::Display for SubjectAltName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectAltName::Dns(name) => write!(f, "{name}"),
            SubjectAltName::Ip(ip) => write!(f, "{ip}"),
        }
    }
}

/// A freshly issued serving certificate and its private key, both PEM.
#[derive(Debug, Clone)]
pub struct ServingCert {
    /// PEM-encoded leaf certificate
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: String,
}

/// Parse PEM-encoded data and return the DER bytes of the first block.
pub fn parse_pem(pem_data: &str) -> Result<Vec<u8>> {
    let pem_obj = ::pem::parse(pem_data.as_bytes())
        .map_err(|e| PkiError::ParseError(format!("failed to parse PEM: {e}")))?;
    Ok(pem_obj.contents().to_vec())
}

/// Compute the validity window for a new certificate.
///
/// notBefore is backdated to tolerate clock skew between the controller and
/// whoever verifies the certificate.
fn compute_validity() -> (::time::OffsetDateTime, ::time::OffsetDateTime) {
    let now = ::time::OffsetDateTime::now_utc();
    let not_before = now - ::time::Duration::seconds(CERT_BACKDATE_SECS);
    let not_after = now + ::time::Duration::days(CERT_VALIDITY_DAYS);
    (not_before, not_after)
}

/// The self-signed certificate authority that signs the proxy's serving
/// certificates.
///
/// The key pair is kept serialized because [`KeyPair`] is not `Clone`; it is
/// deserialized on each signing operation.
#[derive(Clone)]
pub struct CertificateAuthority {
    cert_pem: String,
    key_pem: String,
}

impl CertificateAuthority {
    /// Generate a new self-signed CA.
    pub fn generate() -> Result<Self> {
        let key_pair = KeyPair::generate()
            .map_err(|e| PkiError::KeyGenerationFailed(format!("failed to generate CA key: {e}")))?;

        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(CA_COMMON_NAME.to_string()),
        );
        params.distinguished_name = dn;

        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let (not_before, not_after) = compute_validity();
        params.not_before = not_before;
        params.not_after = not_after;

        let cert = params.self_signed(&key_pair).map_err(|e| {
            PkiError::CertificateGenerationFailed(format!("failed to create CA cert: {e}"))
        })?;

        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        })
    }

    /// Load a CA from PEM, validating that the certificate parses and the key
    /// belongs to it.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        if !key_matches_certificate(cert_pem, key_pem)? {
            return Err(PkiError::KeyMismatch);
        }

        Ok(Self {
            cert_pem: cert_pem.to_string(),
            key_pem: key_pem.to_string(),
        })
    }

    /// The CA certificate in PEM form, as distributed to clients.
    #[must_use]
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// The CA private key in PEM form, as persisted in the CA secret.
    #[must_use]
    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    fn load_key_pair(&self) -> Result<KeyPair> {
        KeyPair::from_pem(&self.key_pem)
            .map_err(|e| PkiError::ParseError(format!("failed to load CA key: {e}")))
    }

    /// Issue a serving certificate whose SAN set is exactly `sans`.
    pub fn issue_serving_cert(&self, sans: &[SubjectAltName]) -> Result<ServingCert> {
        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(SERVING_CERT_COMMON_NAME.to_string()),
        );
        params.distinguished_name = dn;

        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

        let (not_before, not_after) = compute_validity();
        params.not_before = not_before;
        params.not_after = not_after;

        params.subject_alt_names = sans
            .iter()
            .map(|san| match san {
                SubjectAltName::Ip(ip) => Ok(SanType::IpAddress(*ip)),
                SubjectAltName::Dns(name) => Ia5String::try_from(name.clone())
                    .map(SanType::DnsName)
                    .map_err(|e| {
                        PkiError::CertificateGenerationFailed(format!(
                            "invalid DNS name '{name}': {e}"
                        ))
                    }),
            })
            .collect::<Result<Vec<_>>>()?;

        let server_key = KeyPair::generate().map_err(|e| {
            PkiError::KeyGenerationFailed(format!("failed to generate serving key: {e}"))
        })?;
        let server_key_pem = server_key.serialize_pem();

        let ca_key = self.load_key_pair()?;
        let issuer = Issuer::from_ca_cert_pem(&self.cert_pem, &ca_key)
            .map_err(|e| PkiError::ParseError(format!("failed to create issuer: {e}")))?;

        let server_cert = params.signed_by(&server_key, &issuer).map_err(|e| {
            PkiError::CertificateGenerationFailed(format!("failed to sign serving cert: {e}"))
        })?;

        Ok(ServingCert {
            cert_pem: server_cert.pem(),
            key_pem: server_key_pem,
        })
    }
}

/// Extract the subject alternative names from a PEM certificate.
///
/// IP SANs come back as [`SubjectAltName::Ip`]; DNS SANs as
/// [`SubjectAltName::Dns`]. Other SAN kinds (email, URI) are returned as DNS
/// entries with their textual form so a comparison against a desired set
/// flags them as extras rather than silently ignoring them.
pub fn certificate_sans(cert_pem: &str) -> Result<Vec<SubjectAltName>> {
    let der = parse_pem(cert_pem)?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| PkiError::ParseError(format!("failed to parse certificate: {e}")))?;

    let mut sans = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for general_name in &san.general_names {
                match general_name {
                    GeneralName::DNSName(name) => {
                        sans.push(SubjectAltName::Dns((*name).to_ascii_lowercase()));
                    }
                    GeneralName::IPAddress(bytes) => match bytes.len() {
                        4 => {
                            let octets: [u8; 4] = (*bytes).try_into().expect("length checked");
                            sans.push(SubjectAltName::Ip(IpAddr::from(octets)));
                        }
                        16 => {
                            let octets: [u8; 16] = (*bytes).try_into().expect("length checked");
                            sans.push(SubjectAltName::Ip(IpAddr::from(octets)));
                        }
                        n => {
                            return Err(PkiError::ParseError(format!(
                                "IP SAN with unexpected length {n}"
                            )));
                        }
                    },
                    other => sans.push(SubjectAltName::Dns(format!("{other:?}"))),
                }
            }
        }
    }
    Ok(sans)
}

/// Check whether `cert_pem` was signed by the CA in `ca_cert_pem`.
///
/// Only the signature is checked; validity windows are not, because the
/// controller regenerates rather than renews.
pub fn verify_signed_by(cert_pem: &str, ca_cert_pem: &str) -> Result<bool> {
    let cert_der = parse_pem(cert_pem)?;
    let (_, cert) = X509Certificate::from_der(&cert_der)
        .map_err(|e| PkiError::ParseError(format!("failed to parse certificate: {e}")))?;

    let ca_der = parse_pem(ca_cert_pem)?;
    let (_, ca_cert) = X509Certificate::from_der(&ca_der)
        .map_err(|e| PkiError::ParseError(format!("failed to parse CA certificate: {e}")))?;

    Ok(cert.verify_signature(Some(ca_cert.public_key())).is_ok())
}

/// Check whether the PEM private key belongs to the PEM certificate by
/// comparing SubjectPublicKeyInfo encodings.
pub fn key_matches_certificate(cert_pem: &str, key_pem: &str) -> Result<bool> {
    let cert_der = parse_pem(cert_pem)?;
    let (_, cert) = X509Certificate::from_der(&cert_der)
        .map_err(|e| PkiError::ParseError(format!("failed to parse certificate: {e}")))?;

    let key_pair = KeyPair::from_pem(key_pem)
        .map_err(|e| PkiError::ParseError(format!("failed to parse private key: {e}")))?;

    Ok(cert.tbs_certificate.subject_pki.raw == key_pair.subject_public_key_info())
}

#[cfg(test)]
#[path = "pki_tests.rs"]
mod pki_tests;
