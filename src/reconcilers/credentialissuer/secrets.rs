// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Secret lifecycle for the CA, the serving certificate, and the signer.
//!
//! Ownership is asymmetric: the CA and TLS secrets belong to this controller
//! and are created or recreated at will; the signer secret belongs to a
//! sister controller and is only ever read. A CA secret with bad contents is
//! reported rather than replaced, so a transient parse bug can never destroy
//! persisted key material. The TLS secret is cheap to reissue, so bad or
//! stale contents there are deleted and recreated within the same sync.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use crate::constants::{
    CA_CERTIFICATE_KEY, CA_PRIVATE_KEY_KEY, TLS_CERTIFICATE_KEY, TLS_PRIVATE_KEY_KEY,
};
use crate::pki;

/// Why an existing TLS secret failed validation. The wording of each reason
/// ends up in the status when the follow-up delete fails.
#[derive(Debug)]
enum TlsSecretProblem {
    MissingOrNotPem,
    InvalidCert,
    InvalidKey,
    WrongCa,
    WrongSans,
}

impl TlsSecretProblem {
    fn delete_failure_message(&self, delete_err: &kube::Error) -> Option<String> {
        match self {
            TlsSecretProblem::MissingOrNotPem => Some(format!(
                "found missing or not PEM-encoded data in TLS Secret, \
                 but got error while deleting it: {delete_err}"
            )),
            TlsSecretProblem::InvalidCert => Some(format!(
                "PEM data represented an invalid cert, but got error while deleting it: {delete_err}"
            )),
            TlsSecretProblem::InvalidKey => Some(format!(
                "cert had an invalid private key, but got error while deleting it: {delete_err}"
            )),
            // Rotation deletes report the delete error itself.
            TlsSecretProblem::WrongCa | TlsSecretProblem::WrongSans => None,
        }
    }
}

/// Load the CA from its secret, creating a fresh CA when the secret is
/// absent.
pub(super) async fn ensure_ca(client: &Client, settings: &Settings) -> Result<CertificateAuthority> {
    let api: Api<Secret> = Api::namespaced(client.clone(), &settings.namespace);

    match api.get(&settings.ca_secret_name).await {
        Ok(secret) => {
            let cert_pem = secret_string(&secret, CA_CERTIFICATE_KEY);
            let key_pem = secret_string(&secret, CA_PRIVATE_KEY_KEY);
            CertificateAuthority::from_pem(&cert_pem, &key_pem)
                .map_err(|e| anyhow!("could not load CA: {e}"))
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            let ca = CertificateAuthority::generate()
                .map_err(|e| anyhow!("could not generate CA: {e}"))?;

            info!(
                "Creating CA Secret {}/{}",
                settings.namespace, settings.ca_secret_name
            );
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(settings.ca_secret_name.clone()),
                    namespace: Some(settings.namespace.clone()),
                    labels: Some(settings.labels.clone()),
                    ..Default::default()
                },
                type_: Some("Opaque".to_string()),
                data: Some(BTreeMap::from([
                    (
                        CA_CERTIFICATE_KEY.to_string(),
                        ByteString(ca.cert_pem().as_bytes().to_vec()),
                    ),
                    (
                        CA_PRIVATE_KEY_KEY.to_string(),
                        ByteString(ca.key_pem().as_bytes().to_vec()),
                    ),
                ])),
                ..Default::default()
            };
            api.create(&PostParams::default(), &secret).await?;

            Ok(ca)
        }
        Err(e) => Err(e.into()),
    }
}

/// Converge the TLS secret onto a serving certificate for exactly `sans`,
/// returning the PEM pair to load into the serving provider.
pub(super) async fn ensure_tls_secret(
    client: &Client,
    settings: &Settings,
    ca: &CertificateAuthority,
    sans: &[SubjectAltName],
) -> Result<(Vec<u8>, Vec<u8>)> {
    let api: Api<Secret> = Api::namespaced(client.clone(), &settings.namespace);

    match api.get(&settings.tls_secret_name).await {
        Ok(secret) => {
            match validate_tls_secret(&secret, ca, sans) {
                Ok(pair) => {
                    debug!(
                        "TLS Secret {}/{} matches the resolved endpoint",
                        settings.namespace, settings.tls_secret_name
                    );
                    return Ok(pair);
                }
                Err(problem) => {
                    info!(
                        "Deleting TLS Secret {}/{} before reissuing",
                        settings.namespace, settings.tls_secret_name
                    );
                    if let Err(delete_err) = api
                        .delete(&settings.tls_secret_name, &DeleteParams::default())
                        .await
                    {
                        if !is_not_found(&delete_err) {
                            return Err(match problem.delete_failure_message(&delete_err) {
                                Some(message) => anyhow!(message),
                                None => delete_err.into(),
                            });
                        }
                    }
                }
            }
            create_tls_secret(&api, settings, ca, sans).await
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            create_tls_secret(&api, settings, ca, sans).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete the TLS secret when present; a missing secret is success.
pub(super) async fn delete_tls_secret_if_exists(
    client: &Client,
    settings: &Settings,
) -> Result<()> {
    let api: Api<Secret> = Api::namespaced(client.clone(), &settings.namespace);

    match api.get(&settings.tls_secret_name).await {
        Err(kube::Error::Api(ae)) if ae.code == 404 => return Ok(()),
        Err(e) => return Err(e.into()),
        Ok(_) => {}
    }

    info!(
        "Deleting TLS Secret {}/{}",
        settings.namespace, settings.tls_secret_name
    );
    match api
        .delete(&settings.tls_secret_name, &DeleteParams::default())
        .await
    {
        Ok(_) => Ok(()),
        // The read can race an external delete; absence is the goal anyway.
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Load the signer key pair into the signer provider.
///
/// On any failure the provider is cleared before returning, so a proxy that
/// keeps serving cannot validate client certificates against stale material.
pub(super) async fn load_signer(
    client: &Client,
    settings: &Settings,
    provider: &DynamicCertProvider,
) -> Result<()> {
    let api: Api<Secret> = Api::namespaced(client.clone(), &settings.namespace);

    let secret = match api.get(&settings.signer_secret_name).await {
        Ok(secret) => secret,
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            provider.clear();
            return Err(SignerError::NotFound(settings.signer_secret_name.clone()).into());
        }
        Err(e) => {
            provider.clear();
            return Err(e.into());
        }
    };

    let cert_pem = secret_string(&secret, CA_CERTIFICATE_KEY);
    let key_pem = secret_string(&secret, CA_PRIVATE_KEY_KEY);

    match pki::key_matches_certificate(&cert_pem, &key_pem) {
        Ok(true) => {
            provider.set_cert_key(cert_pem.into_bytes(), key_pem.into_bytes());
            Ok(())
        }
        Ok(false) => {
            provider.clear();
            Err(SignerError::Invalid(
                "attempt to set invalid key pair: private key does not match certificate"
                    .to_string(),
            )
            .into())
        }
        Err(e) => {
            provider.clear();
            Err(SignerError::Invalid(format!("attempt to set invalid key pair: {e}")).into())
        }
    }
}

async fn create_tls_secret(
    api: &Api<Secret>,
    settings: &Settings,
    ca: &CertificateAuthority,
    sans: &[SubjectAltName],
) -> Result<(Vec<u8>, Vec<u8>)> {
    let serving_cert = ca
        .issue_serving_cert(sans)
        .map_err(|e| anyhow!("could not issue serving certificate: {e}"))?;

    info!(
        sans = %sans.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
        "Creating TLS Secret {}/{}",
        settings.namespace,
        settings.tls_secret_name
    );
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(settings.tls_secret_name.clone()),
            namespace: Some(settings.namespace.clone()),
            labels: Some(settings.labels.clone()),
            ..Default::default()
        },
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(BTreeMap::from([
            (
                TLS_CERTIFICATE_KEY.to_string(),
                ByteString(serving_cert.cert_pem.as_bytes().to_vec()),
            ),
            (
                TLS_PRIVATE_KEY_KEY.to_string(),
                ByteString(serving_cert.key_pem.as_bytes().to_vec()),
            ),
        ])),
        ..Default::default()
    };
    api.create(&PostParams::default(), &secret).await?;
    crate::metrics::record_certificate_issued();

    Ok((
        serving_cert.cert_pem.into_bytes(),
        serving_cert.key_pem.into_bytes(),
    ))
}

/// Validate an existing TLS secret against the CA and desired SAN set.
fn validate_tls_secret(
    secret: &Secret,
    ca: &CertificateAuthority,
    sans: &[SubjectAltName],
) -> std::result::Result<(Vec<u8>, Vec<u8>), TlsSecretProblem> {
    let cert_pem = secret_string(secret, TLS_CERTIFICATE_KEY);
    let key_pem = secret_string(secret, TLS_PRIVATE_KEY_KEY);
    if pki::parse_pem(&cert_pem).is_err() || pki::parse_pem(&key_pem).is_err() {
        return Err(TlsSecretProblem::MissingOrNotPem);
    }

    let actual_sans = match pki::certificate_sans(&cert_pem) {
        Ok(actual) => actual,
        Err(_) => return Err(TlsSecretProblem::InvalidCert),
    };

    match pki::key_matches_certificate(&cert_pem, &key_pem) {
        Ok(true) => {}
        Ok(false) | Err(_) => return Err(TlsSecretProblem::InvalidKey),
    }

    match pki::verify_signed_by(&cert_pem, ca.cert_pem()) {
        Ok(true) => {}
        Ok(false) | Err(_) => return Err(TlsSecretProblem::WrongCa),
    }

    let mut actual_sorted = actual_sans;
    actual_sorted.sort();
    let mut desired_sorted = sans.to_vec();
    desired_sorted.sort();
    if actual_sorted != desired_sorted {
        return Err(TlsSecretProblem::WrongSans);
    }

    Ok((cert_pem.into_bytes(), key_pem.into_bytes()))
}

fn secret_string(secret: &Secret, key: &str) -> String {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
        .unwrap_or_default()
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod secrets_tests;
