// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TLS-terminating front end for the impersonation proxy.
//!
//! The server terminates client TLS using whatever serving certificate is
//! currently loaded in the leaf [`DynamicCertProvider`]. While the provider
//! is empty (the endpoint is still pending), certificate resolution fails and
//! the handshake is rejected, so the listener can be up before any
//! certificate exists. Client certificates, when presented, are verified
//! against the signer CA provider; the identity they carry is consumed
//! downstream.
//!
//! Decrypted traffic is relayed to the upstream Kubernetes API server over a
//! fresh TLS session per connection. Request-level impersonation semantics
//! live on the other side of that relay and are not this module's concern.

use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{Context as AnyhowContext, Result};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, DistinguishedName, Error as TlsError,
    RootCertStore, ServerConfig, SignatureScheme,
};
use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tracing::{debug, info, warn};
use x509_parser::prelude::*;

use crate::dynamic_cert::DynamicCertProvider;
use crate::proxy::{ProxyFactory, ProxyServer};

/// Where decrypted proxy traffic is relayed to.
#[derive(Clone)]
pub struct UpstreamTarget {
    /// Hostname or IP of the upstream API server
    pub host: String,
    /// Port of the upstream API server
    pub port: u16,
    /// Roots used to verify the upstream's serving certificate
    pub roots: RootCertStore,
}

/// Serves TLS from the leaf provider and relays connections upstream.
pub struct TlsRelayProxyServer {
    listener: std::net::TcpListener,
    server_config: Arc<ServerConfig>,
    client_config: Arc<ClientConfig>,
    upstream_host: String,
    upstream_port: u16,
}

impl TlsRelayProxyServer {
    /// Bind the listener and assemble the TLS configuration.
    ///
    /// Binding happens here, synchronously, so that a port conflict surfaces
    /// as a start failure on the sync that tried to start the proxy.
    pub fn bind(
        port: u16,
        leaf_provider: DynamicCertProvider,
        signer_provider: DynamicCertProvider,
        upstream: UpstreamTarget,
    ) -> Result<Self> {
        let listener = std::net::TcpListener::bind(("0.0.0.0", port))
            .with_context(|| format!("could not bind impersonation proxy port {port}"))?;
        listener
            .set_nonblocking(true)
            .context("could not configure impersonation proxy listener")?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let verifier = Arc::new(SignerCaClientVerifier::new(
            signer_provider,
            Arc::clone(&provider),
        ));
        let server_config = ServerConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .context("could not select TLS protocol versions")?
            .with_client_cert_verifier(verifier)
            .with_cert_resolver(Arc::new(DynamicServerCertResolver::new(leaf_provider)));

        let client_config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .context("could not select TLS protocol versions")?
            .with_root_certificates(upstream.roots.clone())
            .with_no_client_auth();

        Ok(Self {
            listener,
            server_config: Arc::new(server_config),
            client_config: Arc::new(client_config),
            upstream_host: upstream.host,
            upstream_port: upstream.port,
        })
    }

    /// Build a [`ProxyFactory`] that binds a relay server on demand.
    #[must_use]
    pub fn factory(upstream: UpstreamTarget) -> ProxyFactory {
        Arc::new(move |port, leaf_provider, signer_provider| {
            let server =
                TlsRelayProxyServer::bind(port, leaf_provider, signer_provider, upstream.clone())?;
            Ok(Box::new(server) as Box<dyn ProxyServer>)
        })
    }

    async fn relay_connection(
        acceptor: TlsAcceptor,
        connector: TlsConnector,
        stream: TcpStream,
        peer: std::net::SocketAddr,
        upstream_host: String,
        upstream_port: u16,
    ) {
        let mut downstream = match acceptor.accept(stream).await {
            Ok(tls) => tls,
            Err(e) => {
                // Expected while certless: every handshake fails until the
                // serving certificate is loaded.
                debug!(peer = %peer, error = %e, "TLS handshake failed");
                return;
            }
        };

        let server_name = match ServerName::try_from(upstream_host.clone()) {
            Ok(name) => name,
            Err(e) => {
                warn!(host = %upstream_host, error = %e, "Invalid upstream server name");
                return;
            }
        };

        let upstream_tcp = match TcpStream::connect((upstream_host.as_str(), upstream_port)).await {
            Ok(tcp) => tcp,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Could not reach upstream API server");
                return;
            }
        };

        let mut upstream_tls = match connector.connect(server_name, upstream_tcp).await {
            Ok(tls) => tls,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Upstream TLS handshake failed");
                return;
            }
        };

        match copy_bidirectional(&mut downstream, &mut upstream_tls).await {
            Ok((from_client, from_upstream)) => {
                debug!(peer = %peer, from_client, from_upstream, "Connection closed");
            }
            Err(e) => {
                debug!(peer = %peer, error = %e, "Connection relay ended with error");
            }
        }
    }
}

#[async_trait::async_trait]
impl ProxyServer for TlsRelayProxyServer {
    async fn serve(self: Box<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = TcpListener::from_std(self.listener)
            .context("could not register impersonation proxy listener")?;
        let acceptor = TlsAcceptor::from(Arc::clone(&self.server_config));
        let connector = TlsConnector::from(Arc::clone(&self.client_config));

        info!(
            addr = %listener.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            upstream = %format!("{}:{}", self.upstream_host, self.upstream_port),
            "Impersonation proxy listening"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            tokio::spawn(Self::relay_connection(
                                acceptor.clone(),
                                connector.clone(),
                                stream,
                                peer,
                                self.upstream_host.clone(),
                                self.upstream_port,
                            ));
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        // In-flight connections drain in their own tasks.
        info!("Impersonation proxy listener shut down");
        Ok(())
    }
}

/// Resolves the serving certificate from the leaf provider on every
/// handshake, caching the parsed form until the PEM changes.
pub struct DynamicServerCertResolver {
    provider: DynamicCertProvider,
    cached: StdMutex<Option<(Vec<u8>, Arc<CertifiedKey>)>>,
}

impl DynamicServerCertResolver {
    /// Wrap a leaf provider.
    #[must_use]
    pub fn new(provider: DynamicCertProvider) -> Self {
        Self {
            provider,
            cached: StdMutex::new(None),
        }
    }

    fn certified_key(&self, cert_pem: &[u8], key_pem: &[u8]) -> Option<Arc<CertifiedKey>> {
        let mut cached = self.cached.lock().expect("resolver cache lock poisoned");
        if let Some((pem, key)) = cached.as_ref() {
            if pem == cert_pem {
                return Some(Arc::clone(key));
            }
        }

        let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(cert_pem)
            .collect::<std::result::Result<_, _>>()
            .ok()?;
        let key = PrivateKeyDer::from_pem_slice(key_pem).ok()?;
        let signing_key = rustls::crypto::ring::sign::any_supported_type(&key).ok()?;
        let certified = Arc::new(CertifiedKey::new(certs, signing_key));

        *cached = Some((cert_pem.to_vec(), Arc::clone(&certified)));
        Some(certified)
    }
}

impl std::fmt::Debug for DynamicServerCertResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicServerCertResolver")
            .field("loaded", &self.provider.is_loaded())
            .finish()
    }
}

impl ResolvesServerCert for DynamicServerCertResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let (cert_pem, key_pem) = self.provider.current_cert_key()?;
        self.certified_key(&cert_pem, &key_pem)
    }
}

/// Verifies presented client certificates against the signer CA provider.
///
/// Client authentication is requested but not mandatory at the TLS layer;
/// anonymous clients are rejected later when they try to act as a user. A
/// presented certificate must verify against the current signer CA, and while
/// the signer provider is empty every presented certificate is rejected.
pub struct SignerCaClientVerifier {
    provider: DynamicCertProvider,
    crypto: Arc<CryptoProvider>,
    root_hints: Vec<DistinguishedName>,
}

impl SignerCaClientVerifier {
    /// Wrap a signer CA provider.
    #[must_use]
    pub fn new(provider: DynamicCertProvider, crypto: Arc<CryptoProvider>) -> Self {
        Self {
            provider,
            crypto,
            root_hints: Vec::new(),
        }
    }
}

impl std::fmt::Debug for SignerCaClientVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerCaClientVerifier")
            .field("loaded", &self.provider.is_loaded())
            .finish()
    }
}

impl ClientCertVerifier for SignerCaClientVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &self.root_hints
    }

    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, TlsError> {
        let Some(ca_pem) = self.provider.current_cert() else {
            return Err(TlsError::General(
                "no client certificate authority loaded".to_string(),
            ));
        };

        let ca_pem = String::from_utf8(ca_pem)
            .map_err(|_| TlsError::InvalidCertificate(CertificateError::BadEncoding))?;
        let ca_der = crate::pki::parse_pem(&ca_pem)
            .map_err(|_| TlsError::InvalidCertificate(CertificateError::BadEncoding))?;
        let (_, ca_cert) = X509Certificate::from_der(&ca_der)
            .map_err(|_| TlsError::InvalidCertificate(CertificateError::BadEncoding))?;

        let (_, client_cert) = X509Certificate::from_der(end_entity.as_ref())
            .map_err(|_| TlsError::InvalidCertificate(CertificateError::BadEncoding))?;

        client_cert
            .verify_signature(Some(ca_cert.public_key()))
            .map_err(|_| TlsError::InvalidCertificate(CertificateError::UnknownIssuer))?;

        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.crypto.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.crypto.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.crypto
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
#[path = "proxy_server_tests.rs"]
mod proxy_server_tests;

/// Build an [`UpstreamTarget`] for the in-cluster API server from the kube
/// client configuration.
pub fn upstream_from_kube_config(config: &kube::Config) -> Result<UpstreamTarget> {
    let host = config
        .cluster_url
        .host()
        .context("kube config cluster URL has no host")?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = config.cluster_url.port_u16().unwrap_or(443);

    let mut roots = RootCertStore::empty();
    if let Some(chain) = &config.root_cert {
        for der in chain {
            roots
                .add(CertificateDer::from(der.clone()))
                .context("could not add API server root certificate")?;
        }
    }

    Ok(UpstreamTarget { host, port, roots })
}
