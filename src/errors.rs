// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Domain error types for the impersonation proxy controller.
//!
//! These errors carry the exact messages that end up in the
//! `CredentialIssuer` status, so their `Display` implementations are part of
//! the controller's observable surface and are covered by unit tests.

use thiserror::Error;

/// Errors produced while validating the `CredentialIssuer` spec.
///
/// All of these are permanent until the spec changes; the controller reports
/// them in the status strategy and retries on the next spec event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// The impersonationProxy block is missing entirely.
    #[error("could not load CredentialIssuer: spec.impersonationProxy is nil")]
    MissingImpersonationProxy,

    /// The mode string is not one of the enumerated values.
    #[error(
        "could not load CredentialIssuer spec.impersonationProxy: \
         invalid proxy mode \"{0}\" (expected auto, disabled, or enabled)"
    )]
    InvalidMode(String),

    /// The service type string is not one of the enumerated values.
    #[error(
        "could not load CredentialIssuer spec.impersonationProxy: \
         invalid service type \"{0}\" (expected None, LoadBalancer, or ClusterIP)"
    )]
    InvalidServiceType(String),

    /// The static load balancer IP does not parse as an address.
    #[error("could not load CredentialIssuer spec.impersonationProxy: invalid LoadBalancerIP \"{0}\"")]
    InvalidLoadBalancerIp(String),

    /// The external endpoint does not parse as host or host:port.
    #[error(
        "could not load CredentialIssuer spec.impersonationProxy: \
         invalid ExternalEndpoint \"{endpoint}\": {reason}"
    )]
    InvalidExternalEndpoint {
        /// The endpoint string as given in the spec
        endpoint: String,
        /// Why it failed to parse
        reason: String,
    },

    /// service.type is None but no external endpoint was provided.
    #[error(
        "could not load CredentialIssuer spec.impersonationProxy: \
         externalEndpoint must be set when service.type is None"
    )]
    MissingExternalEndpoint,
}

/// Errors produced while resolving the externally observed endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// The load balancer has ingress entries but none carries a usable
    /// hostname or IP address.
    #[error("could not find valid IP addresses or hostnames from load balancer {namespace}/{name}")]
    NoUsableIngress {
        /// Namespace of the load balancer Service
        namespace: String,
        /// Name of the load balancer Service
        name: String,
    },
}

/// Errors produced while loading the client-credential signing secret.
///
/// The signing secret is owned by a sister controller; this controller only
/// consumes it. On any of these the in-memory signer provider is cleared so
/// the running proxy stops accepting client certificates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The signing secret does not exist.
    #[error("could not load the impersonator's credential signing secret: secret \"{0}\" not found")]
    NotFound(String),

    /// The signing secret exists but its contents are unusable.
    #[error("could not load the impersonator's credential signing secret: {0}")]
    Invalid(String),
}
