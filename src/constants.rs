// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Persona controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the Persona CRDs
pub const API_GROUP: &str = "persona.firestoned.io";

/// API version for the Persona CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "persona.firestoned.io/v1alpha1";

/// Kind name for the `CredentialIssuer` resource
pub const KIND_CREDENTIAL_ISSUER: &str = "CredentialIssuer";

// ============================================================================
// Proxy Constants
// ============================================================================

/// Container port the impersonation proxy listens on
pub const PROXY_SERVER_PORT: u16 = 8444;

/// Port exposed by the front-door Service
pub const PROXY_SERVICE_PORT: i32 = 443;

// ============================================================================
// Secret Data Keys
// ============================================================================

/// Data key holding a PEM certificate in CA-style secrets
pub const CA_CERTIFICATE_KEY: &str = "ca.crt";

/// Data key holding a PEM private key in CA-style secrets
pub const CA_PRIVATE_KEY_KEY: &str = "ca.key";

/// Data key holding the serving certificate in the TLS secret
pub const TLS_CERTIFICATE_KEY: &str = "tls.crt";

/// Data key holding the serving private key in the TLS secret
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

// ============================================================================
// Certificate Constants
// ============================================================================

/// Common name of the self-signed certificate authority
pub const CA_COMMON_NAME: &str = "Impersonation Proxy CA";

/// Common name of the serving certificate leaf
pub const SERVING_CERT_COMMON_NAME: &str = "Impersonation Proxy Serving Certificate";

/// Validity of the CA and serving certificates, in days (roughly 100 years)
pub const CERT_VALIDITY_DAYS: i64 = 100 * 365;

/// How far in the past certificates are backdated to tolerate clock skew
pub const CERT_BACKDATE_SECS: i64 = 5 * 60;

// ============================================================================
// Node Probe Constants
// ============================================================================

/// Label key prefix identifying a node role
pub const NODE_ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";

/// Alternate label key whose value names the node role
pub const NODE_ROLE_LABEL: &str = "kubernetes.io/node-role";

// ============================================================================
// Controller Runtime Constants
// ============================================================================

/// How long a failed sync waits before the first retry, in milliseconds
pub const SYNC_RETRY_INITIAL_MILLIS: u64 = 500;

/// Upper bound on the retry interval for failed syncs, in seconds
pub const SYNC_RETRY_MAX_SECS: u64 = 60;

/// Multiplier applied to the retry interval after each consecutive failure
pub const SYNC_RETRY_MULTIPLIER: f64 = 2.0;

/// Number of Tokio worker threads for the controller runtime
pub const TOKIO_WORKER_THREADS: usize = 2;

/// Default lease duration for leader election, in seconds
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 30;

/// Default grace period for lease renewal, in seconds
pub const DEFAULT_LEASE_GRACE_SECS: u64 = 5;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Bind address for the Prometheus metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

/// Port for the Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// HTTP path the metrics are served under
pub const METRICS_SERVER_PATH: &str = "/metrics";

// ============================================================================
// Default Resource Names
// ============================================================================

/// Default namespace the controller manages resources in
pub const DEFAULT_NAMESPACE: &str = "persona-system";

/// Default name of the singleton `CredentialIssuer` resource
pub const DEFAULT_CREDENTIAL_ISSUER_NAME: &str = "persona-config";

/// Default name of the generated LoadBalancer Service
pub const DEFAULT_LOAD_BALANCER_SERVICE_NAME: &str = "persona-impersonation-proxy-load-balancer";

/// Default name of the generated ClusterIP Service
pub const DEFAULT_CLUSTER_IP_SERVICE_NAME: &str = "persona-impersonation-proxy-cluster-ip";

/// Default name of the serving certificate secret
pub const DEFAULT_TLS_SECRET_NAME: &str = "persona-impersonation-proxy-tls-serving-certificate";

/// Default name of the certificate authority secret
pub const DEFAULT_CA_SECRET_NAME: &str = "persona-impersonation-proxy-ca-certificate";

/// Default name of the client-credential signer secret (owned by a sister controller)
pub const DEFAULT_SIGNER_SECRET_NAME: &str = "persona-signer-ca";

/// Default value of the `app` selector label on managed Services
pub const DEFAULT_APP_NAME: &str = "persona";
