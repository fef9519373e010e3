// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Persona - Impersonation Proxy Controller for Kubernetes
//!
//! Persona is a cluster-resident control-plane agent that lets end users
//! authenticate to a Kubernetes API server through an impersonation proxy.
//! This library contains the controller that manages the proxy's full
//! lifecycle, driven by a single cluster-scoped `CredentialIssuer` resource:
//!
//! - An embedded TLS-terminating proxy server, started and stopped to match
//!   the configured mode, with certificate rotation that never restarts it
//! - A front-door Service (LoadBalancer, ClusterIP, or none)
//! - A self-signed certificate authority and a serving certificate whose
//!   subject alternative names always track the externally observed endpoint
//! - The `ImpersonationProxy` strategy entry published into the resource's
//!   status, alongside entries owned by peer controllers
//!
//! ## Modules
//!
//! - [`crd`] - The `CredentialIssuer` custom resource
//! - [`reconcilers`] - The credential issuer reconciliation pipeline
//! - [`pki`] - Certificate authority and serving-certificate primitives
//! - [`proxy`] - Proxy server lifecycle and supervision
//! - [`proxy_server`] - The TLS-terminating proxy front end
//! - [`runtime`] - Watch multiplexing and the serial sync loop
//!
//! ## Invariants
//!
//! The serving certificate's SAN set always equals the resolved endpoint's
//! SAN set, and the certificate always verifies under the CA currently
//! persisted in the CA secret. Status never reports success unless every
//! reconciliation step succeeded in the same sync.

pub mod constants;
pub mod context;
pub mod crd;
pub mod dynamic_cert;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod pki;
pub mod proxy;
pub mod proxy_server;
pub mod reconcilers;
pub mod runtime;
pub mod status_reasons;
