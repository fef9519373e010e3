// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label constants used on all resources created by the controller.
//!
//! The controller stamps one fixed label map (assembled at startup from the
//! installation settings) onto every Service and Secret it creates, so that
//! operators can find and garbage-collect everything the controller owns.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/managed-by` on every resource this controller creates
pub const MANAGED_BY_PERSONA: &str = "persona";

/// Component value for impersonation-proxy resources
pub const COMPONENT_IMPERSONATION_PROXY: &str = "impersonation-proxy";

// ============================================================================
// Selector Labels
// ============================================================================

/// Selector label key on the front-door Services; the value is the
/// installation's app name so traffic reaches the controller pods.
pub const APP_LABEL: &str = "app";
