// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Strategy status constants published to the `CredentialIssuer` resource.
//!
//! Exactly one strategy entry of type [`STRATEGY_TYPE_IMPERSONATION_PROXY`] is
//! owned by this controller; entries of any other type belong to peer
//! controllers and are preserved verbatim on every status write.

/// Strategy type owned by this controller
pub const STRATEGY_TYPE_IMPERSONATION_PROXY: &str = "ImpersonationProxy";

/// Frontend type advertised on a successful strategy
pub const FRONTEND_TYPE_IMPERSONATION_PROXY: &str = "ImpersonationProxyFrontend";

// ============================================================================
// Strategy Status Values
// ============================================================================

/// The strategy is working and the proxy accepts connections
pub const STRATEGY_STATUS_SUCCESS: &str = "Success";

/// The strategy is not currently usable
pub const STRATEGY_STATUS_ERROR: &str = "Error";

// ============================================================================
// Strategy Reasons
// ============================================================================

/// The proxy is serving with valid certificates
pub const STRATEGY_REASON_LISTENING: &str = "Listening";

/// The proxy is waiting for the front-door endpoint to materialize
pub const STRATEGY_REASON_PENDING: &str = "Pending";

/// The proxy is disabled, either explicitly or automatically
pub const STRATEGY_REASON_DISABLED: &str = "Disabled";

/// Something went wrong while reconciling the proxy
pub const STRATEGY_REASON_ERROR_DURING_SETUP: &str = "ErrorDuringSetup";

// ============================================================================
// Strategy Messages
// ============================================================================

/// Message published alongside a successful strategy
pub const MESSAGE_SUCCESS: &str = "impersonation proxy is ready to accept client connections";

/// Message published while waiting for a load balancer ingress
pub const MESSAGE_PENDING: &str =
    "waiting for load balancer Service to be assigned IP or hostname";

/// Message published when auto mode decided to disable the proxy
pub const MESSAGE_AUTO_DISABLED: &str =
    "automatically determined that impersonation proxy should be disabled";

/// Message published when the spec explicitly disabled the proxy
pub const MESSAGE_MANUALLY_DISABLED: &str =
    "impersonation proxy was explicitly disabled by configuration";
