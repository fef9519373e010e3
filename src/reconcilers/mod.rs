// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

pub mod credentialissuer;

pub use credentialissuer::reconcile_credentialissuer;
