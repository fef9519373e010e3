// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Atomically swappable certificate cells.
//!
//! A [`DynamicCertProvider`] is shared between the reconciler (the only
//! writer) and the proxy's TLS hot path (many readers). Readers always see a
//! consistent (certificate, key) snapshot; writers never block readers longer
//! than the swap itself. This is what makes certificate rotation
//! zero-downtime: the reconciler swaps new PEM material in place and the next
//! TLS handshake picks it up, with no listener restart.

use std::sync::{Arc, RwLock};

/// One (certificate PEM, private key PEM) snapshot.
pub type CertKeyPair = (Vec<u8>, Vec<u8>);

/// Shared, swappable holder for a PEM certificate/key pair.
///
/// Cloning is cheap and shares the underlying cell.
#[derive(Clone, Default)]
pub struct DynamicCertProvider {
    name: &'static str,
    current: Arc<RwLock<Option<CertKeyPair>>>,
}

impl DynamicCertProvider {
    /// Create an empty provider. The name shows up in log lines only.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the held pair. Readers observe the new pair on their next
    /// call.
    pub fn set_cert_key(&self, cert_pem: Vec<u8>, key_pem: Vec<u8>) {
        let mut guard = self.current.write().expect("cert provider lock poisoned");
        *guard = Some((cert_pem, key_pem));
        tracing::debug!(provider = self.name, "Swapped certificate material");
    }

    /// Drop the held pair. Readers observe emptiness on their next call.
    pub fn clear(&self) {
        let mut guard = self.current.write().expect("cert provider lock poisoned");
        if guard.take().is_some() {
            tracing::debug!(provider = self.name, "Cleared certificate material");
        }
    }

    /// Current snapshot, or `None` when no material is loaded.
    #[must_use]
    pub fn current_cert_key(&self) -> Option<CertKeyPair> {
        self.current
            .read()
            .expect("cert provider lock poisoned")
            .clone()
    }

    /// Current certificate PEM only, convenient for CA-bundle consumers.
    #[must_use]
    pub fn current_cert(&self) -> Option<Vec<u8>> {
        self.current
            .read()
            .expect("cert provider lock poisoned")
            .as_ref()
            .map(|(cert, _)| cert.clone())
    }

    /// Whether any material is currently loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .expect("cert provider lock poisoned")
            .is_some()
    }
}

impl std::fmt::Debug for DynamicCertProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicCertProvider")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
#[path = "dynamic_cert_tests.rs"]
mod dynamic_cert_tests;
