// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the dynamic certificate resolver.

#[cfg(test)]
mod tests {
    use crate::dynamic_cert::DynamicCertProvider;
    use crate::pki::{CertificateAuthority, SubjectAltName};
    use crate::proxy_server::DynamicServerCertResolver;
    use std::sync::Arc;

    fn serving_material() -> (Vec<u8>, Vec<u8>) {
        let ca = CertificateAuthority::generate().expect("CA generation should succeed");
        let serving = ca
            .issue_serving_cert(&[SubjectAltName::Ip("127.0.0.1".parse().unwrap())])
            .expect("issuance should succeed");
        (
            serving.cert_pem.into_bytes(),
            serving.key_pem.into_bytes(),
        )
    }

    #[test]
    fn valid_material_resolves_and_is_cached() {
        let (cert, key) = serving_material();
        let resolver = DynamicServerCertResolver::new(DynamicCertProvider::new("test"));

        let first = resolver
            .certified_key(&cert, &key)
            .expect("material should resolve");
        let second = resolver
            .certified_key(&cert, &key)
            .expect("material should resolve");
        assert!(Arc::ptr_eq(&first, &second), "same PEM should hit the cache");
    }

    #[test]
    fn swapped_material_invalidates_the_cache() {
        let (cert, key) = serving_material();
        let resolver = DynamicServerCertResolver::new(DynamicCertProvider::new("test"));
        let first = resolver
            .certified_key(&cert, &key)
            .expect("material should resolve");

        let (new_cert, new_key) = serving_material();
        let second = resolver
            .certified_key(&new_cert, &new_key)
            .expect("material should resolve");

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn garbage_material_resolves_nothing() {
        let resolver = DynamicServerCertResolver::new(DynamicCertProvider::new("test"));
        assert!(resolver.certified_key(b"not pem", b"not pem").is_none());
        assert!(resolver.certified_key(b"", b"").is_none());
    }

    #[test]
    fn mismatched_key_type_resolves_nothing() {
        let (cert, _) = serving_material();
        let resolver = DynamicServerCertResolver::new(DynamicCertProvider::new("test"));
        assert!(resolver.certified_key(&cert, b"not a key").is_none());
    }
}
