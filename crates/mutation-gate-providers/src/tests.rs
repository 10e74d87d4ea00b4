// crates/mutation-gate-providers/src/tests.rs
// ============================================================================
// Module: Providers Unit Tests
// Description: Provider catalog validation and in-memory identity rotation.
// Purpose: Cover the collaborators that need no network or filesystem.
// Dependencies: mutation-gate-providers
// ============================================================================

//! ## Overview
//! Unit tests for [`InMemoryProviderCache`] and [`StaticCertSource`].

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use mutation_gate_core::CertError;
use mutation_gate_core::ClientCert;
use mutation_gate_core::ClientCertSource;
use mutation_gate_core::ProviderCache;
use mutation_gate_core::ProviderSpec;

use crate::InMemoryProviderCache;
use crate::ProviderCacheError;
use crate::StaticCertSource;

// ============================================================================
// SECTION: Provider Cache
// ============================================================================

#[test]
fn cache_serves_upserted_specs() {
    let cache = InMemoryProviderCache::new();
    assert!(cache.get("registry").is_none());
    let previous = cache.upsert(ProviderSpec::new("registry", "https://registry.local")).unwrap();
    assert!(previous.is_none());
    assert_eq!(cache.get("registry").unwrap().url, "https://registry.local");

    let mut replacement = ProviderSpec::new("registry", "https://mirror.local/lookup");
    replacement.timeout_seconds = 2;
    let previous = cache.upsert(replacement).unwrap();
    assert_eq!(previous.unwrap().url, "https://registry.local");
    assert_eq!(cache.get("registry").unwrap().timeout_seconds, 2);

    assert!(cache.remove("registry").unwrap());
    assert!(!cache.remove("registry").unwrap());
    assert!(cache.get("registry").is_none());
}

#[test]
fn cache_rejects_invalid_specs() {
    let cache = InMemoryProviderCache::new();
    assert_eq!(
        cache.upsert(ProviderSpec::new("", "https://a.local")),
        Err(ProviderCacheError::InvalidName(String::new()))
    );
    assert!(matches!(
        cache.upsert(ProviderSpec::new("a", "not a url")),
        Err(ProviderCacheError::InvalidUrl { .. })
    ));
    assert!(matches!(
        cache.upsert(ProviderSpec::new("a", "ftp://a.local")),
        Err(ProviderCacheError::InvalidUrl { .. })
    ));
    assert!(matches!(
        cache.upsert(ProviderSpec::new("a", "https://user:pw@a.local")),
        Err(ProviderCacheError::InvalidUrl { .. })
    ));
    let mut bad_bundle = ProviderSpec::new("a", "https://a.local");
    bad_bundle.ca_bundle = Some("not a certificate".to_string());
    assert_eq!(cache.upsert(bad_bundle), Err(ProviderCacheError::InvalidCaBundle("a".to_string())));
    assert!(cache.names().unwrap().is_empty());
}

#[test]
fn seeded_cache_rejects_duplicate_names() {
    let specs = vec![
        ProviderSpec::new("users", "https://users.local"),
        ProviderSpec::new("registry", "https://registry.local"),
    ];
    let cache = InMemoryProviderCache::from_specs(specs).unwrap();
    assert_eq!(cache.names().unwrap(), vec!["registry".to_string(), "users".to_string()]);

    let duplicated = vec![
        ProviderSpec::new("users", "https://users.local"),
        ProviderSpec::new("users", "https://other.local"),
    ];
    let err = InMemoryProviderCache::from_specs(duplicated).unwrap_err();
    assert_eq!(err, ProviderCacheError::DuplicateName("users".to_string()));
}

// ============================================================================
// SECTION: Static Identity
// ============================================================================

#[test]
fn static_source_rotates_and_clears() {
    let first = ClientCert {
        cert_pem: "first-cert".to_string(),
        key_pem: "first-key".to_string(),
    };
    let source = StaticCertSource::new(first.clone());
    assert_eq!(source.client_cert().unwrap(), first);

    let second = ClientCert {
        cert_pem: "second-cert".to_string(),
        key_pem: "second-key".to_string(),
    };
    source.set(second.clone());
    assert_eq!(source.client_cert().unwrap(), second);

    source.clear();
    assert!(matches!(source.client_cert(), Err(CertError::Unavailable(_))));
    assert!(StaticCertSource::empty().client_cert().is_err());
}
