// crates/mutation-gate-providers/src/cache.rs
// ============================================================================
// Module: In-Memory Provider Cache
// Description: Name-indexed catalog of external data providers.
// Purpose: Serve provider lookups for the resolver and accept catalog updates.
// Dependencies: mutation-gate-core, reqwest, url
// ============================================================================

//! ## Overview
//! The cache maps provider names to validated [`ProviderSpec`] values. Specs
//! are replaced wholesale on upsert so lookups never observe a partially
//! updated provider.
//! Invariants:
//! - Every stored spec has a non-empty name and an absolute `http`/`https` URL.
//! - A configured CA bundle contains at least one parseable certificate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::RwLock;

use mutation_gate_core::ProviderCache;
use mutation_gate_core::ProviderSpec;
use reqwest::Certificate;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Provider catalog errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderCacheError {
    /// Provider name is empty or contains whitespace.
    #[error("invalid provider name `{0}`")]
    InvalidName(String),
    /// Provider URL is malformed or uses an unsupported scheme.
    #[error("provider `{name}` has an invalid url: {reason}")]
    InvalidUrl {
        /// Provider name.
        name: String,
        /// Failure description.
        reason: String,
    },
    /// CA bundle holds no usable certificate.
    #[error("provider `{0}` has an invalid CA bundle")]
    InvalidCaBundle(String),
    /// Two specs in one batch share a name.
    #[error("duplicate provider name `{0}`")]
    DuplicateName(String),
    /// The catalog lock was poisoned.
    #[error("provider cache lock poisoned")]
    Lock,
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Provider catalog guarded by a read-write lock.
#[derive(Debug, Default)]
pub struct InMemoryProviderCache {
    /// Specs by provider name.
    providers: RwLock<BTreeMap<String, ProviderSpec>>,
}

impl InMemoryProviderCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache seeded with the given specs.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderCacheError`] when a spec is invalid or two specs share
    /// a name.
    pub fn from_specs(
        specs: impl IntoIterator<Item = ProviderSpec>,
    ) -> Result<Self, ProviderCacheError> {
        let mut providers = BTreeMap::new();
        for spec in specs {
            validate_spec(&spec)?;
            if providers.contains_key(&spec.name) {
                return Err(ProviderCacheError::DuplicateName(spec.name));
            }
            providers.insert(spec.name.clone(), spec);
        }
        Ok(Self {
            providers: RwLock::new(providers),
        })
    }

    /// Inserts or replaces a provider and returns the previous spec.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderCacheError`] when the spec is invalid or the lock is
    /// poisoned.
    pub fn upsert(&self, spec: ProviderSpec) -> Result<Option<ProviderSpec>, ProviderCacheError> {
        validate_spec(&spec)?;
        let mut providers = self.providers.write().map_err(|_| ProviderCacheError::Lock)?;
        Ok(providers.insert(spec.name.clone(), spec))
    }

    /// Removes a provider; returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderCacheError::Lock`] when the lock is poisoned.
    pub fn remove(&self, name: &str) -> Result<bool, ProviderCacheError> {
        let mut providers = self.providers.write().map_err(|_| ProviderCacheError::Lock)?;
        Ok(providers.remove(name).is_some())
    }

    /// Returns the registered provider names in order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderCacheError::Lock`] when the lock is poisoned.
    pub fn names(&self) -> Result<Vec<String>, ProviderCacheError> {
        let providers = self.providers.read().map_err(|_| ProviderCacheError::Lock)?;
        Ok(providers.keys().cloned().collect())
    }
}

impl ProviderCache for InMemoryProviderCache {
    fn get(&self, name: &str) -> Option<ProviderSpec> {
        self.providers.read().ok()?.get(name).cloned()
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Checks a spec before it enters the catalog.
fn validate_spec(spec: &ProviderSpec) -> Result<(), ProviderCacheError> {
    if spec.name.is_empty() || spec.name.chars().any(char::is_whitespace) {
        return Err(ProviderCacheError::InvalidName(spec.name.clone()));
    }
    let invalid_url = |reason: &str| ProviderCacheError::InvalidUrl {
        name: spec.name.clone(),
        reason: reason.to_string(),
    };
    let url = Url::parse(&spec.url).map_err(|err| invalid_url(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid_url("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid_url("host required"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid_url("credentials are not allowed"));
    }
    if let Some(bundle) = &spec.ca_bundle {
        let certs = Certificate::from_pem_bundle(bundle.as_bytes())
            .map_err(|_| ProviderCacheError::InvalidCaBundle(spec.name.clone()))?;
        if certs.is_empty() {
            return Err(ProviderCacheError::InvalidCaBundle(spec.name.clone()));
        }
    }
    Ok(())
}
