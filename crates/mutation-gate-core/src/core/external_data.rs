// crates/mutation-gate-core/src/core/external_data.rs
// ============================================================================
// Module: External Data Declarations
// Description: Provider references, failure policies, and document placeholders.
// Purpose: Describe values that must be resolved by an external data provider.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A mutator may declare that its value comes from an external data provider.
//! During the convergence loop such mutators write a [`Placeholder`] into the
//! document; placeholders are resolved in one batched pass afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Policies
// ============================================================================

/// Behavior when a provider cannot supply a value for a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Propagate the error and fail the mutation.
    #[default]
    Fail,
    /// Substitute the requested key as a literal string.
    Ignore,
    /// Substitute the declared default value.
    UseDefault,
}

/// Source of the key sent to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataSource {
    /// The value currently stored at the mutator location.
    #[default]
    ValueAtLocation,
    /// The username of the requester.
    Username,
}

// ============================================================================
// SECTION: External Data Declaration
// ============================================================================

/// External data declaration carried by a mutator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalData {
    /// Provider name as registered in the provider cache.
    pub provider: String,
    /// Where the lookup key comes from.
    #[serde(default)]
    pub data_source: DataSource,
    /// Failure handling for this value.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Default used with [`FailurePolicy::UseDefault`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ExternalData {
    /// Builds a placeholder for the given lookup key.
    #[must_use]
    pub fn placeholder(&self, key: impl Into<String>) -> Placeholder {
        Placeholder {
            provider: self.provider.clone(),
            key: key.into(),
            failure_policy: self.failure_policy,
            default: self.default.clone(),
        }
    }
}

// ============================================================================
// SECTION: Placeholder
// ============================================================================

/// Typed marker standing in for a value to be fetched from a provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Placeholder {
    /// Provider name.
    pub provider: String,
    /// Lookup key sent to the provider.
    pub key: String,
    /// Failure handling for this placeholder.
    pub failure_policy: FailurePolicy,
    /// Default used with [`FailurePolicy::UseDefault`].
    pub default: Option<String>,
}
