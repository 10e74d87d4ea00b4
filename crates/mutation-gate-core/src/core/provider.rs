// crates/mutation-gate-core/src/core/provider.rs
// ============================================================================
// Module: External Data Provider Protocol
// Description: Provider descriptors, client identities, and wire payloads.
// Purpose: Share the provider contract between the resolver and transports.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Providers are addressed by name through a provider cache. Each call posts a
//! [`ProviderRequest`] carrying every key wanted from that provider and reads
//! back a [`ProviderResponse`]. A response must be idempotent and carry no
//! system error to be usable; per-item errors only fail their own key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// API version carried by provider requests and responses.
pub const PROVIDER_API_VERSION: &str = "externaldata.mutation-gate.dev/v1beta1";

/// Default per-provider call timeout in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// SECTION: Provider Spec
// ============================================================================

/// Registered external data provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Unique provider name referenced by mutators.
    pub name: String,
    /// Endpoint URL receiving provider requests.
    pub url: String,
    /// Call timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// PEM bundle used to verify the provider's server certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
}

impl ProviderSpec {
    /// Creates a provider spec with the default timeout and no CA bundle.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout_seconds: DEFAULT_PROVIDER_TIMEOUT_SECS,
            ca_bundle: None,
        }
    }

    /// Returns the configured timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Serde default for [`ProviderSpec::timeout_seconds`].
const fn default_timeout_seconds() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

// ============================================================================
// SECTION: Client Identity
// ============================================================================

/// Client TLS identity presented to providers.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCert {
    /// PEM-encoded certificate chain.
    pub cert_pem: String,
    /// PEM-encoded private key.
    pub key_pem: String,
}

impl fmt::Debug for ClientCert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCert")
            .field("cert_pem", &self.cert_pem)
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// SECTION: Wire Payloads
// ============================================================================

/// Request body sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRequest {
    /// API version tag.
    pub api_version: String,
    /// Kind tag (`ProviderRequest`).
    pub kind: String,
    /// Request payload.
    pub request: ProviderRequestBody,
}

impl ProviderRequest {
    /// Builds a request for the given keys.
    #[must_use]
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            api_version: PROVIDER_API_VERSION.to_string(),
            kind: "ProviderRequest".to_string(),
            request: ProviderRequestBody {
                keys,
            },
        }
    }
}

/// Keys requested from a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRequestBody {
    /// De-duplicated lookup keys.
    pub keys: Vec<String>,
}

/// Response body returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponse {
    /// API version tag.
    #[serde(default)]
    pub api_version: String,
    /// Kind tag (`ProviderResponse`).
    #[serde(default)]
    pub kind: String,
    /// Response payload.
    pub response: ProviderResponseBody,
}

/// Per-key results and provider-level status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponseBody {
    /// Whether repeated calls with the same keys return the same values.
    #[serde(default)]
    pub idempotent: bool,
    /// Per-key results.
    #[serde(default)]
    pub items: Vec<ProviderItem>,
    /// Provider-wide error; non-empty fails every key of the call.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_error: String,
}

/// Result for one requested key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderItem {
    /// Requested key.
    pub key: String,
    /// Returned value.
    #[serde(default)]
    pub value: JsonValue,
    /// Per-key error; non-empty fails this key only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ProviderResponse {
    /// Builds an idempotent response from per-key items.
    #[must_use]
    pub fn new(items: Vec<ProviderItem>) -> Self {
        Self {
            api_version: PROVIDER_API_VERSION.to_string(),
            kind: "ProviderResponse".to_string(),
            response: ProviderResponseBody {
                idempotent: true,
                items,
                system_error: String::new(),
            },
        }
    }
}
