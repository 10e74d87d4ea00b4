// crates/mutation-gate-providers/src/lib.rs
// ============================================================================
// Module: Mutation Gate Providers
// Description: Concrete external data collaborators for the mutation system.
// Purpose: Supply the provider cache, client identity, and HTTP transport.
// Dependencies: mutation-gate-core, reqwest, url
// ============================================================================

//! ## Overview
//! This crate implements the collaborator seams the core resolver consumes:
//! [`InMemoryProviderCache`] for provider lookup, [`StaticCertSource`] and
//! [`FileCertSource`] for the client identity, and [`HttpProviderClient`]
//! for the wire call.
//! Invariants:
//! - Provider specs are validated before they become visible to lookups.
//! - The HTTP client rejects cleartext URLs and oversized responses.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache;
pub mod certs;
pub mod http;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::InMemoryProviderCache;
pub use cache::ProviderCacheError;
pub use certs::FileCertSource;
pub use certs::StaticCertSource;
pub use http::HttpProviderClient;
pub use http::HttpProviderClientConfig;

#[cfg(test)]
mod tests;
