// crates/mutation-gate-config/src/lib.rs
// ============================================================================
// Module: Mutation Gate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for mutation-gate.toml semantics.
// Dependencies: mutation-gate-core, mutation-gate-providers, serde, toml
// ============================================================================

//! ## Overview
//! `mutation-gate-config` defines the configuration model for the mutation
//! system: system options, external data settings, the provider catalog, and
//! statically configured mutators. Validation is strict and fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
