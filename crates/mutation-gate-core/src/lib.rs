// crates/mutation-gate-core/src/lib.rs
// ============================================================================
// Module: Mutation Gate Core Library
// Description: Public API surface for the Mutation Gate core.
// Purpose: Expose core types, mutators, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, mutators, runtime}
// ============================================================================

//! ## Overview
//! Mutation Gate core rewrites admitted objects with declarative mutators.
//! Mutators address fields with a small path language, are guarded by path
//! tests and match criteria, and are applied repeatedly until the object
//! stops changing. Conflicting mutator shapes are detected at registration,
//! and values owned by external data providers are resolved in one batched
//! pass. The core is in-process only and reaches its collaborators through
//! explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod mutators;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CertError;
pub use interfaces::ClientCertSource;
pub use interfaces::ConvergenceStatus;
pub use interfaces::FileMutationLogSink;
pub use interfaces::MemoryMutationLogSink;
pub use interfaces::MutationAuditEvent;
pub use interfaces::MutationAuditEventParams;
pub use interfaces::MutationLogSink;
pub use interfaces::MutationOutcome;
pub use interfaces::NoopMutationLogSink;
pub use interfaces::NoopStatsReporter;
pub use interfaces::PlaceholderAuditEvent;
pub use interfaces::ProviderCache;
pub use interfaces::ProviderCallError;
pub use interfaces::ProviderClient;
pub use interfaces::StatsError;
pub use interfaces::StatsFailureAuditEvent;
pub use interfaces::StatsReporter;
pub use interfaces::StderrMutationLogSink;
pub use mutators::ApplyError;
pub use mutators::Mutator;
pub use mutators::MutatorDefinition;
pub use mutators::MutatorError;
pub use runtime::ExternalDataError;
pub use runtime::ExternalDataResolver;
pub use runtime::MUTATION_ID_ANNOTATION;
pub use runtime::MUTATIONS_ANNOTATION;
pub use runtime::MutationError;
pub use runtime::MutationIdGenerator;
pub use runtime::MutatorIndex;
pub use runtime::PlaceholderError;
pub use runtime::SchemaDb;
pub use runtime::SchemaError;
pub use runtime::System;
pub use runtime::SystemOptions;
