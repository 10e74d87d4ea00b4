// crates/mutation-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Mutation Gate Runtime
// Description: Registry, convergence loop, and external data resolution.
// Purpose: Apply registered mutators to admitted objects until they converge.
// Dependencies: crate::{core, interfaces, mutators}, rand, tokio
// ============================================================================

//! ## Overview
//! Runtime modules hold the stateful parts of the engine: the ordered mutator
//! index, the schema conflict database, the [`System`] that drives the
//! convergence loop, and the resolver that replaces external data
//! placeholders after the loop.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod correlation;
pub mod external;
pub mod index;
pub mod schema;
pub mod system;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use correlation::MUTATION_ID_PREFIX;
pub use correlation::MutationIdGenerator;
pub use external::ExternalDataError;
pub use external::ExternalDataResolver;
pub use external::PlaceholderError;
pub use index::MutatorIndex;
pub use schema::NodeType;
pub use schema::SchemaDb;
pub use schema::SchemaError;
pub use schema::Segment;
pub use system::MUTATION_ID_ANNOTATION;
pub use system::MUTATIONS_ANNOTATION;
pub use system::MutationError;
pub use system::System;
pub use system::SystemOptions;
