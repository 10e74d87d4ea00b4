// crates/mutation-gate-core/src/core/mod.rs
// ============================================================================
// Module: Mutation Gate Core Types
// Description: Document model, path language, and selection primitives.
// Purpose: Provide the value types every mutator and runtime component shares.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Core types describe the admitted document, the addressing language used by
//! mutator locations, path-test pre-conditions, match criteria, and the
//! external data provider contract. They carry no runtime state.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod document;
pub mod external_data;
pub mod identifiers;
pub mod matching;
pub mod mutable;
pub mod path;
pub mod path_test;
pub mod provider;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use document::DocumentError;
pub use document::Value;
pub use external_data::DataSource;
pub use external_data::ExternalData;
pub use external_data::FailurePolicy;
pub use external_data::Placeholder;
pub use identifiers::GroupVersionKind;
pub use identifiers::MUTATIONS_GROUP;
pub use identifiers::MutationId;
pub use identifiers::MutatorId;
pub use identifiers::MutatorKind;
pub use matching::ApplyTo;
pub use matching::KindSelector;
pub use matching::LabelSelector;
pub use matching::LabelSelectorRequirement;
pub use matching::Match;
pub use matching::MatchError;
pub use matching::Scope;
pub use matching::SelectorOperator;
pub use matching::Source;
pub use mutable::Mutable;
pub use mutable::SourceType;
pub use path::ListSelector;
pub use path::ListStep;
pub use path::ObjectStep;
pub use path::Path;
pub use path::PathError;
pub use path::PathNode;
pub use path::parse_path;
pub use path_test::Condition;
pub use path_test::PathTest;
pub use path_test::PathTestError;
pub use path_test::Tester;
pub use provider::ClientCert;
pub use provider::DEFAULT_PROVIDER_TIMEOUT_SECS;
pub use provider::PROVIDER_API_VERSION;
pub use provider::ProviderItem;
pub use provider::ProviderRequest;
pub use provider::ProviderRequestBody;
pub use provider::ProviderResponse;
pub use provider::ProviderResponseBody;
pub use provider::ProviderSpec;
