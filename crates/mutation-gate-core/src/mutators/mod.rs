// crates/mutation-gate-core/src/mutators/mod.rs
// ============================================================================
// Module: Mutators
// Description: Sealed set of mutator variants and their shared contract.
// Purpose: Build validated mutators from definitions and apply them to documents.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Mutator`] is one of a closed set of variants. Each variant is built from
//! a serde definition and validated at construction, so a value of this type
//! is always safe to register. Application walks the mutator location with
//! the shared traversal in [`traversal`]; only the terminal write differs per
//! variant.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod assign;
pub mod assign_field;
pub mod assign_metadata;
pub mod modify_set;
pub(crate) mod traversal;
pub(crate) mod validation;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub use assign::Assign;
pub use assign::AssignDefinition;
pub use assign::AssignParameters;
pub use assign_field::AssignField;
pub use assign_field::FromMetadata;
pub use assign_field::MetadataField;
pub use assign_field::ValueSource;
pub use assign_metadata::AssignMetadata;
pub use assign_metadata::AssignMetadataDefinition;
pub use assign_metadata::AssignMetadataParameters;
pub use modify_set::ModifySet;
pub use modify_set::ModifySetDefinition;
pub use modify_set::ModifySetParameters;
pub use modify_set::SetOperation;
pub use modify_set::SetValues;

use crate::core::ApplyTo;
use crate::core::DocumentError;
use crate::core::ExternalData;
use crate::core::MatchError;
use crate::core::Mutable;
use crate::core::MutatorId;
use crate::core::MutatorKind;
use crate::core::Path;
use crate::core::PathError;
use crate::core::PathTestError;
use crate::core::Value;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Construction-time mutator configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutatorError {
    /// Location failed to parse.
    #[error("invalid location: {0}")]
    Path(#[from] PathError),
    /// Path tests are invalid for the location.
    #[error(transparent)]
    PathTest(#[from] PathTestError),
    /// Match criteria or bindings are invalid.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// Mutator name is empty.
    #[error("mutator name must not be empty")]
    EmptyName,
    /// A non-metadata mutator targets `metadata`.
    #[error("location `{0}` is rooted at metadata; use AssignMetadata for labels and annotations")]
    MetadataRoot(String),
    /// A metadata mutator targets something other than a label or annotation.
    #[error("location `{0}` must be metadata.labels.<key> or metadata.annotations.<key>")]
    MetadataLocation(String),
    /// A location writes the key field of its enclosing list step.
    #[error("location `{location}` mutates list key field `{key_field}`")]
    KeyFieldMutation {
        /// Offending location.
        location: String,
        /// Key field of the enclosing list step.
        key_field: String,
    },
    /// The value source is missing or ambiguous.
    #[error("assign must set exactly one of value, fromMetadata, or externalData")]
    ValueSource,
    /// A value written at a list position is not a matching keyed object.
    #[error("value at list location `{location}` is invalid: {reason}")]
    ListValue {
        /// Offending location.
        location: String,
        /// Failure description.
        reason: String,
    },
    /// A set mutator location ends in a list step.
    #[error("set location `{0}` must end in a field, not a list element")]
    SetTerminal(String),
    /// A metadata value is not a string.
    #[error("metadata values must be strings, found {0}")]
    MetadataValue(&'static str),
    /// External data configuration is invalid.
    #[error("invalid external data: {0}")]
    ExternalData(&'static str),
}

/// Apply-time errors raised while writing a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// A container had an unexpected shape.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// A list element lacks a scalar key field.
    #[error("list element written at `{location}` has no scalar key field `{key_field}`")]
    MissingListKey {
        /// Location of the list step.
        location: String,
        /// Expected key field.
        key_field: String,
    },
    /// A written list element would change the key it is addressed by.
    #[error("cannot change key `{key_field}` at `{location}` from `{expected}` to `{found}`")]
    KeyMismatch {
        /// Location of the list step.
        location: String,
        /// Key field name.
        key_field: String,
        /// Key value from the location.
        expected: String,
        /// Key value carried by the written element.
        found: String,
    },
    /// The mutator has no element to write at a list position.
    #[error("mutator cannot write a list element at `{0}`")]
    NoListElement(String),
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Serialized mutator definition tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MutatorDefinition {
    /// Field assignment.
    Assign(AssignDefinition),
    /// Set membership edit.
    ModifySet(ModifySetDefinition),
    /// Label or annotation synthesis.
    AssignMetadata(AssignMetadataDefinition),
}

// ============================================================================
// SECTION: Mutator
// ============================================================================

/// Validated mutator of one of the supported variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutator {
    /// Sets a value at a path.
    Assign(Assign),
    /// Adds or removes members of a set-valued list.
    ModifySet(ModifySet),
    /// Synthesizes labels or annotations.
    AssignMetadata(AssignMetadata),
}

impl Mutator {
    /// Builds and validates a mutator from a definition.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError`] when the definition is invalid.
    pub fn from_definition(definition: MutatorDefinition) -> Result<Self, MutatorError> {
        Ok(match definition {
            MutatorDefinition::Assign(definition) => Self::Assign(Assign::new(definition)?),
            MutatorDefinition::ModifySet(definition) => {
                Self::ModifySet(ModifySet::new(definition)?)
            }
            MutatorDefinition::AssignMetadata(definition) => {
                Self::AssignMetadata(AssignMetadata::new(definition)?)
            }
        })
    }

    /// Returns the registry identity.
    #[must_use]
    pub const fn id(&self) -> &MutatorId {
        match self {
            Self::Assign(mutator) => mutator.id(),
            Self::ModifySet(mutator) => mutator.id(),
            Self::AssignMetadata(mutator) => mutator.id(),
        }
    }

    /// Returns the variant tag.
    #[must_use]
    pub const fn kind(&self) -> MutatorKind {
        match self {
            Self::Assign(_) => MutatorKind::Assign,
            Self::ModifySet(_) => MutatorKind::ModifySet,
            Self::AssignMetadata(_) => MutatorKind::AssignMetadata,
        }
    }

    /// Returns the definition generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        match self {
            Self::Assign(mutator) => mutator.generation(),
            Self::ModifySet(mutator) => mutator.generation(),
            Self::AssignMetadata(mutator) => mutator.generation(),
        }
    }

    /// Returns the target location.
    #[must_use]
    pub const fn path(&self) -> &Path {
        match self {
            Self::Assign(mutator) => mutator.path(),
            Self::ModifySet(mutator) => mutator.path(),
            Self::AssignMetadata(mutator) => mutator.path(),
        }
    }

    /// Returns the schema bindings, or `None` for variants outside the schema database.
    #[must_use]
    pub fn schema_bindings(&self) -> Option<&[ApplyTo]> {
        match self {
            Self::Assign(mutator) => Some(mutator.bindings()),
            Self::ModifySet(mutator) => Some(mutator.bindings()),
            Self::AssignMetadata(_) => None,
        }
    }

    /// Returns true when the mutator applies to the mutable's object.
    #[must_use]
    pub fn matches(&self, mutable: &Mutable) -> bool {
        match self {
            Self::Assign(mutator) => mutator.matches(mutable),
            Self::ModifySet(mutator) => mutator.matches(mutable),
            Self::AssignMetadata(mutator) => mutator.matches(mutable),
        }
    }

    /// Applies the mutator in place, returning whether the document changed.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when the document shape prevents the write.
    pub fn mutate(&self, mutable: &mut Mutable) -> Result<bool, ApplyError> {
        match self {
            Self::Assign(mutator) => mutator.mutate(mutable),
            Self::ModifySet(mutator) => mutator.mutate(mutable),
            Self::AssignMetadata(mutator) => mutator.mutate(mutable),
        }
    }

    /// Returns the value the mutator would write without a prior value at the location.
    #[must_use]
    pub fn value(&self, mutable: &Mutable) -> Option<Value> {
        match self {
            Self::Assign(mutator) => mutator.value(mutable),
            Self::ModifySet(mutator) => Some(mutator.value()),
            Self::AssignMetadata(mutator) => mutator.value(mutable),
        }
    }

    /// Returns true when `other` differs in any configured field.
    #[must_use]
    pub fn has_diff(&self, other: &Self) -> bool {
        self != other
    }

    /// Returns true when the mutator writes external data placeholders.
    #[must_use]
    pub fn uses_external_data(&self) -> bool {
        match self {
            Self::Assign(mutator) => mutator.uses_external_data(),
            Self::ModifySet(_) => false,
            Self::AssignMetadata(mutator) => mutator.uses_external_data(),
        }
    }

    /// Returns the external data declaration, if any.
    #[must_use]
    pub const fn external_data(&self) -> Option<&ExternalData> {
        match self {
            Self::Assign(mutator) => mutator.external_data(),
            Self::ModifySet(_) => None,
            Self::AssignMetadata(mutator) => mutator.external_data(),
        }
    }

    /// Returns true when nothing may be addressed below the mutator location.
    #[must_use]
    pub const fn must_terminate(&self) -> bool {
        matches!(self, Self::ModifySet(_))
    }
}

impl fmt::Display for Mutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id();
        write!(f, "{}/{}/{}:{}", self.kind(), id.namespace, id.name, self.generation())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
