// crates/mutation-gate-core/src/mutators/assign_field.rs
// ============================================================================
// Module: Assigned Value Sources
// Description: Literal, metadata-derived, and external data values.
// Purpose: Resolve the value an assigning mutator writes at its location.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! [`AssignField`] is the serialized `assign` block; exactly one of `value`,
//! `fromMetadata`, or `externalData` must be set. It is converted into a
//! [`ValueSource`] at construction. External data sources resolve to a
//! [`Placeholder`](crate::core::Placeholder) rather than a concrete value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::core::DataSource;
use crate::core::ExternalData;
use crate::core::FailurePolicy;
use crate::core::Mutable;
use crate::core::Value;
use crate::mutators::MutatorError;

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Object metadata field usable as a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataField {
    /// `metadata.namespace` of the object.
    Namespace,
    /// `metadata.name` of the object.
    Name,
}

/// `fromMetadata` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FromMetadata {
    /// Metadata field to copy.
    pub field: MetadataField,
}

/// Serialized `assign` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignField {
    /// Literal value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    /// Value copied from object metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_metadata: Option<FromMetadata>,
    /// Value fetched from an external data provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_data: Option<ExternalData>,
}

impl AssignField {
    /// Creates a literal assignment.
    #[must_use]
    pub fn literal(value: JsonValue) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Creates a metadata-derived assignment.
    #[must_use]
    pub fn metadata(field: MetadataField) -> Self {
        Self {
            from_metadata: Some(FromMetadata {
                field,
            }),
            ..Self::default()
        }
    }

    /// Creates an external data assignment.
    #[must_use]
    pub fn external(external_data: ExternalData) -> Self {
        Self {
            external_data: Some(external_data),
            ..Self::default()
        }
    }

    /// Converts the block into a validated value source.
    pub(crate) fn into_source(self) -> Result<ValueSource, MutatorError> {
        match (self.value, self.from_metadata, self.external_data) {
            (Some(value), None, None) => Ok(ValueSource::Literal(Value::from(value))),
            (None, Some(from), None) => Ok(ValueSource::FromMetadata(from.field)),
            (None, None, Some(external)) => {
                if external.provider.trim().is_empty() {
                    return Err(MutatorError::ExternalData("provider must not be empty"));
                }
                let needs_default = external.failure_policy == FailurePolicy::UseDefault;
                if needs_default && external.default.is_none() {
                    return Err(MutatorError::ExternalData("UseDefault requires a default value"));
                }
                Ok(ValueSource::External(external))
            }
            _ => Err(MutatorError::ValueSource),
        }
    }
}

// ============================================================================
// SECTION: Value Source
// ============================================================================

/// Validated source of an assigned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Fixed value.
    Literal(Value),
    /// Copied from object metadata.
    FromMetadata(MetadataField),
    /// Resolved later through a provider.
    External(ExternalData),
}

impl ValueSource {
    /// Returns true for external data sources.
    #[must_use]
    pub const fn uses_external_data(&self) -> bool {
        matches!(self, Self::External(_))
    }

    /// Returns the external data declaration, if any.
    #[must_use]
    pub const fn external_data(&self) -> Option<&ExternalData> {
        match self {
            Self::External(external) => Some(external),
            Self::Literal(_) | Self::FromMetadata(_) => None,
        }
    }

    /// Computes the value to write given the current value at the location.
    ///
    /// Returns `None` when the write must be skipped: a value-at-location lookup
    /// with no scalar value present.
    pub(crate) fn resolve(
        &self,
        context: &MutationContext,
        existing: Option<&Value>,
    ) -> Option<Value> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::FromMetadata(MetadataField::Namespace) => {
                Some(Value::String(context.namespace.clone()))
            }
            Self::FromMetadata(MetadataField::Name) => Some(Value::String(context.name.clone())),
            Self::External(external) => {
                let key = match external.data_source {
                    DataSource::Username => context.username.clone(),
                    DataSource::ValueAtLocation => {
                        let existing = existing?;
                        if existing.as_placeholder().is_some() {
                            return Some(existing.clone());
                        }
                        existing.scalar_string()?
                    }
                };
                Some(Value::from(external.placeholder(key)))
            }
        }
    }
}

// ============================================================================
// SECTION: Mutation Context
// ============================================================================

/// Object identity and request context captured before a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MutationContext {
    /// Requesting username.
    pub(crate) username: String,
    /// Object name.
    pub(crate) name: String,
    /// Object namespace.
    pub(crate) namespace: String,
}

impl MutationContext {
    /// Captures the context of a mutable.
    pub(crate) fn capture(mutable: &Mutable) -> Self {
        Self {
            username: mutable.username.clone(),
            name: mutable.object.object_name().to_string(),
            namespace: mutable.object.object_namespace().to_string(),
        }
    }
}
