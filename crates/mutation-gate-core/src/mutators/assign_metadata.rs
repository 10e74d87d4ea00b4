// crates/mutation-gate-core/src/mutators/assign_metadata.rs
// ============================================================================
// Module: AssignMetadata Mutator
// Description: Adds labels and annotations that are not already present.
// Purpose: Implement metadata synthesis without ever overwriting.
// Dependencies: crate::core, crate::mutators, serde
// ============================================================================

//! ## Overview
//! [`AssignMetadata`] writes one string under `metadata.labels` or
//! `metadata.annotations`. An existing entry is never touched. It has no
//! kind bindings and takes no part in schema conflict detection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::DataSource;
use crate::core::ExternalData;
use crate::core::MUTATIONS_GROUP;
use crate::core::Match;
use crate::core::Mutable;
use crate::core::MutatorId;
use crate::core::MutatorKind;
use crate::core::Path;
use crate::core::Tester;
use crate::core::Value;
use crate::core::parse_path;
use crate::mutators::ApplyError;
use crate::mutators::AssignField;
use crate::mutators::MutatorError;
use crate::mutators::ValueSource;
use crate::mutators::assign_field::MutationContext;
use crate::mutators::traversal;
use crate::mutators::traversal::Setter;
use crate::mutators::validation;

// ============================================================================
// SECTION: Definition
// ============================================================================

/// AssignMetadata parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignMetadataParameters {
    /// Value source.
    pub assign: AssignField,
}

/// Serialized AssignMetadata mutator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignMetadataDefinition {
    /// Mutator name.
    pub name: String,
    /// Mutator namespace (empty for cluster-scoped).
    #[serde(default)]
    pub namespace: String,
    /// Definition generation.
    #[serde(default)]
    pub generation: u64,
    /// Object selection criteria.
    #[serde(default, rename = "match")]
    pub match_criteria: Match,
    /// `metadata.labels.<key>` or `metadata.annotations.<key>`.
    pub location: String,
    /// Assignment parameters.
    pub parameters: AssignMetadataParameters,
}

// ============================================================================
// SECTION: Mutator
// ============================================================================

/// Validated AssignMetadata mutator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignMetadata {
    /// Registry identity.
    id: MutatorId,
    /// Definition generation.
    generation: u64,
    /// Selection criteria.
    criteria: Match,
    /// Label or annotation location.
    path: Path,
    /// Empty tester; metadata writes have no path tests.
    tester: Tester,
    /// Value written when the entry is absent.
    source: ValueSource,
}

impl AssignMetadata {
    /// Validates a definition and builds the mutator.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError`] when the location is not a label or annotation,
    /// the value is not a string, or the criteria are invalid.
    pub fn new(definition: AssignMetadataDefinition) -> Result<Self, MutatorError> {
        let id = MutatorId::new(
            MUTATIONS_GROUP,
            MutatorKind::AssignMetadata.as_str(),
            definition.namespace,
            definition.name,
        );
        validation::check_name(&id)?;
        definition.match_criteria.validate()?;
        let path = parse_path(&definition.location)?;
        validation::check_metadata_location(&path)?;
        let source = definition.parameters.assign.into_source()?;
        match &source {
            ValueSource::Literal(value) if value.as_str().is_none() => {
                return Err(MutatorError::MetadataValue(value.type_name()));
            }
            ValueSource::External(external)
                if external.data_source == DataSource::ValueAtLocation =>
            {
                return Err(MutatorError::ExternalData(
                    "metadata values never overwrite, so ValueAtLocation has no key",
                ));
            }
            _ => {}
        }
        Ok(Self {
            id,
            generation: definition.generation,
            criteria: definition.match_criteria,
            path,
            tester: Tester::default(),
            source,
        })
    }

    /// Returns the registry identity.
    #[must_use]
    pub const fn id(&self) -> &MutatorId {
        &self.id
    }

    /// Returns the definition generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the label or annotation location.
    #[must_use]
    pub const fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the value source.
    #[must_use]
    pub const fn source(&self) -> &ValueSource {
        &self.source
    }

    /// Returns true when the criteria match.
    #[must_use]
    pub fn matches(&self, mutable: &Mutable) -> bool {
        self.criteria.matches(mutable)
    }

    /// Returns true when the value comes from an external data provider.
    #[must_use]
    pub const fn uses_external_data(&self) -> bool {
        self.source.uses_external_data()
    }

    /// Returns the external data declaration, if any.
    #[must_use]
    pub const fn external_data(&self) -> Option<&ExternalData> {
        self.source.external_data()
    }

    /// Returns the value written when the entry is absent.
    #[must_use]
    pub fn value(&self, mutable: &Mutable) -> Option<Value> {
        self.source.resolve(&MutationContext::capture(mutable), None)
    }

    /// Adds the entry when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when `metadata` or the target map is not a map.
    pub fn mutate(&self, mutable: &mut Mutable) -> Result<bool, ApplyError> {
        let setter = MetadataSetter {
            source: &self.source,
            context: MutationContext::capture(mutable),
        };
        traversal::mutate(&self.path, &self.tester, &setter, &mut mutable.object)
    }
}

// ============================================================================
// SECTION: Setter
// ============================================================================

/// Terminal writer that only fills absent entries.
struct MetadataSetter<'a> {
    /// Value source.
    source: &'a ValueSource,
    /// Captured request context.
    context: MutationContext,
}

impl Setter for MetadataSetter<'_> {
    fn set_field(
        &self,
        map: &mut BTreeMap<String, Value>,
        field: &str,
    ) -> Result<bool, ApplyError> {
        if map.contains_key(field) {
            return Ok(false);
        }
        let Some(value) = self.source.resolve(&self.context, None) else {
            return Ok(false);
        };
        map.insert(field.to_string(), value);
        Ok(true)
    }

    fn list_element(&self) -> Option<&Value> {
        None
    }
}
