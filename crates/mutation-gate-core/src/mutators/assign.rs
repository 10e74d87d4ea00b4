// crates/mutation-gate-core/src/mutators/assign.rs
// ============================================================================
// Module: Assign Mutator
// Description: Sets a value at a location inside bound object kinds.
// Purpose: Implement the general field-assignment mutator.
// Dependencies: crate::core, crate::mutators, serde
// ============================================================================

//! ## Overview
//! [`Assign`] overwrites the value at its location (or upserts a keyed list
//! element when the location ends in a list step). Metadata is off limits;
//! labels and annotations belong to
//! [`AssignMetadata`](crate::mutators::AssignMetadata).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::ApplyTo;
use crate::core::ExternalData;
use crate::core::MUTATIONS_GROUP;
use crate::core::Match;
use crate::core::Mutable;
use crate::core::MutatorId;
use crate::core::MutatorKind;
use crate::core::Path;
use crate::core::PathTest;
use crate::core::Tester;
use crate::core::Value;
use crate::core::matching::bindings_match;
use crate::core::matching::validate_bindings;
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

/// Serialized Assign mutator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDefinition {
    /// Mutator name.
    pub name: String,
    /// Mutator namespace (empty for cluster-scoped).
    #[serde(default)]
    pub namespace: String,
    /// Definition generation.
    #[serde(default)]
    pub generation: u64,
    /// Explicit kind bindings.
    pub apply_to: Vec<ApplyTo>,
    /// Object selection criteria.
    #[serde(default, rename = "match")]
    pub match_criteria: Match,
    /// Target location.
    pub location: String,
    /// Assignment parameters.
    pub parameters: AssignParameters,
}

/// Assign parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignParameters {
    /// Value source.
    pub assign: AssignField,
    /// Pre-conditions on prefixes of the location.
    #[serde(default)]
    pub path_tests: Vec<PathTest>,
}

// ============================================================================
// SECTION: Mutator
// ============================================================================

/// Validated Assign mutator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assign {
    /// Registry identity.
    id: MutatorId,
    /// Definition generation.
    generation: u64,
    /// Kind bindings.
    bindings: Vec<ApplyTo>,
    /// Selection criteria.
    criteria: Match,
    /// Target location.
    path: Path,
    /// Configured path tests.
    path_tests: Vec<PathTest>,
    /// Depth-indexed path test evaluator.
    tester: Tester,
    /// Value written at the location.
    source: ValueSource,
}

impl Assign {
    /// Validates a definition and builds the mutator.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError`] when the location, bindings, criteria, path
    /// tests, or value are invalid.
    pub fn new(definition: AssignDefinition) -> Result<Self, MutatorError> {
        let id = MutatorId::new(
            MUTATIONS_GROUP,
            MutatorKind::Assign.as_str(),
            definition.namespace,
            definition.name,
        );
        validation::check_name(&id)?;
        validate_bindings(&definition.apply_to)?;
        definition.match_criteria.validate()?;
        let path = parse_path(&definition.location)?;
        validation::check_not_metadata(&path)?;
        validation::check_key_fields(&path)?;
        let source = definition.parameters.assign.into_source()?;
        validation::check_list_terminal(&path, &source)?;
        let path_tests = definition.parameters.path_tests;
        let tester = Tester::for_location(&path, &path_tests)?;
        Ok(Self {
            id,
            generation: definition.generation,
            bindings: definition.apply_to,
            criteria: definition.match_criteria,
            path,
            path_tests,
            tester,
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

    /// Returns the target location.
    #[must_use]
    pub const fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the kind bindings.
    #[must_use]
    pub fn bindings(&self) -> &[ApplyTo] {
        &self.bindings
    }

    /// Returns the configured path tests.
    #[must_use]
    pub fn path_tests(&self) -> &[PathTest] {
        &self.path_tests
    }

    /// Returns the value source.
    #[must_use]
    pub const fn source(&self) -> &ValueSource {
        &self.source
    }

    /// Returns true when the object kind is bound and the criteria match.
    #[must_use]
    pub fn matches(&self, mutable: &Mutable) -> bool {
        bindings_match(&self.bindings, &mutable.object) && self.criteria.matches(mutable)
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

    /// Returns the value written where nothing exists yet.
    #[must_use]
    pub fn value(&self, mutable: &Mutable) -> Option<Value> {
        self.source.resolve(&MutationContext::capture(mutable), None)
    }

    /// Applies the assignment.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when the document shape prevents the write.
    pub fn mutate(&self, mutable: &mut Mutable) -> Result<bool, ApplyError> {
        let setter = AssignSetter {
            source: &self.source,
            context: MutationContext::capture(mutable),
        };
        traversal::mutate(&self.path, &self.tester, &setter, &mut mutable.object)
    }
}

// ============================================================================
// SECTION: Setter
// ============================================================================

/// Terminal writer that overwrites the field value.
struct AssignSetter<'a> {
    /// Value source.
    source: &'a ValueSource,
    /// Captured request context.
    context: MutationContext,
}

impl Setter for AssignSetter<'_> {
    fn set_field(
        &self,
        map: &mut BTreeMap<String, Value>,
        field: &str,
    ) -> Result<bool, ApplyError> {
        let existing = map.get(field);
        let Some(value) = self.source.resolve(&self.context, existing) else {
            return Ok(false);
        };
        if existing == Some(&value) {
            return Ok(false);
        }
        map.insert(field.to_string(), value);
        Ok(true)
    }

    fn list_element(&self) -> Option<&Value> {
        match self.source {
            ValueSource::Literal(value) => Some(value),
            ValueSource::FromMetadata(_) | ValueSource::External(_) => None,
        }
    }
}
