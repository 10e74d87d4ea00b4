// crates/mutation-gate-core/src/mutators/modify_set.rs
// ============================================================================
// Module: ModifySet Mutator
// Description: Adds or removes members of a list treated as a set.
// Purpose: Implement merge and prune edits on set-valued fields.
// Dependencies: crate::core, crate::mutators, serde, serde_json
// ============================================================================

//! ## Overview
//! [`ModifySet`] edits the list stored at its location without regard to
//! element keys. `merge` appends every value not already present, in the
//! configured order; `prune` removes every member equal to a configured value.
//! A missing field is created by `merge` and ignored by `prune`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::core::ApplyTo;
use crate::core::DocumentError;
use crate::core::MUTATIONS_GROUP;
use crate::core::Match;
use crate::core::Mutable;
use crate::core::MutatorId;
use crate::core::MutatorKind;
use crate::core::Path;
use crate::core::PathNode;
use crate::core::PathTest;
use crate::core::Tester;
use crate::core::Value;
use crate::core::matching::bindings_match;
use crate::core::matching::validate_bindings;
use crate::core::parse_path;
use crate::mutators::ApplyError;
use crate::mutators::MutatorError;
use crate::mutators::traversal;
use crate::mutators::traversal::Setter;
use crate::mutators::validation;

// ============================================================================
// SECTION: Definition
// ============================================================================

/// Set edit operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetOperation {
    /// Append values not already present.
    #[default]
    Merge,
    /// Remove values that are present.
    Prune,
}

/// Values applied by the operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetValues {
    /// Values to merge or prune.
    #[serde(default)]
    pub from_list: Vec<JsonValue>,
}

/// ModifySet parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifySetParameters {
    /// Edit operation.
    #[serde(default)]
    pub operation: SetOperation,
    /// Values applied by the operation.
    pub values: SetValues,
    /// Pre-conditions on prefixes of the location.
    #[serde(default)]
    pub path_tests: Vec<PathTest>,
}

/// Serialized ModifySet mutator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifySetDefinition {
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
    /// Location of the set-valued field.
    pub location: String,
    /// Edit parameters.
    pub parameters: ModifySetParameters,
}

// ============================================================================
// SECTION: Mutator
// ============================================================================

/// Validated ModifySet mutator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifySet {
    /// Registry identity.
    id: MutatorId,
    /// Definition generation.
    generation: u64,
    /// Kind bindings.
    bindings: Vec<ApplyTo>,
    /// Selection criteria.
    criteria: Match,
    /// Location of the set-valued field.
    path: Path,
    /// Configured path tests.
    path_tests: Vec<PathTest>,
    /// Depth-indexed path test evaluator.
    tester: Tester,
    /// Edit operation.
    operation: SetOperation,
    /// Values applied by the operation, de-duplicated in order.
    values: Vec<Value>,
}

impl ModifySet {
    /// Validates a definition and builds the mutator.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError`] when the location, bindings, criteria, or path
    /// tests are invalid.
    pub fn new(definition: ModifySetDefinition) -> Result<Self, MutatorError> {
        let id = MutatorId::new(
            MUTATIONS_GROUP,
            MutatorKind::ModifySet.as_str(),
            definition.namespace,
            definition.name,
        );
        validation::check_name(&id)?;
        validate_bindings(&definition.apply_to)?;
        definition.match_criteria.validate()?;
        let path = parse_path(&definition.location)?;
        validation::check_not_metadata(&path)?;
        validation::check_key_fields(&path)?;
        if !matches!(path.last(), Some(PathNode::Object(_))) {
            return Err(MutatorError::SetTerminal(path.to_string()));
        }
        let path_tests = definition.parameters.path_tests;
        let tester = Tester::for_location(&path, &path_tests)?;
        let mut values: Vec<Value> = Vec::new();
        for value in definition.parameters.values.from_list {
            let value = Value::from(value);
            if !values.contains(&value) {
                values.push(value);
            }
        }
        Ok(Self {
            id,
            generation: definition.generation,
            bindings: definition.apply_to,
            criteria: definition.match_criteria,
            path,
            path_tests,
            tester,
            operation: definition.parameters.operation,
            values,
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

    /// Returns the set location.
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

    /// Returns the edit operation.
    #[must_use]
    pub const fn operation(&self) -> SetOperation {
        self.operation
    }

    /// Returns the configured values as a list node.
    #[must_use]
    pub fn value(&self) -> Value {
        Value::List(self.values.clone())
    }

    /// Returns true when the object kind is bound and the criteria match.
    #[must_use]
    pub fn matches(&self, mutable: &Mutable) -> bool {
        bindings_match(&self.bindings, &mutable.object) && self.criteria.matches(mutable)
    }

    /// Applies the set edit.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when the field or a container is not a list or map.
    pub fn mutate(&self, mutable: &mut Mutable) -> Result<bool, ApplyError> {
        let setter = SetSetter {
            mutator: self,
        };
        traversal::mutate(&self.path, &self.tester, &setter, &mut mutable.object)
    }
}

// ============================================================================
// SECTION: Setter
// ============================================================================

/// Terminal writer that merges into or prunes from a list.
struct SetSetter<'a> {
    /// Owning mutator.
    mutator: &'a ModifySet,
}

impl Setter for SetSetter<'_> {
    fn set_field(
        &self,
        map: &mut BTreeMap<String, Value>,
        field: &str,
    ) -> Result<bool, ApplyError> {
        let values = &self.mutator.values;
        let missing = map.get(field).is_none_or(Value::is_null);
        if missing {
            return Ok(match self.mutator.operation {
                SetOperation::Prune => false,
                SetOperation::Merge if values.is_empty() => false,
                SetOperation::Merge => {
                    map.insert(field.to_string(), Value::List(values.clone()));
                    true
                }
            });
        }
        let found = map.get(field).map_or("null", Value::type_name);
        let Some(items) = map.get_mut(field).and_then(Value::as_list_mut) else {
            return Err(ApplyError::Document(DocumentError::Shape {
                location: self.mutator.path.to_string(),
                expected: "list",
                found,
            }));
        };
        match self.mutator.operation {
            SetOperation::Merge => {
                let mut changed = false;
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                        changed = true;
                    }
                }
                Ok(changed)
            }
            SetOperation::Prune => {
                let before = items.len();
                items.retain(|item| !values.contains(item));
                Ok(items.len() != before)
            }
        }
    }

    fn list_element(&self) -> Option<&Value> {
        None
    }
}
