// crates/mutation-gate-core/src/core/path_test.rs
// ============================================================================
// Module: Path Tests
// Description: Existence pre-conditions on prefixes of a mutator location.
// Purpose: Gate individual writes on the presence or absence of sub-paths.
// Dependencies: crate::core::{document, path}, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`PathTest`] pairs a sub-path with a [`Condition`]. Sub-paths must be
//! prefixes of the mutator location so they can be checked while the
//! location is walked: the [`Tester`] answers, per depth, whether an existing
//! or missing node lets the walk continue. Because the answer is given per
//! concrete element, a glob fans out and each element is gated on its own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeStruct;
use thiserror::Error;

use crate::core::document::Value;
use crate::core::path::ListSelector;
use crate::core::path::Path;
use crate::core::path::PathError;
use crate::core::path::PathNode;
use crate::core::path::parse_prefix_path;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Path test configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathTestError {
    /// Sub-path failed to parse.
    #[error("invalid path test sub-path: {0}")]
    Path(#[from] PathError),
    /// Sub-path is not a prefix of the mutator location.
    #[error("path test sub-path `{sub_path}` is not a prefix of location `{location}`")]
    NotPrefix {
        /// Offending sub-path.
        sub_path: String,
        /// Mutator location.
        location: String,
    },
    /// Sub-path ends at an append step.
    #[error("path test sub-path `{0}` cannot address an append step")]
    AppendStep(String),
    /// The same sub-path carries two different conditions.
    #[error("path test sub-path `{0}` has contradicting conditions")]
    Contradiction(String),
    /// A shallower `MustNotExist` makes a deeper `MustExist` unsatisfiable.
    #[error("`MustNotExist` on `{absent}` contradicts `MustExist` on `{present}`")]
    Unsatisfiable {
        /// Shallower sub-path required to be absent.
        absent: String,
        /// Deeper sub-path required to be present.
        present: String,
    },
}

// ============================================================================
// SECTION: Path Test Model
// ============================================================================

/// Existence condition evaluated against a sub-path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// The sub-path must resolve to a value.
    MustExist,
    /// The sub-path must not resolve to a value.
    MustNotExist,
}

impl Condition {
    /// Returns true when the condition holds for the given presence.
    #[must_use]
    pub const fn holds(self, present: bool) -> bool {
        match self {
            Self::MustExist => present,
            Self::MustNotExist => !present,
        }
    }
}

/// Pre-condition attached to a mutator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathTest {
    /// Prefix of the mutator location; may end in a glob.
    pub sub_path: Path,
    /// Condition on the sub-path.
    pub condition: Condition,
}

impl PathTest {
    /// Parses a sub-path and pairs it with a condition.
    ///
    /// # Errors
    ///
    /// Returns [`PathTestError::Path`] when the sub-path is malformed.
    pub fn new(sub_path: &str, condition: Condition) -> Result<Self, PathTestError> {
        Ok(Self {
            sub_path: parse_prefix_path(sub_path)?,
            condition,
        })
    }

    /// Evaluates the condition directly against a document.
    ///
    /// A glob step is satisfied when any element satisfies the remainder.
    #[must_use]
    pub fn holds(&self, document: &Value) -> bool {
        self.condition.holds(path_exists(document, self.sub_path.nodes()))
    }
}

/// Serialized form of a path test.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPathTest {
    /// Sub-path expression.
    sub_path: String,
    /// Condition name.
    condition: Condition,
}

impl<'de> Deserialize<'de> for PathTest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawPathTest::deserialize(deserializer)?;
        Self::new(&raw.sub_path, raw.condition).map_err(serde::de::Error::custom)
    }
}

impl Serialize for PathTest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PathTest", 2)?;
        state.serialize_field("subPath", &self.sub_path.to_string())?;
        state.serialize_field("condition", &self.condition)?;
        state.end()
    }
}

// ============================================================================
// SECTION: Tester
// ============================================================================

/// Depth-indexed evaluator for a mutator's path tests.
///
/// # Invariants
/// - Conditions are keyed by node index (sub-path length minus one).
/// - At most one condition per depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tester {
    /// Conditions keyed by node index.
    conditions: BTreeMap<usize, Condition>,
}

impl Tester {
    /// Builds a tester, rejecting contradicting or unsatisfiable test sets.
    ///
    /// # Errors
    ///
    /// Returns [`PathTestError`] when two tests conflict.
    pub fn new(tests: &[PathTest]) -> Result<Self, PathTestError> {
        let mut conditions: BTreeMap<usize, (Condition, &PathTest)> = BTreeMap::new();
        for test in tests {
            let depth = test.sub_path.len().saturating_sub(1);
            if let Some((existing, _)) = conditions.get(&depth) {
                if *existing != test.condition {
                    return Err(PathTestError::Contradiction(test.sub_path.to_string()));
                }
                continue;
            }
            conditions.insert(depth, (test.condition, test));
        }
        let mut shallowest_absent: Option<&PathTest> = None;
        for (condition, test) in conditions.values() {
            match condition {
                Condition::MustNotExist => {
                    if shallowest_absent.is_none() {
                        shallowest_absent = Some(test);
                    }
                }
                Condition::MustExist => {
                    if let Some(absent) = shallowest_absent {
                        return Err(PathTestError::Unsatisfiable {
                            absent: absent.sub_path.to_string(),
                            present: test.sub_path.to_string(),
                        });
                    }
                }
            }
        }
        Ok(Self {
            conditions: conditions
                .into_iter()
                .map(|(depth, (condition, _))| (depth, condition))
                .collect(),
        })
    }

    /// Builds a tester and validates every sub-path against the location.
    ///
    /// # Errors
    ///
    /// Returns [`PathTestError`] when a test is invalid for the location.
    pub fn for_location(location: &Path, tests: &[PathTest]) -> Result<Self, PathTestError> {
        Self::validate(location, tests)?;
        Self::new(tests)
    }

    /// Rejects sub-paths that are not prefixes of the location.
    ///
    /// # Errors
    ///
    /// Returns [`PathTestError`] on the first invalid sub-path.
    pub fn validate(location: &Path, tests: &[PathTest]) -> Result<(), PathTestError> {
        for test in tests {
            if !test.sub_path.is_prefix_of(location) {
                return Err(PathTestError::NotPrefix {
                    sub_path: test.sub_path.to_string(),
                    location: location.to_string(),
                });
            }
            let ends_in_append = test
                .sub_path
                .last()
                .and_then(PathNode::as_list)
                .is_some_and(|step| step.selector == ListSelector::Append);
            if ends_in_append {
                return Err(PathTestError::AppendStep(test.sub_path.to_string()));
            }
        }
        Ok(())
    }

    /// Evaluates every condition whose depth lies within a concrete sub-path.
    ///
    /// The sub-path is expected to be glob-free; a glob step is satisfied by
    /// any element.
    #[must_use]
    pub fn evaluate(&self, document: &Value, concrete: &Path) -> bool {
        let nodes = concrete.nodes();
        self.conditions
            .range(.. nodes.len())
            .all(|(depth, condition)| condition.holds(path_exists(document, &nodes[..= *depth])))
    }

    /// Returns true when no tests are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns true when an existing node at `depth` lets the walk continue.
    #[must_use]
    pub fn exists_okay(&self, depth: usize) -> bool {
        self.conditions.get(&depth) != Some(&Condition::MustNotExist)
    }

    /// Returns true when a missing node at `depth` may be created.
    ///
    /// A `MustExist` on this node or any deeper node forbids creation.
    #[must_use]
    pub fn missing_okay(&self, depth: usize) -> bool {
        !self
            .conditions
            .range(depth ..)
            .any(|(_, condition)| *condition == Condition::MustExist)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves nodes against a document, returning whether a value is present.
pub(crate) fn path_exists(document: &Value, nodes: &[PathNode]) -> bool {
    let Some((first, rest)) = nodes.split_first() else {
        return true;
    };
    match first {
        PathNode::Object(step) => match document.get_field(&step.reference) {
            Some(child) => path_exists(child, rest),
            None => false,
        },
        PathNode::List(step) => {
            let Some(items) = document.as_list() else {
                return false;
            };
            match &step.selector {
                ListSelector::Glob => items.iter().any(|item| path_exists(item, rest)),
                ListSelector::Key(value) => items
                    .iter()
                    .filter(|item| {
                        item.get_field(&step.key_field).and_then(Value::scalar_string).as_deref()
                            == Some(value.as_str())
                    })
                    .any(|item| path_exists(item, rest)),
                ListSelector::Append => false,
            }
        }
    }
}
