// crates/mutation-gate-core/src/mutators/traversal.rs
// ============================================================================
// Module: Location Traversal
// Description: Recursive walk of a mutator location over a document.
// Purpose: Materialize missing containers, fan out over globs, gate on path tests.
// Dependencies: crate::core, crate::mutators
// ============================================================================

//! ## Overview
//! [`mutate`] walks a [`Path`] over a document, one node per depth:
//! - Object steps descend into the named field, creating an empty container
//!   shaped by the next node when the field is missing.
//! - List steps descend into every element (glob) or every element whose key
//!   matches; in exact mode a missing element is synthesized with its key set.
//! - The final node hands off to a [`Setter`], which owns the variant-specific write.
//!
//! The path tester is consulted at every depth before descending or writing.
//! Containers created on the way down are discarded again when nothing below
//! them was written, so a skipped write leaves the document untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::DocumentError;
use crate::core::ListSelector;
use crate::core::ListStep;
use crate::core::Path;
use crate::core::PathNode;
use crate::core::Tester;
use crate::core::Value;
use crate::core::path::render_nodes;
use crate::mutators::ApplyError;

// ============================================================================
// SECTION: Setter
// ============================================================================

/// Variant-specific terminal write.
pub(crate) trait Setter {
    /// Writes `field` of the parent map, returning whether the map changed.
    fn set_field(&self, map: &mut BTreeMap<String, Value>, field: &str) -> Result<bool, ApplyError>;

    /// Returns the element written at a terminal list step, if the variant has one.
    fn list_element(&self) -> Option<&Value>;
}

// ============================================================================
// SECTION: Traversal
// ============================================================================

/// Applies a setter at every location the path resolves to.
///
/// # Errors
///
/// Returns [`ApplyError`] when a container has the wrong shape or a list
/// element cannot be written.
pub(crate) fn mutate(
    path: &Path,
    tester: &Tester,
    setter: &dyn Setter,
    object: &mut Value,
) -> Result<bool, ApplyError> {
    let walker = Walker {
        nodes: path.nodes(),
        tester,
        setter,
    };
    walker.walk(object, 0)
}

/// Traversal state shared across recursion levels.
struct Walker<'a> {
    /// Location nodes.
    nodes: &'a [PathNode],
    /// Path-test evaluator.
    tester: &'a Tester,
    /// Terminal writer.
    setter: &'a dyn Setter,
}

impl Walker<'_> {
    /// Returns true when `depth` is the final node.
    const fn is_last(&self, depth: usize) -> bool {
        depth + 1 == self.nodes.len()
    }

    /// Renders the location up to and including `depth`.
    fn location(&self, depth: usize) -> String {
        render_nodes(&self.nodes[..= depth])
    }

    /// Builds a shape error for the node at `depth`.
    fn shape_error(&self, depth: usize, expected: &'static str, found: &'static str) -> ApplyError {
        ApplyError::Document(DocumentError::Shape {
            location: self.location(depth),
            expected,
            found,
        })
    }

    /// Walks the node at `depth` against `current`.
    fn walk(&self, current: &mut Value, depth: usize) -> Result<bool, ApplyError> {
        match &self.nodes[depth] {
            PathNode::Object(step) => self.walk_object(current, &step.reference, depth),
            PathNode::List(step) => {
                if self.is_last(depth) {
                    self.write_element(current, step, depth)
                } else {
                    self.walk_list(current, step, depth)
                }
            }
        }
    }

    /// Handles an object step.
    fn walk_object(
        &self,
        current: &mut Value,
        field: &str,
        depth: usize,
    ) -> Result<bool, ApplyError> {
        let found = current.type_name();
        let Some(map) = current.as_map_mut() else {
            return Err(self.shape_error(depth, "map", found));
        };
        let exists = map.contains_key(field);
        let allowed =
            if exists { self.tester.exists_okay(depth) } else { self.tester.missing_okay(depth) };
        if !allowed {
            return Ok(false);
        }
        if self.is_last(depth) {
            return self.setter.set_field(map, field);
        }
        let next = &self.nodes[depth + 1];
        let child = map.entry(field.to_string()).or_insert_with(|| empty_container(next));
        let changed = self.walk(child, depth + 1)?;
        if !exists && !changed {
            map.remove(field);
        }
        Ok(changed)
    }

    /// Handles a non-terminal list step.
    fn walk_list(
        &self,
        current: &mut Value,
        step: &ListStep,
        depth: usize,
    ) -> Result<bool, ApplyError> {
        let found = current.type_name();
        let Some(items) = current.as_list_mut() else {
            return Err(self.shape_error(depth, "list", found));
        };
        let mut changed = false;
        let mut matched = false;
        for item in items.iter_mut() {
            if !self.element_matches(item, step, depth)? {
                continue;
            }
            matched = true;
            if !self.tester.exists_okay(depth) {
                continue;
            }
            if self.walk(item, depth + 1)? {
                changed = true;
            }
        }
        let ListSelector::Key(key_value) = &step.selector else {
            return Ok(changed);
        };
        if matched || !self.tester.missing_okay(depth) {
            return Ok(changed);
        }
        let mut element = Value::map();
        element.set_field(step.key_field.clone(), Value::String(key_value.clone()))?;
        let element_changed = self.walk(&mut element, depth + 1)?;
        if element_changed {
            items.push(element);
        }
        Ok(element_changed)
    }

    /// Handles a terminal list step by replacing or appending a keyed element.
    fn write_element(
        &self,
        current: &mut Value,
        step: &ListStep,
        depth: usize,
    ) -> Result<bool, ApplyError> {
        let Some(element) = self.setter.list_element() else {
            return Err(ApplyError::NoListElement(self.location(depth)));
        };
        let Some(key) = element.get_field(&step.key_field).and_then(Value::scalar_string) else {
            return Err(ApplyError::MissingListKey {
                location: self.location(depth),
                key_field: step.key_field.clone(),
            });
        };
        if let ListSelector::Key(expected) = &step.selector
            && *expected != key
        {
            return Err(ApplyError::KeyMismatch {
                location: self.location(depth),
                key_field: step.key_field.clone(),
                expected: expected.clone(),
                found: key,
            });
        }
        let found = current.type_name();
        let Some(items) = current.as_list_mut() else {
            return Err(self.shape_error(depth, "list", found));
        };
        let mut position = None;
        for (index, item) in items.iter().enumerate() {
            if item_key(item, &step.key_field).as_deref() == Some(key.as_str()) {
                position = Some(index);
                break;
            }
        }
        match position {
            Some(index) => {
                if !self.tester.exists_okay(depth) || items[index] == *element {
                    return Ok(false);
                }
                items[index] = element.clone();
                Ok(true)
            }
            None => {
                if !self.tester.missing_okay(depth) {
                    return Ok(false);
                }
                items.push(element.clone());
                Ok(true)
            }
        }
    }

    /// Returns true when a list element is selected by the step.
    fn element_matches(
        &self,
        item: &Value,
        step: &ListStep,
        depth: usize,
    ) -> Result<bool, ApplyError> {
        if item.as_map().is_none() {
            return Err(self.shape_error(depth, "map element", item.type_name()));
        }
        Ok(match &step.selector {
            ListSelector::Glob => true,
            ListSelector::Key(value) => {
                item_key(item, &step.key_field).as_deref() == Some(value.as_str())
            }
            ListSelector::Append => false,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns an empty container shaped for the given next node.
fn empty_container(next: &PathNode) -> Value {
    match next {
        PathNode::Object(_) => Value::map(),
        PathNode::List(_) => Value::list(),
    }
}

/// Returns the scalar key of a list element.
fn item_key(item: &Value, key_field: &str) -> Option<String> {
    item.get_field(key_field).and_then(Value::scalar_string)
}
