// crates/mutation-gate-core/src/runtime/schema.rs
// ============================================================================
// Module: Schema Conflict Database
// Description: Tracks the document shape each mutator implies per kind.
// Purpose: Detect mutators that disagree on container types at shared paths.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Every path-based mutator implies a shape for each kind it is bound to:
//! the field before an object step is a map, the field before a list step is
//! a list keyed by that step's key field, and a terminal field is a plain set
//! for set mutators and a leaf for every other mutator. Two mutators conflict
//! when they imply different shapes at the same position of an overlapping
//! group/version/kind.
//!
//! Only the incoming mutator is marked conflicting. Its shape is retained but
//! left out of the effective schema, so it never blocks others. When any
//! registration is removed or replaced, conflicting mutators are re-checked in
//! registration order and rejoin the schema once they fit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::ApplyTo;
use crate::core::GroupVersionKind;
use crate::core::MutatorId;
use crate::core::Path;
use crate::core::PathNode;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The mutator implies a shape that contradicts registered mutators.
    #[error("mutator {id} has a conflicting schema with {}", join_ids(.conflicts))]
    ConflictingSchema {
        /// Incoming mutator, retained but excluded from application.
        id: MutatorId,
        /// Registered mutators whose shape it contradicts.
        conflicts: Vec<MutatorId>,
    },
}

/// Renders ids as a comma-separated list.
fn join_ids(ids: &[MutatorId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Shape Model
// ============================================================================

/// Step of a schema position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    /// Named map field.
    Field(String),
    /// Any element of the enclosing list.
    Element,
}

/// Container type implied at a position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeType {
    /// String-keyed map.
    Object,
    /// List keyed by the named field.
    List {
        /// Element key field.
        key_field: String,
    },
    /// List of scalar members.
    Set,
    /// Whole value overwritten by a terminal write; never descended into.
    Leaf,
}

/// One implied shape fact.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SchemaEntry {
    /// Bound kind.
    gvk: GroupVersionKind,
    /// Position within the document.
    position: Vec<Segment>,
    /// Implied container type.
    node: NodeType,
}

/// Stored registration.
#[derive(Debug, Clone)]
struct Registration {
    /// Registration order; later upserts get larger values.
    seq: u64,
    /// Implied shape facts.
    entries: Vec<SchemaEntry>,
    /// True when excluded from the effective schema.
    conflicting: bool,
}

/// Derives the shape facts a location implies, without kinds.
fn path_shape(path: &Path, must_terminate: bool) -> Vec<(Vec<Segment>, NodeType)> {
    let nodes = path.nodes();
    let mut position = Vec::with_capacity(nodes.len());
    let mut shape = Vec::new();
    for (index, node) in nodes.iter().enumerate() {
        position.push(match node {
            PathNode::Object(step) => Segment::Field(step.reference.clone()),
            PathNode::List(_) => Segment::Element,
        });
        let implied = match (node, nodes.get(index + 1)) {
            (_, Some(PathNode::Object(_))) | (PathNode::List(_), None) => NodeType::Object,
            (_, Some(PathNode::List(step))) => NodeType::List {
                key_field: step.key_field.clone(),
            },
            (PathNode::Object(_), None) if must_terminate => NodeType::Set,
            (PathNode::Object(_), None) => NodeType::Leaf,
        };
        shape.push((position.clone(), implied));
    }
    shape
}

// ============================================================================
// SECTION: Database
// ============================================================================

/// Per-kind registry of implied shapes.
///
/// # Invariants
/// - The effective schema holds exactly the entries of non-conflicting registrations.
/// - No two effective entries at the same kind and position disagree.
#[derive(Debug, Clone, Default)]
pub struct SchemaDb {
    /// Registrations by mutator.
    registrations: BTreeMap<MutatorId, Registration>,
    /// Effective schema keyed by kind and position.
    nodes: BTreeMap<(GroupVersionKind, Vec<Segment>), BTreeMap<MutatorId, NodeType>>,
    /// Next registration sequence number.
    next_seq: u64,
}

impl SchemaDb {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a mutator's implied shape.
    ///
    /// On conflict the registration is kept but excluded from application
    /// until the contradicting mutators are removed.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::ConflictingSchema`] when the shape contradicts
    /// the effective schema.
    pub fn upsert(
        &mut self,
        id: &MutatorId,
        bindings: &[ApplyTo],
        path: &Path,
        must_terminate: bool,
    ) -> Result<(), SchemaError> {
        let shape = path_shape(path, must_terminate);
        let mut entries = Vec::new();
        for binding in bindings {
            for gvk in binding.group_version_kinds() {
                for (position, node) in &shape {
                    entries.push(SchemaEntry {
                        gvk: gvk.clone(),
                        position: position.clone(),
                        node: node.clone(),
                    });
                }
            }
        }
        self.remove_contribution(id);
        let conflicts = self.conflicts_for(id, &entries);
        let conflicting = !conflicts.is_empty();
        if !conflicting {
            self.add_nodes(id, &entries);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.registrations.insert(
            id.clone(),
            Registration {
                seq,
                entries,
                conflicting,
            },
        );
        self.recheck();
        if conflicting {
            return Err(SchemaError::ConflictingSchema {
                id: id.clone(),
                conflicts,
            });
        }
        Ok(())
    }

    /// Drops a mutator's shape; returns false when it was not registered.
    pub fn remove(&mut self, id: &MutatorId) -> bool {
        let removed = self.remove_contribution(id);
        if removed {
            self.recheck();
        }
        removed
    }

    /// Returns true when the mutator is excluded because of a conflict.
    #[must_use]
    pub fn has_conflicts(&self, id: &MutatorId) -> bool {
        self.registrations.get(id).is_some_and(|registration| registration.conflicting)
    }

    /// Returns true when the mutator is registered.
    #[must_use]
    pub fn contains(&self, id: &MutatorId) -> bool {
        self.registrations.contains_key(id)
    }

    /// Returns the ids of every conflicting mutator.
    #[must_use]
    pub fn conflicting_ids(&self) -> Vec<MutatorId> {
        self.registrations
            .iter()
            .filter(|(_, registration)| registration.conflicting)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Returns the registered ids.
    #[must_use]
    pub fn ids(&self) -> Vec<MutatorId> {
        self.registrations.keys().cloned().collect()
    }

    /// Removes a registration and its effective entries.
    fn remove_contribution(&mut self, id: &MutatorId) -> bool {
        let Some(registration) = self.registrations.remove(id) else {
            return false;
        };
        if !registration.conflicting {
            for entry in &registration.entries {
                let key = (entry.gvk.clone(), entry.position.clone());
                if let Some(owners) = self.nodes.get_mut(&key) {
                    owners.remove(id);
                    if owners.is_empty() {
                        self.nodes.remove(&key);
                    }
                }
            }
        }
        true
    }

    /// Returns the sorted ids whose effective entries contradict `entries`.
    fn conflicts_for(&self, id: &MutatorId, entries: &[SchemaEntry]) -> Vec<MutatorId> {
        let mut conflicts: Vec<MutatorId> = Vec::new();
        for entry in entries {
            let key = (entry.gvk.clone(), entry.position.clone());
            let Some(owners) = self.nodes.get(&key) else {
                continue;
            };
            for (owner, node) in owners {
                if owner != id && *node != entry.node && !conflicts.contains(owner) {
                    conflicts.push(owner.clone());
                }
            }
        }
        conflicts.sort();
        conflicts
    }

    /// Adds entries to the effective schema.
    fn add_nodes(&mut self, id: &MutatorId, entries: &[SchemaEntry]) {
        for entry in entries {
            self.nodes
                .entry((entry.gvk.clone(), entry.position.clone()))
                .or_default()
                .insert(id.clone(), entry.node.clone());
        }
    }

    /// Re-admits conflicting registrations that now fit, in registration order.
    fn recheck(&mut self) {
        let mut pending: Vec<(u64, MutatorId)> = self
            .registrations
            .iter()
            .filter(|(_, registration)| registration.conflicting)
            .map(|(id, registration)| (registration.seq, id.clone()))
            .collect();
        pending.sort();
        for (_, id) in pending {
            let Some(entries) = self.registrations.get(&id).map(|r| r.entries.clone()) else {
                continue;
            };
            if !self.conflicts_for(&id, &entries).is_empty() {
                continue;
            }
            self.add_nodes(&id, &entries);
            if let Some(registration) = self.registrations.get_mut(&id) {
                registration.conflicting = false;
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
