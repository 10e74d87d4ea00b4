// crates/mutation-gate-core/src/runtime/index.rs
// ============================================================================
// Module: Ordered Mutator Index
// Description: Sorted registry of mutators keyed by identity.
// Purpose: Provide deterministic application order with O(log n) lookup.
// Dependencies: crate::{core, mutators}
// ============================================================================

//! ## Overview
//! [`MutatorIndex`] is a single sorted vector of `(id, mutator)` pairs. Lookup
//! is a binary search; insertion and removal shift the tail. Keeping the ids
//! and mutators in one container means they cannot drift apart.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::MutatorId;
use crate::mutators::Mutator;

// ============================================================================
// SECTION: Index
// ============================================================================

/// Mutators sorted by identity.
///
/// # Invariants
/// - Entries are strictly increasing by [`MutatorId`].
/// - Each entry's id equals the id of its mutator.
#[derive(Debug, Clone, Default)]
pub struct MutatorIndex {
    /// Sorted entries.
    entries: Vec<(MutatorId, Arc<Mutator>)>,
}

impl MutatorIndex {
    /// Creates an empty index.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts or replaces a mutator, returning the previous entry.
    pub fn insert(&mut self, mutator: Arc<Mutator>) -> Option<Arc<Mutator>> {
        let id = mutator.id().clone();
        match self.search(&id) {
            Ok(position) => {
                Some(std::mem::replace(&mut self.entries[position].1, mutator))
            }
            Err(position) => {
                self.entries.insert(position, (id, mutator));
                None
            }
        }
    }

    /// Removes a mutator by id.
    pub fn remove(&mut self, id: &MutatorId) -> Option<Arc<Mutator>> {
        let position = self.search(id).ok()?;
        Some(self.entries.remove(position).1)
    }

    /// Returns the mutator registered under `id`.
    #[must_use]
    pub fn get(&self, id: &MutatorId) -> Option<&Arc<Mutator>> {
        let position = self.search(id).ok()?;
        Some(&self.entries[position].1)
    }

    /// Returns true when `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &MutatorId) -> bool {
        self.search(id).is_ok()
    }

    /// Returns the number of registered mutators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no mutators are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&MutatorId, &Arc<Mutator>)> {
        self.entries.iter().map(|(id, mutator)| (id, mutator))
    }

    /// Returns the ids in application order.
    #[must_use]
    pub fn ids(&self) -> Vec<MutatorId> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Binary-searches for `id`.
    fn search(&self, id: &MutatorId) -> Result<usize, usize> {
        self.entries.binary_search_by(|(entry, _)| entry.cmp(id))
    }
}
