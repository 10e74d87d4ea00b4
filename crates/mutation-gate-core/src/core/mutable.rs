// crates/mutation-gate-core/src/core/mutable.rs
// ============================================================================
// Module: Mutable Context
// Description: Admission-time document plus its ambient request context.
// Purpose: Bundle everything a mutator may inspect or change for one object.
// Dependencies: crate::core::document, serde
// ============================================================================

//! ## Overview
//! A [`Mutable`] carries the object being admitted together with its owning
//! namespace object, the requesting username, and the source tag that scopes
//! which mutators apply.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::document::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Origin of the object under admission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// Object submitted by the requester.
    #[default]
    Original,
    /// Object generated from another resource (for example an expanded template).
    Generated,
}

/// Document under mutation with its ambient context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutable {
    /// Object being admitted; mutated in place.
    pub object: Value,
    /// Owning namespace object; `None` for cluster-scoped objects.
    pub namespace: Option<Value>,
    /// Requesting username.
    pub username: String,
    /// Source tag of the object.
    pub source: SourceType,
}

impl Mutable {
    /// Wraps an object with empty context.
    #[must_use]
    pub fn new(object: impl Into<Value>) -> Self {
        Self {
            object: object.into(),
            namespace: None,
            username: String::new(),
            source: SourceType::Original,
        }
    }

    /// Sets the owning namespace object.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<Value>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the requesting username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets the source tag.
    #[must_use]
    pub const fn with_source(mut self, source: SourceType) -> Self {
        self.source = source;
        self
    }
}
