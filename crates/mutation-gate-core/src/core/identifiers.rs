// crates/mutation-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Mutation Gate Identifiers
// Description: Canonical identifiers for mutators, object kinds, and requests.
// Purpose: Provide strongly typed, totally ordered IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the identifiers used throughout Mutation Gate. A
//! [`MutatorId`] is the registry key for a configured mutator and defines the
//! deterministic application order: fields compare lexicographically in
//! declaration order (group, kind, namespace, name).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Mutator Kind
// ============================================================================

/// API group that owns the built-in mutator kinds.
pub const MUTATIONS_GROUP: &str = "mutations.mutation-gate.dev";

/// Mutator variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MutatorKind {
    /// Sets a value at a path.
    Assign,
    /// Adds or removes members of a set-valued list.
    ModifySet,
    /// Synthesizes labels or annotations.
    AssignMetadata,
}

impl MutatorKind {
    /// Returns the stable kind label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "Assign",
            Self::ModifySet => "ModifySet",
            Self::AssignMetadata => "AssignMetadata",
        }
    }
}

impl fmt::Display for MutatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Mutator Identifier
// ============================================================================

/// Globally unique identity of one configured mutator.
///
/// # Invariants
/// - Ordering is lexicographic over (group, kind, namespace, name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MutatorId {
    /// API group of the mutator resource.
    pub group: String,
    /// Kind of the mutator resource.
    pub kind: String,
    /// Namespace of the mutator resource (empty for cluster-scoped).
    #[serde(default)]
    pub namespace: String,
    /// Name of the mutator resource.
    pub name: String,
}

impl MutatorId {
    /// Creates a new mutator identifier.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Creates a cluster-scoped identifier for a built-in mutator kind.
    #[must_use]
    pub fn for_kind(kind: MutatorKind, name: impl Into<String>) -> Self {
        Self::new(MUTATIONS_GROUP, kind.as_str(), "", name)
    }
}

impl fmt::Display for MutatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.group, self.kind, self.namespace, self.name)
    }
}

// ============================================================================
// SECTION: Group Version Kind
// ============================================================================

/// Group, version, and kind of a resource object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// API group (empty for the core group).
    pub group: String,
    /// API version.
    pub version: String,
    /// Resource kind.
    pub kind: String,
}

impl GroupVersionKind {
    /// Creates a new group/version/kind triple.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Splits an `apiVersion` string (`group/version` or `version`) and pairs it with a kind.
    #[must_use]
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}, Kind={}", self.version, self.kind)
        } else {
            write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
        }
    }
}

// ============================================================================
// SECTION: Mutation Correlation Identifier
// ============================================================================

/// Per-`mutate` correlation identifier used for log lines and annotations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(String);

impl MutationId {
    /// Creates a new correlation identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MutationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MutationId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
