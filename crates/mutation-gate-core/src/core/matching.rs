// crates/mutation-gate-core/src/core/matching.rs
// ============================================================================
// Module: Match Criteria
// Description: Object selection predicates and explicit schema bindings.
// Purpose: Decide which admitted objects a mutator applies to.
// Dependencies: crate::core::{document, identifiers, mutable}, serde, thiserror
// ============================================================================

//! ## Overview
//! [`Match`] selects objects by kind, scope, namespace, name, labels, and
//! source. [`ApplyTo`] is the explicit group/version/kind binding list that
//! path-based mutators must declare; unlike [`Match`] it never expands
//! wildcards, which makes it the unit the schema conflict database indexes.
//!
//! Namespace criteria do not apply to cluster-scoped objects, and a
//! `Namespace` object is treated as living in itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::document::Value;
use crate::core::identifiers::GroupVersionKind;
use crate::core::mutable::Mutable;
use crate::core::mutable::SourceType;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Match and binding configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// A name or namespace pattern is malformed.
    #[error("invalid pattern `{0}`: `*` is only allowed as a prefix or suffix")]
    InvalidPattern(String),
    /// A label selector requirement is malformed.
    #[error("invalid label selector on key `{key}`: {reason}")]
    InvalidSelector {
        /// Requirement key.
        key: String,
        /// Failure description.
        reason: &'static str,
    },
    /// An apply-to binding has an empty list.
    #[error("applyTo entry must list at least one of {0}")]
    EmptyBinding(&'static str),
    /// An apply-to binding used a wildcard.
    #[error("applyTo {field} must be explicit, found `{value}`")]
    WildcardBinding {
        /// Binding field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// No apply-to bindings were declared.
    #[error("applyTo must declare at least one binding")]
    MissingBindings,
}

// ============================================================================
// SECTION: Selectors
// ============================================================================

/// Scope filter for matched objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Both cluster-scoped and namespaced objects.
    #[default]
    #[serde(rename = "*")]
    All,
    /// Cluster-scoped objects only.
    Cluster,
    /// Namespaced objects only.
    Namespaced,
}

/// Source filter for matched objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Any source.
    #[default]
    All,
    /// Only objects submitted by the requester.
    Original,
    /// Only generated objects.
    Generated,
}

/// Kind selector with optional wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindSelector {
    /// API groups; empty or `*` matches any group.
    #[serde(default)]
    pub api_groups: Vec<String>,
    /// Kinds; empty or `*` matches any kind.
    #[serde(default)]
    pub kinds: Vec<String>,
}

impl KindSelector {
    /// Returns true when the selector covers the kind.
    #[must_use]
    pub fn matches(&self, gvk: &GroupVersionKind) -> bool {
        list_matches(&self.api_groups, &gvk.group) && list_matches(&self.kinds, &gvk.kind)
    }
}

/// Label selector operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorOperator {
    /// Label value is one of the listed values.
    In,
    /// Label is absent or its value is not listed.
    NotIn,
    /// Label key is present.
    Exists,
    /// Label key is absent.
    DoesNotExist,
}

/// Single label selector expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    /// Label key.
    pub key: String,
    /// Operator.
    pub operator: SelectorOperator,
    /// Operand values.
    #[serde(default)]
    pub values: Vec<String>,
}

/// Label selector combining exact labels and expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Labels that must be present with exactly these values.
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
    /// Expressions that must all hold.
    #[serde(default)]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    /// Returns true when the labels satisfy every requirement.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let labels_ok = self
            .match_labels
            .iter()
            .all(|(key, value)| labels.get(key).is_some_and(|actual| actual == value));
        labels_ok
            && self.match_expressions.iter().all(|requirement| {
                let actual = labels.get(&requirement.key);
                match requirement.operator {
                    SelectorOperator::In => {
                        actual.is_some_and(|value| requirement.values.contains(value))
                    }
                    SelectorOperator::NotIn => {
                        actual.is_none_or(|value| !requirement.values.contains(value))
                    }
                    SelectorOperator::Exists => actual.is_some(),
                    SelectorOperator::DoesNotExist => actual.is_none(),
                }
            })
    }

    /// Validates operator/value combinations.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidSelector`] for malformed requirements.
    pub fn validate(&self) -> Result<(), MatchError> {
        for requirement in &self.match_expressions {
            let needs_values =
                matches!(requirement.operator, SelectorOperator::In | SelectorOperator::NotIn);
            if needs_values && requirement.values.is_empty() {
                return Err(MatchError::InvalidSelector {
                    key: requirement.key.clone(),
                    reason: "In and NotIn require values",
                });
            }
            if !needs_values && !requirement.values.is_empty() {
                return Err(MatchError::InvalidSelector {
                    key: requirement.key.clone(),
                    reason: "Exists and DoesNotExist take no values",
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Match
// ============================================================================

/// Object selection criteria; every configured criterion must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Kind selectors; empty matches every kind.
    #[serde(default)]
    pub kinds: Vec<KindSelector>,
    /// Scope filter.
    #[serde(default)]
    pub scope: Scope,
    /// Namespace patterns the object must be in.
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Namespace patterns the object must not be in.
    #[serde(default)]
    pub excluded_namespaces: Vec<String>,
    /// Selector over the object's labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
    /// Selector over the owning namespace's labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,
    /// Name pattern for the object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Source filter.
    #[serde(default)]
    pub source: Source,
}

impl Match {
    /// Validates patterns and selectors.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError`] for malformed patterns or selectors.
    pub fn validate(&self) -> Result<(), MatchError> {
        let patterns = self
            .namespaces
            .iter()
            .chain(self.excluded_namespaces.iter())
            .chain(self.name.iter());
        for pattern in patterns {
            validate_pattern(pattern)?;
        }
        for selector in self.label_selector.iter().chain(self.namespace_selector.iter()) {
            selector.validate()?;
        }
        Ok(())
    }

    /// Returns true when the criteria select the mutable's object.
    #[must_use]
    pub fn matches(&self, mutable: &Mutable) -> bool {
        let object = &mutable.object;
        let gvk = object.group_version_kind();
        if !self.kinds.is_empty() && !self.kinds.iter().any(|selector| selector.matches(&gvk)) {
            return false;
        }
        let is_namespace_object = gvk.group.is_empty() && gvk.kind == "Namespace";
        let namespace = if is_namespace_object {
            object.object_name()
        } else {
            object.object_namespace()
        };
        let cluster_scoped = object.object_namespace().is_empty();
        let scope_ok = match self.scope {
            Scope::All => true,
            Scope::Cluster => cluster_scoped,
            Scope::Namespaced => !cluster_scoped,
        };
        if !scope_ok || !self.source_matches(mutable.source) {
            return false;
        }
        let has_namespace = is_namespace_object || !cluster_scoped;
        if has_namespace {
            if !self.namespaces.is_empty()
                && !self.namespaces.iter().any(|pattern| wildcard_matches(pattern, namespace))
            {
                return false;
            }
            if self.excluded_namespaces.iter().any(|pattern| wildcard_matches(pattern, namespace))
            {
                return false;
            }
        }
        if let Some(pattern) = &self.name
            && !wildcard_matches(pattern, object.object_name())
        {
            return false;
        }
        if let Some(selector) = &self.label_selector
            && !selector.matches(&object.labels())
        {
            return false;
        }
        if let Some(selector) = &self.namespace_selector
            && has_namespace
        {
            let labels = if is_namespace_object {
                object.labels()
            } else {
                match &mutable.namespace {
                    Some(namespace) => namespace.labels(),
                    None => return false,
                }
            };
            if !selector.matches(&labels) {
                return false;
            }
        }
        true
    }

    /// Returns true when the source filter admits the object source.
    const fn source_matches(&self, source: SourceType) -> bool {
        match self.source {
            Source::All => true,
            Source::Original => matches!(source, SourceType::Original),
            Source::Generated => matches!(source, SourceType::Generated),
        }
    }
}

// ============================================================================
// SECTION: Apply-To Bindings
// ============================================================================

/// Explicit group/version/kind binding for a path-based mutator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplyTo {
    /// API groups (use `""` for the core group).
    #[serde(default)]
    pub groups: Vec<String>,
    /// API versions.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Kinds.
    #[serde(default)]
    pub kinds: Vec<String>,
}

impl ApplyTo {
    /// Creates a binding from explicit lists.
    #[must_use]
    pub fn new(groups: &[&str], versions: &[&str], kinds: &[&str]) -> Self {
        let owned = |items: &[&str]| items.iter().map(ToString::to_string).collect();
        Self {
            groups: owned(groups),
            versions: owned(versions),
            kinds: owned(kinds),
        }
    }

    /// Rejects empty or wildcard lists.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError`] when a list is empty or contains `*`.
    pub fn validate(&self) -> Result<(), MatchError> {
        for (field, values) in
            [("groups", &self.groups), ("versions", &self.versions), ("kinds", &self.kinds)]
        {
            if values.is_empty() {
                return Err(MatchError::EmptyBinding(field));
            }
            if let Some(value) = values.iter().find(|value| value.contains('*')) {
                return Err(MatchError::WildcardBinding {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns true when the binding covers the kind.
    #[must_use]
    pub fn matches(&self, gvk: &GroupVersionKind) -> bool {
        self.groups.contains(&gvk.group)
            && self.versions.contains(&gvk.version)
            && self.kinds.contains(&gvk.kind)
    }

    /// Expands the binding into every covered group/version/kind.
    #[must_use]
    pub fn group_version_kinds(&self) -> Vec<GroupVersionKind> {
        let mut out = Vec::new();
        for group in &self.groups {
            for version in &self.versions {
                for kind in &self.kinds {
                    out.push(GroupVersionKind::new(group, version, kind));
                }
            }
        }
        out
    }
}

/// Validates a binding list and returns an error when it is empty.
///
/// # Errors
///
/// Returns [`MatchError`] when no bindings are declared or one is invalid.
pub fn validate_bindings(bindings: &[ApplyTo]) -> Result<(), MatchError> {
    if bindings.is_empty() {
        return Err(MatchError::MissingBindings);
    }
    bindings.iter().try_for_each(ApplyTo::validate)
}

/// Returns true when any binding covers the object's kind.
#[must_use]
pub fn bindings_match(bindings: &[ApplyTo], object: &Value) -> bool {
    let gvk = object.group_version_kind();
    bindings.iter().any(|binding| binding.matches(&gvk))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when the list is empty, contains `*`, or contains the value.
fn list_matches(list: &[String], value: &str) -> bool {
    list.is_empty() || list.iter().any(|item| item == "*" || item == value)
}

/// Rejects patterns with an interior or doubled `*`.
fn validate_pattern(pattern: &str) -> Result<(), MatchError> {
    let stars = pattern.matches('*').count();
    let valid = match stars {
        0 => true,
        1 => pattern.starts_with('*') || pattern.ends_with('*'),
        _ => false,
    };
    if valid { Ok(()) } else { Err(MatchError::InvalidPattern(pattern.to_string())) }
}

/// Matches a value against an exact, `prefix*`, or `*suffix` pattern.
fn wildcard_matches(pattern: &str, value: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        return value.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return value.ends_with(suffix);
    }
    pattern == value
}
