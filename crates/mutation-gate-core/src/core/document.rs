// crates/mutation-gate-core/src/core/document.rs
// ============================================================================
// Module: Document Model
// Description: Owned tree of maps, lists, and scalars for admitted objects.
// Purpose: Give mutators typed get/set access with explicit shape errors.
// Dependencies: crate::core::{external_data, identifiers}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Admitted objects are held as an owned [`Value`] tree that mirrors their
//! serialized form. Besides the JSON value kinds the tree may carry
//! [`Placeholder`] nodes written by external-data mutators; such documents
//! cannot be converted back to JSON until every placeholder is resolved.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Number;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::core::external_data::Placeholder;
use crate::core::identifiers::GroupVersionKind;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Document access and conversion errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// A container had a different shape than the path required.
    #[error("expected {expected} at `{location}`, found {found}")]
    Shape {
        /// Dotted location of the offending node.
        location: String,
        /// Expected node type.
        expected: &'static str,
        /// Actual node type.
        found: &'static str,
    },
    /// A placeholder was still present when converting to JSON.
    #[error("unresolved external data placeholder at `{location}`")]
    UnresolvedPlaceholder {
        /// Dotted location of the placeholder.
        location: String,
    },
}

// ============================================================================
// SECTION: Value
// ============================================================================

/// Node of an admitted document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Value {
    /// JSON null.
    #[default]
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Numeric scalar.
    Number(Number),
    /// String scalar.
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// String-keyed map.
    Map(BTreeMap<String, Value>),
    /// Pending external data lookup.
    Placeholder(Box<Placeholder>),
}

impl Value {
    /// Returns an empty map node.
    #[must_use]
    pub const fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Returns an empty list node.
    #[must_use]
    pub const fn list() -> Self {
        Self::List(Vec::new())
    }

    /// Returns a short type label for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Placeholder(_) => "placeholder",
        }
    }

    /// Returns true for the null node.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the map contents when this node is a map.
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns mutable map contents when this node is a map.
    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Self>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the list contents when this node is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns mutable list contents when this node is a list.
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Self>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the string contents when this node is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the placeholder when this node is a placeholder.
    #[must_use]
    pub fn as_placeholder(&self) -> Option<&Placeholder> {
        match self {
            Self::Placeholder(placeholder) => Some(placeholder),
            _ => None,
        }
    }

    /// Returns a field of a map node.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&Self> {
        self.as_map().and_then(|map| map.get(name))
    }

    /// Follows a chain of map fields.
    #[must_use]
    pub fn get_path(&self, fields: &[&str]) -> Option<&Self> {
        fields.iter().try_fold(self, |node, field| node.get_field(field))
    }

    /// Sets a field on a map node, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Shape`] when this node is not a map.
    pub fn set_field(
        &mut self,
        name: impl Into<String>,
        value: Self,
    ) -> Result<Option<Self>, DocumentError> {
        let found = self.type_name();
        let Some(map) = self.as_map_mut() else {
            return Err(DocumentError::Shape {
                location: "<root>".to_string(),
                expected: "map",
                found,
            });
        };
        Ok(map.insert(name.into(), value))
    }

    /// Renders a scalar as a lookup key.
    #[must_use]
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            Self::String(value) => Some(value.clone()),
            Self::Number(number) => Some(number.to_string()),
            Self::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    /// Returns true when any placeholder is present in the tree.
    #[must_use]
    pub fn contains_placeholder(&self) -> bool {
        match self {
            Self::Placeholder(_) => true,
            Self::List(items) => items.iter().any(Self::contains_placeholder),
            Self::Map(map) => map.values().any(Self::contains_placeholder),
            _ => false,
        }
    }

    /// Converts the tree to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnresolvedPlaceholder`] when a placeholder remains.
    pub fn to_json(&self) -> Result<JsonValue, DocumentError> {
        to_json_at(self, &mut Vec::new())
    }

    // ------------------------------------------------------------------------
    // Object identity helpers
    // ------------------------------------------------------------------------

    /// Returns the group/version/kind declared by `apiVersion` and `kind`.
    #[must_use]
    pub fn group_version_kind(&self) -> GroupVersionKind {
        let api_version = self.get_field("apiVersion").and_then(Self::as_str).unwrap_or_default();
        let kind = self.get_field("kind").and_then(Self::as_str).unwrap_or_default();
        GroupVersionKind::from_api_version(api_version, kind)
    }

    /// Returns `metadata.name`, or an empty string.
    #[must_use]
    pub fn object_name(&self) -> &str {
        self.get_path(&["metadata", "name"]).and_then(Self::as_str).unwrap_or_default()
    }

    /// Returns `metadata.namespace`, or an empty string.
    #[must_use]
    pub fn object_namespace(&self) -> &str {
        self.get_path(&["metadata", "namespace"]).and_then(Self::as_str).unwrap_or_default()
    }

    /// Returns the string entries of `metadata.labels`.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        string_entries(self.get_path(&["metadata", "labels"]))
    }

    /// Returns the string entries of `metadata.annotations`.
    #[must_use]
    pub fn annotations(&self) -> BTreeMap<String, String> {
        string_entries(self.get_path(&["metadata", "annotations"]))
    }

    /// Sets `metadata.annotations.<key>`, creating containers as needed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Shape`] when `metadata` or `annotations` is not a map.
    pub fn set_annotation(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), DocumentError> {
        let metadata = child_map(self, "metadata", "metadata")?;
        let annotations = child_map(metadata, "annotations", "metadata.annotations")?;
        annotations.set_field(key, Self::String(value.into()))?;
        Ok(())
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(flag) => Self::Bool(flag),
            JsonValue::Number(number) => Self::Number(number),
            JsonValue::String(text) => Self::String(text),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(map) => {
                Self::Map(map.into_iter().map(|(key, value)| (key, Self::from(value))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Placeholder> for Value {
    fn from(value: Placeholder) -> Self {
        Self::Placeholder(Box::new(value))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the child map at `field`, inserting an empty map when absent.
fn child_map<'a>(
    node: &'a mut Value,
    field: &str,
    location: &str,
) -> Result<&'a mut Value, DocumentError> {
    let found = node.type_name();
    let Some(map) = node.as_map_mut() else {
        return Err(DocumentError::Shape {
            location: location.to_string(),
            expected: "map",
            found,
        });
    };
    let child = map.entry(field.to_string()).or_insert_with(Value::map);
    if child.is_null() {
        *child = Value::map();
    }
    if child.as_map().is_none() {
        return Err(DocumentError::Shape {
            location: location.to_string(),
            expected: "map",
            found: child.type_name(),
        });
    }
    Ok(child)
}

/// Collects the string-valued entries of an optional map node.
fn string_entries(node: Option<&Value>) -> BTreeMap<String, String> {
    node.and_then(Value::as_map)
        .map(|map| {
            map.iter()
                .filter_map(|(key, value)| {
                    value.as_str().map(|text| (key.clone(), text.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Converts a subtree to JSON while tracking the location for diagnostics.
fn to_json_at(value: &Value, location: &mut Vec<String>) -> Result<JsonValue, DocumentError> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(flag) => JsonValue::Bool(*flag),
        Value::Number(number) => JsonValue::Number(number.clone()),
        Value::String(text) => JsonValue::String(text.clone()),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                location.push(index.to_string());
                out.push(to_json_at(item, location)?);
                location.pop();
            }
            JsonValue::Array(out)
        }
        Value::Map(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map {
                location.push(key.clone());
                out.insert(key.clone(), to_json_at(item, location)?);
                location.pop();
            }
            JsonValue::Object(out)
        }
        Value::Placeholder(_) => {
            return Err(DocumentError::UnresolvedPlaceholder {
                location: location.join("."),
            });
        }
    })
}
