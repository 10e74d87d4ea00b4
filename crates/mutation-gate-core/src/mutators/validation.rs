// crates/mutation-gate-core/src/mutators/validation.rs
// ============================================================================
// Module: Mutator Validation
// Description: Construction-time checks shared by the mutator variants.
// Purpose: Reject locations and values that could never be applied safely.
// Dependencies: crate::core, crate::mutators
// ============================================================================

//! ## Overview
//! Every check here runs before a mutator exists; a constructed mutator has
//! already passed all of them, so registration and application never see
//! a malformed location.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::ListSelector;
use crate::core::MutatorId;
use crate::core::Path;
use crate::core::PathNode;
use crate::core::Value;
use crate::mutators::MutatorError;
use crate::mutators::ValueSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Root field reserved for metadata mutators.
const METADATA_FIELD: &str = "metadata";

/// Metadata maps writable by metadata mutators.
const METADATA_MAPS: [&str; 2] = ["labels", "annotations"];

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Rejects an empty mutator name.
pub(crate) fn check_name(id: &MutatorId) -> Result<(), MutatorError> {
    if id.name.trim().is_empty() {
        return Err(MutatorError::EmptyName);
    }
    Ok(())
}

/// Rejects locations rooted at `metadata` for field-assignment mutators.
pub(crate) fn check_not_metadata(path: &Path) -> Result<(), MutatorError> {
    if path.starts_with_field(METADATA_FIELD) {
        return Err(MutatorError::MetadataRoot(path.to_string()));
    }
    Ok(())
}

/// Requires a location of the form `metadata.(labels|annotations).<key>`.
pub(crate) fn check_metadata_location(path: &Path) -> Result<(), MutatorError> {
    let fields: Vec<&str> = path
        .nodes()
        .iter()
        .filter_map(PathNode::as_object)
        .map(|step| step.reference.as_str())
        .collect();
    let valid = fields.len() == path.len()
        && fields.len() == 3
        && fields[0] == METADATA_FIELD
        && METADATA_MAPS.contains(&fields[1]);
    if !valid {
        return Err(MutatorError::MetadataLocation(path.to_string()));
    }
    Ok(())
}

/// Rejects an object step that names the key field of the list step before it.
pub(crate) fn check_key_fields(path: &Path) -> Result<(), MutatorError> {
    for pair in path.nodes().windows(2) {
        if let (PathNode::List(list), PathNode::Object(object)) = (&pair[0], &pair[1])
            && list.key_field == object.reference
        {
            return Err(MutatorError::KeyFieldMutation {
                location: path.to_string(),
                key_field: list.key_field.clone(),
            });
        }
    }
    Ok(())
}

/// Validates the value written at a terminal list step.
///
/// The value must be a literal map whose key field is a scalar; an exact
/// selector must name the same key.
pub(crate) fn check_list_terminal(path: &Path, source: &ValueSource) -> Result<(), MutatorError> {
    let Some(step) = path.last().and_then(PathNode::as_list) else {
        return Ok(());
    };
    let location = path.to_string();
    let list_error = |reason: String| MutatorError::ListValue {
        location: location.clone(),
        reason,
    };
    let value = match source {
        ValueSource::Literal(value) => value,
        ValueSource::External(_) => {
            return Err(MutatorError::ExternalData(
                "external data cannot be written at a list element position",
            ));
        }
        ValueSource::FromMetadata(_) => {
            return Err(list_error("fromMetadata yields a string, not an object".to_string()));
        }
    };
    if value.as_map().is_none() {
        return Err(list_error(format!("expected an object, found {}", value.type_name())));
    }
    let Some(key) = value.get_field(&step.key_field).and_then(Value::scalar_string) else {
        return Err(list_error(format!("missing scalar key field `{}`", step.key_field)));
    };
    if let ListSelector::Key(expected) = &step.selector
        && *expected != key
    {
        return Err(list_error(format!(
            "key field `{}` is `{key}` but the location selects `{expected}`",
            step.key_field
        )));
    }
    Ok(())
}
