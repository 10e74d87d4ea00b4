// crates/mutation-gate-core/src/runtime/schema/tests.rs
// ============================================================================
// Module: Schema Conflict Database Tests
// Description: Unit tests for conflict detection and re-admission.
// Purpose: Validate exclude-on-conflict and registration-order recheck.
// Dependencies: mutation-gate-core
// ============================================================================

//! ## Overview
//! Exercises shape derivation through public upserts and removals.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use super::SchemaDb;
use super::SchemaError;
use crate::core::ApplyTo;
use crate::core::MutatorId;
use crate::core::MutatorKind;
use crate::core::Path;
use crate::core::parse_path;

fn pods() -> Vec<ApplyTo> {
    vec![ApplyTo::new(&[""], &["v1"], &["Pod"])]
}

fn deployments() -> Vec<ApplyTo> {
    vec![ApplyTo::new(&["apps"], &["v1"], &["Deployment"])]
}

fn id(name: &str) -> MutatorId {
    MutatorId::for_kind(MutatorKind::Assign, name)
}

fn path(location: &str) -> Path {
    parse_path(location).unwrap()
}

#[test]
fn compatible_paths_share_the_schema() {
    let mut db = SchemaDb::new();
    db.upsert(&id("a"), &pods(), &path("spec.containers[name: foo].image"), false).unwrap();
    db.upsert(&id("b"), &pods(), &path("spec.containers[name: *].imagePullPolicy"), false)
        .unwrap();
    db.upsert(&id("c"), &pods(), &path("spec.priority"), false).unwrap();
    assert!(db.conflicting_ids().is_empty());
}

#[test]
fn keyed_list_against_object_conflicts() {
    let mut db = SchemaDb::new();
    db.upsert(&id("a"), &pods(), &path("spec.containers[name: foo].image"), false).unwrap();
    let err = db.upsert(&id("b"), &pods(), &path("spec.containers.image"), false).unwrap_err();
    assert_eq!(
        err,
        SchemaError::ConflictingSchema {
            id: id("b"),
            conflicts: vec![id("a")],
        }
    );
    assert!(db.has_conflicts(&id("b")));
    assert!(!db.has_conflicts(&id("a")));
    assert!(db.contains(&id("b")));
}

#[test]
fn different_key_fields_conflict() {
    let mut db = SchemaDb::new();
    db.upsert(&id("a"), &pods(), &path("spec.containers[name: foo].image"), false).unwrap();
    let result = db.upsert(&id("b"), &pods(), &path("spec.containers[image: bar].name"), false);
    assert!(result.is_err());
}

#[test]
fn disjoint_kinds_do_not_conflict() {
    let mut db = SchemaDb::new();
    db.upsert(&id("a"), &pods(), &path("spec.containers[name: foo].image"), false).unwrap();
    db.upsert(&id("b"), &deployments(), &path("spec.containers.image"), false).unwrap();
    assert!(db.conflicting_ids().is_empty());
}

#[test]
fn assign_terminal_conflicts_with_keyed_list() {
    let mut db = SchemaDb::new();
    let list = path("spec.containers[name: app].image");
    db.upsert(&id("a-list"), &pods(), &list, false).unwrap();
    let err = db.upsert(&id("b-scalar"), &pods(), &path("spec.containers"), false).unwrap_err();
    assert_eq!(
        err,
        SchemaError::ConflictingSchema {
            id: id("b-scalar"),
            conflicts: vec![id("a-list")],
        }
    );
    assert_eq!(db.conflicting_ids(), vec![id("b-scalar")]);
}

#[test]
fn assign_terminal_conflicts_with_object_and_set() {
    let mut db = SchemaDb::new();
    db.upsert(&id("leaf"), &pods(), &path("spec.securityContext"), false).unwrap();
    let nested = path("spec.securityContext.runAsUser");
    assert!(db.upsert(&id("nested"), &pods(), &nested, false).is_err());
    assert!(db.upsert(&id("set"), &pods(), &path("spec.securityContext"), true).is_err());
    assert_eq!(db.conflicting_ids(), vec![id("nested"), id("set")]);
}

#[test]
fn assign_terminals_on_one_field_agree() {
    let mut db = SchemaDb::new();
    db.upsert(&id("a"), &pods(), &path("spec.priority"), false).unwrap();
    db.upsert(&id("b"), &pods(), &path("spec.priority"), false).unwrap();
    assert!(db.conflicting_ids().is_empty());
}

#[test]
fn set_terminal_conflicts_with_keyed_list() {
    let mut db = SchemaDb::new();
    db.upsert(&id("a"), &pods(), &path("spec.containers[name: foo].image"), false).unwrap();
    let result = db.upsert(&id("b"), &pods(), &path("spec.containers"), true);
    assert!(result.is_err());
    assert_eq!(db.conflicting_ids(), vec![id("b")]);
}

#[test]
fn removing_the_blocker_readmits_the_conflicting_mutator() {
    let mut db = SchemaDb::new();
    db.upsert(&id("a"), &pods(), &path("spec.containers[name: foo].image"), false).unwrap();
    db.upsert(&id("b"), &pods(), &path("spec.containers.image"), false).unwrap_err();
    assert!(db.remove(&id("a")));
    assert!(!db.has_conflicts(&id("b")));
    let result = db.upsert(&id("c"), &pods(), &path("spec.containers[name: foo].image"), false);
    assert_eq!(
        result.unwrap_err(),
        SchemaError::ConflictingSchema {
            id: id("c"),
            conflicts: vec![id("b")],
        }
    );
}

#[test]
fn recheck_follows_registration_order() {
    let mut db = SchemaDb::new();
    db.upsert(&id("blocker"), &pods(), &path("spec.template.name"), false).unwrap();
    db.upsert(&id("z-first"), &pods(), &path("spec.template[name: x].image"), false)
        .unwrap_err();
    db.upsert(&id("a-second"), &pods(), &path("spec.template[image: y].name"), false)
        .unwrap_err();
    db.remove(&id("blocker"));
    assert!(!db.has_conflicts(&id("z-first")));
    assert!(db.has_conflicts(&id("a-second")));
}

#[test]
fn replacing_a_registration_updates_its_shape() {
    let mut db = SchemaDb::new();
    db.upsert(&id("a"), &pods(), &path("spec.containers[name: foo].image"), false).unwrap();
    db.upsert(&id("b"), &pods(), &path("spec.containers.image"), false).unwrap_err();
    db.upsert(&id("a"), &pods(), &path("spec.volumes[name: data].hostPath"), false).unwrap();
    assert!(db.conflicting_ids().is_empty());
}

#[test]
fn remove_is_idempotent() {
    let mut db = SchemaDb::new();
    assert!(!db.remove(&id("missing")));
    db.upsert(&id("a"), &pods(), &path("spec.priority"), false).unwrap();
    assert!(db.remove(&id("a")));
    assert!(!db.remove(&id("a")));
    assert!(db.ids().is_empty());
}
