// crates/mutation-gate-core/tests/convergence.rs
// ============================================================================
// Module: Convergence Loop Tests
// Description: End-to-end mutate calls against a populated system.
// ============================================================================
//! ## Overview
//! Validates fixed-point detection, oscillation failures, idempotence,
//! annotations, audit events, and convergence accounting.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;

use mutation_gate_core::ApplyError;
use mutation_gate_core::ConvergenceStatus;
use mutation_gate_core::MUTATION_ID_ANNOTATION;
use mutation_gate_core::MUTATIONS_ANNOTATION;
use mutation_gate_core::MemoryMutationLogSink;
use mutation_gate_core::Mutable;
use mutation_gate_core::MutationError;
use mutation_gate_core::MutationOutcome;
use mutation_gate_core::Mutator;
use mutation_gate_core::MutatorDefinition;
use mutation_gate_core::MutatorId;
use mutation_gate_core::MutatorKind;
use mutation_gate_core::StatsError;
use mutation_gate_core::StatsReporter;
use mutation_gate_core::System;
use mutation_gate_core::SystemOptions;
use serde_json::Value as JsonValue;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

#[derive(Default)]
struct RecordingStats {
    samples: Mutex<Vec<(ConvergenceStatus, usize)>>,
}

impl RecordingStats {
    fn samples(&self) -> Vec<(ConvergenceStatus, usize)> {
        self.samples.lock().unwrap().clone()
    }
}

impl StatsReporter for RecordingStats {
    fn report_iteration_convergence(
        &self,
        status: ConvergenceStatus,
        iterations: usize,
    ) -> Result<(), StatsError> {
        self.samples.lock().unwrap().push((status, iterations));
        Ok(())
    }
}

struct FailingStats;

impl StatsReporter for FailingStats {
    fn report_iteration_convergence(
        &self,
        _status: ConvergenceStatus,
        _iterations: usize,
    ) -> Result<(), StatsError> {
        Err(StatsError::Report("backend down".to_string()))
    }
}

fn mutator(definition: JsonValue) -> Mutator {
    let definition: MutatorDefinition = serde_json::from_value(definition).unwrap();
    Mutator::from_definition(definition).unwrap()
}

fn label(name: &str, key: &str, value: &str) -> Mutator {
    mutator(json!({
        "kind": "AssignMetadata",
        "name": name,
        "location": format!("metadata.labels.{key}"),
        "parameters": {"assign": {"value": value}},
    }))
}

fn assign(name: &str, location: &str, value: JsonValue) -> Mutator {
    mutator(json!({
        "kind": "Assign",
        "name": name,
        "applyTo": [{"groups": [""], "versions": ["v1"], "kinds": ["Pod"]}],
        "location": location,
        "parameters": {"assign": {"value": value}},
    }))
}

fn pod() -> Mutable {
    Mutable::new(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": "web", "namespace": "prod"},
        "spec": {"containers": [{"name": "app", "image": "app:1"}]},
    }))
}

fn json_of(mutable: &Mutable) -> JsonValue {
    mutable.object.to_json().unwrap()
}

// ============================================================================
// SECTION: Fixed Points
// ============================================================================

#[test]
fn label_is_added_and_disappears_after_removal() {
    let system = System::new(SystemOptions::default());
    system.upsert(label("test", "test", "works")).unwrap();

    let mut mutable = Mutable::new(json!({}));
    assert!(system.mutate(&mut mutable).unwrap());
    assert_eq!(json_of(&mutable).pointer("/metadata/labels/test"), Some(&json!("works")));

    system.remove(&MutatorId::for_kind(MutatorKind::AssignMetadata, "test")).unwrap();
    let mut fresh = Mutable::new(json!({}));
    assert!(!system.mutate(&mut fresh).unwrap());
    assert_eq!(json_of(&fresh).pointer("/metadata/labels/test"), None);
}

#[test]
fn two_independent_mutators_converge_in_two_rounds() {
    let stats = Arc::new(RecordingStats::default());
    let system = System::new(SystemOptions::default()).with_stats_reporter(stats.clone());
    system.upsert(label("aaa", "ka", "va")).unwrap();
    system.upsert(label("bbb", "kb", "vb")).unwrap();

    let mut mutable = pod();
    assert!(system.mutate(&mut mutable).unwrap());
    let labels = json_of(&mutable)["metadata"]["labels"].clone();
    assert_eq!(labels, json!({"ka": "va", "kb": "vb"}));
    assert_eq!(stats.samples(), vec![(ConvergenceStatus::Converged, 2)]);
}

#[test]
fn converged_output_is_a_fixed_point() {
    let options = SystemOptions {
        annotate_mutations: true,
        ..SystemOptions::default()
    };
    let stats = Arc::new(RecordingStats::default());
    let system = System::new(options).with_stats_reporter(stats.clone());
    system.upsert(label("aaa", "ka", "va")).unwrap();
    let policy = assign("policy", "spec.containers[name: *].imagePullPolicy", json!("Always"));
    system.upsert(policy).unwrap();

    let mut mutable = pod();
    assert!(system.mutate(&mut mutable).unwrap());
    let converged = json_of(&mutable);
    assert!(!system.mutate(&mut mutable).unwrap());
    assert_eq!(json_of(&mutable), converged);
    assert_eq!(stats.samples().last(), Some(&(ConvergenceStatus::Converged, 1)));
}

#[test]
fn empty_registry_reports_zero_iterations() {
    let stats = Arc::new(RecordingStats::default());
    let system = System::new(SystemOptions::default()).with_stats_reporter(stats.clone());
    let mut mutable = pod();
    assert!(!system.mutate(&mut mutable).unwrap());
    assert_eq!(stats.samples(), vec![(ConvergenceStatus::Converged, 0)]);
}

#[test]
fn unmatched_mutators_leave_the_object_untouched() {
    let stats = Arc::new(RecordingStats::default());
    let system = System::new(SystemOptions::default()).with_stats_reporter(stats.clone());
    system.upsert(assign("priority", "spec.priority", json!(10))).unwrap();
    let mut service = Mutable::new(json!({"apiVersion": "v1", "kind": "Service"}));
    assert!(!system.mutate(&mut service).unwrap());
    assert_eq!(json_of(&service), json!({"apiVersion": "v1", "kind": "Service"}));
    assert_eq!(stats.samples(), vec![(ConvergenceStatus::Converged, 1)]);
}

// ============================================================================
// SECTION: Oscillation
// ============================================================================

#[test]
fn oscillating_mutators_fail_within_the_round_budget() {
    let stats = Arc::new(RecordingStats::default());
    let system = System::new(SystemOptions::default()).with_stats_reporter(stats.clone());
    system.upsert(assign("m1", "spec.foo", json!("qux"))).unwrap();
    system.upsert(assign("m2", "spec.foo", json!("bar"))).unwrap();

    let mut mutable = pod();
    let err = system.mutate(&mut mutable).unwrap_err();
    match err {
        MutationError::NotConverging {
            mutation_id,
            gvk,
            namespace,
            name,
            iterations,
        } => {
            assert!(mutation_id.as_str().starts_with("mut-"));
            assert_eq!(gvk.kind, "Pod");
            assert_eq!(namespace, "prod");
            assert_eq!(name, "web");
            assert_eq!(iterations, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(stats.samples(), vec![(ConvergenceStatus::NotConverged, 3)]);
}

#[test]
fn larger_budget_does_not_hide_oscillation() {
    let options = SystemOptions {
        max_iterations_override: Some(25),
        ..SystemOptions::default()
    };
    let system = System::new(options);
    system.upsert(assign("m1", "spec.foo", json!("qux"))).unwrap();
    system.upsert(assign("m2", "spec.foo", json!("bar"))).unwrap();
    let err = system.mutate(&mut pod()).unwrap_err();
    assert!(
        matches!(err, MutationError::NotConverging { iterations: 25, .. }),
        "unexpected error: {err}"
    );
}

// ============================================================================
// SECTION: Failures
// ============================================================================

#[test]
fn mutator_failure_carries_identity() {
    let sink = Arc::new(MemoryMutationLogSink::new());
    let stats = Arc::new(RecordingStats::default());
    let options = SystemOptions {
        log_mutations: true,
        ..SystemOptions::default()
    };
    let system = System::new(options)
        .with_stats_reporter(stats.clone())
        .with_log_sink(sink.clone());
    system.upsert(assign("image", "spec.containers[name: *].image", json!("x"))).unwrap();

    let mut mutable = Mutable::new(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": "web", "namespace": "prod"},
        "spec": {"containers": "not-a-list"},
    }));
    let err = system.mutate(&mut mutable).unwrap_err();
    match err {
        MutationError::MutatorFailed {
            mutator,
            name,
            source,
            ..
        } => {
            assert_eq!(mutator, MutatorId::for_kind(MutatorKind::Assign, "image"));
            assert_eq!(name, "web");
            assert!(matches!(source, ApplyError::Document(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(stats.samples(), vec![(ConvergenceStatus::NotConverged, 1)]);
    let events = sink.mutations();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, MutationOutcome::Failed);
}

#[test]
fn stats_failures_do_not_fail_mutation() {
    let sink = Arc::new(MemoryMutationLogSink::new());
    let system = System::new(SystemOptions::default())
        .with_stats_reporter(Arc::new(FailingStats))
        .with_log_sink(sink.clone());
    system.upsert(label("aaa", "ka", "va")).unwrap();
    assert!(system.mutate(&mut pod()).unwrap());

    // The dropped sample is still surfaced on the sink.
    let failures = sink.stats_failures();
    assert_eq!(failures.len(), 1);
    let failure = &failures[0];
    assert_eq!(failure.event, "stats_report_failed");
    assert_eq!(failure.status, ConvergenceStatus::Converged);
    assert_eq!(failure.iterations, 2);
    assert_eq!(failure.error, "stats reporter error: backend down");
    assert!(failure.mutation_id.starts_with("mut-"));
    assert!(sink.mutations().is_empty());
}

// ============================================================================
// SECTION: Annotations and Audit Events
// ============================================================================

#[test]
fn annotations_list_sorted_mutator_identities() {
    let options = SystemOptions {
        annotate_mutations: true,
        ..SystemOptions::default()
    };
    let system = System::new(options);
    system.upsert(label("bbb", "kb", "vb")).unwrap();
    system.upsert(label("aaa", "ka", "va")).unwrap();

    let mut mutable = pod();
    assert!(system.mutate(&mut mutable).unwrap());
    let annotations = mutable.object.annotations();
    assert_eq!(
        annotations.get(MUTATIONS_ANNOTATION).map(String::as_str),
        Some(
            "mutations.mutation-gate.dev/AssignMetadata//aaa,\
             mutations.mutation-gate.dev/AssignMetadata//bbb"
        )
    );
    assert!(annotations.get(MUTATION_ID_ANNOTATION).is_some_and(|id| id.starts_with("mut-")));
}

#[test]
fn annotations_are_skipped_when_nothing_changed() {
    let options = SystemOptions {
        annotate_mutations: true,
        ..SystemOptions::default()
    };
    let system = System::new(options);
    system.upsert(label("aaa", "ka", "preset")).unwrap();
    let mut mutable = Mutable::new(json!({"metadata": {"labels": {"ka": "va"}}}));
    assert!(!system.mutate(&mut mutable).unwrap());
    assert!(mutable.object.annotations().is_empty());
}

#[test]
fn log_events_record_changed_calls_only() {
    let sink = Arc::new(MemoryMutationLogSink::new());
    let options = SystemOptions {
        log_mutations: true,
        ..SystemOptions::default()
    };
    let system = System::new(options).with_log_sink(sink.clone());
    system.upsert(label("aaa", "ka", "va")).unwrap();

    let mut mutable = pod();
    assert!(system.mutate(&mut mutable).unwrap());
    assert!(!system.mutate(&mut mutable).unwrap());

    let events = sink.mutations();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.event, "mutation");
    assert_eq!(event.kind, "Pod");
    assert_eq!(event.namespace, "prod");
    assert_eq!(event.name, "web");
    assert_eq!(event.iterations, 2);
    assert_eq!(
        event.mutators,
        vec!["mutations.mutation-gate.dev/AssignMetadata//aaa".to_string()]
    );
    assert_eq!(event.outcome, MutationOutcome::Mutated);
}

#[test]
fn logging_disabled_records_nothing() {
    let sink = Arc::new(MemoryMutationLogSink::new());
    let system = System::new(SystemOptions::default()).with_log_sink(sink.clone());
    system.upsert(label("aaa", "ka", "va")).unwrap();
    assert!(system.mutate(&mut pod()).unwrap());
    assert!(sink.mutations().is_empty());
}
