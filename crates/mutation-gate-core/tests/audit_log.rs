// crates/mutation-gate-core/tests/audit_log.rs
// ============================================================================
// Module: Audit Log Sink Tests
// Description: JSON-line audit records written by the file sink.
// ============================================================================
//! ## Overview
//! Runs a mutate call against a file-backed sink and checks the appended
//! JSON lines, including placeholder substitution records.

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

use std::fs;
use std::path::Path;
use std::sync::Arc;

use mutation_gate_core::FailurePolicy;
use mutation_gate_core::FileMutationLogSink;
use mutation_gate_core::Mutable;
use mutation_gate_core::MutationLogSink;
use mutation_gate_core::Mutator;
use mutation_gate_core::MutatorDefinition;
use mutation_gate_core::PlaceholderAuditEvent;
use mutation_gate_core::System;
use mutation_gate_core::SystemOptions;
use serde_json::Value as JsonValue;
use serde_json::json;

fn priority_mutator() -> Mutator {
    let definition: MutatorDefinition = serde_json::from_value(json!({
        "kind": "Assign",
        "name": "priority",
        "applyTo": [{"groups": [""], "versions": ["v1"], "kinds": ["Pod"]}],
        "location": "spec.priority",
        "parameters": {"assign": {"value": 10}},
    }))
    .unwrap();
    Mutator::from_definition(definition).unwrap()
}

fn pod() -> Mutable {
    Mutable::new(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": "web", "namespace": "prod"},
        "spec": {},
    }))
}

fn read_lines(path: &Path) -> Vec<JsonValue> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn file_sink_appends_one_line_per_changed_call() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("mutations.jsonl");
    let sink = Arc::new(FileMutationLogSink::new(&log_path).unwrap());
    let options = SystemOptions {
        log_mutations: true,
        ..SystemOptions::default()
    };
    let system = System::new(options).with_log_sink(sink);
    system.upsert(priority_mutator()).unwrap();

    let mut first = pod();
    assert!(system.mutate(&mut first).unwrap());
    // An already-mutated object is unchanged and leaves no record.
    assert!(!system.mutate(&mut first).unwrap());

    let lines = read_lines(&log_path);
    assert_eq!(lines.len(), 1);
    let event = &lines[0];
    assert_eq!(event["event"], json!("mutation"));
    assert_eq!(event["kind"], json!("Pod"));
    assert_eq!(event["namespace"], json!("prod"));
    assert_eq!(event["name"], json!("web"));
    assert_eq!(event["outcome"], json!("mutated"));
    assert!(event["mutation_id"].as_str().unwrap().starts_with("mut-"));
    let mutators = event["mutators"].as_array().unwrap();
    assert_eq!(mutators.len(), 1);
    assert_eq!(mutators[0], json!("mutations.mutation-gate.dev/Assign//priority"));
}

#[test]
fn file_sink_reopens_in_append_mode() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("mutations.jsonl");
    for key in ["nginx", "redis"] {
        let sink = FileMutationLogSink::new(&log_path).unwrap();
        sink.record_placeholder(&PlaceholderAuditEvent::new(
            "mut-1",
            "registry",
            key,
            FailurePolicy::Ignore,
            "lookup failed",
        ));
    }
    let lines = read_lines(&log_path);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], json!("placeholder_substituted"));
    assert_eq!(lines[0]["key"], json!("nginx"));
    assert_eq!(lines[1]["key"], json!("redis"));
    assert_eq!(lines[1]["failure_policy"], json!("Ignore"));
}

#[test]
fn disabled_logging_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("mutations.jsonl");
    let sink = Arc::new(FileMutationLogSink::new(&log_path).unwrap());
    let system = System::new(SystemOptions::default()).with_log_sink(sink);
    system.upsert(priority_mutator()).unwrap();
    assert!(system.mutate(&mut pod()).unwrap());
    assert!(fs::read_to_string(&log_path).unwrap().is_empty());
}
