// crates/mutation-gate-providers/tests/cert_sources.rs
// ============================================================================
// Module: File Certificate Source Tests
// Description: PEM loading, rotation, and rejection of unusable files.
// ============================================================================
//! ## Overview
//! Exercises [`FileCertSource`] against temporary PEM files.

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

use mutation_gate_core::CertError;
use mutation_gate_core::ClientCertSource;
use mutation_gate_providers::FileCertSource;
use mutation_gate_providers::certs::MAX_PEM_FILE_BYTES;
use rcgen::generate_simple_self_signed;

fn write_identity(dir: &std::path::Path, subject: &str) -> (String, String) {
    let rcgen::CertifiedKey {
        cert,
        signing_key,
    } = generate_simple_self_signed(vec![subject.to_string()]).unwrap();
    let cert_pem = cert.pem();
    let key_pem = signing_key.serialize_pem();
    fs::write(dir.join("tls.crt"), &cert_pem).unwrap();
    fs::write(dir.join("tls.key"), &key_pem).unwrap();
    (cert_pem, key_pem)
}

#[test]
fn reads_and_follows_rotated_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileCertSource::new(dir.path().join("tls.crt"), dir.path().join("tls.key"));

    let (cert_pem, key_pem) = write_identity(dir.path(), "first");
    let loaded = source.client_cert().unwrap();
    assert_eq!(loaded.cert_pem, cert_pem);
    assert_eq!(loaded.key_pem, key_pem);

    let (rotated, _) = write_identity(dir.path(), "second");
    assert_eq!(source.client_cert().unwrap().cert_pem, rotated);
}

#[test]
fn missing_files_are_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileCertSource::new(dir.path().join("tls.crt"), dir.path().join("tls.key"));
    assert!(matches!(source.client_cert(), Err(CertError::Unavailable(_))));
}

#[test]
fn files_without_pem_blocks_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_identity(dir.path(), "subject");
    fs::write(dir.path().join("tls.key"), "plain text").unwrap();
    let source = FileCertSource::new(dir.path().join("tls.crt"), dir.path().join("tls.key"));
    let err = source.client_cert().unwrap_err();
    assert!(err.to_string().contains("no PEM private key"), "unexpected error: {err}");

    let swapped = FileCertSource::new(dir.path().join("tls.key"), dir.path().join("tls.crt"));
    let err = swapped.client_cert().unwrap_err();
    assert!(err.to_string().contains("no PEM certificate"), "unexpected error: {err}");
}

#[test]
fn oversized_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_identity(dir.path(), "subject");
    let padding = "#".repeat(usize::try_from(MAX_PEM_FILE_BYTES).unwrap() + 1);
    fs::write(dir.path().join("tls.crt"), padding).unwrap();
    let source = FileCertSource::new(dir.path().join("tls.crt"), dir.path().join("tls.key"));
    let err = source.client_cert().unwrap_err();
    assert!(err.to_string().contains("exceeds size limit"), "unexpected error: {err}");
}
