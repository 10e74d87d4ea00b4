// crates/mutation-gate-config/tests/config_validation.rs
// ============================================================================
// Module: Config Validation Tests
// Description: Fail-closed validation of options, providers, and mutators.
// ============================================================================
//! ## Overview
//! Every section of `mutation-gate.toml` rejects inconsistent input, and a
//! config that validates builds a working system.

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

use mutation_gate_config::MutationGateConfig;
use mutation_gate_core::Mutable;
use serde_json::json;

fn assert_invalid(toml: &str, needle: &str) {
    let err = MutationGateConfig::from_toml(toml).unwrap_err();
    let message = err.to_string();
    assert!(message.contains(needle), "error `{message}` did not contain `{needle}`");
}

const EXTERNAL_DATA: &str = r#"
[external_data]
enabled = true
client_cert_path = "/etc/mutation-gate/tls.crt"
client_key_path = "/etc/mutation-gate/tls.key"
"#;

// ============================================================================
// SECTION: Options
// ============================================================================

#[test]
fn empty_config_uses_defaults() {
    let config = MutationGateConfig::from_toml("").unwrap();
    let options = config.system_options();
    assert!(!options.annotate_mutations);
    assert!(!options.log_mutations);
    assert_eq!(options.max_iterations_override, None);
    assert!(config.provider_specs().is_empty());
    assert!(config.external_data_resolver().unwrap().is_none());
}

#[test]
fn mutation_options_map_onto_system_options() {
    let config = MutationGateConfig::from_toml(
        "[mutation]\nannotate_mutations = true\nlog_mutations = true\nmax_iterations = 8\n",
    )
    .unwrap();
    let options = config.system_options();
    assert!(options.annotate_mutations && options.log_mutations);
    assert_eq!(options.max_iterations_override, Some(8));
}

#[test]
fn max_iterations_must_be_positive() {
    assert_invalid("[mutation]\nmax_iterations = 0\n", "mutation.max_iterations");
    assert_invalid("[mutation]\nmax_iterations = 1001\n", "mutation.max_iterations");
}

// ============================================================================
// SECTION: External Data
// ============================================================================

#[test]
fn client_identity_paths_are_set_together() {
    assert_invalid(
        "[external_data]\nclient_cert_path = \"tls.crt\"\n",
        "must be set together",
    );
    assert_invalid("[external_data]\nenabled = true\n", "requires client_cert_path");
}

#[test]
fn default_timeout_is_bounded() {
    assert_invalid(
        "[external_data]\ndefault_timeout_seconds = 0\n",
        "external_data.default_timeout_seconds must be between 1 and 60",
    );
}

#[test]
fn providers_require_external_data() {
    let toml = "[[providers]]\nname = \"registry\"\nurl = \"https://registry.local\"\n";
    assert_invalid(toml, "providers require external_data.enabled");
}

#[test]
fn provider_entries_are_validated() {
    let provider = |body: &str| format!("{EXTERNAL_DATA}\n[[providers]]\n{body}\n");
    assert_invalid(&provider("name = \" \"\nurl = \"https://a.local\""), "provider name is empty");
    assert_invalid(&provider("name = \"a b\"\nurl = \"https://a.local\""), "contains whitespace");
    assert_invalid(&provider("name = \"a\"\nurl = \"not a url\""), "url is invalid");
    assert_invalid(&provider("name = \"a\"\nurl = \"http://a.local\""), "must use https");
    assert_invalid(&provider("name = \"a\"\nurl = \"ftp://a.local\""), "unsupported scheme");
    assert_invalid(
        &provider("name = \"a\"\nurl = \"https://a.local\"\ntimeout_seconds = 61"),
        "providers.timeout_seconds must be between 1 and 60",
    );
    assert_invalid(
        &provider("name = \"a\"\nurl = \"https://a.local\"\nca_bundle = \"junk\""),
        "ca_bundle holds no PEM certificate",
    );
}

#[test]
fn duplicate_provider_names_are_rejected() {
    let toml = format!(
        "{EXTERNAL_DATA}\n[[providers]]\nname = \"a\"\nurl = \"https://a.local\"\n\
         [[providers]]\nname = \"a\"\nurl = \"https://b.local\"\n"
    );
    assert_invalid(&toml, "duplicate provider name `a`");
}

#[test]
fn cleartext_providers_need_the_opt_in() {
    let toml = format!(
        "{EXTERNAL_DATA}allow_http = true\n\n[[providers]]\nname = \"registry\"\n\
         url = \"http://registry.local/lookup\"\ntimeout_seconds = 3\n"
    );
    let config = MutationGateConfig::from_toml(&toml).unwrap();
    let specs = config.provider_specs();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].name, "registry");
    assert_eq!(specs[0].timeout_seconds, 3);
    assert!(config.http_client_config().allow_http);
    assert!(config.external_data_resolver().unwrap().is_some());
}

// ============================================================================
// SECTION: Mutators
// ============================================================================

const OWNER_LABEL: &str = r#"
[[mutators]]
kind = "AssignMetadata"
name = "owner"
location = "metadata.labels.owner"
parameters = { assign = { value = "platform" } }
"#;

const PULL_POLICY: &str = r#"
[[mutators]]
kind = "Assign"
name = "pull-policy"
applyTo = [{ groups = [""], versions = ["v1"], kinds = ["Pod"] }]
location = "spec.containers[name: *].imagePullPolicy"
parameters = { assign = { value = "Always" } }
"#;

#[test]
fn configured_mutators_build_a_working_system() {
    let toml = format!("[mutation]\nannotate_mutations = true\n{OWNER_LABEL}{PULL_POLICY}");
    let config = MutationGateConfig::from_toml(&toml).unwrap();
    let system = config.build_system().unwrap();
    assert_eq!(system.len().unwrap(), 2);

    let mut mutable = Mutable::new(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": "web", "namespace": "prod"},
        "spec": {"containers": [{"name": "app", "image": "nginx"}]},
    }));
    assert!(system.mutate(&mut mutable).unwrap());
    let object = mutable.object.to_json().unwrap();
    assert_eq!(object["metadata"]["labels"]["owner"], json!("platform"));
    assert_eq!(object["spec"]["containers"][0]["imagePullPolicy"], json!("Always"));
    assert!(object["metadata"]["annotations"]["mutation-gate.dev/mutations"].is_string());
}

#[test]
fn invalid_mutator_definitions_are_rejected() {
    let toml = r#"
[[mutators]]
kind = "Assign"
name = "labels"
applyTo = [{ groups = [""], versions = ["v1"], kinds = ["Pod"] }]
location = "metadata.labels.team"
parameters = { assign = { value = "core" } }
"#;
    assert_invalid(toml, "mutators[0]");
}

#[test]
fn duplicate_mutators_are_rejected() {
    let toml = format!("{OWNER_LABEL}{OWNER_LABEL}");
    assert_invalid(&toml, "duplicate mutator");
}

#[test]
fn conflicting_mutator_schemas_are_rejected() {
    let conflicting = r#"
[[mutators]]
kind = "Assign"
name = "containers-object"
applyTo = [{ groups = [""], versions = ["v1"], kinds = ["Pod"] }]
location = "spec.containers.imagePullPolicy"
parameters = { assign = { value = "Never" } }
"#;
    let toml = format!("{PULL_POLICY}{conflicting}");
    assert_invalid(&toml, "conflict");
}

#[test]
fn external_data_mutators_need_a_known_provider() {
    let mutator = r#"
[[mutators]]
kind = "Assign"
name = "pin"
applyTo = [{ groups = [""], versions = ["v1"], kinds = ["Pod"] }]
location = "spec.containers[name: *].image"
parameters = { assign = { externalData = { provider = "registry" } } }
"#;
    assert_invalid(mutator, "external_data is disabled");
    let toml = format!("{EXTERNAL_DATA}{mutator}");
    assert_invalid(&toml, "unknown provider `registry`");
}
