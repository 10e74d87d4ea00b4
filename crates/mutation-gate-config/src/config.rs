// crates/mutation-gate-config/src/config.rs
// ============================================================================
// Module: Mutation Gate Configuration
// Description: Configuration loading and validation for the mutation system.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: mutation-gate-core, mutation-gate-providers, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: a config that loads is one
//! [`MutationGateConfig::build_system`] can turn into a running system with
//! every configured mutator applied.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mutation_gate_core::DEFAULT_PROVIDER_TIMEOUT_SECS;
use mutation_gate_core::ExternalDataResolver;
use mutation_gate_core::Mutator;
use mutation_gate_core::MutatorDefinition;
use mutation_gate_core::ProviderSpec;
use mutation_gate_core::SchemaDb;
use mutation_gate_core::System;
use mutation_gate_core::SystemOptions;
use mutation_gate_providers::FileCertSource;
use mutation_gate_providers::HttpProviderClient;
use mutation_gate_providers::HttpProviderClientConfig;
use mutation_gate_providers::InMemoryProviderCache;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "mutation-gate.toml";
/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "MUTATION_GATE_CONFIG";
/// Maximum config file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Lower bound for provider timeouts in seconds.
pub const MIN_PROVIDER_TIMEOUT_SECS: u64 = 1;
/// Upper bound for provider timeouts in seconds.
pub const MAX_PROVIDER_TIMEOUT_SECS: u64 = 60;
/// Upper bound for the convergence round override.
pub const MAX_ITERATIONS_LIMIT: usize = 1000;
/// Upper bound for provider response bodies.
pub const MAX_RESPONSE_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Maximum number of configured providers.
const MAX_PROVIDERS: usize = 256;
/// Maximum number of statically configured mutators.
const MAX_MUTATORS: usize = 4096;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Mutation gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MutationGateConfig {
    /// Convergence loop and reporting settings.
    #[serde(default)]
    pub mutation: MutationConfig,
    /// External data resolution settings.
    #[serde(default)]
    pub external_data: ExternalDataConfig,
    /// External data provider catalog.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Statically configured mutators.
    #[serde(default)]
    pub mutators: Vec<MutatorDefinition>,
}

impl MutationGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path argument wins, then `MUTATION_GATE_CONFIG`, then
    /// `mutation-gate.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mutation.validate()?;
        self.external_data.validate()?;
        if self.providers.len() > MAX_PROVIDERS {
            return Err(ConfigError::Invalid(format!(
                "providers exceeds max entries ({MAX_PROVIDERS})"
            )));
        }
        if !self.providers.is_empty() && !self.external_data.enabled {
            return Err(ConfigError::Invalid(
                "providers require external_data.enabled = true".to_string(),
            ));
        }
        let mut names = BTreeSet::new();
        for provider in &self.providers {
            provider.validate(self.external_data.allow_http)?;
            if !names.insert(provider.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider name `{}`",
                    provider.name
                )));
            }
        }
        self.validate_mutators(&names)
    }

    /// Builds every mutator and checks ids, provider references, and schemas.
    fn validate_mutators(&self, providers: &BTreeSet<&str>) -> Result<(), ConfigError> {
        if self.mutators.len() > MAX_MUTATORS {
            return Err(ConfigError::Invalid(format!(
                "mutators exceeds max entries ({MAX_MUTATORS})"
            )));
        }
        let mut ids = BTreeSet::new();
        let mut schema = SchemaDb::new();
        for mutator in self.build_mutators()? {
            let id = mutator.id().clone();
            if !ids.insert(id.clone()) {
                return Err(ConfigError::Invalid(format!("duplicate mutator {id}")));
            }
            if let Some(external) = mutator.external_data() {
                let provider = external.provider.as_str();
                if !self.external_data.enabled {
                    return Err(ConfigError::Invalid(format!(
                        "mutator {id} uses external data but external_data is disabled"
                    )));
                }
                if !providers.contains(provider) {
                    return Err(ConfigError::Invalid(format!(
                        "mutator {id} references unknown provider `{provider}`"
                    )));
                }
            }
            if let Some(bindings) = mutator.schema_bindings() {
                schema
                    .upsert(&id, bindings, mutator.path(), mutator.must_terminate())
                    .map_err(|err| ConfigError::Invalid(err.to_string()))?;
            }
        }
        Ok(())
    }

    /// Builds the configured mutators.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first invalid definition.
    pub fn build_mutators(&self) -> Result<Vec<Mutator>, ConfigError> {
        self.mutators
            .iter()
            .enumerate()
            .map(|(index, definition)| {
                Mutator::from_definition(definition.clone()).map_err(|err| {
                    ConfigError::Invalid(format!("mutators[{index}]: {err}"))
                })
            })
            .collect()
    }

    /// Returns the system options.
    #[must_use]
    pub const fn system_options(&self) -> SystemOptions {
        SystemOptions {
            annotate_mutations: self.mutation.annotate_mutations,
            log_mutations: self.mutation.log_mutations,
            max_iterations_override: self.mutation.max_iterations,
        }
    }

    /// Returns the provider catalog as core specs.
    #[must_use]
    pub fn provider_specs(&self) -> Vec<ProviderSpec> {
        self.providers.iter().map(ProviderConfig::to_spec).collect()
    }

    /// Returns the HTTP transport settings.
    #[must_use]
    pub fn http_client_config(&self) -> HttpProviderClientConfig {
        HttpProviderClientConfig {
            allow_http: self.external_data.allow_http,
            max_response_bytes: self.external_data.max_response_bytes,
            ..HttpProviderClientConfig::default()
        }
    }

    /// Builds a system with the configured options, providers, and mutators.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid or a mutator
    /// cannot be registered.
    pub fn build_system(&self) -> Result<System, ConfigError> {
        self.validate()?;
        let mut system = System::new(self.system_options());
        if let Some(resolver) = self.external_data_resolver()? {
            system = system.with_external_data(resolver);
        }
        for mutator in self.build_mutators()? {
            let id = mutator.id().clone();
            system
                .upsert(mutator)
                .map_err(|err| ConfigError::Invalid(format!("mutator {id}: {err}")))?;
        }
        Ok(system)
    }

    /// Builds the external data resolver when external data is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the provider catalog is rejected.
    pub fn external_data_resolver(&self) -> Result<Option<ExternalDataResolver>, ConfigError> {
        let settings = &self.external_data;
        if !settings.enabled {
            return Ok(None);
        }
        let (Some(cert_path), Some(key_path)) =
            (&settings.client_cert_path, &settings.client_key_path)
        else {
            return Err(ConfigError::Invalid(
                "external_data requires client_cert_path and client_key_path".to_string(),
            ));
        };
        let cache = InMemoryProviderCache::from_specs(self.provider_specs())
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        let resolver = ExternalDataResolver::new(
            Arc::new(cache),
            Arc::new(HttpProviderClient::new(self.http_client_config())),
            Arc::new(FileCertSource::new(cert_path, key_path)),
        )
        .with_default_timeout(Duration::from_secs(settings.default_timeout_seconds));
        Ok(Some(resolver))
    }
}

/// Convergence loop and reporting settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MutationConfig {
    /// Write mutation annotations onto changed objects.
    #[serde(default)]
    pub annotate_mutations: bool,
    /// Emit an audit event for every changed or failed call.
    #[serde(default)]
    pub log_mutations: bool,
    /// Fixed round budget replacing the registry-size bound.
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

impl MutationConfig {
    /// Validates the round budget.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max_iterations) = self.max_iterations
            && !(1 ..= MAX_ITERATIONS_LIMIT).contains(&max_iterations)
        {
            return Err(ConfigError::Invalid(format!(
                "mutation.max_iterations must be between 1 and {MAX_ITERATIONS_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// External data resolution settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalDataConfig {
    /// Enable placeholder resolution.
    #[serde(default)]
    pub enabled: bool,
    /// Allow cleartext provider URLs.
    #[serde(default)]
    pub allow_http: bool,
    /// Maximum provider response size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Timeout used for providers declaring none.
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,
    /// PEM certificate chain presented to providers.
    #[serde(default)]
    pub client_cert_path: Option<PathBuf>,
    /// PEM private key for the client certificate.
    #[serde(default)]
    pub client_key_path: Option<PathBuf>,
}

impl Default for ExternalDataConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_http: false,
            max_response_bytes: default_max_response_bytes(),
            default_timeout_seconds: default_timeout_seconds(),
            client_cert_path: None,
            client_key_path: None,
        }
    }
}

impl ExternalDataConfig {
    /// Validates limits and the client identity paths.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout("external_data.default_timeout_seconds", self.default_timeout_seconds)?;
        if !(1 ..= MAX_RESPONSE_BYTES_LIMIT).contains(&self.max_response_bytes) {
            return Err(ConfigError::Invalid(format!(
                "external_data.max_response_bytes must be between 1 and \
                 {MAX_RESPONSE_BYTES_LIMIT}"
            )));
        }
        match (&self.client_cert_path, &self.client_key_path) {
            (Some(cert), Some(key)) => {
                validate_path_string("external_data.client_cert_path", &cert.to_string_lossy())?;
                validate_path_string("external_data.client_key_path", &key.to_string_lossy())?;
            }
            (None, None) => {
                if self.enabled {
                    return Err(ConfigError::Invalid(
                        "external_data requires client_cert_path and client_key_path"
                            .to_string(),
                    ));
                }
            }
            _ => {
                return Err(ConfigError::Invalid(
                    "external_data.client_cert_path and client_key_path must be set together"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// One external data provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Provider name referenced by mutators.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Call timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// PEM bundle trusted for the provider's server certificate.
    #[serde(default)]
    pub ca_bundle: Option<String>,
}

impl ProviderConfig {
    /// Validates the provider entry.
    fn validate(&self, allow_http: bool) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("provider name is empty".to_string()));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "provider name `{}` contains whitespace",
                self.name
            )));
        }
        let url = Url::parse(&self.url).map_err(|err| {
            ConfigError::Invalid(format!("provider `{}` url is invalid: {err}", self.name))
        })?;
        match url.scheme() {
            "https" => {}
            "http" if allow_http => {}
            "http" => {
                return Err(ConfigError::Invalid(format!(
                    "provider `{}` url must use https unless external_data.allow_http is set",
                    self.name
                )));
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "provider `{}` url has unsupported scheme `{other}`",
                    self.name
                )));
            }
        }
        validate_timeout("providers.timeout_seconds", self.timeout_seconds)?;
        if let Some(bundle) = &self.ca_bundle
            && !bundle.contains("-----BEGIN CERTIFICATE-----")
        {
            return Err(ConfigError::Invalid(format!(
                "provider `{}` ca_bundle holds no PEM certificate",
                self.name
            )));
        }
        Ok(())
    }

    /// Converts the entry into a core provider spec.
    fn to_spec(&self) -> ProviderSpec {
        let mut spec = ProviderSpec::new(self.name.clone(), self.url.clone());
        spec.timeout_seconds = self.timeout_seconds;
        spec.ca_bundle.clone_from(&self.ca_bundle);
        spec
    }
}

/// Serde default for response size limits.
const fn default_max_response_bytes() -> usize {
    1024 * 1024
}

/// Serde default for provider timeouts.
const fn default_timeout_seconds() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates a timeout against the provider bounds.
fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if !(MIN_PROVIDER_TIMEOUT_SECS ..= MAX_PROVIDER_TIMEOUT_SECS).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {MIN_PROVIDER_TIMEOUT_SECS} and {MAX_PROVIDER_TIMEOUT_SECS}"
        )));
    }
    Ok(())
}

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
