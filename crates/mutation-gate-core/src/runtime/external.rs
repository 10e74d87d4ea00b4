// crates/mutation-gate-core/src/runtime/external.rs
// ============================================================================
// Module: External Data Resolution
// Description: Batched, parallel replacement of placeholders with provider data.
// Purpose: Resolve every placeholder of an object in one pass per provider.
// Dependencies: crate::{core, interfaces}, tokio, thiserror
// ============================================================================

//! ## Overview
//! Resolution scans the object for placeholders, groups their keys by
//! provider, and issues one call per provider concurrently. Each call is
//! bounded by the provider timeout, capped by the caller's budget. Results
//! are then substituted in a second walk; a failed key is handled by the
//! placeholder's failure policy.
//!
//! Security posture: provider responses are untrusted. A response that is not
//! idempotent or reports a system error fails every key of that provider.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;

use crate::core::ClientCert;
use crate::core::DEFAULT_PROVIDER_TIMEOUT_SECS;
use crate::core::FailurePolicy;
use crate::core::MutationId;
use crate::core::ProviderSpec;
use crate::core::Value;
use crate::interfaces::CertError;
use crate::interfaces::ClientCertSource;
use crate::interfaces::MutationLogSink;
use crate::interfaces::PlaceholderAuditEvent;
use crate::interfaces::ProviderCache;
use crate::interfaces::ProviderCallError;
use crate::interfaces::ProviderClient;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// One placeholder that could not be resolved under the `Fail` policy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlaceholderError {
    /// Provider name.
    pub provider: String,
    /// Requested key.
    pub key: String,
    /// Failure description.
    pub reason: String,
}

impl fmt::Display for PlaceholderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider `{}` key `{}`: {}", self.provider, self.key, self.reason)
    }
}

/// External data resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalDataError {
    /// No client identity was available; no provider was called.
    #[error(transparent)]
    Cert(#[from] CertError),
    /// One or more placeholders failed under the `Fail` policy.
    #[error(
        "{} external data placeholder(s) failed: {}",
        .failures.len(),
        join_failures(.failures)
    )]
    Placeholders {
        /// Every failed placeholder, sorted and de-duplicated.
        failures: Vec<PlaceholderError>,
    },
}

/// Renders failures as a semicolon-separated list.
fn join_failures(failures: &[PlaceholderError]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Values returned by one provider, keyed by request key.
type KeyResults = BTreeMap<String, Result<Value, String>>;

/// Outcome of one provider call.
type ProviderOutcome = Result<KeyResults, ProviderCallError>;

/// Resolves placeholders through injected provider collaborators.
#[derive(Clone)]
pub struct ExternalDataResolver {
    /// Provider lookup by name.
    cache: Arc<dyn ProviderCache>,
    /// Provider transport.
    client: Arc<dyn ProviderClient>,
    /// Client identity source.
    certs: Arc<dyn ClientCertSource>,
    /// Timeout used when a provider declares none.
    default_timeout: Duration,
}

impl ExternalDataResolver {
    /// Creates a resolver over the given collaborators.
    #[must_use]
    pub fn new(
        cache: Arc<dyn ProviderCache>,
        client: Arc<dyn ProviderClient>,
        certs: Arc<dyn ClientCertSource>,
    ) -> Self {
        Self {
            cache,
            client,
            certs,
            default_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    /// Overrides the timeout used for providers that declare zero seconds.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Replaces every placeholder in `object`.
    ///
    /// Returns true when at least one placeholder was substituted. Ignored and
    /// defaulted substitutions are recorded on `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalDataError::Cert`] when no client identity is available,
    /// and [`ExternalDataError::Placeholders`] listing every placeholder that
    /// failed under the `Fail` policy. Failed placeholders stay in the object.
    pub async fn resolve(
        &self,
        object: &mut Value,
        mutation_id: &MutationId,
        caller_timeout: Option<Duration>,
        sink: &dyn MutationLogSink,
    ) -> Result<bool, ExternalDataError> {
        let mut requests: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        collect_placeholders(object, &mut requests);
        if requests.is_empty() {
            return Ok(false);
        }
        let client_cert = self.certs.client_cert()?;
        let results = self.call_providers(requests, &client_cert, caller_timeout).await;

        let mut substitution = Substitution {
            results: &results,
            mutation_id,
            sink,
            substituted: false,
            failures: Vec::new(),
        };
        substitution.walk(object);
        let Substitution {
            substituted,
            mut failures,
            ..
        } = substitution;
        if failures.is_empty() {
            return Ok(substituted);
        }
        failures.sort();
        failures.dedup();
        Err(ExternalDataError::Placeholders {
            failures,
        })
    }

    /// Calls every provider concurrently and gathers the outcomes.
    async fn call_providers(
        &self,
        requests: BTreeMap<String, BTreeSet<String>>,
        client_cert: &ClientCert,
        caller_timeout: Option<Duration>,
    ) -> BTreeMap<String, ProviderOutcome> {
        let mut tasks = JoinSet::new();
        let names: Vec<String> = requests.keys().cloned().collect();
        for (name, keys) in requests {
            let spec = self.cache.get(&name);
            let client = Arc::clone(&self.client);
            let client_cert = client_cert.clone();
            let default_timeout = self.default_timeout;
            tasks.spawn(async move {
                let outcome = match spec {
                    Some(spec) => {
                        let limit = call_limit(&spec, default_timeout, caller_timeout);
                        let keys: Vec<String> = keys.into_iter().collect();
                        call_provider(client.as_ref(), &spec, &keys, &client_cert, limit).await
                    }
                    None => Err(ProviderCallError::NotFound(name.clone())),
                };
                (name, outcome)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((name, outcome)) = joined {
                results.insert(name, outcome);
            }
        }
        for name in names {
            results.entry(name).or_insert_with(|| {
                Err(ProviderCallError::Transport("provider call did not complete".to_string()))
            });
        }
        results
    }
}

/// Returns the effective deadline for one provider call.
fn call_limit(
    spec: &ProviderSpec,
    default_timeout: Duration,
    caller_timeout: Option<Duration>,
) -> Duration {
    let declared = if spec.timeout_seconds == 0 { default_timeout } else { spec.timeout() };
    caller_timeout.map_or(declared, |caller| declared.min(caller))
}

/// Calls one provider under a deadline and validates the response.
async fn call_provider(
    client: &dyn ProviderClient,
    spec: &ProviderSpec,
    keys: &[String],
    client_cert: &ClientCert,
    limit: Duration,
) -> ProviderOutcome {
    let Ok(response) =
        tokio::time::timeout(limit, client.send_request(spec, keys, client_cert)).await
    else {
        return Err(ProviderCallError::Timeout(limit.as_millis()));
    };
    let body = response?.response;
    if !body.idempotent {
        return Err(ProviderCallError::NotIdempotent);
    }
    if !body.system_error.is_empty() {
        return Err(ProviderCallError::System(body.system_error));
    }
    Ok(body
        .items
        .into_iter()
        .map(|item| {
            let outcome =
                if item.error.is_empty() { Ok(Value::from(item.value)) } else { Err(item.error) };
            (item.key, outcome)
        })
        .collect())
}

// ============================================================================
// SECTION: Placeholder Walks
// ============================================================================

/// Groups placeholder keys by provider.
fn collect_placeholders(value: &Value, requests: &mut BTreeMap<String, BTreeSet<String>>) {
    match value {
        Value::Placeholder(placeholder) => {
            requests
                .entry(placeholder.provider.clone())
                .or_default()
                .insert(placeholder.key.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_placeholders(item, requests);
            }
        }
        Value::Map(map) => {
            for item in map.values() {
                collect_placeholders(item, requests);
            }
        }
        _ => {}
    }
}

/// Substitution pass state.
struct Substitution<'a> {
    /// Provider outcomes by name.
    results: &'a BTreeMap<String, ProviderOutcome>,
    /// Correlation identifier for audit events.
    mutation_id: &'a MutationId,
    /// Audit sink for policy substitutions.
    sink: &'a dyn MutationLogSink,
    /// True once any placeholder was replaced.
    substituted: bool,
    /// Placeholders failed under the `Fail` policy.
    failures: Vec<PlaceholderError>,
}

impl Substitution<'_> {
    /// Replaces placeholders below `value`.
    fn walk(&mut self, value: &mut Value) {
        match value {
            Value::Placeholder(placeholder) => {
                let outcome = self.lookup(&placeholder.provider, &placeholder.key);
                let replacement = match outcome {
                    Ok(resolved) => Some(resolved),
                    Err(reason) => match placeholder.failure_policy {
                        FailurePolicy::Fail => {
                            self.failures.push(PlaceholderError {
                                provider: placeholder.provider.clone(),
                                key: placeholder.key.clone(),
                                reason,
                            });
                            None
                        }
                        FailurePolicy::Ignore => {
                            self.record(
                                &placeholder.provider,
                                &placeholder.key,
                                FailurePolicy::Ignore,
                                reason,
                            );
                            Some(Value::String(placeholder.key.clone()))
                        }
                        FailurePolicy::UseDefault => {
                            self.record(
                                &placeholder.provider,
                                &placeholder.key,
                                FailurePolicy::UseDefault,
                                reason,
                            );
                            Some(Value::String(placeholder.default.clone().unwrap_or_default()))
                        }
                    },
                };
                if let Some(replacement) = replacement {
                    *value = replacement;
                    self.substituted = true;
                }
            }
            Value::List(items) => {
                for item in items {
                    self.walk(item);
                }
            }
            Value::Map(map) => {
                for item in map.values_mut() {
                    self.walk(item);
                }
            }
            _ => {}
        }
    }

    /// Returns the resolved value or the failure description for a key.
    fn lookup(&self, provider: &str, key: &str) -> Result<Value, String> {
        match self.results.get(provider) {
            Some(Ok(values)) => match values.get(key) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err(reason)) => Err(reason.clone()),
                None => Err("provider returned no item for the key".to_string()),
            },
            Some(Err(err)) => Err(err.to_string()),
            None => Err(ProviderCallError::NotFound(provider.to_string()).to_string()),
        }
    }

    /// Records a policy substitution.
    fn record(&self, provider: &str, key: &str, policy: FailurePolicy, reason: String) {
        self.sink.record_placeholder(&PlaceholderAuditEvent::new(
            self.mutation_id.as_str(),
            provider,
            key,
            policy,
            reason,
        ));
    }
}
