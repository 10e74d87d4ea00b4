// crates/mutation-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Mutation Gate Interfaces
// Description: Injected collaborators for stats, audit logging, and providers.
// Purpose: Define the seams the mutation system calls without owning them.
// Dependencies: crate::core, async-trait, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The mutation system reports convergence through a [`StatsReporter`],
//! writes structured JSON-line events through a [`MutationLogSink`], and
//! reaches external data providers through a [`ProviderCache`], a
//! [`ProviderClient`], and a [`ClientCertSource`]. Every seam is a trait so
//! deployments and tests can substitute their own implementations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::ClientCert;
use crate::core::FailurePolicy;
use crate::core::ProviderResponse;
use crate::core::ProviderSpec;

// ============================================================================
// SECTION: Stats Reporter
// ============================================================================

/// Convergence outcome reported after every mutate call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// The object reached a fixed point.
    Converged,
    /// The iteration budget ran out or a mutator failed.
    NotConverged,
}

impl ConvergenceStatus {
    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::NotConverged => "not_converged",
        }
    }
}

/// Stats reporter errors.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Reporter backend failed.
    #[error("stats reporter error: {0}")]
    Report(String),
}

/// Receives convergence accounting for every mutate call.
pub trait StatsReporter: Send + Sync {
    /// Records the outcome and iteration count of one mutate call.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the backend rejects the sample.
    fn report_iteration_convergence(
        &self,
        status: ConvergenceStatus,
        iterations: usize,
    ) -> Result<(), StatsError>;
}

/// Stats reporter that discards samples.
pub struct NoopStatsReporter;

impl StatsReporter for NoopStatsReporter {
    fn report_iteration_convergence(
        &self,
        _status: ConvergenceStatus,
        _iterations: usize,
    ) -> Result<(), StatsError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// Outcome of one mutate call as recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The object changed and converged.
    Mutated,
    /// The iteration budget ran out.
    NotConverging,
    /// A mutator returned an error.
    Failed,
}

/// Structured record of one mutate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Correlation identifier of the mutate call.
    pub mutation_id: String,
    /// Object API group.
    pub group: String,
    /// Object kind.
    pub kind: String,
    /// Object namespace.
    pub namespace: String,
    /// Object name.
    pub name: String,
    /// Rounds executed.
    pub iterations: usize,
    /// Sorted, de-duplicated identities of mutators that changed the object.
    pub mutators: Vec<String>,
    /// Call outcome.
    pub outcome: MutationOutcome,
}

/// Parameters for [`MutationAuditEvent::new`].
#[derive(Debug, Clone)]
pub struct MutationAuditEventParams {
    /// Correlation identifier of the mutate call.
    pub mutation_id: String,
    /// Object API group.
    pub group: String,
    /// Object kind.
    pub kind: String,
    /// Object namespace.
    pub namespace: String,
    /// Object name.
    pub name: String,
    /// Rounds executed.
    pub iterations: usize,
    /// Identities of mutators that changed the object.
    pub mutators: Vec<String>,
    /// Call outcome.
    pub outcome: MutationOutcome,
}

impl MutationAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(params: MutationAuditEventParams) -> Self {
        Self {
            event: "mutation",
            timestamp_ms: now_ms(),
            mutation_id: params.mutation_id,
            group: params.group,
            kind: params.kind,
            namespace: params.namespace,
            name: params.name,
            iterations: params.iterations,
            mutators: params.mutators,
            outcome: params.outcome,
        }
    }
}

/// Structured record of a placeholder substituted by a failure policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceholderAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Correlation identifier of the mutate call.
    pub mutation_id: String,
    /// Provider name.
    pub provider: String,
    /// Requested key.
    pub key: String,
    /// Policy that produced the substitution.
    pub failure_policy: FailurePolicy,
    /// Provider failure that triggered the policy.
    pub error: String,
}

impl PlaceholderAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        mutation_id: impl Into<String>,
        provider: impl Into<String>,
        key: impl Into<String>,
        failure_policy: FailurePolicy,
        error: impl Into<String>,
    ) -> Self {
        Self {
            event: "placeholder_substituted",
            timestamp_ms: now_ms(),
            mutation_id: mutation_id.into(),
            provider: provider.into(),
            key: key.into(),
            failure_policy,
            error: error.into(),
        }
    }
}

/// Structured record of a convergence sample the stats reporter rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsFailureAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Correlation identifier of the mutate call.
    pub mutation_id: String,
    /// Outcome that could not be reported.
    pub status: ConvergenceStatus,
    /// Rounds that could not be reported.
    pub iterations: usize,
    /// Reporter failure.
    pub error: String,
}

impl StatsFailureAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        mutation_id: impl Into<String>,
        status: ConvergenceStatus,
        iterations: usize,
        error: impl Into<String>,
    ) -> Self {
        Self {
            event: "stats_report_failed",
            timestamp_ms: now_ms(),
            mutation_id: mutation_id.into(),
            status,
            iterations,
            error: error.into(),
        }
    }
}

/// Returns milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Log Sinks
// ============================================================================

/// Audit sink for mutation events.
pub trait MutationLogSink: Send + Sync {
    /// Records a mutate call.
    fn record(&self, event: &MutationAuditEvent);

    /// Records a placeholder substitution.
    fn record_placeholder(&self, _event: &PlaceholderAuditEvent) {}

    /// Records a convergence sample the stats reporter rejected.
    fn record_stats_failure(&self, _event: &StatsFailureAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrMutationLogSink;

impl StderrMutationLogSink {
    /// Serializes and writes one line.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl MutationLogSink for StderrMutationLogSink {
    fn record(&self, event: &MutationAuditEvent) {
        Self::emit(event);
    }

    fn record_placeholder(&self, event: &PlaceholderAuditEvent) {
        Self::emit(event);
    }

    fn record_stats_failure(&self, event: &StatsFailureAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileMutationLogSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileMutationLogSink {
    /// Opens the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Serializes and appends one line.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl MutationLogSink for FileMutationLogSink {
    fn record(&self, event: &MutationAuditEvent) {
        self.append(event);
    }

    fn record_placeholder(&self, event: &PlaceholderAuditEvent) {
        self.append(event);
    }

    fn record_stats_failure(&self, event: &StatsFailureAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopMutationLogSink;

impl MutationLogSink for NoopMutationLogSink {
    fn record(&self, _event: &MutationAuditEvent) {}
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Default)]
pub struct MemoryMutationLogSink {
    /// Recorded mutation events.
    mutations: Mutex<Vec<MutationAuditEvent>>,
    /// Recorded placeholder events.
    placeholders: Mutex<Vec<PlaceholderAuditEvent>>,
    /// Recorded stats reporter failures.
    stats_failures: Mutex<Vec<StatsFailureAuditEvent>>,
}

impl MemoryMutationLogSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded mutation events.
    #[must_use]
    pub fn mutations(&self) -> Vec<MutationAuditEvent> {
        self.mutations.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns a copy of the recorded placeholder events.
    #[must_use]
    pub fn placeholders(&self) -> Vec<PlaceholderAuditEvent> {
        self.placeholders.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns a copy of the recorded stats reporter failures.
    #[must_use]
    pub fn stats_failures(&self) -> Vec<StatsFailureAuditEvent> {
        self.stats_failures.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl MutationLogSink for MemoryMutationLogSink {
    fn record(&self, event: &MutationAuditEvent) {
        if let Ok(mut events) = self.mutations.lock() {
            events.push(event.clone());
        }
    }

    fn record_placeholder(&self, event: &PlaceholderAuditEvent) {
        if let Ok(mut events) = self.placeholders.lock() {
            events.push(event.clone());
        }
    }

    fn record_stats_failure(&self, event: &StatsFailureAuditEvent) {
        if let Ok(mut events) = self.stats_failures.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: External Data Providers
// ============================================================================

/// Lookup of registered providers by name.
pub trait ProviderCache: Send + Sync {
    /// Returns the provider registered under `name`.
    fn get(&self, name: &str) -> Option<ProviderSpec>;
}

/// Provider call errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderCallError {
    /// Provider is not registered.
    #[error("provider `{0}` not found")]
    NotFound(String),
    /// Call exceeded its deadline.
    #[error("provider call timed out after {0} ms")]
    Timeout(u128),
    /// Provider answered with a non-success HTTP status.
    #[error("provider returned HTTP status {0}")]
    HttpStatus(u16),
    /// Transport or TLS failure.
    #[error("provider transport error: {0}")]
    Transport(String),
    /// Response could not be decoded.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    /// Response was not marked idempotent.
    #[error("provider response is not idempotent")]
    NotIdempotent,
    /// Provider reported a system-level error.
    #[error("provider system error: {0}")]
    System(String),
}

/// Transport used to call external data providers.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Sends one request carrying every key wanted from the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderCallError`] when the call fails or the response is unusable.
    async fn send_request(
        &self,
        provider: &ProviderSpec,
        keys: &[String],
        client_cert: &ClientCert,
    ) -> Result<ProviderResponse, ProviderCallError>;
}

/// Client certificate errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertError {
    /// No certificate is available.
    #[error("client certificate unavailable: {0}")]
    Unavailable(String),
}

/// Source of the client identity presented to providers.
pub trait ClientCertSource: Send + Sync {
    /// Returns the current client identity.
    ///
    /// # Errors
    ///
    /// Returns [`CertError`] when no identity is available.
    fn client_cert(&self) -> Result<ClientCert, CertError>;
}
