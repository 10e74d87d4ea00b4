// crates/mutation-gate-core/src/runtime/system.rs
// ============================================================================
// Module: Mutation System
// Description: Mutator registry and the bounded convergence loop.
// Purpose: Apply every matching mutator until the object reaches a fixed point.
// Dependencies: crate::{core, interfaces, mutators, runtime}, thiserror
// ============================================================================

//! ## Overview
//! [`System`] owns the mutator registry: an ordered index plus the schema
//! conflict database, both behind one reader/writer lock. A mutate call holds
//! the read lock for its whole convergence loop, so registry updates never
//! interleave with one object's rounds.
//!
//! The loop runs at most `len + 1` rounds. A round is stable when no mutator
//! reports a change and the object equals its round snapshot. Running out of
//! rounds is a distinguished [`MutationError::NotConverging`] failure.
//!
//! Security posture: conflicting mutators are stored but never applied, and
//! any apply error fails the whole call so callers can reject admission.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::time::Duration;

use thiserror::Error;

use crate::core::DocumentError;
use crate::core::GroupVersionKind;
use crate::core::Mutable;
use crate::core::MutationId;
use crate::core::MutatorId;
use crate::interfaces::ConvergenceStatus;
use crate::interfaces::MutationAuditEvent;
use crate::interfaces::MutationAuditEventParams;
use crate::interfaces::MutationLogSink;
use crate::interfaces::MutationOutcome;
use crate::interfaces::NoopStatsReporter;
use crate::interfaces::StatsFailureAuditEvent;
use crate::interfaces::StatsReporter;
use crate::interfaces::StderrMutationLogSink;
use crate::mutators::ApplyError;
use crate::mutators::Mutator;
use crate::runtime::correlation::MutationIdGenerator;
use crate::runtime::external::ExternalDataError;
use crate::runtime::external::ExternalDataResolver;
use crate::runtime::index::MutatorIndex;
use crate::runtime::schema::SchemaDb;
use crate::runtime::schema::SchemaError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Annotation carrying the correlation id of the call that changed the object.
pub const MUTATION_ID_ANNOTATION: &str = "mutation-gate.dev/mutation-id";

/// Annotation listing every mutator that changed the object.
pub const MUTATIONS_ANNOTATION: &str = "mutation-gate.dev/mutations";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Mutation system errors.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Mutators kept changing the object through the whole round budget.
    #[error(
        "mutation {mutation_id} not converging for {gvk} {namespace}/{name} after {iterations} \
         iterations"
    )]
    NotConverging {
        /// Correlation id of the call.
        mutation_id: MutationId,
        /// Object group/version/kind.
        gvk: GroupVersionKind,
        /// Object namespace.
        namespace: String,
        /// Object name.
        name: String,
        /// Rounds executed.
        iterations: usize,
    },
    /// A mutator failed to write the object.
    #[error(
        "mutation {mutation_id}: mutator {mutator} failed on {gvk} {namespace}/{name}: {source}"
    )]
    MutatorFailed {
        /// Correlation id of the call.
        mutation_id: MutationId,
        /// Failing mutator.
        mutator: MutatorId,
        /// Object group/version/kind.
        gvk: GroupVersionKind,
        /// Object namespace.
        namespace: String,
        /// Object name.
        name: String,
        /// Underlying write error.
        #[source]
        source: ApplyError,
    },
    /// The mutator was stored but conflicts with the registered schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Registry structures disagree.
    #[error("mutation registry inconsistency: {0}")]
    Internal(String),
    /// Placeholder resolution failed.
    #[error(transparent)]
    ExternalData(#[from] ExternalDataError),
    /// A mutator uses external data on a system built without it.
    #[error("mutator {0} uses external data but external data is not enabled")]
    ExternalDataDisabled(MutatorId),
    /// Writing mutation annotations failed.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// The registry lock was poisoned.
    #[error("mutation registry lock poisoned")]
    Lock,
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Mutation system switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemOptions {
    /// Annotate changed objects with the correlation id and applied mutators.
    pub annotate_mutations: bool,
    /// Record a mutation audit event for changed or failed calls.
    pub log_mutations: bool,
    /// Round budget replacing `len + 1`.
    pub max_iterations_override: Option<usize>,
}

// ============================================================================
// SECTION: System
// ============================================================================

/// Registry contents guarded together.
#[derive(Debug, Default)]
struct Registry {
    /// Mutators in application order.
    index: MutatorIndex,
    /// Implied shapes of path-based mutators.
    schema: SchemaDb,
}

/// Result of one convergence loop.
struct Convergence {
    /// Rounds executed.
    iterations: usize,
    /// Identities of mutators that reported a change.
    applied: BTreeSet<String>,
    /// Loop outcome.
    result: Result<(), MutationError>,
}

/// Mutator registry and convergence engine.
///
/// # Invariants
/// - Every registered path-based mutator has a schema registration.
/// - A mutator with a schema conflict is never applied.
pub struct System {
    /// Guarded registry.
    registry: RwLock<Registry>,
    /// Behavior switches.
    options: SystemOptions,
    /// Convergence accounting sink.
    stats: Arc<dyn StatsReporter>,
    /// Audit event sink.
    log_sink: Arc<dyn MutationLogSink>,
    /// Placeholder resolver; `None` disables external data.
    external: Option<ExternalDataResolver>,
    /// Correlation id source.
    ids: MutationIdGenerator,
}

impl System {
    /// Creates an empty system.
    #[must_use]
    pub fn new(options: SystemOptions) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            options,
            stats: Arc::new(NoopStatsReporter),
            log_sink: Arc::new(StderrMutationLogSink),
            external: None,
            ids: MutationIdGenerator::new(),
        }
    }

    /// Sets the convergence accounting sink.
    #[must_use]
    pub fn with_stats_reporter(mut self, stats: Arc<dyn StatsReporter>) -> Self {
        self.stats = stats;
        self
    }

    /// Sets the audit event sink.
    #[must_use]
    pub fn with_log_sink(mut self, log_sink: Arc<dyn MutationLogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    /// Enables external data with the given resolver.
    #[must_use]
    pub fn with_external_data(mut self, resolver: ExternalDataResolver) -> Self {
        self.external = Some(resolver);
        self
    }

    /// Returns the configured switches.
    #[must_use]
    pub const fn options(&self) -> SystemOptions {
        self.options
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    /// Registers or replaces a mutator.
    ///
    /// An identical registration is a no-op. A mutator whose schema conflicts
    /// is stored but excluded from application until the conflict clears.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Schema`] on a conflict (the mutator is still
    /// stored), [`MutationError::ExternalDataDisabled`] when the mutator needs
    /// a resolver this system lacks, and [`MutationError::Lock`] on a poisoned lock.
    pub fn upsert(&self, mutator: Mutator) -> Result<(), MutationError> {
        if mutator.uses_external_data() && self.external.is_none() {
            return Err(MutationError::ExternalDataDisabled(mutator.id().clone()));
        }
        let mut registry = self.write()?;
        if let Some(existing) = registry.index.get(mutator.id())
            && !existing.has_diff(&mutator)
        {
            return Ok(());
        }
        let mutator = Arc::new(mutator);
        let schema_result = match mutator.schema_bindings() {
            Some(bindings) => registry.schema.upsert(
                mutator.id(),
                bindings,
                mutator.path(),
                mutator.must_terminate(),
            ),
            None => {
                registry.schema.remove(mutator.id());
                Ok(())
            }
        };
        registry.index.insert(mutator);
        schema_result.map_err(MutationError::from)
    }

    /// Removes a mutator; unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Internal`] when the index and the schema
    /// database disagree about the id, and [`MutationError::Lock`] on a
    /// poisoned lock.
    pub fn remove(&self, id: &MutatorId) -> Result<(), MutationError> {
        let mut registry = self.write()?;
        let removed = registry.index.remove(id);
        let had_schema = registry.schema.remove(id);
        match removed {
            None if had_schema => Err(MutationError::Internal(format!(
                "mutator {id} has a schema registration but no index entry"
            ))),
            Some(mutator) if mutator.schema_bindings().is_some() && !had_schema => {
                Err(MutationError::Internal(format!(
                    "mutator {id} has an index entry but no schema registration"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Returns the mutator registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Lock`] on a poisoned lock.
    pub fn get(&self, id: &MutatorId) -> Result<Option<Arc<Mutator>>, MutationError> {
        Ok(self.read()?.index.get(id).cloned())
    }

    /// Returns the number of registered mutators, conflicting ones included.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Lock`] on a poisoned lock.
    pub fn len(&self) -> Result<usize, MutationError> {
        Ok(self.read()?.index.len())
    }

    /// Returns true when no mutators are registered.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Lock`] on a poisoned lock.
    pub fn is_empty(&self) -> Result<bool, MutationError> {
        Ok(self.read()?.index.is_empty())
    }

    /// Returns the ids of mutators excluded by a schema conflict.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Lock`] on a poisoned lock.
    pub fn conflicting_ids(&self) -> Result<Vec<MutatorId>, MutationError> {
        Ok(self.read()?.schema.conflicting_ids())
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Applies matching mutators until the object is stable.
    ///
    /// Returns true when the object changed.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::NotConverging`] when the round budget runs out,
    /// [`MutationError::MutatorFailed`] when a mutator write fails (earlier
    /// writes of the failing round stay applied), and
    /// [`MutationError::Document`] when annotations cannot be written.
    pub fn mutate(&self, mutable: &mut Mutable) -> Result<bool, MutationError> {
        let mutation_id = self.ids.issue();
        self.mutate_with_id(mutable, &mutation_id)
    }

    /// Applies matching mutators, then resolves external data placeholders.
    ///
    /// `caller_timeout` caps every provider call.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`System::mutate`], plus
    /// [`MutationError::ExternalData`] when placeholder resolution fails.
    pub async fn mutate_with_external_data(
        &self,
        mutable: &mut Mutable,
        caller_timeout: Option<Duration>,
    ) -> Result<bool, MutationError> {
        let mutation_id = self.ids.issue();
        let changed = self.mutate_with_id(mutable, &mutation_id)?;
        let Some(resolver) = &self.external else {
            return Ok(changed);
        };
        let resolved = resolver
            .resolve(&mut mutable.object, &mutation_id, caller_timeout, self.log_sink.as_ref())
            .await?;
        Ok(changed || resolved)
    }

    /// Runs the convergence loop and its reporting under one correlation id.
    fn mutate_with_id(
        &self,
        mutable: &mut Mutable,
        mutation_id: &MutationId,
    ) -> Result<bool, MutationError> {
        let original = mutable.object.clone();
        let convergence = {
            let registry = self.read()?;
            self.converge(&registry, mutable, mutation_id)
        };
        let Convergence {
            iterations,
            applied,
            result,
        } = convergence;
        let changed = mutable.object != original;
        let status = if result.is_ok() {
            ConvergenceStatus::Converged
        } else {
            ConvergenceStatus::NotConverged
        };
        // Stats failures never fail admission.
        if let Err(err) = self.stats.report_iteration_convergence(status, iterations) {
            self.log_sink.record_stats_failure(&StatsFailureAuditEvent::new(
                mutation_id.to_string(),
                status,
                iterations,
                err.to_string(),
            ));
        }

        match result {
            Ok(()) => {
                if !changed {
                    return Ok(false);
                }
                if self.options.annotate_mutations {
                    let summary = applied.iter().cloned().collect::<Vec<_>>().join(",");
                    mutable.object.set_annotation(MUTATION_ID_ANNOTATION, mutation_id.as_str())?;
                    mutable.object.set_annotation(MUTATIONS_ANNOTATION, summary)?;
                }
                self.log(mutable, mutation_id, iterations, &applied, MutationOutcome::Mutated);
                Ok(true)
            }
            Err(err) => {
                let outcome = if matches!(err, MutationError::NotConverging { .. }) {
                    MutationOutcome::NotConverging
                } else {
                    MutationOutcome::Failed
                };
                self.log(mutable, mutation_id, iterations, &applied, outcome);
                Err(err)
            }
        }
    }

    /// Executes rounds until stable, failed, or out of budget.
    fn converge(
        &self,
        registry: &Registry,
        mutable: &mut Mutable,
        mutation_id: &MutationId,
    ) -> Convergence {
        if registry.index.is_empty() {
            return Convergence {
                iterations: 0,
                applied: BTreeSet::new(),
                result: Ok(()),
            };
        }
        let max_iterations =
            self.options.max_iterations_override.unwrap_or(registry.index.len() + 1);
        let active: Vec<&Mutator> = registry
            .index
            .iter()
            .filter(|(id, _)| !registry.schema.has_conflicts(id))
            .map(|(_, mutator)| &**mutator)
            .collect();
        run_rounds(&active, max_iterations, mutable, mutation_id)
    }

    /// Records a mutation audit event when logging is enabled.
    fn log(
        &self,
        mutable: &Mutable,
        mutation_id: &MutationId,
        iterations: usize,
        applied: &BTreeSet<String>,
        outcome: MutationOutcome,
    ) {
        if !self.options.log_mutations {
            return;
        }
        let gvk = mutable.object.group_version_kind();
        self.log_sink.record(&MutationAuditEvent::new(MutationAuditEventParams {
            mutation_id: mutation_id.to_string(),
            group: gvk.group,
            kind: gvk.kind,
            namespace: mutable.object.object_namespace().to_string(),
            name: mutable.object.object_name().to_string(),
            iterations,
            mutators: applied.iter().cloned().collect(),
            outcome,
        }));
    }

    /// Acquires the registry read lock.
    fn read(&self) -> Result<RwLockReadGuard<'_, Registry>, MutationError> {
        self.registry.read().map_err(|_| MutationError::Lock)
    }

    /// Acquires the registry write lock.
    fn write(&self) -> Result<RwLockWriteGuard<'_, Registry>, MutationError> {
        self.registry.write().map_err(|_| MutationError::Lock)
    }
}

// ============================================================================
// SECTION: Rounds
// ============================================================================

/// One applicable registry entry as seen by the convergence loop.
trait RoundStep {
    /// Registry identity.
    fn step_id(&self) -> &MutatorId;

    /// Returns true when the step applies to the object.
    fn applies_to(&self, mutable: &Mutable) -> bool;

    /// Applies the step, returning whether it reported a change.
    fn apply(&self, mutable: &mut Mutable) -> Result<bool, ApplyError>;
}

impl RoundStep for Mutator {
    fn step_id(&self) -> &MutatorId {
        self.id()
    }

    fn applies_to(&self, mutable: &Mutable) -> bool {
        self.matches(mutable)
    }

    fn apply(&self, mutable: &mut Mutable) -> Result<bool, ApplyError> {
        self.mutate(mutable)
    }
}

/// Applies `steps` in order, round after round, until a round is stable.
///
/// A round is stable when no step reported a change and the object equals
/// the round snapshot. The first apply error ends the loop.
fn run_rounds<S: RoundStep + ?Sized>(
    steps: &[&S],
    max_iterations: usize,
    mutable: &mut Mutable,
    mutation_id: &MutationId,
) -> Convergence {
    let mut applied = BTreeSet::new();
    for iteration in 1 ..= max_iterations {
        let snapshot = mutable.object.clone();
        let mut reported = false;
        for step in steps {
            if !step.applies_to(mutable) {
                continue;
            }
            match step.apply(mutable) {
                Ok(true) => {
                    reported = true;
                    applied.insert(step.step_id().to_string());
                }
                Ok(false) => {}
                Err(source) => {
                    let gvk = mutable.object.group_version_kind();
                    return Convergence {
                        iterations: iteration,
                        applied,
                        result: Err(MutationError::MutatorFailed {
                            mutation_id: mutation_id.clone(),
                            mutator: step.step_id().clone(),
                            gvk,
                            namespace: mutable.object.object_namespace().to_string(),
                            name: mutable.object.object_name().to_string(),
                            source,
                        }),
                    };
                }
            }
        }
        if !reported && mutable.object == snapshot {
            return Convergence {
                iterations: iteration,
                applied,
                result: Ok(()),
            };
        }
    }
    Convergence {
        iterations: max_iterations,
        applied,
        result: Err(MutationError::NotConverging {
            mutation_id: mutation_id.clone(),
            gvk: mutable.object.group_version_kind(),
            namespace: mutable.object.object_namespace().to_string(),
            name: mutable.object.object_name().to_string(),
            iterations: max_iterations,
        }),
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new(SystemOptions::default())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
