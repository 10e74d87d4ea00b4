// crates/mutation-gate-core/src/runtime/correlation.rs
// ============================================================================
// Module: Mutation Correlation IDs
// Description: Boot-scoped generator for per-call mutation identifiers.
// Purpose: Tie log lines and annotations for one admission event together.
// Dependencies: crate::core, rand
// ============================================================================

//! ## Overview
//! Identifiers combine a random boot identifier with a monotonic counter, so
//! they are unique within a process and unlikely to collide across restarts.
//! They carry no semantics; mutation never depends on their value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::RngCore;
use rand::rngs::OsRng;

use crate::core::MutationId;

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Prefix of every generated mutation identifier.
pub const MUTATION_ID_PREFIX: &str = "mut";

/// Boot-scoped mutation ID generator.
///
/// # Invariants
/// - Issued identifiers are unique within the process lifetime.
#[derive(Debug)]
pub struct MutationIdGenerator {
    /// Boot-scoped random identifier for entropy.
    boot_id: u64,
    /// Monotonic counter for IDs issued in this process.
    counter: AtomicU64,
}

impl MutationIdGenerator {
    /// Creates a generator seeded from the OS random source.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self {
            boot_id: u64::from_be_bytes(bytes),
            counter: AtomicU64::new(1),
        }
    }

    /// Issues a new mutation ID.
    #[must_use]
    pub fn issue(&self) -> MutationId {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        MutationId::new(format!("{MUTATION_ID_PREFIX}-{:016x}-{seq:016x}", self.boot_id))
    }
}

impl Default for MutationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
