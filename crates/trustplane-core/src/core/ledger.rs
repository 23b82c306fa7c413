// crates/trustplane-core/src/core/ledger.rs
// ============================================================================
// Module: Trustplane Stage-Event Ledger
// Description: Hash-chained stage events for consensus and resilience.
// Purpose: Record pipeline boundaries in a shared tamper-evident stream.
// Dependencies: crate::core::hashing, serde, serde_json
// ============================================================================

//! ## Overview
//! The consensus orchestrator and the resilience control plane append stage
//! events (`start`, `primary.raw`, `RECOVERY_DECISION`, ...) into one
//! hash-chained ledger. Every event carries its own `event_hash` over the
//! core fields and the `prev_hash` of the event it follows, so a reader can
//! verify any prefix independently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;
use crate::core::hashing::stable_hash;
use crate::interfaces::LedgerError;
use crate::interfaces::LedgerSink;

// ============================================================================
// SECTION: Stage Event
// ============================================================================

/// One hash-chained pipeline stage event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// Run identifier the event belongs to.
    pub run_id: String,
    /// EPACK identifier anchoring the event.
    pub epack: String,
    /// Stage label (e.g. `primary.raw`, `RECOVERY_DECISION`).
    pub stage: String,
    /// Wall-clock milliseconds when the event was emitted.
    pub ts_ms: u64,
    /// Stage payload.
    pub payload: Value,
    /// Hash over `{run_id, epack, stage, ts_ms, payload}`.
    pub event_hash: String,
    /// Hash of the preceding ledger event, if any.
    pub prev_hash: Option<String>,
}

/// Builds a stage event with its hash computed over the core fields.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn new_stage_event(
    algorithm: HashAlgorithm,
    run_id: &str,
    epack: &str,
    stage: &str,
    ts_ms: u64,
    payload: Value,
    prev_hash: Option<String>,
) -> Result<StageEvent, HashError> {
    let event_hash = stable_hash(
        algorithm,
        &json!({
            "run_id": run_id,
            "epack": epack,
            "stage": stage,
            "ts_ms": ts_ms,
            "payload": payload,
        }),
    )?;
    Ok(StageEvent {
        run_id: run_id.to_string(),
        epack: epack.to_string(),
        stage: stage.to_string(),
        ts_ms,
        payload,
        event_hash,
        prev_hash,
    })
}

// ============================================================================
// SECTION: In-Memory Ledger
// ============================================================================

/// Concurrent-safe in-memory ledger that auto-chains `prev_hash`.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    /// Appended events, oldest first.
    events: Mutex<Vec<StageEvent>>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds, chains, and appends a stage event; returns its hash.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when hashing fails or the lock is poisoned.
    pub fn emit(
        &self,
        algorithm: HashAlgorithm,
        run_id: &str,
        epack: &str,
        stage: &str,
        ts_ms: u64,
        payload: Value,
    ) -> Result<String, LedgerError> {
        let mut events =
            self.events.lock().map_err(|_| LedgerError::Append("ledger lock poisoned".into()))?;
        let prev_hash = events.last().map(|event| event.event_hash.clone());
        let event = new_stage_event(algorithm, run_id, epack, stage, ts_ms, payload, prev_hash)
            .map_err(|err| LedgerError::Append(err.to_string()))?;
        let event_hash = event.event_hash.clone();
        events.push(event);
        Ok(event_hash)
    }

    /// Snapshot of all appended events.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<StageEvent>, LedgerError> {
        self.events
            .lock()
            .map(|events| events.clone())
            .map_err(|_| LedgerError::Append("ledger lock poisoned".into()))
    }

    /// Hash of the most recent event, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the lock is poisoned.
    pub fn head_hash(&self) -> Result<Option<String>, LedgerError> {
        self.events
            .lock()
            .map(|events| events.last().map(|event| event.event_hash.clone()))
            .map_err(|_| LedgerError::Append("ledger lock poisoned".into()))
    }
}

impl LedgerSink for MemoryLedger {
    fn append(&self, event: &StageEvent) -> Result<(), LedgerError> {
        let mut events =
            self.events.lock().map_err(|_| LedgerError::Append("ledger lock poisoned".into()))?;
        events.push(event.clone());
        Ok(())
    }
}
