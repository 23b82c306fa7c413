// crates/trustplane-resilience/src/events.rs
// ============================================================================
// Module: Trustplane Recovery Ledger Events
// Description: Resilience state transitions emitted into the shared ledger.
// Purpose: Keep every recovery action hash-chained and auditable.
// Dependencies: crate::{breaker, recovery, verifier}, trustplane-core
// ============================================================================

//! ## Overview
//! Every state transition in the resilience plane (trigger, decision,
//! application, verification, rollback, breaker change) lands as a stage
//! event in the same hash-chained ledger the consensus orchestrator writes
//! to, each event carrying its own `prev_hash`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::json;

use trustplane_core::HashAlgorithm;
use trustplane_core::LedgerError;
use trustplane_core::MemoryLedger;

use crate::breaker::BreakerState;
use crate::recovery::RecoveryDecision;
use crate::verifier::VerificationResult;

// ============================================================================
// SECTION: Stage Names
// ============================================================================

/// Stage label for a trigger condition firing.
pub const STAGE_RECOVERY_TRIGGERED: &str = "RECOVERY_TRIGGERED";
/// Stage label for an engine decision.
pub const STAGE_RECOVERY_DECISION: &str = "RECOVERY_DECISION";
/// Stage label for an applied routing patch.
pub const STAGE_RECOVERY_APPLIED: &str = "RECOVERY_APPLIED";
/// Stage label for a post-recovery verification result.
pub const STAGE_RECOVERY_VERIFIED: &str = "RECOVERY_VERIFIED";
/// Stage label for a recommended rollback.
pub const STAGE_RECOVERY_ROLLBACK: &str = "RECOVERY_ROLLBACK";
/// Stage label for a breaker state change.
pub const STAGE_CIRCUIT_BREAKER: &str = "CIRCUIT_BREAKER";

// ============================================================================
// SECTION: Emitters
// ============================================================================

/// Emits a RECOVERY_TRIGGERED event; returns the event hash.
///
/// # Errors
///
/// Returns [`LedgerError`] when the append fails.
pub fn emit_recovery_triggered(
    ledger: &MemoryLedger,
    algorithm: HashAlgorithm,
    run_id: &str,
    epack: &str,
    ts_ms: u64,
    reason: &str,
    tsi_before: f64,
    tsi_forecast: f64,
) -> Result<String, LedgerError> {
    ledger.emit(
        algorithm,
        run_id,
        epack,
        STAGE_RECOVERY_TRIGGERED,
        ts_ms,
        json!({ "reason": reason, "tsi_before": tsi_before, "tsi_forecast": tsi_forecast }),
    )
}

/// Emits a RECOVERY_DECISION event; returns the event hash.
///
/// # Errors
///
/// Returns [`LedgerError`] when the append fails.
pub fn emit_recovery_decision(
    ledger: &MemoryLedger,
    algorithm: HashAlgorithm,
    run_id: &str,
    epack: &str,
    ts_ms: u64,
    decision: &RecoveryDecision,
) -> Result<String, LedgerError> {
    ledger.emit(
        algorithm,
        run_id,
        epack,
        STAGE_RECOVERY_DECISION,
        ts_ms,
        json!(decision),
    )
}

/// Emits a RECOVERY_APPLIED event; returns the event hash.
///
/// # Errors
///
/// Returns [`LedgerError`] when the append fails.
pub fn emit_recovery_applied(
    ledger: &MemoryLedger,
    algorithm: HashAlgorithm,
    run_id: &str,
    epack: &str,
    ts_ms: u64,
    plan_name: &str,
    routing_patch: &serde_json::Value,
) -> Result<String, LedgerError> {
    ledger.emit(
        algorithm,
        run_id,
        epack,
        STAGE_RECOVERY_APPLIED,
        ts_ms,
        json!({ "plan_name": plan_name, "routing_patch": routing_patch }),
    )
}

/// Emits a RECOVERY_VERIFIED event; returns the event hash.
///
/// # Errors
///
/// Returns [`LedgerError`] when the append fails.
pub fn emit_recovery_verified(
    ledger: &MemoryLedger,
    algorithm: HashAlgorithm,
    run_id: &str,
    epack: &str,
    ts_ms: u64,
    verification: &VerificationResult,
) -> Result<String, LedgerError> {
    ledger.emit(
        algorithm,
        run_id,
        epack,
        STAGE_RECOVERY_VERIFIED,
        ts_ms,
        json!(verification),
    )
}

/// Emits a RECOVERY_ROLLBACK event; returns the event hash.
///
/// # Errors
///
/// Returns [`LedgerError`] when the append fails.
pub fn emit_recovery_rollback(
    ledger: &MemoryLedger,
    algorithm: HashAlgorithm,
    run_id: &str,
    epack: &str,
    ts_ms: u64,
    plan_name: &str,
    reasons: &[String],
) -> Result<String, LedgerError> {
    ledger.emit(
        algorithm,
        run_id,
        epack,
        STAGE_RECOVERY_ROLLBACK,
        ts_ms,
        json!({ "plan_name": plan_name, "reasons": reasons }),
    )
}

/// Emits a CIRCUIT_BREAKER event; returns the event hash.
///
/// # Errors
///
/// Returns [`LedgerError`] when the append fails.
pub fn emit_circuit_breaker_event(
    ledger: &MemoryLedger,
    algorithm: HashAlgorithm,
    run_id: &str,
    epack: &str,
    ts_ms: u64,
    plan_name: &str,
    breaker_state: BreakerState,
    consecutive_failures: u32,
) -> Result<String, LedgerError> {
    ledger.emit(
        algorithm,
        run_id,
        epack,
        STAGE_CIRCUIT_BREAKER,
        ts_ms,
        json!({
            "plan_name": plan_name,
            "breaker_state": breaker_state.as_str(),
            "consecutive_failures": consecutive_failures,
        }),
    )
}
