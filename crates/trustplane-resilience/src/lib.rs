// crates/trustplane-resilience/src/lib.rs
// ============================================================================
// Module: Trustplane Resilience Library
// Description: Closed-loop trust-degradation detection and recovery.
// Purpose: Expose the TSI tracker, recovery stack, and meta-validation.
// Dependencies: crate::{breaker, compiler, damping, events, mvi, ...}
// ============================================================================

//! ## Overview
//! The resilience control plane tracks a bounded Trust-Signal Index over
//! recent interaction outcomes, deterministically selects recovery plans
//! when trust degrades, damps rollout with a PID stabilizer, guards plans
//! with per-plan circuit breakers, verifies recoveries after the fact, and
//! scores the whole loop with the Meta-Validation Index. Every transition
//! emits into the shared hash-chained ledger.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod breaker;
pub mod compiler;
pub mod damping;
pub mod events;
pub mod mvi;
pub mod recovery;
pub mod runtime;
pub mod tsi;
pub mod verifier;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use breaker::BreakerConfig;
pub use breaker::BreakerState;
pub use breaker::CircuitBreaker;
pub use breaker::PlanBreaker;
pub use compiler::CompiledResilience;
pub use compiler::compile_resilience_policy;
pub use damping::DampingHints;
pub use damping::DampingStabilizer;
pub use damping::PidParams;
pub use mvi::MetaValidationIndex;
pub use mvi::MviResult;
pub use recovery::EvaluatedPlan;
pub use recovery::RecoveryBudgets;
pub use recovery::RecoveryDecision;
pub use recovery::RecoveryEngine;
pub use recovery::RecoveryPlan;
pub use recovery::RecoveryState;
pub use recovery::RecoveryTargets;
pub use recovery::SystemStatus;
pub use runtime::ResilienceRuntime;
pub use runtime::TrustSnapshot;
pub use tsi::InteractionOutcome;
pub use tsi::OutcomeStatus;
pub use tsi::TsiSignal;
pub use tsi::TsiTracker;
pub use verifier::PostRecoveryVerifier;
pub use verifier::VerificationConfig;
pub use verifier::VerificationResult;
