// crates/trustplane-resilience/src/runtime.rs
// ============================================================================
// Module: Trustplane Resilience Runtime
// Description: Closed-loop self-healing controller.
// Purpose: Wire tracker, engine, damping, breaker, and verifier together.
// Dependencies: crate::{breaker, damping, recovery, tsi, verifier}
// ============================================================================

//! ## Overview
//! The runtime observes interaction outcomes through the TSI tracker, lets
//! the recovery engine select a plan when triggers fire (respecting breaker
//! exclusions and damping cooldowns), applies PID damping to the chosen
//! plan, and closes the loop with post-recovery verification that feeds the
//! circuit breaker and clears rolled-back plans.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use trustplane_core::ReplayResult;

use crate::breaker::CircuitBreaker;
use crate::damping::DampingStabilizer;
use crate::recovery::RecoveryDecision;
use crate::recovery::RecoveryEngine;
use crate::recovery::RecoveryPlan;
use crate::recovery::RecoveryState;
use crate::recovery::SystemStatus;
use crate::tsi::InteractionOutcome;
use crate::tsi::OutcomeStatus;
use crate::tsi::TsiSignal;
use crate::tsi::TsiTracker;
use crate::verifier::PostRecoveryVerifier;
use crate::verifier::VerificationResult;

// ============================================================================
// SECTION: Trust Snapshot
// ============================================================================

/// Minimal live signal bundle used to make recovery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustSnapshot {
    /// Current TSI.
    pub tsi_current: f64,
    /// 15-minute TSI forecast.
    pub tsi_forecast_15m: f64,
    /// Dependency graph density.
    pub der_density: f64,
    /// Provider concentration index.
    pub dep_concentration_index: f64,
    /// Whether the system is degraded.
    pub degraded: bool,
}

// ============================================================================
// SECTION: Resilience Runtime
// ============================================================================

/// Holds all resilience components and orchestrates the recovery loop.
#[derive(Debug, Clone)]
pub struct ResilienceRuntime {
    /// Recovery plan selector.
    pub engine: RecoveryEngine,
    /// Configured recovery plans.
    pub plans: Vec<RecoveryPlan>,
    /// Optional PID damping stabilizer.
    pub damping: Option<DampingStabilizer>,
    /// Per-plan circuit breaker table.
    pub circuit_breaker: CircuitBreaker,
    /// Sliding-window TSI tracker.
    pub tsi_tracker: TsiTracker,
    /// Post-recovery verifier.
    pub verifier: PostRecoveryVerifier,
    /// Whether the loop is enabled.
    pub enabled: bool,
    /// Most recent decision, if any.
    pub last_decision: Option<RecoveryDecision>,
    /// Plan currently applied, if any.
    pub last_applied_plan: Option<RecoveryPlan>,
    /// TSI captured when the last plan was applied.
    pub tsi_at_recovery: Option<f64>,
}

impl ResilienceRuntime {
    /// Creates a runtime from its components.
    #[must_use]
    pub fn new(
        engine: RecoveryEngine,
        plans: Vec<RecoveryPlan>,
        damping: Option<DampingStabilizer>,
        circuit_breaker: CircuitBreaker,
        tsi_tracker: TsiTracker,
        verifier: PostRecoveryVerifier,
        enabled: bool,
    ) -> Self {
        Self {
            engine,
            plans,
            damping,
            circuit_breaker,
            tsi_tracker,
            verifier,
            enabled,
            last_decision: None,
            last_applied_plan: None,
            tsi_at_recovery: None,
        }
    }

    /// Feeds an interaction outcome into the TSI tracker.
    pub fn record_outcome(
        &mut self,
        status: OutcomeStatus,
        validator_agreement: f64,
        latency_ms: u64,
        challenger_fired: bool,
        now: u64,
    ) {
        let recovery_active = self.last_applied_plan.is_some();
        self.tsi_tracker.record(InteractionOutcome {
            timestamp: now,
            status,
            validator_agreement,
            latency_ms,
            challenger_fired,
            recovery_active,
        });
    }

    /// Current TSI signal from the tracker.
    #[must_use]
    pub fn current_signal(&self, now: u64) -> TsiSignal {
        self.tsi_tracker.signal(now)
    }

    /// Computes `(density, concentration)` from active provider weights.
    ///
    /// Concentration is an HHI over normalized weights; density reflects the
    /// interaction edges among providers.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Provider counts are single digits.")]
    pub fn dependency_metrics(provider_weights: &BTreeMap<String, f64>) -> (f64, f64) {
        if provider_weights.is_empty() {
            return (0.0, 1.0);
        }
        let total: f64 = provider_weights.values().sum();
        let total = if total == 0.0 { 1.0 } else { total };
        let hhi: f64 = provider_weights
            .values()
            .map(|weight| {
                let share = weight / total;
                share * share
            })
            .sum();
        let concentration = hhi.clamp(0.0, 1.0);

        let count = provider_weights.len();
        let density = if count <= 1 {
            0.0
        } else {
            (count - 1) as f64 / (count * (count - 1)) as f64
        };
        (density, concentration)
    }

    /// Checks triggers and potentially selects a recovery plan.
    ///
    /// Returns `None` when the loop is disabled or damping is cooling down;
    /// otherwise the decision (with or without a chosen plan).
    pub fn maybe_recover(
        &mut self,
        snapshot: &TrustSnapshot,
        now_ms: u64,
    ) -> Option<RecoveryDecision> {
        if !self.enabled {
            return None;
        }

        let state = RecoveryState {
            tsi_current: snapshot.tsi_current,
            tsi_forecast_15m: snapshot.tsi_forecast_15m,
            der_density: snapshot.der_density,
            concentration_index: snapshot.dep_concentration_index,
            system_status: if snapshot.degraded {
                SystemStatus::Degraded
            } else {
                SystemStatus::Ok
            },
            oscillation_index: 0.0,
        };

        let excluded = self.circuit_breaker.excluded_plans(now_ms / 1000);
        if let Some(damping) = &self.damping {
            if damping.in_cooldown(now_ms) {
                return None;
            }
        }

        let mut decision = self.engine.decide(&state, &self.plans, now_ms, &excluded);

        if let Some(chosen) = decision.chosen.take() {
            let damped = match &mut self.damping {
                Some(damping) => damping.damp_plan(&state, &chosen, &self.engine.targets, now_ms),
                None => chosen,
            };
            self.last_applied_plan = Some(damped.clone());
            self.tsi_at_recovery = Some(snapshot.tsi_current);
            decision.chosen = Some(damped);
        }

        self.last_decision = Some(decision.clone());
        Some(decision)
    }

    /// Verifies that the last applied recovery actually helped.
    ///
    /// Updates the circuit breaker and clears the applied plan when rollback
    /// is recommended.
    pub fn verify_recovery(
        &mut self,
        current_tsi: f64,
        replay_results: &[ReplayResult],
        now: u64,
    ) -> Option<VerificationResult> {
        let plan = self.last_applied_plan.clone()?;
        let tsi_before = self.tsi_at_recovery?;

        let result = self.verifier.verify(&plan, tsi_before, current_tsi, replay_results);

        if result.tsi_improved {
            self.circuit_breaker.record_success(&plan.name, now);
        } else {
            self.circuit_breaker.record_failure(&plan.name, now);
        }

        if result.recommend_rollback {
            self.last_applied_plan = None;
            self.tsi_at_recovery = None;
        }

        Some(result)
    }
}
