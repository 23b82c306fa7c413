// crates/trustplane-resilience/src/damping.rs
// ============================================================================
// Module: Trustplane Damping Stabilizer
// Description: PID-damped canary rollout sizing for recovery plans.
// Purpose: Reduce recovery overshoot and oscillation, conservatively.
// Dependencies: crate::recovery, serde, serde_json
// ============================================================================

//! ## Overview
//! For a chosen plan the stabilizer computes the PID control value over the
//! forecast shortfall, maps it to a canary rollout percentage in
//! [0.15, 1.0], bumps it under critical forecasts or high concentration,
//! shrinks it under oscillation, and injects `{canary_pct,
//! cooldown_seconds}` under the plan's `routing_patch.rds`. A cooldown
//! interval suppresses subsequent decisions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::recovery::RecoveryPlan;
use crate::recovery::RecoveryState;
use crate::recovery::RecoveryTargets;

// ============================================================================
// SECTION: PID Parameters
// ============================================================================

/// PID gains and wind-up cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidParams {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain.
    pub ki: f64,
    /// Derivative gain.
    pub kd: f64,
    /// Integral wind-up cap (absolute).
    pub integral_cap: f64,
}

impl Default for PidParams {
    fn default() -> Self {
        Self {
            kp: 0.5,
            ki: 0.2,
            kd: 0.1,
            integral_cap: 2.0,
        }
    }
}

/// Damping hints injected into the routing patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DampingHints {
    /// Canary rollout percentage in [0.15, 1.0].
    pub canary_pct: f64,
    /// Cooldown before the next recovery decision.
    pub cooldown_seconds: u64,
    /// Hint provenance note.
    pub note: String,
}

// ============================================================================
// SECTION: Stabilizer
// ============================================================================

/// PID-inspired damping for recovery rollout velocity.
#[derive(Debug, Clone, PartialEq)]
pub struct DampingStabilizer {
    /// PID parameters.
    pid: PidParams,
    /// Oscillation ceiling before rollout is slowed.
    max_oscillation: f64,
    /// Cooldown between applied recoveries.
    cooldown_seconds: u64,
    /// Integral accumulator (capped).
    integral: f64,
    /// Previous cycle's error.
    prev_error: f64,
    /// Unix milliseconds of the last applied damping.
    last_applied_ms: u64,
}

impl DampingStabilizer {
    /// Creates a stabilizer.
    #[must_use]
    pub const fn new(pid: PidParams, max_oscillation: f64, cooldown_seconds: u64) -> Self {
        Self {
            pid,
            max_oscillation,
            cooldown_seconds,
            integral: 0.0,
            prev_error: 0.0,
            last_applied_ms: 0,
        }
    }

    /// Whether the cooldown interval still suppresses decisions.
    #[must_use]
    pub const fn in_cooldown(&self, now_ms: u64) -> bool {
        self.last_applied_ms != 0
            && now_ms.saturating_sub(self.last_applied_ms) < self.cooldown_seconds * 1000
    }

    /// Returns the plan with PID-damped rollout hints injected.
    #[must_use]
    pub fn damp_plan(
        &mut self,
        state: &RecoveryState,
        plan: &RecoveryPlan,
        targets: &RecoveryTargets,
        now_ms: u64,
    ) -> RecoveryPlan {
        let error = (targets.tsi_target - state.tsi_forecast_15m).max(0.0);

        self.integral =
            (self.integral + error).clamp(-self.pid.integral_cap, self.pid.integral_cap);
        let derivative = error - self.prev_error;
        self.prev_error = error;
        let control =
            self.pid.kp * error + self.pid.ki * self.integral + self.pid.kd * derivative;

        let mut canary = 0.15 + control.clamp(0.0, 0.85);
        if state.concentration_index >= 0.75 || state.tsi_forecast_15m < targets.tsi_critical {
            canary = (canary + 0.15).min(1.0);
        }
        if state.oscillation_index > self.max_oscillation {
            canary = (canary * 0.8).max(0.15);
        }
        canary = canary.clamp(0.15, 1.0);

        let hints = DampingHints {
            canary_pct: (canary * 1000.0).round() / 1000.0,
            cooldown_seconds: self.cooldown_seconds,
            note: "pid_damped".to_string(),
        };
        self.last_applied_ms = now_ms;

        let mut patch = plan
            .routing_patch
            .as_object()
            .cloned()
            .unwrap_or_else(Map::new);
        let mut rds = patch.get("rds").and_then(Value::as_object).cloned().unwrap_or_default();
        rds.insert("canary_pct".to_string(), json!(hints.canary_pct));
        rds.insert("cooldown_seconds".to_string(), json!(hints.cooldown_seconds));
        rds.insert("note".to_string(), json!(hints.note));
        patch.insert("rds".to_string(), Value::Object(rds));

        let mut damped = plan.clone();
        damped.routing_patch = Value::Object(patch);
        damped
    }

    /// Resets PID state (manual override / break-glass).
    pub const fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.last_applied_ms = 0;
    }
}
