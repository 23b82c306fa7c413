// crates/trustplane-resilience/src/recovery.rs
// ============================================================================
// Module: Trustplane Recovery Engine
// Description: Deterministic recovery plan selection under budget gates.
// Purpose: Pick at most one viable plan per cycle, reproducibly.
// Dependencies: serde, serde_json, trustplane-core
// ============================================================================

//! ## Overview
//! Given trust state and a plan list, the engine decides whether recovery
//! triggers at all, rejects plans that bust latency/cost budgets or sit
//! behind an open circuit breaker, scores the rest, and sorts by
//! `(score desc, predicted_independence_gain desc, tier asc)`; the
//! tie-break order is normative. No network, no model calls, no clock reads:
//! identical inputs always select the identical plan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use trustplane_core::DEFAULT_HASH_ALGORITHM;
use trustplane_core::hashing::stable_hash;

// ============================================================================
// SECTION: Targets and Budgets
// ============================================================================

/// TSI targets governing recovery triggers and scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryTargets {
    /// Target TSI after recovery.
    pub tsi_target: f64,
    /// Minimum acceptable TSI.
    pub tsi_min: f64,
    /// Critical TSI floor.
    pub tsi_critical: f64,
    /// Maximum recovery duration in minutes.
    pub max_recovery_minutes: u32,
}

impl Default for RecoveryTargets {
    fn default() -> Self {
        Self {
            tsi_target: 0.75,
            tsi_min: 0.70,
            tsi_critical: 0.55,
            max_recovery_minutes: 15,
        }
    }
}

/// Resource budgets a plan must fit within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryBudgets {
    /// Maximum predicted added latency.
    pub latency_ms_max: u64,
    /// Maximum predicted added cost.
    pub cost_usd_max: f64,
}

impl Default for RecoveryBudgets {
    fn default() -> Self {
        Self {
            latency_ms_max: 800,
            cost_usd_max: 0.50,
        }
    }
}

// ============================================================================
// SECTION: Plans and State
// ============================================================================

/// Named, immutable recovery plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    /// Plan name (circuit-breaker key).
    pub name: String,
    /// Plan tier (1 cheapest, 3 most disruptive).
    pub tier: u8,
    /// Median predicted TSI after the plan.
    pub predicted_tsi_median: f64,
    /// Low predicted TSI band.
    pub predicted_tsi_low: f64,
    /// High predicted TSI band.
    pub predicted_tsi_high: f64,
    /// Predicted added latency.
    pub predicted_latency_ms: u64,
    /// Predicted added cost.
    pub predicted_cost_usd: f64,
    /// Predicted independence (diversity) gain.
    pub predicted_independence_gain: f64,
    /// Opaque routing patch applied when chosen.
    pub routing_patch: Value,
}

/// Overall system status consulted by the trigger rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    /// Nominal operation.
    #[default]
    Ok,
    /// Degraded operation.
    Degraded,
    /// Active incident.
    Incident,
}

impl SystemStatus {
    /// Canonical wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Incident => "incident",
        }
    }
}

/// Trust state snapshot the engine decides over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryState {
    /// Current TSI.
    pub tsi_current: f64,
    /// 15-minute TSI forecast.
    pub tsi_forecast_15m: f64,
    /// Dependency graph density.
    pub der_density: f64,
    /// Provider concentration index (HHI).
    pub concentration_index: f64,
    /// Overall system status.
    pub system_status: SystemStatus,
    /// Recent TSI volatility.
    pub oscillation_index: f64,
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// One plan's evaluation inside a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedPlan {
    /// The plan evaluated.
    pub plan: RecoveryPlan,
    /// Score when viable.
    pub score: Option<f64>,
    /// Rejection reason when not viable.
    pub rejected: Option<String>,
}

/// Result of one recovery decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryDecision {
    /// Deterministic decision identifier.
    pub decision_id: String,
    /// Caller-supplied decision time in unix milliseconds.
    pub timestamp_ms: u64,
    /// Trigger (or no-trigger) reason chain.
    pub reason: String,
    /// TSI at decision time.
    pub tsi_before: f64,
    /// TSI forecast at decision time.
    pub tsi_forecast: f64,
    /// Every plan's evaluation.
    pub evaluated: Vec<EvaluatedPlan>,
    /// Chosen plan, if any.
    pub chosen: Option<RecoveryPlan>,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Deterministic recovery plan selector.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryEngine {
    /// Resource budgets.
    pub budgets: RecoveryBudgets,
    /// TSI targets.
    pub targets: RecoveryTargets,
    /// Diversity bonus weight.
    pub diversity_bonus_weight: f64,
    /// Latency penalty weight per millisecond.
    pub penalty_latency_weight: f64,
    /// Cost penalty weight per dollar.
    pub penalty_cost_weight: f64,
    /// Penalty weight for predicted-low undershoot of the minimum.
    pub confidence_low_penalty_weight: f64,
    /// Per-tier score penalties.
    pub tier_penalties: BTreeMap<u8, f64>,
}

impl RecoveryEngine {
    /// Creates an engine with the default scoring weights.
    #[must_use]
    pub fn new(budgets: RecoveryBudgets, targets: RecoveryTargets) -> Self {
        let mut tier_penalties = BTreeMap::new();
        tier_penalties.insert(1, 0.00);
        tier_penalties.insert(2, 0.05);
        tier_penalties.insert(3, 0.12);
        Self {
            budgets,
            targets,
            diversity_bonus_weight: 0.15,
            penalty_latency_weight: 0.0005,
            penalty_cost_weight: 0.25,
            confidence_low_penalty_weight: 0.30,
            tier_penalties,
        }
    }

    /// Whether recovery triggers at all, with the reason chain.
    #[must_use]
    pub fn should_trigger(&self, state: &RecoveryState) -> (bool, String) {
        match state.system_status {
            SystemStatus::Degraded | SystemStatus::Incident => {
                return (
                    true,
                    format!("triggered:system_status={}", state.system_status.as_str()),
                );
            }
            SystemStatus::Ok => {}
        }
        if state.tsi_forecast_15m < self.targets.tsi_min {
            return (true, format!("triggered:tsi_forecast_15m<{:.2}", self.targets.tsi_min));
        }
        if state.concentration_index >= 0.70 && state.tsi_forecast_15m < self.targets.tsi_target {
            return (true, "triggered:concentration_high+tsi_below_target".to_string());
        }
        (false, "no_trigger".to_string())
    }

    /// Selects the best viable plan; breaker-excluded plans are skipped.
    #[must_use]
    pub fn decide(
        &self,
        state: &RecoveryState,
        plans: &[RecoveryPlan],
        now_ms: u64,
        excluded_plans: &BTreeSet<String>,
    ) -> RecoveryDecision {
        let (triggered, reason) = self.should_trigger(state);
        let decision_id = decision_id(state, now_ms);

        if !triggered {
            return RecoveryDecision {
                decision_id,
                timestamp_ms: now_ms,
                reason,
                tsi_before: state.tsi_current,
                tsi_forecast: state.tsi_forecast_15m,
                evaluated: Vec::new(),
                chosen: None,
            };
        }

        let mut viable: Vec<(f64, RecoveryPlan)> = Vec::new();
        let mut evaluated: Vec<EvaluatedPlan> = Vec::with_capacity(plans.len());

        for plan in plans {
            if excluded_plans.contains(&plan.name) {
                evaluated.push(EvaluatedPlan {
                    plan: plan.clone(),
                    score: None,
                    rejected: Some("circuit_breaker_open".to_string()),
                });
                continue;
            }
            if plan.predicted_latency_ms > self.budgets.latency_ms_max {
                evaluated.push(EvaluatedPlan {
                    plan: plan.clone(),
                    score: None,
                    rejected: Some("latency_budget".to_string()),
                });
                continue;
            }
            if plan.predicted_cost_usd > self.budgets.cost_usd_max {
                evaluated.push(EvaluatedPlan {
                    plan: plan.clone(),
                    score: None,
                    rejected: Some("cost_budget".to_string()),
                });
                continue;
            }

            let score = self.score_plan(state, plan);
            evaluated.push(EvaluatedPlan {
                plan: plan.clone(),
                score: Some(score),
                rejected: None,
            });
            viable.push((score, plan.clone()));
        }

        if viable.is_empty() {
            return RecoveryDecision {
                decision_id,
                timestamp_ms: now_ms,
                reason: format!("{reason}|no_viable_plans"),
                tsi_before: state.tsi_current,
                tsi_forecast: state.tsi_forecast_15m,
                evaluated,
                chosen: None,
            };
        }

        viable.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    b.1.predicted_independence_gain
                        .partial_cmp(&a.1.predicted_independence_gain)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.1.tier.cmp(&b.1.tier))
        });
        let chosen = viable[0].1.clone();

        RecoveryDecision {
            decision_id,
            timestamp_ms: now_ms,
            reason,
            tsi_before: state.tsi_current,
            tsi_forecast: state.tsi_forecast_15m,
            evaluated,
            chosen: Some(chosen),
        }
    }

    /// Scores a viable plan against the current state.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Latency budgets are far below 2^52.")]
    pub fn score_plan(&self, state: &RecoveryState, plan: &RecoveryPlan) -> f64 {
        let gain = (plan.predicted_tsi_median - state.tsi_current).max(0.0);
        let low_risk = (self.targets.tsi_min - plan.predicted_tsi_low).max(0.0);
        let confidence_pen = self.confidence_low_penalty_weight * low_risk;
        let latency_pen = self.penalty_latency_weight * plan.predicted_latency_ms as f64;
        let cost_pen = self.penalty_cost_weight * plan.predicted_cost_usd;
        let tier_pen = self.tier_penalties.get(&plan.tier).copied().unwrap_or(0.1);
        let diversity_bonus = self.diversity_bonus_weight * plan.predicted_independence_gain;
        let osc_pen =
            if state.oscillation_index > 0.15 && plan.tier >= 3 { 0.10 } else { 0.0 };
        gain + diversity_bonus - (latency_pen + cost_pen + confidence_pen + tier_pen + osc_pen)
    }
}

/// Deterministic decision identifier derived from the inputs.
fn decision_id(state: &RecoveryState, now_ms: u64) -> String {
    stable_hash(
        DEFAULT_HASH_ALGORITHM,
        &json!({
            "now_ms": now_ms,
            "tsi_current": state.tsi_current,
            "tsi_forecast_15m": state.tsi_forecast_15m,
            "system_status": state.system_status.as_str(),
        }),
    )
    .map_or_else(|_| String::new(), |hash| hash[..16].to_string())
}
