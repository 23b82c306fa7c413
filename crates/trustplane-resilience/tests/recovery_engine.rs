// crates/trustplane-resilience/tests/recovery_engine.rs
// ============================================================================
// Module: Recovery Engine Tests
// Description: Trigger rules, budget gates, scoring, determinism.
// ============================================================================
//! ## Overview
//! Identical inputs must select the identical plan every time; triggers,
//! budget rejections, breaker exclusions, and the normative tie-break order
//! are all exercised directly.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeSet;

use serde_json::json;
use trustplane_resilience::RecoveryBudgets;
use trustplane_resilience::RecoveryEngine;
use trustplane_resilience::RecoveryPlan;
use trustplane_resilience::RecoveryState;
use trustplane_resilience::RecoveryTargets;
use trustplane_resilience::SystemStatus;

/// A plan with the given name, tier, and predicted effect.
fn plan(name: &str, tier: u8, median: f64, independence: f64) -> RecoveryPlan {
    RecoveryPlan {
        name: name.to_string(),
        tier,
        predicted_tsi_median: median,
        predicted_tsi_low: median - 0.05,
        predicted_tsi_high: median + 0.05,
        predicted_latency_ms: 200,
        predicted_cost_usd: 0.01,
        predicted_independence_gain: independence,
        routing_patch: json!({ "weights": { "mock": 1.0 } }),
    }
}

/// A degraded state that always triggers recovery.
const fn degraded_state() -> RecoveryState {
    RecoveryState {
        tsi_current: 0.60,
        tsi_forecast_15m: 0.58,
        der_density: 0.2,
        concentration_index: 0.4,
        system_status: SystemStatus::Ok,
        oscillation_index: 0.0,
    }
}

/// A default engine.
fn engine() -> RecoveryEngine {
    RecoveryEngine::new(RecoveryBudgets::default(), RecoveryTargets::default())
}

/// A healthy forecast does not trigger.
#[test]
fn healthy_state_does_not_trigger() {
    let state = RecoveryState {
        tsi_current: 0.85,
        tsi_forecast_15m: 0.84,
        der_density: 0.1,
        concentration_index: 0.2,
        system_status: SystemStatus::Ok,
        oscillation_index: 0.0,
    };
    let (triggered, reason) = engine().should_trigger(&state);
    assert!(!triggered);
    assert_eq!(reason, "no_trigger");
}

/// System degradation triggers regardless of TSI.
#[test]
fn degraded_status_triggers() {
    let state = RecoveryState {
        system_status: SystemStatus::Degraded,
        tsi_current: 0.90,
        tsi_forecast_15m: 0.90,
        der_density: 0.1,
        concentration_index: 0.1,
        oscillation_index: 0.0,
    };
    let (triggered, reason) = engine().should_trigger(&state);
    assert!(triggered);
    assert!(reason.contains("system_status=degraded"));
}

/// A low forecast triggers against the minimum target.
#[test]
fn low_forecast_triggers() {
    let (triggered, reason) = engine().should_trigger(&degraded_state());
    assert!(triggered);
    assert!(reason.contains("tsi_forecast_15m"));
}

/// High concentration with a below-target forecast triggers.
#[test]
fn concentration_with_soft_forecast_triggers() {
    let state = RecoveryState {
        tsi_current: 0.74,
        tsi_forecast_15m: 0.72,
        der_density: 0.1,
        concentration_index: 0.75,
        system_status: SystemStatus::Ok,
        oscillation_index: 0.0,
    };
    let (triggered, reason) = engine().should_trigger(&state);
    assert!(triggered);
    assert_eq!(reason, "triggered:concentration_high+tsi_below_target");
}

/// S8: five runs with identical inputs choose the identical plan.
#[test]
fn decision_is_deterministic_across_trials() {
    let engine = engine();
    let plans =
        vec![plan("plan_a", 1, 0.74, 0.1), plan("plan_b", 2, 0.78, 0.2), plan("plan_c", 3, 0.80, 0.3)];
    let mut chosen = Vec::new();
    for _ in 0..5 {
        let decision = engine.decide(&degraded_state(), &plans, 1_000_000, &BTreeSet::new());
        chosen.push(decision.chosen.expect("chosen").name);
    }
    chosen.dedup();
    assert_eq!(chosen.len(), 1);
}

/// Budget-busting plans are rejected with reasons, not scored.
#[test]
fn budget_violations_are_rejected() {
    let engine = engine();
    let mut slow = plan("slow", 1, 0.90, 0.5);
    slow.predicted_latency_ms = 5_000;
    let mut pricey = plan("pricey", 1, 0.90, 0.5);
    pricey.predicted_cost_usd = 2.0;
    let affordable = plan("affordable", 1, 0.74, 0.1);

    let decision = engine.decide(
        &degraded_state(),
        &[slow, pricey, affordable],
        1_000_000,
        &BTreeSet::new(),
    );
    assert_eq!(decision.chosen.expect("chosen").name, "affordable");

    let rejected: Vec<(&str, &str)> = decision
        .evaluated
        .iter()
        .filter_map(|entry| {
            entry.rejected.as_deref().map(|reason| (entry.plan.name.as_str(), reason))
        })
        .collect();
    assert!(rejected.contains(&("slow", "latency_budget")));
    assert!(rejected.contains(&("pricey", "cost_budget")));
}

/// Breaker-excluded plans are skipped even when they score best.
#[test]
fn excluded_plans_are_skipped() {
    let engine = engine();
    let plans = vec![plan("best", 1, 0.90, 0.5), plan("fallback", 1, 0.74, 0.1)];
    let mut excluded = BTreeSet::new();
    excluded.insert("best".to_string());

    let decision = engine.decide(&degraded_state(), &plans, 1_000_000, &excluded);
    assert_eq!(decision.chosen.expect("chosen").name, "fallback");
    let entry = decision
        .evaluated
        .iter()
        .find(|entry| entry.plan.name == "best")
        .expect("entry");
    assert_eq!(entry.rejected.as_deref(), Some("circuit_breaker_open"));
}

/// With no viable plan the decision reports the reason chain.
#[test]
fn no_viable_plans_reports_reason() {
    let engine = engine();
    let mut unaffordable = plan("only", 1, 0.90, 0.5);
    unaffordable.predicted_cost_usd = 9.0;
    let decision =
        engine.decide(&degraded_state(), &[unaffordable], 1_000_000, &BTreeSet::new());
    assert!(decision.chosen.is_none());
    assert!(decision.reason.ends_with("|no_viable_plans"));
}

/// Equal scores tie-break on independence gain, then lower tier.
#[test]
fn tiebreak_order_is_normative() {
    // Zero the diversity weight so independence influences only the
    // tie-break, making the primary scores exactly equal.
    let mut engine = engine();
    engine.diversity_bonus_weight = 0.0;

    let low_ind = plan("low_ind", 1, 0.78, 0.10);
    let high_ind = plan("high_ind", 1, 0.78, 0.30);
    let score_low = engine.score_plan(&degraded_state(), &low_ind);
    let score_high = engine.score_plan(&degraded_state(), &high_ind);
    assert!((score_low - score_high).abs() < f64::EPSILON);

    let decision = engine.decide(
        &degraded_state(),
        &[low_ind, high_ind],
        1_000_000,
        &BTreeSet::new(),
    );
    assert_eq!(decision.chosen.expect("chosen").name, "high_ind");

    // Equal score and equal independence fall back to the lower tier.
    engine.tier_penalties.insert(1, 0.0);
    engine.tier_penalties.insert(2, 0.0);
    let tier_two = plan("tier_two", 2, 0.78, 0.10);
    let tier_one = plan("tier_one", 1, 0.78, 0.10);
    let decision = engine.decide(
        &degraded_state(),
        &[tier_two, tier_one],
        1_000_000,
        &BTreeSet::new(),
    );
    assert_eq!(decision.chosen.expect("chosen").name, "tier_one");
}

/// Oscillation penalizes tier-3 plans only.
#[test]
fn oscillation_penalizes_high_tiers() {
    let engine = engine();
    let calm = degraded_state();
    let oscillating = RecoveryState {
        oscillation_index: 0.20,
        ..calm
    };
    let tier3 = plan("tier3", 3, 0.80, 0.2);
    let tier1 = plan("tier1", 1, 0.80, 0.2);

    let calm_score = engine.score_plan(&calm, &tier3);
    let oscillating_score = engine.score_plan(&oscillating, &tier3);
    assert!((calm_score - oscillating_score - 0.10).abs() < 1e-9);

    let tier1_calm = engine.score_plan(&calm, &tier1);
    let tier1_osc = engine.score_plan(&oscillating, &tier1);
    assert!((tier1_calm - tier1_osc).abs() < 1e-12);
}
