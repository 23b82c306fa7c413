// crates/trustplane-resilience/tests/runtime_loop.rs
// ============================================================================
// Module: Resilience Runtime Tests
// Description: Closed-loop recovery selection, verification, rollback.
// ============================================================================
//! ## Overview
//! The runtime wires tracker, engine, damping, breaker, and verifier: a
//! degraded snapshot selects and damps a plan, verification updates the
//! breaker, and a recommended rollback clears the applied plan.

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

use std::collections::BTreeMap;

use serde_json::json;
use trustplane_resilience::BreakerConfig;
use trustplane_resilience::BreakerState;
use trustplane_resilience::CircuitBreaker;
use trustplane_resilience::DampingStabilizer;
use trustplane_resilience::OutcomeStatus;
use trustplane_resilience::PidParams;
use trustplane_resilience::PostRecoveryVerifier;
use trustplane_resilience::RecoveryBudgets;
use trustplane_resilience::RecoveryEngine;
use trustplane_resilience::RecoveryPlan;
use trustplane_resilience::RecoveryTargets;
use trustplane_resilience::ResilienceRuntime;
use trustplane_resilience::TrustSnapshot;
use trustplane_resilience::TsiTracker;
use trustplane_resilience::VerificationConfig;

/// A single-plan runtime with damping enabled.
fn runtime() -> ResilienceRuntime {
    let targets = RecoveryTargets::default();
    ResilienceRuntime::new(
        RecoveryEngine::new(RecoveryBudgets::default(), targets),
        vec![RecoveryPlan {
            name: "plan_a".to_string(),
            tier: 1,
            predicted_tsi_median: 0.78,
            predicted_tsi_low: 0.72,
            predicted_tsi_high: 0.82,
            predicted_latency_ms: 200,
            predicted_cost_usd: 0.01,
            predicted_independence_gain: 0.2,
            routing_patch: json!({}),
        }],
        Some(DampingStabilizer::new(PidParams::default(), 0.15, 60)),
        CircuitBreaker::new(BreakerConfig::default()),
        TsiTracker::new(20),
        PostRecoveryVerifier::new(VerificationConfig::default(), targets),
        true,
    )
}

/// A degraded trust snapshot that triggers recovery.
const fn degraded_snapshot() -> TrustSnapshot {
    TrustSnapshot {
        tsi_current: 0.60,
        tsi_forecast_15m: 0.58,
        der_density: 0.1,
        dep_concentration_index: 0.4,
        degraded: false,
    }
}

/// Outcomes feed the tracker and surface in the signal.
#[test]
fn outcomes_feed_the_tracker() {
    let mut runtime = runtime();
    for index in 0..6_u64 {
        runtime.record_outcome(OutcomeStatus::Error, 0.2, 100, false, 1_000 + index);
    }
    let signal = runtime.current_signal(1_006);
    assert!(signal.tsi_current < 0.5);
    assert_eq!(signal.window_size, 6);
}

/// A degraded snapshot selects, damps, and remembers the plan.
#[test]
fn degraded_snapshot_selects_and_damps() {
    let mut runtime = runtime();
    let decision = runtime.maybe_recover(&degraded_snapshot(), 100_000).expect("decision");
    let chosen = decision.chosen.expect("chosen");
    assert_eq!(chosen.name, "plan_a");
    assert!(chosen.routing_patch["rds"]["canary_pct"].is_number());
    assert!(runtime.last_applied_plan.is_some());
    assert_eq!(runtime.tsi_at_recovery, Some(0.60));
}

/// The damping cooldown suppresses back-to-back decisions.
#[test]
fn cooldown_suppresses_next_decision() {
    let mut runtime = runtime();
    assert!(runtime.maybe_recover(&degraded_snapshot(), 100_000).is_some());
    assert!(runtime.maybe_recover(&degraded_snapshot(), 100_000 + 30_000).is_none());
    assert!(runtime.maybe_recover(&degraded_snapshot(), 100_000 + 61_000).is_some());
}

/// A disabled runtime never decides.
#[test]
fn disabled_runtime_never_decides() {
    let mut runtime = runtime();
    runtime.enabled = false;
    assert!(runtime.maybe_recover(&degraded_snapshot(), 100_000).is_none());
}

/// Successful verification records a breaker success and keeps the plan.
#[test]
fn improvement_records_breaker_success() {
    let mut runtime = runtime();
    runtime.maybe_recover(&degraded_snapshot(), 100_000);
    let result = runtime.verify_recovery(0.75, &[], 200).expect("verification");
    assert!(result.tsi_improved);
    assert!(!result.recommend_rollback);
    assert_eq!(runtime.circuit_breaker.plan_state("plan_a"), Some(BreakerState::Closed));
    assert!(runtime.last_applied_plan.is_some());
}

/// A failed recovery records a breaker failure and rolls back the plan.
#[test]
fn rollback_clears_applied_plan() {
    let mut runtime = runtime();
    runtime.maybe_recover(&degraded_snapshot(), 100_000);
    let result = runtime.verify_recovery(0.50, &[], 200).expect("verification");
    assert!(result.recommend_rollback);
    assert!(runtime.last_applied_plan.is_none());
    assert!(runtime.tsi_at_recovery.is_none());
    let snapshot = runtime.circuit_breaker.state_snapshot();
    assert_eq!(snapshot[0].total_failures, 1);
}

/// Verification without an applied plan is a no-op.
#[test]
fn verification_without_plan_is_none() {
    let mut runtime = runtime();
    assert!(runtime.verify_recovery(0.80, &[], 200).is_none());
}

/// Dependency metrics compute HHI concentration and edge density.
#[test]
fn dependency_metrics_compute_hhi() {
    let mut weights = BTreeMap::new();
    weights.insert("alpha".to_string(), 0.5);
    weights.insert("beta".to_string(), 0.5);
    let (density, concentration) = ResilienceRuntime::dependency_metrics(&weights);
    assert!((concentration - 0.5).abs() < 1e-9);
    assert!(density > 0.0);

    let empty: BTreeMap<String, f64> = BTreeMap::new();
    assert_eq!(ResilienceRuntime::dependency_metrics(&empty), (0.0, 1.0));

    let mut solo = BTreeMap::new();
    solo.insert("alpha".to_string(), 1.0);
    let (solo_density, solo_concentration) = ResilienceRuntime::dependency_metrics(&solo);
    assert!((solo_concentration - 1.0).abs() < 1e-9);
    assert!((solo_density - 0.0).abs() < 1e-9);
}
