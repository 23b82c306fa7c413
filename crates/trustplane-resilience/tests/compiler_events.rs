// crates/trustplane-resilience/tests/compiler_events.rs
// ============================================================================
// Module: Policy Compiler and Ledger Event Tests
// Description: DSL compilation into a runtime and hash-chained events.
// ============================================================================
//! ## Overview
//! The compiler turns the `resilience_policy` block into a working runtime
//! (collecting shape errors instead of aborting), and recovery events land
//! in the shared ledger with their own hash chain.

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

use serde_json::json;
use trustplane_config::PlanPrediction;
use trustplane_config::PlanSpec;
use trustplane_config::ResiliencePolicy;
use trustplane_core::HashAlgorithm;
use trustplane_core::MemoryLedger;
use trustplane_resilience::BreakerState;
use trustplane_resilience::TrustSnapshot;
use trustplane_resilience::compile_resilience_policy;
use trustplane_resilience::events::emit_circuit_breaker_event;
use trustplane_resilience::events::emit_recovery_rollback;
use trustplane_resilience::events::emit_recovery_triggered;

/// An enabled policy with one tier-1 plan.
fn enabled_policy() -> ResiliencePolicy {
    let mut policy = ResiliencePolicy {
        enabled: true,
        ..ResiliencePolicy::default()
    };
    policy.plans.tier_1.push(PlanSpec {
        name: "rebalance_providers".to_string(),
        predicted: PlanPrediction {
            tsi_median: 0.78,
            tsi_low: 0.72,
            tsi_high: 0.82,
            latency_ms: 200,
            cost_usd: 0.01,
            independence_gain: 0.25,
        },
        routing_patch: json!({ "weights": { "mock": 0.6 } }),
    });
    policy
}

/// A disabled policy compiles to no runtime with no errors.
#[test]
fn disabled_policy_compiles_to_none() {
    let compiled = compile_resilience_policy(&ResiliencePolicy::default());
    assert!(!compiled.enabled);
    assert!(compiled.runtime.is_none());
    assert!(compiled.errors.is_empty());
}

/// An enabled policy compiles plans, weights, and damping into a runtime.
#[test]
fn enabled_policy_compiles_runtime() {
    let compiled = compile_resilience_policy(&enabled_policy());
    assert!(compiled.enabled);
    assert!(compiled.errors.is_empty());

    let mut runtime = compiled.runtime.expect("runtime");
    assert_eq!(runtime.plans.len(), 1);
    assert_eq!(runtime.plans[0].tier, 1);
    assert!(runtime.damping.is_some());

    let decision = runtime
        .maybe_recover(
            &TrustSnapshot {
                tsi_current: 0.60,
                tsi_forecast_15m: 0.58,
                der_density: 0.1,
                dep_concentration_index: 0.4,
                degraded: false,
            },
            100_000,
        )
        .expect("decision");
    assert_eq!(decision.chosen.expect("chosen").name, "rebalance_providers");
}

/// Unnamed plans are skipped and reported as errors.
#[test]
fn unnamed_plans_are_reported() {
    let mut policy = enabled_policy();
    policy.plans.tier_2.push(PlanSpec::default());
    let compiled = compile_resilience_policy(&policy);
    assert!(compiled.enabled);
    assert_eq!(compiled.errors.len(), 1);
    assert!(compiled.errors[0].contains("tier_2"));
    assert_eq!(compiled.runtime.expect("runtime").plans.len(), 1);
}

/// Misordered targets are collected as errors without aborting.
#[test]
fn misordered_targets_are_collected() {
    let mut policy = enabled_policy();
    policy.targets.tsi.critical = 0.90;
    let compiled = compile_resilience_policy(&policy);
    assert!(compiled.enabled);
    assert!(compiled.errors.iter().any(|error| error.contains("critical <= min <= target")));
}

/// Recovery events chain through prev_hash in the shared ledger.
#[test]
fn recovery_events_chain_in_ledger() {
    let ledger = MemoryLedger::new();
    emit_recovery_triggered(
        &ledger,
        HashAlgorithm::Sha256,
        "run-1",
        "ep-1",
        1_000,
        "triggered:test",
        0.60,
        0.58,
    )
    .expect("emit");
    emit_recovery_rollback(
        &ledger,
        HashAlgorithm::Sha256,
        "run-1",
        "ep-1",
        2_000,
        "plan_a",
        &["tsi_degraded:-0.1000".to_string()],
    )
    .expect("emit");
    emit_circuit_breaker_event(
        &ledger,
        HashAlgorithm::Sha256,
        "run-1",
        "ep-1",
        3_000,
        "plan_a",
        BreakerState::Open,
        3,
    )
    .expect("emit");

    let events = ledger.snapshot().expect("snapshot");
    let stages: Vec<&str> = events.iter().map(|event| event.stage.as_str()).collect();
    assert_eq!(stages, vec!["RECOVERY_TRIGGERED", "RECOVERY_ROLLBACK", "CIRCUIT_BREAKER"]);
    assert!(events[0].prev_hash.is_none());
    assert_eq!(events[1].prev_hash.as_deref(), Some(events[0].event_hash.as_str()));
    assert_eq!(events[2].prev_hash.as_deref(), Some(events[1].event_hash.as_str()));
    assert_eq!(events[2].payload["breaker_state"], json!("OPEN"));
}
