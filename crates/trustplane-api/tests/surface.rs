// crates/trustplane-api/tests/surface.rs
// ============================================================================
// Module: API Surface Tests
// Description: Receipts, schema registry, metrics, and state building.
// ============================================================================
//! ## Overview
//! Receipt signing is keyed and verifiable; the schema registry serves every
//! published schema; metrics classify replies; state building wires the
//! kernel from captured settings.

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

use trustplane_api::build_state;
use trustplane_api::metrics::GovernanceMetrics;
use trustplane_api::schema_registry;
use trustplane_api::sign_receipt;
use trustplane_api::verify_receipt;
use trustplane_config::KernelMode;
use trustplane_config::Settings;
use trustplane_core::ReplayOutcome;

/// Signing with a key round-trips through verification.
#[test]
fn receipts_sign_and_verify() {
    let receipt = sign_receipt("shared-key", "record-hash").expect("receipt");
    assert_eq!(receipt.algorithm, "hmac-sha256");
    assert!(verify_receipt("shared-key", &receipt));
    assert!(!verify_receipt("other-key", &receipt));
}

/// An empty key disables signing entirely.
#[test]
fn empty_key_disables_signing() {
    assert!(sign_receipt("", "record-hash").is_none());
}

/// Signatures are deterministic per key and payload.
#[test]
fn signatures_are_deterministic() {
    let first = sign_receipt("key", "hash-a").expect("receipt");
    let second = sign_receipt("key", "hash-a").expect("receipt");
    let other = sign_receipt("key", "hash-b").expect("receipt");
    assert_eq!(first.signature, second.signature);
    assert_ne!(first.signature, other.signature);
}

/// Every published schema resolves; unknown names do not.
#[test]
fn schema_registry_serves_published_schemas() {
    for name in schema_registry::SCHEMA_NAMES {
        let schema = schema_registry::get_schema(name).expect("schema");
        assert_eq!(schema["schema"], serde_json::json!(name));
        assert!(schema["version"].is_number());
    }
    assert!(schema_registry::get_schema("nonexistent").is_none());

    let all = schema_registry::all_schemas();
    assert_eq!(all.as_object().expect("object").len(), schema_registry::SCHEMA_NAMES.len());
}

/// Metrics classify replies by their stable prefixes.
#[test]
fn metrics_classify_replies() {
    let metrics = GovernanceMetrics::new();
    metrics.record_turn("TDM", "Here is your answer.");
    metrics.record_turn("BOUND", "BOUND: I can't help with that.");
    metrics.record_turn("DEFER", "DEFER: This is high-stakes.");
    metrics.record_turn("TDM", "CLARIFY: Output validation failed after retries.");
    metrics.record_replay(ReplayOutcome::Verified);
    metrics.record_replay(ReplayOutcome::TamperDetected);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.turns_total, 4);
    assert_eq!(snapshot.bound_refusals, 1);
    assert_eq!(snapshot.defers, 1);
    assert_eq!(snapshot.clarifies, 1);
    assert_eq!(snapshot.routes.get("TDM"), Some(&2));
    assert_eq!(snapshot.replay_verified, 1);
    assert_eq!(snapshot.replay_tampered, 1);
}

/// State building wires the kernel and resolves the kernel mode.
#[test]
fn build_state_wires_the_kernel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        epack_store_path: dir
            .path()
            .join("epacks.jsonl")
            .to_string_lossy()
            .into_owned(),
        kernel_mode: KernelMode::V8,
        ..Settings::default()
    };

    let state = build_state(settings).expect("state");
    assert_eq!(state.engine.manifest().kernel, "trustplane-kernel");
    assert!(state.policy.errors.is_empty());
    assert!(state.resilience.lock().expect("lock").is_none());
    assert_eq!(state.registry.providers(), vec!["mock".to_string()]);
}

/// V9 mode compiles the resilience runtime only when the policy enables it.
#[test]
fn v9_mode_respects_policy_toggle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        epack_store_path: dir
            .path()
            .join("epacks.jsonl")
            .to_string_lossy()
            .into_owned(),
        kernel_mode: KernelMode::V9,
        ..Settings::default()
    };
    let state = build_state(settings).expect("state");
    // The default policy ships with the resilience loop disabled.
    assert!(state.resilience.lock().expect("lock").is_none());
}
