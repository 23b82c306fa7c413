// crates/trustplane-core/tests/replay_package.rs
// ============================================================================
// Module: Replay Package Tests
// Description: Sealing, verification, and tamper evidence for packages.
// ============================================================================
//! ## Overview
//! A sealed package must verify; re-sealing is deterministic; any content
//! mutation or chain tamper fails the matching check.

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
use trustplane_core::GENESIS_HASH;
use trustplane_core::HashAlgorithm;
use trustplane_core::epack::new_epack;
use trustplane_core::runtime::PackageInputs;
use trustplane_core::runtime::build_replay_package;
use trustplane_core::runtime::verify_replay_package;

/// Builds a small sealed chain whose first payload carries the input hash.
fn chain() -> Vec<trustplane_core::EpackRecord> {
    let mut records = Vec::new();
    let mut prev = GENESIS_HASH.to_string();
    for seq in 1..=3_u64 {
        let record = new_epack(
            HashAlgorithm::Sha256,
            seq,
            1_700_000_000 + seq,
            &prev,
            json!({ "user_text_hash": format!("input-{seq}"), "interaction": seq }),
            None,
        )
        .expect("seal");
        prev = record.hash.clone();
        records.push(record);
    }
    records
}

/// Default inputs over the test chain.
fn inputs() -> PackageInputs {
    PackageInputs {
        session_epacks: chain(),
        kernel_version: "0.1.0".to_string(),
        governance_profile: "STANDARD".to_string(),
        validator_set_id: "vs-1".to_string(),
        routing_decisions: json!({ "seq": ["TDM"] }),
        validator_results: vec![json!({ "verdict": "AGREE" })],
        consensus_result: Some(json!({ "status": "PASS" })),
        environment: json!({ "platform": "test" }),
    }
}

/// Building seals the package and captures the chain head.
#[test]
fn build_seals_package() {
    let package = build_replay_package(HashAlgorithm::Sha256, inputs()).expect("build");
    assert!(!package.package_hash.is_empty());
    assert_eq!(package.epack_head_hash, package.epack_chain[2].hash);
    assert_eq!(package.input_payload_hash, "input-1");
    assert_eq!(package.determinism_policy, "strict");
}

/// Sealing is deterministic: identical inputs produce identical hashes.
#[test]
fn sealing_is_deterministic() {
    let first = build_replay_package(HashAlgorithm::Sha256, inputs()).expect("build");
    let second = build_replay_package(HashAlgorithm::Sha256, inputs()).expect("build");
    assert_eq!(first.package_hash, second.package_hash);
}

/// A sealed package passes every verification check.
#[test]
fn sealed_package_verifies() {
    let package = build_replay_package(HashAlgorithm::Sha256, inputs()).expect("build");
    let verification =
        verify_replay_package(HashAlgorithm::Sha256, &package).expect("verify");
    assert!(verification.passed);
}

/// Mutating content after sealing fails the seal check.
#[test]
fn content_mutation_fails_seal() {
    let mut package = build_replay_package(HashAlgorithm::Sha256, inputs()).expect("build");
    package.kernel_version = "9.9.9".to_string();
    let verification =
        verify_replay_package(HashAlgorithm::Sha256, &package).expect("verify");
    assert!(!verification.passed);
    let seal = verification.checks.iter().find(|check| check.check == "package_seal");
    assert!(seal.is_some_and(|check| !check.passed));
}

/// Tampering a chained record fails the chain-integrity check.
#[test]
fn chain_tamper_fails_chain_check() {
    let mut package = build_replay_package(HashAlgorithm::Sha256, inputs()).expect("build");
    package.epack_chain[1].payload = json!({ "user_text_hash": "swapped" });
    package.seal(HashAlgorithm::Sha256).expect("reseal");

    let verification =
        verify_replay_package(HashAlgorithm::Sha256, &package).expect("verify");
    assert!(!verification.passed);
    let chain_check =
        verification.checks.iter().find(|check| check.check == "chain_integrity");
    assert!(chain_check.is_some_and(|check| !check.passed && !check.errors.is_empty()));
}

/// Missing required fields fail verification.
#[test]
fn missing_required_fields_fail() {
    let mut bare = inputs();
    bare.kernel_version = String::new();
    let package = build_replay_package(HashAlgorithm::Sha256, bare).expect("build");
    let verification =
        verify_replay_package(HashAlgorithm::Sha256, &package).expect("verify");
    assert!(!verification.passed);
}
