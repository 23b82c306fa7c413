// crates/trustplane-consensus/tests/config_presets.rs
// ============================================================================
// Module: Consensus Preset Tests
// Description: Regime budgets and verification-role routing.
// ============================================================================
//! ## Overview
//! FAST, HIGH_ASSURANCE, and CONSENSUS presets cap validators and repair
//! budgets; verification-role routing maps tier levels onto the presets
//! fail-closed.

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

use trustplane_consensus::ConsensusConfig;
use trustplane_consensus::ModelSpec;
use trustplane_consensus::PromptAnchors;
use trustplane_consensus::Role;
use trustplane_consensus::VerificationContext;
use trustplane_consensus::default_prompts;

/// A pool of four validator specs.
fn validators() -> Vec<ModelSpec> {
    (0..4).map(|index| ModelSpec::new("mock", format!("validator-{index}"))).collect()
}

/// FAST keeps at most one validator and one repair.
#[test]
fn fast_preset_caps_budget() {
    let config = ConsensusConfig::preset_fast(
        default_prompts(),
        ModelSpec::new("mock", "primary"),
        validators(),
    );
    assert_eq!(config.profile_name.as_deref(), Some("FAST"));
    assert_eq!(config.validators.len(), 1);
    assert_eq!(config.max_repair_attempts, 1);
    assert_eq!(config.primary_timeout_s, 35);
    assert!(!config.enable_debate);
}

/// HIGH_ASSURANCE keeps at most two validators and two repairs.
#[test]
fn high_assurance_preset_caps_budget() {
    let config = ConsensusConfig::preset_high_assurance(
        default_prompts(),
        ModelSpec::new("mock", "primary"),
        validators(),
    );
    assert_eq!(config.validators.len(), 2);
    assert_eq!(config.max_repair_attempts, 2);
    assert_eq!(config.primary_timeout_s, 60);
}

/// CONSENSUS keeps at most three validators.
#[test]
fn consensus_preset_caps_budget() {
    let config = ConsensusConfig::preset_consensus(
        default_prompts(),
        ModelSpec::new("mock", "primary"),
        validators(),
        None,
    );
    assert_eq!(config.validators.len(), 3);
    assert_eq!(config.primary_timeout_s, 75);
    assert!(!config.enable_debate);
}

/// Verification routing: unverified and level 1 map to FAST.
#[test]
fn unverified_callers_get_fast() {
    let config = ConsensusConfig::preset_for_verification(
        default_prompts(),
        ModelSpec::new("mock", "primary"),
        validators(),
        &VerificationContext::public(),
        None,
    );
    assert_eq!(config.profile_name.as_deref(), Some("FAST"));
}

/// Verification routing: level 2 maps to HIGH_ASSURANCE, 3+ to CONSENSUS.
#[test]
fn verified_tiers_route_upward() {
    let mid = VerificationContext {
        verified: true,
        role: Role::Assistant,
        role_level: 2,
        ..VerificationContext::public()
    };
    let config = ConsensusConfig::preset_for_verification(
        default_prompts(),
        ModelSpec::new("mock", "primary"),
        validators(),
        &mid,
        None,
    );
    assert_eq!(config.profile_name.as_deref(), Some("HIGH_ASSURANCE"));

    let pro = VerificationContext {
        verified: true,
        role: Role::Physician,
        role_level: 3,
        ..VerificationContext::public()
    };
    let config = ConsensusConfig::preset_for_verification(
        default_prompts(),
        ModelSpec::new("mock", "primary"),
        validators(),
        &pro,
        None,
    );
    assert_eq!(config.profile_name.as_deref(), Some("CONSENSUS"));
}

/// Prompt rendering substitutes every anchor variable.
#[test]
fn prompt_rendering_substitutes_anchors() {
    let prompts = default_prompts();
    let rendered = prompts.render_primary(
        &PromptAnchors {
            run_id: "run-7",
            epack: "epack-7",
            aru: "ANSWER",
        },
        &VerificationContext::public(),
        "What is governance?",
    );
    assert!(rendered.contains("RUN_ID=run-7"));
    assert!(rendered.contains("EPACK=epack-7"));
    assert!(rendered.contains("ARU=ANSWER"));
    assert!(rendered.contains("ROLE_LEVEL=1"));
    assert!(rendered.contains("What is governance?"));
    assert!(!rendered.contains("{USER_QUERY}"));
}
