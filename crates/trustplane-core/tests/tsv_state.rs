// crates/trustplane-core/tests/tsv_state.rs
// ============================================================================
// Module: TSV State Tests
// Description: Belief updates, self-assertion caps, high-stakes readiness.
// ============================================================================
//! ## Overview
//! Beliefs move toward evidence targets weighted by graded strength;
//! self-assertions are capped at E1 so only verification steps can unlock
//! the high-stakes gate.

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

use serde_json::Map;
use trustplane_core::TsvState;
use trustplane_core::tsv::EvidenceStrength;
use trustplane_core::tsv::EvidenceType;
use trustplane_core::tsv::SkillEvidence;
use trustplane_core::tsv::cap_strength_for_type;

/// Builds evidence for a skill.
fn evidence(
    skill: &str,
    evidence_type: EvidenceType,
    strength: EvidenceStrength,
    timestamp: u64,
) -> SkillEvidence {
    SkillEvidence {
        skill: skill.to_string(),
        evidence_type,
        strength,
        details: Map::new(),
        timestamp,
    }
}

/// Verification steps move the belief upward by the strength weight.
#[test]
fn verification_step_raises_belief() {
    let mut state = TsvState::default();
    let before = state.beliefs.verification;
    state.add_evidence(
        evidence("verification", EvidenceType::EvVerificationStep, EvidenceStrength::E3, 100),
        100,
    );
    let after = state.beliefs.verification;
    assert!(after > before);
    assert!((after - (before + 0.55 * (1.0 - before))).abs() < 1e-9);
}

/// Self-assertions are capped to E1 regardless of the claimed grade.
#[test]
fn self_assertion_is_capped_at_e1() {
    assert_eq!(
        cap_strength_for_type(EvidenceType::EvSelfAssertion, EvidenceStrength::E3),
        EvidenceStrength::E1
    );
    assert_eq!(
        cap_strength_for_type(EvidenceType::EvSelfAssertion, EvidenceStrength::E0),
        EvidenceStrength::E0
    );
    assert_eq!(
        cap_strength_for_type(EvidenceType::EvVerificationStep, EvidenceStrength::E3),
        EvidenceStrength::E3
    );
}

/// Readiness demands three 0.70 beliefs and an E3 verification entry.
#[test]
fn high_stakes_readiness_requires_e3_verification() {
    let mut state = TsvState::default();
    assert!(!state.high_stakes_ready());

    state.beliefs.clarity = 0.80;
    state.beliefs.constraints = 0.80;
    state.beliefs.verification = 0.80;
    assert!(!state.high_stakes_ready());

    state.add_evidence(
        evidence("verification", EvidenceType::EvVerificationStep, EvidenceStrength::E3, 100),
        100,
    );
    assert!(state.high_stakes_ready());
}

/// Self-asserted evidence alone can never unlock readiness.
#[test]
fn self_assertions_never_unlock_readiness() {
    let mut state = TsvState::default();
    for _ in 0..50 {
        state.add_evidence(
            evidence("verification", EvidenceType::EvSelfAssertion, EvidenceStrength::E3, 100),
            100,
        );
        state.add_evidence(
            evidence("clarity", EvidenceType::EvSelfAssertion, EvidenceStrength::E3, 100),
            100,
        );
        state.add_evidence(
            evidence("constraints", EvidenceType::EvSelfAssertion, EvidenceStrength::E3, 100),
            100,
        );
    }
    assert!(!state.high_stakes_ready());
}

/// Expired evidence is pruned and its E3 marker disappears.
#[test]
fn evidence_expires_outside_the_window() {
    let mut state = TsvState::default();
    state.add_evidence(
        evidence("verification", EvidenceType::EvVerificationStep, EvidenceStrength::E3, 0),
        0,
    );
    assert!(state.has_e3("verification"));

    let later = state.evidence_window_s + 10;
    state.add_evidence(
        evidence("context", EvidenceType::EvCompliance, EvidenceStrength::E1, later),
        later,
    );
    assert!(!state.has_e3("verification"));
}

/// Error patterns drag the belief downward.
#[test]
fn error_pattern_lowers_belief() {
    let mut state = TsvState::default();
    let before = state.beliefs.clarity;
    state.add_evidence(
        evidence("clarity", EvidenceType::EvErrorPattern, EvidenceStrength::E2, 100),
        100,
    );
    assert!(state.beliefs.clarity < before);
}

/// Snapshots carry beliefs and the recent evidence tail.
#[test]
fn snapshot_is_epack_friendly() {
    let mut state = TsvState::default();
    state.add_evidence(
        evidence("verification", EvidenceType::EvVerificationStep, EvidenceStrength::E3, 100),
        100,
    );
    let snapshot = state.snapshot();
    assert!(snapshot["beliefs"]["verification"].is_number());
    assert_eq!(snapshot["has_e3_verification"], serde_json::json!(true));
}
