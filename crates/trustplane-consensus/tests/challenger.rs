// crates/trustplane-consensus/tests/challenger.rs
// ============================================================================
// Module: Challenger Tests
// Description: Disagreement scoring, trigger table, arbitration rules.
// ============================================================================
//! ## Overview
//! The trigger function is pure and bounded by the per-session cap;
//! arbitration applies ChallengePack pressure as monotone upgrades with the
//! single expert-caveat downgrade.

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

use trustplane_consensus::ChallengePack;
use trustplane_consensus::ChallengerRules;
use trustplane_consensus::GateDecision;
use trustplane_consensus::TriggerInputs;
use trustplane_consensus::arbitrate;
use trustplane_consensus::challenger::Conflict;
use trustplane_consensus::challenger::CriticalClaim;
use trustplane_consensus::challenger::MissingEvidence;
use trustplane_consensus::compute_disagreement_score;
use trustplane_consensus::parse_challenge_pack;
use trustplane_consensus::should_trigger_challenger;
use trustplane_core::DomainTag;

/// Baseline trigger inputs with nothing firing.
const fn quiet_inputs() -> TriggerInputs<'static> {
    TriggerInputs {
        domain: DomainTag::General,
        disagreement_score: 0.0,
        scope_gate_decision: GateDecision::Pass,
        evidence_level: "E2",
        challenges_this_session: 0,
    }
}

// ============================================================================
// SECTION: Disagreement Scoring
// ============================================================================

/// Identical texts score zero disagreement.
#[test]
fn identical_texts_score_zero() {
    let score = compute_disagreement_score("the answer is yes", "the answer is yes");
    assert!(score < 1e-9);
}

/// A negation mismatch adds pressure.
#[test]
fn negation_mismatch_raises_score() {
    let agree = compute_disagreement_score("this drug is safe for use", "this drug is safe");
    let negated = compute_disagreement_score("this drug is safe for use", "this drug is not safe");
    assert!(negated > agree);
}

/// Empty inputs score zero instead of panicking.
#[test]
fn empty_inputs_score_zero() {
    assert!(compute_disagreement_score("", "anything") < 1e-9);
}

// ============================================================================
// SECTION: Trigger Logic
// ============================================================================

/// A quiet turn does not fire the challenger.
#[test]
fn quiet_turn_does_not_trigger() {
    let result = should_trigger_challenger(&ChallengerRules::default(), &quiet_inputs());
    assert!(!result.should_trigger);
    assert!(result.reasons.is_empty());
}

/// High-stakes domain alone triggers.
#[test]
fn high_stakes_domain_triggers() {
    let inputs = TriggerInputs {
        domain: DomainTag::HighStakes,
        ..quiet_inputs()
    };
    let result = should_trigger_challenger(&ChallengerRules::default(), &inputs);
    assert!(result.should_trigger);
    assert!(result.reasons.contains(&"high_stakes_domain".to_string()));
}

/// Disagreement at or above the threshold triggers.
#[test]
fn disagreement_threshold_triggers() {
    let inputs = TriggerInputs {
        disagreement_score: 0.22,
        ..quiet_inputs()
    };
    let result = should_trigger_challenger(&ChallengerRules::default(), &inputs);
    assert!(result.should_trigger);

    let below = TriggerInputs {
        disagreement_score: 0.21,
        ..quiet_inputs()
    };
    assert!(!should_trigger_challenger(&ChallengerRules::default(), &below).should_trigger);
}

/// A scope-gate hit triggers.
#[test]
fn gate_hit_triggers() {
    let inputs = TriggerInputs {
        scope_gate_decision: GateDecision::Rewrite,
        ..quiet_inputs()
    };
    assert!(should_trigger_challenger(&ChallengerRules::default(), &inputs).should_trigger);
}

/// Low evidence triggers only on high-stakes turns.
#[test]
fn low_evidence_triggers_only_high_stakes() {
    let general = TriggerInputs {
        evidence_level: "E0",
        ..quiet_inputs()
    };
    assert!(!should_trigger_challenger(&ChallengerRules::default(), &general).should_trigger);

    let high_stakes = TriggerInputs {
        domain: DomainTag::HighStakes,
        evidence_level: "E0",
        ..quiet_inputs()
    };
    let result = should_trigger_challenger(&ChallengerRules::default(), &high_stakes);
    assert!(result.reasons.contains(&"low_evidence_level".to_string()));
}

/// The per-session cap suppresses further invocations.
#[test]
fn session_cap_suppresses_triggers() {
    let rules = ChallengerRules::default();
    let inputs = TriggerInputs {
        domain: DomainTag::HighStakes,
        challenges_this_session: rules.max_challenges_per_session,
        ..quiet_inputs()
    };
    let result = should_trigger_challenger(&rules, &inputs);
    assert!(!result.should_trigger);
    assert_eq!(result.reasons, vec!["max_challenges_reached".to_string()]);
}

// ============================================================================
// SECTION: Pack Parsing
// ============================================================================

/// Markdown fences are stripped before parsing.
#[test]
fn pack_parses_through_markdown_fences() {
    let raw = "```json\n{\"recommended_action\": \"REWRITE\", \"rewrite_instructions\": [\"soften\"]}\n```";
    let pack = parse_challenge_pack(raw).expect("pack");
    assert!(pack.forces_rewrite());
    assert_eq!(pack.rewrite_instructions, vec!["soften".to_string()]);
}

/// Non-object output is rejected with a reason.
#[test]
fn non_object_pack_is_rejected() {
    assert!(parse_challenge_pack("[1, 2, 3]").is_err());
    assert!(parse_challenge_pack("not json").is_err());
}

// ============================================================================
// SECTION: Arbitration
// ============================================================================

/// Builds a pack with one high-risk claim.
fn high_risk_pack() -> ChallengePack {
    ChallengePack {
        critical_claims: vec![CriticalClaim {
            claim: "dosage claim".to_string(),
            risk: "high".to_string(),
            why: "unsupported".to_string(),
            evidence_needed: "E3".to_string(),
        }],
        recommended_action: "PASS".to_string(),
        ..ChallengePack::default()
    }
}

/// A clean pack leaves the action at PASS.
#[test]
fn clean_pack_keeps_pass() {
    let result =
        arbitrate(&ChallengePack::default(), GateDecision::Pass, 1, DomainTag::General);
    assert_eq!(result.final_action, GateDecision::Pass);
    assert!(result.constraints_applied.is_empty());
}

/// Challenger REFUSE is enforced for non-expert callers.
#[test]
fn refuse_is_enforced_for_low_tier() {
    let pack = ChallengePack {
        recommended_action: "REFUSE".to_string(),
        ..ChallengePack::default()
    };
    let result = arbitrate(&pack, GateDecision::Pass, 1, DomainTag::General);
    assert_eq!(result.final_action, GateDecision::Refuse);
    assert_eq!(result.constraints_applied, vec!["challenger_refuse_enforced".to_string()]);
}

/// Expert callers with a clean gate get the REFUSE downgraded to REWRITE.
#[test]
fn refuse_downgrades_for_expert_with_clean_gate() {
    let pack = ChallengePack {
        recommended_action: "REFUSE".to_string(),
        ..ChallengePack::default()
    };
    let result = arbitrate(&pack, GateDecision::Pass, 3, DomainTag::General);
    assert_eq!(result.final_action, GateDecision::Rewrite);
    assert!(result
        .constraints_applied
        .contains(&"challenger_refuse_downgraded_for_expert".to_string()));
}

/// High-risk claims upgrade low-tier turns to REWRITE.
#[test]
fn high_risk_claims_upgrade_low_tier() {
    let result = arbitrate(&high_risk_pack(), GateDecision::Pass, 1, DomainTag::General);
    assert_eq!(result.final_action, GateDecision::Rewrite);
    assert!(result.constraints_applied.contains(&"high_risk_claims_for_low_tier".to_string()));
}

/// Conflicts on high-stakes turns force uncertainty language.
#[test]
fn conflicts_on_high_stakes_upgrade() {
    let pack = ChallengePack {
        conflicts: vec![Conflict {
            between: vec!["primary".to_string(), "validator_1".to_string()],
            topic: "dose".to_string(),
            impact: "high".to_string(),
        }],
        recommended_action: "PASS".to_string(),
        ..ChallengePack::default()
    };
    let result = arbitrate(&pack, GateDecision::Pass, 3, DomainTag::HighStakes);
    assert_eq!(result.final_action, GateDecision::Rewrite);
    assert!(result
        .rewrite_instructions
        .contains(&"Add explicit uncertainty language".to_string()));
}

/// Missing evidence on high-stakes turns reframes to E1-safe.
#[test]
fn missing_evidence_on_high_stakes_upgrades() {
    let pack = ChallengePack {
        missing_evidence: vec![MissingEvidence {
            for_claim: "efficacy".to_string(),
            suggested_sources: vec!["guideline".to_string()],
        }],
        recommended_action: "PASS".to_string(),
        ..ChallengePack::default()
    };
    let result = arbitrate(&pack, GateDecision::Pass, 3, DomainTag::HighStakes);
    assert_eq!(result.final_action, GateDecision::Rewrite);
}

/// Upgrades compose monotonically and never downgrade below REWRITE.
#[test]
fn upgrades_compose_monotonically() {
    let mut pack = high_risk_pack();
    pack.recommended_action = "REWRITE".to_string();
    let result = arbitrate(&pack, GateDecision::Rewrite, 1, DomainTag::HighStakes);
    assert_eq!(result.final_action, GateDecision::Rewrite);
    assert!(result.constraints_applied.len() > 1);
}
