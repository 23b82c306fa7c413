// crates/trustplane-consensus/src/challenger.rs
// ============================================================================
// Module: Trustplane Challenger
// Description: Adversarial critique triggers, ChallengePack, arbitration.
// Purpose: Apply governance pressure without producing user-facing answers.
// Dependencies: crate::scope_gate, serde, serde_json, trustplane-core
// ============================================================================

//! ## Overview
//! The Challenger critiques; it never answers. Deterministic triggers decide
//! when it fires (high-stakes domain, primary/validator disagreement, a
//! scope-gate hit, low evidence on a high-stakes turn), a per-session cap
//! bounds cost, and arbitration applies the resulting ChallengePack as
//! monotone action upgrades (PASS < REWRITE < REFUSE).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use trustplane_core::DomainTag;

use crate::scope_gate::GateDecision;

// ============================================================================
// SECTION: Challenger Rules
// ============================================================================

/// When and how to invoke the Challenger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengerRules {
    /// Master enable switch.
    pub enabled: bool,
    /// Trigger on HIGH_STAKES turns.
    pub trigger_on_high_stakes: bool,
    /// Trigger on primary/validator disagreement.
    pub trigger_on_disagreement: bool,
    /// Disagreement score threshold.
    pub disagreement_threshold: f64,
    /// Trigger when the scope gate returned REWRITE or REFUSE.
    pub trigger_on_gate: bool,
    /// Trigger on E0/E1 evidence during high-stakes turns.
    pub trigger_on_low_evidence: bool,
    /// Per-session challenger invocation cap.
    pub max_challenges_per_session: u32,
    /// Challenger call timeout in seconds.
    pub timeout_s: u64,
    /// Maximum challenger output tokens.
    pub max_tokens: u32,
}

impl Default for ChallengerRules {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_on_high_stakes: true,
            trigger_on_disagreement: true,
            disagreement_threshold: 0.22,
            trigger_on_gate: true,
            trigger_on_low_evidence: true,
            max_challenges_per_session: 10,
            timeout_s: 6,
            max_tokens: 400,
        }
    }
}

// ============================================================================
// SECTION: ChallengePack
// ============================================================================

/// A claim flagged by the challenger for scrutiny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalClaim {
    /// Claim text.
    pub claim: String,
    /// Risk grade: `low`, `medium`, `high`, or `critical`.
    pub risk: String,
    /// Why the claim is risky.
    pub why: String,
    /// Evidence grade needed (E0–E3).
    pub evidence_needed: String,
}

/// Disagreement between roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Roles in conflict (e.g. `["primary", "validator_1"]`).
    pub between: Vec<String>,
    /// Conflict topic.
    pub topic: String,
    /// Impact grade: `low`, `medium`, or `high`.
    pub impact: String,
}

/// Evidence gap identified by the challenger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEvidence {
    /// Claim the evidence is missing for.
    #[serde(alias = "for", rename = "for_claim")]
    pub for_claim: String,
    /// Suggested source classes.
    #[serde(default)]
    pub suggested_sources: Vec<String>,
}

/// Structured adversarial critique: the Challenger's only output.
///
/// # Invariants
/// - The Challenger never produces user-facing answers; this pack becomes
///   governance pressure on arbitration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengePack {
    /// Vulnerability categories found.
    pub attack_surface: Vec<String>,
    /// Claims flagged for scrutiny.
    pub critical_claims: Vec<CriticalClaim>,
    /// Inter-role conflicts.
    pub conflicts: Vec<Conflict>,
    /// Evidence gaps.
    pub missing_evidence: Vec<MissingEvidence>,
    /// Questions directed at the primary.
    pub questions_for_primary: Vec<String>,
    /// Recommended action: `PASS`, `REWRITE`, or `REFUSE`.
    pub recommended_action: String,
    /// Rewrite instructions when a rewrite is recommended.
    pub rewrite_instructions: Vec<String>,
}

impl ChallengePack {
    /// Whether any claim is graded high or critical.
    #[must_use]
    pub fn has_high_risk_claims(&self) -> bool {
        self.critical_claims
            .iter()
            .any(|claim| matches!(claim.risk.as_str(), "high" | "critical"))
    }

    /// Whether any inter-role conflict was found.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Whether the challenger demands a rewrite.
    #[must_use]
    pub fn forces_rewrite(&self) -> bool {
        self.recommended_action == "REWRITE"
    }

    /// Whether the challenger demands a refusal.
    #[must_use]
    pub fn forces_refuse(&self) -> bool {
        self.recommended_action == "REFUSE"
    }

    /// Whether the pack raises no pressure at all.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        (self.recommended_action == "PASS" || self.recommended_action.is_empty())
            && !self.has_high_risk_claims()
            && !self.has_conflicts()
    }
}

/// Parses raw model output into a ChallengePack.
///
/// Strips markdown fences before parsing.
///
/// # Errors
///
/// Returns the parse error string when the output is not a valid pack.
pub fn parse_challenge_pack(raw_text: &str) -> Result<ChallengePack, String> {
    let mut text = raw_text.trim().to_string();
    if text.starts_with("```") {
        text = text
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n");
    }
    let value: Value =
        serde_json::from_str(text.trim()).map_err(|err| format!("JSON parse error: {err}"))?;
    if !value.is_object() {
        return Err("Challenger output is not a JSON object".to_string());
    }
    serde_json::from_value(value).map_err(|err| format!("ChallengePack parse error: {err}"))
}

// ============================================================================
// SECTION: Disagreement Scoring
// ============================================================================

/// Negation markers compared between primary and validator texts.
const NEGATION_WORDS: [&str; 9] =
    ["not", "no", "never", "cannot", "shouldn't", "don't", "won't", "isn't", "aren't"];

/// Lightweight primary/validator disagreement score, 0.0 to 1.0.
///
/// Jaccard distance over word sets, plus a negation-mismatch bonus (+0.15)
/// and a length-ratio penalty (+0.10), rounded to three decimals.
#[must_use]
pub fn compute_disagreement_score(primary_text: &str, validator_text: &str) -> f64 {
    if primary_text.is_empty() || validator_text.is_empty() {
        return 0.0;
    }

    let primary_lower = primary_text.to_lowercase();
    let validator_lower = validator_text.to_lowercase();
    let primary_words: BTreeSet<&str> = primary_lower.split_whitespace().collect();
    let validator_words: BTreeSet<&str> = validator_lower.split_whitespace().collect();
    if primary_words.is_empty() || validator_words.is_empty() {
        return 0.0;
    }

    let intersection = primary_words.intersection(&validator_words).count();
    let union = primary_words.union(&validator_words).count();
    #[allow(clippy::cast_precision_loss, reason = "Word counts are far below 2^52.")]
    let jaccard = if union == 0 { 1.0 } else { intersection as f64 / union as f64 };
    let mut disagreement = 1.0 - jaccard;

    let primary_negs: BTreeSet<&str> =
        primary_words.iter().copied().filter(|word| NEGATION_WORDS.contains(word)).collect();
    let validator_negs: BTreeSet<&str> =
        validator_words.iter().copied().filter(|word| NEGATION_WORDS.contains(word)).collect();
    if primary_negs != validator_negs {
        disagreement = (disagreement + 0.15).min(1.0);
    }

    #[allow(clippy::cast_precision_loss, reason = "Text lengths are far below 2^52.")]
    let length_ratio = primary_text.len().min(validator_text.len()) as f64
        / primary_text.len().max(validator_text.len()).max(1) as f64;
    if length_ratio < 0.3 {
        disagreement = (disagreement + 0.10).min(1.0);
    }

    (disagreement * 1000.0).round() / 1000.0
}

// ============================================================================
// SECTION: Trigger Logic
// ============================================================================

/// Stable trigger reason codes.
pub mod trigger_reason {
    /// High-stakes domain.
    pub const HIGH_STAKES: &str = "high_stakes_domain";
    /// Primary/validator disagreement.
    pub const DISAGREEMENT: &str = "primary_validator_disagreement";
    /// Scope gate returned REWRITE or REFUSE.
    pub const GATE_HIT: &str = "scope_gate_rewrite_or_refuse";
    /// Low evidence level on a high-stakes turn.
    pub const LOW_EVIDENCE: &str = "low_evidence_level";
}

/// Whether and why the challenger should fire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengerTriggerResult {
    /// Whether the challenger fires.
    pub should_trigger: bool,
    /// Trigger reason codes.
    pub reasons: Vec<String>,
    /// Disagreement score consulted by the decision.
    pub disagreement_score: f64,
}

/// Inputs to the deterministic trigger decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerInputs<'a> {
    /// Turn domain.
    pub domain: DomainTag,
    /// Primary/validator disagreement score.
    pub disagreement_score: f64,
    /// Scope-gate decision for the turn.
    pub scope_gate_decision: GateDecision,
    /// Evidence level for the turn (E0–E3).
    pub evidence_level: &'a str,
    /// Challenger invocations already spent this session.
    pub challenges_this_session: u32,
}

/// Decides whether to invoke the challenger. Pure and network-free.
#[must_use]
pub fn should_trigger_challenger(
    rules: &ChallengerRules,
    inputs: &TriggerInputs<'_>,
) -> ChallengerTriggerResult {
    if !rules.enabled {
        return ChallengerTriggerResult::default();
    }
    if inputs.challenges_this_session >= rules.max_challenges_per_session {
        return ChallengerTriggerResult {
            should_trigger: false,
            reasons: vec!["max_challenges_reached".to_string()],
            disagreement_score: inputs.disagreement_score,
        };
    }

    let mut reasons = Vec::new();
    if rules.trigger_on_high_stakes && inputs.domain == DomainTag::HighStakes {
        reasons.push(trigger_reason::HIGH_STAKES.to_string());
    }
    if rules.trigger_on_disagreement
        && inputs.disagreement_score >= rules.disagreement_threshold
    {
        reasons.push(trigger_reason::DISAGREEMENT.to_string());
    }
    if rules.trigger_on_gate
        && matches!(inputs.scope_gate_decision, GateDecision::Rewrite | GateDecision::Refuse)
    {
        reasons.push(trigger_reason::GATE_HIT.to_string());
    }
    if rules.trigger_on_low_evidence
        && inputs.domain == DomainTag::HighStakes
        && matches!(inputs.evidence_level, "E0" | "E1")
    {
        reasons.push(trigger_reason::LOW_EVIDENCE.to_string());
    }

    ChallengerTriggerResult {
        should_trigger: !reasons.is_empty(),
        reasons,
        disagreement_score: inputs.disagreement_score,
    }
}

// ============================================================================
// SECTION: Challenger Prompt
// ============================================================================

/// System prompt for the adversarial reviewer role.
pub const CHALLENGER_SYSTEM_PROMPT: &str = r#"You are an adversarial governance reviewer for Trustplane, a deterministic AI governance system.

Your role is to find weaknesses, not to answer the user's question. You NEVER produce answers for the user.

You receive:
- The original user query
- The primary model's response
- The validator model's response (if available)
- The user's verification context (role, tier level)

You MUST respond with ONLY a valid JSON object matching this schema:
{
  "attack_surface": ["list of vulnerability categories found"],
  "critical_claims": [{"claim": "...", "risk": "high|medium|low", "why": "...", "evidence_needed": "E0|E1|E2|E3"}],
  "conflicts": [{"between": ["primary", "validator_1"], "topic": "...", "impact": "high|medium|low"}],
  "missing_evidence": [{"for_claim": "...", "suggested_sources": ["guideline", "peer_review"]}],
  "questions_for_primary": ["What assumptions...?"],
  "recommended_action": "PASS|REWRITE|REFUSE",
  "rewrite_instructions": ["Add disclaimer...", "Remove diagnostic language..."]
}

Rules:
- Output ONLY valid JSON. No prose, no markdown, no explanation.
- Be aggressive about flagging risks. False positives are acceptable; false negatives are not.
- If the primary and validator agree and content is safe for the user's tier: recommended_action = "PASS"
- If content needs modification for the user's tier: recommended_action = "REWRITE"
- If content is unsafe at any tier: recommended_action = "REFUSE"
"#;

/// Builds the challenger input prompt.
#[must_use]
pub fn build_challenger_prompt(
    user_query: &str,
    primary_response: &str,
    validator_response: &str,
    role: &str,
    role_level: u8,
    domain: DomainTag,
) -> String {
    let query: String = user_query.chars().take(1000).collect();
    let primary: String = primary_response.chars().take(2000).collect();
    let mut parts = vec![
        format!("DOMAIN: {}", domain.as_str()),
        format!("USER QUERY:\n{query}"),
        format!("\nPRIMARY RESPONSE:\n{primary}"),
    ];
    if !validator_response.is_empty() {
        let validator: String = validator_response.chars().take(2000).collect();
        parts.push(format!("\nVALIDATOR RESPONSE:\n{validator}"));
    }
    parts.push(format!("\nUSER CONTEXT: role={role}, tier_level={role_level}"));
    parts.push("\nProduce your ChallengePack JSON now.".to_string());
    parts.join("\n")
}

// ============================================================================
// SECTION: Arbitration
// ============================================================================

/// Result of applying challenger constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationResult {
    /// Final action after all upgrades.
    pub final_action: GateDecision,
    /// Whether the challenger's pack was applied.
    pub challenger_applied: bool,
    /// Constraint labels applied during arbitration.
    pub constraints_applied: Vec<String>,
    /// Scope-gate decision before arbitration.
    pub original_gate_decision: GateDecision,
    /// Accumulated rewrite instructions.
    pub rewrite_instructions: Vec<String>,
}

/// Applies a ChallengePack as deterministic governance constraints.
///
/// Action order is fixed (PASS < REWRITE < REFUSE); upgrades compose
/// monotonically and never downgrade except the single expert-caveat rule.
#[must_use]
pub fn arbitrate(
    pack: &ChallengePack,
    scope_gate_decision: GateDecision,
    role_level: u8,
    domain: DomainTag,
) -> ArbitrationResult {
    let mut constraints = Vec::new();
    let mut action = GateDecision::Pass;
    let mut rewrite_instructions = pack.rewrite_instructions.clone();

    if pack.forces_refuse() {
        if role_level >= 3 && scope_gate_decision == GateDecision::Pass {
            action = GateDecision::Rewrite;
            constraints.push("challenger_refuse_downgraded_for_expert".to_string());
            rewrite_instructions
                .push("Add expert-only caveat and verification reminder".to_string());
        } else {
            return ArbitrationResult {
                final_action: GateDecision::Refuse,
                challenger_applied: true,
                constraints_applied: vec!["challenger_refuse_enforced".to_string()],
                original_gate_decision: scope_gate_decision,
                rewrite_instructions,
            };
        }
    }

    if pack.has_high_risk_claims() && role_level < 2 {
        action = action.max(GateDecision::Rewrite);
        constraints.push("high_risk_claims_for_low_tier".to_string());
        rewrite_instructions.push("Remove or soften high-risk clinical claims".to_string());
        rewrite_instructions.push("Add mandatory disclaimer for non-professional tier".to_string());
    }

    if pack.has_conflicts() && domain == DomainTag::HighStakes {
        action = action.max(GateDecision::Rewrite);
        constraints.push("conflicts_on_high_stakes".to_string());
        rewrite_instructions.push("Add explicit uncertainty language".to_string());
        rewrite_instructions
            .push("Present alternative hypotheses where models disagree".to_string());
    }

    if !pack.missing_evidence.is_empty() && domain == DomainTag::HighStakes {
        action = action.max(GateDecision::Rewrite);
        constraints.push("missing_evidence_high_stakes".to_string());
        rewrite_instructions.push("Reframe to E1-safe (general information only)".to_string());
    }

    if pack.forces_rewrite() && action == GateDecision::Pass {
        action = GateDecision::Rewrite;
        constraints.push("challenger_rewrite_recommended".to_string());
    }

    ArbitrationResult {
        final_action: action,
        challenger_applied: true,
        constraints_applied: constraints,
        original_gate_decision: scope_gate_decision,
        rewrite_instructions,
    }
}
