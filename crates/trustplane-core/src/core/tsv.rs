// crates/trustplane-core/src/core/tsv.rs
// ============================================================================
// Module: Trustplane Skill Belief State
// Description: Evidence-weighted belief tracking for high-stakes readiness.
// Purpose: Gate HIGH_STAKES turns behind accumulated verification evidence.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The TSV state tracks per-skill beliefs in [0, 1] updated by graded
//! evidence. Self-asserted evidence is capped at E1 so a session cannot talk
//! its way into high-stakes readiness; only an E3 verification step unlocks
//! the DEFER route.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Evidence Model
// ============================================================================

/// Kind of evidence observed about a session skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceType {
    /// The user asserted the skill themselves.
    EvSelfAssertion,
    /// Observed task performance.
    EvPerformance,
    /// Observed compliance with constraints.
    EvCompliance,
    /// Observed error pattern.
    EvErrorPattern,
    /// A completed verification step.
    EvVerificationStep,
}

/// Graded strength of a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvidenceStrength {
    /// No evidentiary weight.
    E0,
    /// Weak evidence.
    E1,
    /// Moderate evidence.
    E2,
    /// Strong, externally verified evidence.
    E3,
}

impl EvidenceStrength {
    /// Belief-update weight for this strength grade.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::E0 => 0.0,
            Self::E1 => 0.10,
            Self::E2 => 0.25,
            Self::E3 => 0.55,
        }
    }
}

/// Caps evidence strength by type: self-assertions never exceed E1.
#[must_use]
pub const fn cap_strength_for_type(
    evidence_type: EvidenceType,
    strength: EvidenceStrength,
) -> EvidenceStrength {
    match evidence_type {
        EvidenceType::EvSelfAssertion => match strength {
            EvidenceStrength::E0 => EvidenceStrength::E0,
            _ => EvidenceStrength::E1,
        },
        _ => strength,
    }
}

/// A single piece of evidence about a session skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEvidence {
    /// Skill the evidence is about (`clarity`, `verification`, ...).
    pub skill: String,
    /// Evidence type.
    pub evidence_type: EvidenceType,
    /// Evidence strength (already capped by type on ingestion).
    pub strength: EvidenceStrength,
    /// Free-form detail map carried into snapshots.
    pub details: Map<String, Value>,
    /// Unix seconds when the evidence was observed.
    pub timestamp: u64,
}

impl SkillEvidence {
    /// Whether the evidence fell outside the retention window.
    #[must_use]
    pub const fn is_expired(&self, now: u64, window_s: u64) -> bool {
        now.saturating_sub(self.timestamp) > window_s
    }
}

// ============================================================================
// SECTION: Beliefs
// ============================================================================

/// Belief values per tracked skill, each in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillBeliefs {
    /// Belief that the user's goal is clearly stated.
    pub clarity: f64,
    /// Belief that enough context has been provided.
    pub context: f64,
    /// Belief that verification steps are in place.
    pub verification: f64,
    /// Belief that constraints are understood.
    pub constraints: f64,
    /// Belief that intent translates faithfully into requests.
    pub translation_intent: f64,
}

impl Default for SkillBeliefs {
    fn default() -> Self {
        Self {
            clarity: 0.50,
            context: 0.50,
            verification: 0.50,
            constraints: 0.50,
            translation_intent: 0.50,
        }
    }
}

// ============================================================================
// SECTION: TSV State
// ============================================================================

/// Default evidence retention window: seven days.
pub const DEFAULT_EVIDENCE_WINDOW_S: u64 = 7 * 24 * 3600;

/// Evidence-weighted trust-skill state for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsvState {
    /// Current belief values.
    pub beliefs: SkillBeliefs,
    /// Retained evidence log (expired entries are pruned on update).
    pub evidence_log: Vec<SkillEvidence>,
    /// Evidence retention window in seconds.
    pub evidence_window_s: u64,
}

impl Default for TsvState {
    fn default() -> Self {
        Self {
            beliefs: SkillBeliefs::default(),
            evidence_log: Vec::new(),
            evidence_window_s: DEFAULT_EVIDENCE_WINDOW_S,
        }
    }
}

impl TsvState {
    /// Prunes evidence outside the retention window.
    fn decay(&mut self, now: u64) {
        let window = self.evidence_window_s;
        self.evidence_log.retain(|evidence| !evidence.is_expired(now, window));
    }

    /// Whether any E3 evidence exists for the given skill.
    #[must_use]
    pub fn has_e3(&self, skill: &str) -> bool {
        self.evidence_log
            .iter()
            .any(|evidence| evidence.skill == skill && evidence.strength == EvidenceStrength::E3)
    }

    /// Ingests evidence and nudges the matching belief toward its target.
    pub fn add_evidence(&mut self, mut evidence: SkillEvidence, now: u64) {
        evidence.strength = cap_strength_for_type(evidence.evidence_type, evidence.strength);

        let target = match evidence.evidence_type {
            EvidenceType::EvPerformance => {
                let success =
                    evidence.details.get("success").and_then(Value::as_bool).unwrap_or(false);
                if success { 1.0 } else { 0.0 }
            }
            EvidenceType::EvErrorPattern => 0.0,
            EvidenceType::EvVerificationStep => 1.0,
            EvidenceType::EvSelfAssertion | EvidenceType::EvCompliance => {
                let positive =
                    evidence.details.get("positive").and_then(Value::as_bool).unwrap_or(true);
                if positive { 1.0 } else { 0.0 }
            }
        };

        let weight = evidence.strength.weight();
        let skill = evidence.skill.clone();
        self.evidence_log.push(evidence);
        self.decay(now);

        let belief = match skill.as_str() {
            "clarity" => &mut self.beliefs.clarity,
            "context" => &mut self.beliefs.context,
            "verification" => &mut self.beliefs.verification,
            "constraints" => &mut self.beliefs.constraints,
            "translation_intent" => &mut self.beliefs.translation_intent,
            _ => return,
        };
        *belief = (*belief + weight * (target - *belief)).clamp(0.0, 1.0);
    }

    /// Whether the session may proceed on HIGH_STAKES turns.
    ///
    /// Requires clarity, constraints, and verification beliefs at 0.70+ and
    /// at least one E3 verification evidence entry.
    #[must_use]
    pub fn high_stakes_ready(&self) -> bool {
        self.beliefs.clarity >= 0.70
            && self.beliefs.constraints >= 0.70
            && self.beliefs.verification >= 0.70
            && self.has_e3("verification")
    }

    /// Auditable snapshot embedded in EPACK payloads.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        let recent: Vec<&SkillEvidence> =
            self.evidence_log.iter().rev().take(20).rev().collect();
        json!({
            "beliefs": self.beliefs,
            "evidence_window_s": self.evidence_window_s,
            "evidence_recent": recent,
            "has_e3_verification": self.has_e3("verification"),
        })
    }
}
