// crates/trustplane-core/src/core/input.rs
// ============================================================================
// Module: Trustplane Input Vector
// Description: Deterministic per-turn input analysis record.
// Purpose: Capture everything routing is allowed to see about a user turn.
// Dependencies: crate::core::hashing, serde
// ============================================================================

//! ## Overview
//! Routing is a pure function of `(InputVector, SessionState)`. The input
//! vector therefore captures the full safety verdict, domain tag, and
//! complexity analysis for a turn, and is embedded verbatim in the EPACK
//! payload so replay can re-derive the route.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Domain Tag
// ============================================================================

/// Coarse domain classification of a user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainTag {
    /// Everyday informational queries.
    General,
    /// Software / engineering queries.
    Technical,
    /// Medical, legal, financial, or self-harm adjacent queries.
    HighStakes,
}

impl DomainTag {
    /// Canonical wire name of the domain tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::Technical => "TECHNICAL",
            Self::HighStakes => "HIGH_STAKES",
        }
    }
}

// ============================================================================
// SECTION: Safety Verdicts
// ============================================================================

/// Result of the stage-1 pattern screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage1Verdict {
    /// True when no blocked pattern matched.
    pub ok: bool,
    /// `pass` or `matched:<pattern>` for auditability.
    pub reason: String,
}

/// Result of the stage-2 embedding screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage2Verdict {
    /// True when the risk score stayed below the configured threshold.
    pub ok: bool,
    /// Risk score in [0, 1]; higher means closer to the violation exemplars.
    pub score: f64,
    /// Threshold the score was gated against.
    pub threshold: f64,
    /// Embedding model identifier used for the comparison.
    pub model: String,
}

// ============================================================================
// SECTION: Input Vector
// ============================================================================

/// Deterministic analysis of a single user turn.
///
/// # Invariants
/// - `safe == stage1.ok && stage2.ok`.
/// - `requires_scaffold` implies `requires_reflect` (threshold B > A).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputVector {
    /// Raw user text for this turn.
    pub user_text: String,
    /// Canonical hash of the user text.
    pub user_text_hash: String,
    /// Stage-1 pattern screen verdict.
    pub stage1: Stage1Verdict,
    /// Stage-2 embedding screen verdict.
    pub stage2: Stage2Verdict,
    /// Combined safety verdict.
    pub safe: bool,
    /// Domain classification.
    pub domain: DomainTag,
    /// Complexity bucket derived from token count.
    pub complexity: u32,
    /// True when complexity reaches the reflect threshold.
    pub requires_reflect: bool,
    /// True when complexity reaches the scaffold threshold.
    pub requires_scaffold: bool,
}

/// Complexity at or above which a REFLECT confirmation is required.
pub const REFLECT_COMPLEXITY_THRESHOLD: u32 = 6;

/// Complexity at or above which a SCAFFOLD approval is required.
pub const SCAFFOLD_COMPLEXITY_THRESHOLD: u32 = 7;

/// Buckets a turn's complexity by whitespace token count.
#[must_use]
pub fn estimate_complexity(text: &str) -> u32 {
    let tokens = text.split_whitespace().count();
    if tokens <= 8 {
        2
    } else if tokens <= 25 {
        4
    } else if tokens <= 60 {
        6
    } else {
        8
    }
}

/// Detects the coarse domain of a turn by keyword.
#[must_use]
pub fn detect_domain(text: &str) -> DomainTag {
    let lower = text.to_lowercase();
    const HIGH_STAKES: [&str; 5] = ["dosage", "legal advice", "suicide", "harm myself", "insulin"];
    const TECHNICAL: [&str; 6] =
        ["architecture", "database", "api", "kubernetes", "python", "code"];
    if HIGH_STAKES.iter().any(|needle| lower.contains(needle)) {
        return DomainTag::HighStakes;
    }
    if TECHNICAL.iter().any(|needle| lower.contains(needle)) {
        return DomainTag::Technical;
    }
    DomainTag::General
}
