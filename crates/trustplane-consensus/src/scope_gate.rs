// crates/trustplane-consensus/src/scope_gate.rs
// ============================================================================
// Module: Trustplane Scope Gate
// Description: Post-generation policy check classified by caller role level.
// Purpose: Keep professional-grade language away from unverified tiers.
// Dependencies: crate::verification, regex, serde
// ============================================================================

//! ## Overview
//! The scope gate is a pure function over `(answer_text, reasoning,
//! role_level, config)`. Config rules name a pattern, the minimum role level
//! allowed to see matching language, and a reason; low tiers additionally
//! require a disclaimer snippet. Violations at role level >= 2 yield REWRITE
//! with a suggested rewrite prompt; below that they yield REFUSE.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Regex;
use regex::RegexBuilder;
use serde::Deserialize;
use serde::Serialize;

use crate::verification::VerificationContext;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// One content rule inside the gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRule {
    /// Regex matched against the answer (and reasoning).
    pub pattern: String,
    /// Minimum role level allowed to see matching language.
    pub min_level: u8,
    /// Human-readable reason for the rule.
    pub reason: String,
}

/// Configurable content guard rules per domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeGateConfig {
    /// Domain label (`healthcare`, `legal`, `financial`, ...).
    pub domain: String,
    /// Block rules. Keep patterns reasonably specific to limit false
    /// positives.
    pub block_patterns: Vec<ScopeRule>,
    /// Whether low tiers require the disclaimer snippet.
    pub require_disclaimer_low_tier: bool,
    /// Disclaimer snippet required for role level <= 2.
    pub low_tier_disclaimer_snippet: String,
}

impl Default for ScopeGateConfig {
    fn default() -> Self {
        Self {
            domain: "general".to_string(),
            block_patterns: vec![
                ScopeRule {
                    pattern: r"\b(you are diagnosed with|diagnosis|prognosis|treatment plan)\b"
                        .to_string(),
                    min_level: 3,
                    reason: "Diagnostic/prognostic language".to_string(),
                },
                ScopeRule {
                    pattern: r"\b(expected return\s*\d+%|portfolio allocation|buy\s+[A-Z]{1,5}|sell\s+[A-Z]{1,5}|tax strategy)\b"
                        .to_string(),
                    min_level: 3,
                    reason: "Investment advice".to_string(),
                },
                ScopeRule {
                    pattern: r"\b(file a lawsuit|you should sue|settlement range|liability exposure)\b"
                        .to_string(),
                    min_level: 3,
                    reason: "Legal strategy/advice".to_string(),
                },
                ScopeRule {
                    pattern: r"\b(p-value|confidence interval|statistical significance|replication)\b"
                        .to_string(),
                    min_level: 4,
                    reason: "Advanced statistical detail".to_string(),
                },
            ],
            require_disclaimer_low_tier: true,
            low_tier_disclaimer_snippet: "This is general information only and not professional \
                                          advice. Consult a qualified expert."
                .to_string(),
        }
    }
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Scope-gate decision, ordered PASS < REWRITE < REFUSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateDecision {
    /// Content appropriate for the caller's tier.
    Pass,
    /// Content must be rewritten for the caller's tier.
    Rewrite,
    /// Content unsafe for the caller's tier.
    Refuse,
}

impl GateDecision {
    /// Canonical wire name of the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Rewrite => "REWRITE",
            Self::Refuse => "REFUSE",
        }
    }
}

/// One matched rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeViolation {
    /// Pattern that matched.
    pub pattern: String,
    /// Up to three normalized match samples.
    pub matches: Vec<String>,
    /// Role level the rule requires.
    pub required_level: u8,
    /// Rule reason.
    pub reason: String,
}

/// Result of one scope-gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeGateResult {
    /// Terminal decision.
    pub decision: GateDecision,
    /// Decision reason.
    pub reason: String,
    /// Matched violations.
    pub violations: Vec<ScopeViolation>,
    /// Disclaimer issue, if the required snippet was missing.
    pub disclaimer_issue: Option<String>,
    /// Suggested rewrite prompt when the decision is REWRITE.
    pub suggested_rewrite_prompt: Option<String>,
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Compiles a rule pattern case-insensitively; invalid patterns never match.
fn compile_rule(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern).case_insensitive(true).build().ok()
}

/// Evaluates the scope gate over an answer and its reasoning trace.
///
/// Pure function of its arguments; ledger emission is the caller's concern.
#[must_use]
pub fn evaluate_scope_gate(
    answer: &str,
    reasoning: &[String],
    verification: &VerificationContext,
    config: &ScopeGateConfig,
) -> ScopeGateResult {
    let role_level = verification.role_level;
    let mut full_text = answer.to_string();
    if !reasoning.is_empty() {
        full_text.push(' ');
        full_text.push_str(&reasoning.join(" "));
    }

    let mut violations = Vec::new();
    for rule in &config.block_patterns {
        let Some(regex) = compile_rule(&rule.pattern) else {
            continue;
        };
        let matches: Vec<String> =
            regex.find_iter(&full_text).take(3).map(|found| found.as_str().to_string()).collect();
        if !matches.is_empty() && role_level < rule.min_level {
            violations.push(ScopeViolation {
                pattern: rule.pattern.clone(),
                matches,
                required_level: rule.min_level,
                reason: rule.reason.clone(),
            });
        }
    }

    let disclaimer_issue = if config.require_disclaimer_low_tier
        && role_level <= 2
        && !full_text.to_lowercase().contains(&config.low_tier_disclaimer_snippet.to_lowercase())
    {
        Some("Missing required low-tier disclaimer".to_string())
    } else {
        None
    };

    if violations.is_empty() && disclaimer_issue.is_none() {
        return ScopeGateResult {
            decision: GateDecision::Pass,
            reason: "Content appropriate for verified role".to_string(),
            violations,
            disclaimer_issue,
            suggested_rewrite_prompt: None,
        };
    }

    if role_level >= 2 {
        let truncated: String = full_text.chars().take(800).collect();
        let rewrite_prompt = format!(
            "Rewrite the output to be safe and appropriate for role_level {role_level} ({}). \
             Remove diagnostic, prognostic, prescriptive, strategic, or probabilistic language. \
             Add this disclaimer at the top: \"{}\". Keep helpful general information only. Be \
             concise. Original output: {truncated}...",
            verification.role.as_str(),
            config.low_tier_disclaimer_snippet,
        );
        return ScopeGateResult {
            decision: GateDecision::Rewrite,
            reason: format!("Scope violations for role_level {role_level}"),
            violations,
            disclaimer_issue,
            suggested_rewrite_prompt: Some(rewrite_prompt),
        };
    }

    ScopeGateResult {
        decision: GateDecision::Refuse,
        reason: "Output contains content unsafe for public/unverified users".to_string(),
        violations,
        disclaimer_issue,
        suggested_rewrite_prompt: None,
    }
}
