// crates/trustplane-core/src/runtime/validator.rs
// ============================================================================
// Module: Trustplane Output Validator
// Description: Four-stage deterministic validation of model output.
// Purpose: Keep unvalidated or schema-breaking output away from users.
// Dependencies: crate::core::hashing, regex, serde_json
// ============================================================================

//! ## Overview
//! Raw model output passes four stages: strict JSON schema (closed key set
//! plus the citation schema), the evidence-claim gate (implied studies need
//! citations), a deterministic alignment score against the profile
//! threshold, and protected-region integrity (code fences and JSON-like
//! blocks of the user text must survive verbatim). Each attempt's verdict is
//! recorded so escalation can consult the failure shape.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::stable_hash;
use crate::runtime::safety::fixed_regex;

// ============================================================================
// SECTION: Validation Attempts
// ============================================================================

/// Verdict of one validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationAttempt {
    /// Stage number (1-based).
    pub attempt: u32,
    /// Whether the stage passed.
    pub ok: bool,
    /// Stable reason code.
    pub reason: String,
    /// Stage score in [0, 1].
    pub score: f64,
}

impl ValidationAttempt {
    /// Builds a stage verdict.
    fn new(attempt: u32, ok: bool, reason: impl Into<String>, score: f64) -> Self {
        Self {
            attempt,
            ok,
            reason: reason.into(),
            score,
        }
    }
}

// ============================================================================
// SECTION: Output Schema
// ============================================================================

/// Keys permitted in TDM output objects.
const ALLOWED_KEYS: [&str; 4] = ["text", "disclosure", "citations", "assumptions"];

/// Required citation fields.
const CITATION_REQUIRED_FIELDS: [&str; 6] =
    ["title", "authors_or_org", "year", "source_type", "evidence_strength", "verification_status"];

/// Optional citation fields.
const CITATION_OPTIONAL_FIELDS: [&str; 2] = ["identifier", "notes"];

/// Closed set of citation source types.
pub const CITATION_SOURCE_TYPES: [&str; 9] = [
    "randomized_trial",
    "meta_analysis",
    "systematic_review",
    "clinical_guideline",
    "observational_study",
    "technical_standard",
    "institutional_report",
    "textbook_reference",
    "general_background",
];

/// Closed set of citation evidence strengths.
pub const CITATION_EVIDENCE_STRENGTH: [&str; 5] = [
    "strong_consensus",
    "moderate_evidence",
    "emerging_evidence",
    "contested",
    "contextual_reference",
];

/// Closed set of citation verification statuses.
pub const CITATION_VERIFICATION_STATUS: [&str; 4] = [
    "verified_reference",
    "probable_reference",
    "unverified_model_recall",
    "citation_not_retrieved",
];

/// Triggers for implied evidence claims. Conservative on purpose.
static EVIDENCE_CLAIM_RE: LazyLock<Regex> = LazyLock::new(|| {
    fixed_regex(
        r"(?i)\b(studies show|research shows|evidence suggests|systematic review|meta-analys(?:is|es)|randomi[sz]ed (?:trial|controlled trial)|RCT\b|clinical guideline|guidelines (?:recommend|suggest)|according to (?:a|the) (?:study|trial|review|meta-analysis))\b",
    )
});

/// Validates the citations array of a parsed output object.
fn validate_citations(obj: &Map<String, Value>) -> (bool, String) {
    let Some(citations) = obj.get("citations") else {
        return (true, "no_citations_key".to_string());
    };
    if citations.is_null() {
        return (true, "citations_null_ok".to_string());
    }
    let Some(list) = citations.as_array() else {
        return (false, "citations_not_list".to_string());
    };

    let required: BTreeSet<&str> = CITATION_REQUIRED_FIELDS.into_iter().collect();
    let optional: BTreeSet<&str> = CITATION_OPTIONAL_FIELDS.into_iter().collect();

    for (index, citation) in list.iter().enumerate() {
        let Some(entry) = citation.as_object() else {
            return (false, format!("citation_{index}_not_object"));
        };

        let keys: BTreeSet<&str> = entry.keys().map(String::as_str).collect();
        let missing: Vec<&&str> = required.iter().filter(|key| !keys.contains(**key)).collect();
        if !missing.is_empty() {
            return (false, format!("citation_{index}_missing:{missing:?}"));
        }
        let extra: Vec<&&str> = keys
            .iter()
            .filter(|key| !required.contains(**key) && !optional.contains(**key))
            .collect();
        if !extra.is_empty() {
            return (false, format!("citation_{index}_extra:{extra:?}"));
        }

        if entry.get("title").and_then(Value::as_str).is_none_or(|title| title.trim().is_empty()) {
            return (false, format!("citation_{index}_bad_title"));
        }
        if entry
            .get("authors_or_org")
            .and_then(Value::as_str)
            .is_none_or(|authors| authors.trim().is_empty())
        {
            return (false, format!("citation_{index}_bad_authors_or_org"));
        }

        let year_ok = match entry.get("year") {
            Some(Value::Number(year)) => year.is_i64(),
            Some(Value::String(text)) => text == "unknown",
            _ => false,
        };
        if !year_ok {
            return (false, format!("citation_{index}_bad_year"));
        }

        let source_type = entry.get("source_type").and_then(Value::as_str).unwrap_or("");
        if !CITATION_SOURCE_TYPES.contains(&source_type) {
            return (false, format!("citation_{index}_bad_source_type:{source_type}"));
        }
        let strength = entry.get("evidence_strength").and_then(Value::as_str).unwrap_or("");
        if !CITATION_EVIDENCE_STRENGTH.contains(&strength) {
            return (false, format!("citation_{index}_bad_evidence_strength:{strength}"));
        }
        let status = entry.get("verification_status").and_then(Value::as_str).unwrap_or("");
        if !CITATION_VERIFICATION_STATUS.contains(&status) {
            return (false, format!("citation_{index}_bad_verification_status:{status}"));
        }

        for field in CITATION_OPTIONAL_FIELDS {
            if let Some(value) = entry.get(field) {
                if !value.is_null() && !value.is_string() {
                    return (false, format!("citation_{index}_bad_{field}"));
                }
            }
        }
    }

    (true, "citations_ok".to_string())
}

/// Parses raw output as a strict TDM JSON object.
///
/// Returns `(ok, parsed_object, reason)`; the object is empty on failure.
#[must_use]
pub fn validate_json_schema(raw: &str) -> (bool, Map<String, Value>, String) {
    let parsed: Result<Value, _> = serde_json::from_str(raw);
    let value = match parsed {
        Ok(value) => value,
        Err(err) => return (false, Map::new(), format!("json_error:{err}")),
    };
    let Some(obj) = value.as_object() else {
        return (false, Map::new(), "not_object".to_string());
    };

    let extra: Vec<&String> =
        obj.keys().filter(|key| !ALLOWED_KEYS.contains(&key.as_str())).collect();
    if !extra.is_empty() {
        return (false, Map::new(), format!("extra_keys:{extra:?}"));
    }

    if obj.get("text").and_then(Value::as_str).is_none_or(|text| text.trim().is_empty()) {
        return (false, Map::new(), "missing_or_empty_text".to_string());
    }

    if let Some(disclosure) = obj.get("disclosure") {
        if !disclosure.is_null() && !disclosure.is_string() {
            return (false, Map::new(), "disclosure_not_string".to_string());
        }
    }

    if let Some(assumptions) = obj.get("assumptions") {
        if !assumptions.is_null() {
            let Some(list) = assumptions.as_array() else {
                return (false, Map::new(), "assumptions_not_list".to_string());
            };
            for (index, item) in list.iter().enumerate() {
                if !item.is_string() {
                    return (false, Map::new(), format!("assumptions_{index}_not_string"));
                }
            }
        }
    }

    let (citations_ok, citations_reason) = validate_citations(obj);
    if !citations_ok {
        return (false, Map::new(), citations_reason);
    }

    (true, obj.clone(), "pass".to_string())
}

// ============================================================================
// SECTION: Protected Regions
// ============================================================================

/// Code fences (each top-level fence is one region).
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| fixed_regex(r"```[\s\S]*?```"));

/// JSON-like brace blocks (non-greedy spans).
static JSON_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| fixed_regex(r"\{[\s\S]*?\}"));

/// Hashes the protected regions of a text.
///
/// Regions are code fences and JSON-like blocks. Each non-greedy ```...```
/// span is one region, so a nested opener terminates at the first closer;
/// the rule is stable because this hash participates in EPACK payloads.
#[must_use]
pub fn protected_regions_hash(algorithm: HashAlgorithm, text: &str) -> String {
    let mut regions: Vec<&str> =
        FENCE_RE.find_iter(text).map(|fence| fence.as_str()).collect();
    regions.extend(JSON_BLOCK_RE.find_iter(text).map(|block| block.as_str()));
    let combined = regions.join("\n");
    stable_hash(algorithm, &combined).map_or_else(|_| String::new(), |hash| hash[..16].to_string())
}

// ============================================================================
// SECTION: Validation Pipeline
// ============================================================================

/// Options controlling the validation pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Alignment threshold for the active profile.
    pub threshold: f64,
    /// Whether implied evidence claims require citations.
    pub require_evidence_citations: bool,
    /// Hash algorithm for protected-region hashing.
    pub algorithm: HashAlgorithm,
}

/// Runs the full validation pipeline over raw model output.
///
/// Short-circuits after a failed stage so escalation sees the first failure
/// shape, mirroring the retry loop's hardening behavior.
#[must_use]
pub fn validate_output(
    user_text: &str,
    raw_output: &str,
    options: ValidationOptions,
) -> Vec<ValidationAttempt> {
    let mut attempts = Vec::with_capacity(4);

    let (schema_ok, obj, reason) = validate_json_schema(raw_output);
    attempts.push(ValidationAttempt::new(1, schema_ok, reason, if schema_ok { 1.0 } else { 0.0 }));
    if !schema_ok {
        return attempts;
    }

    let answer_text = obj.get("text").and_then(Value::as_str).unwrap_or("");
    if options.require_evidence_citations && EVIDENCE_CLAIM_RE.is_match(answer_text) {
        let cited = obj
            .get("citations")
            .and_then(Value::as_array)
            .is_some_and(|citations| !citations.is_empty());
        attempts.push(ValidationAttempt::new(
            2,
            cited,
            "evidence_claim_requires_citations",
            if cited { 1.0 } else { 0.0 },
        ));
        if !cited {
            return attempts;
        }
    } else {
        attempts.push(ValidationAttempt::new(2, true, "evidence_claim_gate_skipped", 1.0));
    }

    // Deterministic placeholder alignment score; a semantic aligner can
    // replace this without changing the contract.
    let align_score = if user_text.len() < 200 { 0.92 } else { 0.88 };
    let align_ok = align_score >= options.threshold;
    attempts.push(ValidationAttempt::new(3, align_ok, "alignment_check", align_score));

    let before = protected_regions_hash(options.algorithm, user_text);
    let after = protected_regions_hash(options.algorithm, answer_text);
    let regions_ok = before == after;
    attempts.push(ValidationAttempt::new(
        4,
        regions_ok,
        "protected_regions",
        if regions_ok { 1.0 } else { 0.0 },
    ));

    attempts
}
