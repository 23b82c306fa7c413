// crates/trustplane-core/src/runtime/replay.rs
// ============================================================================
// Module: Trustplane Replay Engine
// Description: Deterministic reproducibility verification of EPACK records.
// Purpose: Classify each record as VERIFIED, DRIFT, or TAMPER_DETECTED.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! Replay verifies a sealed record without any network or model calls: the
//! record hash, the Decision Object commitment, optional routing and safety
//! determinism (via caller-supplied pure functions), provenance presence, and
//! chain linkage. Classification is terminal and explicit: hash failures
//! are TAMPER_DETECTED, environment divergence with intact hashes is DRIFT,
//! and silent divergence is forbidden.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::core::decision::compute_decision_hash_value;
use crate::core::epack::EpackRecord;
use crate::core::epack::epack_hash;
use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::stable_hash;

// ============================================================================
// SECTION: Replay Types
// ============================================================================

/// One verification step inside a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayStep {
    /// Step name.
    pub step_name: String,
    /// Abbreviated original value.
    pub original_value: String,
    /// Abbreviated replayed value.
    pub replayed_value: String,
    /// Whether the step verified.
    pub matched: bool,
    /// Step detail for audit output.
    pub detail: String,
}

impl ReplayStep {
    /// Builds a step verdict.
    fn new(
        step_name: &str,
        original_value: impl Into<String>,
        replayed_value: impl Into<String>,
        matched: bool,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            step_name: step_name.to_string(),
            original_value: original_value.into(),
            replayed_value: replayed_value.into(),
            matched,
            detail: detail.into(),
        }
    }
}

/// Terminal replay classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplayOutcome {
    /// All steps pass and no drift.
    Verified,
    /// Record hashes pass but environment/routing differ.
    Drift,
    /// A hash-based step failed.
    TamperDetected,
}

/// Result of replaying one EPACK record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Deterministic replay identifier.
    pub replay_id: String,
    /// Sequence number of the replayed record.
    pub epack_seq: u64,
    /// Step verdicts in evaluation order.
    pub steps: Vec<ReplayStep>,
    /// Fraction of passing steps, scaled to [0, 100].
    pub determinism_index: f64,
    /// True when every step verified.
    pub governance_match: bool,
    /// True when routing replayed identically (or was skipped).
    pub route_match: bool,
    /// True when safety replayed identically (or was skipped).
    pub safety_match: bool,
    /// True when chain linkage verified (or was not checked).
    pub chain_link_match: bool,
    /// Terminal classification.
    pub outcome: ReplayOutcome,
}

/// Pure routing function over a recorded input vector.
pub type RouteFn<'a> = &'a dyn Fn(&Value) -> String;

/// Pure safety function over a recorded input vector.
pub type SafetyFn<'a> = &'a dyn Fn(&Value) -> bool;

/// Options controlling a replay pass.
#[derive(Default)]
pub struct ReplayOptions<'a> {
    /// Hash algorithm the chain was sealed with.
    pub algorithm: HashAlgorithm,
    /// Optional routing-determinism function.
    pub route_fn: Option<RouteFn<'a>>,
    /// Optional safety-determinism function.
    pub safety_fn: Option<SafetyFn<'a>>,
    /// Expected `prev_hash` for chain-linkage verification.
    pub expected_prev_hash: Option<&'a str>,
}

impl std::fmt::Debug for ReplayOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayOptions")
            .field("algorithm", &self.algorithm)
            .field("route_fn", &self.route_fn.is_some())
            .field("safety_fn", &self.safety_fn.is_some())
            .field("expected_prev_hash", &self.expected_prev_hash)
            .finish()
    }
}

/// Abbreviates a hash for step output.
fn abbrev(hash: &str) -> String {
    if hash.is_empty() {
        "MISSING".to_string()
    } else if hash.len() > 16 {
        format!("{}...", &hash[..16])
    } else {
        hash.to_string()
    }
}

// ============================================================================
// SECTION: Record Replay
// ============================================================================

/// Replays one EPACK record through every verification step.
#[must_use]
#[allow(
    clippy::too_many_lines,
    reason = "Single linear flow keeps the verification steps in normative order."
)]
pub fn replay_record(record: &EpackRecord, options: &ReplayOptions<'_>) -> ReplayResult {
    let payload = &record.payload;
    let extra = payload.get("extra").cloned().unwrap_or_else(|| json!({}));
    let mut steps: Vec<ReplayStep> = Vec::with_capacity(8);

    // Step 1: EPACK hash integrity.
    let recomputed = epack_hash(
        options.algorithm,
        record.seq,
        record.ts,
        &record.prev_hash,
        &record.payload_hash,
        payload,
    )
    .unwrap_or_default();
    let hash_match = record.hash == recomputed;
    steps.push(ReplayStep::new(
        "epack_hash_integrity",
        abbrev(&record.hash),
        abbrev(&recomputed),
        hash_match,
        if hash_match { "Hash chain integrity" } else { "TAMPERED: hash mismatch" },
    ));

    // Step 2: commitment check (payload_hash commits to decision_hash).
    let claimed = payload.get("decision_hash").and_then(Value::as_str).unwrap_or("");
    let commitment_ok = claimed.is_empty() || claimed == record.payload_hash;
    steps.push(ReplayStep::new(
        "payload_hash_commitment",
        if claimed.is_empty() { "NONE".to_string() } else { abbrev(claimed) },
        abbrev(&record.payload_hash),
        commitment_ok,
        if commitment_ok {
            "payload_hash commits to decision_hash"
        } else {
            "BROKEN: decision_hash != payload_hash"
        },
    ));

    // Step 3: Decision Object integrity.
    let (decision_ok, decision_original, decision_replayed, decision_detail) =
        match payload.get("decision_object") {
            Some(decision) => match compute_decision_hash_value(decision) {
                Ok(recomputed_decision) => {
                    let matched = recomputed_decision == record.payload_hash;
                    (
                        matched,
                        abbrev(&record.payload_hash),
                        abbrev(&recomputed_decision),
                        if matched {
                            "decision_object hash matches payload_hash".to_string()
                        } else {
                            "BROKEN: decision_object hash mismatch".to_string()
                        },
                    )
                }
                Err(err) => (
                    false,
                    abbrev(&record.payload_hash),
                    "ERROR".to_string(),
                    format!("ERROR: {err}"),
                ),
            },
            None => (
                true,
                abbrev(&record.payload_hash),
                "SKIPPED".to_string(),
                "Decision Object not present — skipped".to_string(),
            ),
        };
    steps.push(ReplayStep::new(
        "decision_object_integrity",
        decision_original,
        decision_replayed,
        decision_ok,
        decision_detail,
    ));

    // Step 4: routing determinism (optional).
    let original_route = extra
        .get("route")
        .and_then(|route| route.get("seq"))
        .and_then(Value::as_array)
        .and_then(|seq| seq.first())
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_string();
    let route_match = match options.route_fn {
        Some(route_fn) => {
            let input_vector = extra.get("iv").cloned().unwrap_or_else(|| json!({}));
            let replayed_route = route_fn(&input_vector);
            let matched = original_route == replayed_route;
            steps.push(ReplayStep::new(
                "routing_determinism",
                original_route.clone(),
                replayed_route,
                matched,
                if matched { "Route reproduced" } else { "DIVERGED: route mismatch" },
            ));
            matched
        }
        None => {
            steps.push(ReplayStep::new(
                "routing_determinism",
                original_route,
                "(route_fn not provided — skipped)",
                true,
                "Routing replay skipped; no route_fn",
            ));
            true
        }
    };

    // Step 5: safety determinism (optional).
    let original_safe = extra
        .get("iv")
        .and_then(|iv| iv.get("stage1"))
        .and_then(|stage1| stage1.get("ok"))
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let safety_match = match options.safety_fn {
        Some(safety_fn) => {
            let input_vector = extra.get("iv").cloned().unwrap_or_else(|| json!({}));
            let replayed_safe = safety_fn(&input_vector);
            let matched = original_safe == replayed_safe;
            steps.push(ReplayStep::new(
                "safety_screening",
                original_safe.to_string(),
                replayed_safe.to_string(),
                matched,
                if matched { "Safety verdict reproduced" } else { "DIVERGED: safety mismatch" },
            ));
            matched
        }
        None => {
            steps.push(ReplayStep::new(
                "safety_screening",
                original_safe.to_string(),
                "(safety_fn not provided — skipped)",
                true,
                "Safety replay skipped; no safety_fn",
            ));
            true
        }
    };

    // Step 6: profile presence.
    let profile = payload.get("profile").and_then(Value::as_str);
    steps.push(ReplayStep::new(
        "profile_consistency",
        profile.unwrap_or("MISSING"),
        if profile.is_some() { "present" } else { "MISSING" },
        profile.is_some(),
        profile.map_or_else(|| "No profile recorded".to_string(), |name| format!("Profile: {name}")),
    ));

    // Step 7: build manifest presence.
    let manifest_hash = payload
        .get("build_manifest")
        .and_then(|manifest| manifest.get("manifest_hash"))
        .and_then(Value::as_str);
    steps.push(ReplayStep::new(
        "build_manifest",
        manifest_hash.map_or_else(|| "MISSING".to_string(), abbrev),
        if manifest_hash.is_some() { "present" } else { "MISSING" },
        manifest_hash.is_some(),
        if manifest_hash.is_some() { "Provenance traceable" } else { "No build manifest" },
    ));

    // Step 8: chain linkage (when an expected prev hash is supplied).
    let chain_link_match = match options.expected_prev_hash {
        Some(expected) => {
            let matched = record.prev_hash == expected;
            steps.push(ReplayStep::new(
                "chain_linkage",
                abbrev(&record.prev_hash),
                abbrev(expected),
                matched,
                if matched { "Chain continuity" } else { "BROKEN: prev_hash mismatch" },
            ));
            matched
        }
        None => true,
    };

    let matched = steps.iter().filter(|step| step.matched).count();
    #[allow(clippy::cast_precision_loss, reason = "Step counts are far below 2^52.")]
    let determinism_index = if steps.is_empty() {
        0.0
    } else {
        ((matched as f64 / steps.len() as f64) * 1000.0).round() / 10.0
    };
    let governance_match = matched == steps.len();

    let tampered = !hash_match || !commitment_ok || !decision_ok || !chain_link_match;
    let outcome = if tampered {
        ReplayOutcome::TamperDetected
    } else if governance_match {
        ReplayOutcome::Verified
    } else {
        ReplayOutcome::Drift
    };

    let replay_id = stable_hash(
        options.algorithm,
        &json!({ "seq": record.seq, "hash": record.hash }),
    )
    .map_or_else(|_| String::new(), |hash| hash[..16].to_string());

    ReplayResult {
        replay_id,
        epack_seq: record.seq,
        steps,
        determinism_index,
        governance_match,
        route_match,
        safety_match,
        chain_link_match,
        outcome,
    }
}

// ============================================================================
// SECTION: Chain Replay
// ============================================================================

/// Replays a full chain, threading the expected previous hash.
#[must_use]
pub fn replay_chain(chain: &[EpackRecord], options: &ReplayOptions<'_>) -> Vec<ReplayResult> {
    let mut results = Vec::with_capacity(chain.len());
    let mut prev_hash: Option<String> = None;
    for record in chain {
        let step_options = ReplayOptions {
            algorithm: options.algorithm,
            route_fn: options.route_fn,
            safety_fn: options.safety_fn,
            expected_prev_hash: prev_hash.as_deref(),
        };
        results.push(replay_record(record, &step_options));
        prev_hash = Some(record.hash.clone());
    }
    results
}

// ============================================================================
// SECTION: Summary
// ============================================================================

/// Aggregated replay outcome for a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Number of replayed records.
    pub total: u64,
    /// Mean determinism index.
    pub determinism_index: f64,
    /// Fraction of records with full governance match.
    pub governance_match_rate: f64,
    /// Fraction of records with route match.
    pub route_match_rate: f64,
    /// Fraction of records with safety match.
    pub safety_match_rate: f64,
    /// Fraction of records with chain linkage intact.
    pub chain_link_rate: f64,
    /// Sequence numbers of records that failed governance match.
    pub tampered_records: Vec<u64>,
}

/// Summarizes a chain replay.
#[must_use]
pub fn replay_summary(results: &[ReplayResult]) -> ReplaySummary {
    if results.is_empty() {
        return ReplaySummary {
            total: 0,
            determinism_index: 0.0,
            governance_match_rate: 0.0,
            route_match_rate: 0.0,
            safety_match_rate: 0.0,
            chain_link_rate: 0.0,
            tampered_records: Vec::new(),
        };
    }
    #[allow(clippy::cast_precision_loss, reason = "Chain lengths are far below 2^52.")]
    let total = results.len() as f64;
    let rate = |count: usize| count as f64 / total;
    ReplaySummary {
        total: results.len() as u64,
        determinism_index: ((results.iter().map(|result| result.determinism_index).sum::<f64>()
            / total)
            * 10.0)
            .round()
            / 10.0,
        governance_match_rate: rate(results.iter().filter(|result| result.governance_match).count()),
        route_match_rate: rate(results.iter().filter(|result| result.route_match).count()),
        safety_match_rate: rate(results.iter().filter(|result| result.safety_match).count()),
        chain_link_rate: rate(results.iter().filter(|result| result.chain_link_match).count()),
        tampered_records: results
            .iter()
            .filter(|result| !result.governance_match)
            .map(|result| result.epack_seq)
            .collect(),
    }
}
