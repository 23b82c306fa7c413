// crates/trustplane-core/src/core/decision.rs
// ============================================================================
// Module: Trustplane Decision Object
// Description: Canonical, self-sealed description of a governance decision.
// Purpose: Commit each governed turn to a single replayable hash.
// Dependencies: crate::core::{hashing, manifest}, serde, serde_json
// ============================================================================

//! ## Overview
//! One Decision Object is built per governed turn. Its canonical payload hash
//! is computed with `integrity.canonical_payload_hash` set to the empty
//! string, then written back into that field (the self-referential seal).
//! The EPACK record for the turn commits to this hash via `payload_hash`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_text;
use crate::core::hashing::stable_hash;
use crate::core::manifest::BuildManifest;
use crate::core::manifest::KERNEL_NAME;

// ============================================================================
// SECTION: Schema Constants
// ============================================================================

/// Decision Object schema identifier.
pub const DECISION_SCHEMA_ID: &str = "trustplane-governance/decision";

/// Decision Object schema version.
pub const DECISION_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// SECTION: Decision Object Sections
// ============================================================================

/// Session context for a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionContext {
    /// Session identifier.
    pub session_id: String,
    /// Workspace identifier when known at this layer.
    pub workspace_id: Option<String>,
    /// User identifier when known at this layer.
    pub user_id: Option<String>,
    /// Assurance profile active for the turn.
    pub profile: Option<String>,
}

/// Input commitment for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionInput {
    /// Hash of the user prompt.
    pub prompt_hash: String,
    /// Attachment descriptors, if any.
    pub attachments: Vec<Value>,
}

/// Routing summary for a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRouting {
    /// Routing mode label.
    pub mode: String,
    /// Routing strategy label.
    pub strategy: String,
    /// Providers consulted for the turn.
    pub providers: Vec<String>,
}

/// Policy snapshot for a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    /// Active policy identifier.
    pub policy_id: String,
    /// Hash of the active policy document.
    pub policy_hash: String,
    /// Assurance profile active for the turn.
    pub profile: Option<String>,
    /// Constraint labels applied during the turn.
    pub constraints_applied: Vec<String>,
}

/// Output commitment for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutput {
    /// Hash of the final assistant text.
    pub final_text_hash: String,
    /// Final output format label, if structured.
    pub final_format: Option<String>,
    /// Final confidence, if the consensus layer produced one.
    pub confidence: Option<f64>,
    /// Dissent summary from validators/challenger.
    pub dissent: Value,
}

/// Integrity section carrying the self-referential seal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionIntegrity {
    /// Algorithm used for the canonical payload hash.
    pub canonical_payload_hash_alg: String,
    /// The self-referential seal (empty string while hashing).
    pub canonical_payload_hash: String,
    /// Hash of the previous turn's decision, if any.
    pub prev_decision_hash: Option<String>,
    /// Hash of the EPACK block sealing this decision, once known.
    pub epack_block_hash: Option<String>,
}

/// Build provenance section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionBuild {
    /// Kernel identifier.
    pub kernel: String,
    /// Kernel version.
    pub kernel_version: String,
    /// Hash of the build manifest.
    pub manifest_hash: String,
}

// ============================================================================
// SECTION: Decision Object
// ============================================================================

/// Canonicalized, self-sealed description of one governance decision.
///
/// # Invariants
/// - `integrity.canonical_payload_hash` equals the canonical-JSON hash of
///   this object with that field set to the empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionObject {
    /// Schema identifier.
    pub schema_id: String,
    /// Schema version.
    pub schema_version: u32,
    /// Deterministic decision identifier.
    pub decision_id: String,
    /// Unix seconds when the decision was sealed.
    pub created_at: u64,
    /// Session context.
    pub context: DecisionContext,
    /// Input commitment.
    pub input: DecisionInput,
    /// Routing summary.
    pub routing: DecisionRouting,
    /// Policy snapshot.
    pub policy: DecisionPolicy,
    /// Opaque per-stage records.
    pub stages: Value,
    /// Output commitment.
    pub output: DecisionOutput,
    /// Integrity seal.
    pub integrity: DecisionIntegrity,
    /// Build provenance.
    pub build: DecisionBuild,
}

/// Inputs required to build a Decision Object for a sealed turn.
#[derive(Debug, Clone)]
pub struct DecisionInputs<'a> {
    /// Session identifier.
    pub session_id: &'a str,
    /// EPACK sequence number being sealed (used in the decision id).
    pub epack_seq: u64,
    /// Turn payload the decision summarizes.
    pub payload: &'a Value,
    /// Final assistant text for the turn.
    pub assistant_text: &'a str,
    /// Build manifest for the running kernel.
    pub build_manifest: &'a BuildManifest,
    /// Assurance profile label, if known.
    pub profile: Option<&'a str>,
    /// Previous decision hash, if any.
    pub prev_decision_hash: Option<&'a str>,
    /// Unix seconds at sealing time.
    pub created_at: u64,
}

/// Builds a sealed Decision Object and returns it with its canonical hash.
///
/// The object is first populated with an empty seal, hashed, and the digest
/// written back into `integrity.canonical_payload_hash`.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn build_decision_object(
    algorithm: HashAlgorithm,
    inputs: &DecisionInputs<'_>,
) -> Result<(DecisionObject, String), HashError> {
    let payload = inputs.payload;
    let prompt = payload.get("prompt").and_then(Value::as_str).unwrap_or("");
    let profile = inputs.profile.map(ToString::to_string);

    let routing = payload.get("routing").and_then(Value::as_object).map_or_else(
        || DecisionRouting {
            mode: "Balanced".to_string(),
            strategy: "Balanced".to_string(),
            providers: Vec::new(),
        },
        |routing| DecisionRouting {
            mode: routing
                .get("mode")
                .and_then(Value::as_str)
                .unwrap_or("Balanced")
                .to_string(),
            strategy: routing
                .get("strategy")
                .and_then(Value::as_str)
                .unwrap_or("Balanced")
                .to_string(),
            providers: routing
                .get("providers")
                .and_then(Value::as_array)
                .map(|providers| {
                    providers
                        .iter()
                        .filter_map(Value::as_str)
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        },
    );

    let policy_value = payload.get("policy").cloned().unwrap_or_else(|| json!({}));
    let policy = DecisionPolicy {
        policy_id: policy_value
            .get("policy_id")
            .and_then(Value::as_str)
            .unwrap_or("trustplane")
            .to_string(),
        policy_hash: stable_hash(algorithm, &policy_value)?,
        profile: profile.clone(),
        constraints_applied: payload
            .get("constraints_applied")
            .and_then(Value::as_array)
            .map(|constraints| {
                constraints.iter().filter_map(Value::as_str).map(ToString::to_string).collect()
            })
            .unwrap_or_default(),
    };

    let mut decision = DecisionObject {
        schema_id: DECISION_SCHEMA_ID.to_string(),
        schema_version: DECISION_SCHEMA_VERSION,
        decision_id: format!("decision-{}-{}", inputs.session_id, inputs.epack_seq),
        created_at: inputs.created_at,
        context: DecisionContext {
            session_id: inputs.session_id.to_string(),
            workspace_id: None,
            user_id: None,
            profile,
        },
        input: DecisionInput {
            prompt_hash: hash_text(algorithm, prompt),
            attachments: payload
                .get("attachments")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        },
        routing,
        policy,
        stages: payload.get("stages").cloned().unwrap_or_else(|| json!({})),
        output: DecisionOutput {
            final_text_hash: hash_text(algorithm, inputs.assistant_text),
            final_format: payload
                .get("final_format")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            confidence: payload.get("confidence").and_then(Value::as_f64),
            dissent: payload.get("dissent").cloned().unwrap_or_else(|| json!({})),
        },
        integrity: DecisionIntegrity {
            canonical_payload_hash_alg: algorithm.as_str().to_string(),
            canonical_payload_hash: String::new(),
            prev_decision_hash: inputs.prev_decision_hash.map(ToString::to_string),
            epack_block_hash: None,
        },
        build: DecisionBuild {
            kernel: KERNEL_NAME.to_string(),
            kernel_version: inputs.build_manifest.kernel_version.clone(),
            manifest_hash: inputs.build_manifest.manifest_hash.clone(),
        },
    };

    let decision_hash = stable_hash(algorithm, &decision)?;
    decision.integrity.canonical_payload_hash = decision_hash.clone();
    Ok((decision, decision_hash))
}

/// Recomputes the canonical payload hash of a Decision Object.
///
/// The integrity seal is blanked on a clone before hashing, so a sealed
/// object verifies against its own `canonical_payload_hash`.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn compute_decision_hash(decision: &DecisionObject) -> Result<String, HashError> {
    let algorithm = HashAlgorithm::parse(&decision.integrity.canonical_payload_hash_alg)
        .unwrap_or(HashAlgorithm::Sha256);
    let mut unsealed = decision.clone();
    unsealed.integrity.canonical_payload_hash = String::new();
    stable_hash(algorithm, &unsealed)
}

/// Recomputes the seal for a decision object carried as raw JSON.
///
/// Replay uses this form so tampered records that no longer deserialize
/// into [`DecisionObject`] still hash deterministically.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn compute_decision_hash_value(decision: &Value) -> Result<String, HashError> {
    let algorithm = decision
        .get("integrity")
        .and_then(|integrity| integrity.get("canonical_payload_hash_alg"))
        .and_then(Value::as_str)
        .and_then(HashAlgorithm::parse)
        .unwrap_or(HashAlgorithm::Sha256);
    let mut unsealed = decision.clone();
    if let Some(integrity) = unsealed.get_mut("integrity").and_then(Value::as_object_mut) {
        integrity.insert("canonical_payload_hash".to_string(), Value::String(String::new()));
    }
    stable_hash(algorithm, &unsealed)
}
