// crates/trustplane-core/src/core/redaction.rs
// ============================================================================
// Module: Trustplane Payload Redaction
// Description: Hash-redaction of persisted EPACK payload strings.
// Purpose: Keep persisted evidence verifiable without retaining plaintext.
// Dependencies: crate::core::hashing, serde, serde_json
// ============================================================================

//! ## Overview
//! Before persistence, every string value in an EPACK payload is replaced by
//! `{"_redacted": true, "sha256": <hash>}` so the chain stays verifiable
//! while plaintext never reaches disk. Values under the public-evidence
//! allow-list (citation verification events and cache updates) are kept
//! intact so replay can resolve them without re-hitting networks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::hash_text;

// ============================================================================
// SECTION: Redaction Mode
// ============================================================================

/// Redaction policy applied before persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactMode {
    /// Replace string values with their hashes (default).
    #[default]
    Hash,
    /// Persist payloads unmodified.
    Off,
}

impl RedactMode {
    /// Parses the wire name (`hash` / `off`); unknown values fail closed to
    /// hashing.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "off" => Self::Off,
            _ => Self::Hash,
        }
    }
}

// ============================================================================
// SECTION: Allow-List
// ============================================================================

/// Payload paths whose values are public evidence and stay unredacted.
///
/// Citation identifiers and verification events must survive redaction so
/// audit replay can resolve them without repeated network queries.
const PUBLIC_EVIDENCE_PATHS: [&[&str]; 2] = [
    &["extra", "gen_meta", "citation_verification"],
    &["extra", "gen_meta", "citation_cache_updates"],
];

/// Whether a payload path is under the public-evidence allow-list.
fn is_public_evidence_path(path: &[&str]) -> bool {
    PUBLIC_EVIDENCE_PATHS
        .iter()
        .any(|prefix| path.len() >= prefix.len() && &path[..prefix.len()] == *prefix)
}

// ============================================================================
// SECTION: Redaction
// ============================================================================

/// Maximum recursion depth for payload redaction.
const MAX_REDACTION_DEPTH: usize = 10;

/// Applies the redaction policy to a payload before persistence.
#[must_use]
pub fn redact_payload(mode: RedactMode, algorithm: HashAlgorithm, payload: &Value) -> Value {
    match mode {
        RedactMode::Off => payload.clone(),
        RedactMode::Hash => redact_recursive(algorithm, payload, 0, &mut Vec::new()),
    }
}

/// Builds the redaction marker for a string value.
#[must_use]
pub fn redact_value(algorithm: HashAlgorithm, text: &str) -> Value {
    json!({ "_redacted": true, "sha256": hash_text(algorithm, text) })
}

/// Recursively redacts string values outside the allow-list.
fn redact_recursive<'a>(
    algorithm: HashAlgorithm,
    value: &'a Value,
    depth: usize,
    path: &mut Vec<&'a str>,
) -> Value {
    if depth > MAX_REDACTION_DEPTH || is_public_evidence_path(path) {
        return value.clone();
    }
    match value {
        Value::String(text) => redact_value(algorithm, text),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                path.push(key.as_str());
                out.insert(key.clone(), redact_recursive(algorithm, child, depth + 1, path));
                path.pop();
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items.iter().map(|item| redact_recursive(algorithm, item, depth + 1, path)).collect(),
        ),
        _ => value.clone(),
    }
}
