// crates/trustplane-core/src/core/epack.rs
// ============================================================================
// Module: Trustplane Evidence Packets
// Description: Append-only, hash-chained evidence records (EPACK).
// Purpose: Seal one tamper-evident record per governed turn.
// Dependencies: crate::core::hashing, serde, serde_json
// ============================================================================

//! ## Overview
//! An EPACK record seals one governed turn. Records chain through
//! `prev_hash` (the literal `GENESIS` anchors a session), and each record's
//! `hash` covers `{seq, ts, prev_hash, payload_hash, payload}` so both header
//! and payload tampering break verification. `payload_hash` normally commits
//! to the turn's Decision Object hash.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;
use crate::core::hashing::stable_hash;

// ============================================================================
// SECTION: EPACK Record
// ============================================================================

/// Chain anchor for the first record of a session.
pub const GENESIS_HASH: &str = "GENESIS";

/// One sealed, hash-chained evidence record.
///
/// # Invariants
/// - `seq` is monotonic from 1 within a session.
/// - `prev_hash` equals the prior record's `hash` (`GENESIS` for seq 1).
/// - `hash` recomputes from `{seq, ts, prev_hash, payload_hash, payload}`.
/// - Records are append-only; in-place mutation is never legal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpackRecord {
    /// Monotonic sequence number within the session (from 1).
    pub seq: u64,
    /// Wall-clock seconds when the record was sealed.
    pub ts: u64,
    /// Hash of the previous record, or `GENESIS`.
    pub prev_hash: String,
    /// Commitment hash for the payload (the Decision Object hash).
    pub payload_hash: String,
    /// Record hash over the header and payload.
    pub hash: String,
    /// Full turn payload (decision object, traces, manifest, extras).
    pub payload: Value,
}

/// Computes an EPACK record hash from its parts.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn epack_hash(
    algorithm: HashAlgorithm,
    seq: u64,
    ts: u64,
    prev_hash: &str,
    payload_hash: &str,
    payload: &Value,
) -> Result<String, HashError> {
    stable_hash(
        algorithm,
        &json!({
            "seq": seq,
            "ts": ts,
            "prev_hash": prev_hash,
            "payload_hash": payload_hash,
            "payload": payload,
        }),
    )
}

/// Seals a new EPACK record.
///
/// `payload_hash_override` lets the turn engine commit the record to the
/// Decision Object hash instead of the raw payload hash.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn new_epack(
    algorithm: HashAlgorithm,
    seq: u64,
    ts: u64,
    prev_hash: &str,
    payload: Value,
    payload_hash_override: Option<String>,
) -> Result<EpackRecord, HashError> {
    let payload_hash = match payload_hash_override {
        Some(hash) => hash,
        None => stable_hash(algorithm, &payload)?,
    };
    let hash = epack_hash(algorithm, seq, ts, prev_hash, &payload_hash, &payload)?;
    Ok(EpackRecord {
        seq,
        ts,
        prev_hash: prev_hash.to_string(),
        payload_hash,
        hash,
        payload,
    })
}
