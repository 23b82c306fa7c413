// crates/trustplane-api/src/schema_registry.rs
// ============================================================================
// Module: Trustplane Schema Registry
// Description: Versioned governance schema objects served over the API.
// Purpose: Describe the EPACK, telemetry, routing-proof, and receipt shapes.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The registry exposes machine-readable descriptions of the wire formats
//! external integrators verify against. Schemas are versioned; field lists
//! here track the serde structs they describe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Known schema names.
pub const SCHEMA_NAMES: [&str; 4] = ["epack", "telemetry", "routing_proof", "receipt"];

/// Returns a schema object by name.
#[must_use]
pub fn get_schema(name: &str) -> Option<Value> {
    match name {
        "epack" => Some(json!({
            "schema": "epack",
            "version": 1,
            "description": "One sealed, hash-chained evidence record per governed turn.",
            "fields": {
                "seq": "integer, monotonic from 1 within a session",
                "ts": "integer unix seconds",
                "prev_hash": "string, prior record hash or the literal GENESIS",
                "payload_hash": "string, commitment to the Decision Object hash",
                "hash": "string, canonical hash of {seq, ts, prev_hash, payload_hash, payload}",
                "payload": "object carrying the decision object and replay context",
            },
        })),
        "telemetry" => Some(json!({
            "schema": "telemetry",
            "version": 1,
            "description": "Aggregated governance dashboard counters.",
            "fields": {
                "turns_total": "integer",
                "routes": "object of route label to count",
                "bound_refusals": "integer",
                "defers": "integer",
                "clarifies": "integer",
                "challenger_fires": "integer",
                "replay_verified": "integer",
                "replay_drift": "integer",
                "replay_tampered": "integer",
            },
        })),
        "routing_proof" => Some(json!({
            "schema": "routing_proof",
            "version": 1,
            "description": "Recorded route with the input vector needed to replay it.",
            "fields": {
                "route": "object {seq: [string], why: string}",
                "iv": "object, the full recorded InputVector",
            },
        })),
        "receipt" => Some(json!({
            "schema": "receipt",
            "version": 1,
            "description": "HMAC-signed receipt over a sealed record hash.",
            "fields": {
                "record_hash": "string",
                "signature": "string, lowercase hex HMAC-SHA256",
                "algorithm": "string, hmac-sha256",
            },
        })),
        _ => None,
    }
}

/// Returns every schema keyed by name.
#[must_use]
pub fn all_schemas() -> Value {
    let mut out = serde_json::Map::new();
    for name in SCHEMA_NAMES {
        if let Some(schema) = get_schema(name) {
            out.insert(name.to_string(), schema);
        }
    }
    Value::Object(out)
}
