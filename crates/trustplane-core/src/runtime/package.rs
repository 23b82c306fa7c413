// crates/trustplane-core/src/runtime/package.rs
// ============================================================================
// Module: Trustplane Replay Package
// Description: Sealed, portable bundle for offline replay verification.
// Purpose: Carry everything needed to reproduce and verify a governed run.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! A replay package bundles the EPACK chain, governance configuration
//! snapshot, validator decisions, and environment metadata behind a single
//! `package_hash` computed over every other field. Sealing and re-sealing
//! are deterministic, so a package can be verified byte-for-byte offline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::core::epack::EpackRecord;
use crate::core::epack::GENESIS_HASH;
use crate::core::epack::epack_hash;
use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;
use crate::core::hashing::stable_hash;

// ============================================================================
// SECTION: Replay Package
// ============================================================================

/// Minimal artifact set for deterministic replay verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayPackage {
    /// Hash of the run's input payload.
    pub input_payload_hash: String,
    /// Input metadata (e.g. chain length).
    pub input_metadata: Value,
    /// Kernel version that produced the run.
    pub kernel_version: String,
    /// Governance profile active for the run.
    pub governance_profile_id: String,
    /// Validator set active for the run.
    pub validator_set_id: String,
    /// Determinism policy label.
    pub determinism_policy: String,
    /// Recorded routing decisions.
    pub routing_decisions: Value,
    /// Full EPACK chain.
    pub epack_chain: Vec<EpackRecord>,
    /// Hash of the chain head.
    pub epack_head_hash: String,
    /// Per-validator decision records.
    pub validator_results: Vec<Value>,
    /// Final consensus outcome, if any.
    pub consensus_result: Option<Value>,
    /// Environment metadata (platform, dependency versions).
    pub environment: Value,
    /// Seal over every other field.
    pub package_hash: String,
}

impl ReplayPackage {
    /// Canonical content view hashed by the seal.
    fn content(&self) -> Value {
        json!({
            "input_payload_hash": self.input_payload_hash,
            "input_metadata": self.input_metadata,
            "kernel_version": self.kernel_version,
            "governance_profile_id": self.governance_profile_id,
            "validator_set_id": self.validator_set_id,
            "determinism_policy": self.determinism_policy,
            "routing_decisions": self.routing_decisions,
            "epack_chain": self.epack_chain,
            "epack_head_hash": self.epack_head_hash,
            "validator_results": self.validator_results,
            "consensus_result": self.consensus_result,
            "environment": self.environment,
        })
    }

    /// Computes and sets `package_hash` over all content fields.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn seal(&mut self, algorithm: HashAlgorithm) -> Result<(), HashError> {
        self.package_hash = stable_hash(algorithm, &self.content())?;
        Ok(())
    }

    /// Whether `package_hash` matches the current content.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn verify_seal(&self, algorithm: HashAlgorithm) -> Result<bool, HashError> {
        Ok(stable_hash(algorithm, &self.content())? == self.package_hash)
    }
}

// ============================================================================
// SECTION: Building
// ============================================================================

/// Inputs for building a sealed replay package.
#[derive(Debug, Clone, Default)]
pub struct PackageInputs {
    /// EPACK chain records from the session.
    pub session_epacks: Vec<EpackRecord>,
    /// Kernel version (semantic version + build hash).
    pub kernel_version: String,
    /// Active governance profile.
    pub governance_profile: String,
    /// Active validator set identifier.
    pub validator_set_id: String,
    /// Routing metadata (route sequence, reasons).
    pub routing_decisions: Value,
    /// Per-validator decision records.
    pub validator_results: Vec<Value>,
    /// Final consensus outcome, if any.
    pub consensus_result: Option<Value>,
    /// Environment metadata.
    pub environment: Value,
}

/// Builds a sealed replay package from session artifacts.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn build_replay_package(
    algorithm: HashAlgorithm,
    inputs: PackageInputs,
) -> Result<ReplayPackage, HashError> {
    let head_hash =
        inputs.session_epacks.last().map(|record| record.hash.clone()).unwrap_or_default();
    let input_hash = inputs
        .session_epacks
        .first()
        .and_then(|record| record.payload.get("user_text_hash"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut package = ReplayPackage {
        input_payload_hash: input_hash,
        input_metadata: json!({ "epack_count": inputs.session_epacks.len() }),
        kernel_version: inputs.kernel_version,
        governance_profile_id: inputs.governance_profile,
        validator_set_id: inputs.validator_set_id,
        determinism_policy: "strict".to_string(),
        routing_decisions: inputs.routing_decisions,
        epack_chain: inputs.session_epacks,
        epack_head_hash: head_hash,
        validator_results: inputs.validator_results,
        consensus_result: inputs.consensus_result,
        environment: inputs.environment,
        package_hash: String::new(),
    };
    package.seal(algorithm)?;
    Ok(package)
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// One package verification check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageCheck {
    /// Check name.
    pub check: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Errors found by the check.
    pub errors: Vec<String>,
}

/// Result of verifying a replay package without replaying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageVerification {
    /// True when every check passed.
    pub passed: bool,
    /// Individual check results.
    pub checks: Vec<PackageCheck>,
}

/// Validates a replay package's integrity without performing replay.
///
/// Checks the package seal, EPACK chain hash/linkage integrity, head-hash
/// consistency, and required fields.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn verify_replay_package(
    algorithm: HashAlgorithm,
    package: &ReplayPackage,
) -> Result<PackageVerification, HashError> {
    let mut checks = Vec::with_capacity(4);

    let seal_ok = package.verify_seal(algorithm)?;
    checks.push(PackageCheck {
        check: "package_seal".to_string(),
        passed: seal_ok,
        errors: Vec::new(),
    });

    let mut chain_ok = true;
    let mut chain_errors = Vec::new();
    for (index, record) in package.epack_chain.iter().enumerate() {
        let expected = epack_hash(
            algorithm,
            record.seq,
            record.ts,
            &record.prev_hash,
            &record.payload_hash,
            &record.payload,
        )?;
        if record.hash != expected {
            chain_ok = false;
            chain_errors.push(format!("record {index}: hash mismatch"));
        }
        if index == 0 {
            if record.prev_hash != GENESIS_HASH {
                chain_ok = false;
                chain_errors.push("record 0: expected GENESIS".to_string());
            }
        } else if record.prev_hash != package.epack_chain[index - 1].hash {
            chain_ok = false;
            chain_errors.push(format!("record {index}: broken linkage"));
        }
    }
    checks.push(PackageCheck {
        check: "chain_integrity".to_string(),
        passed: chain_ok,
        errors: chain_errors,
    });

    let head_ok = package.epack_chain.last().is_none_or(|record| {
        record.hash == package.epack_head_hash
    });
    checks.push(PackageCheck {
        check: "head_hash".to_string(),
        passed: head_ok,
        errors: Vec::new(),
    });

    let required_ok =
        !package.kernel_version.is_empty() && !package.input_payload_hash.is_empty();
    checks.push(PackageCheck {
        check: "required_fields".to_string(),
        passed: required_ok,
        errors: Vec::new(),
    });

    Ok(PackageVerification {
        passed: checks.iter().all(|check| check.passed),
        checks,
    })
}
