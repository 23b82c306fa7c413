// crates/trustplane-core/src/core/constitution.rs
// ============================================================================
// Module: Trustplane Governance Constitution
// Description: Immutable governance invariants and their runtime checks.
// Purpose: Detect and surface violations of non-negotiable guarantees.
// Dependencies: crate::core::{epack, hashing}, serde, serde_json
// ============================================================================

//! ## Overview
//! The constitution is the fixed list of invariants that no configuration,
//! deployment, or integration may override: deterministic routing, audit
//! completeness, hash-chain integrity, failure transparency, vendor
//! neutrality, and the rest. The list is exposed over the API with a stable
//! hash used as a compatibility anchor, and critical violations halt the
//! turn.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::epack::EpackRecord;
use crate::core::epack::epack_hash;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;
use crate::core::hashing::stable_hash;

// ============================================================================
// SECTION: Invariants
// ============================================================================

/// How critical an invariant violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvariantSeverity {
    /// The system must halt or refuse the turn.
    Critical,
    /// Log and continue with caution.
    Warning,
    /// Informational only.
    Advisory,
}

/// A single governance invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernanceInvariant {
    /// Stable invariant identifier.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// What the invariant guarantees.
    pub description: &'static str,
    /// Violation severity.
    pub severity: InvariantSeverity,
    /// Name of the check function enforcing the invariant.
    pub check_fn_name: &'static str,
    /// Invariant category.
    pub category: &'static str,
}

/// The non-negotiable invariants of Trustplane governance.
pub const CONSTITUTION: [GovernanceInvariant; 13] = [
    GovernanceInvariant {
        id: "INV-DET-001",
        name: "Deterministic Routing",
        description: "All routing decisions must be pure functions of their inputs. Given the \
                      same InputVector and SessionState, the same route must be chosen.",
        severity: InvariantSeverity::Critical,
        check_fn_name: "check_deterministic_routing",
        category: "determinism",
    },
    GovernanceInvariant {
        id: "INV-DET-002",
        name: "No Hidden State",
        description: "No governance decision may depend on state not captured in the EPACK \
                      chain. All decision-relevant state must be auditable.",
        severity: InvariantSeverity::Critical,
        check_fn_name: "check_no_hidden_state",
        category: "determinism",
    },
    GovernanceInvariant {
        id: "INV-TRA-001",
        name: "Audit Chain Completeness",
        description: "Every governed interaction must produce an EPACK record. No interaction \
                      may bypass the audit chain.",
        severity: InvariantSeverity::Critical,
        check_fn_name: "check_audit_completeness",
        category: "transparency",
    },
    GovernanceInvariant {
        id: "INV-TRA-002",
        name: "Failure Transparency",
        description: "When governance cannot determine safety, uncertainty must be explicitly \
                      signaled. Silent fallback is prohibited.",
        severity: InvariantSeverity::Critical,
        check_fn_name: "check_failure_transparency",
        category: "transparency",
    },
    GovernanceInvariant {
        id: "INV-TRA-003",
        name: "Non-Persuasion",
        description: "Trustplane must not optimize for persuasion, engagement, or behavioral \
                      influence. Any output-influencing capability must include corresponding \
                      transparency and user override controls.",
        severity: InvariantSeverity::Critical,
        check_fn_name: "check_non_persuasion",
        category: "transparency",
    },
    GovernanceInvariant {
        id: "INV-AUD-001",
        name: "Hash Chain Integrity",
        description: "EPACK records must form a tamper-evident hash chain. Each record's \
                      prev_hash must equal the prior record's hash.",
        severity: InvariantSeverity::Critical,
        check_fn_name: "check_hash_chain_integrity",
        category: "audit",
    },
    GovernanceInvariant {
        id: "INV-AUD-002",
        name: "Provenance Manifests",
        description: "Every EPACK record must include a build manifest with kernel version and \
                      feature flags, sealed with a manifest hash.",
        severity: InvariantSeverity::Warning,
        check_fn_name: "check_provenance_manifest",
        category: "audit",
    },
    GovernanceInvariant {
        id: "INV-CAP-001",
        name: "Vendor Neutrality",
        description: "No single AI provider, cloud platform, or organization may gain \
                      privileged governance control. Adapters must be provider-agnostic.",
        severity: InvariantSeverity::Critical,
        check_fn_name: "check_vendor_neutrality",
        category: "anti-capture",
    },
    GovernanceInvariant {
        id: "INV-CAP-002",
        name: "Fork Continuity",
        description: "Audit chains must survive forks. Any fork of Trustplane must preserve \
                      the existing audit chain and governance proofs.",
        severity: InvariantSeverity::Warning,
        check_fn_name: "check_fork_continuity",
        category: "anti-capture",
    },
    GovernanceInvariant {
        id: "INV-CAP-003",
        name: "Configuration Transparency",
        description: "All governance configuration changes must produce audit events. No \
                      silent reconfiguration is permitted.",
        severity: InvariantSeverity::Critical,
        check_fn_name: "check_config_transparency",
        category: "anti-capture",
    },
    GovernanceInvariant {
        id: "INV-SAF-001",
        name: "Validation Before Delivery",
        description: "No model output may reach the user without validation. Validation \
                      failure must result in CLARIFY or REFUSE, never passthrough.",
        severity: InvariantSeverity::Critical,
        check_fn_name: "check_validation_before_delivery",
        category: "safety",
    },
    GovernanceInvariant {
        id: "INV-SAF-002",
        name: "Human Override Preservation",
        description: "Governance infrastructure must augment human judgment, not replace it. \
                      Meaningful human override capability must always be preserved.",
        severity: InvariantSeverity::Critical,
        check_fn_name: "check_human_override",
        category: "safety",
    },
    GovernanceInvariant {
        id: "INV-EVO-001",
        name: "Backward Compatibility",
        description: "Upgrades must preserve backward compatibility of audit formats, \
                      governance proofs, and interoperability schemas wherever feasible.",
        severity: InvariantSeverity::Warning,
        check_fn_name: "check_backward_compatibility",
        category: "evolution",
    },
];

/// Stable hash of the full constitution (compatibility anchor).
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn constitution_hash() -> Result<String, HashError> {
    stable_hash(DEFAULT_HASH_ALGORITHM, &CONSTITUTION.as_slice())
}

// ============================================================================
// SECTION: Check Results
// ============================================================================

/// Result of one constitutional check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantCheckResult {
    /// Invariant that was checked.
    pub invariant_id: String,
    /// Whether the invariant held.
    pub passed: bool,
    /// Human-readable outcome.
    pub message: String,
}

impl InvariantCheckResult {
    /// Builds a check result.
    fn new(invariant_id: &str, passed: bool, message: impl Into<String>) -> Self {
        Self {
            invariant_id: invariant_id.to_string(),
            passed,
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Check Functions
// ============================================================================

/// INV-TRA-001: every interaction must produce an EPACK.
#[must_use]
pub fn check_audit_completeness(interaction_count: u64, epack_count: u64) -> InvariantCheckResult {
    let passed = epack_count >= interaction_count;
    let message = if passed {
        "OK".to_string()
    } else {
        format!("Missing EPACKs: {interaction_count} interactions but only {epack_count} records")
    };
    InvariantCheckResult::new("INV-TRA-001", passed, message)
}

/// INV-AUD-001: verify record hashes and chain links.
#[must_use]
pub fn check_hash_chain_integrity(
    algorithm: HashAlgorithm,
    chain: &[EpackRecord],
) -> InvariantCheckResult {
    if chain.is_empty() {
        return InvariantCheckResult::new("INV-AUD-001", true, "Empty chain (trivially valid)");
    }
    for (index, record) in chain.iter().enumerate() {
        let expected = epack_hash(
            algorithm,
            record.seq,
            record.ts,
            &record.prev_hash,
            &record.payload_hash,
            &record.payload,
        );
        match expected {
            Ok(expected) if expected == record.hash => {}
            Ok(_) => {
                return InvariantCheckResult::new(
                    "INV-AUD-001",
                    false,
                    format!("Hash mismatch at seq={}", record.seq),
                );
            }
            Err(err) => {
                return InvariantCheckResult::new(
                    "INV-AUD-001",
                    false,
                    format!("Hashing failed at seq={}: {err}", record.seq),
                );
            }
        }
        if index > 0 && record.prev_hash != chain[index - 1].hash {
            return InvariantCheckResult::new(
                "INV-AUD-001",
                false,
                format!("Chain link broken at seq={}", record.seq),
            );
        }
    }
    InvariantCheckResult::new("INV-AUD-001", true, format!("Chain verified: {} records", chain.len()))
}

/// INV-AUD-002: EPACK payload must carry a sealed build manifest.
#[must_use]
pub fn check_provenance_manifest(payload: &Value) -> InvariantCheckResult {
    match payload.get("build_manifest") {
        None => InvariantCheckResult::new(
            "INV-AUD-002",
            false,
            "Missing build_manifest in EPACK payload",
        ),
        Some(manifest) if manifest.get("manifest_hash").is_none() => {
            InvariantCheckResult::new("INV-AUD-002", false, "Build manifest missing manifest_hash")
        }
        Some(_) => InvariantCheckResult::new("INV-AUD-002", true, "OK"),
    }
}

/// INV-SAF-001: no unvalidated output delivery.
#[must_use]
pub fn check_validation_before_delivery(
    validation_ran: bool,
    validation_ok: Option<bool>,
    output_delivered: bool,
) -> InvariantCheckResult {
    if output_delivered && !validation_ran {
        return InvariantCheckResult::new(
            "INV-SAF-001",
            false,
            "Output delivered without validation",
        );
    }
    if output_delivered && validation_ok == Some(false) {
        return InvariantCheckResult::new(
            "INV-SAF-001",
            false,
            "Failed validation output was delivered",
        );
    }
    InvariantCheckResult::new("INV-SAF-001", true, "OK")
}

/// INV-CAP-001: at least two adapter providers must be registered.
#[must_use]
pub fn check_vendor_neutrality(adapter_providers: &[String]) -> InvariantCheckResult {
    let mut unique = adapter_providers.to_vec();
    unique.sort();
    unique.dedup();
    if unique.len() < 2 {
        return InvariantCheckResult::new(
            "INV-CAP-001",
            false,
            format!("Only {} adapter provider(s) registered; minimum 2 required", unique.len()),
        );
    }
    InvariantCheckResult::new(
        "INV-CAP-001",
        true,
        format!("OK: {} providers registered", unique.len()),
    )
}

/// Whether any failed check maps to a CRITICAL invariant.
#[must_use]
pub fn any_critical_violation(results: &[InvariantCheckResult]) -> bool {
    results.iter().any(|result| {
        !result.passed
            && CONSTITUTION.iter().any(|invariant| {
                invariant.id == result.invariant_id
                    && invariant.severity == InvariantSeverity::Critical
            })
    })
}
