// crates/trustplane-consensus/src/verification.rs
// ============================================================================
// Module: Trustplane Verification Context
// Description: Universal credential verification context (domain-agnostic).
// Purpose: Carry the caller's verified role and tier into consensus gating.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The verification context is fail-closed: if any upstream verifier is
//! missing or invalid, the caller is treated as the unverified public tier.
//! Role levels run 1 (public) through 5 (expert/specialist) and drive scope
//! gating, preset selection, and arbitration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Verified roles recognized by the consensus layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Unverified public caller.
    #[default]
    Public,
    /// Non-licensed assistant.
    Assistant,
    /// Licensed nurse.
    Nurse,
    /// Licensed physician.
    Physician,
    /// Medical specialist.
    Specialist,
    /// Licensed attorney.
    Attorney,
    /// Licensed financial advisor.
    Advisor,
    /// Professional engineer.
    Engineer,
}

impl Role {
    /// Canonical wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Assistant => "assistant",
            Self::Nurse => "nurse",
            Self::Physician => "physician",
            Self::Specialist => "specialist",
            Self::Attorney => "attorney",
            Self::Advisor => "advisor",
            Self::Engineer => "engineer",
        }
    }
}

// ============================================================================
// SECTION: Verification Context
// ============================================================================

/// Credential verification context for a consensus run.
///
/// # Invariants
/// - `role_level` stays within 1..=5.
/// - Raw credential identifiers are never stored; only their hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationContext {
    /// Whether credentials were successfully verified.
    pub verified: bool,
    /// Verified role, or public.
    pub role: Role,
    /// Tier: 1=public, 2=mid-level pro, 3=licensed pro, 4=senior, 5=expert.
    pub role_level: u8,
    /// Jurisdiction, specialty, department, etc.
    pub scope: Option<String>,
    /// Unix epoch seconds when verification expires.
    pub expires_ts: Option<u64>,
    /// Hash of the credential identifier.
    pub credential_hash: Option<String>,
    /// Domain-specific claims.
    pub extra: Value,
}

impl Default for VerificationContext {
    fn default() -> Self {
        Self::public()
    }
}

impl VerificationContext {
    /// Fail-closed unverified public context.
    #[must_use]
    pub fn public() -> Self {
        Self {
            verified: false,
            role: Role::Public,
            role_level: 1,
            scope: None,
            expires_ts: None,
            credential_hash: None,
            extra: json!({}),
        }
    }

    /// Whether the caller is the unverified public tier.
    #[must_use]
    pub fn is_public(&self) -> bool {
        !self.verified && self.role == Role::Public && self.role_level == 1
    }

    /// Verified and at least licensed professional tier.
    #[must_use]
    pub const fn is_verified_pro(&self) -> bool {
        self.verified && self.role_level >= 3
    }
}
