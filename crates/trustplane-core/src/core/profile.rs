// crates/trustplane-core/src/core/profile.rs
// ============================================================================
// Module: Trustplane Governance Profiles
// Description: Assurance-profile ladder and per-profile budgets.
// Purpose: Centralize the thresholds that vary by governance profile.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A session runs under one of three assurance profiles. The profile controls
//! the alignment threshold, generation retry budget, gate expiry budget,
//! confirm-token length, and whether gate confirmations require verbatim
//! token binding. Escalation moves one step at a time and never leaves the
//! ladder.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Profile
// ============================================================================

/// Governance assurance profile for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Profile {
    /// Lowest latency, loosest validation.
    Fast,
    /// Default balanced profile.
    #[default]
    Standard,
    /// Strictest validation; confirmations require verbatim tokens.
    HighAssurance,
}

impl Profile {
    /// Minimum alignment score accepted by the output validator.
    #[must_use]
    pub const fn alignment_threshold(self) -> f64 {
        match self {
            Self::Fast => 0.85,
            Self::Standard => 0.90,
            Self::HighAssurance => 0.95,
        }
    }

    /// Maximum generation attempts on the TDM path.
    #[must_use]
    pub const fn max_generation_attempts(self) -> u32 {
        match self {
            Self::Fast => 1,
            Self::Standard => 2,
            Self::HighAssurance => 3,
        }
    }

    /// Number of trailing hex characters used as a gate confirm token.
    #[must_use]
    pub const fn confirm_token_len(self) -> usize {
        match self {
            Self::Fast | Self::Standard => 4,
            Self::HighAssurance => 6,
        }
    }

    /// Turn budget before a pending gate expires.
    #[must_use]
    pub const fn gate_expiry_turns(self) -> u64 {
        match self {
            Self::Fast => 2,
            Self::Standard => 3,
            Self::HighAssurance => 5,
        }
    }

    /// Whether gate confirmations must carry the token verbatim.
    #[must_use]
    pub const fn require_token_binding(self) -> bool {
        matches!(self, Self::HighAssurance)
    }

    /// One step up the assurance ladder (saturating at the top).
    #[must_use]
    pub const fn escalated(self) -> Self {
        match self {
            Self::Fast => Self::Standard,
            Self::Standard | Self::HighAssurance => Self::HighAssurance,
        }
    }

    /// One step down the assurance ladder (saturating at the bottom).
    #[must_use]
    pub const fn deescalated(self) -> Self {
        match self {
            Self::Fast | Self::Standard => Self::Fast,
            Self::HighAssurance => Self::Standard,
        }
    }

    /// Canonical wire name of the profile.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "FAST",
            Self::Standard => "STANDARD",
            Self::HighAssurance => "HIGH_ASSURANCE",
        }
    }
}

/// Interaction count a session must stay failure-free before de-escalating.
pub const CLEAN_STREAK_FOR_DEESCALATION: u64 = 8;

/// Validation failures within one turn that force escalation.
pub const FAILURES_FOR_ESCALATION: usize = 2;
