// crates/trustplane-resilience/src/verifier.rs
// ============================================================================
// Module: Trustplane Post-Recovery Verifier
// Description: Checks that an applied recovery actually improved health.
// Purpose: Close the recovery loop; recommend rollback when it did not.
// Dependencies: crate::recovery, serde, trustplane-core
// ============================================================================

//! ## Overview
//! After a plan is applied, the verifier compares TSI before and after,
//! requires a minimum improvement, and recommends rollback on excessive
//! degradation, a still-critical TSI, or any replay sample whose governance
//! verdict no longer matches. The reason chain is always reported.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use trustplane_core::ReplayResult;

use crate::recovery::RecoveryPlan;
use crate::recovery::RecoveryTargets;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Post-recovery verification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Replay samples taken after a recovery.
    pub replay_samples: u32,
    /// Whether the replay-sample check runs.
    pub mvi_check: bool,
    /// Minimum TSI improvement to count as improved.
    pub min_tsi_improvement: f64,
    /// Degradation magnitude that forces rollback.
    pub max_tsi_degradation: f64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            replay_samples: 3,
            mvi_check: true,
            min_tsi_improvement: 0.02,
            max_tsi_degradation: 0.05,
        }
    }
}

// ============================================================================
// SECTION: Result
// ============================================================================

/// Outcome of post-recovery verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Plan that was verified.
    pub plan_name: String,
    /// Replay samples checked.
    pub samples_checked: usize,
    /// TSI at recovery time.
    pub tsi_before: f64,
    /// TSI after the verification window.
    pub tsi_after: f64,
    /// Whether TSI improved by at least the minimum.
    pub tsi_improved: bool,
    /// Whether every replay sample kept its governance match.
    pub mvi_passed: bool,
    /// Whether rollback is recommended.
    pub recommend_rollback: bool,
    /// Reason chain for the verdict.
    pub reasons: Vec<String>,
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verifies that a recovery action actually improved system health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostRecoveryVerifier {
    /// Verification thresholds.
    pub config: VerificationConfig,
    /// TSI targets (for the critical floor).
    pub targets: RecoveryTargets,
}

impl PostRecoveryVerifier {
    /// Creates a verifier.
    #[must_use]
    pub const fn new(config: VerificationConfig, targets: RecoveryTargets) -> Self {
        Self {
            config,
            targets,
        }
    }

    /// Checks whether the applied plan improved things.
    #[must_use]
    pub fn verify(
        &self,
        plan: &RecoveryPlan,
        tsi_before: f64,
        tsi_after: f64,
        replay_results: &[ReplayResult],
    ) -> VerificationResult {
        let mut reasons = Vec::new();
        let mut tsi_improved = false;
        let mut mvi_passed = true;
        let mut recommend_rollback = false;

        let delta = tsi_after - tsi_before;
        if delta >= self.config.min_tsi_improvement {
            tsi_improved = true;
        } else if delta < 0.0 {
            reasons.push(format!("tsi_degraded:{delta:+.4}"));
            if delta.abs() >= self.config.max_tsi_degradation {
                recommend_rollback = true;
                reasons.push("rollback:tsi_degradation_exceeds_threshold".to_string());
            }
        } else {
            reasons.push(format!(
                "tsi_flat:delta={delta:+.4}<min_improvement={}",
                self.config.min_tsi_improvement
            ));
        }

        if tsi_after < self.targets.tsi_critical {
            reasons.push(format!(
                "tsi_still_critical:{tsi_after:.3}<{}",
                self.targets.tsi_critical
            ));
            recommend_rollback = true;
        }

        let mut samples_checked = 0;
        if self.config.mvi_check && !replay_results.is_empty() {
            samples_checked = replay_results.len();
            let mismatches =
                replay_results.iter().filter(|result| !result.governance_match).count();
            if mismatches > 0 {
                mvi_passed = false;
                reasons.push(format!(
                    "mvi_failed:{mismatches}/{samples_checked}_governance_mismatches"
                ));
                recommend_rollback = true;
            }
        }

        if reasons.is_empty() {
            reasons.push("recovery_verified_ok".to_string());
        }

        VerificationResult {
            plan_name: plan.name.clone(),
            samples_checked,
            tsi_before,
            tsi_after,
            tsi_improved,
            mvi_passed,
            recommend_rollback,
            reasons,
        }
    }
}
