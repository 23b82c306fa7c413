// crates/trustplane-resilience/src/mvi.rs
// ============================================================================
// Module: Trustplane Meta-Validation Index
// Description: Composite check that the governance pipeline governs itself.
// Purpose: Score replay stability, recovery consistency, TSI coherence.
// Dependencies: crate::recovery, serde, trustplane-core
// ============================================================================

//! ## Overview
//! The MVI answers "who governs the governor": two independent replay passes
//! must agree (40%), identical recovery inputs must pick the identical plan
//! across trials (35%), and the TSI series must stay bounded with no
//! NaN/infinity and no jump above 0.40 between adjacent samples (25%). The
//! composite passes at 0.80, and is itself evaluated via replay.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use trustplane_core::ReplayResult;

use crate::recovery::RecoveryEngine;
use crate::recovery::RecoveryPlan;
use crate::recovery::RecoveryState;

// ============================================================================
// SECTION: Result
// ============================================================================

/// Outcome of a meta-validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MviResult {
    /// Weighted composite score in [0, 1].
    pub mvi_score: f64,
    /// Replay stability component.
    pub replay_stability: f64,
    /// Recovery consistency component.
    pub recovery_consistency: f64,
    /// TSI coherence component.
    pub tsi_coherence: f64,
    /// Whether the composite met the pass threshold.
    pub passed: bool,
    /// Detail strings accumulated by the component checks.
    pub details: Vec<String>,
}

// ============================================================================
// SECTION: Meta-Validation Index
// ============================================================================

/// Rounds to four decimal places.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Computes the MVI from replay results, the engine, and TSI samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetaValidationIndex {
    /// Composite pass threshold.
    pub pass_threshold: f64,
    /// Replay stability weight.
    pub replay_weight: f64,
    /// Recovery consistency weight.
    pub recovery_weight: f64,
    /// TSI coherence weight.
    pub coherence_weight: f64,
}

impl Default for MetaValidationIndex {
    fn default() -> Self {
        Self {
            pass_threshold: 0.80,
            replay_weight: 0.40,
            recovery_weight: 0.35,
            coherence_weight: 0.25,
        }
    }
}

impl MetaValidationIndex {
    /// Compares two replay passes of the same EPACK chain.
    ///
    /// Score is 1.0 when both passes agree on every governance verdict and
    /// determinism index.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Chain lengths are far below 2^52.")]
    pub fn check_replay_stability(
        results_a: &[ReplayResult],
        results_b: &[ReplayResult],
    ) -> (f64, Vec<String>) {
        let mut details = Vec::new();
        if results_a.is_empty() || results_b.is_empty() {
            details.push("replay_stability:insufficient_data".to_string());
            return (0.5, details);
        }

        let count = results_a.len().min(results_b.len());
        let mut matches = 0_usize;
        for index in 0..count {
            let same_verdict =
                results_a[index].governance_match == results_b[index].governance_match;
            let same_index = (results_a[index].determinism_index
                - results_b[index].determinism_index)
                .abs()
                < 0.01;
            if same_verdict && same_index {
                matches += 1;
            } else {
                details.push(format!("replay_stability:divergence_at_record_{index}"));
            }
        }

        let score = if count > 0 { matches as f64 / count as f64 } else { 0.0 };
        if score >= 1.0 {
            details.push("replay_stability:perfect".to_string());
        }
        (round4(score), details)
    }

    /// Runs the engine N times with the same inputs; a deterministic engine
    /// must always pick the same plan.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Trial counts are single digits.")]
    pub fn check_recovery_consistency(
        engine: &RecoveryEngine,
        state: &RecoveryState,
        plans: &[RecoveryPlan],
        num_trials: u32,
    ) -> (f64, Vec<String>) {
        let mut details = Vec::new();
        if plans.is_empty() {
            details.push("recovery_consistency:no_plans".to_string());
            return (1.0, details);
        }

        let mut chosen_names: Vec<Option<String>> = Vec::new();
        for _ in 0..num_trials {
            let decision = engine.decide(state, plans, 1_000_000, &BTreeSet::new());
            chosen_names.push(decision.chosen.map(|plan| plan.name));
        }

        let unique: BTreeSet<&Option<String>> = chosen_names.iter().collect();
        let score = if unique.len() <= 1 {
            details.push(format!(
                "recovery_consistency:deterministic:always={}",
                chosen_names
                    .first()
                    .and_then(|name| name.as_deref())
                    .unwrap_or("none")
            ));
            1.0
        } else {
            details.push(format!(
                "recovery_consistency:NON_DETERMINISTIC:choices={}",
                unique.len()
            ));
            1.0 / unique.len() as f64
        };

        (round4(score), details)
    }

    /// Checks that a TSI series is internally consistent.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Series lengths are far below 2^52.")]
    pub fn check_tsi_coherence(tsi_values: &[f64]) -> (f64, Vec<String>) {
        let mut details = Vec::new();
        if tsi_values.is_empty() {
            details.push("tsi_coherence:no_data".to_string());
            return (0.5, details);
        }

        let mut issues = 0_usize;
        for (index, value) in tsi_values.iter().enumerate() {
            if !(0.0..=1.0).contains(value) {
                issues += 1;
                details.push(format!("tsi_coherence:out_of_bounds_at_{index}:{value}"));
            }
            if value.is_nan() || value.is_infinite() {
                issues += 1;
                details.push(format!("tsi_coherence:nan_or_inf_at_{index}"));
            }
        }
        for index in 1..tsi_values.len() {
            if (tsi_values[index] - tsi_values[index - 1]).abs() > 0.40 {
                issues += 1;
                details.push(format!(
                    "tsi_coherence:impossible_jump_at_{index}:{:.3}->{:.3}",
                    tsi_values[index - 1],
                    tsi_values[index]
                ));
            }
        }

        let points = tsi_values.len() + tsi_values.len().saturating_sub(1);
        let score = (1.0 - issues as f64 / points.max(1) as f64).max(0.0);
        if score >= 1.0 {
            details.push("tsi_coherence:clean".to_string());
        }
        (round4(score), details)
    }

    /// Inputs for an MVI computation.
    #[must_use]
    pub fn compute(
        &self,
        replay_results_a: &[ReplayResult],
        replay_results_b: &[ReplayResult],
        engine: Option<(&RecoveryEngine, &RecoveryState, &[RecoveryPlan])>,
        tsi_values: &[f64],
    ) -> MviResult {
        let mut details = Vec::new();

        let (replay_score, replay_details) =
            Self::check_replay_stability(replay_results_a, replay_results_b);
        details.extend(replay_details);

        let (recovery_score, recovery_details) = match engine {
            Some((engine, state, plans)) => {
                Self::check_recovery_consistency(engine, state, plans, 5)
            }
            None => (1.0, vec!["recovery_consistency:skipped_no_engine".to_string()]),
        };
        details.extend(recovery_details);

        let (coherence_score, coherence_details) = Self::check_tsi_coherence(tsi_values);
        details.extend(coherence_details);

        let mvi = round4(
            self.replay_weight * replay_score
                + self.recovery_weight * recovery_score
                + self.coherence_weight * coherence_score,
        );

        MviResult {
            mvi_score: mvi,
            replay_stability: replay_score,
            recovery_consistency: recovery_score,
            tsi_coherence: coherence_score,
            passed: mvi >= self.pass_threshold,
            details,
        }
    }
}
