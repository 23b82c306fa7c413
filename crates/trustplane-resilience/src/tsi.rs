// crates/trustplane-resilience/src/tsi.rs
// ============================================================================
// Module: Trustplane TSI Tracker
// Description: Sliding-window Trust-Signal Index with exponential decay.
// Purpose: Aggregate recent interaction outcomes into a bounded trust score.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The tracker holds a fixed-capacity window of interaction outcomes. Each
//! outcome contributes a status-based score adjusted for validator
//! agreement, latency, and challenger pressure, weighted by exponential
//! time decay per minute. The forecast is a bounded linear extrapolation of
//! the slope over the most recent (up to ten) scores. All outputs stay in
//! [0, 1]; timestamps are caller-supplied so signals replay exactly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Status of a single governed interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    /// Interaction passed validation.
    Pass,
    /// Interaction passed with warnings.
    Warn,
    /// Interaction was refused.
    Refuse,
    /// Interaction errored.
    Error,
}

impl OutcomeStatus {
    /// Base TSI contribution for the status.
    #[must_use]
    pub const fn base_score(self) -> f64 {
        match self {
            Self::Pass => 0.90,
            Self::Warn => 0.70,
            Self::Refuse => 0.45,
            Self::Error => 0.30,
        }
    }
}

/// Single interaction outcome fed into the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionOutcome {
    /// Unix seconds when the interaction completed.
    pub timestamp: u64,
    /// Interaction status.
    pub status: OutcomeStatus,
    /// Average validator agreement in [0, 1].
    pub validator_agreement: f64,
    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
    /// Whether the challenger fired during the interaction.
    pub challenger_fired: bool,
    /// Whether a recovery plan was active during the interaction.
    pub recovery_active: bool,
}

// ============================================================================
// SECTION: Signal
// ============================================================================

/// Output signal from the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsiSignal {
    /// Current weighted TSI in [0, 1].
    pub tsi_current: f64,
    /// Bounded 15-minute forecast in [0, 1].
    pub tsi_forecast_15m: f64,
    /// Number of outcomes in the window.
    pub window_size: usize,
    /// Fraction of PASS outcomes.
    pub pass_rate: f64,
    /// Fraction of REFUSE outcomes.
    pub refuse_rate: f64,
    /// Fraction of ERROR outcomes.
    pub error_rate: f64,
    /// Mean validator agreement.
    pub avg_agreement: f64,
    /// Linear trend slope (positive means improving).
    pub trend_slope: f64,
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Sliding-window TSI aggregator with exponential decay.
#[derive(Debug, Clone)]
pub struct TsiTracker {
    /// Window capacity (at least 5).
    window_size: usize,
    /// Per-minute decay constant.
    decay_lambda: f64,
    /// Agreement modifier weight.
    agreement_weight: f64,
    /// Latency penalty per second.
    latency_penalty_per_s: f64,
    /// Penalty applied when the challenger fired.
    challenger_penalty: f64,
    /// Outcome window, oldest first.
    buffer: VecDeque<InteractionOutcome>,
}

impl Default for TsiTracker {
    fn default() -> Self {
        Self::new(20)
    }
}

/// Rounds to a fixed number of decimal places.
fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

impl TsiTracker {
    /// Creates a tracker with default weights and the given window size.
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(5),
            decay_lambda: 0.1,
            agreement_weight: 0.20,
            latency_penalty_per_s: 0.02,
            challenger_penalty: 0.03,
            buffer: VecDeque::new(),
        }
    }

    /// Pushes an outcome into the sliding window.
    pub fn record(&mut self, outcome: InteractionOutcome) {
        if self.buffer.len() == self.window_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(outcome);
    }

    /// Clears the window.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Computes the current TSI signal at the given time.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        reason = "Window sizes and ages are far below 2^52."
    )]
    pub fn signal(&self, now: u64) -> TsiSignal {
        if self.buffer.is_empty() {
            return TsiSignal {
                tsi_current: 0.82,
                tsi_forecast_15m: 0.80,
                window_size: 0,
                pass_rate: 0.0,
                refuse_rate: 0.0,
                error_rate: 0.0,
                avg_agreement: 0.0,
                trend_slope: 0.0,
            };
        }

        let mut scores: Vec<(f64, f64)> = Vec::with_capacity(self.buffer.len());
        let mut total_weight = 0.0;
        let mut pass_count = 0_usize;
        let mut refuse_count = 0_usize;
        let mut error_count = 0_usize;
        let mut agreement_sum = 0.0;

        for outcome in &self.buffer {
            let age_s = now.saturating_sub(outcome.timestamp) as f64;
            let weight = (-self.decay_lambda * age_s / 60.0).exp();

            let base = outcome.status.base_score();
            let agreement_mod = self.agreement_weight * (outcome.validator_agreement - 0.5);
            let latency_pen = self.latency_penalty_per_s * (outcome.latency_ms as f64 / 1000.0);
            let challenger_pen =
                if outcome.challenger_fired { self.challenger_penalty } else { 0.0 };

            let score = (base + agreement_mod - latency_pen - challenger_pen).clamp(0.0, 1.0);
            scores.push((weight, score));
            total_weight += weight;

            match outcome.status {
                OutcomeStatus::Pass => pass_count += 1,
                OutcomeStatus::Refuse => refuse_count += 1,
                OutcomeStatus::Error => error_count += 1,
                OutcomeStatus::Warn => {}
            }
            agreement_sum += outcome.validator_agreement;
        }

        let tsi = if total_weight > 0.0 {
            scores.iter().map(|(weight, score)| weight * score).sum::<f64>() / total_weight
        } else {
            0.50
        };

        let count = self.buffer.len() as f64;
        let trend_slope = trend_slope(&scores);
        let forecast = (tsi + trend_slope * 2.0).clamp(0.0, 1.0);

        TsiSignal {
            tsi_current: round_to(tsi, 4),
            tsi_forecast_15m: round_to(forecast, 4),
            window_size: self.buffer.len(),
            pass_rate: round_to(pass_count as f64 / count, 3),
            refuse_rate: round_to(refuse_count as f64 / count, 3),
            error_rate: round_to(error_count as f64 / count, 3),
            avg_agreement: round_to(agreement_sum / count, 3),
            trend_slope: round_to(trend_slope, 5),
        }
    }
}

/// Linear-regression slope over the most recent (up to ten) scores.
#[allow(clippy::cast_precision_loss, reason = "Trend windows hold at most ten samples.")]
fn trend_slope(scores: &[(f64, f64)]) -> f64 {
    let trend_n = scores.len().min(10);
    if trend_n < 3 {
        return 0.0;
    }
    let recent: Vec<f64> =
        scores[scores.len() - trend_n..].iter().map(|(_, score)| *score).collect();
    let x_mean = (trend_n - 1) as f64 / 2.0;
    let y_mean = recent.iter().sum::<f64>() / trend_n as f64;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (index, value) in recent.iter().enumerate() {
        let dx = index as f64 - x_mean;
        numerator += dx * (value - y_mean);
        denominator += dx * dx;
    }
    if denominator > 0.0 { numerator / denominator } else { 0.0 }
}
