// crates/trustplane-resilience/tests/tsi_tracker.rs
// ============================================================================
// Module: TSI Tracker Tests
// Description: Bounded signals, decay weighting, trend forecasting.
// ============================================================================
//! ## Overview
//! The tracker must keep every signal in [0, 1] with no NaN for arbitrary
//! outcome sequences, weight recent outcomes more heavily, and forecast via
//! the bounded trend extrapolation.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use proptest::prelude::*;
use trustplane_resilience::InteractionOutcome;
use trustplane_resilience::OutcomeStatus;
use trustplane_resilience::TsiTracker;

/// Builds an outcome at a timestamp.
const fn outcome(status: OutcomeStatus, timestamp: u64, agreement: f64) -> InteractionOutcome {
    InteractionOutcome {
        timestamp,
        status,
        validator_agreement: agreement,
        latency_ms: 100,
        challenger_fired: false,
        recovery_active: false,
    }
}

/// An empty window reports the neutral defaults.
#[test]
fn empty_window_reports_defaults() {
    let tracker = TsiTracker::new(20);
    let signal = tracker.signal(1_000);
    assert!((signal.tsi_current - 0.82).abs() < 1e-9);
    assert!((signal.tsi_forecast_15m - 0.80).abs() < 1e-9);
    assert_eq!(signal.window_size, 0);
}

/// All-pass outcomes keep the TSI high; all-error outcomes drag it down.
#[test]
fn status_mix_moves_the_signal() {
    let mut healthy = TsiTracker::new(20);
    let mut failing = TsiTracker::new(20);
    for index in 0..10_u64 {
        healthy.record(outcome(OutcomeStatus::Pass, 1_000 + index, 0.9));
        failing.record(outcome(OutcomeStatus::Error, 1_000 + index, 0.1));
    }
    let healthy_signal = healthy.signal(1_010);
    let failing_signal = failing.signal(1_010);
    assert!(healthy_signal.tsi_current > 0.8);
    assert!(failing_signal.tsi_current < 0.4);
    assert!(healthy_signal.tsi_current > failing_signal.tsi_current);
}

/// The window is capped at its configured size.
#[test]
fn window_is_bounded() {
    let mut tracker = TsiTracker::new(5);
    for index in 0..50_u64 {
        tracker.record(outcome(OutcomeStatus::Pass, index, 0.5));
    }
    assert_eq!(tracker.signal(100).window_size, 5);
}

/// Challenger pressure and latency both lower the score.
#[test]
fn penalties_lower_the_score() {
    let mut quiet = TsiTracker::new(10);
    let mut stressed = TsiTracker::new(10);
    for index in 0..5_u64 {
        quiet.record(outcome(OutcomeStatus::Pass, 1_000 + index, 0.5));
        stressed.record(InteractionOutcome {
            timestamp: 1_000 + index,
            status: OutcomeStatus::Pass,
            validator_agreement: 0.5,
            latency_ms: 3_000,
            challenger_fired: true,
            recovery_active: false,
        });
    }
    assert!(stressed.signal(1_010).tsi_current < quiet.signal(1_010).tsi_current);
}

/// An improving tail yields a positive slope and a higher forecast.
#[test]
fn improving_trend_raises_forecast() {
    let mut tracker = TsiTracker::new(20);
    for index in 0..5_u64 {
        tracker.record(outcome(OutcomeStatus::Refuse, 1_000 + index, 0.5));
    }
    for index in 5..10_u64 {
        tracker.record(outcome(OutcomeStatus::Pass, 1_000 + index, 0.9));
    }
    let signal = tracker.signal(1_010);
    assert!(signal.trend_slope > 0.0);
    assert!(signal.tsi_forecast_15m >= signal.tsi_current);
}

/// Rates partition the window.
#[test]
fn rates_partition_the_window() {
    let mut tracker = TsiTracker::new(10);
    tracker.record(outcome(OutcomeStatus::Pass, 1_000, 0.5));
    tracker.record(outcome(OutcomeStatus::Refuse, 1_001, 0.5));
    tracker.record(outcome(OutcomeStatus::Error, 1_002, 0.5));
    tracker.record(outcome(OutcomeStatus::Warn, 1_003, 0.5));
    let signal = tracker.signal(1_004);
    assert!((signal.pass_rate - 0.25).abs() < 1e-9);
    assert!((signal.refuse_rate - 0.25).abs() < 1e-9);
    assert!((signal.error_rate - 0.25).abs() < 1e-9);
}

proptest! {
    /// Arbitrary outcome sequences keep every signal bounded and finite.
    #[test]
    fn signals_stay_bounded(
        statuses in proptest::collection::vec(0_u8..4, 1..40),
        agreements in proptest::collection::vec(0.0_f64..=1.0, 40),
        latencies in proptest::collection::vec(0_u64..20_000, 40),
    ) {
        let mut tracker = TsiTracker::new(20);
        for (index, status) in statuses.iter().enumerate() {
            let status = match status {
                0 => OutcomeStatus::Pass,
                1 => OutcomeStatus::Warn,
                2 => OutcomeStatus::Refuse,
                _ => OutcomeStatus::Error,
            };
            tracker.record(InteractionOutcome {
                timestamp: 1_000 + index as u64,
                status,
                validator_agreement: agreements[index % agreements.len()],
                latency_ms: latencies[index % latencies.len()],
                challenger_fired: index % 3 == 0,
                recovery_active: false,
            });
            let signal = tracker.signal(1_000 + index as u64 + 1);
            prop_assert!((0.0..=1.0).contains(&signal.tsi_current));
            prop_assert!((0.0..=1.0).contains(&signal.tsi_forecast_15m));
            prop_assert!(signal.tsi_current.is_finite());
            prop_assert!(signal.tsi_forecast_15m.is_finite());
            prop_assert!(signal.trend_slope.is_finite());
        }
    }
}
