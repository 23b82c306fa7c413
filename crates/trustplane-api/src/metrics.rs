// crates/trustplane-api/src/metrics.rs
// ============================================================================
// Module: Trustplane Governance Metrics
// Description: Aggregated governance dashboard counters and rates.
// Purpose: Back the /metrics endpoint with concurrent-safe counters.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Coarse counters over governed traffic: turns by route, refusals,
//! clarifications, challenger fires, and replay verdicts. Counters are
//! advisory observability, never consulted by routing or validation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Point-in-time metrics snapshot returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total governed turns.
    pub turns_total: u64,
    /// Turns by route label.
    pub routes: BTreeMap<String, u64>,
    /// BOUND refusals.
    pub bound_refusals: u64,
    /// DEFER responses.
    pub defers: u64,
    /// CLARIFY fail-closed responses.
    pub clarifies: u64,
    /// Challenger invocations.
    pub challenger_fires: u64,
    /// Replays classified VERIFIED.
    pub replay_verified: u64,
    /// Replays classified DRIFT.
    pub replay_drift: u64,
    /// Replays classified TAMPER_DETECTED.
    pub replay_tampered: u64,
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Concurrent-safe governance metrics accumulator.
#[derive(Debug, Default)]
pub struct GovernanceMetrics {
    /// Guarded snapshot state.
    inner: Mutex<MetricsSnapshot>,
}

impl GovernanceMetrics {
    /// Creates zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a governed turn, classifying by the reply prefix.
    pub fn record_turn(&self, route: &str, assistant_text: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.turns_total += 1;
            *inner.routes.entry(route.to_string()).or_insert(0) += 1;
            if assistant_text.starts_with("BOUND:") {
                inner.bound_refusals += 1;
            } else if assistant_text.starts_with("DEFER:") {
                inner.defers += 1;
            } else if assistant_text.starts_with("CLARIFY:") {
                inner.clarifies += 1;
            }
        }
    }

    /// Records a challenger invocation.
    pub fn record_challenger_fire(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.challenger_fires += 1;
        }
    }

    /// Records a terminal replay outcome.
    pub fn record_replay(&self, outcome: trustplane_core::ReplayOutcome) {
        if let Ok(mut inner) = self.inner.lock() {
            match outcome {
                trustplane_core::ReplayOutcome::Verified => inner.replay_verified += 1,
                trustplane_core::ReplayOutcome::Drift => inner.replay_drift += 1,
                trustplane_core::ReplayOutcome::TamperDetected => inner.replay_tampered += 1,
            }
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|inner| inner.clone()).unwrap_or_default()
    }
}
