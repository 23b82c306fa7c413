// crates/trustplane-resilience/src/breaker.rs
// ============================================================================
// Module: Trustplane Circuit Breaker
// Description: Per-plan breaker preventing death-spiral recovery.
// Purpose: Stop re-selecting plans that keep failing until cooldown expires.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each recovery plan has its own breaker: CLOSED plans are eligible, OPEN
//! plans are blocked after the consecutive-failure threshold, and after the
//! cooldown an OPEN breaker becomes HALF_OPEN for a single probe attempt -
//! success closes it, failure snaps it back to OPEN. Transitions are
//! deterministic and driven entirely by caller-supplied time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker OPEN.
    pub failure_threshold: u32,
    /// Seconds OPEN before transitioning to HALF_OPEN.
    pub cooldown_seconds: f64,
    /// Probe attempts allowed while HALF_OPEN.
    pub half_open_max_attempts: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_seconds: 120.0,
            half_open_max_attempts: 1,
        }
    }
}

// ============================================================================
// SECTION: Per-Plan State
// ============================================================================

/// Breaker state machine values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Plan is eligible for selection.
    #[default]
    Closed,
    /// Plan is blocked.
    Open,
    /// Cooldown expired; plan gets one probe attempt.
    HalfOpen,
}

impl BreakerState {
    /// Canonical wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Per-plan circuit-breaker counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanBreaker {
    /// Plan name.
    pub plan_name: String,
    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,
    /// Current machine state.
    pub state: BreakerState,
    /// Unix seconds of the last failure.
    pub last_failure_ts: u64,
    /// Unix seconds of the last success.
    pub last_success_ts: u64,
    /// Probe attempts consumed while HALF_OPEN.
    pub half_open_attempts: u32,
    /// Lifetime failure count.
    pub total_failures: u64,
    /// Lifetime success count.
    pub total_successes: u64,
}

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

/// Per-plan circuit breakers for the recovery engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CircuitBreaker {
    /// Breaker thresholds.
    config: BreakerConfig,
    /// Per-plan state.
    breakers: BTreeMap<String, PlanBreaker>,
}

impl CircuitBreaker {
    /// Creates a breaker table with the given thresholds.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: BTreeMap::new(),
        }
    }

    /// Fetches (or initializes) the breaker for a plan.
    fn entry(&mut self, plan_name: &str) -> &mut PlanBreaker {
        self.breakers.entry(plan_name.to_string()).or_insert_with(|| PlanBreaker {
            plan_name: plan_name.to_string(),
            ..PlanBreaker::default()
        })
    }

    /// Transitions OPEN breakers to HALF_OPEN once their cooldown expired.
    #[allow(clippy::cast_precision_loss, reason = "Cooldown spans are far below 2^52.")]
    fn maybe_transition(config: &BreakerConfig, breaker: &mut PlanBreaker, now: u64) {
        if breaker.state == BreakerState::Open
            && now.saturating_sub(breaker.last_failure_ts) as f64 >= config.cooldown_seconds
        {
            breaker.state = BreakerState::HalfOpen;
            breaker.half_open_attempts = 0;
        }
    }

    /// Plan names currently blocked (OPEN, or probe-exhausted HALF_OPEN).
    pub fn excluded_plans(&mut self, now: u64) -> BTreeSet<String> {
        let mut blocked = BTreeSet::new();
        for breaker in self.breakers.values_mut() {
            Self::maybe_transition(&self.config, breaker, now);
            let excluded = match breaker.state {
                BreakerState::Open => true,
                BreakerState::HalfOpen => {
                    breaker.half_open_attempts >= self.config.half_open_max_attempts
                }
                BreakerState::Closed => false,
            };
            if excluded {
                blocked.insert(breaker.plan_name.clone());
            }
        }
        blocked
    }

    /// Plan applied and verified improved: reset to CLOSED.
    pub fn record_success(&mut self, plan_name: &str, now: u64) {
        let breaker = self.entry(plan_name);
        breaker.consecutive_failures = 0;
        breaker.state = BreakerState::Closed;
        breaker.last_success_ts = now;
        breaker.half_open_attempts = 0;
        breaker.total_successes += 1;
    }

    /// Plan applied but did not improve: count the failure and maybe trip.
    pub fn record_failure(&mut self, plan_name: &str, now: u64) {
        let threshold = self.config.failure_threshold;
        let breaker = self.entry(plan_name);
        breaker.consecutive_failures += 1;
        breaker.total_failures += 1;
        breaker.last_failure_ts = now;

        if breaker.state == BreakerState::HalfOpen {
            breaker.state = BreakerState::Open;
            breaker.half_open_attempts = 0;
        } else if breaker.consecutive_failures >= threshold {
            breaker.state = BreakerState::Open;
        }
    }

    /// Tracks a probe attempt during HALF_OPEN.
    pub fn record_half_open_attempt(&mut self, plan_name: &str) {
        let breaker = self.entry(plan_name);
        if breaker.state == BreakerState::HalfOpen {
            breaker.half_open_attempts += 1;
        }
    }

    /// Current state of a plan's breaker, if one exists.
    #[must_use]
    pub fn plan_state(&self, plan_name: &str) -> Option<BreakerState> {
        self.breakers.get(plan_name).map(|breaker| breaker.state)
    }

    /// Auditable snapshot of all breaker states.
    #[must_use]
    pub fn state_snapshot(&self) -> Vec<PlanBreaker> {
        self.breakers.values().cloned().collect()
    }

    /// Resets one breaker, or all of them (manual override / break-glass).
    pub fn reset(&mut self, plan_name: Option<&str>) {
        match plan_name {
            Some(name) => {
                if let Some(breaker) = self.breakers.get_mut(name) {
                    *breaker = PlanBreaker {
                        plan_name: name.to_string(),
                        ..PlanBreaker::default()
                    };
                }
            }
            None => self.breakers.clear(),
        }
    }
}
