// crates/trustplane-resilience/src/compiler.rs
// ============================================================================
// Module: Trustplane Resilience Policy Compiler
// Description: Compiles the resilience_policy DSL block into a runtime.
// Purpose: Turn declarative policy into engine, damping, breaker, verifier.
// Dependencies: crate::*, trustplane-config
// ============================================================================

//! ## Overview
//! The compiler reads the `resilience_policy` block of a governance policy
//! and builds the full runtime: engine with scoring weights, tiered plans,
//! damping with PID parameters, breaker, tracker, and post-recovery
//! verifier. Shape problems are collected as error strings; compilation
//! never aborts the host.

// ============================================================================
// SECTION: Imports
// ============================================================================

use trustplane_config::PlanSpec;
use trustplane_config::ResiliencePolicy;

use crate::breaker::BreakerConfig;
use crate::breaker::CircuitBreaker;
use crate::damping::DampingStabilizer;
use crate::damping::PidParams;
use crate::recovery::RecoveryBudgets;
use crate::recovery::RecoveryEngine;
use crate::recovery::RecoveryPlan;
use crate::recovery::RecoveryTargets;
use crate::runtime::ResilienceRuntime;
use crate::tsi::TsiTracker;
use crate::verifier::PostRecoveryVerifier;
use crate::verifier::VerificationConfig;

// ============================================================================
// SECTION: Compiled Output
// ============================================================================

/// Result of compiling a resilience policy block.
#[derive(Debug, Clone)]
pub struct CompiledResilience {
    /// Whether the resilience loop is enabled.
    pub enabled: bool,
    /// Compiled runtime when enabled.
    pub runtime: Option<ResilienceRuntime>,
    /// Shape errors collected during compilation.
    pub errors: Vec<String>,
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

/// Converts a declared plan into a runtime plan.
fn compile_plan(spec: &PlanSpec, tier: u8) -> RecoveryPlan {
    RecoveryPlan {
        name: spec.name.clone(),
        tier,
        predicted_tsi_median: spec.predicted.tsi_median,
        predicted_tsi_low: spec.predicted.tsi_low,
        predicted_tsi_high: spec.predicted.tsi_high,
        predicted_latency_ms: spec.predicted.latency_ms,
        predicted_cost_usd: spec.predicted.cost_usd,
        predicted_independence_gain: spec.predicted.independence_gain,
        routing_patch: spec.routing_patch.clone(),
    }
}

/// Compiles the full resilience policy block into a runtime.
#[must_use]
pub fn compile_resilience_policy(policy: &ResiliencePolicy) -> CompiledResilience {
    if !policy.enabled {
        return CompiledResilience {
            enabled: false,
            runtime: None,
            errors: Vec::new(),
        };
    }

    let mut errors = Vec::new();

    let targets = RecoveryTargets {
        tsi_target: policy.targets.tsi.target,
        tsi_min: policy.targets.tsi.min,
        tsi_critical: policy.targets.tsi.critical,
        max_recovery_minutes: policy.targets.recovery.max_minutes,
    };
    if targets.tsi_critical > targets.tsi_min || targets.tsi_min > targets.tsi_target {
        errors.push("resilience targets must order critical <= min <= target".to_string());
    }

    let budgets = RecoveryBudgets {
        latency_ms_max: policy.budgets.latency_ms_max,
        cost_usd_max: policy.budgets.cost_usd_max,
    };

    let mut engine = RecoveryEngine::new(budgets, targets);
    engine.diversity_bonus_weight = policy.scoring.weights.diversity_bonus;
    engine.penalty_latency_weight = policy.scoring.weights.latency_penalty_per_ms;
    engine.penalty_cost_weight = policy.scoring.weights.cost_penalty_per_usd;
    engine.confidence_low_penalty_weight = policy.scoring.weights.confidence_low_penalty;
    for (tier_key, penalty) in &policy.scoring.tier_penalties {
        match tier_key.parse::<u8>() {
            Ok(tier) => {
                engine.tier_penalties.insert(tier, *penalty);
            }
            Err(_) => errors.push(format!("invalid tier penalty key: {tier_key}")),
        }
    }

    let mut plans = Vec::new();
    for (tier, specs) in
        [(1, &policy.plans.tier_1), (2, &policy.plans.tier_2), (3, &policy.plans.tier_3)]
    {
        for spec in specs {
            if spec.name.trim().is_empty() {
                errors.push(format!("tier_{tier} plan without a name was skipped"));
                continue;
            }
            plans.push(compile_plan(spec, tier));
        }
    }

    let damping = policy.damping.enabled.then(|| {
        DampingStabilizer::new(
            PidParams {
                kp: policy.damping.pid.kp,
                ki: policy.damping.pid.ki,
                kd: policy.damping.pid.kd,
                integral_cap: policy.damping.pid.integral_cap,
            },
            policy.damping.max_oscillation,
            policy.damping.cooldown_seconds,
        )
    });

    let circuit_breaker = CircuitBreaker::new(BreakerConfig::default());
    let tsi_tracker = TsiTracker::new(20);
    let verifier = PostRecoveryVerifier::new(
        VerificationConfig {
            replay_samples: policy.audit.verify_post_recovery.replay_samples,
            mvi_check: policy.audit.verify_post_recovery.mvi_check,
            ..VerificationConfig::default()
        },
        targets,
    );

    let runtime = ResilienceRuntime::new(
        engine,
        plans,
        damping,
        circuit_breaker,
        tsi_tracker,
        verifier,
        true,
    );

    CompiledResilience {
        enabled: true,
        runtime: Some(runtime),
        errors,
    }
}
