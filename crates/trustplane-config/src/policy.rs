// crates/trustplane-config/src/policy.rs
// ============================================================================
// Module: Trustplane Governance Policy DSL
// Description: YAML/JSON governance policy loading and validation.
// Purpose: Parse policy documents with defaults; report shape errors as data.
// Dependencies: serde, serde_json, serde_yaml
// ============================================================================

//! ## Overview
//! A governance policy configures consensus, challenger, evidence, replay,
//! and resilience behavior. Missing fields default; invalid shapes produce a
//! list of validation error strings without aborting the server: the active
//! policy plus its errors are both exposed over the API.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Consensus Block
// ============================================================================

/// Provider/model reference inside a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRef {
    /// Provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
}

impl Default for ModelRef {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "mock-llm".to_string(),
        }
    }
}

/// Debate role triple for the two-stage flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateRef {
    /// Defender (primary) model.
    pub defender: ModelRef,
    /// Critic (challenger) model.
    pub critic: ModelRef,
    /// Synthesizer (arbiter) model.
    pub synthesizer: ModelRef,
}

/// Consensus configuration block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusPolicy {
    /// Minimum validators required.
    pub min_validators: u32,
    /// Minimum provider-independence score.
    pub independence_min: f64,
    /// Primary model.
    pub primary: ModelRef,
    /// Validator models.
    pub validators: Vec<ModelRef>,
    /// Debate role triple, if configured.
    pub debate: Option<DebateRef>,
    /// Primary call timeout in seconds.
    pub primary_timeout_s: u64,
    /// Maximum JSON-repair attempts.
    pub max_repair_attempts: u32,
    /// Whether the two-stage debate flow is enabled.
    pub enable_debate: bool,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            min_validators: 1,
            independence_min: 0.6,
            primary: ModelRef::default(),
            validators: vec![ModelRef::default()],
            debate: None,
            primary_timeout_s: 60,
            max_repair_attempts: 2,
            enable_debate: false,
        }
    }
}

// ============================================================================
// SECTION: Challenger Block
// ============================================================================

/// Challenger trigger toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengerTriggers {
    /// Trigger on HIGH_STAKES turns.
    pub high_stakes: bool,
    /// Primary/validator disagreement threshold.
    pub disagreement_threshold: f64,
    /// Trigger when the scope gate returned REWRITE or REFUSE.
    pub on_gate: bool,
    /// Trigger on low evidence level during high-stakes turns.
    pub low_evidence: bool,
}

impl Default for ChallengerTriggers {
    fn default() -> Self {
        Self {
            high_stakes: true,
            disagreement_threshold: 0.22,
            on_gate: true,
            low_evidence: true,
        }
    }
}

/// Challenger resource limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengerLimits {
    /// Challenger call timeout in seconds.
    pub timeout_s: u64,
    /// Maximum challenger output tokens.
    pub max_tokens: u32,
    /// Per-session challenger invocation cap.
    pub max_challenges: u32,
}

impl Default for ChallengerLimits {
    fn default() -> Self {
        Self {
            timeout_s: 6,
            max_tokens: 400,
            max_challenges: 10,
        }
    }
}

/// Challenger configuration block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengerPolicy {
    /// Whether the challenger is enabled.
    pub enabled: bool,
    /// Challenger provider.
    pub provider: String,
    /// Challenger model.
    pub model: String,
    /// Trigger toggles.
    pub triggers: ChallengerTriggers,
    /// Resource limits.
    pub limits: ChallengerLimits,
}

impl Default for ChallengerPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "mock".to_string(),
            model: "mock-llm".to_string(),
            triggers: ChallengerTriggers::default(),
            limits: ChallengerLimits::default(),
        }
    }
}

// ============================================================================
// SECTION: Evidence and Replay Blocks
// ============================================================================

/// Evidence requirements block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceRules {
    /// Minimum accepted evidence strength (E0–E3).
    pub min_strength: String,
}

impl Default for EvidenceRules {
    fn default() -> Self {
        Self {
            min_strength: "E1".to_string(),
        }
    }
}

/// Replay requirements block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayPolicy {
    /// Whether strict replay is required for every turn.
    pub strict_required: bool,
    /// Audit retention in years.
    pub retention_years: u32,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            strict_required: false,
            retention_years: 7,
        }
    }
}

// ============================================================================
// SECTION: Resilience Block
// ============================================================================

/// TSI targets inside the resilience block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsiTargets {
    /// Target TSI after recovery.
    pub target: f64,
    /// Minimum acceptable TSI.
    pub min: f64,
    /// Critical TSI floor.
    pub critical: f64,
}

impl Default for TsiTargets {
    fn default() -> Self {
        Self {
            target: 0.75,
            min: 0.70,
            critical: 0.55,
        }
    }
}

/// Recovery timing targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryTimings {
    /// Maximum recovery duration in minutes.
    pub max_minutes: u32,
    /// Verification delay after recovery in minutes.
    pub verify_after_minutes: u32,
}

impl Default for RecoveryTimings {
    fn default() -> Self {
        Self {
            max_minutes: 15,
            verify_after_minutes: 15,
        }
    }
}

/// Targets section of the resilience block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceTargets {
    /// TSI targets.
    pub tsi: TsiTargets,
    /// Recovery timings.
    pub recovery: RecoveryTimings,
}

/// Budgets section of the resilience block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceBudgets {
    /// Maximum added latency per recovery plan.
    pub latency_ms_max: u64,
    /// Maximum added cost per recovery plan.
    pub cost_usd_max: f64,
}

impl Default for ResilienceBudgets {
    fn default() -> Self {
        Self {
            latency_ms_max: 800,
            cost_usd_max: 0.50,
        }
    }
}

/// Dependency concentration caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyCaps {
    /// Maximum provider mass.
    pub max_mass: f64,
    /// Minimum provider diversity.
    pub min_diversity: f64,
    /// Maximum dependency density.
    pub max_density: f64,
}

impl Default for DependencyCaps {
    fn default() -> Self {
        Self {
            max_mass: 0.70,
            min_diversity: 0.30,
            max_density: 0.40,
        }
    }
}

/// Declarative trigger rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerRule {
    /// Trigger identifier.
    pub id: String,
    /// Trigger condition expression.
    pub when: String,
}

/// Predicted effect of a recovery plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanPrediction {
    /// Median predicted TSI after the plan.
    pub tsi_median: f64,
    /// Low predicted TSI band.
    pub tsi_low: f64,
    /// High predicted TSI band.
    pub tsi_high: f64,
    /// Predicted added latency.
    pub latency_ms: u64,
    /// Predicted added cost.
    pub cost_usd: f64,
    /// Predicted independence (diversity) gain.
    pub independence_gain: f64,
}

impl Default for PlanPrediction {
    fn default() -> Self {
        Self {
            tsi_median: 0.72,
            tsi_low: 0.65,
            tsi_high: 0.80,
            latency_ms: 200,
            cost_usd: 0.01,
            independence_gain: 0.0,
        }
    }
}

/// A recovery plan declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanSpec {
    /// Plan name.
    pub name: String,
    /// Predicted effect bands.
    pub predicted: PlanPrediction,
    /// Opaque routing patch applied when the plan is chosen.
    pub routing_patch: Value,
}

/// Tiered plan lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanTiers {
    /// Tier-1 plans (cheapest).
    pub tier_1: Vec<PlanSpec>,
    /// Tier-2 plans.
    pub tier_2: Vec<PlanSpec>,
    /// Tier-3 plans (most disruptive).
    pub tier_3: Vec<PlanSpec>,
}

/// Plan scoring weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Diversity bonus weight.
    pub diversity_bonus: f64,
    /// Latency penalty per millisecond.
    pub latency_penalty_per_ms: f64,
    /// Cost penalty per dollar.
    pub cost_penalty_per_usd: f64,
    /// Penalty weight when the predicted low band undershoots the minimum.
    pub confidence_low_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            diversity_bonus: 0.15,
            latency_penalty_per_ms: 0.0005,
            cost_penalty_per_usd: 0.25,
            confidence_low_penalty: 0.30,
        }
    }
}

/// Scoring section of the resilience block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceScoring {
    /// Scoring weights.
    pub weights: ScoringWeights,
    /// Per-tier score penalties keyed by tier number.
    pub tier_penalties: BTreeMap<String, f64>,
    /// Normative tie-break order.
    pub tie_breakers: Vec<String>,
}

impl Default for ResilienceScoring {
    fn default() -> Self {
        let mut tier_penalties = BTreeMap::new();
        tier_penalties.insert("1".to_string(), 0.00);
        tier_penalties.insert("2".to_string(), 0.05);
        tier_penalties.insert("3".to_string(), 0.12);
        Self {
            weights: ScoringWeights::default(),
            tier_penalties,
            tie_breakers: vec!["predicted_independence_gain".to_string(), "-tier".to_string()],
        }
    }
}

/// PID damping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidBlock {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain.
    pub ki: f64,
    /// Derivative gain.
    pub kd: f64,
    /// Integral wind-up cap.
    pub integral_cap: f64,
}

impl Default for PidBlock {
    fn default() -> Self {
        Self {
            kp: 0.5,
            ki: 0.2,
            kd: 0.1,
            integral_cap: 2.0,
        }
    }
}

/// Damping section of the resilience block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DampingBlock {
    /// Whether damping is enabled.
    pub enabled: bool,
    /// Oscillation ceiling before rollout is slowed.
    pub max_oscillation: f64,
    /// Cooldown between recovery decisions.
    pub cooldown_seconds: u64,
    /// PID parameters.
    pub pid: PidBlock,
}

impl Default for DampingBlock {
    fn default() -> Self {
        Self {
            enabled: true,
            max_oscillation: 0.15,
            cooldown_seconds: 60,
            pid: PidBlock::default(),
        }
    }
}

/// Adaptive tuning toggle (parsed, not executed by the runtime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveTuning {
    /// Whether tuning is enabled.
    pub enabled: bool,
    /// Tuning method label.
    pub method: String,
    /// Maximum per-cycle parameter delta.
    pub max_delta: f64,
}

impl Default for AdaptiveTuning {
    fn default() -> Self {
        Self {
            enabled: false,
            method: "heuristic".to_string(),
            max_delta: 0.10,
        }
    }
}

/// Human override section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanOverride {
    /// Whether human override is preserved.
    pub enabled: bool,
    /// Approver role labels.
    pub approvers: Vec<String>,
    /// Whether break-glass override is permitted.
    pub break_glass: bool,
}

impl Default for HumanOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            approvers: vec!["ciso".to_string(), "sre_oncall".to_string()],
            break_glass: true,
        }
    }
}

/// Post-recovery verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyPostRecovery {
    /// Replay samples taken after a recovery.
    pub replay_samples: u32,
    /// Whether the MVI check runs after a recovery.
    pub mvi_check: bool,
}

impl Default for VerifyPostRecovery {
    fn default() -> Self {
        Self {
            replay_samples: 3,
            mvi_check: true,
        }
    }
}

/// Audit section of the resilience block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceAudit {
    /// EPACK stage-event types emitted by the resilience plane.
    pub epack_event_types: Vec<String>,
    /// Whether recoveries are verified with replay.
    pub verify_with_replay: bool,
    /// Whether recoveries are verified with the MVI.
    pub verify_with_mvi: bool,
    /// Post-recovery verification settings.
    pub verify_post_recovery: VerifyPostRecovery,
}

impl Default for ResilienceAudit {
    fn default() -> Self {
        Self {
            epack_event_types: vec![
                "RECOVERY_TRIGGERED".to_string(),
                "RECOVERY_DECISION".to_string(),
                "RECOVERY_APPLIED".to_string(),
                "RECOVERY_VERIFIED".to_string(),
                "RECOVERY_ROLLBACK".to_string(),
                "CIRCUIT_BREAKER".to_string(),
            ],
            verify_with_replay: true,
            verify_with_mvi: true,
            verify_post_recovery: VerifyPostRecovery::default(),
        }
    }
}

/// Resilience configuration block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResiliencePolicy {
    /// Block version.
    pub version: String,
    /// Whether the resilience loop is enabled.
    pub enabled: bool,
    /// Targets section.
    pub targets: ResilienceTargets,
    /// Budgets section.
    pub budgets: ResilienceBudgets,
    /// Dependency caps section.
    pub dependency_caps: DependencyCaps,
    /// Declarative trigger rules.
    pub triggers: Vec<TriggerRule>,
    /// Tiered recovery plans.
    pub plans: PlanTiers,
    /// Plan scoring section.
    pub scoring: ResilienceScoring,
    /// Damping section.
    pub damping: DampingBlock,
    /// Adaptive tuning toggle.
    pub adaptive_tuning: AdaptiveTuning,
    /// Human override section.
    pub human_override: HumanOverride,
    /// Audit section.
    pub audit: ResilienceAudit,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            enabled: false,
            targets: ResilienceTargets::default(),
            budgets: ResilienceBudgets::default(),
            dependency_caps: DependencyCaps::default(),
            triggers: vec![
                TriggerRule {
                    id: "tsi_forecast_drop".to_string(),
                    when: "tsi_forecast_15m < targets.tsi.min".to_string(),
                },
                TriggerRule {
                    id: "concentration_high".to_string(),
                    when: "concentration_index >= 0.70 and tsi_forecast_15m < targets.tsi.target"
                        .to_string(),
                },
                TriggerRule {
                    id: "system_degraded".to_string(),
                    when: "system_status in ['degraded','incident']".to_string(),
                },
            ],
            plans: PlanTiers::default(),
            scoring: ResilienceScoring::default(),
            damping: DampingBlock::default(),
            adaptive_tuning: AdaptiveTuning::default(),
            human_override: HumanOverride::default(),
            audit: ResilienceAudit::default(),
        }
    }
}

// ============================================================================
// SECTION: Policy Document
// ============================================================================

/// Full governance policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDocument {
    /// Policy identifier.
    pub policy_id: String,
    /// Policy version.
    pub policy_version: String,
    /// Consensus block.
    pub consensus: ConsensusPolicy,
    /// Challenger block.
    pub challenger: ChallengerPolicy,
    /// Evidence rules block.
    pub evidence_rules: EvidenceRules,
    /// Replay block.
    pub replay: ReplayPolicy,
    /// Resilience block.
    pub resilience_policy: ResiliencePolicy,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            policy_id: "default".to_string(),
            policy_version: "1.0".to_string(),
            consensus: ConsensusPolicy::default(),
            challenger: ChallengerPolicy::default(),
            evidence_rules: EvidenceRules::default(),
            replay: ReplayPolicy::default(),
            resilience_policy: ResiliencePolicy::default(),
        }
    }
}

/// A loaded policy plus any shape/validation errors encountered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedPolicy {
    /// Active policy document (defaults where fields were missing).
    pub document: PolicyDocument,
    /// Validation error strings (empty when the document is clean).
    pub errors: Vec<String>,
}

/// Loads a policy from a YAML or JSON file.
///
/// A missing file yields the default policy with no errors. Parse failures
/// yield the default policy plus the parse error as a validation string;
/// loading never aborts.
#[must_use]
pub fn load_policy(path: impl AsRef<Path>) -> LoadedPolicy {
    let path = path.as_ref();
    if !path.exists() {
        let document = PolicyDocument::default();
        let errors = validate_policy(&document);
        return LoadedPolicy {
            document,
            errors,
        };
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            return LoadedPolicy {
                document: PolicyDocument::default(),
                errors: vec![format!("policy read failed: {err}")],
            };
        }
    };

    let parsed: Result<PolicyDocument, String> =
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            serde_json::from_str(&raw).map_err(|err| format!("policy json error: {err}"))
        } else {
            serde_yaml::from_str(&raw).map_err(|err| format!("policy yaml error: {err}"))
        };

    match parsed {
        Ok(document) => {
            let errors = validate_policy(&document);
            LoadedPolicy {
                document,
                errors,
            }
        }
        Err(error) => LoadedPolicy {
            document: PolicyDocument::default(),
            errors: vec![error],
        },
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a policy document, returning error strings instead of aborting.
#[must_use]
pub fn validate_policy(document: &PolicyDocument) -> Vec<String> {
    let mut errors = Vec::new();

    if document.policy_id.trim().is_empty() {
        errors.push("policy_id must not be empty".to_string());
    }
    if !(0.0..=1.0).contains(&document.consensus.independence_min) {
        errors.push("consensus.independence_min must be within [0, 1]".to_string());
    }
    if document.consensus.primary_timeout_s == 0 {
        errors.push("consensus.primary_timeout_s must be positive".to_string());
    }
    if document.consensus.max_repair_attempts > 5 {
        errors.push("consensus.max_repair_attempts must be at most 5".to_string());
    }
    if document.consensus.enable_debate && document.consensus.debate.is_none() {
        errors.push("consensus.enable_debate requires a debate block".to_string());
    }
    if !(0.0..=1.0).contains(&document.challenger.triggers.disagreement_threshold) {
        errors.push("challenger.triggers.disagreement_threshold must be within [0, 1]".to_string());
    }
    if !matches!(document.evidence_rules.min_strength.as_str(), "E0" | "E1" | "E2" | "E3") {
        errors.push(format!(
            "evidence_rules.min_strength must be one of E0..E3, got {}",
            document.evidence_rules.min_strength
        ));
    }

    let tsi = &document.resilience_policy.targets.tsi;
    if !(0.0..=1.0).contains(&tsi.target)
        || !(0.0..=1.0).contains(&tsi.min)
        || !(0.0..=1.0).contains(&tsi.critical)
    {
        errors.push("resilience_policy.targets.tsi values must be within [0, 1]".to_string());
    }
    if tsi.critical > tsi.min || tsi.min > tsi.target {
        errors.push("resilience_policy.targets.tsi must order critical <= min <= target".to_string());
    }
    if document.resilience_policy.budgets.latency_ms_max == 0 {
        errors.push("resilience_policy.budgets.latency_ms_max must be positive".to_string());
    }
    if document.resilience_policy.budgets.cost_usd_max < 0.0 {
        errors.push("resilience_policy.budgets.cost_usd_max must be non-negative".to_string());
    }

    let mut seen_plans: Vec<&str> = Vec::new();
    let tiers = &document.resilience_policy.plans;
    for plan in tiers.tier_1.iter().chain(&tiers.tier_2).chain(&tiers.tier_3) {
        if plan.name.trim().is_empty() {
            errors.push("resilience_policy.plans entries must be named".to_string());
            continue;
        }
        if seen_plans.contains(&plan.name.as_str()) {
            errors.push(format!("duplicate recovery plan name: {}", plan.name));
        }
        seen_plans.push(plan.name.as_str());
        if plan.predicted.tsi_low > plan.predicted.tsi_median
            || plan.predicted.tsi_median > plan.predicted.tsi_high
        {
            errors.push(format!(
                "plan {} predicted bands must order low <= median <= high",
                plan.name
            ));
        }
    }

    errors
}
