// crates/trustplane-consensus/src/lib.rs
// ============================================================================
// Module: Trustplane Consensus Library
// Description: Two-stage consensus orchestration with scope gating.
// Purpose: Expose configuration, schemas, adapters, gates, and flows.
// Dependencies: crate::{adapter, challenger, config, orchestrator, ...}
// ============================================================================

//! ## Overview
//! The consensus layer runs governed model calls: anchored prompts, strict
//! schemas with a JSON-repair loop, a pure scope gate classified by the
//! caller's role level, a deterministic challenger trigger and arbitration,
//! and a parallel Defender/Critic fan-out synthesized by an Arbiter. All
//! stage boundaries land in the shared hash-chained ledger.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod adapter;
pub mod challenger;
pub mod config;
pub mod orchestrator;
pub mod schemas;
pub mod scope_gate;
pub mod verification;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use adapter::Adapter;
pub use adapter::AdapterError;
pub use adapter::AdapterFactory;
pub use adapter::AdapterRegistry;
pub use challenger::ArbitrationResult;
pub use challenger::ChallengePack;
pub use challenger::ChallengerRules;
pub use challenger::ChallengerTriggerResult;
pub use challenger::TriggerInputs;
pub use challenger::arbitrate;
pub use challenger::build_challenger_prompt;
pub use challenger::compute_disagreement_score;
pub use challenger::parse_challenge_pack;
pub use challenger::should_trigger_challenger;
pub use config::Aru;
pub use config::ConsensusConfig;
pub use config::DebateConfig;
pub use config::ModelSpec;
pub use config::PromptAnchors;
pub use config::PromptBundle;
pub use config::default_prompts;
pub use orchestrator::ConsensusError;
pub use orchestrator::ConsensusRun;
pub use orchestrator::ConsensusStatus;
pub use orchestrator::DebateRun;
pub use orchestrator::Orchestrator;
pub use orchestrator::RunAnchors;
pub use schemas::PrimaryOutput;
pub use schemas::SynthesizerOutput;
pub use schemas::ValidatorOutput;
pub use schemas::ValidatorVerdict;
pub use schemas::parse_primary_output;
pub use schemas::parse_synthesizer_output;
pub use schemas::parse_validator_output;
pub use scope_gate::GateDecision;
pub use scope_gate::ScopeGateConfig;
pub use scope_gate::ScopeGateResult;
pub use scope_gate::ScopeRule;
pub use scope_gate::ScopeViolation;
pub use scope_gate::evaluate_scope_gate;
pub use verification::Role;
pub use verification::VerificationContext;
