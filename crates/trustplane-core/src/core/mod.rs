// crates/trustplane-core/src/core/mod.rs
// ============================================================================
// Module: Trustplane Core Types
// Description: Canonical data model for governed turns and evidence chains.
// Purpose: Group the leaf types shared by the runtime and sibling crates.
// Dependencies: crate::core::*
// ============================================================================

//! ## Overview
//! Leaf data model of the governance kernel: hashing, profiles, session
//! state, input vectors, evidence packets, decision objects, the stage-event
//! ledger, redaction, provenance, and the constitution. Everything here is
//! deterministic and serializable; wall-clock time only enters through
//! caller-supplied values.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod constitution;
pub mod decision;
pub mod epack;
pub mod hashing;
pub mod input;
pub mod ledger;
pub mod manifest;
pub mod profile;
pub mod redaction;
pub mod session;
pub mod tsv;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use constitution::CONSTITUTION;
pub use constitution::GovernanceInvariant;
pub use constitution::InvariantCheckResult;
pub use constitution::InvariantSeverity;
pub use constitution::constitution_hash;
pub use decision::DecisionInputs;
pub use decision::DecisionObject;
pub use decision::build_decision_object;
pub use decision::compute_decision_hash;
pub use epack::EpackRecord;
pub use epack::GENESIS_HASH;
pub use epack::epack_hash;
pub use epack::new_epack;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashError;
pub use input::DomainTag;
pub use input::InputVector;
pub use input::Stage1Verdict;
pub use input::Stage2Verdict;
pub use ledger::MemoryLedger;
pub use ledger::StageEvent;
pub use ledger::new_stage_event;
pub use manifest::BuildManifest;
pub use profile::Profile;
pub use redaction::RedactMode;
pub use redaction::redact_payload;
pub use session::PendingGate;
pub use session::PendingGateState;
pub use session::SessionState;
pub use session::StateTrace;
pub use session::WorkflowStep;
pub use tsv::TsvState;
