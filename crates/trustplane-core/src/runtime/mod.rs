// crates/trustplane-core/src/runtime/mod.rs
// ============================================================================
// Module: Trustplane Runtime
// Description: Turn engine, safety, gates, tools, validation, and replay.
// Purpose: Group the executable governance pipeline built on the core types.
// Dependencies: crate::{core, interfaces, runtime::*}
// ============================================================================

//! ## Overview
//! The runtime drives governed turns: safety screening, routing, the gate
//! lifecycle, tool dispatch, output validation, sealing, and the offline
//! replay engine. All components are deterministic and generic over the
//! capability interfaces so hosts and tests substitute implementations
//! freely.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;
pub mod gates;
pub mod package;
pub mod replay;
pub mod router;
pub mod safety;
pub mod store;
pub mod tools;
pub mod validator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::EngineConfig;
pub use engine::EngineError;
pub use engine::TurnEngine;
pub use engine::TurnOutcome;
pub use gates::BindingStatus;
pub use gates::ClearedGate;
pub use gates::GateStep;
pub use gates::handle_pending_gate;
pub use gates::set_pending_gate;
pub use package::PackageInputs;
pub use package::PackageVerification;
pub use package::ReplayPackage;
pub use package::build_replay_package;
pub use package::verify_replay_package;
pub use replay::ReplayOptions;
pub use replay::ReplayOutcome;
pub use replay::ReplayResult;
pub use replay::ReplayStep;
pub use replay::ReplaySummary;
pub use replay::replay_chain;
pub use replay::replay_record;
pub use replay::replay_summary;
pub use router::Route;
pub use router::route;
pub use safety::DeterministicEmbedder;
pub use safety::Stage2Screen;
pub use safety::stage1;
pub use store::JsonlEpackSink;
pub use store::MemoryEpackSink;
pub use tools::SafeCalcTool;
pub use tools::ToolRegistry;
pub use tools::safe_calc;
pub use validator::ValidationAttempt;
pub use validator::ValidationOptions;
pub use validator::protected_regions_hash;
pub use validator::validate_output;
