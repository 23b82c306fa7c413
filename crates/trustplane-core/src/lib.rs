// crates/trustplane-core/src/lib.rs
// ============================================================================
// Module: Trustplane Core Library
// Description: Public API surface for the Trustplane governance kernel core.
// Purpose: Expose the core data model, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Trustplane core provides the deterministic governance kernel: the turn
//! engine with routing and gate lifecycle, the hash-chained EPACK evidence
//! chain committed to canonical Decision Objects, and the offline replay
//! engine. It is provider-agnostic and integrates through explicit
//! capability interfaces rather than embedding into model frameworks.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::Clock;
pub use interfaces::Embedder;
pub use interfaces::EpackSink;
pub use interfaces::FixedClock;
pub use interfaces::GeneratedText;
pub use interfaces::GenerationConfig;
pub use interfaces::GenerationError;
pub use interfaces::LedgerError;
pub use interfaces::LedgerSink;
pub use interfaces::SinkError;
pub use interfaces::SystemClock;
pub use interfaces::TextGenerator;
pub use interfaces::Tool;
pub use interfaces::ToolResult;
pub use runtime::DeterministicEmbedder;
pub use runtime::EngineConfig;
pub use runtime::EngineError;
pub use runtime::JsonlEpackSink;
pub use runtime::MemoryEpackSink;
pub use runtime::ReplayOptions;
pub use runtime::ReplayOutcome;
pub use runtime::ReplayPackage;
pub use runtime::ReplayResult;
pub use runtime::ReplaySummary;
pub use runtime::Route;
pub use runtime::ToolRegistry;
pub use runtime::TurnEngine;
pub use runtime::TurnOutcome;
pub use runtime::ValidationAttempt;
pub use runtime::replay_chain;
pub use runtime::replay_record;
pub use runtime::replay_summary;
pub use runtime::route;
