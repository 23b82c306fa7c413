// crates/trustplane-core/src/interfaces/mod.rs
// ============================================================================
// Module: Trustplane Interfaces
// Description: Capability seams for generation, storage, time, and tools.
// Purpose: Define the contract surfaces the turn engine is generic over.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! The turn engine never talks to providers, disks, or clocks directly; it is
//! generic over these capability traits so hosts and tests can substitute
//! implementations without touching governance internals. Implementations
//! must fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::epack::EpackRecord;
use crate::core::ledger::StageEvent;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Time source for sealing and decay computations.
///
/// The core never reads wall-clock time directly; hosts supply it through
/// this capability so replay and tests stay deterministic.
pub trait Clock {
    /// Current unix time in whole seconds.
    fn unix_seconds(&self) -> u64;

    /// Current unix time in milliseconds.
    fn unix_millis(&self) -> u64;
}

/// Wall-clock implementation backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_seconds(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
    }

    fn unix_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Fixed clock for deterministic tests and replay.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    /// Frozen unix milliseconds returned by every read.
    pub millis: u64,
}

impl FixedClock {
    /// Creates a clock frozen at the given unix milliseconds.
    #[must_use]
    pub const fn at_millis(millis: u64) -> Self {
        Self {
            millis,
        }
    }
}

impl Clock for FixedClock {
    fn unix_seconds(&self) -> u64 {
        self.millis / 1000
    }

    fn unix_millis(&self) -> u64 {
        self.millis
    }
}

// ============================================================================
// SECTION: Text Generation
// ============================================================================

/// Generation parameters for the blocking TDM path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifier requested from the provider.
    pub model: String,
    /// Sampling temperature (0.0 for deterministic runs).
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// Text produced by a generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedText {
    /// Raw model output text.
    pub text: String,
    /// Provider name that served the call.
    pub provider: String,
    /// Model identifier that served the call.
    pub model: String,
    /// Provider-reported usage metadata.
    pub usage: Value,
}

/// Text generation errors.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Provider reported an error.
    #[error("generation provider error: {0}")]
    Provider(String),
    /// Provider call exceeded its deadline.
    #[error("generation timed out: {0}")]
    Timeout(String),
}

/// Blocking text generation capability used by the TDM path.
pub trait TextGenerator {
    /// Generates text for a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] when the provider fails or times out.
    fn generate(&self, prompt: &str, config: &GenerationConfig)
    -> Result<GeneratedText, GenerationError>;
}

// ============================================================================
// SECTION: EPACK Sink
// ============================================================================

/// EPACK sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink I/O error.
    #[error("epack sink io error: {0}")]
    Io(String),
    /// Stored data is corrupted or fails integrity checks.
    #[error("epack sink corruption: {0}")]
    Corrupt(String),
}

/// Append-only persistence for sealed EPACK records.
///
/// # Invariants
/// - Sinks are append-only; records are never rewritten in place.
/// - Writers append atomically per record.
pub trait EpackSink {
    /// Appends a sealed record for a session.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the append fails.
    fn append(&self, session_id: &str, record: &EpackRecord) -> Result<(), SinkError>;

    /// Returns all records for a session in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when reading fails.
    fn records(&self, session_id: &str) -> Result<Vec<EpackRecord>, SinkError>;

    /// Returns the highest persisted sequence number for a session.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when reading fails.
    fn last_seq(&self, session_id: &str) -> Result<u64, SinkError>;
}

// ============================================================================
// SECTION: Ledger Sink
// ============================================================================

/// Stage-event ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Appending the event failed.
    #[error("ledger append failed: {0}")]
    Append(String),
}

/// Append-only sink for hash-chained stage events.
pub trait LedgerSink {
    /// Appends a stage event.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the append fails.
    fn append(&self, event: &StageEvent) -> Result<(), LedgerError>;
}

// ============================================================================
// SECTION: Embedder
// ============================================================================

/// Deterministic text embedding capability for the stage-2 safety screen.
///
/// # Invariants
/// - Same text must always embed to the same vector (build-frozen exemplars
///   rely on this).
pub trait Embedder {
    /// Embeds a batch of texts into fixed-dimension vectors.
    fn embed(&self, texts: &[&str]) -> Vec<Vec<f32>>;
}

// ============================================================================
// SECTION: Tools
// ============================================================================

/// Outcome of one sandboxed tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Tool name.
    pub tool: String,
    /// Canonical hash binding the tool name and arguments.
    pub args_hash: String,
    /// Structured tool output (or `{"error": code}` on failure).
    pub output: Value,
}

/// Allow-listed tool capability invoked via `calc:` / `search:` prefixes.
pub trait Tool: Send + Sync {
    /// Stable tool name used for allow-listing.
    fn name(&self) -> &'static str;

    /// Invokes the tool with structured arguments.
    fn call(&self, args: &Value) -> Value;
}
