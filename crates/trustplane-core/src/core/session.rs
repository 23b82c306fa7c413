// crates/trustplane-core/src/core/session.rs
// ============================================================================
// Module: Trustplane Session State
// Description: Per-session governance state, gate machine, and chain cursor.
// Purpose: Hold everything routing and sealing may consult for a session.
// Dependencies: crate::core::{epack, profile, tsv}, rand, serde
// ============================================================================

//! ## Overview
//! One `SessionState` exists per governed session. It owns the monotonic
//! interaction count, the assurance profile, the pending-gate state machine,
//! the EPACK chain cursor, trust-skill beliefs, and the workflow queue. It is
//! created on first turn, destroyed on explicit reset, and never shared
//! across sessions. Anything routing consults must live here so it is visible
//! in the EPACK payload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::VecDeque;

use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::epack::EpackRecord;
use crate::core::epack::GENESIS_HASH;
use crate::core::profile::Profile;
use crate::core::tsv::TsvState;

// ============================================================================
// SECTION: Pending Gate
// ============================================================================

/// Pending-gate discriminant for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingGate {
    /// No gate pending.
    #[default]
    None,
    /// A REFLECT summary awaits user confirmation.
    ReflectConfirm,
    /// A SCAFFOLD plan awaits user approval.
    ScaffoldApprove,
}

impl PendingGate {
    /// Canonical wire name of the gate.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::ReflectConfirm => "REFLECT_CONFIRM",
            Self::ScaffoldApprove => "SCAFFOLD_APPROVE",
        }
    }
}

/// State carried by an active pending gate.
///
/// # Invariants
/// - `confirm_token` is the trailing hex suffix of `payload_hash`.
/// - `nonce` is scoped to the session secret and consumed exactly once.
/// - `consumed_nonces` only grows; replayed confirmations are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingGateState {
    /// Which gate is pending, if any.
    pub gate: PendingGate,
    /// Interaction count when the gate was (re)armed.
    pub created_at_interaction: u64,
    /// Turn budget before the gate expires.
    pub expires_after_turns: u64,
    /// Frozen payload the confirmation binds to.
    pub payload: Map<String, Value>,
    /// Canonical hash of the frozen payload.
    pub payload_hash: String,
    /// Human-facing confirm token (trailing hex of the payload hash).
    pub confirm_token: String,
    /// True when the token must be echoed verbatim (HIGH_ASSURANCE).
    pub require_token_binding: bool,
    /// One-shot nonce bound to this gate arming.
    pub nonce: String,
    /// Nonces already consumed by accepted confirmations.
    pub consumed_nonces: BTreeSet<String>,
    /// Hash of the rendered gate prompt (cache key for re-rendering).
    pub prompt_cache_hash: String,
}

impl PendingGateState {
    /// Whether a gate is currently pending.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.gate != PendingGate::None
    }

    /// Whether the pending gate has outlived its turn budget.
    #[must_use]
    pub const fn is_expired(&self, interaction_count: u64) -> bool {
        matches!(self.gate, PendingGate::ReflectConfirm | PendingGate::ScaffoldApprove)
            && interaction_count.saturating_sub(self.created_at_interaction)
                >= self.expires_after_turns
    }
}

// ============================================================================
// SECTION: State Traces
// ============================================================================

/// One audited state transition inside the turn engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTrace {
    /// State label before the event.
    pub state_before: String,
    /// State label after the event.
    pub state_after: String,
    /// Event name.
    pub event: String,
    /// Pending-gate label at trace time.
    pub gate: String,
    /// Interaction count at trace time.
    pub interaction: u64,
    /// Free-form event metadata.
    pub meta: Map<String, Value>,
}

// ============================================================================
// SECTION: Workflow Queue
// ============================================================================

/// Deterministic follow-up steps queued by gate confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStep {
    /// Arm the scaffold-approval gate next turn.
    Scaffold,
    /// Run the normal generation path next turn.
    Tdm,
}

// ============================================================================
// SECTION: Session State
// ============================================================================

/// Number of trace entries retained in EPACK payload tails.
pub const TRACE_TAIL_LEN: usize = 20;

/// Per-session governance state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Stable session identifier.
    pub session_id: String,
    /// Monotonic count of handled turns.
    pub interaction_count: u64,
    /// Current assurance profile.
    pub current_profile: Profile,
    /// Pending-gate state machine.
    pub pending_gate: PendingGateState,
    /// Audited state transitions (full log; payloads embed the tail).
    pub traces: Vec<StateTrace>,
    /// True once a REFLECT gate was confirmed for the active request.
    pub reflect_confirmed: bool,
    /// True once a SCAFFOLD gate was approved for the active request.
    pub scaffold_approved: bool,
    /// Queued deterministic follow-up steps.
    pub workflow_queue: VecDeque<WorkflowStep>,
    /// Trust-skill belief state.
    pub tsv: TsvState,
    /// Last sealed EPACK sequence number (0 before the first seal).
    pub epack_seq: u64,
    /// Hash the next EPACK record must chain from.
    pub epack_prev_hash: String,
    /// Sealed records retained in memory for replay packaging.
    pub epacks: Vec<EpackRecord>,
    /// Highest sequence number already persisted to the sink.
    pub last_persisted_seq: u64,
    /// Interaction count of the most recent validation failure.
    pub last_failure_interaction: u64,
    /// Hash of the previous turn's decision object, if any.
    pub prev_decision_hash: Option<String>,
    /// Per-session secret scoping gate nonces (never serialized).
    #[serde(skip)]
    session_secret: String,
}

impl SessionState {
    /// Creates a fresh session with a random per-session secret.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            interaction_count: 0,
            current_profile: Profile::default(),
            pending_gate: PendingGateState::default(),
            traces: Vec::new(),
            reflect_confirmed: false,
            scaffold_approved: false,
            workflow_queue: VecDeque::new(),
            tsv: TsvState::default(),
            epack_seq: 0,
            epack_prev_hash: GENESIS_HASH.to_string(),
            epacks: Vec::new(),
            last_persisted_seq: 0,
            last_failure_interaction: 0,
            prev_decision_hash: None,
            session_secret: new_session_secret(),
        }
    }

    /// Returns the per-session secret, generating one if the state was
    /// deserialized without it.
    pub fn session_secret(&mut self) -> &str {
        if self.session_secret.is_empty() {
            self.session_secret = new_session_secret();
        }
        &self.session_secret
    }

    /// Tail of the trace log embedded in EPACK payloads.
    #[must_use]
    pub fn trace_tail(&self) -> &[StateTrace] {
        let start = self.traces.len().saturating_sub(TRACE_TAIL_LEN);
        &self.traces[start..]
    }
}

// ============================================================================
// SECTION: Session Secret
// ============================================================================

/// Generates a fresh 128-bit session secret as lowercase hex.
#[must_use]
fn new_session_secret() -> String {
    let mut bytes = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut out = String::with_capacity(32);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
