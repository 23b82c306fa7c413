// crates/trustplane-core/src/runtime/gates.rs
// ============================================================================
// Module: Trustplane Gate Lifecycle
// Description: REFLECT/SCAFFOLD confirmation gates with nonce binding.
// Purpose: Arm, revise, confirm, and expire pending gates deterministically.
// Dependencies: crate::{core, runtime::safety}, regex, serde_json
// ============================================================================

//! ## Overview
//! When routing yields REFLECT or SCAFFOLD, the engine arms a pending gate
//! whose payload freezes enough to reproduce the request. Confirmations bind
//! to a token derived from the payload hash and a one-shot nonce scoped to
//! the session secret; revisions refresh all three in place. Replayed
//! confirmations are rejected once their nonce is consumed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_suffix;
use crate::core::hashing::stable_hash;
use crate::core::session::PendingGate;
use crate::core::session::SessionState;
use crate::core::session::StateTrace;
use crate::runtime::safety::fixed_regex;

// ============================================================================
// SECTION: Confirmation Grammar
// ============================================================================

/// Affirmative reflect confirmations.
static CONFIRM_YES: LazyLock<Regex> = LazyLock::new(|| {
    fixed_regex(r"(?i)\b(yes|yep|yeah|correct|confirmed|confirm|sounds good|that works)\b")
});

/// Negative reflect confirmations.
static CONFIRM_NO: LazyLock<Regex> =
    LazyLock::new(|| fixed_regex(r"(?i)\b(no|nope|incorrect|not that|revise|change)\b"));

/// Affirmative scaffold approvals.
static APPROVE_YES: LazyLock<Regex> = LazyLock::new(|| {
    fixed_regex(r"(?i)\b(approve|approved|go ahead|proceed|greenlight|ok to proceed)\b")
});

/// Negative scaffold approvals.
static APPROVE_NO: LazyLock<Regex> = LazyLock::new(|| {
    fixed_regex(r"(?i)\b(reject|not approved|don't proceed|revise plan|change plan)\b")
});

/// Bound reflect confirmation carrying a token.
static CONFIRM_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| fixed_regex(r"(?i)\bconfirm\s+([0-9a-f]{4,10})\b"));

/// Bound scaffold approval carrying a token.
static APPROVE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| fixed_regex(r"(?i)\bapprove\s+([0-9a-f]{4,10})\b"));

/// Step or phase reference inside a revision.
static STEP_REF: LazyLock<Regex> = LazyLock::new(|| fixed_regex(r"(?i)\b(step|phase)\s*(\d+)\b"));

/// Trigger phrases that mark a gate reply as a revision.
const REVISION_TRIGGERS: [&str; 15] = [
    r"\bbut\b",
    r"\bexcept\b",
    r"\bhowever\b",
    r"\bchange\b",
    r"\brevise\b",
    r"\bmodify\b",
    r"\badjust\b",
    r"\binstead\b",
    r"\bswap\b",
    r"\breplace\b",
    r"\badd\b",
    r"\bremove\b",
    r"\bomit\b",
    r"\bstep\s*\d+\b",
    r"\bphase\s*\d+\b",
];

/// Compiled revision trigger patterns.
static REVISION_SET: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    REVISION_TRIGGERS.iter().map(|pattern| fixed_regex(&format!("(?i){pattern}"))).collect()
});

// ============================================================================
// SECTION: Binding Decision
// ============================================================================

/// Classification of a user reply to an active gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingStatus {
    /// Accepted with the correct token.
    BoundOk,
    /// Accepted without a token (binding not required).
    UnboundOk,
    /// Explicitly rejected.
    Rejected,
    /// A token was provided but does not match.
    TokenMismatch,
    /// Binding is required but no token was provided.
    MissingToken,
    /// Could not be classified.
    Unknown,
}

impl BindingStatus {
    /// Canonical wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BoundOk => "bound_ok",
            Self::UnboundOk => "unbound_ok",
            Self::Rejected => "rejected",
            Self::TokenMismatch => "token_mismatch",
            Self::MissingToken => "missing_token",
            Self::Unknown => "unknown",
        }
    }
}

/// Which token grammar a gate uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateKind {
    /// REFLECT_CONFIRM uses the `confirm` grammar.
    Confirm,
    /// SCAFFOLD_APPROVE uses the `approve` grammar.
    Approve,
}

/// Extracts a bound token from a gate reply, if present.
fn extract_token(text: &str, kind: GateKind) -> Option<String> {
    let pattern = match kind {
        GateKind::Confirm => &CONFIRM_TOKEN,
        GateKind::Approve => &APPROVE_TOKEN,
    };
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str().to_lowercase())
}

/// Classifies a gate reply against the expected token and binding rule.
fn binding_decision(
    user_text: &str,
    expected_token: &str,
    require_binding: bool,
    kind: GateKind,
) -> (bool, BindingStatus, String) {
    let text = user_text.trim();
    let (accept, reject) = match kind {
        GateKind::Confirm => (&CONFIRM_YES, &CONFIRM_NO),
        GateKind::Approve => (&APPROVE_YES, &APPROVE_NO),
    };

    if reject.is_match(text) {
        return (false, BindingStatus::Rejected, String::new());
    }

    if let Some(provided) = extract_token(text, kind) {
        if provided == expected_token {
            return (true, BindingStatus::BoundOk, provided);
        }
        return (false, BindingStatus::TokenMismatch, provided);
    }

    if require_binding {
        if accept.is_match(text) {
            return (false, BindingStatus::MissingToken, String::new());
        }
        return (false, BindingStatus::Unknown, String::new());
    }

    if accept.is_match(text) {
        return (true, BindingStatus::UnboundOk, String::new());
    }
    (false, BindingStatus::Unknown, String::new())
}

// ============================================================================
// SECTION: Nonces and Scoping
// ============================================================================

/// Derives a scoped value from the session secret for one purpose.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn derive_scoped(
    algorithm: HashAlgorithm,
    session_id: &str,
    session_secret: &str,
    purpose: &str,
) -> Result<String, HashError> {
    let hash = stable_hash(
        algorithm,
        &json!({
            "session_id": session_id,
            "session_secret": session_secret,
            "purpose": purpose,
        }),
    )?;
    Ok(hash[..16].to_string())
}

/// Derives the one-shot nonce binding a gate arming.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn make_gate_nonce(
    algorithm: HashAlgorithm,
    session_id: &str,
    interaction: u64,
    gate: PendingGate,
    payload_hash: &str,
    session_scope: &str,
) -> Result<String, HashError> {
    let hash = stable_hash(
        algorithm,
        &json!({
            "session_id": session_id,
            "interaction": interaction,
            "gate": gate.as_str(),
            "payload_hash": payload_hash,
            "session_scope": session_scope,
        }),
    )?;
    Ok(hash[..10].to_string())
}

/// Session scope for gate nonces (stable per session secret).
fn session_scope(
    algorithm: HashAlgorithm,
    session: &mut SessionState,
) -> Result<String, HashError> {
    let session_id = session.session_id.clone();
    let secret = session.session_secret().to_string();
    derive_scoped(algorithm, &session_id, &secret, "gate_scope")
}

// ============================================================================
// SECTION: Traces
// ============================================================================

/// Appends an audited state transition to the session trace log.
pub fn trace(
    session: &mut SessionState,
    before: &str,
    after: &str,
    event: &str,
    meta: Map<String, Value>,
) {
    let gate = session.pending_gate.gate.as_str().to_string();
    let interaction = session.interaction_count;
    session.traces.push(StateTrace {
        state_before: before.to_string(),
        state_after: after.to_string(),
        event: event.to_string(),
        gate,
        interaction,
        meta,
    });
}

/// Builds a trace metadata map from key/value pairs.
#[must_use]
pub fn trace_meta(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut meta = Map::with_capacity(pairs.len());
    for (key, value) in pairs {
        meta.insert((*key).to_string(), value.clone());
    }
    meta
}

// ============================================================================
// SECTION: Revisions
// ============================================================================

/// A parsed in-place revision to a pending gate payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Referenced step or phase number, if any.
    pub step: Option<u64>,
    /// Revision text with confirmation prefixes stripped.
    pub text: String,
}

/// Whether a gate reply expresses revision intent.
#[must_use]
pub fn has_revision_intent(text: &str) -> bool {
    REVISION_SET.iter().any(|pattern| pattern.is_match(text))
}

/// Parses a revision out of a gate reply.
#[must_use]
pub fn parse_revision(user_text: &str) -> Revision {
    let step = STEP_REF
        .captures(user_text)
        .and_then(|captures| captures.get(2))
        .and_then(|digits| digits.as_str().parse::<u64>().ok());

    static STRIP_TOKEN: LazyLock<Regex> =
        LazyLock::new(|| fixed_regex(r"(?i)^\s*(confirm|approve)\s+[0-9a-f]{4,10}\s*"));
    static STRIP_ACK: LazyLock<Regex> =
        LazyLock::new(|| fixed_regex(r"(?i)^\s*(yes|yep|yeah|approved|go ahead|proceed)\b[:,]?\s*"));

    let cleaned = STRIP_TOKEN.replace(user_text, "");
    let cleaned = STRIP_ACK.replace(&cleaned, "");
    Revision {
        step,
        text: cleaned.trim().to_string(),
    }
}

/// Appends a revision record to a gate payload (history keeps hashes only).
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn append_revision(
    algorithm: HashAlgorithm,
    payload: &Map<String, Value>,
    revision: &Revision,
) -> Result<Map<String, Value>, HashError> {
    let mut updated = payload.clone();
    let mut history = updated
        .get("revision_history")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let text_hash16 = stable_hash(algorithm, &revision.text)?[..16].to_string();
    history.push(json!({ "step": revision.step, "text_hash16": text_hash16 }));
    updated.insert("revision_history".to_string(), Value::Array(history));
    Ok(updated)
}

/// Renders the applied-revision block for gate prompts (latest first).
#[must_use]
pub fn render_revision_block(payload: &Map<String, Value>) -> String {
    let history = payload.get("revision_history").and_then(Value::as_array);
    let Some(history) = history else {
        return String::new();
    };
    if history.is_empty() {
        return String::new();
    }
    let mut lines = vec!["Revisions applied (latest first):".to_string()];
    for item in history.iter().rev().take(10) {
        let hash = item.get("text_hash16").and_then(Value::as_str).unwrap_or("");
        match item.get("step").and_then(Value::as_u64) {
            Some(step) => lines.push(format!("- Step {step}: (revision hash {hash})")),
            None => lines.push(format!("- (revision hash {hash})")),
        }
    }
    lines.join("\n")
}

// ============================================================================
// SECTION: Gate Arming
// ============================================================================

/// Arms a pending gate over a frozen payload.
///
/// Derives the payload hash, confirm token, nonce, and binding requirement
/// from the current profile and session secret.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn set_pending_gate(
    algorithm: HashAlgorithm,
    session: &mut SessionState,
    gate: PendingGate,
    payload: Map<String, Value>,
) -> Result<(), HashError> {
    let profile = session.current_profile;
    let payload_hash = stable_hash(algorithm, &payload)?;
    let token = hash_suffix(&payload_hash, profile.confirm_token_len());
    let scope = session_scope(algorithm, session)?;
    let nonce = make_gate_nonce(
        algorithm,
        &session.session_id,
        session.interaction_count,
        gate,
        &payload_hash,
        &scope,
    )?;

    let pending = &mut session.pending_gate;
    pending.gate = gate;
    pending.created_at_interaction = session.interaction_count;
    pending.expires_after_turns = profile.gate_expiry_turns();
    pending.payload = payload;
    pending.payload_hash = payload_hash.clone();
    pending.confirm_token = token.clone();
    pending.nonce = nonce;
    pending.require_token_binding = profile.require_token_binding();
    pending.prompt_cache_hash = stable_hash(
        algorithm,
        &json!({ "gate": gate.as_str(), "payload_hash": payload_hash, "token": token }),
    )?;
    Ok(())
}

/// Refreshes the payload hash, token, and nonce after an in-place revision.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn refresh_pending_gate(
    algorithm: HashAlgorithm,
    session: &mut SessionState,
) -> Result<(), HashError> {
    let gate = session.pending_gate.gate;
    let profile = session.current_profile;
    let payload_hash = stable_hash(algorithm, &session.pending_gate.payload)?;
    let token = hash_suffix(&payload_hash, profile.confirm_token_len());
    let scope = session_scope(algorithm, session)?;
    let nonce = make_gate_nonce(
        algorithm,
        &session.session_id,
        session.interaction_count,
        gate,
        &payload_hash,
        &scope,
    )?;

    let pending = &mut session.pending_gate;
    pending.payload_hash = payload_hash.clone();
    pending.confirm_token = token.clone();
    pending.nonce = nonce;
    pending.created_at_interaction = session.interaction_count;
    pending.prompt_cache_hash = stable_hash(
        algorithm,
        &json!({ "gate": gate.as_str(), "payload_hash": payload_hash, "token": token }),
    )?;
    Ok(())
}

/// Clears the pending gate; `reset` also drops confirmation flags.
pub fn clear_pending(session: &mut SessionState, reason: &str) {
    let pending = &mut session.pending_gate;
    pending.gate = PendingGate::None;
    pending.payload = Map::new();
    pending.payload_hash = String::new();
    pending.confirm_token = String::new();
    pending.nonce = String::new();
    pending.require_token_binding = false;
    pending.prompt_cache_hash = String::new();
    if reason == "reset" {
        session.reflect_confirmed = false;
        session.scaffold_approved = false;
    }
}

// ============================================================================
// SECTION: Prompt Rendering
// ============================================================================

/// Renders the REFLECT confirmation prompt for the active gate.
#[must_use]
pub fn render_reflect_prompt(session: &SessionState, summary: &str) -> String {
    let token = &session.pending_gate.confirm_token;
    let revisions = render_revision_block(&session.pending_gate.payload);
    let revision_text =
        if revisions.is_empty() { "\n".to_string() } else { format!("\n\n{revisions}\n") };

    if session.pending_gate.require_token_binding {
        format!(
            "REFLECT (CONFIRMATION REQUIRED)\n{summary}{revision_text}\nReply exactly: CONFIRM \
             {token}\nOr: REVISE <what to change>\n"
        )
    } else {
        format!(
            "REFLECT\n{summary}{revision_text}\nOptional binding: CONFIRM {token}\nOr reply \
             'yes' to confirm, 'no' to revise.\n"
        )
    }
}

/// Renders the SCAFFOLD approval prompt for the active gate.
#[must_use]
pub fn render_scaffold_prompt(session: &SessionState, plan: &str) -> String {
    let token = &session.pending_gate.confirm_token;
    let revisions = render_revision_block(&session.pending_gate.payload);
    let revision_text =
        if revisions.is_empty() { "\n".to_string() } else { format!("\n\n{revisions}\n") };

    if session.pending_gate.require_token_binding {
        format!(
            "SCAFFOLD (APPROVAL REQUIRED)\n{plan}{revision_text}\nReply exactly: APPROVE \
             {token}\nOr: REVISE <what to change>\n"
        )
    } else {
        format!(
            "SCAFFOLD\n{plan}{revision_text}\nOptional binding: APPROVE {token}\nOr reply \
             'approved' to proceed, 'no' to revise.\n"
        )
    }
}

// ============================================================================
// SECTION: Gate Handling
// ============================================================================

/// Which gate a confirmation cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearedGate {
    /// REFLECT_CONFIRM was accepted.
    Reflect,
    /// SCAFFOLD_APPROVE was accepted.
    Scaffold,
}

/// Outcome of inspecting the pending gate before routing.
#[derive(Debug, Clone, PartialEq)]
pub enum GateStep {
    /// No gate is active; routing proceeds normally.
    Inactive,
    /// The turn was consumed by the gate; reply with this text.
    Reply {
        /// Assistant reply for the consumed turn.
        text: String,
        /// Gate metadata sealed into the EPACK extras.
        meta: Value,
    },
    /// The gate was cleared; routing proceeds with the flag set.
    Cleared {
        /// Which gate cleared.
        gate: ClearedGate,
        /// Binding classification of the accepting reply.
        binding_status: BindingStatus,
        /// Frozen payload the confirmation bound to.
        payload: Map<String, Value>,
    },
}

/// Inspects and advances the pending gate for a turn.
///
/// Handles expiry, in-place revisions, replayed confirmations, and the full
/// binding-decision grammar. Runs before routing on every turn.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
#[allow(
    clippy::too_many_lines,
    reason = "Single linear flow keeps the gate state machine auditable."
)]
pub fn handle_pending_gate(
    algorithm: HashAlgorithm,
    session: &mut SessionState,
    user_text: &str,
) -> Result<GateStep, HashError> {
    if !session.pending_gate.is_active() {
        return Ok(GateStep::Inactive);
    }

    if session.pending_gate.is_expired(session.interaction_count) {
        let before = session.pending_gate.gate.as_str().to_string();
        let budget = session.pending_gate.expires_after_turns;
        clear_pending(session, "reset");
        trace(
            session,
            &before,
            PendingGate::None.as_str(),
            "pending_timeout",
            trace_meta(&[("expires_after_turns", json!(budget))]),
        );
        return Ok(GateStep::Reply {
            text: "Timeout on pending gate. Let's start over—what is your goal and constraints?"
                .to_string(),
            meta: json!({ "timeout": true }),
        });
    }

    if has_revision_intent(user_text) {
        let revision = parse_revision(user_text);
        let old_token = session.pending_gate.confirm_token.clone();
        let old_hash = session.pending_gate.payload_hash.clone();
        let old_nonce = session.pending_gate.nonce.clone();

        session.pending_gate.payload =
            append_revision(algorithm, &session.pending_gate.payload, &revision)?;
        refresh_pending_gate(algorithm, session)?;

        let gate = session.pending_gate.gate;
        let revision_text_hash16 = stable_hash(algorithm, &revision.text)?[..16].to_string();
        let meta = trace_meta(&[
            ("old_token", json!(old_token)),
            ("new_token", json!(session.pending_gate.confirm_token)),
            ("old_payload_hash", json!(old_hash)),
            ("new_payload_hash", json!(session.pending_gate.payload_hash)),
            ("old_nonce", json!(old_nonce)),
            ("new_nonce", json!(session.pending_gate.nonce)),
            ("revision_step", json!(revision.step)),
            ("revision_text_hash16", json!(revision_text_hash16)),
        ]);
        trace(session, gate.as_str(), gate.as_str(), "revise_in_place_applied", meta);

        let text = if gate == PendingGate::ReflectConfirm {
            render_reflect_prompt(
                session,
                "Updated pending request with your revision. Confirm updated intent.",
            )
        } else {
            render_scaffold_prompt(
                session,
                "Updated pending plan with your revision. Approve updated plan.",
            )
        };
        return Ok(GateStep::Reply {
            text,
            meta: json!({ "revision": true }),
        });
    }

    let gate = session.pending_gate.gate;
    let kind =
        if gate == PendingGate::ReflectConfirm { GateKind::Confirm } else { GateKind::Approve };
    let (accepted, status, provided) = binding_decision(
        user_text,
        &session.pending_gate.confirm_token,
        session.pending_gate.require_token_binding,
        kind,
    );

    if accepted {
        let nonce = session.pending_gate.nonce.clone();
        if !nonce.is_empty() && session.pending_gate.consumed_nonces.contains(&nonce) {
            trace(
                session,
                gate.as_str(),
                gate.as_str(),
                "replay_detected",
                trace_meta(&[("nonce", json!(nonce)), ("attempted_token", json!(provided))]),
            );
            return Ok(GateStep::Reply {
                text: "That confirmation was already processed (replay detected). If you have a \
                       new request, restate it."
                    .to_string(),
                meta: json!({ "replay": true }),
            });
        }
        if !nonce.is_empty() {
            session.pending_gate.consumed_nonces.insert(nonce);
        }

        let payload = session.pending_gate.payload.clone();
        let before = gate.as_str().to_string();
        clear_pending(session, "confirmed");
        trace(
            session,
            &before,
            PendingGate::None.as_str(),
            &format!("{}_accepted", before.to_lowercase()),
            trace_meta(&[
                ("binding_status", json!(status.as_str())),
                ("provided_token", json!(provided)),
            ]),
        );

        if gate == PendingGate::ReflectConfirm {
            session.reflect_confirmed = true;
            return Ok(GateStep::Cleared {
                gate: ClearedGate::Reflect,
                binding_status: status,
                payload,
            });
        }
        session.scaffold_approved = true;
        return Ok(GateStep::Cleared {
            gate: ClearedGate::Scaffold,
            binding_status: status,
            payload,
        });
    }

    match status {
        BindingStatus::Rejected => {
            let before = gate.as_str().to_string();
            clear_pending(session, "reset");
            trace(
                session,
                &before,
                PendingGate::None.as_str(),
                "gate_rejected",
                trace_meta(&[("kind", json!(match kind {
                    GateKind::Confirm => "confirm",
                    GateKind::Approve => "approve",
                }))]),
            );
            Ok(GateStep::Reply {
                text: "Okay—tell me what you want instead (goal + constraints + output format)."
                    .to_string(),
                meta: json!({ "rejected": true }),
            })
        }
        BindingStatus::TokenMismatch => {
            let expected = session.pending_gate.confirm_token.clone();
            trace(
                session,
                gate.as_str(),
                gate.as_str(),
                "token_mismatch",
                trace_meta(&[("provided", json!(provided)), ("expected", json!(expected))]),
            );
            let verb = if gate == PendingGate::ReflectConfirm { "CONFIRM" } else { "APPROVE" };
            let token = &session.pending_gate.confirm_token;
            Ok(GateStep::Reply {
                text: format!("Token mismatch. Please reply: {verb} {token}"),
                meta: json!({ "mismatch": true }),
            })
        }
        BindingStatus::MissingToken => {
            let expected = session.pending_gate.confirm_token.clone();
            trace(
                session,
                gate.as_str(),
                gate.as_str(),
                "missing_token",
                trace_meta(&[("expected", json!(expected))]),
            );
            let token = &session.pending_gate.confirm_token;
            let text = if gate == PendingGate::ReflectConfirm {
                format!("I need explicit confirmation. Reply: CONFIRM {token}")
            } else {
                format!("I need explicit approval. Reply: APPROVE {token}")
            };
            Ok(GateStep::Reply {
                text,
                meta: json!({ "missing_token": true }),
            })
        }
        _ => {
            trace(
                session,
                gate.as_str(),
                gate.as_str(),
                "unclear_gate_response",
                trace_meta(&[("kind", json!(match kind {
                    GateKind::Confirm => "confirm",
                    GateKind::Approve => "approve",
                }))]),
            );
            let text = if gate == PendingGate::ReflectConfirm {
                render_reflect_prompt(session, "Please confirm if this matches your intent.")
            } else {
                render_scaffold_prompt(session, "Please approve if this plan is correct.")
            };
            Ok(GateStep::Reply {
                text,
                meta: json!({ "unknown": true }),
            })
        }
    }
}
