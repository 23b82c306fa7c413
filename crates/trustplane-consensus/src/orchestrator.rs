// crates/trustplane-consensus/src/orchestrator.rs
// ============================================================================
// Module: Trustplane Consensus Orchestrator
// Description: Single-stage and two-stage (debate) consensus flows.
// Purpose: Drive anchored, repaired, scope-gated consensus runs.
// Dependencies: crate::*, tokio, trustplane-core
// ============================================================================

//! ## Overview
//! The single-stage flow renders the anchored primary prompt, repairs
//! invalid JSON up to the configured budget, enforces the anchor echo, and
//! runs the scope gate (with one rewrite round). The two-stage flow fans out
//! Defender and Critic in parallel with independent per-task timeouts, then
//! synthesizes with the Arbiter. Every boundary emits a hash-chained ledger
//! event in fixed order; parse failures return structured results with both
//! raw outputs preserved, never silent fallbacks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use trustplane_core::HashAlgorithm;
use trustplane_core::LedgerError;
use trustplane_core::MemoryLedger;
use trustplane_core::interfaces::Clock;

use crate::adapter::Adapter;
use crate::adapter::AdapterError;
use crate::adapter::AdapterRegistry;
use crate::config::ConsensusConfig;
use crate::config::PromptAnchors;
use crate::config::PromptBundle;
use crate::schemas::PrimaryOutput;
use crate::schemas::SynthesizerOutput;
use crate::schemas::parse_primary_output;
use crate::schemas::parse_synthesizer_output;
use crate::scope_gate::GateDecision;
use crate::scope_gate::ScopeGateConfig;
use crate::scope_gate::ScopeGateResult;
use crate::scope_gate::evaluate_scope_gate;
use crate::verification::VerificationContext;

// ============================================================================
// SECTION: Run Identity and Results
// ============================================================================

/// Anchor identifiers a model must echo verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAnchors {
    /// Run identifier.
    pub run_id: String,
    /// EPACK identifier.
    pub epack: String,
    /// ARU label.
    pub aru: String,
}

/// Terminal consensus status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusStatus {
    /// Output passed the scope gate.
    Pass,
    /// Output required a rewrite that succeeded.
    Rewrite,
    /// Run refused (gate, anchors, or parse failure).
    Refuse,
}

/// Stable failure class labels for refused runs.
pub mod failure_class {
    /// Model output never parsed into the schema.
    pub const PARSE_FAILED: &str = "PARSE_FAILED";
    /// Model echoed the wrong run/epack anchors.
    pub const ANCHOR_MISMATCH: &str = "ANCHOR_MISMATCH";
    /// Scope gate refused the output.
    pub const SCOPE_REFUSE: &str = "SCOPE_REFUSE";
}

/// Result of a single-stage consensus run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRun {
    /// Terminal status.
    pub status: ConsensusStatus,
    /// Parsed primary output when available.
    pub output: Option<PrimaryOutput>,
    /// Scope-gate result when the gate ran.
    pub gate: Option<ScopeGateResult>,
    /// Failure class when refused.
    pub failure: Option<String>,
    /// Last raw model text (preserved across failures).
    pub raw_text: String,
}

/// Result of a two-stage debate run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRun {
    /// Terminal status.
    pub status: ConsensusStatus,
    /// Synthesized output when the arbiter parsed.
    pub synthesized: Option<SynthesizerOutput>,
    /// Parsed defender output when available.
    pub defender: Option<PrimaryOutput>,
    /// Parsed critic output when available.
    pub critic: Option<PrimaryOutput>,
    /// Raw defender text (always preserved).
    pub defender_raw: String,
    /// Raw critic text (always preserved).
    pub critic_raw: String,
    /// Scope-gate result when the gate ran.
    pub gate: Option<ScopeGateResult>,
    /// Failure class when refused.
    pub failure: Option<String>,
    /// Wall-clock duration of the full flow.
    pub latency_ms: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Orchestrator errors.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Adapter call failed terminally.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// Ledger append failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Debate flow was requested without a debate configuration.
    #[error("debate flow requires a debate configuration")]
    DebateNotConfigured,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Consensus orchestrator over a shared adapter registry and ledger.
#[derive(Debug)]
pub struct Orchestrator<'a, C> {
    /// Shared adapter registry.
    registry: &'a AdapterRegistry,
    /// Hash-chained stage-event ledger.
    ledger: &'a MemoryLedger,
    /// Time source for event timestamps.
    clock: &'a C,
    /// Hash algorithm for ledger events.
    algorithm: HashAlgorithm,
}

impl<'a, C: Clock> Orchestrator<'a, C> {
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(
        registry: &'a AdapterRegistry,
        ledger: &'a MemoryLedger,
        clock: &'a C,
        algorithm: HashAlgorithm,
    ) -> Self {
        Self {
            registry,
            ledger,
            clock,
            algorithm,
        }
    }

    /// Emits a stage event into the shared ledger.
    fn emit(&self, anchors: &RunAnchors, stage: &str, payload: Value) -> Result<(), LedgerError> {
        self.ledger
            .emit(
                self.algorithm,
                &anchors.run_id,
                &anchors.epack,
                stage,
                self.clock.unix_millis(),
                payload,
            )
            .map(|_| ())
    }

    /// Emits the scope-gate stage event for a result.
    fn emit_gate(
        &self,
        anchors: &RunAnchors,
        verification: &VerificationContext,
        gate: &ScopeGateResult,
        config: &ScopeGateConfig,
    ) -> Result<(), LedgerError> {
        if gate.decision == GateDecision::Pass {
            self.emit(
                anchors,
                "scope_gate.pass",
                json!({ "domain": config.domain, "role_level": verification.role_level }),
            )
        } else {
            self.emit(
                anchors,
                "scope_gate.violation",
                json!({
                    "domain": config.domain,
                    "role_level": verification.role_level,
                    "verification": {
                        "verified": verification.verified,
                        "role": verification.role.as_str(),
                    },
                    "violations": gate.violations,
                    "disclaimer_issue": gate.disclaimer_issue,
                }),
            )
        }
    }

    // ------------------------------------------------------------------
    // Single-stage flow
    // ------------------------------------------------------------------

    /// Runs the single-stage consensus flow.
    ///
    /// # Errors
    ///
    /// Returns [`ConsensusError`] on terminal adapter failures (auth,
    /// timeout) or ledger failures; schema and anchor failures are returned
    /// as structured refusals instead.
    pub async fn run_single_stage(
        &self,
        config: &ConsensusConfig,
        verification: &VerificationContext,
        gate_config: &ScopeGateConfig,
        anchors: &RunAnchors,
        user_query: &str,
    ) -> Result<ConsensusRun, ConsensusError> {
        self.emit(anchors, "start", json!({ "profile": config.profile_name }))?;

        let adapter = self.registry.build(&config.primary)?;
        let timeout_s = config.primary.timeout_s.unwrap_or(config.primary_timeout_s);
        let prompt = config.prompts.render_primary(
            &PromptAnchors {
                run_id: &anchors.run_id,
                epack: &anchors.epack,
                aru: &anchors.aru,
            },
            verification,
            user_query,
        );

        let (parsed, raw_text) = call_with_repair(
            Arc::clone(&adapter),
            &config.prompts,
            anchors,
            prompt,
            config.primary_temperature,
            timeout_s,
            config.max_repair_attempts,
        )
        .await?;
        self.emit(anchors, "primary.raw", json!({ "raw": raw_text }))?;

        let Some(output) = parsed else {
            let run = ConsensusRun {
                status: ConsensusStatus::Refuse,
                output: None,
                gate: None,
                failure: Some(failure_class::PARSE_FAILED.to_string()),
                raw_text,
            };
            self.emit(anchors, "end", json!({ "status": "REFUSE", "failure": "PARSE_FAILED" }))?;
            return Ok(run);
        };

        if output.run_id != anchors.run_id || output.epack != anchors.epack {
            let run = ConsensusRun {
                status: ConsensusStatus::Refuse,
                output: Some(output),
                gate: None,
                failure: Some(failure_class::ANCHOR_MISMATCH.to_string()),
                raw_text,
            };
            self.emit(anchors, "end", json!({ "status": "REFUSE", "failure": "ANCHOR_MISMATCH" }))?;
            return Ok(run);
        }

        let gate =
            evaluate_scope_gate(&output.answer, &output.reasoning_trace, verification, gate_config);
        self.emit_gate(anchors, verification, &gate, gate_config)?;

        match gate.decision {
            GateDecision::Pass => {
                self.emit(anchors, "end", json!({ "status": "PASS" }))?;
                Ok(ConsensusRun {
                    status: ConsensusStatus::Pass,
                    output: Some(output),
                    gate: Some(gate),
                    failure: None,
                    raw_text,
                })
            }
            GateDecision::Rewrite => {
                self.rewrite_round(config, verification, gate_config, anchors, &gate, raw_text)
                    .await
            }
            GateDecision::Refuse => {
                self.emit(anchors, "end", json!({ "status": "REFUSE", "failure": "SCOPE_REFUSE" }))?;
                Ok(ConsensusRun {
                    status: ConsensusStatus::Refuse,
                    output: Some(output),
                    gate: Some(gate),
                    failure: Some(failure_class::SCOPE_REFUSE.to_string()),
                    raw_text,
                })
            }
        }
    }

    /// Runs the single rewrite round after a REWRITE gate decision.
    async fn rewrite_round(
        &self,
        config: &ConsensusConfig,
        verification: &VerificationContext,
        gate_config: &ScopeGateConfig,
        anchors: &RunAnchors,
        gate: &ScopeGateResult,
        previous_raw: String,
    ) -> Result<ConsensusRun, ConsensusError> {
        let Some(rewrite_prompt) = gate.suggested_rewrite_prompt.clone() else {
            self.emit(anchors, "end", json!({ "status": "REFUSE", "failure": "SCOPE_REFUSE" }))?;
            return Ok(ConsensusRun {
                status: ConsensusStatus::Refuse,
                output: None,
                gate: Some(gate.clone()),
                failure: Some(failure_class::SCOPE_REFUSE.to_string()),
                raw_text: previous_raw,
            });
        };

        let adapter = self.registry.build(&config.primary)?;
        let timeout_s = config.primary.timeout_s.unwrap_or(config.primary_timeout_s);
        let framed = format!(
            "{rewrite_prompt}\nReturn ONLY valid JSON for PrimaryOutput.\nRUN_ID={} EPACK={} \
             ARU={}.",
            anchors.run_id, anchors.epack, anchors.aru
        );
        let (parsed, raw_text) = call_with_repair(
            adapter,
            &config.prompts,
            anchors,
            framed,
            config.primary_temperature,
            timeout_s,
            config.max_repair_attempts,
        )
        .await?;

        let Some(output) = parsed else {
            self.emit(anchors, "end", json!({ "status": "REFUSE", "failure": "PARSE_FAILED" }))?;
            return Ok(ConsensusRun {
                status: ConsensusStatus::Refuse,
                output: None,
                gate: Some(gate.clone()),
                failure: Some(failure_class::PARSE_FAILED.to_string()),
                raw_text,
            });
        };

        let regated =
            evaluate_scope_gate(&output.answer, &output.reasoning_trace, verification, gate_config);
        self.emit_gate(anchors, verification, &regated, gate_config)?;

        if regated.decision == GateDecision::Pass {
            self.emit(anchors, "end", json!({ "status": "REWRITE" }))?;
            return Ok(ConsensusRun {
                status: ConsensusStatus::Rewrite,
                output: Some(output),
                gate: Some(regated),
                failure: None,
                raw_text,
            });
        }

        self.emit(anchors, "end", json!({ "status": "REFUSE", "failure": "SCOPE_REFUSE" }))?;
        Ok(ConsensusRun {
            status: ConsensusStatus::Refuse,
            output: Some(output),
            gate: Some(regated),
            failure: Some(failure_class::SCOPE_REFUSE.to_string()),
            raw_text,
        })
    }

    // ------------------------------------------------------------------
    // Two-stage (debate) flow
    // ------------------------------------------------------------------

    /// Runs the two-stage debate flow: parallel Defender and Critic with
    /// independent timeouts, then Arbiter synthesis and the scope gate.
    ///
    /// Both fan-out tasks are always awaited before returning, so no task
    /// outlives the flow.
    ///
    /// # Errors
    ///
    /// Returns [`ConsensusError`] on terminal adapter or ledger failures, or
    /// when the config lacks a debate triple.
    #[allow(
        clippy::too_many_lines,
        reason = "Single linear flow keeps the ledger event order auditable."
    )]
    pub async fn run_two_stage(
        &self,
        config: &ConsensusConfig,
        verification: &VerificationContext,
        gate_config: &ScopeGateConfig,
        anchors: &RunAnchors,
        user_query: &str,
    ) -> Result<DebateRun, ConsensusError> {
        let debate = config.debate.as_ref().ok_or(ConsensusError::DebateNotConfigured)?;
        let started_ms = self.clock.unix_millis();
        self.emit(anchors, "start", json!({ "profile": config.profile_name, "debate": true }))?;

        let defender_adapter = self.registry.build(&debate.defender_model)?;
        let critic_adapter = self.registry.build(&debate.critic_model)?;
        let synthesizer_adapter = self.registry.build(&debate.synthesizer_model)?;

        let defender_prompt = config.prompts.render_primary(
            &PromptAnchors {
                run_id: &anchors.run_id,
                epack: &anchors.epack,
                aru: &anchors.aru,
            },
            verification,
            user_query,
        );
        let critic_prompt = format!(
            "You are the critic in a governed debate. Identify weaknesses, missing evidence, and \
             stronger alternatives for the query below. Return ONLY valid JSON for PrimaryOutput \
             with fields: run_id, epack, aru, answer, reasoning_trace, claims, \
             overall_confidence, uncertainty_flags, next_step.\nRUN_ID={} EPACK={} ARU={}.\nUser \
             query:\n{user_query}\n",
            anchors.run_id, anchors.epack, anchors.aru
        );

        let prompts = config.prompts.clone();
        let anchors_owned = anchors.clone();
        let temperature = config.primary_temperature;
        let timeout_s =
            debate.defender_model.timeout_s.unwrap_or(config.primary_timeout_s);
        let repairs = config.max_repair_attempts;

        let defender_task = tokio::spawn({
            let prompts = prompts.clone();
            let anchors_task = anchors_owned.clone();
            async move {
                call_with_repair(
                    defender_adapter,
                    &prompts,
                    &anchors_task,
                    defender_prompt,
                    temperature,
                    timeout_s,
                    repairs,
                )
                .await
            }
        });
        let critic_timeout =
            debate.critic_model.timeout_s.unwrap_or(config.primary_timeout_s);
        let critic_task = tokio::spawn({
            let prompts = prompts.clone();
            let anchors_task = anchors_owned.clone();
            async move {
                call_with_repair(
                    critic_adapter,
                    &prompts,
                    &anchors_task,
                    critic_prompt,
                    temperature,
                    critic_timeout,
                    repairs,
                )
                .await
            }
        });

        let (defender_joined, critic_joined) = tokio::join!(defender_task, critic_task);
        let defender_result = flatten_join(defender_joined)?;
        let critic_result = flatten_join(critic_joined)?;
        let (defender, defender_raw) = defender_result;
        let (critic, critic_raw) = critic_result;

        self.emit(anchors, "primary.raw", json!({ "raw": defender_raw }))?;
        self.emit(
            anchors,
            "debate.defender.raw",
            json!({ "parsed": defender.is_some(), "raw": defender_raw }),
        )?;
        self.emit(
            anchors,
            "debate.critic.raw",
            json!({ "parsed": critic.is_some(), "raw": critic_raw }),
        )?;

        if defender.is_none() || critic.is_none() {
            let run = DebateRun {
                status: ConsensusStatus::Refuse,
                synthesized: None,
                defender,
                critic,
                defender_raw,
                critic_raw,
                gate: None,
                failure: Some(failure_class::PARSE_FAILED.to_string()),
                latency_ms: self.clock.unix_millis().saturating_sub(started_ms),
            };
            self.emit(anchors, "end", json!({ "status": "REFUSE", "failure": "PARSE_FAILED" }))?;
            return Ok(run);
        }

        let synthesizer_prompt = format!(
            "User query:\n{user_query}\n\nDefender output JSON:\n{defender_raw}\n\nCritic output \
             JSON:\n{critic_raw}\n\nSynthesize the final decision. Return ONLY valid JSON for \
             SynthesizerOutput with fields: run_id, epack, aru, answer, reasoning_trace, \
             overall_confidence.\nRUN_ID={} EPACK={} ARU={}.",
            anchors.run_id, anchors.epack, anchors.aru
        );
        let synth_timeout =
            debate.synthesizer_model.timeout_s.unwrap_or(config.primary_timeout_s);
        let (synthesized, synth_raw) = call_synthesizer(
            synthesizer_adapter,
            &prompts,
            anchors,
            synthesizer_prompt,
            temperature,
            synth_timeout,
            repairs,
        )
        .await?;
        self.emit(anchors, "synthesizer.raw", json!({ "raw": synth_raw }))?;

        let Some(synthesized) = synthesized else {
            let run = DebateRun {
                status: ConsensusStatus::Refuse,
                synthesized: None,
                defender,
                critic,
                defender_raw,
                critic_raw,
                gate: None,
                failure: Some(failure_class::PARSE_FAILED.to_string()),
                latency_ms: self.clock.unix_millis().saturating_sub(started_ms),
            };
            self.emit(anchors, "end", json!({ "status": "REFUSE", "failure": "PARSE_FAILED" }))?;
            return Ok(run);
        };

        if synthesized.run_id != anchors.run_id || synthesized.epack != anchors.epack {
            let run = DebateRun {
                status: ConsensusStatus::Refuse,
                synthesized: Some(synthesized),
                defender,
                critic,
                defender_raw,
                critic_raw,
                gate: None,
                failure: Some(failure_class::ANCHOR_MISMATCH.to_string()),
                latency_ms: self.clock.unix_millis().saturating_sub(started_ms),
            };
            self.emit(anchors, "end", json!({ "status": "REFUSE", "failure": "ANCHOR_MISMATCH" }))?;
            return Ok(run);
        }

        let gate = evaluate_scope_gate(
            &synthesized.answer,
            &synthesized.reasoning_trace,
            verification,
            gate_config,
        );
        self.emit_gate(anchors, verification, &gate, gate_config)?;

        let status = match gate.decision {
            GateDecision::Pass => ConsensusStatus::Pass,
            GateDecision::Rewrite | GateDecision::Refuse => ConsensusStatus::Refuse,
        };
        let failure = (status == ConsensusStatus::Refuse)
            .then(|| failure_class::SCOPE_REFUSE.to_string());
        self.emit(
            anchors,
            "end",
            json!({
                "status": match status {
                    ConsensusStatus::Pass => "PASS",
                    ConsensusStatus::Rewrite => "REWRITE",
                    ConsensusStatus::Refuse => "REFUSE",
                },
            }),
        )?;

        Ok(DebateRun {
            status,
            synthesized: Some(synthesized),
            defender,
            critic,
            defender_raw,
            critic_raw,
            gate: Some(gate),
            failure,
            latency_ms: self.clock.unix_millis().saturating_sub(started_ms),
        })
    }
}

// ============================================================================
// SECTION: Adapter Call Helpers
// ============================================================================

/// Flattens a join result; task panics surface as adapter errors.
fn flatten_join<T>(
    joined: Result<Result<T, ConsensusError>, tokio::task::JoinError>,
) -> Result<T, ConsensusError> {
    match joined {
        Ok(result) => result,
        Err(err) => Err(ConsensusError::Adapter(AdapterError::Other(format!(
            "debate task failed: {err}"
        )))),
    }
}

/// Calls an adapter with a hard deadline.
async fn call_adapter(
    adapter: &Arc<dyn Adapter>,
    prompt: &str,
    temperature: f64,
    timeout_s: u64,
) -> Result<(String, Value), AdapterError> {
    let deadline = Duration::from_secs(timeout_s);
    match tokio::time::timeout(
        deadline,
        adapter.generate_text(prompt, temperature, timeout_s, &json!({})),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout(timeout_s)),
    }
}

/// Calls the primary-schema adapter with the JSON-repair loop.
///
/// Returns `(parsed, raw_text)`; `parsed` is `None` when every repair
/// attempt failed (the raw text is still preserved). Retryable adapter
/// errors consume repair attempts; terminal ones propagate.
async fn call_with_repair(
    adapter: Arc<dyn Adapter>,
    prompts: &PromptBundle,
    anchors: &RunAnchors,
    prompt: String,
    temperature: f64,
    timeout_s: u64,
    max_repair_attempts: u32,
) -> Result<(Option<PrimaryOutput>, String), ConsensusError> {
    let mut current_prompt = prompt;
    let mut last_raw = String::new();

    for _ in 0..=max_repair_attempts {
        let (raw, _meta) = match call_adapter(&adapter, &current_prompt, temperature, timeout_s)
            .await
        {
            Ok(ok) => ok,
            Err(err) if err.is_retryable() => {
                continue;
            }
            Err(err) => return Err(ConsensusError::Adapter(err)),
        };
        last_raw = raw.clone();

        match parse_primary_output(&raw) {
            Ok(parsed) => return Ok((Some(parsed), last_raw)),
            Err(_) => {
                current_prompt = prompts.render_repair(
                    &PromptAnchors {
                        run_id: &anchors.run_id,
                        epack: &anchors.epack,
                        aru: &anchors.aru,
                    },
                    &raw,
                );
            }
        }
    }

    Ok((None, last_raw))
}

/// Calls the synthesizer adapter with the JSON-repair loop.
async fn call_synthesizer(
    adapter: Arc<dyn Adapter>,
    prompts: &PromptBundle,
    anchors: &RunAnchors,
    prompt: String,
    temperature: f64,
    timeout_s: u64,
    max_repair_attempts: u32,
) -> Result<(Option<SynthesizerOutput>, String), ConsensusError> {
    let mut current_prompt = prompt;
    let mut last_raw = String::new();

    for _ in 0..=max_repair_attempts {
        let (raw, _meta) = match call_adapter(&adapter, &current_prompt, temperature, timeout_s)
            .await
        {
            Ok(ok) => ok,
            Err(err) if err.is_retryable() => {
                continue;
            }
            Err(err) => return Err(ConsensusError::Adapter(err)),
        };
        last_raw = raw.clone();

        match parse_synthesizer_output(&raw) {
            Ok(parsed) => return Ok((Some(parsed), last_raw)),
            Err(_) => {
                current_prompt = prompts.render_repair(
                    &PromptAnchors {
                        run_id: &anchors.run_id,
                        epack: &anchors.epack,
                        aru: &anchors.aru,
                    },
                    &raw,
                );
            }
        }
    }

    Ok((None, last_raw))
}
