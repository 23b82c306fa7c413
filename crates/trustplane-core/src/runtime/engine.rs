// crates/trustplane-core/src/runtime/engine.rs
// ============================================================================
// Module: Trustplane Turn Engine
// Description: Routing, gate lifecycle, tool dispatch, generation, sealing.
// Purpose: Drive every governed interaction through one audited path.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! `handle_turn` is the single entry point for a governed interaction: it
//! advances the pending gate, builds the input vector, consults the workflow
//! queue, routes, generates (or dispatches a tool), validates, escalates the
//! profile, and seals the turn into the EPACK chain. Every path, including
//! every error path, ends in a sealed record; silent fallback to permissive
//! behavior is forbidden.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::decision::DecisionInputs;
use crate::core::decision::build_decision_object;
use crate::core::epack::new_epack;
use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_text;
use crate::core::input::InputVector;
use crate::core::input::REFLECT_COMPLEXITY_THRESHOLD;
use crate::core::input::SCAFFOLD_COMPLEXITY_THRESHOLD;
use crate::core::input::detect_domain;
use crate::core::input::estimate_complexity;
use crate::core::manifest::BuildManifest;
use crate::core::profile::CLEAN_STREAK_FOR_DEESCALATION;
use crate::core::profile::FAILURES_FOR_ESCALATION;
use crate::core::profile::Profile;
use crate::core::redaction::RedactMode;
use crate::core::redaction::redact_payload;
use crate::core::session::PendingGate;
use crate::core::session::SessionState;
use crate::core::session::WorkflowStep;
use crate::interfaces::Clock;
use crate::interfaces::Embedder;
use crate::interfaces::EpackSink;
use crate::interfaces::GenerationConfig;
use crate::interfaces::GenerationError;
use crate::interfaces::SinkError;
use crate::interfaces::TextGenerator;
use crate::runtime::gates::ClearedGate;
use crate::runtime::gates::GateStep;
use crate::runtime::gates::handle_pending_gate;
use crate::runtime::gates::render_reflect_prompt;
use crate::runtime::gates::render_scaffold_prompt;
use crate::runtime::gates::set_pending_gate;
use crate::runtime::gates::trace;
use crate::runtime::gates::trace_meta;
use crate::runtime::router::Route;
use crate::runtime::router::route;
use crate::runtime::safety::Stage2Screen;
use crate::runtime::safety::stage1;
use crate::runtime::tools::ToolRegistry;
use crate::runtime::validator::ValidationAttempt;
use crate::runtime::validator::ValidationOptions;
use crate::runtime::validator::validate_output;

// ============================================================================
// SECTION: Engine Configuration
// ============================================================================

/// Configuration for the turn engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hash algorithm used throughout the chain.
    pub hash_algorithm: HashAlgorithm,
    /// Stage-2 safety risk threshold.
    pub stage2_threshold: f64,
    /// Embedding model identifier recorded in stage-2 verdicts.
    pub embeddings_model: String,
    /// Generation parameters for the TDM path.
    pub generation: GenerationConfig,
    /// Redaction policy applied before persistence.
    pub redact_mode: RedactMode,
    /// Whether sealed records are persisted to the sink.
    pub persist_epacks: bool,
    /// Whether implied evidence claims require citations.
    pub require_evidence_citations: bool,
    /// Whether the citation-integrity notice is appended to cited answers.
    pub auto_citation_notice: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Sha256,
            stage2_threshold: crate::runtime::safety::DEFAULT_STAGE2_THRESHOLD,
            embeddings_model: "local-mini".to_string(),
            generation: GenerationConfig {
                model: "mock-llm".to_string(),
                temperature: 0.0,
                max_tokens: 900,
            },
            redact_mode: RedactMode::Hash,
            persist_epacks: true,
            require_evidence_citations: true,
            auto_citation_notice: true,
        }
    }
}

// ============================================================================
// SECTION: Engine Errors and Outcome
// ============================================================================

/// Turn engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Canonical hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// EPACK sink error.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Result of one governed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Assistant reply for the turn.
    pub assistant_text: String,
    /// Sealed EPACK record for the turn.
    pub epack: crate::core::epack::EpackRecord,
}

// ============================================================================
// SECTION: Stable Templates
// ============================================================================

/// Citation-integrity notice appended to cited answers.
const CITATION_NOTICE: &str = "Citations reflect representative evidence and may not be \
                               exhaustive. Independent verification is recommended for critical \
                               decisions.";

/// Deterministic fallback when validation fails after retries.
const CLARIFY_FALLBACK: &str = "CLARIFY: Output validation failed after retries. Provide goal + \
                                constraints + output format in 1-3 bullets.";

/// Scaffold plan stub rendered into approval prompts.
const SCAFFOLD_PLAN: &str = "Plan:\n1) Confirm requirements and constraints\n2) Propose \
                             architecture / approach\n3) Provide implementation steps\n4) Provide \
                             test + validation checklist\n";

// ============================================================================
// SECTION: Turn Engine
// ============================================================================

/// Turn engine generic over generation, persistence, time, and embedding.
#[derive(Debug)]
pub struct TurnEngine<G, S, C, E> {
    /// Blocking text generator for the TDM path.
    generator: G,
    /// EPACK persistence sink.
    sink: S,
    /// Time source for sealing.
    clock: C,
    /// Stage-2 safety screen.
    stage2: Stage2Screen<E>,
    /// Allow-listed tool registry.
    tools: ToolRegistry,
    /// Engine configuration.
    config: EngineConfig,
    /// Sealed build manifest for the running kernel.
    manifest: BuildManifest,
}

impl<G, S, C, E> TurnEngine<G, S, C, E>
where
    G: TextGenerator,
    S: EpackSink,
    C: Clock,
    E: Embedder,
{
    /// Creates a turn engine, sealing the build manifest once.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when manifest sealing fails.
    pub fn new(
        generator: G,
        sink: S,
        clock: C,
        embedder: E,
        tools: ToolRegistry,
        config: EngineConfig,
    ) -> Result<Self, HashError> {
        let manifest = BuildManifest::current(config.hash_algorithm)?;
        let stage2 =
            Stage2Screen::new(embedder, config.embeddings_model.clone(), config.stage2_threshold);
        Ok(Self {
            generator,
            sink,
            clock,
            stage2,
            tools,
            config,
            manifest,
        })
    }

    /// Sealed build manifest for the running kernel.
    #[must_use]
    pub const fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    /// Builds the deterministic input vector for a turn.
    #[must_use]
    pub fn build_input_vector(&self, user_text: &str) -> InputVector {
        let stage1_verdict = stage1(user_text);
        let stage2_verdict = self.stage2.score(user_text);
        let safe = stage1_verdict.ok && stage2_verdict.ok;
        let complexity = estimate_complexity(user_text);
        InputVector {
            user_text: user_text.to_string(),
            user_text_hash: hash_text(self.config.hash_algorithm, user_text),
            stage1: stage1_verdict,
            stage2: stage2_verdict,
            safe,
            domain: detect_domain(user_text),
            complexity,
            requires_reflect: complexity >= REFLECT_COMPLEXITY_THRESHOLD,
            requires_scaffold: complexity >= SCAFFOLD_COMPLEXITY_THRESHOLD,
        }
    }

    /// Drives one governed interaction end to end.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] only when sealing itself fails; every
    /// generation, validation, or tool failure is sealed as a turn outcome.
    #[allow(
        clippy::too_many_lines,
        reason = "Single linear flow keeps the ordered turn lifecycle auditable."
    )]
    pub fn handle_turn(
        &self,
        session: &mut SessionState,
        user_text: &str,
    ) -> Result<TurnOutcome, EngineError> {
        session.interaction_count += 1;

        let gate_step = handle_pending_gate(self.config.hash_algorithm, session, user_text)?;
        match gate_step {
            GateStep::Reply {
                text,
                meta,
            } => {
                return self.seal(session, user_text, &text, json!({ "gate_meta": meta }));
            }
            GateStep::Cleared {
                gate: ClearedGate::Reflect,
                payload,
                ..
            } => {
                let requires_scaffold =
                    payload.get("requires_scaffold").and_then(Value::as_bool).unwrap_or(false);
                if requires_scaffold && !session.scaffold_approved {
                    session.workflow_queue.clear();
                    session.workflow_queue.push_back(WorkflowStep::Scaffold);
                } else {
                    session.workflow_queue.clear();
                    session.workflow_queue.push_back(WorkflowStep::Tdm);
                }
            }
            GateStep::Cleared {
                gate: ClearedGate::Scaffold,
                ..
            } => {
                session.workflow_queue.clear();
                session.workflow_queue.push_back(WorkflowStep::Tdm);
            }
            GateStep::Inactive => {}
        }

        let iv = self.build_input_vector(user_text);

        if let Some(step) = session.workflow_queue.pop_front() {
            trace(
                session,
                "QUEUE",
                "QUEUE",
                "workflow_step_dequeued",
                trace_meta(&[("next", json!(match step {
                    WorkflowStep::Scaffold => "SCAFFOLD",
                    WorkflowStep::Tdm => "TDM",
                }))]),
            );
            match step {
                WorkflowStep::Scaffold => {
                    let mut payload = Map::new();
                    payload.insert("user_text_hash".into(), json!(iv.user_text_hash));
                    payload.insert("domain".into(), json!(iv.domain));
                    payload.insert("complexity".into(), json!(iv.complexity));
                    payload.insert("plan_stub".into(), json!(true));
                    payload.insert("workflow".into(), json!("chained"));
                    set_pending_gate(
                        self.config.hash_algorithm,
                        session,
                        PendingGate::ScaffoldApprove,
                        payload,
                    )?;
                    let token = session.pending_gate.confirm_token.clone();
                    trace(
                        session,
                        PendingGate::None.as_str(),
                        PendingGate::ScaffoldApprove.as_str(),
                        "enter_scaffold_pending_chained",
                        trace_meta(&[("token", json!(token))]),
                    );
                    let prompt = render_scaffold_prompt(session, SCAFFOLD_PLAN);
                    return self.seal(
                        session,
                        user_text,
                        &prompt,
                        json!({ "workflow": "chained", "iv": iv }),
                    );
                }
                WorkflowStep::Tdm => {
                    let (text, meta) = self.execute_tdm(session, &iv)?;
                    return self.seal(
                        session,
                        user_text,
                        &text,
                        json!({ "workflow": "chained", "iv": iv, "gen_meta": meta }),
                    );
                }
            }
        }

        let (selected, why) = route(&iv, session);
        match selected {
            Route::Bound => {
                let text = format!(
                    "BOUND: I can't help with that.\nReason: safe={} | s1_ok={} ({}) | s2_ok={} \
                     score={:.3}\nREDIRECT: Ask for safe, lawful, non-harmful info instead.",
                    iv.safe, iv.stage1.ok, iv.stage1.reason, iv.stage2.ok, iv.stage2.score
                );
                self.seal(
                    session,
                    user_text,
                    &text,
                    json!({ "route": { "seq": [selected.as_str()], "why": why }, "iv": iv }),
                )
            }
            Route::Defer => {
                let text = "DEFER: This is high-stakes. I need strong verification evidence (E3) \
                            before proceeding.\nTo continue safely:\n1) Provide authoritative \
                            sources you want used, OR\n2) Describe your verification method, \
                            OR\n3) Narrow to general, non-actionable info."
                    .to_string();
                self.seal(
                    session,
                    user_text,
                    &text,
                    json!({ "route": { "seq": [selected.as_str()], "why": why }, "iv": iv }),
                )
            }
            Route::Reflect => {
                let mut payload = Map::new();
                payload.insert("user_text_hash".into(), json!(iv.user_text_hash));
                payload.insert("domain".into(), json!(iv.domain));
                payload.insert("complexity".into(), json!(iv.complexity));
                payload.insert("requires_scaffold".into(), json!(iv.requires_scaffold));
                set_pending_gate(
                    self.config.hash_algorithm,
                    session,
                    PendingGate::ReflectConfirm,
                    payload,
                )?;
                let token = session.pending_gate.confirm_token.clone();
                trace(
                    session,
                    PendingGate::None.as_str(),
                    PendingGate::ReflectConfirm.as_str(),
                    "enter_reflect_pending",
                    trace_meta(&[("why", json!(why)), ("token", json!(token))]),
                );
                let summary = format!(
                    "You want help with: {}",
                    iv.user_text.trim().chars().take(220).collect::<String>()
                );
                let prompt = render_reflect_prompt(session, &summary);
                self.seal(
                    session,
                    user_text,
                    &prompt,
                    json!({ "route": { "seq": [selected.as_str()], "why": why }, "iv": iv }),
                )
            }
            Route::Scaffold => {
                let mut payload = Map::new();
                payload.insert("user_text_hash".into(), json!(iv.user_text_hash));
                payload.insert("domain".into(), json!(iv.domain));
                payload.insert("complexity".into(), json!(iv.complexity));
                payload.insert("plan_stub".into(), json!(true));
                set_pending_gate(
                    self.config.hash_algorithm,
                    session,
                    PendingGate::ScaffoldApprove,
                    payload,
                )?;
                let token = session.pending_gate.confirm_token.clone();
                trace(
                    session,
                    PendingGate::None.as_str(),
                    PendingGate::ScaffoldApprove.as_str(),
                    "enter_scaffold_pending",
                    trace_meta(&[("why", json!(why)), ("token", json!(token))]),
                );
                let prompt = render_scaffold_prompt(session, SCAFFOLD_PLAN);
                self.seal(
                    session,
                    user_text,
                    &prompt,
                    json!({ "route": { "seq": [selected.as_str()], "why": why }, "iv": iv }),
                )
            }
            Route::Tdm => {
                let (text, meta) = self.execute_tdm(session, &iv)?;
                self.seal(
                    session,
                    user_text,
                    &text,
                    json!({
                        "route": { "seq": [selected.as_str()], "why": why },
                        "iv": iv,
                        "gen_meta": meta,
                    }),
                )
            }
        }
    }

    // ------------------------------------------------------------------
    // TDM execution
    // ------------------------------------------------------------------

    /// Runs the TDM path: tool dispatch or validated generation.
    fn execute_tdm(
        &self,
        session: &mut SessionState,
        iv: &InputVector,
    ) -> Result<(String, Value), EngineError> {
        let trimmed = iv.user_text.trim();
        let lower = trimmed.to_lowercase();

        if lower.starts_with("calc:") {
            let expr = trimmed.splitn(2, ':').nth(1).unwrap_or("").trim();
            let result = self.tools.call(
                self.config.hash_algorithm,
                "safe_calc",
                &json!({ "expr": expr }),
            )?;
            let ok = result.ok;
            let value = result.output.get("value").and_then(Value::as_f64).unwrap_or(0.0);
            let meta = json!({ "provider": "tool_sandbox", "tool_records": [result] });
            if ok {
                return Ok((format_calc_value(value), meta));
            }
            return Ok(("CLARIFY: invalid calc expression.".to_string(), meta));
        }

        if lower.starts_with("search:") {
            let query = trimmed.splitn(2, ':').nth(1).unwrap_or("").trim();
            return Ok(self.tool_search(query)?);
        }

        let threshold = session.current_profile.alignment_threshold();
        let max_attempts = session.current_profile.max_generation_attempts();
        let options = ValidationOptions {
            threshold,
            require_evidence_citations: self.config.require_evidence_citations,
            algorithm: self.config.hash_algorithm,
        };

        let mut prompt = render_tdm_prompt(&iv.user_text);
        let mut all_attempts: Vec<ValidationAttempt> = Vec::new();
        let mut chosen_text = String::new();
        let mut chosen_meta = json!({});

        for attempt in 1..=max_attempts {
            let generated = match self.generator.generate(&prompt, &self.config.generation) {
                Ok(generated) => generated,
                Err(GenerationError::Timeout(reason)) => {
                    all_attempts.push(ValidationAttempt {
                        attempt,
                        ok: false,
                        reason: format!("provider_timeout:{reason}"),
                        score: 0.0,
                    });
                    break;
                }
                Err(GenerationError::Provider(reason)) => {
                    all_attempts.push(ValidationAttempt {
                        attempt,
                        ok: false,
                        reason: format!("provider_error:{reason}"),
                        score: 0.0,
                    });
                    continue;
                }
            };

            let attempts = validate_output(&iv.user_text, &generated.text, options);
            let ok = attempts.iter().all(|verdict| verdict.ok);
            all_attempts.extend(attempts.iter().cloned());

            if ok {
                chosen_text = postprocess_tdm_json(
                    &generated.text,
                    self.config.auto_citation_notice,
                );
                chosen_meta = json!({
                    "provider": generated.provider,
                    "model": generated.model,
                    "usage": generated.usage,
                    "attempt": attempt,
                    "validation": attempts,
                    "validation_ok": true,
                    "align_threshold": threshold,
                });
                break;
            }

            prompt.push_str(
                "\n\nPrevious output failed validation.\nRetry rules:\n- Output MUST be valid \
                 JSON.\n- Only keys: text, disclosure, citations, assumptions.\n- No extra \
                 keys.\n- No text outside JSON.\n",
            );
        }

        if chosen_text.is_empty() {
            chosen_text = CLARIFY_FALLBACK.to_string();
            chosen_meta = json!({
                "provider": "validation_fail_closed",
                "attempts": max_attempts,
                "validation_ok": false,
                "align_threshold": threshold,
                "validation": all_attempts,
            });
        }

        self.escalate_profile(session, &all_attempts);
        Ok((chosen_text, chosen_meta))
    }

    /// Dispatches a `search:` turn through the allow-listed registry.
    fn tool_search(&self, query: &str) -> Result<(String, Value), EngineError> {
        let result = self.tools.call(
            self.config.hash_algorithm,
            "web_search",
            &json!({ "q": query, "count": 5 }),
        )?;
        let records = json!([result.clone()]);
        let meta = json!({ "provider": "tool_sandbox", "tool_records": records });

        if result.ok && result.output.get("ok").and_then(Value::as_bool) == Some(true) {
            let empty = Vec::new();
            let results = result.output.get("results").and_then(Value::as_array).unwrap_or(&empty);
            let mut lines = vec!["SEARCH (web):".to_string()];
            for (index, entry) in results.iter().take(5).enumerate() {
                let title = entry.get("title").and_then(Value::as_str).unwrap_or("").trim();
                let url = entry.get("url").and_then(Value::as_str).unwrap_or("").trim();
                lines.push(format!("{}. {title} - {url}", index + 1));
                let snippet = entry.get("snippet").and_then(Value::as_str).unwrap_or("").trim();
                if !snippet.is_empty() {
                    lines.push(format!("   {snippet}"));
                }
            }
            return Ok((lines.join("\n"), meta));
        }
        Ok(("CLARIFY: search tool failed (missing keys or network error).".to_string(), meta))
    }

    // ------------------------------------------------------------------
    // Profile escalation
    // ------------------------------------------------------------------

    /// Escalates or de-escalates the profile after a validation cycle.
    fn escalate_profile(&self, session: &mut SessionState, attempts: &[ValidationAttempt]) {
        let failures = attempts.iter().filter(|attempt| !attempt.ok).count();
        if failures > 0 {
            session.last_failure_interaction = session.interaction_count;
        }
        let clean_streak =
            session.interaction_count.saturating_sub(session.last_failure_interaction);

        if failures >= FAILURES_FOR_ESCALATION {
            session.current_profile = session.current_profile.escalated();
            trace(
                session,
                "PROFILE",
                "PROFILE",
                "profile_up",
                trace_meta(&[("fails", json!(failures))]),
            );
        } else if clean_streak >= CLEAN_STREAK_FOR_DEESCALATION
            && session.current_profile != Profile::Fast
        {
            session.current_profile = session.current_profile.deescalated();
            trace(
                session,
                "PROFILE",
                "PROFILE",
                "profile_down",
                trace_meta(&[("clean_streak", json!(clean_streak))]),
            );
        }
    }

    // ------------------------------------------------------------------
    // Sealing
    // ------------------------------------------------------------------

    /// Seals a completed turn into the EPACK chain.
    fn seal(
        &self,
        session: &mut SessionState,
        user_text: &str,
        assistant_text: &str,
        extra: Value,
    ) -> Result<TurnOutcome, EngineError> {
        session.epack_seq += 1;
        let algorithm = self.config.hash_algorithm;

        let mut payload = json!({
            "session_id": session.session_id,
            "interaction": session.interaction_count,
            "profile": session.current_profile.as_str(),
            "prompt": user_text,
            "user_text_hash": hash_text(algorithm, user_text),
            "assistant_text_hash": hash_text(algorithm, assistant_text),
            "pending_gate": {
                "gate": session.pending_gate.gate.as_str(),
                "created_at_interaction": session.pending_gate.created_at_interaction,
                "expires_after_turns": session.pending_gate.expires_after_turns,
                "pending_payload_hash": session.pending_gate.payload_hash,
                "pending_confirm_token": session.pending_gate.confirm_token,
                "pending_require_token_binding": session.pending_gate.require_token_binding,
                "pending_nonce": session.pending_gate.nonce,
                "prompt_cache_hash": session.pending_gate.prompt_cache_hash,
            },
            "traces_tail": session.trace_tail(),
            "tsv_snapshot": session.tsv.snapshot(),
            "build_manifest": self.manifest,
            "extra": extra,
        });

        let created_at = self.clock.unix_seconds();
        let (decision, decision_hash) = build_decision_object(algorithm, &DecisionInputs {
            session_id: &session.session_id,
            epack_seq: session.epack_seq,
            payload: &payload,
            assistant_text,
            build_manifest: &self.manifest,
            profile: Some(session.current_profile.as_str()),
            prev_decision_hash: session.prev_decision_hash.as_deref(),
            created_at,
        })?;

        if let Some(map) = payload.as_object_mut() {
            map.insert("decision_hash".to_string(), json!(decision_hash));
            map.insert("decision_object".to_string(), json!(decision));
        }
        session.prev_decision_hash = Some(decision_hash.clone());

        let prev_hash = session.epack_prev_hash.clone();
        let record = new_epack(
            algorithm,
            session.epack_seq,
            created_at,
            &prev_hash,
            payload,
            Some(decision_hash),
        )?;
        session.epack_prev_hash = record.hash.clone();
        session.epacks.push(record.clone());

        if self.config.persist_epacks && record.seq > session.last_persisted_seq {
            let mut persisted = record.clone();
            persisted.payload =
                redact_payload(self.config.redact_mode, algorithm, &persisted.payload);
            self.sink.append(&session.session_id, &persisted)?;
            session.last_persisted_seq = record.seq;
        }

        Ok(TurnOutcome {
            assistant_text: assistant_text.to_string(),
            epack: record,
        })
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Formats a calculator result (integral values render without a fraction).
fn format_calc_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Integral check and magnitude bound precede the cast."
        )]
        let integral = value as i64;
        integral.to_string()
    } else {
        value.to_string()
    }
}

/// Renders the strict-JSON TDM prompt for a user turn.
#[must_use]
pub fn render_tdm_prompt(user_text: &str) -> String {
    format!(
        "You are the Trustplane governance kernel.\n\nOutput rules (STRICT):\n- Output MUST be \
         valid JSON object.\n- Allowed keys only: text, disclosure, citations, assumptions.\n- Do \
         not output any extra keys.\n- Do not include any text outside the JSON.\n\nCitation \
         rules:\n- If you reference studies, research, guidelines, trials, reviews, or \
         meta-analyses, you MUST include at least 1 citation object in citations.\n- Each \
         citation object MUST use only these fields:\n  Required: title, authors_or_org, year, \
         source_type, evidence_strength, verification_status\n  Optional: identifier, notes\n- \
         year must be an integer year or the string 'unknown'.\n- source_type must be one of: \
         randomized_trial, meta_analysis, systematic_review, clinical_guideline, \
         observational_study, technical_standard, institutional_report, textbook_reference, \
         general_background\n- evidence_strength must be one of: strong_consensus, \
         moderate_evidence, emerging_evidence, contested, contextual_reference\n- \
         verification_status must be one of: verified_reference, probable_reference, \
         unverified_model_recall, citation_not_retrieved\n- If you cannot retrieve a specific \
         source, set verification_status='citation_not_retrieved' and state that limitation in \
         disclosure.\n- Do NOT invent journal names, DOIs, or authors.\n\nSafety rules:\n- If \
         safety is at risk, refuse and redirect.\n\nUSER:\n{user_text}\n"
    )
}

/// Appends the citation-integrity notice to validated TDM output.
///
/// Never adds new keys; modifies only the object's `text`. Unparsable input
/// is returned unchanged.
#[must_use]
pub fn postprocess_tdm_json(raw: &str, auto_notice: bool) -> String {
    if !auto_notice {
        return raw.to_string();
    }
    let Ok(mut value) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };
    let Some(obj) = value.as_object_mut() else {
        return raw.to_string();
    };
    let has_citations =
        obj.get("citations").and_then(Value::as_array).is_some_and(|list| !list.is_empty());
    if has_citations {
        let text = obj.get("text").and_then(Value::as_str).unwrap_or("").to_string();
        if !text.contains(CITATION_NOTICE) {
            let updated =
                format!("{}\n\nCitation Integrity Notice: {CITATION_NOTICE}", text.trim_end());
            obj.insert("text".to_string(), json!(updated));
        }
    }
    serde_json::to_string(&value).unwrap_or_else(|_| raw.to_string())
}
