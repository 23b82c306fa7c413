// crates/trustplane-consensus/tests/orchestrator.rs
// ============================================================================
// Module: Orchestrator Tests
// Description: Anchored flows, repair loop, ledger order, debate fan-out.
// ============================================================================
//! ## Overview
//! Exercises both consensus flows against in-test adapters: anchor echo and
//! mismatch, the JSON-repair loop, structured parse failures preserving raw
//! outputs, hard deadlines, the rewrite round, and the fixed hash-chained
//! ledger event order.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use trustplane_consensus::Adapter;
use trustplane_consensus::AdapterError;
use trustplane_consensus::AdapterRegistry;
use trustplane_consensus::ConsensusConfig;
use trustplane_consensus::ConsensusError;
use trustplane_consensus::ConsensusStatus;
use trustplane_consensus::DebateConfig;
use trustplane_consensus::ModelSpec;
use trustplane_consensus::Orchestrator;
use trustplane_consensus::Role;
use trustplane_consensus::RunAnchors;
use trustplane_consensus::ScopeGateConfig;
use trustplane_consensus::VerificationContext;
use trustplane_consensus::default_prompts;
use trustplane_core::HashAlgorithm;
use trustplane_core::MemoryLedger;
use trustplane_core::interfaces::FixedClock;

// ============================================================================
// SECTION: Test Adapters
// ============================================================================

/// Extracts a `KEY=value` assignment from a prompt.
fn extract(prompt: &str, key: &str) -> String {
    let marker = format!("{key}=");
    prompt.find(&marker).map_or_else(String::new, |start| {
        let rest = &prompt[start + marker.len()..];
        rest.split([' ', '\n', '.']).next().unwrap_or("").to_string()
    })
}

/// Builds a schema-correct body echoing the prompt's anchors.
fn echo_body(prompt: &str, answer: &str) -> String {
    let run_id = extract(prompt, "RUN_ID");
    let epack = extract(prompt, "EPACK");
    let aru = extract(prompt, "ARU");
    if prompt.contains("SynthesizerOutput") {
        json!({
            "run_id": run_id,
            "epack": epack,
            "aru": aru,
            "answer": answer,
            "reasoning_trace": [],
            "overall_confidence": 0.9,
        })
        .to_string()
    } else {
        json!({
            "run_id": run_id,
            "epack": epack,
            "aru": aru,
            "answer": answer,
            "reasoning_trace": [],
            "claims": [],
            "overall_confidence": 0.9,
            "uncertainty_flags": [],
            "next_step": null,
        })
        .to_string()
    }
}

/// Adapter echoing valid schema JSON with the prompt's anchors.
struct EchoAdapter {
    /// Answer text returned in every body.
    answer: String,
}

#[async_trait]
impl Adapter for EchoAdapter {
    fn provider(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo-model"
    }

    async fn generate_text(
        &self,
        prompt: &str,
        _temperature: f64,
        _timeout_s: u64,
        _extra: &Value,
    ) -> Result<(String, Value), AdapterError> {
        Ok((echo_body(prompt, &self.answer), json!({})))
    }
}

/// Adapter returning invalid JSON first, then a valid body.
struct BadThenGoodAdapter {
    /// Calls served so far.
    calls: Mutex<u32>,
}

#[async_trait]
impl Adapter for BadThenGoodAdapter {
    fn provider(&self) -> &str {
        "badgood"
    }

    fn model(&self) -> &str {
        "badgood-model"
    }

    async fn generate_text(
        &self,
        prompt: &str,
        _temperature: f64,
        _timeout_s: u64,
        _extra: &Value,
    ) -> Result<(String, Value), AdapterError> {
        let mut calls = self.calls.lock().map_err(|_| AdapterError::Other("lock".into()))?;
        *calls += 1;
        if *calls == 1 {
            Ok(("oops not json at all".to_string(), json!({})))
        } else {
            Ok((echo_body(prompt, "repaired answer"), json!({})))
        }
    }
}

/// Adapter that always returns unparsable text.
struct AlwaysBadAdapter;

#[async_trait]
impl Adapter for AlwaysBadAdapter {
    fn provider(&self) -> &str {
        "alwaysbad"
    }

    fn model(&self) -> &str {
        "alwaysbad-model"
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _temperature: f64,
        _timeout_s: u64,
        _extra: &Value,
    ) -> Result<(String, Value), AdapterError> {
        Ok(("garbage output".to_string(), json!({})))
    }
}

/// Adapter echoing foreign anchors.
struct WrongAnchorAdapter;

#[async_trait]
impl Adapter for WrongAnchorAdapter {
    fn provider(&self) -> &str {
        "wronganchor"
    }

    fn model(&self) -> &str {
        "wronganchor-model"
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _temperature: f64,
        _timeout_s: u64,
        _extra: &Value,
    ) -> Result<(String, Value), AdapterError> {
        Ok((
            json!({
                "run_id": "someone-elses-run",
                "epack": "someone-elses-epack",
                "aru": "ANSWER",
                "answer": "hijacked",
            })
            .to_string(),
            json!({}),
        ))
    }
}

/// Adapter that never completes; only the deadline ends it.
struct StallAdapter;

#[async_trait]
impl Adapter for StallAdapter {
    fn provider(&self) -> &str {
        "stall"
    }

    fn model(&self) -> &str {
        "stall-model"
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _temperature: f64,
        _timeout_s: u64,
        _extra: &Value,
    ) -> Result<(String, Value), AdapterError> {
        std::future::pending::<()>().await;
        Ok((String::new(), json!({})))
    }
}

/// Registers every test adapter under its provider name.
fn registry() -> AdapterRegistry {
    let registry = AdapterRegistry::new();
    registry.register("echo", Arc::new(|_spec| {
        let adapter: Arc<dyn Adapter> = Arc::new(EchoAdapter {
            answer: "clean answer".to_string(),
        });
        Ok(adapter)
    }));
    registry.register("badgood", Arc::new(|_spec| {
        let adapter: Arc<dyn Adapter> = Arc::new(BadThenGoodAdapter {
            calls: Mutex::new(0),
        });
        Ok(adapter)
    }));
    registry.register("alwaysbad", Arc::new(|_spec| {
        let adapter: Arc<dyn Adapter> = Arc::new(AlwaysBadAdapter);
        Ok(adapter)
    }));
    registry.register("wronganchor", Arc::new(|_spec| {
        let adapter: Arc<dyn Adapter> = Arc::new(WrongAnchorAdapter);
        Ok(adapter)
    }));
    registry.register("stall", Arc::new(|_spec| {
        let adapter: Arc<dyn Adapter> = Arc::new(StallAdapter);
        Ok(adapter)
    }));
    registry
}

/// Professional-tier verification (no disclaimer requirement).
fn pro_context() -> VerificationContext {
    VerificationContext {
        verified: true,
        role: Role::Physician,
        role_level: 3,
        ..VerificationContext::public()
    }
}

/// Standard anchors used across tests.
fn anchors() -> RunAnchors {
    RunAnchors {
        run_id: "run-1".to_string(),
        epack: "ep-1".to_string(),
        aru: "ANSWER".to_string(),
    }
}

/// Single-primary config over a provider.
fn config_for(provider: &str) -> ConsensusConfig {
    ConsensusConfig {
        profile_name: Some("TEST".to_string()),
        primary: ModelSpec::new(provider, format!("{provider}-model")),
        validators: Vec::new(),
        primary_temperature: 0.0,
        primary_timeout_s: 5,
        max_repair_attempts: 1,
        prompts: default_prompts(),
        enable_debate: false,
        debate: None,
    }
}

// ============================================================================
// SECTION: Single-Stage Flow
// ============================================================================

/// A clean echo run passes the gate and emits the fixed event order.
#[tokio::test]
async fn single_stage_passes_and_orders_events() {
    let registry = registry();
    let ledger = MemoryLedger::new();
    let clock = FixedClock::at_millis(1_000);
    let orchestrator = Orchestrator::new(&registry, &ledger, &clock, HashAlgorithm::Sha256);

    let run = orchestrator
        .run_single_stage(
            &config_for("echo"),
            &pro_context(),
            &ScopeGateConfig::default(),
            &anchors(),
            "What is governed generation?",
        )
        .await
        .expect("run");

    assert_eq!(run.status, ConsensusStatus::Pass);
    let output = run.output.expect("output");
    assert_eq!(output.run_id, "run-1");
    assert_eq!(output.epack, "ep-1");

    let events = ledger.snapshot().expect("snapshot");
    let stages: Vec<&str> = events.iter().map(|event| event.stage.as_str()).collect();
    assert_eq!(stages, vec!["start", "primary.raw", "scope_gate.pass", "end"]);
    for pair in events.windows(2) {
        assert_eq!(pair[1].prev_hash.as_deref(), Some(pair[0].event_hash.as_str()));
    }
}

/// Invalid first output is repaired within the budget.
#[tokio::test]
async fn repair_loop_recovers_invalid_json() {
    let registry = registry();
    let ledger = MemoryLedger::new();
    let clock = FixedClock::at_millis(1_000);
    let orchestrator = Orchestrator::new(&registry, &ledger, &clock, HashAlgorithm::Sha256);

    let run = orchestrator
        .run_single_stage(
            &config_for("badgood"),
            &pro_context(),
            &ScopeGateConfig::default(),
            &anchors(),
            "query",
        )
        .await
        .expect("run");

    assert_eq!(run.status, ConsensusStatus::Pass);
    assert_eq!(run.output.expect("output").answer, "repaired answer");
}

/// Unrepairable output refuses with the raw text preserved.
#[tokio::test]
async fn parse_failure_refuses_with_raw_preserved() {
    let registry = registry();
    let ledger = MemoryLedger::new();
    let clock = FixedClock::at_millis(1_000);
    let orchestrator = Orchestrator::new(&registry, &ledger, &clock, HashAlgorithm::Sha256);

    let run = orchestrator
        .run_single_stage(
            &config_for("alwaysbad"),
            &pro_context(),
            &ScopeGateConfig::default(),
            &anchors(),
            "query",
        )
        .await
        .expect("run");

    assert_eq!(run.status, ConsensusStatus::Refuse);
    assert_eq!(run.failure.as_deref(), Some("PARSE_FAILED"));
    assert_eq!(run.raw_text, "garbage output");
}

/// A wrong anchor echo is a terminal refuse.
#[tokio::test]
async fn anchor_mismatch_is_terminal() {
    let registry = registry();
    let ledger = MemoryLedger::new();
    let clock = FixedClock::at_millis(1_000);
    let orchestrator = Orchestrator::new(&registry, &ledger, &clock, HashAlgorithm::Sha256);

    let run = orchestrator
        .run_single_stage(
            &config_for("wronganchor"),
            &pro_context(),
            &ScopeGateConfig::default(),
            &anchors(),
            "query",
        )
        .await
        .expect("run");

    assert_eq!(run.status, ConsensusStatus::Refuse);
    assert_eq!(run.failure.as_deref(), Some("ANCHOR_MISMATCH"));
}

/// The hard deadline surfaces as a tagged timeout error.
#[tokio::test]
async fn stalled_adapter_times_out() {
    let registry = registry();
    let ledger = MemoryLedger::new();
    let clock = FixedClock::at_millis(1_000);
    let orchestrator = Orchestrator::new(&registry, &ledger, &clock, HashAlgorithm::Sha256);

    let mut config = config_for("stall");
    config.primary_timeout_s = 1;

    let result = orchestrator
        .run_single_stage(
            &config,
            &pro_context(),
            &ScopeGateConfig::default(),
            &anchors(),
            "query",
        )
        .await;

    match result {
        Err(ConsensusError::Adapter(AdapterError::Timeout(seconds))) => {
            assert_eq!(seconds, 1);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

/// A missing low-tier disclaimer triggers one rewrite round that succeeds.
#[tokio::test]
async fn rewrite_round_recovers_missing_disclaimer() {
    let registry = registry();
    // The echo answer carries the disclaimer only via the rewrite prompt,
    // which embeds the snippet into the framed rewrite request.
    registry.register("disclaimer", Arc::new(|_spec| {
        struct DisclaimerAdapter;
        #[async_trait]
        impl Adapter for DisclaimerAdapter {
            fn provider(&self) -> &str {
                "disclaimer"
            }
            fn model(&self) -> &str {
                "disclaimer-model"
            }
            async fn generate_text(
                &self,
                prompt: &str,
                _temperature: f64,
                _timeout_s: u64,
                _extra: &Value,
            ) -> Result<(String, Value), AdapterError> {
                let answer = if prompt.contains("Add this disclaimer") {
                    "This is general information only and not professional advice. Consult a \
                     qualified expert. General overview."
                        .to_string()
                } else {
                    "General overview.".to_string()
                };
                Ok((echo_body(prompt, &answer), json!({})))
            }
        }
        let adapter: Arc<dyn Adapter> = Arc::new(DisclaimerAdapter);
        Ok(adapter)
    }));

    let ledger = MemoryLedger::new();
    let clock = FixedClock::at_millis(1_000);
    let orchestrator = Orchestrator::new(&registry, &ledger, &clock, HashAlgorithm::Sha256);

    let mid_tier = VerificationContext {
        verified: true,
        role: Role::Assistant,
        role_level: 2,
        ..VerificationContext::public()
    };
    let run = orchestrator
        .run_single_stage(
            &config_for("disclaimer"),
            &mid_tier,
            &ScopeGateConfig::default(),
            &anchors(),
            "query",
        )
        .await
        .expect("run");

    assert_eq!(run.status, ConsensusStatus::Rewrite);
    assert!(run.output.expect("output").answer.contains("general information only"));
}

// ============================================================================
// SECTION: Two-Stage Flow
// ============================================================================

/// Debate config over the given defender/critic/synthesizer providers.
fn debate_config(defender: &str, critic: &str, synthesizer: &str) -> ConsensusConfig {
    ConsensusConfig {
        profile_name: Some("CONSENSUS".to_string()),
        primary: ModelSpec::new(defender, format!("{defender}-model")),
        validators: Vec::new(),
        primary_temperature: 0.0,
        primary_timeout_s: 5,
        max_repair_attempts: 1,
        prompts: default_prompts(),
        enable_debate: true,
        debate: Some(DebateConfig {
            defender_model: ModelSpec::new(defender, format!("{defender}-model")),
            critic_model: ModelSpec::new(critic, format!("{critic}-model")),
            synthesizer_model: ModelSpec::new(synthesizer, format!("{synthesizer}-model")),
        }),
    }
}

/// The full debate flow synthesizes and orders ledger events.
#[tokio::test]
async fn two_stage_flow_synthesizes() {
    let registry = registry();
    let ledger = MemoryLedger::new();
    let clock = FixedClock::at_millis(1_000);
    let orchestrator = Orchestrator::new(&registry, &ledger, &clock, HashAlgorithm::Sha256);

    let run = orchestrator
        .run_two_stage(
            &debate_config("echo", "echo", "echo"),
            &pro_context(),
            &ScopeGateConfig::default(),
            &anchors(),
            "Weigh the tradeoffs of caching.",
        )
        .await
        .expect("run");

    assert_eq!(run.status, ConsensusStatus::Pass);
    assert!(run.synthesized.is_some());
    assert!(run.defender.is_some());
    assert!(run.critic.is_some());
    assert!(!run.defender_raw.is_empty());
    assert!(!run.critic_raw.is_empty());

    let events = ledger.snapshot().expect("snapshot");
    let stages: Vec<&str> = events.iter().map(|event| event.stage.as_str()).collect();
    assert_eq!(stages, vec![
        "start",
        "primary.raw",
        "debate.defender.raw",
        "debate.critic.raw",
        "synthesizer.raw",
        "scope_gate.pass",
        "end",
    ]);
}

/// A critic parse failure returns a structured failure with both raws.
#[tokio::test]
async fn two_stage_parse_failure_preserves_raws() {
    let registry = registry();
    let ledger = MemoryLedger::new();
    let clock = FixedClock::at_millis(1_000);
    let orchestrator = Orchestrator::new(&registry, &ledger, &clock, HashAlgorithm::Sha256);

    let run = orchestrator
        .run_two_stage(
            &debate_config("echo", "alwaysbad", "echo"),
            &pro_context(),
            &ScopeGateConfig::default(),
            &anchors(),
            "query",
        )
        .await
        .expect("run");

    assert_eq!(run.status, ConsensusStatus::Refuse);
    assert_eq!(run.failure.as_deref(), Some("PARSE_FAILED"));
    assert!(run.defender.is_some());
    assert!(run.critic.is_none());
    assert_eq!(run.critic_raw, "garbage output");
    assert!(!run.defender_raw.is_empty());
}
