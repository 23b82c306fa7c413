// crates/trustplane-api/src/server.rs
// ============================================================================
// Module: Trustplane API Server
// Description: Axum router and handlers for the governance surface.
// Purpose: Expose query, verification, replay, policy, and resilience.
// Dependencies: crate::*, axum, trustplane-* crates
// ============================================================================

//! ## Overview
//! The HTTP surface is a thin shell over the kernel: every governed call
//! lands in the single turn-engine entry point, sessions are serialized
//! behind per-session locks, and verification endpoints never touch a model.
//! In v9 mode each sealed turn also feeds the resilience loop, whose
//! transitions are emitted into the shared stage-event ledger.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use trustplane_adapters::MockTextGenerator;
use trustplane_adapters::default_registry;
use trustplane_config::KernelMode;
use trustplane_config::LoadedPolicy;
use trustplane_config::Settings;
use trustplane_config::load_policy;
use trustplane_consensus::AdapterRegistry;
use trustplane_core::DeterministicEmbedder;
use trustplane_core::EngineConfig;
use trustplane_core::EpackRecord;
use trustplane_core::HashError;
use trustplane_core::JsonlEpackSink;
use trustplane_core::LedgerError;
use trustplane_core::MemoryLedger;
use trustplane_core::ReplayOptions;
use trustplane_core::SessionState;
use trustplane_core::TurnEngine;
use trustplane_core::constitution;
use trustplane_core::interfaces::Clock;
use trustplane_core::interfaces::GenerationConfig;
use trustplane_core::interfaces::SystemClock;
use trustplane_core::replay_chain;
use trustplane_core::replay_record;
use trustplane_core::replay_summary;
use trustplane_core::runtime::ToolRegistry;
use trustplane_resilience::OutcomeStatus;
use trustplane_resilience::RecoveryEngine;
use trustplane_resilience::RecoveryState;
use trustplane_resilience::ResilienceRuntime;
use trustplane_resilience::SystemStatus;
use trustplane_resilience::TrustSnapshot;
use trustplane_resilience::compile_resilience_policy;
use trustplane_resilience::events::emit_recovery_applied;
use trustplane_resilience::events::emit_recovery_decision;
use trustplane_resilience::events::emit_recovery_triggered;

use crate::metrics::GovernanceMetrics;
use crate::receipt::sign_receipt;
use crate::schema_registry;

// ============================================================================
// SECTION: State
// ============================================================================

/// Concrete turn-engine type served by the API.
pub type KernelEngine =
    TurnEngine<MockTextGenerator, JsonlEpackSink, SystemClock, DeterministicEmbedder>;

/// Shared server state.
pub struct AppState {
    /// Captured environment settings.
    pub settings: Settings,
    /// Active policy plus validation errors.
    pub policy: LoadedPolicy,
    /// The governance kernel.
    pub engine: KernelEngine,
    /// Per-session state behind per-session locks.
    pub sessions: Mutex<BTreeMap<String, Arc<Mutex<SessionState>>>>,
    /// Governance dashboard counters.
    pub metrics: GovernanceMetrics,
    /// Shared hash-chained stage-event ledger.
    pub ledger: Arc<MemoryLedger>,
    /// Shared adapter registry.
    pub registry: AdapterRegistry,
    /// Compiled resilience runtime (v9 mode).
    pub resilience: Mutex<Option<ResilienceRuntime>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").field("settings", &self.settings).finish_non_exhaustive()
    }
}

/// Builds server state from captured settings.
///
/// # Errors
///
/// Returns [`HashError`] when manifest sealing fails.
pub fn build_state(settings: Settings) -> Result<AppState, HashError> {
    let policy = load_policy(&settings.policy_path);

    let engine_config = EngineConfig {
        hash_algorithm: settings.hash_algorithm,
        stage2_threshold: settings.stage2_threshold,
        embeddings_model: settings.embeddings_model.clone(),
        generation: GenerationConfig {
            model: settings.model.clone(),
            temperature: 0.0,
            max_tokens: 900,
        },
        redact_mode: settings.redact_mode,
        persist_epacks: settings.persist_epacks,
        require_evidence_citations: settings.require_evidence_citations,
        auto_citation_notice: settings.auto_citation_notice,
    };
    let engine = TurnEngine::new(
        MockTextGenerator,
        JsonlEpackSink::new(&settings.epack_store_path),
        SystemClock,
        DeterministicEmbedder,
        ToolRegistry::with_builtins(),
        engine_config,
    )?;

    let resilience = if settings.kernel_mode == KernelMode::V9 {
        compile_resilience_policy(&policy.document.resilience_policy).runtime
    } else {
        None
    };

    Ok(AppState {
        settings,
        policy,
        engine,
        sessions: Mutex::new(BTreeMap::new()),
        metrics: GovernanceMetrics::new(),
        ledger: Arc::new(MemoryLedger::new()),
        registry: default_registry(),
        resilience: Mutex::new(resilience),
    })
}

/// Builds the API router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/constitution", get(constitution_endpoint))
        .route("/schemas", get(schemas))
        .route("/schema/{name}", get(schema))
        .route("/metrics", get(metrics))
        .route("/manifest", get(manifest))
        .route("/policy", get(policy))
        .route("/verify-chain", post(verify_chain))
        .route("/replay", post(replay))
        .route("/query", post(query))
        .route("/resilience/decide", post(resilience_decide))
        .with_state(state)
}

// ============================================================================
// SECTION: Read Endpoints
// ============================================================================

/// GET `/`: liveness, version, and feature flags.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let manifest = state.engine.manifest();
    Json(json!({
        "status": "Trustplane running",
        "version": manifest.kernel_version,
        "product": manifest.product_name,
        "kernel_mode": if state.settings.kernel_mode == KernelMode::V9 { "v9" } else { "v8" },
        "features": {
            "consensus_two_stage": manifest.consensus_two_stage,
            "challenger": manifest.challenger,
            "replay_engine": manifest.replay_engine,
            "governance_dsl": manifest.governance_dsl,
            "resilience_runtime": manifest.resilience_runtime,
        },
        "adapters": state.registry.providers(),
    }))
}

/// GET `/constitution`: machine-readable invariants and stable hash.
async fn constitution_endpoint() -> Result<Json<Value>, StatusCode> {
    let hash =
        constitution::constitution_hash().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({
        "constitution_hash": hash,
        "invariant_count": constitution::CONSTITUTION.len(),
        "invariants": constitution::CONSTITUTION.as_slice(),
    })))
}

/// GET `/schemas`: every versioned schema object.
async fn schemas() -> Json<Value> {
    Json(json!({ "schemas": schema_registry::all_schemas() }))
}

/// GET `/schema/{name}`: one schema object by name.
async fn schema(Path(name): Path<String>) -> Result<Json<Value>, StatusCode> {
    schema_registry::get_schema(&name).map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// GET `/metrics`: governance dashboard counters.
async fn metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.metrics.snapshot()))
}

/// GET `/manifest`: sealed build manifest.
async fn manifest(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.engine.manifest()))
}

/// GET `/policy`: active policy plus validation errors.
async fn policy(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "policy": state.policy.document,
        "validation_errors": state.policy.errors,
    }))
}

// ============================================================================
// SECTION: Verification Endpoints
// ============================================================================

/// Body for `/verify-chain`.
#[derive(Debug, Deserialize)]
struct VerifyChainBody {
    /// Inline EPACK chain to verify.
    chain: Vec<EpackRecord>,
}

/// POST `/verify-chain`: chain hash and linkage verification.
async fn verify_chain(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyChainBody>,
) -> Json<Value> {
    let result = constitution::check_hash_chain_integrity(
        state.settings.hash_algorithm,
        &body.chain,
    );
    let errors: Vec<String> = if result.passed { Vec::new() } else { vec![result.message.clone()] };
    Json(json!({ "valid": result.passed, "errors": errors }))
}

/// Body for `/replay`.
#[derive(Debug, Deserialize)]
struct ReplayBody {
    /// Full chain to replay (preferred).
    #[serde(default)]
    chain: Option<Vec<EpackRecord>>,
    /// Single record to replay.
    #[serde(default)]
    record: Option<EpackRecord>,
    /// Expected previous hash for single-record replay.
    #[serde(default)]
    expected_prev_hash: Option<String>,
}

/// POST `/replay`: offline replay with summary classification.
async fn replay(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReplayBody>,
) -> Result<Json<Value>, StatusCode> {
    let options = ReplayOptions {
        algorithm: state.settings.hash_algorithm,
        ..ReplayOptions::default()
    };

    if let Some(chain) = body.chain {
        let results = replay_chain(&chain, &options);
        for result in &results {
            state.metrics.record_replay(result.outcome);
        }
        let summary = replay_summary(&results);
        return Ok(Json(json!({ "results": results, "summary": summary })));
    }

    let record = body.record.ok_or(StatusCode::BAD_REQUEST)?;
    let single_options = ReplayOptions {
        algorithm: state.settings.hash_algorithm,
        expected_prev_hash: body.expected_prev_hash.as_deref(),
        ..ReplayOptions::default()
    };
    let result = replay_record(&record, &single_options);
    state.metrics.record_replay(result.outcome);
    Ok(Json(json!({ "result": result })))
}

// ============================================================================
// SECTION: Query Endpoint
// ============================================================================

/// Body for `/query`.
#[derive(Debug, Deserialize)]
struct QueryBody {
    /// User turn text.
    text: String,
    /// Session identifier (defaults to a shared demo session).
    #[serde(default)]
    session_id: Option<String>,
}

/// Classifies an assistant reply into a stable status label.
fn classify_reply(text: &str) -> &'static str {
    if text.starts_with("BOUND:") {
        "BOUND"
    } else if text.starts_with("DEFER:") {
        "DEFER"
    } else if text.starts_with("CLARIFY:") {
        "CLARIFY"
    } else if text.starts_with("REFLECT") {
        "REFLECT"
    } else if text.starts_with("SCAFFOLD") {
        "SCAFFOLD"
    } else {
        "PASS"
    }
}

/// POST `/query`: run a governed query end to end.
async fn query(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryBody>,
) -> Result<Json<Value>, StatusCode> {
    let session_id = body.session_id.unwrap_or_else(|| "api-session".to_string());

    let session_lock = {
        let mut sessions =
            state.sessions.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        Arc::clone(
            sessions
                .entry(session_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(SessionState::new(session_id.clone())))),
        )
    };

    let outcome = {
        let mut session =
            session_lock.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        state
            .engine
            .handle_turn(&mut session, &body.text)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    };

    let status = classify_reply(&outcome.assistant_text);
    let route = outcome
        .epack
        .payload
        .get("extra")
        .and_then(|extra| extra.get("route"))
        .and_then(|route| route.get("seq"))
        .and_then(Value::as_array)
        .and_then(|seq| seq.first())
        .and_then(Value::as_str)
        .unwrap_or(status)
        .to_string();
    state.metrics.record_turn(&route, &outcome.assistant_text);

    drive_resilience(&state, status, &outcome.epack.hash)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let run_id = outcome
        .epack
        .payload
        .get("decision_object")
        .and_then(|decision| decision.get("decision_id"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let receipt = sign_receipt(&state.settings.epack_signing_key, &outcome.epack.hash);

    Ok(Json(json!({
        "status": status,
        "final": outcome.assistant_text,
        "result": {
            "seq": outcome.epack.seq,
            "hash": outcome.epack.hash,
            "payload_hash": outcome.epack.payload_hash,
        },
        "models": [state.settings.model],
        "run_id": run_id,
        "epack": outcome.epack.hash,
        "receipt": receipt,
    })))
}

/// Feeds a sealed turn into the v9 resilience loop, emitting ledger events.
///
/// Every recovery transition must land in the hash-chained ledger; a failed
/// append is surfaced to the caller, never dropped.
fn drive_resilience(
    state: &Arc<AppState>,
    status: &str,
    epack_hash: &str,
) -> Result<(), LedgerError> {
    let mut guard = state
        .resilience
        .lock()
        .map_err(|_| LedgerError::Append("resilience lock poisoned".into()))?;
    let Some(runtime) = guard.as_mut() else {
        return Ok(());
    };

    let clock = SystemClock;
    let now_s = clock.unix_seconds();
    let now_ms = clock.unix_millis();

    let outcome_status = match status {
        "BOUND" | "DEFER" => OutcomeStatus::Refuse,
        "CLARIFY" => OutcomeStatus::Error,
        _ => OutcomeStatus::Pass,
    };
    runtime.record_outcome(outcome_status, 0.5, 0, false, now_s);

    let signal = runtime.current_signal(now_s);
    let mut weights = BTreeMap::new();
    weights.insert(state.settings.provider.clone(), 1.0);
    let (density, concentration) = ResilienceRuntime::dependency_metrics(&weights);

    let snapshot = TrustSnapshot {
        tsi_current: signal.tsi_current,
        tsi_forecast_15m: signal.tsi_forecast_15m,
        der_density: density,
        dep_concentration_index: concentration,
        degraded: false,
    };

    if let Some(decision) = runtime.maybe_recover(&snapshot, now_ms) {
        let algorithm = state.settings.hash_algorithm;
        emit_recovery_triggered(
            &state.ledger,
            algorithm,
            &decision.decision_id,
            epack_hash,
            now_ms,
            &decision.reason,
            decision.tsi_before,
            decision.tsi_forecast,
        )?;
        emit_recovery_decision(
            &state.ledger,
            algorithm,
            &decision.decision_id,
            epack_hash,
            now_ms,
            &decision,
        )?;
        if let Some(chosen) = &decision.chosen {
            emit_recovery_applied(
                &state.ledger,
                algorithm,
                &decision.decision_id,
                epack_hash,
                now_ms,
                &chosen.name,
                &chosen.routing_patch,
            )?;
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Resilience Endpoint
// ============================================================================

/// Body for `/resilience/decide`.
#[derive(Debug, Deserialize)]
struct ResilienceDecideBody {
    /// Current TSI.
    tsi_current: f64,
    /// 15-minute TSI forecast.
    tsi_forecast_15m: f64,
    /// Dependency graph density.
    #[serde(default)]
    der_density: f64,
    /// Provider concentration index.
    #[serde(default)]
    concentration_index: f64,
    /// System status label (`ok` / `degraded` / `incident`).
    #[serde(default)]
    system_status: Option<String>,
    /// Recent TSI volatility.
    #[serde(default)]
    oscillation_index: f64,
    /// Decision time in unix milliseconds (defaults to now).
    #[serde(default)]
    now_ms: Option<u64>,
}

/// POST `/resilience/decide`: evaluate a recovery decision without applying.
async fn resilience_decide(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResilienceDecideBody>,
) -> Result<Json<Value>, StatusCode> {
    let system_status = match body.system_status.as_deref() {
        Some("degraded") => SystemStatus::Degraded,
        Some("incident") => SystemStatus::Incident,
        _ => SystemStatus::Ok,
    };
    let recovery_state = RecoveryState {
        tsi_current: body.tsi_current,
        tsi_forecast_15m: body.tsi_forecast_15m,
        der_density: body.der_density,
        concentration_index: body.concentration_index,
        system_status,
        oscillation_index: body.oscillation_index,
    };
    let now_ms = body.now_ms.unwrap_or_else(|| SystemClock.unix_millis());

    let mut guard = state.resilience.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let decision = match guard.as_mut() {
        Some(runtime) => {
            let excluded = runtime.circuit_breaker.excluded_plans(now_ms / 1000);
            runtime.engine.decide(&recovery_state, &runtime.plans, now_ms, &excluded)
        }
        None => {
            let engine = RecoveryEngine::new(
                trustplane_resilience::RecoveryBudgets::default(),
                trustplane_resilience::RecoveryTargets::default(),
            );
            engine.decide(&recovery_state, &[], now_ms, &std::collections::BTreeSet::new())
        }
    };

    Ok(Json(json!({ "decision": decision })))
}
