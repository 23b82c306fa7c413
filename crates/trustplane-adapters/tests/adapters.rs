// crates/trustplane-adapters/tests/adapters.rs
// ============================================================================
// Module: Adapter Tests
// Description: Mock anchor echo, scripted ordering, registry caching.
// ============================================================================
//! ## Overview
//! The mock adapter must echo anchors inside valid schema JSON; the scripted
//! adapter replays steps in order and fails closed when exhausted; the
//! registry caches instances by provider and model.

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

use serde_json::json;
use trustplane_adapters::MockAdapter;
use trustplane_adapters::MockTextGenerator;
use trustplane_adapters::ScriptStep;
use trustplane_adapters::ScriptedAdapter;
use trustplane_adapters::default_registry;
use trustplane_consensus::Adapter;
use trustplane_consensus::AdapterError;
use trustplane_consensus::ModelSpec;
use trustplane_consensus::parse_primary_output;
use trustplane_consensus::parse_synthesizer_output;
use trustplane_core::interfaces::GenerationConfig;
use trustplane_core::interfaces::TextGenerator;
use trustplane_core::runtime::validator::validate_json_schema;

/// The mock echoes prompt anchors inside a valid PrimaryOutput.
#[tokio::test]
async fn mock_adapter_echoes_anchors() {
    let adapter = MockAdapter::new("mock-llm");
    let prompt = "RUN_ID=run-42 EPACK=ep-42 ARU=ANSWER.\nUser query:\nhello\n";
    let (raw, meta) = adapter.generate_text(prompt, 0.0, 5, &json!({})).await.expect("call");

    let parsed = parse_primary_output(&raw).expect("parse");
    assert_eq!(parsed.run_id, "run-42");
    assert_eq!(parsed.epack, "ep-42");
    assert_eq!(parsed.aru, "ANSWER");
    assert_eq!(meta["provider"], json!("mock"));
}

/// Prompts naming SynthesizerOutput get the synthesizer shape.
#[tokio::test]
async fn mock_adapter_is_schema_aware() {
    let adapter = MockAdapter::new("mock-llm");
    let prompt =
        "Return ONLY valid JSON for SynthesizerOutput.\nRUN_ID=run-1 EPACK=ep-1 ARU=CONSENSUS.";
    let (raw, _meta) = adapter.generate_text(prompt, 0.0, 5, &json!({})).await.expect("call");
    assert!(parse_synthesizer_output(&raw).is_ok());
}

/// Scripted steps replay in order and fail closed when exhausted.
#[tokio::test]
async fn scripted_adapter_replays_in_order() {
    let adapter = ScriptedAdapter::new("scripted-llm", vec![
        ScriptStep::Respond("first".to_string()),
        ScriptStep::Fail(AdapterError::RateLimit("slow down".to_string())),
        ScriptStep::Respond("second".to_string()),
    ]);

    let (first, _) = adapter.generate_text("p", 0.0, 5, &json!({})).await.expect("first");
    assert_eq!(first, "first");

    let failure = adapter.generate_text("p", 0.0, 5, &json!({})).await;
    assert!(matches!(failure, Err(AdapterError::RateLimit(_))));

    let (second, _) = adapter.generate_text("p", 0.0, 5, &json!({})).await.expect("second");
    assert_eq!(second, "second");
    assert_eq!(adapter.remaining(), 0);

    let exhausted = adapter.generate_text("p", 0.0, 5, &json!({})).await;
    assert!(matches!(exhausted, Err(AdapterError::Other(_))));
}

/// The default registry serves cached mock instances.
#[test]
fn default_registry_caches_by_provider_and_model() {
    let registry = default_registry();
    assert_eq!(registry.providers(), vec!["mock".to_string()]);

    let spec = ModelSpec::new("mock", "mock-llm");
    let first = registry.build(&spec).expect("build");
    let second = registry.build(&spec).expect("build");
    assert!(Arc::ptr_eq(&first, &second));

    assert!(registry.build(&ModelSpec::new("unknown", "x")).is_err());
}

/// The blocking mock generator emits strict TDM JSON.
#[test]
fn mock_text_generator_emits_strict_json() {
    let generated = MockTextGenerator
        .generate("prompt body\nUSER:\nWhat is photosynthesis?\n", &GenerationConfig {
            model: "mock-llm".to_string(),
            temperature: 0.0,
            max_tokens: 900,
        })
        .expect("generate");

    let (ok, obj, reason) = validate_json_schema(&generated.text);
    assert!(ok, "expected valid TDM JSON, got {reason}");
    assert!(obj["text"].as_str().expect("text").contains("photosynthesis"));
}
