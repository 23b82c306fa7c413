// crates/trustplane-adapters/src/mock.rs
// ============================================================================
// Module: Trustplane Mock Adapter
// Description: Deterministic schema-aware adapter and text generator.
// Purpose: Round-trip the orchestrator and kernel without any network.
// Dependencies: async-trait, serde_json, trustplane-consensus, trustplane-core
// ============================================================================

//! ## Overview
//! The mock adapter reads the anchor variables out of the prompt and echoes
//! them back inside a valid schema object, so anchored flows verify end to
//! end. Prompts that name `SynthesizerOutput` get the synthesizer shape;
//! everything else gets the primary shape. The mock text generator produces
//! strict TDM JSON for the kernel's blocking path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;

use trustplane_consensus::Adapter;
use trustplane_consensus::AdapterError;
use trustplane_core::interfaces::GeneratedText;
use trustplane_core::interfaces::GenerationConfig;
use trustplane_core::interfaces::GenerationError;
use trustplane_core::interfaces::TextGenerator;

// ============================================================================
// SECTION: Anchor Extraction
// ============================================================================

/// Extracts an `KEY=value` assignment from a prompt.
fn extract_assignment(prompt: &str, key: &str) -> String {
    let marker = format!("{key}=");
    prompt.find(&marker).map_or_else(String::new, |start| {
        let rest = &prompt[start + marker.len()..];
        rest.split([' ', '\n', '.']).next().unwrap_or("").to_string()
    })
}

// ============================================================================
// SECTION: Mock Adapter
// ============================================================================

/// Disclaimer embedded in mock answers so low-tier scope gates pass.
const MOCK_DISCLAIMER: &str =
    "This is general information only and not professional advice. Consult a qualified expert.";

/// Deterministic, anchor-echoing mock adapter.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    /// Model identifier reported in metadata.
    model: String,
}

impl MockAdapter {
    /// Creates a mock adapter for a model identifier.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_text(
        &self,
        prompt: &str,
        _temperature: f64,
        _timeout_s: u64,
        _extra: &Value,
    ) -> Result<(String, Value), AdapterError> {
        let run_id = extract_assignment(prompt, "RUN_ID");
        let epack = extract_assignment(prompt, "EPACK");
        let aru = extract_assignment(prompt, "ARU");
        let answer = format!("{MOCK_DISCLAIMER} Mock consensus answer for run {run_id}.");

        let body = if prompt.contains("SynthesizerOutput") {
            json!({
                "run_id": run_id,
                "epack": epack,
                "aru": aru,
                "answer": answer,
                "reasoning_trace": ["mock synthesis"],
                "overall_confidence": 0.9,
            })
        } else {
            json!({
                "run_id": run_id,
                "epack": epack,
                "aru": aru,
                "answer": answer,
                "reasoning_trace": ["mock reasoning"],
                "claims": [],
                "overall_confidence": 0.9,
                "uncertainty_flags": [],
                "next_step": null,
            })
        };

        let raw = serde_json::to_string(&body)
            .map_err(|err| AdapterError::Other(err.to_string()))?;
        Ok((raw, json!({ "provider": "mock", "model": self.model })))
    }
}

// ============================================================================
// SECTION: Mock Text Generator
// ============================================================================

/// Deterministic strict-JSON generator for the kernel TDM path.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockTextGenerator;

impl TextGenerator for MockTextGenerator {
    fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GeneratedText, GenerationError> {
        let user_text = prompt.rsplit("USER:\n").next().unwrap_or("").trim();
        let preview: String = user_text.chars().take(120).collect();
        let body = json!({
            "text": format!("Mock governed answer regarding: {preview}"),
            "disclosure": "Deterministic mock output.",
            "citations": [],
            "assumptions": [],
        });
        let text = serde_json::to_string(&body)
            .map_err(|err| GenerationError::Provider(err.to_string()))?;
        Ok(GeneratedText {
            text,
            provider: "mock".to_string(),
            model: config.model.clone(),
            usage: json!({ "prompt_chars": prompt.len() }),
        })
    }
}
