// crates/trustplane-adapters/src/scripted.rs
// ============================================================================
// Module: Trustplane Scripted Adapter
// Description: Replay-canned responses and failures in order.
// Purpose: Exercise repair loops, timeouts, and error taxonomy in tests.
// Dependencies: async-trait, serde_json, trustplane-consensus, trustplane-core
// ============================================================================

//! ## Overview
//! The scripted adapter pops one step per call: a canned raw response or a
//! tagged failure. An exhausted script fails closed. The scripted text
//! generator mirrors the same idea for the kernel's blocking TDM path, which
//! is how validation-retry and fail-closed behavior get driven in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;

use trustplane_consensus::Adapter;
use trustplane_consensus::AdapterError;
use trustplane_consensus::AdapterFactory;
use trustplane_core::interfaces::GeneratedText;
use trustplane_core::interfaces::GenerationConfig;
use trustplane_core::interfaces::GenerationError;
use trustplane_core::interfaces::TextGenerator;

// ============================================================================
// SECTION: Script Steps
// ============================================================================

/// One scripted adapter step.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Return this raw response text.
    Respond(String),
    /// Fail with this tagged adapter error.
    Fail(AdapterError),
}

// ============================================================================
// SECTION: Scripted Adapter
// ============================================================================

/// Adapter replaying a fixed sequence of responses and failures.
#[derive(Debug)]
pub struct ScriptedAdapter {
    /// Model identifier reported in metadata.
    model: String,
    /// Remaining script steps.
    steps: Mutex<VecDeque<ScriptStep>>,
}

impl ScriptedAdapter {
    /// Creates a scripted adapter from ordered steps.
    #[must_use]
    pub fn new(model: impl Into<String>, steps: Vec<ScriptStep>) -> Self {
        Self {
            model: model.into(),
            steps: Mutex::new(steps.into()),
        }
    }

    /// Remaining (unconsumed) step count.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.steps.lock().map(|steps| steps.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _temperature: f64,
        _timeout_s: u64,
        _extra: &Value,
    ) -> Result<(String, Value), AdapterError> {
        let step = self
            .steps
            .lock()
            .map_err(|_| AdapterError::Other("script lock poisoned".into()))?
            .pop_front();
        match step {
            Some(ScriptStep::Respond(raw)) => {
                Ok((raw, json!({ "provider": "scripted", "model": self.model })))
            }
            Some(ScriptStep::Fail(err)) => Err(err),
            None => Err(AdapterError::Other("script exhausted".into())),
        }
    }
}

/// Builds a registry factory serving one shared scripted adapter.
#[must_use]
pub fn scripted_factory(adapter: Arc<ScriptedAdapter>) -> AdapterFactory {
    Arc::new(move |_spec| {
        let shared: Arc<dyn Adapter> = adapter.clone();
        Ok(shared)
    })
}

// ============================================================================
// SECTION: Scripted Text Generator
// ============================================================================

/// Blocking generator replaying canned TDM responses in order.
#[derive(Debug)]
pub struct ScriptedTextGenerator {
    /// Remaining responses.
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedTextGenerator {
    /// Creates a generator from ordered responses.
    #[must_use]
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

impl TextGenerator for ScriptedTextGenerator {
    fn generate(
        &self,
        _prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GeneratedText, GenerationError> {
        let next = self
            .responses
            .lock()
            .map_err(|_| GenerationError::Provider("script lock poisoned".into()))?
            .pop_front();
        next.map_or_else(
            || Err(GenerationError::Provider("script exhausted".into())),
            |text| {
                Ok(GeneratedText {
                    text,
                    provider: "scripted".to_string(),
                    model: config.model.clone(),
                    usage: json!({}),
                })
            },
        )
    }
}
