// crates/trustplane-consensus/src/config.rs
// ============================================================================
// Module: Trustplane Consensus Configuration
// Description: Model specs, prompt bundles, debate config, and presets.
// Purpose: Configure consensus regimes per assurance level and role tier.
// Dependencies: crate::verification, serde, serde_json
// ============================================================================

//! ## Overview
//! A `ConsensusConfig` names the primary model, validator set, prompt
//! templates, timeout, and repair budget for one consensus run. Presets
//! cover the four regimes (FAST, HIGH_ASSURANCE, CONSENSUS, and
//! per-verification-role routing); prompt templates carry the anchor
//! variables the orchestrator substitutes before each call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::verification::VerificationContext;

// ============================================================================
// SECTION: ARU
// ============================================================================

/// Atomic Requested Unit: the kind of governed turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aru {
    /// Answer generation.
    #[default]
    Answer,
    /// Verification of a prior answer.
    Verify,
    /// Refusal turn.
    Refuse,
    /// Multi-role consensus turn.
    Consensus,
}

impl Aru {
    /// Canonical wire name of the ARU.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Answer => "ANSWER",
            Self::Verify => "VERIFY",
            Self::Refuse => "REFUSE",
            Self::Consensus => "CONSENSUS",
        }
    }
}

// ============================================================================
// SECTION: Model Spec
// ============================================================================

/// A provider/model pair with optional overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Provider name (adapter registry key).
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Model family label, if known.
    #[serde(default)]
    pub family: Option<String>,
    /// Per-model timeout override in seconds.
    #[serde(default)]
    pub timeout_s: Option<u64>,
    /// Provider-specific extras forwarded to the adapter.
    #[serde(default = "empty_object")]
    pub extra: Value,
}

impl ModelSpec {
    /// Creates a spec with no overrides.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            family: None,
            timeout_s: None,
            extra: json!({}),
        }
    }
}

/// Empty extras object default.
fn empty_object() -> Value {
    json!({})
}

// ============================================================================
// SECTION: Prompt Bundle
// ============================================================================

/// Anchor variables substituted into prompt templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAnchors<'a> {
    /// Run identifier the model must echo.
    pub run_id: &'a str,
    /// EPACK identifier the model must echo.
    pub epack: &'a str,
    /// ARU label for the turn.
    pub aru: &'a str,
}

/// Primary and repair prompt templates.
///
/// Templates may reference `{RUN_ID}`, `{EPACK}`, `{ARU}`, `{USER_QUERY}`,
/// `{VERIFIED}`, `{ROLE}`, `{ROLE_LEVEL}`, `{SCOPE}`, and `{BAD_TEXT}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBundle {
    /// Template for the primary call.
    pub primary_template: String,
    /// Template for the JSON-repair call.
    pub repair_template: String,
}

impl PromptBundle {
    /// Renders the primary prompt with anchors and verification context.
    #[must_use]
    pub fn render_primary(
        &self,
        anchors: &PromptAnchors<'_>,
        verification: &VerificationContext,
        user_query: &str,
    ) -> String {
        self.primary_template
            .replace("{RUN_ID}", anchors.run_id)
            .replace("{EPACK}", anchors.epack)
            .replace("{ARU}", anchors.aru)
            .replace("{VERIFIED}", &verification.verified.to_string())
            .replace("{ROLE}", verification.role.as_str())
            .replace("{ROLE_LEVEL}", &verification.role_level.to_string())
            .replace("{SCOPE}", verification.scope.as_deref().unwrap_or("none"))
            .replace("{USER_QUERY}", user_query)
    }

    /// Renders the repair prompt for invalid model output.
    #[must_use]
    pub fn render_repair(&self, anchors: &PromptAnchors<'_>, bad_text: &str) -> String {
        self.repair_template
            .replace("{RUN_ID}", anchors.run_id)
            .replace("{EPACK}", anchors.epack)
            .replace("{ARU}", anchors.aru)
            .replace("{BAD_TEXT}", bad_text)
    }
}

/// Default prompt bundle demanding strict schema JSON.
#[must_use]
pub fn default_prompts() -> PromptBundle {
    PromptBundle {
        primary_template: "You are the Trustplane consensus layer primary model.\nReturn ONLY \
                           valid JSON for PrimaryOutput with fields: run_id, epack, aru, answer, \
                           reasoning_trace, claims, overall_confidence, uncertainty_flags, \
                           next_step.\nUse these context variables: VERIFIED={VERIFIED} \
                           ROLE={ROLE} ROLE_LEVEL={ROLE_LEVEL} SCOPE={SCOPE}.\nRUN_ID={RUN_ID} \
                           EPACK={EPACK} ARU={ARU}.\nUser query:\n{USER_QUERY}\n"
            .to_string(),
        repair_template: "The following text was supposed to be JSON for PrimaryOutput, but it \
                          was invalid.\nRewrite it as valid JSON ONLY, matching PrimaryOutput \
                          exactly.\nRUN_ID={RUN_ID} EPACK={EPACK} ARU={ARU}.\nInvalid \
                          text:\n{BAD_TEXT}\n"
            .to_string(),
    }
}

// ============================================================================
// SECTION: Debate Configuration
// ============================================================================

/// Role triple for the two-stage debate flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateConfig {
    /// Defender (primary) model.
    pub defender_model: ModelSpec,
    /// Critic (challenger) model.
    pub critic_model: ModelSpec,
    /// Synthesizer (arbiter) model.
    pub synthesizer_model: ModelSpec,
}

// ============================================================================
// SECTION: Consensus Configuration
// ============================================================================

/// Full configuration for one consensus run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Preset profile name, if built from a preset.
    pub profile_name: Option<String>,
    /// Primary model.
    pub primary: ModelSpec,
    /// Validator models.
    pub validators: Vec<ModelSpec>,
    /// Primary sampling temperature.
    pub primary_temperature: f64,
    /// Primary call timeout in seconds.
    pub primary_timeout_s: u64,
    /// Maximum JSON-repair attempts.
    pub max_repair_attempts: u32,
    /// Prompt templates.
    pub prompts: PromptBundle,
    /// Whether the two-stage debate flow runs.
    pub enable_debate: bool,
    /// Debate role triple when enabled.
    pub debate: Option<DebateConfig>,
}

impl ConsensusConfig {
    /// FAST preset: primary only, one repair, at most one validator.
    #[must_use]
    pub fn preset_fast(
        prompts: PromptBundle,
        primary: ModelSpec,
        validators: Vec<ModelSpec>,
    ) -> Self {
        Self {
            profile_name: Some("FAST".to_string()),
            primary,
            validators: validators.into_iter().take(1).collect(),
            primary_temperature: 0.0,
            primary_timeout_s: 35,
            max_repair_attempts: 1,
            prompts,
            enable_debate: false,
            debate: None,
        }
    }

    /// HIGH_ASSURANCE preset: primary plus at most two validators.
    #[must_use]
    pub fn preset_high_assurance(
        prompts: PromptBundle,
        primary: ModelSpec,
        validators: Vec<ModelSpec>,
    ) -> Self {
        Self {
            profile_name: Some("HIGH_ASSURANCE".to_string()),
            primary,
            validators: validators.into_iter().take(2).collect(),
            primary_temperature: 0.0,
            primary_timeout_s: 60,
            max_repair_attempts: 2,
            prompts,
            enable_debate: false,
            debate: None,
        }
    }

    /// CONSENSUS preset: primary plus at most three validators, optional
    /// debate triple.
    #[must_use]
    pub fn preset_consensus(
        prompts: PromptBundle,
        primary: ModelSpec,
        validators: Vec<ModelSpec>,
        debate: Option<DebateConfig>,
    ) -> Self {
        Self {
            profile_name: Some("CONSENSUS".to_string()),
            primary,
            validators: validators.into_iter().take(3).collect(),
            primary_temperature: 0.0,
            primary_timeout_s: 75,
            max_repair_attempts: 2,
            prompts,
            enable_debate: debate.is_some(),
            debate,
        }
    }

    /// Maps a caller's verification role level to a preset regime.
    ///
    /// Unverified or level <= 1 callers get FAST, level 2 gets
    /// HIGH_ASSURANCE, level >= 3 gets CONSENSUS.
    #[must_use]
    pub fn preset_for_verification(
        prompts: PromptBundle,
        primary: ModelSpec,
        validators: Vec<ModelSpec>,
        verification: &VerificationContext,
        debate: Option<DebateConfig>,
    ) -> Self {
        if !verification.verified || verification.role_level <= 1 {
            return Self::preset_fast(prompts, primary, validators);
        }
        if verification.role_level == 2 {
            return Self::preset_high_assurance(prompts, primary, validators);
        }
        Self::preset_consensus(prompts, primary, validators, debate)
    }
}
