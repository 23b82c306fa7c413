// crates/trustplane-consensus/src/schemas.rs
// ============================================================================
// Module: Trustplane Consensus Schemas
// Description: Strict output schemas for primary, validator, synthesizer.
// Purpose: Parse model output deterministically with closed key sets.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Consensus role outputs are strict JSON objects with closed key sets
//! (`deny_unknown_fields`). Parsing is tolerant only about surrounding prose:
//! when a direct parse fails, the first `{` .. last `}` span is retried once.
//! Confidence values are range-checked after parsing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Primary Output
// ============================================================================

/// Primary-role output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrimaryOutput {
    /// Run identifier echoed by the model (anchor).
    pub run_id: String,
    /// EPACK identifier echoed by the model (anchor).
    pub epack: String,
    /// ARU label (e.g. `ANSWER`).
    pub aru: String,
    /// User-facing answer.
    pub answer: String,
    /// Reasoning trace lines.
    #[serde(default)]
    pub reasoning_trace: Vec<String>,
    /// Structured claims made by the answer.
    #[serde(default)]
    pub claims: Vec<Value>,
    /// Overall confidence in [0, 1].
    #[serde(default = "default_confidence")]
    pub overall_confidence: f64,
    /// Uncertainty flags raised by the model.
    #[serde(default)]
    pub uncertainty_flags: Vec<String>,
    /// Suggested next step, if any.
    #[serde(default)]
    pub next_step: Option<String>,
}

// ============================================================================
// SECTION: Validator Output
// ============================================================================

/// Validator verdict on the primary output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidatorVerdict {
    /// The validator agrees with the primary.
    Agree,
    /// The validator disagrees with the primary.
    Disagree,
    /// The validator is uncertain.
    #[default]
    Uncertain,
}

/// Validator-role output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorOutput {
    /// Run identifier echoed by the model (anchor).
    pub run_id: String,
    /// EPACK identifier echoed by the model (anchor).
    pub epack: String,
    /// ARU label.
    pub aru: String,
    /// Validator verdict.
    #[serde(default)]
    pub verdict: ValidatorVerdict,
    /// Free-form validator notes.
    #[serde(default)]
    pub notes: String,
    /// Validator confidence in [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

// ============================================================================
// SECTION: Synthesizer Output
// ============================================================================

/// Synthesizer-role output schema (arbiter of the two-stage flow).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynthesizerOutput {
    /// Run identifier echoed by the model (anchor).
    pub run_id: String,
    /// EPACK identifier echoed by the model (anchor).
    pub epack: String,
    /// ARU label.
    pub aru: String,
    /// Synthesized final answer.
    pub answer: String,
    /// Reasoning trace lines.
    #[serde(default)]
    pub reasoning_trace: Vec<String>,
    /// Overall confidence in [0, 1].
    #[serde(default = "default_confidence")]
    pub overall_confidence: f64,
}

/// Default confidence when the model omits the field.
const fn default_confidence() -> f64 {
    0.5
}

// ============================================================================
// SECTION: Tolerant Parsing
// ============================================================================

/// Extracts the first JSON object span from mixed text.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start { Some(&text[start..=end]) } else { None }
}

/// Parses a strict schema from raw model text.
///
/// Tries a direct parse first, then the first `{` .. last `}` span.
///
/// # Errors
///
/// Returns the parse error string when both attempts fail or the confidence
/// range check fails.
pub fn parse_schema<T>(raw: &str, confidence_of: fn(&T) -> f64) -> Result<T, String>
where
    T: for<'de> Deserialize<'de>,
{
    let direct: Result<T, _> = serde_json::from_str(raw);
    let parsed = match direct {
        Ok(parsed) => Ok(parsed),
        Err(first_err) => extract_json_object(raw).map_or_else(
            || Err(first_err.to_string()),
            |span| serde_json::from_str::<T>(span).map_err(|err| err.to_string()),
        ),
    }?;
    let confidence = confidence_of(&parsed);
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("confidence out of range: {confidence}"));
    }
    Ok(parsed)
}

/// Parses a [`PrimaryOutput`] from raw model text.
///
/// # Errors
///
/// Returns the parse error string on schema mismatch.
pub fn parse_primary_output(raw: &str) -> Result<PrimaryOutput, String> {
    parse_schema(raw, |output: &PrimaryOutput| output.overall_confidence)
}

/// Parses a [`ValidatorOutput`] from raw model text.
///
/// # Errors
///
/// Returns the parse error string on schema mismatch.
pub fn parse_validator_output(raw: &str) -> Result<ValidatorOutput, String> {
    parse_schema(raw, |output: &ValidatorOutput| output.confidence)
}

/// Parses a [`SynthesizerOutput`] from raw model text.
///
/// # Errors
///
/// Returns the parse error string on schema mismatch.
pub fn parse_synthesizer_output(raw: &str) -> Result<SynthesizerOutput, String> {
    parse_schema(raw, |output: &SynthesizerOutput| output.overall_confidence)
}
