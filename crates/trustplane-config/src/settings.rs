// crates/trustplane-config/src/settings.rs
// ============================================================================
// Module: Trustplane Environment Settings
// Description: One-shot environment capture for kernel configuration.
// Purpose: Read recognized variables once at startup; never mid-turn.
// Dependencies: trustplane-core, std::env
// ============================================================================

//! ## Overview
//! Settings are captured exactly once at process start and threaded through
//! explicitly. No ambient configuration may be read mid-turn without being
//! captured in the EPACK payload, so there are no lazy or global reads here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use trustplane_core::HashAlgorithm;
use trustplane_core::RedactMode;

// ============================================================================
// SECTION: Kernel Mode
// ============================================================================

/// Kernel operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KernelMode {
    /// Baseline governance loop.
    #[default]
    V8,
    /// Full resilience loop enabled.
    V9,
}

impl KernelMode {
    /// Parses the wire name; unknown values fall back to the baseline.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("v9") { Self::V9 } else { Self::V8 }
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Process-wide settings captured from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Path to the active governance policy document.
    pub policy_path: String,
    /// Kernel operating mode.
    pub kernel_mode: KernelMode,
    /// Default adapter provider.
    pub provider: String,
    /// Default adapter model.
    pub model: String,
    /// Append-only EPACK ledger path.
    pub epack_store_path: String,
    /// Whether sealed records are persisted.
    pub persist_epacks: bool,
    /// Redaction policy for persisted payloads.
    pub redact_mode: RedactMode,
    /// Hash algorithm for chains and ledgers.
    pub hash_algorithm: HashAlgorithm,
    /// HMAC key for receipt signatures (empty disables signing).
    pub epack_signing_key: String,
    /// Stage-2 safety risk threshold.
    pub stage2_threshold: f64,
    /// Embedding model identifier for the stage-2 screen.
    pub embeddings_model: String,
    /// Whether implied evidence claims require citations.
    pub require_evidence_citations: bool,
    /// Whether the citation-integrity notice is appended to cited answers.
    pub auto_citation_notice: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            policy_path: "policies/default.yaml".to_string(),
            kernel_mode: KernelMode::V8,
            provider: "mock".to_string(),
            model: "mock-llm".to_string(),
            epack_store_path: ".trustplane_epacks.jsonl".to_string(),
            persist_epacks: true,
            redact_mode: RedactMode::Hash,
            hash_algorithm: HashAlgorithm::Sha256,
            epack_signing_key: String::new(),
            stage2_threshold: 0.50,
            embeddings_model: "local-mini".to_string(),
            require_evidence_citations: true,
            auto_citation_notice: true,
        }
    }
}

impl Settings {
    /// Captures settings from the recognized environment variables.
    ///
    /// Recognized variables: `BW_POLICY_PATH`, `BW_KERNEL_MODE`,
    /// `ECOSPHERE_PROVIDER`, `ECOSPHERE_MODEL`,
    /// `ECOSPHERE_EPACK_STORE_PATH`, `ECOSPHERE_PERSIST_EPACKS`,
    /// `ECOSPHERE_REDACT_MODE`, `ECOSPHERE_HASH_ALGORITHM`,
    /// `ECOSPHERE_STAGE2_THRESHOLD`, `ECOSPHERE_EMBEDDINGS_MODEL`,
    /// `ECOSPHERE_REQUIRE_EVIDENCE_CITATIONS`,
    /// `ECOSPHERE_AUTO_APPEND_CITATION_NOTICE`, and `EPACK_SIGNING_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            policy_path: env_or("BW_POLICY_PATH", &defaults.policy_path),
            kernel_mode: KernelMode::parse(&env_or("BW_KERNEL_MODE", "v8")),
            provider: env_or("ECOSPHERE_PROVIDER", &defaults.provider).to_lowercase(),
            model: env_or("ECOSPHERE_MODEL", &defaults.model),
            epack_store_path: env_or("ECOSPHERE_EPACK_STORE_PATH", &defaults.epack_store_path),
            persist_epacks: env_or("ECOSPHERE_PERSIST_EPACKS", "1") == "1",
            redact_mode: RedactMode::parse(&env_or("ECOSPHERE_REDACT_MODE", "hash")),
            hash_algorithm: HashAlgorithm::parse(&env_or("ECOSPHERE_HASH_ALGORITHM", "sha256"))
                .unwrap_or(HashAlgorithm::Sha256),
            epack_signing_key: env_or("EPACK_SIGNING_KEY", ""),
            stage2_threshold: env_or("ECOSPHERE_STAGE2_THRESHOLD", "0.50")
                .parse()
                .unwrap_or(defaults.stage2_threshold),
            embeddings_model: env_or("ECOSPHERE_EMBEDDINGS_MODEL", &defaults.embeddings_model),
            require_evidence_citations: env_or("ECOSPHERE_REQUIRE_EVIDENCE_CITATIONS", "1") == "1",
            auto_citation_notice: env_or("ECOSPHERE_AUTO_APPEND_CITATION_NOTICE", "1") == "1",
        }
    }
}

/// Reads an environment variable with a default.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
