// crates/trustplane-core/src/core/manifest.rs
// ============================================================================
// Module: Trustplane Build Manifest
// Description: Provenance manifest embedded in every EPACK payload.
// Purpose: Anchor each sealed record to the kernel build that produced it.
// Dependencies: crate::core::hashing, serde
// ============================================================================

//! ## Overview
//! The build manifest names the kernel, its version, and the feature flags
//! active at build time, sealed with a `manifest_hash` computed over the
//! manifest with its own hash field blanked. Replay rejects records without
//! a manifest hash (provenance invariant).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;
use crate::core::hashing::stable_hash;

// ============================================================================
// SECTION: Build Manifest
// ============================================================================

/// Kernel identifier embedded in decision objects and manifests.
pub const KERNEL_NAME: &str = "trustplane-kernel";

/// Provenance manifest for the running kernel build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Kernel identifier.
    pub kernel: String,
    /// Semantic kernel version.
    pub kernel_version: String,
    /// Product name.
    pub product_name: String,
    /// Two-stage consensus flow enabled.
    pub consensus_two_stage: bool,
    /// Challenger architecture enabled.
    pub challenger: bool,
    /// Replay engine enabled.
    pub replay_engine: bool,
    /// Governance policy DSL enabled.
    pub governance_dsl: bool,
    /// Resilience control plane enabled.
    pub resilience_runtime: bool,
    /// Recovery engine enabled.
    pub recovery_engine: bool,
    /// PID damping stabilizer enabled.
    pub damping_stabilizer: bool,
    /// Seal over the manifest with this field blanked.
    pub manifest_hash: String,
}

impl BuildManifest {
    /// Builds and seals the manifest for the current kernel build.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn current(algorithm: HashAlgorithm) -> Result<Self, HashError> {
        let mut manifest = Self {
            kernel: KERNEL_NAME.to_string(),
            kernel_version: env!("CARGO_PKG_VERSION").to_string(),
            product_name: "Trustplane".to_string(),
            consensus_two_stage: true,
            challenger: true,
            replay_engine: true,
            governance_dsl: true,
            resilience_runtime: true,
            recovery_engine: true,
            damping_stabilizer: true,
            manifest_hash: String::new(),
        };
        manifest.manifest_hash = manifest.seal_hash(algorithm)?;
        Ok(manifest)
    }

    /// Computes the manifest hash with the hash field blanked.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn seal_hash(&self, algorithm: HashAlgorithm) -> Result<String, HashError> {
        let mut unsealed = self.clone();
        unsealed.manifest_hash = String::new();
        stable_hash(algorithm, &unsealed)
    }
}
