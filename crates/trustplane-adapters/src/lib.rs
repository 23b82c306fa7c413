// crates/trustplane-adapters/src/lib.rs
// ============================================================================
// Module: Trustplane Adapters Library
// Description: Deterministic adapter implementations and the registry.
// Purpose: Provide network-free adapters for tests, demos, and defaults.
// Dependencies: crate::{mock, scripted}
// ============================================================================

//! ## Overview
//! Concrete provider HTTP clients live outside the kernel; this crate ships
//! the deterministic implementations of the `Adapter` capability the
//! orchestrator and tests run against: a schema-aware mock that echoes
//! anchors, and a scripted adapter that replays canned responses and
//! failures. The default registry wires both under their provider names.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod mock;
pub mod scripted;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use trustplane_consensus::Adapter;
use trustplane_consensus::AdapterRegistry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use mock::MockAdapter;
pub use mock::MockTextGenerator;
pub use scripted::ScriptStep;
pub use scripted::ScriptedAdapter;
pub use scripted::ScriptedTextGenerator;
pub use scripted::scripted_factory;

// ============================================================================
// SECTION: Default Registry
// ============================================================================

/// Builds a registry with the deterministic `mock` provider registered.
#[must_use]
pub fn default_registry() -> AdapterRegistry {
    let registry = AdapterRegistry::new();
    registry.register(
        "mock",
        Arc::new(|spec| {
            let adapter: Arc<dyn Adapter> = Arc::new(MockAdapter::new(&spec.model));
            Ok(adapter)
        }),
    );
    registry
}
