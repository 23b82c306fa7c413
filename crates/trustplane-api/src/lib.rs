// crates/trustplane-api/src/lib.rs
// ============================================================================
// Module: Trustplane API Library
// Description: HTTP surface, metrics, schemas, and receipt signing.
// Purpose: Expose the governance kernel over a small axum API.
// Dependencies: crate::{metrics, receipt, schema_registry, server}
// ============================================================================

//! ## Overview
//! The API crate hosts the external surface described by the governance
//! contract: liveness and manifest endpoints, the machine-readable
//! constitution and schema registry, chain verification and offline replay,
//! the end-to-end governed query path, and the evaluate-only resilience
//! decision endpoint.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod metrics;
pub mod receipt;
pub mod schema_registry;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use metrics::GovernanceMetrics;
pub use metrics::MetricsSnapshot;
pub use receipt::Receipt;
pub use receipt::sign_receipt;
pub use receipt::verify_receipt;
pub use server::AppState;
pub use server::KernelEngine;
pub use server::build_state;
pub use server::router;
