// crates/trustplane-api/src/main.rs
// ============================================================================
// Module: Trustplane API Binary
// Description: Serve the governance API over HTTP.
// Purpose: Capture settings once, build state, and run the axum server.
// Dependencies: crate (trustplane-api), tokio
// ============================================================================

//! ## Overview
//! Thin binary shell: environment settings are captured exactly once at
//! startup, the kernel state is built, and the router is served until the
//! process is stopped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use trustplane_api::build_state;
use trustplane_api::router;
use trustplane_config::Settings;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Address the API binds to.
const BIND_ADDR: &str = "0.0.0.0:8000";

/// Serves the governance API.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env();
    let state = Arc::new(build_state(settings)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(BIND_ADDR).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
