// crates/trustplane-core/src/runtime/router.rs
// ============================================================================
// Module: Trustplane Router
// Description: Pure first-match routing over the input vector and session.
// Purpose: Decide the governance route for a turn deterministically.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Routing is evaluated in strict order and is a pure function of
//! `(InputVector, SessionState)`; nothing else may influence it. The rule
//! order is normative: safety failure, reflect gate, scaffold gate,
//! high-stakes readiness, then the default generation path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::input::DomainTag;
use crate::core::input::InputVector;
use crate::core::session::SessionState;

// ============================================================================
// SECTION: Routes
// ============================================================================

/// Governance route for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    /// Refuse with a stable redirect (safety failure).
    Bound,
    /// Require a reflect confirmation before proceeding.
    Reflect,
    /// Require a scaffold approval before proceeding.
    Scaffold,
    /// Defer a high-stakes turn pending verification evidence.
    Defer,
    /// Normal generation path.
    Tdm,
}

impl Route {
    /// Canonical wire name of the route.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bound => "BOUND",
            Self::Reflect => "REFLECT",
            Self::Scaffold => "SCAFFOLD",
            Self::Defer => "DEFER",
            Self::Tdm => "TDM",
        }
    }
}

// ============================================================================
// SECTION: Routing Function
// ============================================================================

/// Routes a turn. First match wins; the order below is normative.
#[must_use]
pub fn route(iv: &InputVector, session: &SessionState) -> (Route, &'static str) {
    if !iv.safe {
        return (Route::Bound, "safety_fail");
    }
    if iv.requires_reflect && !session.reflect_confirmed {
        return (Route::Reflect, "requires_reflect");
    }
    if iv.requires_scaffold && session.reflect_confirmed && !session.scaffold_approved {
        return (Route::Scaffold, "requires_scaffold");
    }
    if iv.domain == DomainTag::HighStakes && !session.tsv.high_stakes_ready() {
        return (Route::Defer, "high_stakes_gate");
    }
    (Route::Tdm, "default")
}
