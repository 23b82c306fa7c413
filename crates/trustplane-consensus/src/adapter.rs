// crates/trustplane-consensus/src/adapter.rs
// ============================================================================
// Module: Trustplane Adapter Capability
// Description: Async model-provider capability with tagged error taxonomy.
// Purpose: Keep the orchestrator provider-agnostic behind one trait.
// Dependencies: async-trait, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The orchestrator depends on exactly one async operation:
//! `generate_text(prompt, temperature, timeout, extra)`. Errors are tagged
//! (`AUTH | RATE_LIMIT | TIMEOUT | TRANSIENT | OTHER`) so retry policy can be
//! decided per class. The registry maps provider names to adapter
//! constructors and caches instances by `(provider, model)` to amortize
//! client setup; it is shared process-wide and concurrent-safe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::ModelSpec;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tagged adapter error taxonomy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// Authentication failed; fatal to the turn.
    #[error("adapter auth error: {0}")]
    Auth(String),
    /// Provider rate limit hit.
    #[error("adapter rate limited: {0}")]
    RateLimit(String),
    /// The call exceeded its deadline.
    #[error("adapter call timed out after {0}s")]
    Timeout(u64),
    /// Transient provider failure; may be retried within the repair budget.
    #[error("adapter transient error: {0}")]
    Transient(String),
    /// Any other provider failure.
    #[error("adapter error: {0}")]
    Other(String),
}

impl AdapterError {
    /// Whether a retry within the repair budget is permitted.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit(_) | Self::Transient(_))
    }
}

// ============================================================================
// SECTION: Adapter Capability
// ============================================================================

/// Async model-provider capability.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Provider name this adapter serves.
    fn provider(&self) -> &str;

    /// Model identifier this adapter serves.
    fn model(&self) -> &str;

    /// Generates raw text for a prompt.
    ///
    /// Implementations must honor `timeout_s` as a hard deadline.
    ///
    /// # Errors
    ///
    /// Returns a tagged [`AdapterError`] on any provider failure.
    async fn generate_text(
        &self,
        prompt: &str,
        temperature: f64,
        timeout_s: u64,
        extra: &Value,
    ) -> Result<(String, Value), AdapterError>;
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Constructor building an adapter for a model spec.
pub type AdapterFactory =
    Arc<dyn Fn(&ModelSpec) -> Result<Arc<dyn Adapter>, AdapterError> + Send + Sync>;

/// Provider registry with `(provider, model)` instance caching.
#[derive(Default)]
pub struct AdapterRegistry {
    /// Adapter constructors by provider name.
    factories: RwLock<BTreeMap<String, AdapterFactory>>,
    /// Cached adapter instances by `(provider, model)`.
    cache: RwLock<BTreeMap<(String, String), Arc<dyn Adapter>>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry").field("providers", &self.providers()).finish()
    }
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a provider constructor.
    pub fn register(&self, provider: impl Into<String>, factory: AdapterFactory) {
        if let Ok(mut factories) = self.factories.write() {
            factories.insert(provider.into(), factory);
        }
    }

    /// Registered provider names.
    #[must_use]
    pub fn providers(&self) -> Vec<String> {
        self.factories.read().map(|factories| factories.keys().cloned().collect()).unwrap_or_default()
    }

    /// Builds (or fetches a cached) adapter for a model spec.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Other`] when no constructor is registered for
    /// the provider, or the constructor's error otherwise.
    pub fn build(&self, spec: &ModelSpec) -> Result<Arc<dyn Adapter>, AdapterError> {
        let key = (spec.provider.clone(), spec.model.clone());
        if let Ok(cache) = self.cache.read() {
            if let Some(adapter) = cache.get(&key) {
                return Ok(Arc::clone(adapter));
            }
        }

        let factory = {
            let factories = self
                .factories
                .read()
                .map_err(|_| AdapterError::Other("adapter registry lock poisoned".into()))?;
            factories
                .get(&spec.provider)
                .cloned()
                .ok_or_else(|| {
                    AdapterError::Other(format!(
                        "no adapter registered for provider={}",
                        spec.provider
                    ))
                })?
        };

        let adapter = factory(spec)?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, Arc::clone(&adapter));
        }
        Ok(adapter)
    }
}
