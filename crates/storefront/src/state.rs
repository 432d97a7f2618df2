//! Application state shared across handlers.

use std::sync::Arc;

use driftwood_core::PricingPolicy;

use crate::config::StorefrontConfig;
use crate::db::Repositories;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. It holds configuration and
/// repository handles only; per-request data lives in the session.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    repos: Repositories,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, repos: Repositories) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, repos }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the repository bundle.
    #[must_use]
    pub fn repos(&self) -> &Repositories {
        &self.inner.repos
    }

    /// Tax and shipping rates for checkout.
    #[must_use]
    pub fn pricing(&self) -> PricingPolicy {
        self.inner.config.pricing
    }
}
