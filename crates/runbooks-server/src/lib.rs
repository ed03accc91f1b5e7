//! Transport layer (spec §6): the rmcp tool surface and the axum HTTP
//! mirror, both driven by the same [`state::AppState`] over a shared
//! `runbooks_router::AdapterRegistry`. Non-core per spec §1.

pub mod envelope;
pub mod feedback;
pub mod http;
pub mod lookup;
pub mod mcp;
pub mod state;

pub use feedback::FeedbackLog;
pub use state::AppState;

use std::sync::Arc;

use runbooks_cache::CacheError;
use runbooks_config::FederationConfig;
use runbooks_router::AdapterRegistry;

/// Builds the registry from a parsed configuration, registering every
/// enabled source and logging (without failing startup) any that are
/// refused — matches `AdapterRegistry::create_adapter`'s own "offending
/// adapter is refused; the rest of the federation starts" policy, one level
/// up. A bad `cache.l2.url` is the one thing that does fail startup, since
/// `TwoTierCache::new` connects eagerly so misconfiguration surfaces
/// immediately rather than on first request.
pub async fn build_registry(config: &FederationConfig) -> Result<Arc<AdapterRegistry>, CacheError> {
    let cache = runbooks_cache::TwoTierCache::new(config.cache.cache_config()).await?;
    let registry = AdapterRegistry::new(Some(cache))
        .with_max_concurrent_requests(config.performance.max_concurrent_requests);

    for registration in config.clone().into_registrations() {
        let _ = registry.create_adapter(registration).await;
    }

    Ok(Arc::new(registry))
}
