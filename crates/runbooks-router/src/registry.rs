//! Adapter registry and federated router (spec §4.C8): owns every live
//! adapter, fans `search`/`search_runbooks` out to all of them under a
//! shared deadline, merges/ranks results, and aggregates health.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::stream::{self, StreamExt};

use runbooks_adapters::{
    categories_excluded, ForgeAdapter, ForgeAdapterConfig, FsAdapterConfig, FilesystemAdapter,
    HttpAdapter, HttpAdapterConfig, SourceAdapter, WikiAdapter, WikiAdapterConfig,
};
use runbooks_cache::{CacheKey, CacheKeyKind, TwoTierCache};
use runbooks_core::{AdapterMetadata, CoreResult, Filters, Health, Runbook, SearchResult};

/// Default width for a single query's adapter fan-out (spec §6.3
/// `performance.max_concurrent_requests`) when the caller doesn't override it.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

/// The type-specific half of a `sources[]` entry (spec §6.3); the
/// common half (`name, enabled, priority, categories, timeout_ms`) is
/// carried by [`SourceRegistration`] instead, since it's identical across
/// adapter types.
pub enum AdapterKind {
    Filesystem(FsAdapterConfig),
    Wiki(WikiAdapterConfig),
    Forge(ForgeAdapterConfig),
    Http(HttpAdapterConfig),
}

/// One `sources[]` entry (spec §6.3): `enabled`/`priority`/`timeout_ms` are
/// common to every adapter type, so they live here rather than being
/// duplicated into each `*AdapterConfig`.
pub struct SourceRegistration {
    pub enabled: bool,
    pub priority: u32,
    pub timeout_ms: u64,
    pub kind: AdapterKind,
}

struct RegisteredAdapter {
    adapter: Arc<dyn SourceAdapter>,
    priority: u32,
    timeout: Duration,
}

/// The result of a federated runbook search (spec §6.1
/// `search_runbooks(...) -> {runbooks[], confidence_scores[], retrieval_time_ms}`);
/// confidence scores live on each `Runbook.metadata.confidence_score`.
pub struct RunbookSearchOutcome {
    pub runbooks: Vec<Runbook>,
    pub retrieval_time_ms: u64,
}

pub struct AdapterRegistry {
    adapters: DashMap<String, RegisteredAdapter>,
    cache: Option<TwoTierCache>,
    max_concurrent_requests: usize,
}

impl AdapterRegistry {
    pub fn new(cache: Option<TwoTierCache>) -> Self {
        Self {
            adapters: DashMap::new(),
            cache,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    pub fn with_max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = n.max(1);
        self
    }

    /// Builds and initializes one adapter, inserting it on success. Both a
    /// rejected configuration (e.g. a missing secret) and a failed
    /// `initialize()` are logged and refused rather than propagated — "the
    /// offending adapter is refused; the rest of the federation starts"
    /// (spec §4.C1 doc-comment on `Config`, generalized to every adapter).
    /// Returns `true` iff the adapter is now registered.
    pub async fn create_adapter(&self, registration: SourceRegistration) -> bool {
        if !registration.enabled {
            return false;
        }

        let built: CoreResult<Arc<dyn SourceAdapter>> = match registration.kind {
            AdapterKind::Filesystem(cfg) => Ok(Arc::new(FilesystemAdapter::new(cfg))),
            AdapterKind::Wiki(cfg) => WikiAdapter::new(cfg).map(|a| Arc::new(a) as Arc<dyn SourceAdapter>),
            AdapterKind::Forge(cfg) => ForgeAdapter::new(cfg).map(|a| Arc::new(a) as Arc<dyn SourceAdapter>),
            AdapterKind::Http(cfg) => HttpAdapter::new(cfg).map(|a| Arc::new(a) as Arc<dyn SourceAdapter>),
        };

        let adapter = match built {
            Ok(adapter) => adapter,
            Err(err) => {
                tracing::warn!(%err, "adapter configuration rejected, refusing it");
                return false;
            }
        };

        let name = adapter.name().to_string();
        if let Err(err) = adapter.initialize().await {
            tracing::warn!(adapter = %name, %err, "adapter failed to initialize, refusing it");
            return false;
        }

        self.adapters.insert(
            name,
            RegisteredAdapter {
                adapter,
                priority: registration.priority,
                timeout: Duration::from_millis(registration.timeout_ms),
            },
        );
        true
    }

    /// Removes a registered adapter without running its `cleanup` — callers
    /// that need graceful teardown should call [`SourceAdapter::cleanup`]
    /// through [`AdapterRegistry::cleanup_one`] first.
    pub fn remove(&self, name: &str) -> bool {
        self.adapters.remove(name).is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    fn priority_map(&self) -> HashMap<String, u32> {
        self.adapters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().priority))
            .collect()
    }

    fn candidates(&self, filters: &Filters) -> Vec<(Arc<dyn SourceAdapter>, Duration)> {
        self.adapters
            .iter()
            .filter(|entry| !categories_excluded(filters, entry.value().adapter.categories()))
            .map(|entry| (entry.value().adapter.clone(), entry.value().timeout))
            .collect()
    }

    /// Fans `query` out to every adapter whose declared categories
    /// intersect `filters.categories` (all, if unspecified), under a
    /// deadline of the smallest candidate timeout plus a fixed slack (spec
    /// §5 "default: smallest adapter timeout + 250 ms slack for router").
    /// Partial failures and timeouts are logged and contribute an empty
    /// result rather than failing the whole query.
    pub async fn search(&self, query: &str, filters: &Filters) -> Vec<SearchResult> {
        let cache_key = self.search_cache_key(query, filters);
        if let Some(cache) = &self.cache {
            if let Some(key) = &cache_key {
                if let Some(cached) = cache.get::<Vec<SearchResult>>(key).await {
                    return cached;
                }
            }
        }

        let started = Instant::now();
        let candidates = self.candidates(filters);
        let deadline = candidates
            .iter()
            .map(|(_, timeout)| *timeout)
            .min()
            .unwrap_or(Duration::from_secs(5))
            + Duration::from_millis(u64::from(runbooks_adapters::config::DEFAULT_ROUTER_SLACK_MS));

        let max_concurrent = self.max_concurrent_requests;
        let query = query.to_string();
        let filters_owned = filters.clone();

        let per_adapter_results: Vec<Vec<SearchResult>> = stream::iter(candidates)
            .map(|(adapter, _)| {
                let query = query.clone();
                let filters = filters_owned.clone();
                async move {
                    match tokio::time::timeout(deadline, adapter.search(&query, &filters)).await {
                        Ok(Ok(results)) => results,
                        Ok(Err(err)) => {
                            tracing::warn!(adapter = adapter.name(), %err, "adapter search failed, skipping");
                            Vec::new()
                        }
                        Err(_) => {
                            tracing::warn!(adapter = adapter.name(), ?deadline, "adapter search timed out, skipping");
                            Vec::new()
                        }
                    }
                }
            })
            .buffer_unordered(max_concurrent)
            .collect()
            .await;

        let mut merged: Vec<SearchResult> = per_adapter_results.into_iter().flatten().collect();
        runbooks_core::sort_results(&mut merged, &self.priority_map());
        if let Some(limit) = filters.limit {
            merged.truncate(limit);
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        for result in &mut merged {
            result.retrieval_time_ms = elapsed_ms;
        }

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            cache.put(key, &merged, None).await;
        }

        merged
    }

    fn search_cache_key(&self, query: &str, filters: &Filters) -> Option<CacheKey> {
        let encoded_filters = serde_json::to_string(filters).ok()?;
        Some(CacheKey::new(
            CacheKeyKind::KnowledgeBase,
            format!("{query}\u{1}{encoded_filters}"),
        ))
    }

    /// Fans a runbook search out to every registered adapter (spec §4.C9
    /// "Individual adapter errors inside a runbook fan-out are isolated and
    /// logged; the fan-out continues"), merges, and sorts by descending
    /// confidence.
    pub async fn search_runbooks(
        &self,
        alert_type: &str,
        severity: &str,
        systems: &[String],
        ctx: Option<&str>,
    ) -> RunbookSearchOutcome {
        let started = Instant::now();
        let adapters: Vec<Arc<dyn SourceAdapter>> = self
            .adapters
            .iter()
            .map(|entry| entry.value().adapter.clone())
            .collect();

        let alert_type = alert_type.to_string();
        let severity = severity.to_string();
        let systems = systems.to_vec();
        let ctx = ctx.map(str::to_string);
        let max_concurrent = self.max_concurrent_requests;

        let per_adapter: Vec<Vec<Runbook>> = stream::iter(adapters)
            .map(|adapter| {
                let alert_type = alert_type.clone();
                let severity = severity.clone();
                let systems = systems.clone();
                let ctx = ctx.clone();
                async move {
                    match adapter
                        .search_runbooks(&alert_type, &severity, &systems, ctx.as_deref())
                        .await
                    {
                        Ok(runbooks) => runbooks,
                        Err(err) => {
                            tracing::warn!(adapter = adapter.name(), %err, "adapter runbook search failed, skipping");
                            Vec::new()
                        }
                    }
                }
            })
            .buffer_unordered(max_concurrent)
            .collect()
            .await;

        let mut runbooks: Vec<Runbook> = per_adapter.into_iter().flatten().collect();
        runbooks.sort_by(|a, b| {
            b.metadata
                .confidence_score
                .partial_cmp(&a.metadata.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        RunbookSearchOutcome {
            runbooks,
            retrieval_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Looks a document up on a specific, named adapter. Unlike `search`,
    /// this isn't part of the tool surface directly — it backs
    /// `get_procedure`/`get_decision_tree` style lookups once the owning
    /// adapter is known.
    pub async fn get_document(&self, source: &str, id: &str) -> CoreResult<Option<SearchResult>> {
        let Some(entry) = self.adapters.get(source) else {
            return Ok(None);
        };
        entry.value().adapter.get_document(id).await
    }

    /// Runs `health_check` on every adapter in parallel (spec §4.C8
    /// "`health_check_all` runs in parallel and returns per-adapter
    /// statuses").
    pub async fn health_check_all(&self) -> HashMap<String, Health> {
        let entries: Vec<(String, Arc<dyn SourceAdapter>)> = self
            .adapters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().adapter.clone()))
            .collect();

        stream::iter(entries)
            .map(|(name, adapter)| async move { (name, adapter.health_check().await) })
            .buffer_unordered(self.max_concurrent_requests)
            .collect()
            .await
    }

    /// `list_sources()` (spec §6.1).
    pub async fn list_sources(&self) -> Vec<AdapterMetadata> {
        let adapters: Vec<Arc<dyn SourceAdapter>> = self
            .adapters
            .iter()
            .map(|entry| entry.value().adapter.clone())
            .collect();

        stream::iter(adapters)
            .map(|adapter| async move { adapter.metadata().await })
            .buffer_unordered(self.max_concurrent_requests)
            .collect()
            .await
    }

    /// Refreshes every adapter's index in parallel, honoring each
    /// adapter's own "indexing already in progress" guard (spec §5
    /// re-index policy).
    pub async fn refresh_all(&self, force: bool) -> HashMap<String, CoreResult<bool>> {
        let entries: Vec<(String, Arc<dyn SourceAdapter>)> = self
            .adapters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().adapter.clone()))
            .collect();

        stream::iter(entries)
            .map(|(name, adapter)| async move { (name, adapter.refresh_index(force).await) })
            .buffer_unordered(self.max_concurrent_requests)
            .collect()
            .await
    }

    /// Runs every adapter's `cleanup` concurrently (spec §4.C8 "`cleanup`
    /// runs all adapter cleanups concurrently").
    pub async fn cleanup(&self) {
        let adapters: Vec<Arc<dyn SourceAdapter>> = self
            .adapters
            .iter()
            .map(|entry| entry.value().adapter.clone())
            .collect();

        stream::iter(adapters)
            .for_each_concurrent(self.max_concurrent_requests, |adapter| async move {
                if let Err(err) = adapter.cleanup().await {
                    tracing::warn!(adapter = adapter.name(), %err, "adapter cleanup failed");
                }
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs_config(name: &str, root: &str) -> FsAdapterConfig {
        FsAdapterConfig {
            name: name.to_string(),
            roots: vec![root.to_string()],
            categories: vec![],
            recursive: true,
            max_depth: 5,
            extensions: vec!["md".to_string()],
            exclude: vec![],
            size_cap_bytes: 1024 * 1024,
            watch: false,
        }
    }

    #[tokio::test]
    async fn registers_a_filesystem_adapter_and_lists_it() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("runbook.md"), "# Disk Full\nrestart service").unwrap();

        let registry = AdapterRegistry::new(None);
        let registered = registry
            .create_adapter(SourceRegistration {
                enabled: true,
                priority: 0,
                timeout_ms: 2000,
                kind: AdapterKind::Filesystem(fs_config("local-docs", dir.path().to_str().unwrap())),
            })
            .await;

        assert!(registered);
        assert!(registry.is_registered("local-docs"));
        let sources = registry.list_sources().await;
        assert_eq!(sources.len(), 1);
    }

    #[tokio::test]
    async fn disabled_source_is_never_registered() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AdapterRegistry::new(None);
        let registered = registry
            .create_adapter(SourceRegistration {
                enabled: false,
                priority: 0,
                timeout_ms: 2000,
                kind: AdapterKind::Filesystem(fs_config("disabled", dir.path().to_str().unwrap())),
            })
            .await;
        assert!(!registered);
        assert!(!registry.is_registered("disabled"));
    }

    #[tokio::test]
    async fn search_stamps_retrieval_time_and_sorts_by_confidence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("disk-full.md"), "# Disk Full Runbook\nrestart the service").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# Notes\nunrelated text").unwrap();

        let registry = AdapterRegistry::new(None);
        registry
            .create_adapter(SourceRegistration {
                enabled: true,
                priority: 0,
                timeout_ms: 2000,
                kind: AdapterKind::Filesystem(fs_config("docs", dir.path().to_str().unwrap())),
            })
            .await;

        let results = registry.search("disk full", &Filters::default()).await;
        assert!(!results.is_empty());
        for pair in results.windows(2) {
            assert!(pair[0].confidence_score >= pair[1].confidence_score);
        }
    }

    #[tokio::test]
    async fn empty_registry_returns_empty_results() {
        let registry = AdapterRegistry::new(None);
        let results = registry.search("anything", &Filters::default()).await;
        assert!(results.is_empty());
        let runbooks = registry.search_runbooks("disk_full", "high", &[], None).await;
        assert!(runbooks.runbooks.is_empty());
    }
}
