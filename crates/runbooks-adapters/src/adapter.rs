//! The source adapter contract (spec §4.C6), implemented with `async-trait`
//! as in `harborgrid-justin-caddy` and `outfitter-dev-blz`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use runbooks_core::{AdapterMetadata, CoreResult, Filters, Health, Runbook, SearchResult};

/// Uniform contract every source (filesystem, wiki, forge, http) implements.
///
/// `search` and `search_runbooks` must be safe to call concurrently with
/// each other and with themselves (spec "adapter common behavior");
/// `refresh_index` and `cleanup` take an internal write lock and are safe to
/// call from multiple callers, but only one refresh runs at a time (spec §5
/// re-index policy).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Human-readable instance name, matching the `sources[].name` this
    /// adapter was configured with.
    fn name(&self) -> &str;

    /// Categories this adapter declares, used by the router's and C6's
    /// `categories` pre-filter.
    fn categories(&self) -> &[String];

    async fn initialize(&self) -> CoreResult<()>;

    async fn search(&self, query: &str, filters: &Filters) -> CoreResult<Vec<SearchResult>>;

    /// Returns `Ok(None)` on a 404-equivalent; all other errors surface
    /// (spec: "`get_document` returns `null` on 404-equivalents; all other
    /// errors surface").
    async fn get_document(&self, id: &str) -> CoreResult<Option<SearchResult>>;

    async fn search_runbooks(
        &self,
        alert_type: &str,
        severity: &str,
        systems: &[String],
        ctx: Option<&str>,
    ) -> CoreResult<Vec<Runbook>>;

    /// Never returns `Err`; an upstream failure is reported as an unhealthy
    /// [`Health`], not propagated (spec: "`health_check` never throws").
    async fn health_check(&self) -> Health;

    /// `force=true` rebuilds from scratch; `force=false` is a delta update.
    /// Returns `false` without doing anything if a refresh is already in
    /// flight (spec §5 re-index policy).
    async fn refresh_index(&self, force: bool) -> CoreResult<bool>;

    async fn metadata(&self) -> AdapterMetadata;

    async fn cleanup(&self) -> CoreResult<()>;
}

/// `true` when `filters.categories` is set and shares no element with
/// `declared` — the fast-path empty-result case common to every adapter.
pub fn categories_excluded(filters: &Filters, declared: &[String]) -> bool {
    filters.excludes_all(declared)
}

/// Applies the filters every adapter's `search` honors identically:
/// confidence threshold, max age, stable descending sort, then `limit`
/// (spec §4.C6 `filters` contract and §5 ordering rule). `source_priority`
/// is left empty here — adapters only ever see their own results, so ties
/// break on id alone; the router re-sorts with the real priority map once
/// results are merged.
pub fn apply_filters(mut results: Vec<SearchResult>, filters: &Filters) -> Vec<SearchResult> {
    if let Some(threshold) = filters.normalized_confidence_threshold() {
        results.retain(|r| r.confidence_score >= threshold);
    }
    if let Some(max_age_days) = filters.max_age_days {
        let now = Utc::now();
        results.retain(|r| (now - r.document.last_modified).num_days() <= max_age_days as i64);
    }
    runbooks_core::sort_results(&mut results, &HashMap::new());
    if let Some(limit) = filters.limit {
        results.truncate(limit);
    }
    results
}
