//! The `cache.*` section (spec §6.3).

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use runbooks_adapters::config::parse_cache_ttl;
use runbooks_cache::{CacheConfig, CacheKeyKind};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct L1Section {
    pub max_entries: usize,
    pub default_ttl: String,
}

impl Default for L1Section {
    fn default() -> Self {
        Self {
            max_entries: CacheConfig::default().l1_capacity,
            default_ttl: "4h".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct L2Section {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct CacheSection {
    pub l1: L1Section,
    pub l2: L2Section,
    /// Per-`CacheKeyKind` TTL override, keyed by [`CacheKeyKind::as_str`]
    /// (e.g. `"runbook_search": "30m"`). Values use the same `^\d+[hm]$`
    /// grammar as the adapter-level `cache_ttl` fields.
    pub ttl_by_type: HashMap<String, String>,
}

impl CacheSection {
    /// L1/L2 plumbing for [`runbooks_cache::TwoTierCache::new`]. Per-kind TTL
    /// overrides don't live on `CacheConfig` — that type only governs
    /// capacity and L2 wiring — so callers combine this with
    /// [`CacheSection::resolved_ttl_overrides`] and pass the override
    /// through to `TwoTierCache::put`'s explicit `ttl` argument instead.
    pub fn cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::new().l1_capacity(self.l1.max_entries);
        if let Some(url) = &self.l2.url {
            config = config.l2_url(url.clone());
        }
        config
    }

    pub fn default_l1_ttl(&self) -> Duration {
        parse_cache_ttl(&self.l1.default_ttl)
    }

    /// Resolves `ttl_by_type` against the known [`CacheKeyKind`]s, skipping
    /// (and logging) any key that doesn't match one.
    pub fn resolved_ttl_overrides(&self) -> HashMap<CacheKeyKind, Duration> {
        const KINDS: [CacheKeyKind; 6] = [
            CacheKeyKind::RunbookSearch,
            CacheKeyKind::KnowledgeBase,
            CacheKeyKind::Document,
            CacheKeyKind::DecisionTree,
            CacheKeyKind::Procedure,
            CacheKeyKind::Escalation,
        ];

        let mut overrides = HashMap::new();
        for (key, raw_ttl) in &self.ttl_by_type {
            match KINDS.iter().find(|kind| kind.as_str() == key) {
                Some(kind) => {
                    overrides.insert(*kind, parse_cache_ttl(raw_ttl));
                }
                None => tracing::warn!(%key, "cache.ttl_by_type key doesn't match a known cache kind"),
            }
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cache_config_defaults() {
        let section = CacheSection::default();
        assert_eq!(section.l1.max_entries, CacheConfig::default().l1_capacity);
        assert!(section.l2.url.is_none());
    }

    #[test]
    fn resolves_known_ttl_overrides_and_skips_unknown_keys() {
        let mut section = CacheSection::default();
        section
            .ttl_by_type
            .insert("runbook_search".to_string(), "30m".to_string());
        section
            .ttl_by_type
            .insert("not_a_real_kind".to_string(), "1h".to_string());

        let overrides = section.resolved_ttl_overrides();
        assert_eq!(
            overrides.get(&CacheKeyKind::RunbookSearch),
            Some(&Duration::from_secs(30 * 60))
        );
        assert_eq!(overrides.len(), 1);
    }
}
