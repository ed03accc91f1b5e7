//! The `sources[]` table (spec §6.3): one entry per adapter instance, a
//! common half (`enabled, priority, refresh_interval, timeout_ms`) and a
//! type-specific subsection keyed by `type`.

use serde::Deserialize;

use runbooks_adapters::{ForgeAdapterConfig, FsAdapterConfig, HttpAdapterConfig, WikiAdapterConfig};
use runbooks_router::{AdapterKind, SourceRegistration};

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u32 {
    0
}

/// Seconds between background re-index sweeps; consumed by the periodic
/// refresh scheduler, not by the router itself.
fn default_refresh_interval_secs() -> u64 {
    300
}

/// The type-specific half of a `sources[]` entry. Adjacently tagged
/// (`type`/`config`) rather than flattened into [`SourceEntry`]: serde
/// rejects combining `#[serde(flatten)]` with `#[serde(deny_unknown_fields)]`
/// on the same struct, and every config struct here already denies unknown
/// fields, so the entry nests its payload under `config` instead of
/// inlining `type`/`config` as siblings of `enabled`/`priority`/etc.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum SourceKindConfig {
    Filesystem(FsAdapterConfig),
    Wiki(WikiAdapterConfig),
    Forge(ForgeAdapterConfig),
    Http(HttpAdapterConfig),
}

impl SourceKindConfig {
    pub fn name(&self) -> &str {
        match self {
            SourceKindConfig::Filesystem(c) => &c.name,
            SourceKindConfig::Wiki(c) => &c.name,
            SourceKindConfig::Forge(c) => &c.name,
            SourceKindConfig::Http(c) => &c.name,
        }
    }

    fn into_adapter_kind(self) -> AdapterKind {
        match self {
            SourceKindConfig::Filesystem(c) => AdapterKind::Filesystem(c),
            SourceKindConfig::Wiki(c) => AdapterKind::Wiki(c),
            SourceKindConfig::Forge(c) => AdapterKind::Forge(c),
            SourceKindConfig::Http(c) => AdapterKind::Http(c),
        }
    }
}

/// One `sources[]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceEntry {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Falls back to `performance.default_timeout_ms` when absent (spec
    /// §6.3: "Per-upstream default timeout").
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    pub kind: SourceKindConfig,
}

impl SourceEntry {
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    /// Drops the fields the router doesn't care about (`refresh_interval_secs`
    /// backs a future background scheduler, not fan-out itself) and produces
    /// the registration [`runbooks_router::AdapterRegistry::create_adapter`]
    /// expects. `default_timeout_ms` fills in for a `sources[]` entry that
    /// didn't set its own `timeout_ms` (`performance.default_timeout_ms`).
    pub fn into_registration(self, default_timeout_ms: u64) -> SourceRegistration {
        SourceRegistration {
            enabled: self.enabled,
            priority: self.priority,
            timeout_ms: self.timeout_ms.unwrap_or(default_timeout_ms),
            kind: self.kind.into_adapter_kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_filesystem_source_entry() {
        let yaml = r#"
enabled: true
priority: 1
timeout_ms: 2000
kind:
  type: filesystem
  config:
    name: local-docs
    roots: ["/srv/docs"]
"#;
        let entry: SourceEntry = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(entry.name(), "local-docs");
        assert_eq!(entry.priority, 1);
        assert_eq!(entry.refresh_interval_secs, 300);
        assert_eq!(entry.timeout_ms, Some(2000));
    }

    #[test]
    fn missing_timeout_falls_back_to_the_performance_default() {
        let yaml = r#"
kind:
  type: filesystem
  config:
    name: local-docs
    roots: ["/srv/docs"]
"#;
        let entry: SourceEntry = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(entry.timeout_ms, None);
        let registration = entry.into_registration(7_000);
        assert_eq!(registration.timeout_ms, 7_000);
    }

    #[test]
    fn rejects_unknown_top_level_field() {
        let yaml = r#"
enabled: true
bogus: true
kind:
  type: filesystem
  config:
    name: local-docs
    roots: ["/srv/docs"]
"#;
        assert!(serde_yaml::from_str::<SourceEntry>(yaml).is_err());
    }
}
