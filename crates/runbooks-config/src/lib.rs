//! Federation configuration: YAML loading for the `sources[]`, `cache`,
//! `performance` and `server` sections (spec §6.3). This crate only parses
//! and validates structure — per-adapter secrets (`{ADAPTER_NAME}_TOKEN` and
//! friends, spec §6.4) are resolved later, at each adapter's own
//! `initialize()`, not here.

pub mod cache;
pub mod performance;
pub mod server;
pub mod sources;

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use runbooks_core::{CoreError, CoreResult};

pub use cache::CacheSection;
pub use performance::PerformanceSection;
pub use server::ServerSection;
pub use sources::{SourceEntry, SourceKindConfig};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct FederationConfig {
    pub sources: Vec<SourceEntry>,
    pub cache: CacheSection,
    pub performance: PerformanceSection,
    pub server: ServerSection,
}

impl FederationConfig {
    pub fn from_str(yaml: &str) -> CoreResult<Self> {
        let config: FederationConfig =
            serde_yaml::from_str(yaml).map_err(|err| CoreError::Config {
                adapter: "config".to_string(),
                message: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| CoreError::Config {
            adapter: "config".to_string(),
            message: format!("reading {}: {err}", path.display()),
        })?;
        Self::from_str(&raw)
    }

    /// Catches the one structural mistake YAML's own shape can't: two
    /// sources sharing a name, which would otherwise silently clobber each
    /// other in `AdapterRegistry`'s name-keyed map.
    fn validate(&self) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for entry in &self.sources {
            if !seen.insert(entry.name().to_string()) {
                return Err(CoreError::Config {
                    adapter: "config".to_string(),
                    message: format!("duplicate source name '{}'", entry.name()),
                });
            }
        }
        Ok(())
    }

    /// Consumes the parsed `sources[]` list into registrations ready for
    /// [`runbooks_router::AdapterRegistry::create_adapter`], resolving each
    /// entry's timeout against `performance.default_timeout_ms` where unset.
    pub fn into_registrations(self) -> Vec<runbooks_router::SourceRegistration> {
        let default_timeout_ms = self.performance.default_timeout_ms;
        self.sources
            .into_iter()
            .map(|entry| entry.into_registration(default_timeout_ms))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
sources:
  - enabled: true
    priority: 1
    timeout_ms: 2000
    kind:
      type: filesystem
      config:
        name: local-docs
        roots: ["/srv/docs"]
  - enabled: true
    priority: 0
    kind:
      type: http
      config:
        name: status-page
        endpoints:
          - name: incidents
            url: "https://status.example.com/api/incidents"
cache:
  l1:
    max_entries: 5000
    default_ttl: 2h
  l2:
    url: "redis://localhost:6379"
  ttl_by_type:
    runbook_search: 30m
performance:
  max_concurrent_requests: 16
  default_timeout_ms: 3000
server:
  port: 9090
"#;

    #[test]
    fn parses_a_full_config() {
        let config = FederationConfig::from_str(SAMPLE).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.cache.l1.max_entries, 5000);
        assert_eq!(config.performance.max_concurrent_requests, 16);
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn defaults_an_absent_section() {
        let yaml = r#"
sources:
  - kind:
      type: filesystem
      config:
        name: local-docs
        roots: ["/srv/docs"]
"#;
        let config = FederationConfig::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.performance.max_concurrent_requests,
            runbooks_router::DEFAULT_MAX_CONCURRENT_REQUESTS
        );
    }

    #[test]
    fn rejects_duplicate_source_names() {
        let yaml = r#"
sources:
  - kind:
      type: filesystem
      config:
        name: dup
        roots: ["/a"]
  - kind:
      type: filesystem
      config:
        name: dup
        roots: ["/b"]
"#;
        let err = FederationConfig::from_str(yaml).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn loads_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("federation.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = FederationConfig::from_file(&path).unwrap();
        assert_eq!(config.sources.len(), 2);
    }
}
