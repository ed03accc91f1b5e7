//! Per-adapter-type configuration (spec §4.C7a-d, §6.3).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_DEPTH: u32 = 10;
pub const DEFAULT_FILE_SIZE_CAP_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 1024;
pub const DEFAULT_BULK_SCAN_CEILING: usize = 10;
pub const DEFAULT_FORGE_MIN_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_FORGE_MAX_CONCURRENCY: usize = 3;
pub const DEFAULT_FORGE_QUOTA_CEILING_PERCENT: f64 = 25.0;
pub const DEFAULT_CACHE_TTL: &str = "4h";
pub const DEFAULT_ROUTER_SLACK_MS: u64 = 250;

fn default_extensions() -> Vec<String> {
    ["md", "txt", "json", "yaml", "yml", "pdf", "rst", "adoc"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_excludes() -> Vec<String> {
    [
        ".git", "node_modules", "target", "dist", "build", "vendor", ".cargo",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Spec §4.C7a: "Walks one or more roots up to `max_depth` ... Recognized
/// extensions configurable".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FsAdapterConfig {
    pub name: String,
    pub roots: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,
    #[serde(default = "default_size_cap")]
    pub size_cap_bytes: u64,
    #[serde(default)]
    pub watch: bool,
}

fn default_recursive() -> bool {
    true
}
fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}
fn default_size_cap() -> u64 {
    DEFAULT_FILE_SIZE_CAP_BYTES
}

/// Bearer or basic auth resolved from environment variables (spec §6.4:
/// `{ADAPTER_NAME}_TOKEN` / `_USERNAME` / `_PASSWORD`); absence is a `CONFIG`
/// error, not a runtime one.
#[derive(Debug, Clone)]
pub enum WikiAuth {
    Bearer { token: String },
    Basic { username: String, password: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WikiAdapterConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub space_keys: Option<Vec<String>>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_age_days: Option<u32>,
}

fn default_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgeAdapterConfig {
    pub name: String,
    pub base_url: String,
    pub owner: String,
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub org_scan: bool,
    #[serde(default)]
    pub org_scan_consent: bool,
    #[serde(default = "default_max_file_size_kb")]
    pub max_file_size_kb: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Advertised hourly quota the token is subject to; used with
    /// [`DEFAULT_FORGE_QUOTA_CEILING_PERCENT`] to derive the rate limiter's
    /// conservative quota.
    #[serde(default = "default_forge_hourly_quota")]
    pub advertised_hourly_quota: u64,
}

fn default_max_file_size_kb() -> u64 {
    DEFAULT_MAX_FILE_SIZE_KB
}
fn default_cache_ttl() -> String {
    DEFAULT_CACHE_TTL.to_string()
}
fn default_forge_hourly_quota() -> u64 {
    5000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpContentType {
    Html,
    Json,
    Xml,
    Text,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpEndpointConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_get")]
    pub method: HttpMethod,
    #[serde(default = "default_content_type")]
    pub content_type: HttpContentType,
    #[serde(default)]
    pub selectors: HashMap<String, String>,
    #[serde(default)]
    pub json_paths: HashMap<String, String>,
    #[serde(default)]
    pub xml_xpaths: HashMap<String, String>,
    #[serde(default)]
    pub query_params: HashMap<String, String>,
    pub body: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Requests-per-minute for this endpoint's C1 limiter.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u64,
}

fn default_get() -> HttpMethod {
    HttpMethod::Get
}
fn default_content_type() -> HttpContentType {
    HttpContentType::Auto
}
fn default_rate_limit() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpAuthMode {
    None,
    ApiKeyHeader,
    ApiKeyQuery,
    Bearer,
    Basic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpAuthConfig {
    #[serde(default = "default_auth_mode")]
    pub mode: HttpAuthMode,
    /// Header or query parameter name for `ApiKeyHeader`/`ApiKeyQuery`.
    pub key_name: Option<String>,
    /// Extra static headers merged into every request regardless of `mode`.
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_auth_mode() -> HttpAuthMode {
    HttpAuthMode::None
}

impl Default for HttpAuthConfig {
    fn default() -> Self {
        Self {
            mode: HttpAuthMode::None,
            key_name: None,
            extra_headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpAdapterConfig {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub endpoints: Vec<HttpEndpointConfig>,
    #[serde(default)]
    pub auth: HttpAuthConfig,
    #[serde(default)]
    pub follow_redirects: bool,
}

/// Parses the `^\d+[hm]$` cache-TTL grammar (spec §4.C7c); unknown inputs
/// fall back to 4 hours.
pub fn parse_cache_ttl(raw: &str) -> Duration {
    let raw = raw.trim();
    if raw.len() < 2 {
        return Duration::from_secs(4 * 3600);
    }
    let (digits, unit) = raw.split_at(raw.len() - 1);
    let Ok(n) = digits.parse::<u64>() else {
        return Duration::from_secs(4 * 3600);
    };
    match unit {
        "h" => Duration::from_secs(n * 3600),
        "m" => Duration::from_secs(n * 60),
        _ => Duration::from_secs(4 * 3600),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hour_and_minute_grammar() {
        assert_eq!(parse_cache_ttl("2h"), Duration::from_secs(7200));
        assert_eq!(parse_cache_ttl("30m"), Duration::from_secs(1800));
    }

    #[test]
    fn unknown_grammar_falls_back_to_four_hours() {
        assert_eq!(parse_cache_ttl("banana"), Duration::from_secs(4 * 3600));
        assert_eq!(parse_cache_ttl("2d"), Duration::from_secs(4 * 3600));
    }
}
