//! Wiki adapter (spec §4.C7b): CQL-style structured queries against a
//! Confluence-shaped REST API, four-query parallel runbook discovery, and
//! the shared C9 confidence model with wiki-specific bonuses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use runbooks_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry};
use runbooks_core::{
    AdapterMetadata, CoreError, CoreResult, Document, Filters, Health, Runbook, SearchResult, SourceType,
};
use runbooks_extractor::{confidence, extract_or_synthesize};
use runbooks_ratelimiter::{RateLimiterConfig, RateLimiterRegistry};
use runbooks_processor::ProcessorConfig;

use crate::adapter::{apply_filters, categories_excluded, SourceAdapter};
use crate::config::{WikiAdapterConfig, WikiAuth};

const WIKI_INDICATOR_WORDS: &[&str] = &[
    "runbook",
    "procedure",
    "troubleshoot",
    "guide",
    "howto",
    "api",
    "documentation",
];
const RUNBOOK_DISJUNCTION: &[&str] = &["runbook", "procedure", "troubleshoot", "incident"];

pub struct WikiAdapter {
    config: WikiAdapterConfig,
    auth: WikiAuth,
    client: reqwest::Client,
    limiter: RateLimiterRegistry,
    limiter_config: RateLimiterConfig,
    breaker: CircuitBreakerRegistry,
    breaker_config: CircuitBreakerConfig,
    processor_config: ProcessorConfig,
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
    last_indexed: Arc<parking_lot::Mutex<Option<DateTime<Utc>>>>,
    indexing: Arc<AtomicBool>,
}

impl WikiAdapter {
    /// Resolves credentials from `{NAME}_TOKEN` or `{NAME}_USERNAME` +
    /// `{NAME}_PASSWORD` (spec §6.4), and fails with a `CONFIG` error rather
    /// than a runtime error when neither is set.
    pub fn new(config: WikiAdapterConfig) -> CoreResult<Self> {
        let auth = Self::resolve_auth(&config.name)?;
        Ok(Self {
            limiter_config: RateLimiterConfig::default(),
            breaker_config: CircuitBreakerConfig::new(format!("wiki-{}", config.name)).failure_threshold(5),
            config,
            auth,
            client: reqwest::Client::new(),
            limiter: RateLimiterRegistry::new(),
            breaker: CircuitBreakerRegistry::new(),
            processor_config: ProcessorConfig::default(),
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            last_indexed: Arc::new(parking_lot::Mutex::new(None)),
            indexing: Arc::new(AtomicBool::new(false)),
        })
    }

    fn resolve_auth(name: &str) -> CoreResult<WikiAuth> {
        let prefix = name.to_uppercase().replace(['-', ' '], "_");
        if let Ok(token) = std::env::var(format!("{prefix}_TOKEN")) {
            return Ok(WikiAuth::Bearer { token });
        }
        let username = std::env::var(format!("{prefix}_USERNAME"));
        let password = std::env::var(format!("{prefix}_PASSWORD"));
        if let (Ok(username), Ok(password)) = (username, password) {
            return Ok(WikiAuth::Basic { username, password });
        }
        Err(CoreError::Config {
            adapter: name.to_string(),
            message: format!(
                "neither {prefix}_TOKEN nor {prefix}_USERNAME/{prefix}_PASSWORD is set"
            ),
        })
    }

    async fn execute_cql(&self, cql: &str) -> CoreResult<Vec<WikiPage>> {
        self.limiter
            .acquire(&self.config.name, &self.limiter_config)
            .await
            .map_err(CoreError::from)?;

        self.request_count.fetch_add(1, Ordering::Relaxed);
        let client = &self.client;
        let url = format!("{}/rest/api/content/search", self.config.base_url);
        let cql = cql.to_string();
        let auth = self.auth.clone();

        let result = self
            .breaker
            .call(&self.config.name, &self.breaker_config, || async move {
                let mut request = client.get(&url).query(&[("cql", cql.as_str()), ("expand", "body.storage,space,version")]);
                request = match &auth {
                    WikiAuth::Bearer { token } => request.bearer_auth(token),
                    WikiAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
                };
                let response = request
                    .timeout(std::time::Duration::from_millis(self.config.timeout_ms))
                    .send()
                    .await?;
                let status = response.status();
                if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                    return Err(WikiCallError::Auth(status.as_u16()));
                }
                if !status.is_success() {
                    return Err(WikiCallError::Upstream(status.as_u16()));
                }
                response
                    .json::<WikiSearchResponse>()
                    .await
                    .map_err(|e| WikiCallError::Parse(e.to_string()))
            })
            .await;

        match result {
            Ok(body) => Ok(body.results),
            Err(CircuitBreakerError::Open { name }) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                Err(CoreError::UpstreamUnavailable { adapter: name })
            }
            Err(CircuitBreakerError::Inner(WikiCallError::Auth(_))) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                Err(CoreError::Auth {
                    adapter: self.config.name.clone(),
                    message: "wiki rejected credentials".to_string(),
                })
            }
            Err(CircuitBreakerError::Inner(WikiCallError::Upstream(code))) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                Err(CoreError::Upstream {
                    adapter: self.config.name.clone(),
                    message: format!("wiki returned status {code}"),
                })
            }
            Err(CircuitBreakerError::Inner(WikiCallError::Parse(message))) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                Err(CoreError::Parse {
                    context: self.config.name.clone(),
                    message,
                })
            }
        }
    }

    fn page_to_document(&self, page: &WikiPage) -> Option<Document> {
        let body = page.body.as_ref().map(|b| b.storage.value.as_str()).unwrap_or("");
        let processed = runbooks_processor::process(
            body,
            Some("html"),
            Some("text/html"),
            &page.id,
            Some(&page.title),
            &self.processor_config,
        )
        .ok()?;

        let last_modified = page
            .version
            .as_ref()
            .and_then(|v| DateTime::parse_from_rfc3339(&v.when).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let mut metadata = processed.metadata;
        if let Some(space) = &page.space {
            metadata.insert("space_key".to_string(), serde_json::Value::String(space.key.clone()));
        }

        Some(Document {
            id: page.id.clone(),
            title: processed.title,
            content: processed.content,
            searchable_content: processed.searchable_content,
            source: self.config.name.clone(),
            source_type: SourceType::Wiki,
            url: format!("{}/pages/{}", self.config.base_url, page.id),
            last_modified,
            metadata,
        })
    }

    fn score_document(&self, query: &str, doc: &Document, is_structured_runbook: bool) -> f64 {
        let space_key = doc
            .metadata
            .get("space_key")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        let mut score = confidence::score(&confidence::ConfidenceInputs {
            query,
            title: &doc.title,
            content: &doc.content,
            path_or_url: &doc.url,
            source_name: &self.config.name,
            is_markdown: true,
            is_structured_runbook,
            is_wiki_like: true,
            last_modified: Some(doc.last_modified),
            now: Utc::now(),
        });

        let space_lower = space_key.to_lowercase();
        if space_lower.contains("ops") || space_lower.contains("docs") {
            score += 0.1;
        }
        let content_lower = doc.content.to_lowercase();
        let indicator_bonus = (WIKI_INDICATOR_WORDS
            .iter()
            .filter(|w| content_lower.contains(**w))
            .count() as f64
            * 0.02)
            .min(0.1);
        score += indicator_bonus;

        runbooks_core::clamp_confidence(score)
    }

    fn free_text_query(&self, query: &str, filters: &Filters) -> String {
        let mut clauses = vec![format!("text ~ \"{}\"", escape_cql(query))];
        if let Some(keys) = &self.config.space_keys {
            if !keys.is_empty() {
                let disjunction = keys
                    .iter()
                    .map(|k| format!("space = \"{}\"", escape_cql(k)))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                clauses.push(format!("({disjunction})"));
            }
        }
        clauses.push("type = page AND status = current".to_string());
        if let Some(days) = filters.max_age_days.or(self.config.max_age_days) {
            clauses.push(age_filter(days));
        }
        if let Some(categories) = &filters.categories {
            for category in categories {
                clauses.push(expand_category(category));
            }
        }
        clauses.join(" AND ")
    }

    fn runbook_queries(&self, alert_type: &str, severity: &str, systems: &[String]) -> Vec<String> {
        let base = format!(
            "({}) AND type = page AND status = current",
            RUNBOOK_DISJUNCTION
                .iter()
                .chain(std::iter::once(&alert_type))
                .chain(std::iter::once(&severity))
                .map(|t| format!("text ~ \"{}\"", escape_cql(t)))
                .collect::<Vec<_>>()
                .join(" OR ")
        );

        let mut queries = vec![base];
        for system in systems.iter().take(3) {
            queries.push(format!(
                "text ~ \"{}\" AND type = page AND status = current",
                escape_cql(&format!("{alert_type} {system} runbook"))
            ));
        }
        queries.push(format!(
            "text ~ \"{}\" AND type = page AND status = current",
            escape_cql(&format!("{severity} incident procedure troubleshoot"))
        ));
        queries.push(format!(
            "text ~ \"{}\" AND type = page AND status = current",
            escape_cql(&format!("runbook {alert_type}"))
        ));
        queries
    }
}

/// Escapes quotes and backslashes for embedding in a CQL string literal
/// (spec §4.C7b: "free-text: ... with quotes, backslashes and single quotes
/// escaped").
fn escape_cql(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"").replace('\'', "\\'")
}

fn age_filter(days: u32) -> String {
    let cutoff = Utc::now() - chrono::Duration::days(days as i64);
    format!("lastModified >= \"{}\"", cutoff.format("%Y-%m-%d"))
}

/// Category expansion: `runbook|api|guide` expand to canonical term sets;
/// anything else is used verbatim (spec §4.C7b).
fn expand_category(category: &str) -> String {
    let terms: &[&str] = match category {
        "runbook" => &["runbook", "procedure", "playbook"],
        "api" => &["api", "endpoint", "interface"],
        "guide" => &["guide", "howto", "tutorial"],
        other => return format!("text ~ \"{}\"", escape_cql(other)),
    };
    let disjunction = terms
        .iter()
        .map(|t| format!("text ~ \"{}\"", escape_cql(t)))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({disjunction})")
}

#[derive(Debug, thiserror::Error)]
enum WikiCallError {
    #[error("auth rejected ({0})")]
    Auth(u16),
    #[error("upstream status {0}")]
    Upstream(u16),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for WikiCallError {
    fn from(err: reqwest::Error) -> Self {
        WikiCallError::Upstream(err.status().map(|s| s.as_u16()).unwrap_or(0))
    }
}

#[derive(Debug, Deserialize)]
struct WikiSearchResponse {
    #[serde(default)]
    results: Vec<WikiPage>,
}

#[derive(Debug, Deserialize, Clone)]
struct WikiPage {
    id: String,
    title: String,
    #[serde(default)]
    space: Option<WikiSpace>,
    #[serde(default)]
    body: Option<WikiBody>,
    #[serde(default)]
    version: Option<WikiVersion>,
}

#[derive(Debug, Deserialize, Clone)]
struct WikiSpace {
    key: String,
}

#[derive(Debug, Deserialize, Clone)]
struct WikiBody {
    storage: WikiStorage,
}

#[derive(Debug, Deserialize, Clone)]
struct WikiStorage {
    value: String,
}

#[derive(Debug, Deserialize, Clone)]
struct WikiVersion {
    when: String,
}

#[async_trait]
impl SourceAdapter for WikiAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn categories(&self) -> &[String] {
        &self.config.categories
    }

    async fn initialize(&self) -> CoreResult<()> {
        // Credentials were already resolved in `new`; nothing else to warm up
        // since the wiki adapter queries live rather than pre-indexing.
        Ok(())
    }

    async fn search(&self, query: &str, filters: &Filters) -> CoreResult<Vec<SearchResult>> {
        if categories_excluded(filters, &self.config.categories) {
            return Ok(Vec::new());
        }
        let cql = self.free_text_query(query, filters);
        let pages = self.execute_cql(&cql).await?;

        let results: Vec<SearchResult> = pages
            .iter()
            .filter_map(|page| self.page_to_document(page))
            .map(|doc| {
                let score = self.score_document(query, &doc, false);
                SearchResult {
                    document: doc,
                    confidence_score: score,
                    match_reasons: vec!["wiki_cql_match".to_string()],
                    retrieval_time_ms: 0,
                }
            })
            .collect();

        Ok(apply_filters(results, filters))
    }

    async fn get_document(&self, id: &str) -> CoreResult<Option<SearchResult>> {
        let cql = format!("id = \"{}\"", escape_cql(id));
        let pages = match self.execute_cql(&cql).await {
            Ok(pages) => pages,
            Err(CoreError::Upstream { .. }) => return Ok(None),
            Err(other) => return Err(other),
        };
        Ok(pages.first().and_then(|page| self.page_to_document(page)).map(|doc| SearchResult {
            document: doc,
            confidence_score: 1.0,
            match_reasons: vec!["direct_lookup".to_string()],
            retrieval_time_ms: 0,
        }))
    }

    async fn search_runbooks(
        &self,
        alert_type: &str,
        severity: &str,
        systems: &[String],
        ctx: Option<&str>,
    ) -> CoreResult<Vec<Runbook>> {
        let queries = self.runbook_queries(alert_type, severity, systems);
        let fetches = queries.iter().map(|cql| self.execute_cql(cql));
        let fetched: Vec<CoreResult<Vec<WikiPage>>> = futures::future::join_all(fetches).await;

        let mut seen = HashMap::new();
        for outcome in fetched {
            match outcome {
                Ok(pages) => {
                    for page in pages {
                        seen.entry(page.id.clone()).or_insert(page);
                    }
                }
                Err(err) => {
                    tracing::warn!(adapter = %self.config.name, %err, "runbook discovery query failed, skipping");
                }
            }
        }

        let mut runbooks: Vec<Runbook> = seen
            .values()
            .filter_map(|page| self.page_to_document(page))
            .map(|doc| extract_or_synthesize(&doc.title, &doc.content, alert_type, severity, systems, 0.6))
            .collect();

        if let Some(ctx) = ctx {
            let ctx_lower = ctx.to_lowercase();
            runbooks.retain(|rb| {
                rb.title.to_lowercase().contains(&ctx_lower) || rb.description.to_lowercase().contains(&ctx_lower)
            });
        }

        runbooks.sort_by(|a, b| {
            b.metadata
                .confidence_score
                .partial_cmp(&a.metadata.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(runbooks)
    }

    async fn health_check(&self) -> Health {
        let requests = self.request_count.load(Ordering::Relaxed);
        let errors = self.error_count.load(Ordering::Relaxed);
        let success_rate = if requests > 0 {
            Some(1.0 - (errors as f64 / requests as f64))
        } else {
            None
        };
        Health {
            healthy: errors < requests || requests == 0,
            message: None,
            document_count: -1,
            last_indexed: *self.last_indexed.lock(),
            avg_response_time_ms: None,
            success_rate,
        }
    }

    async fn refresh_index(&self, _force: bool) -> CoreResult<bool> {
        if self.indexing.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        *self.last_indexed.lock() = Some(Utc::now());
        self.indexing.store(false, Ordering::SeqCst);
        Ok(true)
    }

    async fn metadata(&self) -> AdapterMetadata {
        let requests = self.request_count.load(Ordering::Relaxed);
        let errors = self.error_count.load(Ordering::Relaxed);
        AdapterMetadata {
            name: self.config.name.clone(),
            source_type: SourceType::Wiki,
            document_count: -1,
            last_indexed: *self.last_indexed.lock(),
            avg_response_time_ms: None,
            success_rate: if requests > 0 {
                Some(1.0 - (errors as f64 / requests as f64))
            } else {
                None
            },
        }
    }

    async fn cleanup(&self) -> CoreResult<()> {
        // No local state to release: every query is answered live against
        // the wiki API.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape_cql(r#"he said "hi"\"#), r#"he said \"hi\"\\"#);
    }

    #[test]
    fn category_expansion_covers_runbook_api_guide() {
        assert!(expand_category("runbook").contains("playbook"));
        assert!(expand_category("api").contains("endpoint"));
        assert!(expand_category("guide").contains("howto"));
        assert_eq!(expand_category("security"), "text ~ \"security\"");
    }

    #[test]
    fn missing_credentials_are_a_config_error_not_a_panic() {
        std::env::remove_var("NO_SUCH_WIKI_TOKEN");
        std::env::remove_var("NO_SUCH_WIKI_USERNAME");
        std::env::remove_var("NO_SUCH_WIKI_PASSWORD");
        let config = WikiAdapterConfig {
            name: "no-such-wiki".to_string(),
            base_url: "https://example.invalid".to_string(),
            categories: vec![],
            space_keys: None,
            timeout_ms: 5000,
            max_age_days: None,
        };
        let err = WikiAdapter::new(config).unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }
}
