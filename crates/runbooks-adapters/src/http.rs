//! Generic HTTP adapter (spec §4.C7d): a configurable list of endpoints,
//! each classified by content type and scraped via CSS selectors, JSONPath,
//! or a simplified XPath-subset over the quick-xml-based tree.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock as AsyncRwLock;

use runbooks_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry};
use runbooks_core::{
    AdapterMetadata, CoreError, CoreResult, Document, Filters, Health, Runbook, SearchResult, SourceType,
};
use runbooks_extractor::{confidence, extract_or_synthesize};
use runbooks_processor::ProcessorConfig;
use runbooks_ratelimiter::{RateLimiterConfig, RateLimiterRegistry};

use crate::adapter::{apply_filters, categories_excluded, SourceAdapter};
use crate::config::{HttpAdapterConfig, HttpAuthMode, HttpContentType, HttpEndpointConfig, HttpMethod};

pub struct HttpAdapter {
    config: HttpAdapterConfig,
    client: reqwest::Client,
    limiter: RateLimiterRegistry,
    limiter_configs: HashMap<String, RateLimiterConfig>,
    breaker: CircuitBreakerRegistry,
    breaker_config: CircuitBreakerConfig,
    auth_value: Option<String>,
    processor_config: ProcessorConfig,
    last_results: AsyncRwLock<HashMap<String, Document>>,
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
}

impl HttpAdapter {
    pub fn new(config: HttpAdapterConfig) -> CoreResult<Self> {
        let auth_value = Self::resolve_auth(&config)?;
        let limiter_configs = config
            .endpoints
            .iter()
            .map(|endpoint| {
                let cfg = RateLimiterConfig {
                    min_interval: std::time::Duration::from_millis(60_000 / endpoint.rate_limit.max(1)),
                    hourly_quota: endpoint.rate_limit * 60,
                    safety_buffer: 0,
                };
                (endpoint.name.clone(), cfg)
            })
            .collect();

        let redirect_policy = if config.follow_redirects {
            reqwest::redirect::Policy::limited(5)
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .redirect(redirect_policy)
            .build()
            .map_err(|err| CoreError::Config {
                adapter: config.name.clone(),
                message: err.to_string(),
            })?;

        Ok(Self {
            breaker_config: CircuitBreakerConfig::new(format!("http-{}", config.name)).failure_threshold(5),
            client,
            limiter: RateLimiterRegistry::new(),
            limiter_configs,
            breaker: CircuitBreakerRegistry::new(),
            auth_value,
            processor_config: ProcessorConfig::default(),
            last_results: AsyncRwLock::new(HashMap::new()),
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            config,
        })
    }

    /// Resolves the adapter-wide auth secret from the environment, if the
    /// configured mode needs one (spec §6.4: absence is a `CONFIG` error).
    fn resolve_auth(config: &HttpAdapterConfig) -> CoreResult<Option<String>> {
        let prefix = config.name.to_uppercase().replace(['-', ' '], "_");
        match config.auth.mode {
            HttpAuthMode::None => Ok(None),
            HttpAuthMode::Bearer => std::env::var(format!("{prefix}_TOKEN"))
                .map(Some)
                .map_err(|_| missing_env(&config.name, &format!("{prefix}_TOKEN"))),
            HttpAuthMode::ApiKeyHeader | HttpAuthMode::ApiKeyQuery => std::env::var(format!("{prefix}_API_KEY"))
                .map(Some)
                .map_err(|_| missing_env(&config.name, &format!("{prefix}_API_KEY"))),
            HttpAuthMode::Basic => {
                let username = std::env::var(format!("{prefix}_USERNAME"))
                    .map_err(|_| missing_env(&config.name, &format!("{prefix}_USERNAME")))?;
                let password = std::env::var(format!("{prefix}_PASSWORD"))
                    .map_err(|_| missing_env(&config.name, &format!("{prefix}_PASSWORD")))?;
                Ok(Some(format!(
                    "{}:{}",
                    username,
                    password
                )))
            }
        }
    }

    fn apply_auth(&self, mut request: reqwest::RequestBuilder, endpoint: &HttpEndpointConfig) -> reqwest::RequestBuilder {
        match (self.config.auth.mode, &self.auth_value) {
            (HttpAuthMode::Bearer, Some(token)) => request = request.bearer_auth(token),
            (HttpAuthMode::ApiKeyHeader, Some(key)) => {
                let header = self.config.auth.key_name.clone().unwrap_or_else(|| "X-Api-Key".to_string());
                request = request.header(header, key);
            }
            (HttpAuthMode::ApiKeyQuery, Some(key)) => {
                let param = self.config.auth.key_name.clone().unwrap_or_else(|| "api_key".to_string());
                request = request.query(&[(param, key)]);
            }
            (HttpAuthMode::Basic, Some(combined)) => {
                if let Some((user, pass)) = combined.split_once(':') {
                    request = request.basic_auth(user, Some(pass));
                }
            }
            _ => {}
        }
        for (key, value) in &self.config.auth.extra_headers {
            request = request.header(key, value);
        }
        for (key, value) in &endpoint.headers {
            request = request.header(key, value);
        }
        request
    }

    async fn fetch_endpoint(&self, endpoint: &HttpEndpointConfig, query: &str) -> CoreResult<Document> {
        let limiter_config = self
            .limiter_configs
            .get(&endpoint.name)
            .cloned()
            .unwrap_or_default();
        self.limiter
            .acquire(&endpoint.name, &limiter_config)
            .await
            .map_err(CoreError::from)?;

        self.request_count.fetch_add(1, Ordering::Relaxed);
        let client = &self.client;
        let endpoint_ref = endpoint;
        let query_params: Vec<(String, String)> = endpoint
            .query_params
            .iter()
            .map(|(k, v)| (k.clone(), v.replace("${query}", query)))
            .collect();

        let result = self
            .breaker
            .call(&endpoint.name, &self.breaker_config, || async move {
                let mut request = match endpoint_ref.method {
                    HttpMethod::Get => client.get(&endpoint_ref.url),
                    HttpMethod::Post => client.post(&endpoint_ref.url),
                };
                request = request.query(&query_params);
                request = self.apply_auth(request, endpoint_ref);
                if endpoint_ref.method == HttpMethod::Post {
                    if let Some(body) = &endpoint_ref.body {
                        request = request.body(body.replace("${query}", query));
                    }
                }
                let response = request
                    .timeout(std::time::Duration::from_millis(endpoint_ref.timeout_ms))
                    .send()
                    .await?;
                let status = response.status();
                let content_type_header = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = response.text().await?;
                Ok::<_, reqwest::Error>((status, content_type_header, body))
            })
            .await;

        let (status, content_type_header, body) = match result {
            Ok(triple) => triple,
            Err(CircuitBreakerError::Open { name }) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                return Err(CoreError::UpstreamUnavailable { adapter: name });
            }
            Err(CircuitBreakerError::Inner(err)) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                return Err(CoreError::Upstream {
                    adapter: endpoint.name.clone(),
                    message: err.to_string(),
                });
            }
        };

        if let Some(err) = status_to_core_error(&endpoint.name, status) {
            self.error_count.fetch_add(1, Ordering::Relaxed);
            return Err(err);
        }

        self.build_document(endpoint, content_type_header.as_deref(), &body)
    }

    fn build_document(
        &self,
        endpoint: &HttpEndpointConfig,
        content_type_header: Option<&str>,
        body: &str,
    ) -> CoreResult<Document> {
        let content_type = classify_content_type(endpoint.content_type, content_type_header, body);

        let (title, content, searchable_content, mut metadata) = match content_type {
            HttpContentType::Html => {
                let processed = runbooks_processor::process(
                    body,
                    Some("html"),
                    Some("text/html"),
                    &endpoint.url,
                    None,
                    &self.processor_config,
                )?;
                let extracted = extract_via_selectors(body, &endpoint.selectors);
                let mut metadata = processed.metadata;
                if !extracted.is_empty() {
                    metadata.insert(
                        "selectors".to_string(),
                        serde_json::to_value(&extracted).unwrap_or_default(),
                    );
                }
                let title = extracted
                    .get("title")
                    .cloned()
                    .unwrap_or(processed.title);
                let content = extracted.get("content").cloned().unwrap_or(processed.content);
                (title, content, processed.searchable_content, metadata)
            }
            HttpContentType::Json => {
                let tree: serde_json::Value = serde_json::from_str(body).map_err(|e| CoreError::Parse {
                    context: endpoint.name.clone(),
                    message: e.to_string(),
                })?;
                let extracted = extract_via_json_paths(&tree, &endpoint.json_paths);
                let searchable = serde_json::to_string(&extracted).unwrap_or_default();
                let mut metadata = HashMap::new();
                metadata.insert("parsed".to_string(), tree.clone());
                (
                    endpoint.name.clone(),
                    serde_json::to_string_pretty(&tree).unwrap_or_else(|_| body.to_string()),
                    searchable,
                    metadata,
                )
            }
            HttpContentType::Xml => {
                let tree = runbooks_processor::xml_tree::parse(body).map_err(|e| CoreError::Parse {
                    context: endpoint.name.clone(),
                    message: e.to_string(),
                })?;
                let extracted = extract_via_xpaths(&tree, &endpoint.xml_xpaths);
                let searchable = serde_json::to_string(&extracted).unwrap_or_default();
                let mut metadata = HashMap::new();
                metadata.insert("parsed".to_string(), tree.clone());
                (
                    endpoint.name.clone(),
                    serde_json::to_string_pretty(&tree).unwrap_or_else(|_| body.to_string()),
                    searchable,
                    metadata,
                )
            }
            HttpContentType::Text | HttpContentType::Auto => {
                let title = body
                    .lines()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or(&endpoint.name)
                    .trim()
                    .to_string();
                (title, body.to_string(), body.to_string(), HashMap::new())
            }
        };

        metadata.insert("endpoint".to_string(), serde_json::Value::String(endpoint.name.clone()));

        Ok(Document {
            id: endpoint_document_id(&self.config.name, &endpoint.name),
            title,
            content,
            searchable_content,
            source: self.config.name.clone(),
            source_type: SourceType::Http,
            url: endpoint.url.clone(),
            last_modified: Utc::now(),
            metadata,
        })
    }

    fn score(&self, query: &str, doc: &Document) -> f64 {
        confidence::score(&confidence::ConfidenceInputs {
            query,
            title: &doc.title,
            content: &doc.content,
            path_or_url: &doc.url,
            source_name: &self.config.name,
            is_markdown: false,
            is_structured_runbook: false,
            is_wiki_like: false,
            last_modified: Some(doc.last_modified),
            now: Utc::now(),
        })
    }

    async fn fetch_all(&self, query: &str) -> Vec<Document> {
        let mut documents = Vec::new();
        for endpoint in &self.config.endpoints {
            match self.fetch_endpoint(endpoint, query).await {
                Ok(doc) => documents.push(doc),
                Err(err) => {
                    tracing::warn!(adapter = %self.config.name, endpoint = %endpoint.name, %err, "endpoint fetch failed, skipping");
                }
            }
        }
        let mut cache = self.last_results.write().await;
        for doc in &documents {
            cache.insert(doc.id.clone(), doc.clone());
        }
        documents
    }
}

fn missing_env(adapter: &str, var: &str) -> CoreError {
    CoreError::Config {
        adapter: adapter.to_string(),
        message: format!("missing required environment variable '{var}'"),
    }
}

fn endpoint_document_id(adapter: &str, endpoint: &str) -> String {
    format!("{adapter}:{endpoint}")
}

/// 401/403 -> AUTH, 429 -> RATE_LIMITED, other 4xx/5xx -> UPSTREAM (spec §4.C7d).
fn status_to_core_error(adapter: &str, status: reqwest::StatusCode) -> Option<CoreError> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Some(CoreError::Auth {
            adapter: adapter.to_string(),
            message: format!("endpoint returned {status}"),
        });
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Some(CoreError::RateLimited {
            adapter: adapter.to_string(),
            reset_at: None,
            remaining_secs: None,
        });
    }
    if status.is_client_error() || status.is_server_error() {
        return Some(CoreError::Upstream {
            adapter: adapter.to_string(),
            message: format!("endpoint returned {status}"),
        });
    }
    None
}

fn classify_content_type(configured: HttpContentType, header: Option<&str>, body: &str) -> HttpContentType {
    if configured != HttpContentType::Auto {
        return configured;
    }
    if let Some(header) = header {
        if header.contains("json") {
            return HttpContentType::Json;
        }
        if header.contains("xml") {
            return HttpContentType::Xml;
        }
        if header.contains("html") {
            return HttpContentType::Html;
        }
        if header.contains("text") {
            return HttpContentType::Text;
        }
    }
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        HttpContentType::Json
    } else if trimmed.starts_with("<?xml") {
        HttpContentType::Xml
    } else if trimmed.starts_with('<') {
        HttpContentType::Html
    } else {
        HttpContentType::Text
    }
}

/// CSS-selector extraction; `exclude_*` selector keys remove sub-trees
/// before extraction, other keys map directly to an output field.
fn extract_via_selectors(html: &str, selectors: &HashMap<String, String>) -> HashMap<String, String> {
    use scraper::{Html, Selector};

    let document = Html::parse_document(html);
    let mut out = HashMap::new();
    for (field, selector_str) in selectors {
        if field.starts_with("exclude_") {
            continue;
        }
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let text: String = document
            .select(&selector)
            .flat_map(|el| el.text())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();
        if !text.is_empty() {
            out.insert(field.clone(), text);
        }
    }
    out
}

/// JSONPath extraction producing `{path_key: values}`; the whole tree if no
/// paths are configured.
fn extract_via_json_paths(tree: &serde_json::Value, json_paths: &HashMap<String, String>) -> serde_json::Value {
    if json_paths.is_empty() {
        return tree.clone();
    }
    let mut out = serde_json::Map::new();
    for (key, path) in json_paths {
        let values = jsonpath_rust::JsonPathFinder::from_str(&tree.to_string(), path)
            .map(|finder| finder.find())
            .unwrap_or(serde_json::Value::Null);
        out.insert(key.clone(), values);
    }
    serde_json::Value::Object(out)
}

/// A simplified `/a/b/c` XPath subset over the JSON tree produced by
/// `runbooks_processor::xml_tree::parse`; no predicates or wildcards.
fn extract_via_xpaths(tree: &serde_json::Value, xpaths: &HashMap<String, String>) -> serde_json::Value {
    if xpaths.is_empty() {
        return tree.clone();
    }
    let mut out = serde_json::Map::new();
    for (key, path) in xpaths {
        let mut current = Some(tree);
        for segment in path.trim_start_matches('/').split('/').filter(|s| !s.is_empty()) {
            current = current.and_then(|v| v.get(segment));
        }
        out.insert(key.clone(), current.cloned().unwrap_or(serde_json::Value::Null));
    }
    serde_json::Value::Object(out)
}

#[async_trait]
impl SourceAdapter for HttpAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn categories(&self) -> &[String] {
        &self.config.categories
    }

    async fn initialize(&self) -> CoreResult<()> {
        Ok(())
    }

    async fn search(&self, query: &str, filters: &Filters) -> CoreResult<Vec<SearchResult>> {
        if categories_excluded(filters, &self.config.categories) {
            return Ok(Vec::new());
        }
        let documents = self.fetch_all(query).await;
        let results: Vec<SearchResult> = documents
            .iter()
            .map(|doc| {
                let score = self.score(query, doc);
                SearchResult {
                    document: doc.clone(),
                    confidence_score: score,
                    match_reasons: vec!["http_endpoint_match".to_string()],
                    retrieval_time_ms: 0,
                }
            })
            .collect();
        Ok(apply_filters(results, filters))
    }

    async fn get_document(&self, id: &str) -> CoreResult<Option<SearchResult>> {
        let cache = self.last_results.read().await;
        Ok(cache.get(id).map(|doc| SearchResult {
            document: doc.clone(),
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
        let query = format!("{alert_type} {severity}");
        let documents = self.fetch_all(&query).await;
        let mut runbooks: Vec<Runbook> = documents
            .iter()
            .map(|doc| extract_or_synthesize(&doc.title, &doc.content, alert_type, severity, systems, 0.5))
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
        Health {
            healthy: errors < requests || requests == 0,
            message: None,
            document_count: -1,
            last_indexed: None,
            avg_response_time_ms: None,
            success_rate: if requests > 0 {
                Some(1.0 - (errors as f64 / requests as f64))
            } else {
                None
            },
        }
    }

    async fn refresh_index(&self, _force: bool) -> CoreResult<bool> {
        // Endpoints are polled live on every search; nothing to refresh.
        Ok(true)
    }

    async fn metadata(&self) -> AdapterMetadata {
        let requests = self.request_count.load(Ordering::Relaxed);
        let errors = self.error_count.load(Ordering::Relaxed);
        AdapterMetadata {
            name: self.config.name.clone(),
            source_type: SourceType::Http,
            document_count: -1,
            last_indexed: None,
            avg_response_time_ms: None,
            success_rate: if requests > 0 {
                Some(1.0 - (errors as f64 / requests as f64))
            } else {
                None
            },
        }
    }

    async fn cleanup(&self) -> CoreResult<()> {
        self.last_results.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_json_by_header() {
        assert_eq!(
            classify_content_type(HttpContentType::Auto, Some("application/json"), "{}"),
            HttpContentType::Json
        );
    }

    #[test]
    fn sniffs_xml_by_body_when_header_absent() {
        assert_eq!(
            classify_content_type(HttpContentType::Auto, None, "<?xml version=\"1.0\"?><a/>"),
            HttpContentType::Xml
        );
    }

    #[test]
    fn status_mapping_covers_auth_and_rate_limit() {
        assert!(matches!(
            status_to_core_error("ep", reqwest::StatusCode::UNAUTHORIZED),
            Some(CoreError::Auth { .. })
        ));
        assert!(matches!(
            status_to_core_error("ep", reqwest::StatusCode::TOO_MANY_REQUESTS),
            Some(CoreError::RateLimited { .. })
        ));
        assert!(status_to_core_error("ep", reqwest::StatusCode::OK).is_none());
    }

    #[test]
    fn simplified_xpath_walks_nested_objects() {
        let tree = serde_json::json!({"root": {"child": {"value": "hi"}}});
        let mut xpaths = HashMap::new();
        xpaths.insert("v".to_string(), "/root/child/value".to_string());
        let extracted = extract_via_xpaths(&tree, &xpaths);
        assert_eq!(extracted.get("v").and_then(|v| v.as_str()), Some("hi"));
    }
}
