//! Forge adapter (spec §4.C7c): indexes documentation-shaped files out of
//! one or more git-forge repositories (GitHub-shaped REST API), behind a
//! pre-flight validation pass and per-repo cache freshness.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock as AsyncRwLock;

use runbooks_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry};
use runbooks_core::{
    AdapterMetadata, CoreError, CoreResult, Document, Filters, Health, Runbook, SearchResult, SourceType,
};
use runbooks_extractor::{extract_or_synthesize, is_runbook_like};
use runbooks_index::FuzzyIndex;
use runbooks_processor::ProcessorConfig;
use runbooks_ratelimiter::{RateLimiterConfig, RateLimiterRegistry};

use crate::adapter::{apply_filters, categories_excluded, SourceAdapter};
use crate::config::{self, ForgeAdapterConfig};

const EXACT_FALLBACK_THRESHOLD: f64 = 0.6;
const SUBSTRING_FALLBACK_SCORE: f64 = 0.1;
const PATH_KEYWORDS: &[&str] = &[
    "runbook",
    "ops",
    "operations",
    "troubleshoot",
    "incident",
    "procedure",
    "playbook",
    "sre",
];
const DOC_EXTENSIONS: &[&str] = &["md", "txt", "json", "yml", "yaml", "rst", "adoc"];

struct RepoIndex {
    documents: Vec<Document>,
    last_indexed: DateTime<Utc>,
}

pub struct ForgeAdapter {
    config: ForgeAdapterConfig,
    token: String,
    client: reqwest::Client,
    limiter: RateLimiterRegistry,
    limiter_config: RateLimiterConfig,
    breaker: CircuitBreakerRegistry,
    breaker_config: CircuitBreakerConfig,
    processor_config: ProcessorConfig,
    repos: AsyncRwLock<HashMap<String, RepoIndex>>,
    indexing: Arc<AtomicBool>,
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
}

impl ForgeAdapter {
    pub fn new(config: ForgeAdapterConfig) -> CoreResult<Self> {
        let prefix = config.name.to_uppercase().replace(['-', ' '], "_");
        let token = std::env::var(format!("{prefix}_TOKEN")).map_err(|_| CoreError::Config {
            adapter: config.name.clone(),
            message: format!("missing required environment variable '{prefix}_TOKEN'"),
        })?;

        let mut repos = config.repos.clone();
        if repos.len() > config::DEFAULT_BULK_SCAN_CEILING {
            tracing::warn!(
                adapter = %config.name,
                requested = repos.len(),
                ceiling = config::DEFAULT_BULK_SCAN_CEILING,
                "truncating repo list to the bulk-scan ceiling"
            );
            repos.truncate(config::DEFAULT_BULK_SCAN_CEILING);
        }
        if config.org_scan && !config.org_scan_consent {
            tracing::warn!(
                adapter = %config.name,
                "organization scanning requested without explicit consent; skipping the org walk"
            );
        }

        let limiter_config = RateLimiterConfig::from_advertised_limit(
            config.advertised_hourly_quota,
            config::DEFAULT_FORGE_QUOTA_CEILING_PERCENT / 100.0,
            std::time::Duration::from_millis(config::DEFAULT_FORGE_MIN_INTERVAL_MS),
            5,
        );

        let mut config = config;
        config.repos = repos;

        Ok(Self {
            breaker_config: CircuitBreakerConfig::new(format!("forge-{}", config.name)).failure_threshold(5),
            token,
            client: reqwest::Client::new(),
            limiter: RateLimiterRegistry::new(),
            limiter_config,
            breaker: CircuitBreakerRegistry::new(),
            processor_config: ProcessorConfig::default(),
            repos: AsyncRwLock::new(HashMap::new()),
            indexing: Arc::new(AtomicBool::new(false)),
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            config,
        })
    }

    fn matches_doc_pattern(path: &str) -> bool {
        let lower = path.to_lowercase();
        let extension_ok = DOC_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(&format!(".{ext}")));
        let name = lower.rsplit('/').next().unwrap_or(&lower);

        if name.contains("readme") {
            return true;
        }
        if (lower.starts_with("docs/") || lower.starts_with("doc/")) && extension_ok {
            return true;
        }
        if PATH_KEYWORDS.iter().any(|kw| name.contains(kw)) {
            return true;
        }
        false
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ForgeCallError> {
        self.limiter
            .acquire(&self.config.name, &self.limiter_config)
            .await
            .map_err(|e| ForgeCallError::Upstream(e.to_string()))?;

        self.request_count.fetch_add(1, Ordering::Relaxed);
        let client = &self.client;
        let token = &self.token;
        let result = self
            .breaker
            .call(&self.config.name, &self.breaker_config, || async move {
                let response = client
                    .get(url)
                    .header("Authorization", format!("token {token}"))
                    .timeout(std::time::Duration::from_millis(self.config.timeout_ms))
                    .send()
                    .await?;
                let status = response.status();
                if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                    return Err(ForgeCallError::Auth);
                }
                if !status.is_success() {
                    return Err(ForgeCallError::Upstream(format!("status {status}")));
                }
                response.json::<T>().await.map_err(|e| ForgeCallError::Upstream(e.to_string()))
            })
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::Open { name }) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                Err(ForgeCallError::CircuitOpen(name))
            }
            Err(CircuitBreakerError::Inner(inner)) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                Err(inner)
            }
        }
    }

    async fn index_repo(&self, repo: &str) -> CoreResult<RepoIndex> {
        let repo_meta: GitRepoMeta = self
            .get_json(&format!("{}/repos/{}/{}", self.config.base_url, self.config.owner, repo))
            .await
            .map_err(|e| self.to_core_error(e))?;

        let tree: GitTreeResponse = self
            .get_json(&format!(
                "{}/repos/{}/{}/git/trees/{}?recursive=1",
                self.config.base_url, self.config.owner, repo, repo_meta.default_branch
            ))
            .await
            .map_err(|e| self.to_core_error(e))?;

        let candidate_paths: Vec<String> = tree
            .tree
            .into_iter()
            .filter(|entry| entry.entry_type == "blob" && Self::matches_doc_pattern(&entry.path))
            .map(|entry| entry.path)
            .collect();

        use futures::stream::{self, StreamExt};

        let documents = stream::iter(candidate_paths)
            .map(|path| {
                let url = format!(
                    "{}/repos/{}/{}/contents/{}",
                    self.config.base_url, self.config.owner, repo, path
                );
                async move { self.fetch_and_process_file(repo, &path, &url, &repo_meta.default_branch).await }
            })
            .buffer_unordered(config::DEFAULT_FORGE_MAX_CONCURRENCY)
            .filter_map(|doc| async move { doc })
            .collect::<Vec<Document>>()
            .await;

        Ok(RepoIndex {
            documents,
            last_indexed: Utc::now(),
        })
    }

    async fn fetch_and_process_file(&self, repo: &str, path: &str, url: &str, default_branch: &str) -> Option<Document> {
        let content: GitContentResponse = match self.get_json(url).await {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(repo, path, %err, "skipping file that failed to fetch");
                return None;
            }
        };
        if content.size > self.config.max_file_size_kb * 1000 {
            tracing::warn!(repo, path, size = content.size, "skipping oversized forge file");
            return None;
        }
        let cleaned: String = content.content.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = match base64::engine::general_purpose::STANDARD.decode(&cleaned) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(repo, path, %err, "skipping file with invalid base64 payload");
                return None;
            }
        };
        let raw = match String::from_utf8(decoded) {
            Ok(raw) => raw,
            Err(_) => {
                tracing::warn!(repo, path, "skipping non-utf8 forge file");
                return None;
            }
        };
        let processed = match runbooks_processor::process(&raw, None, None, path, None, &self.processor_config) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(repo, path, %err, "skipping file that failed processing");
                return None;
            }
        };
        Some(Document {
            id: format!("{}/{repo}:{path}", self.config.owner),
            title: processed.title,
            content: processed.content,
            searchable_content: processed.searchable_content,
            source: self.config.name.clone(),
            source_type: SourceType::Forge,
            url: format!("{}/{}/{repo}/blob/{default_branch}/{path}", self.config.base_url, self.config.owner),
            last_modified: Utc::now(),
            metadata: processed.metadata,
        })
    }

    fn to_core_error(&self, err: ForgeCallError) -> CoreError {
        match err {
            ForgeCallError::Auth => CoreError::Auth {
                adapter: self.config.name.clone(),
                message: "forge rejected credentials".to_string(),
            },
            ForgeCallError::CircuitOpen(name) => CoreError::UpstreamUnavailable { adapter: name },
            ForgeCallError::Upstream(message) => CoreError::Upstream {
                adapter: self.config.name.clone(),
                message,
            },
        }
    }

    async fn ensure_fresh(&self, force: bool) {
        let ttl = config::parse_cache_ttl(&self.config.cache_ttl);
        let now = Utc::now();
        let stale_repos: Vec<String> = {
            let repos = self.repos.read().await;
            self.config
                .repos
                .iter()
                .filter(|repo| {
                    force
                        || repos
                            .get(*repo)
                            .map(|idx| now.signed_duration_since(idx.last_indexed).to_std().unwrap_or_default() >= ttl)
                            .unwrap_or(true)
                })
                .cloned()
                .collect()
        };

        for repo in stale_repos {
            match self.index_repo(&repo).await {
                Ok(index) => {
                    self.repos.write().await.insert(repo, index);
                }
                Err(err) => {
                    tracing::warn!(adapter = %self.config.name, repo, %err, "failed to index repo, keeping previous snapshot");
                }
            }
        }
    }

    fn all_documents<'a>(&self, repos: &'a HashMap<String, RepoIndex>) -> Vec<&'a Document> {
        repos.values().flat_map(|idx| idx.documents.iter()).collect()
    }
}

#[derive(Debug, thiserror::Error)]
enum ForgeCallError {
    #[error("auth rejected")]
    Auth,
    #[error("circuit open for '{0}'")]
    CircuitOpen(String),
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for ForgeCallError {
    fn from(err: reqwest::Error) -> Self {
        ForgeCallError::Upstream(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct GitRepoMeta {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct GitTreeResponse {
    tree: Vec<GitTreeEntry>,
}

#[derive(Debug, Deserialize)]
struct GitTreeEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
}

#[derive(Debug, Deserialize)]
struct GitContentResponse {
    content: String,
    size: u64,
}

#[async_trait]
impl SourceAdapter for ForgeAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn categories(&self) -> &[String] {
        &self.config.categories
    }

    async fn initialize(&self) -> CoreResult<()> {
        self.ensure_fresh(true).await;
        Ok(())
    }

    async fn search(&self, query: &str, filters: &Filters) -> CoreResult<Vec<SearchResult>> {
        if categories_excluded(filters, &self.config.categories) {
            return Ok(Vec::new());
        }

        let repos = self.repos.read().await;
        let documents: Vec<Document> = self.all_documents(&repos).into_iter().cloned().collect();
        let index = FuzzyIndex::new(&documents);

        let mut hits = index.search(query);
        hits.retain(|hit| hit.score >= EXACT_FALLBACK_THRESHOLD);

        if hits.is_empty() {
            for token in query.split_whitespace() {
                for hit in index.search(token) {
                    if hit.score >= EXACT_FALLBACK_THRESHOLD && !hits.iter().any(|h| h.document.id == hit.document.id) {
                        hits.push(hit);
                    }
                }
            }
        }

        let results: Vec<SearchResult> = if hits.is_empty() {
            let needle = query.to_lowercase();
            if needle.is_empty() {
                Vec::new()
            } else {
                documents
                    .iter()
                    .filter(|doc| {
                        doc.searchable_content.to_lowercase().contains(&needle)
                            || doc.content.to_lowercase().contains(&needle)
                    })
                    .map(|doc| SearchResult {
                        document: doc.clone(),
                        confidence_score: SUBSTRING_FALLBACK_SCORE,
                        match_reasons: vec!["substring_fallback".to_string()],
                        retrieval_time_ms: 0,
                    })
                    .collect()
            }
        } else {
            hits.into_iter()
                .map(|hit| SearchResult {
                    document: hit.document.clone(),
                    confidence_score: hit.score,
                    match_reasons: hit.matched_fields.iter().map(|f| f.to_string()).collect(),
                    retrieval_time_ms: 0,
                })
                .collect()
        };

        Ok(apply_filters(results, filters))
    }

    async fn get_document(&self, id: &str) -> CoreResult<Option<SearchResult>> {
        let repos = self.repos.read().await;
        Ok(self
            .all_documents(&repos)
            .into_iter()
            .find(|d| d.id == id)
            .map(|doc| SearchResult {
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
        let repos = self.repos.read().await;
        let mut runbooks: Vec<Runbook> = self
            .all_documents(&repos)
            .into_iter()
            .filter(|doc| is_runbook_like(&doc.url, &doc.title, &doc.content, alert_type, severity))
            .map(|doc| extract_or_synthesize(&doc.title, &doc.content, alert_type, severity, systems, 0.55))
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
        let repos = self.repos.read().await;
        let requests = self.request_count.load(Ordering::Relaxed);
        let errors = self.error_count.load(Ordering::Relaxed);
        let last_indexed = repos.values().map(|idx| idx.last_indexed).max();
        Health {
            healthy: errors < requests || requests == 0,
            message: None,
            document_count: self.all_documents(&repos).len() as i64,
            last_indexed,
            avg_response_time_ms: None,
            success_rate: if requests > 0 {
                Some(1.0 - (errors as f64 / requests as f64))
            } else {
                None
            },
        }
    }

    async fn refresh_index(&self, force: bool) -> CoreResult<bool> {
        if self.indexing.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        self.ensure_fresh(force).await;
        self.indexing.store(false, Ordering::SeqCst);
        Ok(true)
    }

    async fn metadata(&self) -> AdapterMetadata {
        let repos = self.repos.read().await;
        let requests = self.request_count.load(Ordering::Relaxed);
        let errors = self.error_count.load(Ordering::Relaxed);
        AdapterMetadata {
            name: self.config.name.clone(),
            source_type: SourceType::Forge,
            document_count: self.all_documents(&repos).len() as i64,
            last_indexed: repos.values().map(|idx| idx.last_indexed).max(),
            avg_response_time_ms: None,
            success_rate: if requests > 0 {
                Some(1.0 - (errors as f64 / requests as f64))
            } else {
                None
            },
        }
    }

    async fn cleanup(&self) -> CoreResult<()> {
        self.repos.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_readme_docs_and_keyword_paths() {
        assert!(ForgeAdapter::matches_doc_pattern("README.md"));
        assert!(ForgeAdapter::matches_doc_pattern("docs/deploy.md"));
        assert!(ForgeAdapter::matches_doc_pattern("ops/disk-full-runbook.md"));
        assert!(!ForgeAdapter::matches_doc_pattern("src/main.rs"));
    }

    #[test]
    fn missing_token_is_a_config_error() {
        std::env::remove_var("NO_SUCH_FORGE_TOKEN");
        let config = ForgeAdapterConfig {
            name: "no-such-forge".to_string(),
            base_url: "https://example.invalid".to_string(),
            owner: "acme".to_string(),
            repos: vec!["docs".to_string()],
            categories: vec![],
            org_scan: false,
            org_scan_consent: false,
            max_file_size_kb: 1024,
            cache_ttl: "4h".to_string(),
            timeout_ms: 5000,
            advertised_hourly_quota: 5000,
        };
        let err = ForgeAdapter::new(config).unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn bulk_scan_ceiling_truncates_repo_list() {
        std::env::set_var("BIG_FORGE_TOKEN", "t");
        let repos: Vec<String> = (0..20).map(|i| format!("repo-{i}")).collect();
        let config = ForgeAdapterConfig {
            name: "big-forge".to_string(),
            base_url: "https://example.invalid".to_string(),
            owner: "acme".to_string(),
            repos,
            categories: vec![],
            org_scan: false,
            org_scan_consent: false,
            max_file_size_kb: 1024,
            cache_ttl: "4h".to_string(),
            timeout_ms: 5000,
            advertised_hourly_quota: 5000,
        };
        let adapter = ForgeAdapter::new(config).unwrap();
        assert_eq!(adapter.config.repos.len(), config::DEFAULT_BULK_SCAN_CEILING);
        std::env::remove_var("BIG_FORGE_TOKEN");
    }
}
