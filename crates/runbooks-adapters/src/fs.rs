//! Filesystem adapter (spec §4.C7a): walks configured roots, normalizes
//! every recognized file via `runbooks-processor`, and indexes the result
//! with `runbooks-index`'s fuzzy matcher.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock as AsyncRwLock;

use runbooks_core::{
    AdapterMetadata, CoreResult, Document, Filters, Health, Runbook, SearchResult, SourceType,
};
use runbooks_extractor::{extract_or_synthesize, is_runbook_like};
use runbooks_index::FuzzyIndex;
use runbooks_processor::ProcessorConfig;

use crate::adapter::{apply_filters, categories_excluded, SourceAdapter};
use crate::config::FsAdapterConfig;

const SUBSTRING_FALLBACK_SCORE: f64 = 0.1;

pub struct FilesystemAdapter {
    config: FsAdapterConfig,
    processor_config: ProcessorConfig,
    documents: Arc<AsyncRwLock<Vec<Document>>>,
    indexing: Arc<AtomicBool>,
    last_indexed: Arc<parking_lot::Mutex<Option<DateTime<Utc>>>>,
}

impl FilesystemAdapter {
    pub fn new(config: FsAdapterConfig) -> Self {
        Self {
            config,
            processor_config: ProcessorConfig::default(),
            documents: Arc::new(AsyncRwLock::new(Vec::new())),
            indexing: Arc::new(AtomicBool::new(false)),
            last_indexed: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    fn should_skip_dir(&self, entry_name: &str) -> bool {
        entry_name.starts_with('.') || self.config.exclude.iter().any(|x| x == entry_name)
    }

    fn recognized_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.config.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    fn walk_candidates(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for root in &self.config.roots {
            let max_depth = if self.config.recursive {
                self.config.max_depth as usize
            } else {
                1
            };
            let walker = walkdir::WalkDir::new(root)
                .max_depth(max_depth)
                .into_iter()
                .filter_entry(|e| {
                    if e.file_type().is_dir() {
                        e.file_name()
                            .to_str()
                            .map(|n| !self.should_skip_dir(n))
                            .unwrap_or(true)
                    } else {
                        true
                    }
                });
            for entry in walker.filter_map(Result::ok) {
                if entry.file_type().is_file() && self.recognized_extension(entry.path()) {
                    out.push(entry.path().to_path_buf());
                }
            }
        }
        out
    }

    async fn process_one(&self, path: &Path) -> Option<Document> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        if metadata.len() > self.config.size_cap_bytes {
            tracing::warn!(path = %path.display(), size = metadata.len(), "skipping oversized file");
            return None;
        }
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping unreadable/non-utf8 file");
                return None;
            }
        };
        let path_str = path.to_string_lossy().to_string();
        let processed = match runbooks_processor::process(&raw, None, None, &path_str, None, &self.processor_config) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping file that failed processing");
                return None;
            }
        };
        let last_modified = metadata
            .modified()
            .ok()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(Utc::now);

        let mut digest = Sha256::new();
        digest.update(path_str.as_bytes());
        let id = format!("{:x}", digest.finalize());

        Some(Document {
            id,
            title: processed.title,
            content: processed.content,
            searchable_content: processed.searchable_content,
            source: self.config.name.clone(),
            source_type: SourceType::Filesystem,
            url: format!("file://{path_str}"),
            last_modified,
            metadata: processed.metadata,
        })
    }

    async fn rebuild_all(&self) {
        let candidates = self.walk_candidates();
        let mut documents = Vec::with_capacity(candidates.len());
        for path in &candidates {
            if let Some(doc) = self.process_one(path).await {
                documents.push(doc);
            }
        }
        *self.documents.write().await = documents;
        *self.last_indexed.lock() = Some(Utc::now());
    }

    /// Delta update: only files modified after the last index run are
    /// reprocessed; everything else is kept from the in-memory set.
    async fn rebuild_delta(&self) {
        let since = *self.last_indexed.lock();
        let Some(since) = since else {
            return self.rebuild_all().await;
        };

        let candidates = self.walk_candidates();
        let mut existing = self.documents.write().await;
        let mut still_present: HashMap<String, ()> = HashMap::new();

        for path in &candidates {
            let path_str = path.to_string_lossy().to_string();
            let url = format!("file://{path_str}");
            let changed = tokio::fs::metadata(path)
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from)
                .map(|mtime| mtime > since)
                .unwrap_or(true);

            if changed {
                if let Some(doc) = self.process_one(path).await {
                    still_present.insert(doc.url.clone(), ());
                    if let Some(slot) = existing.iter_mut().find(|d| d.url == doc.url) {
                        *slot = doc;
                    } else {
                        existing.push(doc);
                    }
                }
            } else {
                still_present.insert(url, ());
            }
        }
        existing.retain(|d| still_present.contains_key(&d.url));
        *self.last_indexed.lock() = Some(Utc::now());
    }

    fn spawn_watcher(&self) {
        use notify::{RecommendedWatcher, RecursiveMode, Watcher};

        let documents = self.documents.clone();
        let processor_config = self.processor_config.clone();
        let source_name = self.config.name.clone();
        let roots = self.config.roots.clone();
        let size_cap = self.config.size_cap_bytes;
        let extensions = self.config.extensions.clone();

        let (tx, rx) = std::sync::mpsc::channel();
        let watcher_result = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        );

        let mut watcher = match watcher_result {
            Ok(w) => w,
            Err(err) => {
                tracing::warn!(%err, adapter = %source_name, "failed to start filesystem watcher");
                return;
            }
        };
        for root in &roots {
            if let Err(err) = watcher.watch(Path::new(root), RecursiveMode::Recursive) {
                tracing::warn!(%err, root, "failed to watch root");
            }
        }
        // Keep the watcher alive for the adapter's lifetime.
        std::mem::forget(watcher);

        let handle = tokio::runtime::Handle::current();
        std::thread::spawn(move || {
            while let Ok(Ok(event)) = rx.recv() {
                for path in event.paths {
                    let recognized = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
                        .unwrap_or(false);
                    if !recognized {
                        continue;
                    }
                    let documents = documents.clone();
                    let processor_config = processor_config.clone();
                    let source_name = source_name.clone();
                    let size_cap = size_cap;
                    let is_remove = matches!(event.kind, notify::EventKind::Remove(_));
                    handle.spawn(async move {
                        let url = format!("file://{}", path.to_string_lossy());
                        if is_remove {
                            documents.write().await.retain(|d| d.url != url);
                            return;
                        }
                        let Ok(metadata) = tokio::fs::metadata(&path).await else {
                            return;
                        };
                        if metadata.len() > size_cap {
                            return;
                        }
                        let Ok(raw) = tokio::fs::read_to_string(&path).await else {
                            return;
                        };
                        let path_str = path.to_string_lossy().to_string();
                        let Ok(processed) =
                            runbooks_processor::process(&raw, None, None, &path_str, None, &processor_config)
                        else {
                            return;
                        };
                        let mut digest = Sha256::new();
                        digest.update(path_str.as_bytes());
                        let id = format!("{:x}", digest.finalize());
                        let doc = Document {
                            id,
                            title: processed.title,
                            content: processed.content,
                            searchable_content: processed.searchable_content,
                            source: source_name,
                            source_type: SourceType::Filesystem,
                            url,
                            last_modified: Utc::now(),
                            metadata: processed.metadata,
                        };
                        let mut guard = documents.write().await;
                        if let Some(slot) = guard.iter_mut().find(|d| d.url == doc.url) {
                            *slot = doc;
                        } else {
                            guard.push(doc);
                        }
                    });
                }
            }
        });
    }
}

#[async_trait]
impl SourceAdapter for FilesystemAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn categories(&self) -> &[String] {
        &self.config.categories
    }

    async fn initialize(&self) -> CoreResult<()> {
        self.rebuild_all().await;
        if self.config.watch {
            self.spawn_watcher();
        }
        Ok(())
    }

    async fn search(&self, query: &str, filters: &Filters) -> CoreResult<Vec<SearchResult>> {
        if categories_excluded(filters, &self.config.categories) {
            return Ok(Vec::new());
        }

        let documents = self.documents.read().await;
        let index = FuzzyIndex::new(&documents);
        let hits = index.search(query);

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
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|d| d.id == id).map(|doc| SearchResult {
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
        let documents = self.documents.read().await;
        let mut runbooks: Vec<Runbook> = documents
            .iter()
            .filter(|doc| is_runbook_like(&doc.url, &doc.title, &doc.content, alert_type, severity))
            .map(|doc| {
                extract_or_synthesize(&doc.title, &doc.content, alert_type, severity, systems, 0.6)
            })
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
        let documents = self.documents.read().await;
        Health {
            healthy: true,
            message: None,
            document_count: documents.len() as i64,
            last_indexed: *self.last_indexed.lock(),
            avg_response_time_ms: None,
            success_rate: None,
        }
    }

    async fn refresh_index(&self, force: bool) -> CoreResult<bool> {
        if self.indexing.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        if force {
            self.rebuild_all().await;
        } else {
            self.rebuild_delta().await;
        }
        self.indexing.store(false, Ordering::SeqCst);
        Ok(true)
    }

    async fn metadata(&self) -> AdapterMetadata {
        let documents = self.documents.read().await;
        AdapterMetadata {
            name: self.config.name.clone(),
            source_type: SourceType::Filesystem,
            document_count: documents.len() as i64,
            last_indexed: *self.last_indexed.lock(),
            avg_response_time_ms: None,
            success_rate: None,
        }
    }

    async fn cleanup(&self) -> CoreResult<()> {
        self.documents.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_for(root: &Path) -> FsAdapterConfig {
        FsAdapterConfig {
            name: "local-docs".to_string(),
            roots: vec![root.to_string_lossy().to_string()],
            categories: vec!["runbook".to_string()],
            recursive: true,
            max_depth: 10,
            extensions: vec!["md".to_string()],
            exclude: vec![".git".to_string()],
            size_cap_bytes: 10 * 1024 * 1024,
            watch: false,
        }
    }

    #[tokio::test]
    async fn indexes_and_finds_a_markdown_runbook() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("disk-full.md");
        let mut file = std::fs::File::create(&file_path).unwrap();
        writeln!(file, "# Disk Full\n1. check df -h\n2. clear logs").unwrap();

        let adapter = FilesystemAdapter::new(config_for(dir.path()));
        adapter.initialize().await.unwrap();

        let results = adapter.search("disk full", &Filters::default()).await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].document.title, "Disk Full");
    }

    #[tokio::test]
    async fn substring_fallback_fires_on_zero_fuzzy_hits() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("notes.md");
        let mut file = std::fs::File::create(&file_path).unwrap();
        writeln!(file, "zzzqqqxxx unrelated marker text").unwrap();

        let adapter = FilesystemAdapter::new(config_for(dir.path()));
        adapter.initialize().await.unwrap();

        let results = adapter.search("zzzqqqxxx", &Filters::default()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].confidence_score, SUBSTRING_FALLBACK_SCORE);
    }

    #[tokio::test]
    async fn oversized_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.md");
        std::fs::write(&file_path, "x".repeat(200)).unwrap();

        let mut config = config_for(dir.path());
        config.size_cap_bytes = 10;
        let adapter = FilesystemAdapter::new(config);
        adapter.initialize().await.unwrap();

        let health = adapter.health_check().await;
        assert_eq!(health.document_count, 0);
    }

    #[tokio::test]
    async fn refresh_index_is_idempotent_under_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FilesystemAdapter::new(config_for(dir.path()));
        adapter.indexing.store(true, Ordering::SeqCst);
        let result = adapter.refresh_index(true).await.unwrap();
        assert!(!result);
    }
}
