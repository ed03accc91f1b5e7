//! Weighted multi-field fuzzy index (spec §4.C5), grounded on
//! `outfitter-dev-blz`'s use of `fuzzy-matcher`'s `SkimMatcherV2` for local
//! documentation search.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use runbooks_core::Document;

/// Minimum query length the index will score at all (spec §4.C5).
const MIN_MATCH_LEN: usize = 2;
/// Below this normalized score a field contributes nothing (spec's "~0.4").
const FIELD_THRESHOLD: f64 = 0.4;
/// Field text longer than this is truncated before matching; the spec calls
/// this a "distance budget" and leaves the exact scheme to the
/// implementation, provided the result stays bounded.
const DISTANCE_BUDGET_CHARS: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct FieldWeights {
    pub title: f64,
    pub searchable_content: f64,
    pub content: f64,
    pub path: f64,
    pub tags: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            title: 0.3,
            searchable_content: 0.5,
            content: 0.2,
            path: 0.1,
            tags: 0.3,
        }
    }
}

/// A single ranked hit: the matched document, its raw (pre-clamp) fused
/// score, and the names of the fields that matched.
#[derive(Debug, Clone)]
pub struct IndexHit<'a> {
    pub document: &'a Document,
    pub score: f64,
    pub matched_fields: Vec<&'static str>,
}

/// An index over a borrowed document collection. Rebuilt wholesale on every
/// `refresh_index` by the owning adapter; it does not track individual
/// document mutations.
pub struct FuzzyIndex<'a> {
    documents: &'a [Document],
    weights: FieldWeights,
    matcher: SkimMatcherV2,
}

impl<'a> FuzzyIndex<'a> {
    pub fn new(documents: &'a [Document]) -> Self {
        Self::with_weights(documents, FieldWeights::default())
    }

    pub fn with_weights(documents: &'a [Document], weights: FieldWeights) -> Self {
        Self {
            documents,
            weights,
            matcher: SkimMatcherV2::default(),
        }
    }

    /// Runs `query` over every document, returning hits above
    /// [`FIELD_THRESHOLD`] sorted by descending score. Does not apply a
    /// `limit` itself — callers (the adapter / router) apply `Filters::limit`
    /// after merging with other sources.
    pub fn search(&self, query: &str) -> Vec<IndexHit<'a>> {
        let query = query.trim();
        if query.chars().count() < MIN_MATCH_LEN {
            return Vec::new();
        }

        let mut hits: Vec<IndexHit<'a>> = self
            .documents
            .iter()
            .filter_map(|doc| self.score_document(doc, query))
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    fn score_document(&self, doc: &'a Document, query: &str) -> Option<IndexHit<'a>> {
        let mut matched_fields = Vec::new();
        let mut total = 0.0;

        let title = self.field_score(&doc.title, query);
        if title > 0.0 {
            matched_fields.push("title");
            total += title * self.weights.title;
        }

        let searchable = self.field_score(&doc.searchable_content, query);
        if searchable > 0.0 {
            matched_fields.push("searchable_content");
            total += searchable * self.weights.searchable_content;
        }

        let content = self.field_score(&doc.content, query);
        if content > 0.0 {
            matched_fields.push("content");
            total += content * self.weights.content;
        }

        let path = self.field_score(&doc.url, query);
        if path > 0.0 {
            matched_fields.push("path");
            total += path * self.weights.path;
        }

        if let Some(tags) = doc.metadata.get("tags").and_then(|v| v.as_array()) {
            let joined: String = tags
                .iter()
                .filter_map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let tags_score = self.field_score(&joined, query);
            if tags_score > 0.0 {
                matched_fields.push("tags");
                total += tags_score * self.weights.tags;
            }
        }

        let score = runbooks_core::clamp_confidence(total);
        if score >= FIELD_THRESHOLD && !matched_fields.is_empty() {
            Some(IndexHit {
                document: doc,
                score,
                matched_fields,
            })
        } else {
            None
        }
    }

    fn field_score(&self, field: &str, query: &str) -> f64 {
        let windowed: String = field.chars().take(DISTANCE_BUDGET_CHARS).collect();
        match self.matcher.fuzzy_match(&windowed, query) {
            Some(raw) => normalize_raw_score(raw, query.chars().count()),
            None => 0.0,
        }
    }
}

/// `SkimMatcherV2` scores scale roughly with match quality and query length;
/// this divisor was picked so a clean full-query substring match lands near
/// 1.0 without the score being thrown off by the field's overall length.
fn normalize_raw_score(raw: i64, query_len: usize) -> f64 {
    let denom = (query_len.max(1) as f64) * 16.0;
    (raw as f64 / denom).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn doc(id: &str, title: &str, searchable: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            searchable_content: searchable.to_string(),
            source: "test".to_string(),
            source_type: runbooks_core::SourceType::Filesystem,
            url: format!("file:///{id}"),
            last_modified: chrono::Utc::now(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn exact_title_match_scores_above_threshold() {
        let docs = vec![doc("1", "Database Outage Runbook", "database outage", "steps...")];
        let index = FuzzyIndex::new(&docs);
        let hits = index.search("database outage");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score >= FIELD_THRESHOLD);
        assert!(hits[0].matched_fields.contains(&"title"));
    }

    #[test]
    fn short_query_below_min_length_yields_no_hits() {
        let docs = vec![doc("1", "Database Outage", "db", "steps")];
        let index = FuzzyIndex::new(&docs);
        assert!(index.search("d").is_empty());
    }

    #[test]
    fn unrelated_query_yields_no_hits() {
        let docs = vec![doc("1", "Database Outage Runbook", "database outage", "steps...")];
        let index = FuzzyIndex::new(&docs);
        let hits = index.search("zzzqqqxxx");
        assert!(hits.is_empty());
    }

    #[test]
    fn hits_are_sorted_descending_by_score() {
        let docs = vec![
            doc("1", "unrelated page", "nothing here", "filler"),
            doc("2", "database outage runbook", "database outage runbook", "database outage steps"),
        ];
        let index = FuzzyIndex::new(&docs);
        let hits = index.search("database outage");
        assert!(hits.len() >= 1);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
