//! The canonical data model shared by every adapter, the router, the
//! extractor and both transport surfaces. See `spec.md` §3 for the
//! normative shape; this module is a direct transcription into typed Rust.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of upstream produced a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Filesystem,
    Wiki,
    Forge,
    Http,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Filesystem => "filesystem",
            SourceType::Wiki => "wiki",
            SourceType::Forge => "forge",
            SourceType::Http => "http",
        }
    }
}

/// The canonical document shape every adapter must produce, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable, collision-resistant identifier within the producing source.
    pub id: String,
    pub title: String,
    /// Full normalized text.
    pub content: String,
    /// Distilled projection used for index scoring (spec §4.C4).
    pub searchable_content: String,
    /// Name of the adapter instance that produced this document.
    pub source: String,
    pub source_type: SourceType,
    /// Canonical URL, or a `file://` URI for filesystem documents.
    pub url: String,
    pub last_modified: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// `true` if `self.source == source_name && self.source_type == source_type`,
    /// the invariant every adapter must uphold (spec §8 property 3).
    pub fn belongs_to(&self, source_name: &str, source_type: SourceType) -> bool {
        self.source == source_name && self.source_type == source_type
    }
}

/// A [`Document`] plus the ranking metadata produced by a single `search`
/// call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub document: Document,
    /// Clamped to `[0.0, 1.0]` by every writer — see [`clamp_confidence`].
    pub confidence_score: f64,
    /// Ordered, human-readable explanations for why this result matched.
    pub match_reasons: Vec<String>,
    /// Wall-clock milliseconds for the enclosing query, stamped by the
    /// router, not by the adapter.
    pub retrieval_time_ms: u64,
}

/// Clamps a raw score into the `[0.0, 1.0]` confidence range mandated by
/// spec §3's invariants. Every scoring path (C4 format bonuses, C5 fuzzy
/// scores, C9 relevance) must route its final value through this function.
pub fn clamp_confidence(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Stably sorts `results` by descending confidence, breaking ties by
/// `(source_priority, id)` ascending as required by spec §3 and §5.
pub fn sort_results(results: &mut [SearchResult], source_priority: &HashMap<String, u32>) {
    results.sort_by(|a, b| {
        b.confidence_score
            .partial_cmp(&a.confidence_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let pa = source_priority.get(&a.document.source).copied().unwrap_or(u32::MAX);
                let pb = source_priority.get(&b.document.source).copied().unwrap_or(u32::MAX);
                pa.cmp(&pb)
            })
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
}

/// A single branch of a [`DecisionTree`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionBranch {
    pub id: String,
    pub condition: String,
    pub description: String,
    pub action: String,
    pub next_step: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub id: String,
    pub name: String,
    pub description: String,
    pub branches: Vec<DecisionBranch>,
    pub default_action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    pub id: String,
    pub name: String,
    pub description: String,
    pub expected_outcome: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunbookMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: Option<String>,
    pub confidence_score: f64,
    pub success_rate: f64,
    pub avg_resolution_time_minutes: Option<f64>,
}

/// The canonical operational artifact, always returned to callers with at
/// least one procedure (spec §3 invariant 4 / §4.C9 synthesis rule).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runbook {
    pub id: String,
    pub title: String,
    pub version: String,
    pub description: String,
    pub triggers: Vec<String>,
    pub severity_mapping: HashMap<String, String>,
    pub decision_tree: DecisionTree,
    pub procedures: Vec<Procedure>,
    pub escalation_path: String,
    pub metadata: RunbookMetadata,
}

impl Runbook {
    pub fn has_at_least_one_procedure(&self) -> bool {
        !self.procedures.is_empty()
    }
}

/// Health snapshot returned by `health_check`; never an error (spec §4.C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub healthy: bool,
    pub message: Option<String>,
    /// `-1` means "not measured" per the §9 open-question resolution;
    /// callers must ignore it for arithmetic. Use [`Health::document_count_measured`].
    pub document_count: i64,
    pub last_indexed: Option<DateTime<Utc>>,
    pub avg_response_time_ms: Option<f64>,
    pub success_rate: Option<f64>,
}

impl Health {
    pub fn document_count_measured(&self) -> Option<u64> {
        if self.document_count < 0 {
            None
        } else {
            Some(self.document_count as u64)
        }
    }
}

/// Adapter-reported metadata for `metadata()` (spec §4.C6) and the
/// `list_sources` / `GET /sources` surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterMetadata {
    pub name: String,
    pub source_type: SourceType,
    pub document_count: i64,
    pub last_indexed: Option<DateTime<Utc>>,
    pub avg_response_time_ms: Option<f64>,
    pub success_rate: Option<f64>,
}

/// Filters recognized by every adapter's `search`/`search_runbooks` (spec §4.C6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filters {
    pub limit: Option<usize>,
    pub confidence_threshold: Option<f64>,
    pub categories: Option<Vec<String>>,
    pub max_age_days: Option<u32>,
}

impl Filters {
    /// Normalizes an out-of-range threshold to "absent", per spec §8
    /// boundary behavior ("`confidence_threshold > 1` or `< 0` -> treat as
    /// absent").
    pub fn normalized_confidence_threshold(&self) -> Option<f64> {
        self.confidence_threshold
            .filter(|t| (0.0..=1.0).contains(t))
    }

    /// `true` when `categories` is set and shares no element with
    /// `declared`, i.e. the adapter's fast-path empty-result case.
    pub fn excludes_all(&self, declared: &[String]) -> bool {
        match &self.categories {
            None => false,
            Some(wanted) => !wanted.iter().any(|c| declared.contains(c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, source: &str) -> Document {
        Document {
            id: id.to_string(),
            title: "t".into(),
            content: "c".into(),
            searchable_content: "c".into(),
            source: source.to_string(),
            source_type: SourceType::Filesystem,
            url: "file:///t".into(),
            last_modified: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    fn result(id: &str, source: &str, score: f64) -> SearchResult {
        SearchResult {
            document: doc(id, source),
            confidence_score: score,
            match_reasons: vec![],
            retrieval_time_ms: 0,
        }
    }

    #[test]
    fn clamp_confidence_clamps_both_ends() {
        assert_eq!(clamp_confidence(-0.5), 0.0);
        assert_eq!(clamp_confidence(1.5), 1.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
    }

    #[test]
    fn sort_results_breaks_ties_by_priority_then_id() {
        let mut priorities = HashMap::new();
        priorities.insert("wiki".to_string(), 1);
        priorities.insert("fs".to_string(), 0);

        let mut results = vec![
            result("b", "wiki", 0.5),
            result("a", "fs", 0.5),
            result("z", "fs", 0.9),
        ];
        sort_results(&mut results, &priorities);

        assert_eq!(results[0].document.id, "z");
        assert_eq!(results[1].document.id, "a");
        assert_eq!(results[2].document.id, "b");
    }

    #[test]
    fn normalized_confidence_threshold_drops_out_of_range() {
        let mut f = Filters::default();
        f.confidence_threshold = Some(1.2);
        assert_eq!(f.normalized_confidence_threshold(), None);
        f.confidence_threshold = Some(-0.1);
        assert_eq!(f.normalized_confidence_threshold(), None);
        f.confidence_threshold = Some(0.7);
        assert_eq!(f.normalized_confidence_threshold(), Some(0.7));
    }

    #[test]
    fn health_document_count_not_measured() {
        let h = Health {
            healthy: true,
            message: None,
            document_count: -1,
            last_indexed: None,
            avg_response_time_ms: None,
            success_rate: None,
        };
        assert_eq!(h.document_count_measured(), None);
    }
}
