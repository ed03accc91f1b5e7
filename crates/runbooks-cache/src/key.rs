//! Typed cache keys (spec §4.C3: `{type ∈ {runbook_search, knowledge_base,
//! document, decision_tree, procedure, escalation}, identifier}`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{CRITICAL_TTL, KNOWLEDGE_TTL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyKind {
    RunbookSearch,
    KnowledgeBase,
    Document,
    DecisionTree,
    Procedure,
    Escalation,
}

impl CacheKeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKeyKind::RunbookSearch => "runbook_search",
            CacheKeyKind::KnowledgeBase => "knowledge_base",
            CacheKeyKind::Document => "document",
            CacheKeyKind::DecisionTree => "decision_tree",
            CacheKeyKind::Procedure => "procedure",
            CacheKeyKind::Escalation => "escalation",
        }
    }

    /// Default TTL tier for this kind (spec §4.C3: "critical content
    /// (runbooks) 1h; generic knowledge 4h"). `knowledge_base`/`document`
    /// entries are the generic-knowledge tier; everything runbook-shaped
    /// (search results, decision trees, procedures, escalation paths) is
    /// critical content.
    pub fn default_ttl(&self) -> Duration {
        match self {
            CacheKeyKind::RunbookSearch
            | CacheKeyKind::DecisionTree
            | CacheKeyKind::Procedure
            | CacheKeyKind::Escalation => CRITICAL_TTL,
            CacheKeyKind::KnowledgeBase | CacheKeyKind::Document => KNOWLEDGE_TTL,
        }
    }
}

/// A cache key, identifying one entry across both tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKeyKind,
    pub identifier: String,
}

impl CacheKey {
    pub fn new(kind: CacheKeyKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
        }
    }

    /// The wire/storage encoding shared by L1's internal map and L2's redis
    /// keyspace: `"{kind}:{identifier}"`. Also the prefix used for a
    /// by-kind prefix scan (`CacheKeyKind::as_str()` alone).
    pub fn encoded(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_round_trips_kind_and_identifier() {
        let key = CacheKey::new(CacheKeyKind::Document, "abc123");
        assert_eq!(key.encoded(), "document:abc123");
    }

    #[test]
    fn runbook_search_is_critical_tier() {
        assert_eq!(CacheKeyKind::RunbookSearch.default_ttl(), CRITICAL_TTL);
        assert_eq!(CacheKeyKind::Document.default_ttl(), KNOWLEDGE_TTL);
    }
}
