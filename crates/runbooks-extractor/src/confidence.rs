//! Shared confidence-scoring shape (spec §4.C9 "Confidence scoring (shared
//! shape)"), used both by the extractor's runbook-search path and directly
//! by the wiki/forge adapters for their plain `search` results.

use chrono::{DateTime, Utc};

/// Everything the shared scoring formula needs about one candidate
/// match. Adapters fill this in from their own `Document`/query context.
#[derive(Debug, Clone)]
pub struct ConfidenceInputs<'a> {
    pub query: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub path_or_url: &'a str,
    pub source_name: &'a str,
    pub is_markdown: bool,
    pub is_structured_runbook: bool,
    /// Recency only applies to wiki-like sources (spec: "Recency (wiki-like
    /// sources only)").
    pub is_wiki_like: bool,
    pub last_modified: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

/// Computes the shared confidence score: start at 0.3, add bounded
/// per-signal bonuses, clamp to `[0, 1]`.
pub fn score(inputs: &ConfidenceInputs<'_>) -> f64 {
    let mut total = 0.3;
    total += title_match(inputs.query, inputs.title);
    total += content_match(inputs.query, inputs.content);
    total += path_signals(inputs.query, inputs.path_or_url);
    total += type_format_bonus(inputs.is_markdown, inputs.is_structured_runbook);
    total += source_bonus(inputs.source_name);
    if inputs.is_wiki_like {
        total += recency_bonus(inputs.last_modified, inputs.now);
    }
    runbooks_core::clamp_confidence(total)
}

/// Up to +0.35: exact phrase +0.3, per-token coverage × 0.2.
fn title_match(query: &str, title: &str) -> f64 {
    let query_lower = query.to_lowercase();
    let title_lower = title.to_lowercase();
    let mut score = 0.0;
    if !query_lower.is_empty() && title_lower.contains(&query_lower) {
        score += 0.3;
    }
    let tokens: Vec<&str> = query_lower.split_whitespace().collect();
    if !tokens.is_empty() {
        let covered = tokens.iter().filter(|t| title_lower.contains(*t)).count();
        score += (covered as f64 / tokens.len() as f64) * 0.2;
    }
    score.min(0.35)
}

/// Up to +0.30: phrase occurrence × 0.05 (cap 0.15), per-token sum (each
/// token × 0.02, capped at 3 occurrences each, total cap 0.15).
fn content_match(query: &str, content: &str) -> f64 {
    let query_lower = query.to_lowercase();
    let content_lower = content.to_lowercase();

    let phrase_score = if query_lower.is_empty() {
        0.0
    } else {
        (count_occurrences(&content_lower, &query_lower) as f64 * 0.05).min(0.15)
    };

    let token_score: f64 = query_lower
        .split_whitespace()
        .map(|token| (count_occurrences(&content_lower, token).min(3) as f64) * 0.02)
        .sum::<f64>()
        .min(0.15);

    (phrase_score + token_score).min(0.30)
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Up to +0.15: readme, docs, ops, runbook, query-in-path.
fn path_signals(query: &str, path_or_url: &str) -> f64 {
    let path_lower = path_or_url.to_lowercase();
    let mut score = 0.0;
    if path_lower.contains("readme") {
        score += 0.05;
    }
    if path_lower.contains("docs") || path_lower.contains("doc/") {
        score += 0.05;
    }
    if path_lower.contains("ops") {
        score += 0.03;
    }
    if path_lower.contains("runbook") {
        score += 0.05;
    }
    let query_lower = query.to_lowercase();
    if !query_lower.is_empty() && path_lower.contains(&query_lower) {
        score += 0.05;
    }
    score.min(0.15)
}

/// Up to +0.10: markdown bonus, structured runbook JSON bonus.
fn type_format_bonus(is_markdown: bool, is_structured_runbook: bool) -> f64 {
    if is_structured_runbook {
        0.10
    } else if is_markdown {
        0.05
    } else {
        0.0
    }
}

/// Up to +0.10: repo/space/endpoint name containing ops/docs/runbook.
fn source_bonus(source_name: &str) -> f64 {
    let lower = source_name.to_lowercase();
    if lower.contains("ops") || lower.contains("docs") || lower.contains("runbook") {
        0.10
    } else {
        0.0
    }
}

/// Up to +0.15: <7d +0.15, <30d +0.10, <90d +0.05.
fn recency_bonus(last_modified: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(last_modified) = last_modified else {
        return 0.0;
    };
    let age_days = (now - last_modified).num_days();
    if age_days < 7 {
        0.15
    } else if age_days < 30 {
        0.10
    } else if age_days < 90 {
        0.05
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs<'a>(query: &'a str, title: &'a str, content: &'a str) -> ConfidenceInputs<'a> {
        ConfidenceInputs {
            query,
            title,
            content,
            path_or_url: "docs/runbooks/disk-full.md",
            source_name: "ops-wiki",
            is_markdown: true,
            is_structured_runbook: false,
            is_wiki_like: true,
            last_modified: Some(Utc::now()),
            now: Utc::now(),
        }
    }

    #[test]
    fn exact_title_phrase_scores_high() {
        let inputs = base_inputs("disk full", "Disk Full Runbook", "follow these steps");
        let s = score(&inputs);
        assert!(s > 0.3 + 0.3, "expected title bonus to apply, got {s}");
    }

    #[test]
    fn score_is_always_clamped() {
        let inputs = base_inputs("disk full disk full", "disk full disk full disk full", "disk full ".repeat(50).as_str());
        assert!(score(&inputs) <= 1.0);
    }

    #[test]
    fn non_wiki_source_ignores_recency() {
        let mut inputs = base_inputs("x", "x", "x");
        inputs.is_wiki_like = false;
        inputs.last_modified = Some(Utc::now());
        let with_recency_disabled = score(&inputs);
        inputs.is_wiki_like = true;
        let with_recency_enabled = score(&inputs);
        assert!(with_recency_enabled >= with_recency_disabled);
    }
}
