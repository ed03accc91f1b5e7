//! Feedback recording and the performance snapshot it feeds (spec §6.6):
//! non-core, in-memory only, never consulted by ranking.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Oldest entries are evicted once the log reaches this size.
pub const FEEDBACK_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackEntry {
    pub runbook_id: String,
    pub outcome: String,
    pub timing_ms: u64,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct FeedbackSummary {
    pub total: usize,
    pub resolved: usize,
    pub escalated: usize,
    pub avg_timing_ms: f64,
}

#[derive(Clone)]
pub struct FeedbackLog {
    entries: Arc<Mutex<VecDeque<FeedbackEntry>>>,
}

impl FeedbackLog {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(FEEDBACK_LOG_CAPACITY))),
        }
    }

    pub fn record(&self, runbook_id: String, outcome: String, timing_ms: u64, notes: Option<String>) {
        let mut entries = self.entries.lock();
        if entries.len() >= FEEDBACK_LOG_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(FeedbackEntry {
            runbook_id,
            outcome,
            timing_ms,
            notes,
            recorded_at: Utc::now(),
        });
    }

    pub fn summary(&self) -> FeedbackSummary {
        let entries = self.entries.lock();
        if entries.is_empty() {
            return FeedbackSummary::default();
        }

        let resolved = entries.iter().filter(|e| e.outcome == "resolved").count();
        let escalated = entries.iter().filter(|e| e.outcome == "escalated").count();
        let avg_timing_ms =
            entries.iter().map(|e| e.timing_ms as f64).sum::<f64>() / entries.len() as f64;

        FeedbackSummary {
            total: entries.len(),
            resolved,
            escalated,
            avg_timing_ms,
        }
    }
}

impl Default for FeedbackLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_recorded_outcomes() {
        let log = FeedbackLog::new();
        log.record("rb-1".to_string(), "resolved".to_string(), 120_000, None);
        log.record("rb-2".to_string(), "escalated".to_string(), 300_000, Some("paged oncall".to_string()));

        let summary = log.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.escalated, 1);
        assert_eq!(summary.avg_timing_ms, 210_000.0);
    }

    #[test]
    fn evicts_oldest_entry_past_capacity() {
        let log = FeedbackLog::new();
        for i in 0..FEEDBACK_LOG_CAPACITY + 5 {
            log.record(format!("rb-{i}"), "resolved".to_string(), 1, None);
        }
        assert_eq!(log.summary().total, FEEDBACK_LOG_CAPACITY);
    }
}
