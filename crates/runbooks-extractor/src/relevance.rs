//! Relevance-vs-alert scoring (spec §4.C9 "Relevance vs alert").

use runbooks_core::Runbook;

pub fn relevance_vs_alert(runbook: &Runbook, alert_type: &str, severity: &str, systems: &[String]) -> f64 {
    let normalized_alert = alert_type.replace('_', " ").to_lowercase();
    let severity_lower = severity.to_lowercase();
    let title_lower = runbook.title.to_lowercase();
    let description_lower = runbook.description.to_lowercase();

    let mut score = 0.3;

    if !normalized_alert.is_empty() && title_lower.contains(&normalized_alert) {
        score += 0.4;
    }
    if !normalized_alert.is_empty() && description_lower.contains(&normalized_alert) {
        score += 0.1;
    }
    if !severity_lower.is_empty() && description_lower.contains(&severity_lower) {
        score += 0.1;
    }

    let system_hits = systems
        .iter()
        .filter(|system| {
            let system_lower = system.to_lowercase();
            title_lower.contains(&system_lower) || description_lower.contains(&system_lower)
        })
        .count();
    score += ((system_hits as f64) * 0.1).min(0.2);

    if runbook
        .severity_mapping
        .keys()
        .any(|key| key.to_lowercase() == severity_lower)
    {
        score += 0.1;
    }

    let trigger_hits = runbook
        .triggers
        .iter()
        .filter(|trigger| {
            let trigger_lower = trigger.to_lowercase();
            trigger_lower == alert_type.to_lowercase() || trigger_lower.replace('_', " ") == normalized_alert
        })
        .count();
    score += ((trigger_hits as f64) * 0.05).min(0.1);

    runbooks_core::clamp_confidence(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use runbooks_core::{DecisionBranch, DecisionTree, Procedure, RunbookMetadata};
    use std::collections::HashMap;

    fn sample_runbook() -> Runbook {
        let mut severity_mapping = HashMap::new();
        severity_mapping.insert("critical".to_string(), "critical".to_string());

        Runbook {
            id: "rb-1".to_string(),
            title: "Disk Full Incident Runbook".to_string(),
            version: "1.0".to_string(),
            description: "Procedure for the payments-db disk full alert.".to_string(),
            triggers: vec!["disk_full".to_string()],
            severity_mapping,
            decision_tree: DecisionTree {
                id: "dt-1".to_string(),
                name: "Disk Full".to_string(),
                description: "".to_string(),
                branches: vec![DecisionBranch {
                    id: "b1".to_string(),
                    condition: "alert type is disk_full".to_string(),
                    description: "".to_string(),
                    action: "follow documented steps".to_string(),
                    next_step: None,
                    confidence: 0.5,
                }],
                default_action: "escalate".to_string(),
            },
            procedures: vec![Procedure {
                id: "step_1".to_string(),
                name: "Step 1".to_string(),
                description: "check df -h".to_string(),
                expected_outcome: "Step completed successfully".to_string(),
                timeout_seconds: Some(300),
            }],
            escalation_path: "page-oncall".to_string(),
            metadata: RunbookMetadata {
                created_at: Utc::now(),
                updated_at: Utc::now(),
                author: None,
                confidence_score: 0.8,
                success_rate: 0.7,
                avg_resolution_time_minutes: None,
            },
        }
    }

    #[test]
    fn matching_alert_title_and_trigger_scores_high() {
        let runbook = sample_runbook();
        let score = relevance_vs_alert(&runbook, "disk_full", "critical", &["payments-db".to_string()]);
        assert!(score > 0.3 + 0.4, "expected title+trigger bonus, got {score}");
    }

    #[test]
    fn unrelated_alert_stays_near_baseline() {
        let runbook = sample_runbook();
        let score = relevance_vs_alert(&runbook, "memory_leak", "low", &[]);
        assert!(score <= 0.4);
    }
}
