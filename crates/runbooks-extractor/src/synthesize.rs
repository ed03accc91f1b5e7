//! Extraction/synthesis (spec §4.C9): parse a structured runbook JSON
//! payload directly, or synthesize a canonical [`Runbook`] from freeform
//! content.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use runbooks_core::{DecisionBranch, DecisionTree, Procedure, Runbook, RunbookMetadata};

const MAX_SYNTHESIZED_STEPS: usize = 10;
const MAIN_PROCEDURE_CHARS: usize = 500;

static STEP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:\d+\.\s+|[-*]\s+|step\s*\d+[:\s]+)(.+)$").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#\s*(.+)$").unwrap());

/// Attempts to parse `content` directly as a canonical runbook (spec step 1:
/// "the document is structured (JSON-like) and matches the runbook shape").
/// A parse failure is not an error here — the caller falls through to
/// [`synthesize`].
pub fn try_parse_structured(content: &str) -> Option<Runbook> {
    let runbook: Runbook = serde_json::from_str(content).ok()?;
    if runbook.id.is_empty() || runbook.title.is_empty() || runbook.procedures.is_empty() {
        return None;
    }
    Some(runbook)
}

/// Synthesizes a canonical runbook from freeform document content (spec
/// step 2).
pub fn synthesize(
    document_title: &str,
    content: &str,
    alert_type: &str,
    severity: &str,
    confidence_score: f64,
    success_rate: f64,
) -> Runbook {
    let title = HEADING
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| document_title.to_string());

    let procedures = synthesize_procedures(content);

    let mut severity_mapping: HashMap<String, String> = [
        ("critical", "critical"),
        ("high", "high"),
        ("medium", "medium"),
        ("low", "low"),
        ("info", "info"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    severity_mapping.insert(alert_type.to_string(), severity.to_string());

    let now = chrono::Utc::now();

    Runbook {
        id: format!("synth-{}", slugify(&title)),
        title,
        version: "1.0".to_string(),
        description: format!("Synthesized from source content for alert type '{alert_type}'."),
        triggers: vec![alert_type.to_string()],
        severity_mapping,
        decision_tree: DecisionTree {
            id: "dt-default".to_string(),
            name: "Default Decision Tree".to_string(),
            description: "Synthesized default decision tree".to_string(),
            branches: vec![DecisionBranch {
                id: "branch-default".to_string(),
                condition: format!("alert type is {alert_type}"),
                description: "Default branch".to_string(),
                action: "follow documented steps".to_string(),
                next_step: None,
                confidence: confidence_score,
            }],
            default_action: "escalate".to_string(),
        },
        procedures,
        escalation_path: "default-escalation".to_string(),
        metadata: RunbookMetadata {
            created_at: now,
            updated_at: now,
            author: None,
            confidence_score,
            success_rate,
            avg_resolution_time_minutes: None,
        },
    }
}

fn synthesize_procedures(content: &str) -> Vec<Procedure> {
    let steps: Vec<&str> = content
        .lines()
        .filter_map(|line| STEP_LINE.captures(line.trim()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .take(MAX_SYNTHESIZED_STEPS)
        .collect::<Vec<String>>()
        .iter()
        .map(String::as_str)
        .collect();

    if steps.is_empty() {
        let description: String = content.chars().take(MAIN_PROCEDURE_CHARS).collect();
        return vec![Procedure {
            id: "main_procedure".to_string(),
            name: "Main Procedure".to_string(),
            description,
            expected_outcome: "Step completed successfully".to_string(),
            timeout_seconds: Some(1800),
        }];
    }

    steps
        .iter()
        .enumerate()
        .map(|(i, description)| {
            let n = i + 1;
            Procedure {
                id: format!("step_{n}"),
                name: format!("Step {n}"),
                description: description.to_string(),
                expected_outcome: "Step completed successfully".to_string(),
                timeout_seconds: Some(300),
            }
        })
        .collect()
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesizes_numbered_steps() {
        let content = "# Disk Full\n1. Check df -h\n2. Clear old logs\n3. Restart service";
        let runbook = synthesize(document_title_fallback(), content, "disk_full", "critical", 0.8, 0.7);
        assert_eq!(runbook.title, "Disk Full");
        assert_eq!(runbook.procedures.len(), 3);
        assert_eq!(runbook.procedures[0].id, "step_1");
    }

    #[test]
    fn falls_back_to_main_procedure_without_step_lines() {
        let content = "Just a paragraph describing the incident with no bullet points at all.";
        let runbook = synthesize(document_title_fallback(), content, "disk_full", "critical", 0.5, 0.6);
        assert_eq!(runbook.procedures.len(), 1);
        assert_eq!(runbook.procedures[0].id, "main_procedure");
        assert_eq!(runbook.procedures[0].timeout_seconds, Some(1800));
    }

    #[test]
    fn caps_synthesized_steps_at_ten() {
        let content = (1..=15)
            .map(|i| format!("{i}. step number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let runbook = synthesize(document_title_fallback(), &content, "disk_full", "critical", 0.5, 0.6);
        assert_eq!(runbook.procedures.len(), 10);
    }

    fn document_title_fallback() -> &'static str {
        "Untitled Document"
    }
}
