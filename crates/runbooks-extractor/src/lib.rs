//! Runbook extractor & relevance scorer (spec §4.C9).

pub mod confidence;
pub mod likelihood;
pub mod relevance;
pub mod synthesize;

pub use confidence::{score as confidence_score, ConfidenceInputs};
pub use likelihood::{is_runbook_like, runbook_likelihood_score};
pub use relevance::relevance_vs_alert;

use runbooks_core::Runbook;

/// Top-level entry point combining synthesis step 1 (structured passthrough)
/// and step 2 (synthesis), per spec §4.C9 "Extraction/synthesis". Structured
/// parse failures fall through to synthesis rather than erroring (spec
/// "Failure semantics").
pub fn extract_or_synthesize(
    document_title: &str,
    content: &str,
    alert_type: &str,
    severity: &str,
    systems: &[String],
    success_rate: f64,
) -> Runbook {
    if let Some(mut runbook) = synthesize::try_parse_structured(content) {
        runbook.metadata.confidence_score =
            relevance::relevance_vs_alert(&runbook, alert_type, severity, systems);
        return runbook;
    }

    let placeholder_score = 0.3;
    let mut runbook = synthesize::synthesize(
        document_title,
        content,
        alert_type,
        severity,
        placeholder_score,
        success_rate,
    );
    let relevance = relevance::relevance_vs_alert(&runbook, alert_type, severity, systems);
    runbook.metadata.confidence_score = relevance;
    for branch in &mut runbook.decision_tree.branches {
        branch.confidence = relevance;
    }
    runbook
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_json_is_passed_through_with_recomputed_relevance() {
        let json = serde_json::json!({
            "id": "rb-1",
            "title": "Disk Full Runbook",
            "version": "1.0",
            "description": "handles disk_full",
            "triggers": ["disk_full"],
            "severity_mapping": {"critical": "critical"},
            "decision_tree": {
                "id": "dt-1", "name": "dt", "description": "", "branches": [], "default_action": "escalate"
            },
            "procedures": [{
                "id": "step_1", "name": "Step 1", "description": "do it",
                "expected_outcome": "ok", "timeout_seconds": 300
            }],
            "escalation_path": "oncall",
            "metadata": {
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z",
                "author": null,
                "confidence_score": 0.1,
                "success_rate": 0.5,
                "avg_resolution_time_minutes": null
            }
        })
        .to_string();

        let runbook = extract_or_synthesize("fallback", &json, "disk_full", "critical", &[], 0.7);
        assert_eq!(runbook.id, "rb-1");
        assert!(runbook.metadata.confidence_score > 0.1);
    }

    #[test]
    fn freeform_content_is_synthesized() {
        let content = "# Disk Full\n1. check df -h\n2. clear logs";
        let runbook = extract_or_synthesize("fallback", content, "disk_full", "critical", &[], 0.6);
        assert_eq!(runbook.title, "Disk Full");
        assert!(runbook.has_at_least_one_procedure());
    }
}
