//! Runbook-likelihood filter (spec §4.C9): a boolean predicate over a
//! candidate document and `(alert_type, severity)`.

const PATH_TITLE_INDICATORS: &[&str] = &[
    "runbook",
    "ops",
    "operations",
    "troubleshoot",
    "incident",
    "procedure",
];

const CONTENT_PATTERNS: &[&str] = &[
    "steps to",
    "procedure",
    "troubleshoot",
    "incident",
    "alert",
    "resolution",
    "runbook",
    "step 1",
    "follow these steps",
    "resolution steps",
];

const CODE_INDICATORS: &[&str] = &[
    "function ",
    "class ",
    "import ",
    "require(",
    "console.log",
    "return ",
    "export ",
    "const ",
    "let ",
    "var ",
];

/// The raw point total before thresholding; exposed mainly for tests and
/// diagnostics.
pub fn runbook_likelihood_score(path: &str, title: &str, content: &str, alert_type: &str, severity: &str) -> i32 {
    let path_lower = path.to_lowercase();
    let title_lower = title.to_lowercase();
    let content_lower = content.to_lowercase();

    let mut score = 0;

    if PATH_TITLE_INDICATORS.iter().any(|w| path_lower.contains(w)) {
        score += 3;
    }
    if PATH_TITLE_INDICATORS.iter().any(|w| title_lower.contains(w)) {
        score += 2;
    }
    if CONTENT_PATTERNS.iter().any(|p| content_lower.contains(p)) {
        score += 1;
    }

    let normalized_alert = alert_type.replace('_', " ").to_lowercase();
    let severity_lower = severity.to_lowercase();
    if (!normalized_alert.is_empty() && content_lower.contains(&normalized_alert))
        || (!severity_lower.is_empty() && content_lower.contains(&severity_lower))
    {
        score += 2;
    }

    if CODE_INDICATORS.iter().any(|c| content_lower.contains(c)) {
        score -= 5;
    }
    if path_lower.starts_with("src/") || path_lower.starts_with("lib/") || path_lower.starts_with("test/") {
        score -= 3;
    }

    score
}

/// Applies the threshold: ≥1 for real alert types, ≥6 when the alert type
/// looks like a guard-against-hallucination probe (`nonexistent`/`fake`/`test`).
pub fn is_runbook_like(path: &str, title: &str, content: &str, alert_type: &str, severity: &str) -> bool {
    let score = runbook_likelihood_score(path, title, content, alert_type, severity);
    let alert_lower = alert_type.to_lowercase();
    let threshold = if alert_lower.contains("nonexistent") || alert_lower.contains("fake") || alert_lower.contains("test")
    {
        6
    } else {
        1
    };
    score >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_clear_runbook_passes_the_default_threshold() {
        let path = "docs/runbooks/disk-full.md";
        let title = "Disk Full Runbook";
        let content = "Follow these steps to resolve a disk full incident. Step 1: check df -h.";
        assert!(is_runbook_like(path, title, content, "disk_full", "critical"));
    }

    #[test]
    fn source_code_is_rejected_even_with_keyword_overlap() {
        let path = "src/incident/handler.rs";
        let title = "incident handler";
        let content = "pub fn handle_incident() { let x = 1; return x; }";
        assert!(!is_runbook_like(path, title, content, "disk_full", "critical"));
    }

    #[test]
    fn hallucinated_alert_types_need_a_much_higher_score() {
        let path = "docs/runbooks/disk-full.md";
        let title = "Disk Full Runbook";
        let content = "follow these steps";
        assert!(!is_runbook_like(path, title, content, "nonexistent_alert", "critical"));
    }
}
