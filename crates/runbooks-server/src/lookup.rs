//! Shared lookups backing `get_decision_tree`/`get_procedure`/
//! `get_escalation_path` (spec §6.1) on both transport surfaces. None of
//! these are indexed operations in the core — C8 only exposes
//! `search_runbooks`/`get_document` — so each one fans out a runbook search
//! and projects the piece it needs, rather than inventing a persisted
//! procedure/decision-tree index the spec's §6.5 ("none in the core")
//! doesn't call for.

use runbooks_core::{CoreError, DecisionTree, Procedure, Runbook};
use runbooks_router::AdapterRegistry;

/// Finds the single best-matching runbook for a free-text alert context and
/// returns its decision tree.
pub async fn decision_tree_for(
    registry: &AdapterRegistry,
    alert_context: &str,
) -> Result<(DecisionTree, u64), CoreError> {
    let outcome = registry
        .search_runbooks(alert_context, "info", &[], None)
        .await;
    let top = outcome.runbooks.into_iter().next().ok_or_else(|| CoreError::NotFound {
        what: format!("no runbook matched alert context '{alert_context}'"),
    })?;
    Ok((top.decision_tree, outcome.retrieval_time_ms))
}

/// Scans across every runbook a broad search surfaces for one whose
/// procedure id matches. There's no narrower fan-out available: a procedure
/// id is only ever meaningful in the context of its owning runbook, and
/// runbooks aren't indexed by procedure id anywhere in the federation.
pub async fn procedure_by_id(
    registry: &AdapterRegistry,
    procedure_id: &str,
) -> Result<(Procedure, u64), CoreError> {
    let outcome = registry
        .search_runbooks(procedure_id, "info", &[], None)
        .await;
    let retrieval_time_ms = outcome.retrieval_time_ms;
    let found = outcome
        .runbooks
        .into_iter()
        .find_map(|runbook| runbook.procedures.into_iter().find(|p| p.id == procedure_id));

    found
        .map(|procedure| (procedure, retrieval_time_ms))
        .ok_or_else(|| CoreError::NotFound {
            what: format!("procedure '{procedure_id}'"),
        })
}

/// Picks the escalation path of the runbook whose `severity_mapping` best
/// matches `severity`. `business_hours` isn't modeled as a branch in
/// [`Runbook::escalation_path`] (it's a single string, spec §3) so it's
/// threaded through only as the caller-visible context, not used to pick
/// between two paths that don't exist yet.
pub async fn escalation_path_for(
    registry: &AdapterRegistry,
    severity: &str,
    business_hours: bool,
) -> Result<(EscalationPath, u64), CoreError> {
    let outcome = registry.search_runbooks(severity, severity, &[], None).await;
    let retrieval_time_ms = outcome.retrieval_time_ms;
    let top: Option<Runbook> = outcome.runbooks.into_iter().next();

    top.map(|runbook| {
        (
            EscalationPath {
                path: runbook.escalation_path,
                business_hours,
                source_runbook_id: runbook.id,
            },
            retrieval_time_ms,
        )
    })
    .ok_or_else(|| CoreError::NotFound {
        what: format!("escalation path for severity '{severity}'"),
    })
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EscalationPath {
    pub path: String,
    pub business_hours: bool,
    pub source_runbook_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use runbooks_adapters::config::FsAdapterConfig;
    use runbooks_router::{AdapterKind, SourceRegistration};

    fn fs_config(name: &str, root: &str) -> FsAdapterConfig {
        FsAdapterConfig {
            name: name.to_string(),
            roots: vec![root.to_string()],
            categories: vec![],
            recursive: true,
            max_depth: 5,
            extensions: vec!["md".to_string()],
            exclude: vec![],
            size_cap_bytes: 1024 * 1024,
            watch: false,
        }
    }

    async fn registry_with_memory_leak_doc(dir: &std::path::Path) -> AdapterRegistry {
        std::fs::create_dir_all(dir.join("runbooks")).unwrap();
        std::fs::write(
            dir.join("runbooks/memory-leak.md"),
            "# Memory Leak Recovery\n\n1. Identify\n2. Capture heap\n3. Restart service\n",
        )
        .unwrap();

        let registry = AdapterRegistry::new(None);
        let registered = registry
            .create_adapter(SourceRegistration {
                enabled: true,
                priority: 0,
                timeout_ms: 5_000,
                kind: AdapterKind::Filesystem(fs_config("local-docs", dir.to_str().unwrap())),
            })
            .await;
        assert!(registered);
        registry
    }

    #[tokio::test]
    async fn decision_tree_for_finds_the_matching_runbook() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with_memory_leak_doc(dir.path()).await;

        let (tree, _) = decision_tree_for(&registry, "memory_leak").await.unwrap();
        assert!(!tree.id.is_empty());
        assert!(!tree.branches.is_empty() || !tree.default_action.is_empty());
    }

    #[tokio::test]
    async fn procedure_by_id_finds_a_synthesized_step() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with_memory_leak_doc(dir.path()).await;

        let outcome = registry.search_runbooks("memory_leak", "high", &[], None).await;
        let runbook = outcome.runbooks.first().expect("runbook should be found");
        let procedure_id = runbook.procedures[0].id.clone();

        let (procedure, _) = procedure_by_id(&registry, &procedure_id).await.unwrap();
        assert_eq!(procedure.id, procedure_id);
    }

    #[tokio::test]
    async fn escalation_path_for_is_not_found_with_no_adapters() {
        let registry = AdapterRegistry::new(None);
        let err = escalation_path_for(&registry, "critical", false).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
