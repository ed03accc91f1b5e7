//! The seven named tools of spec §6.1, implemented with `rmcp` (the official
//! Rust MCP SDK), grounded on the `#[tool_router]`/`#[tool]` macro usage
//! every MCP-context-retrieval example in the pack uses for this shape of
//! server.

use std::sync::Arc;

use rmcp::handler::server::tool::{Parameters, ToolRouter};
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;

use runbooks_core::Filters;
use runbooks_router::AdapterRegistry;

use crate::feedback::FeedbackLog;
use crate::lookup;

fn json_result<T: serde::Serialize>(value: &T) -> Result<rmcp::model::CallToolResult, McpError> {
    let text = serde_json::to_string(value)
        .map_err(|err| McpError::internal_error(err.to_string(), None))?;
    Ok(rmcp::model::CallToolResult::success(vec![
        rmcp::model::Content::text(text),
    ]))
}

fn mcp_err(err: runbooks_core::CoreError) -> McpError {
    McpError::internal_error(err.to_string(), None)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchRunbooksArgs {
    pub alert_type: String,
    pub severity: String,
    #[serde(default)]
    pub affected_systems: Vec<String>,
    #[serde(default)]
    pub ctx: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DecisionTreeArgs {
    pub alert_context: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProcedureArgs {
    pub procedure_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EscalationArgs {
    pub severity: String,
    #[serde(default)]
    pub business_hours: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct KnowledgeBaseArgs {
    pub query: String,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FeedbackArgs {
    pub runbook_id: String,
    pub outcome: String,
    pub timing_ms: u64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct RunbookTools {
    registry: Arc<AdapterRegistry>,
    feedback: FeedbackLog,
    tool_router: ToolRouter<RunbookTools>,
}

#[tool_router]
impl RunbookTools {
    pub fn new(registry: Arc<AdapterRegistry>, feedback: FeedbackLog) -> Self {
        Self {
            registry,
            feedback,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Find runbooks relevant to an alert type, severity and affected systems")]
    async fn search_runbooks(
        &self,
        Parameters(args): Parameters<SearchRunbooksArgs>,
    ) -> Result<rmcp::model::CallToolResult, McpError> {
        let outcome = self
            .registry
            .search_runbooks(&args.alert_type, &args.severity, &args.affected_systems, args.ctx.as_deref())
            .await;
        json_result(&serde_json::json!({
            "runbooks": outcome.runbooks,
            "retrieval_time_ms": outcome.retrieval_time_ms,
        }))
    }

    #[tool(description = "Get the decision tree for a free-text alert context")]
    async fn get_decision_tree(
        &self,
        Parameters(args): Parameters<DecisionTreeArgs>,
    ) -> Result<rmcp::model::CallToolResult, McpError> {
        let (tree, retrieval_time_ms) = lookup::decision_tree_for(&self.registry, &args.alert_context)
            .await
            .map_err(mcp_err)?;
        json_result(&serde_json::json!({"tree": tree, "retrieval_time_ms": retrieval_time_ms}))
    }

    #[tool(description = "Get a specific procedure by id")]
    async fn get_procedure(
        &self,
        Parameters(args): Parameters<ProcedureArgs>,
    ) -> Result<rmcp::model::CallToolResult, McpError> {
        let (procedure, retrieval_time_ms) = lookup::procedure_by_id(&self.registry, &args.procedure_id)
            .await
            .map_err(mcp_err)?;
        json_result(&serde_json::json!({"procedure": procedure, "retrieval_time_ms": retrieval_time_ms}))
    }

    #[tool(description = "Get the escalation path for a severity level")]
    async fn get_escalation_path(
        &self,
        Parameters(args): Parameters<EscalationArgs>,
    ) -> Result<rmcp::model::CallToolResult, McpError> {
        let (path, retrieval_time_ms) =
            lookup::escalation_path_for(&self.registry, &args.severity, args.business_hours)
                .await
                .map_err(mcp_err)?;
        json_result(&serde_json::json!({"path": path, "retrieval_time_ms": retrieval_time_ms}))
    }

    #[tool(description = "List every registered documentation source and its health")]
    async fn list_sources(&self) -> Result<rmcp::model::CallToolResult, McpError> {
        let sources = self.registry.list_sources().await;
        json_result(&sources)
    }

    #[tool(description = "Search the federated knowledge base with a free-text query")]
    async fn search_knowledge_base(
        &self,
        Parameters(args): Parameters<KnowledgeBaseArgs>,
    ) -> Result<rmcp::model::CallToolResult, McpError> {
        let started = std::time::Instant::now();
        let filters = Filters {
            limit: args.max_results,
            confidence_threshold: None,
            categories: args.categories,
            max_age_days: None,
        };
        let results = self.registry.search(&args.query, &filters).await;
        json_result(&serde_json::json!({
            "results": results,
            "retrieval_time_ms": started.elapsed().as_millis() as u64,
        }))
    }

    #[tool(description = "Record the outcome of following a runbook, for the feedback/performance dashboard")]
    async fn record_resolution_feedback(
        &self,
        Parameters(args): Parameters<FeedbackArgs>,
    ) -> Result<rmcp::model::CallToolResult, McpError> {
        self.feedback
            .record(args.runbook_id, args.outcome, args.timing_ms, args.notes);
        json_result(&serde_json::json!({"accepted": true}))
    }
}

#[tool_handler]
impl ServerHandler for RunbookTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "runbook-federation".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Federated incident-runbook retrieval over filesystem, wiki, forge and HTTP sources."
                    .to_string(),
            ),
        }
    }
}
