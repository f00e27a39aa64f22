//! MCP server over stdio.
//!
//! Exposes the retrieval adapter as a single MCP tool, `retrieve_hr_policy`,
//! for hosts that spawn the server as a child process (Claude Desktop,
//! Cursor, mcp-inspector).
//!
//! Tool results carry three parts:
//!
//! * `structuredContent`: `{ query, hitCount, results }`
//! * `content`: one text item with the summary line
//! * `_meta.bedrockRawResponse`: the undecoded service response
//!
//! Invalid arguments are reported as `invalid_params`; remote failures as
//! `internal_error`.
//!
//! # Host configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "esi-hr-kb": {
//!       "command": "hrkb",
//!       "args": ["serve", "mcp"],
//!       "env": { "HR_KB_ID": "ABCDEFGHIJ" }
//!     }
//!   }
//! }
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};
use tracing::{error, info};

use crate::config::Config;
use crate::error::HrKbError;
use crate::retrieve::{
    input_schema, retrieve_policy, RetrievalOutcome, RetrievalQuery, TOOL_DESCRIPTION, TOOL_NAME,
};
use crate::traits::KnowledgeService;

pub const SERVER_NAME: &str = "esi-hr-kb-server";

/// Bridges the retrieval adapter to the MCP JSON-RPC protocol.
#[derive(Clone)]
pub struct McpBridge {
    config: Arc<Config>,
    service: Arc<dyn KnowledgeService>,
}

impl McpBridge {
    pub fn new(config: Arc<Config>, service: Arc<dyn KnowledgeService>) -> Self {
        Self { config, service }
    }

    /// The rmcp descriptor for `retrieve_hr_policy`.
    pub fn tool() -> Tool {
        let input_schema = match input_schema() {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Borrowed(TOOL_NAME),
            title: None,
            description: Some(Cow::Borrowed(TOOL_DESCRIPTION)),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    /// Validate arguments, run the retrieval, and build the tool result.
    ///
    /// Separate from [`ServerHandler::call_tool`] so it can be exercised
    /// without an MCP session.
    pub async fn run_tool(
        &self,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CallToolResult, McpError> {
        let params = arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let query = RetrievalQuery::from_params(&params)
            .map_err(|e| McpError::new(ErrorCode::INVALID_PARAMS, e.to_string(), None))?;

        match retrieve_policy(self.service.as_ref(), &self.config, &query).await {
            Ok(outcome) => Ok(tool_result(outcome)),
            Err(e) => {
                error!(error = %e, query = %query.query, "retrieve_hr_policy failed");
                let code = match e {
                    HrKbError::InvalidInput(_) => ErrorCode::INVALID_PARAMS,
                    _ => ErrorCode::INTERNAL_ERROR,
                };
                Err(McpError::new(code, e.to_string(), None))
            }
        }
    }
}

/// Convert a retrieval outcome into an MCP tool result.
pub fn tool_result(outcome: RetrievalOutcome) -> CallToolResult {
    let mut result = CallToolResult::success(vec![Content::text(outcome.summary)]);
    result.structured_content = serde_json::to_value(&outcome.report).ok();

    let mut meta = serde_json::Map::new();
    meta.insert("bedrockRawResponse".to_string(), outcome.raw);
    result.meta = Some(Meta(meta));

    result
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                title: Some("ESI HR Knowledge Base".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Use retrieve_hr_policy to search the ESI HR knowledge base (handbook, PTO, \
                 benefits). Results are ranked chunks with similarity scores."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(vec![Self::tool()])))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        (name == TOOL_NAME).then(Self::tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if request.name != TOOL_NAME {
            return Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            ));
        }
        self.run_tool(request.arguments).await
    }
}

/// Serve the bridge on stdin/stdout until the client disconnects.
///
/// Logging must go to stderr while this runs; stdout carries the protocol.
pub async fn run_stdio(config: &Config, service: Arc<dyn KnowledgeService>) -> anyhow::Result<()> {
    config.require_knowledge_base_id()?;

    let bridge = McpBridge::new(Arc::new(config.clone()), service);
    let running = bridge.serve(rmcp::transport::stdio()).await?;
    info!("{} MCP up on stdio", SERVER_NAME);

    running.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RankedResult, RetrievalReport};
    use serde_json::json;

    #[test]
    fn test_tool_descriptor() {
        let tool = McpBridge::tool();
        assert_eq!(tool.name, TOOL_NAME);
        let schema = serde_json::Value::Object((*tool.input_schema).clone());
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["topK"]["maximum"], json!(50));
    }

    #[test]
    fn test_tool_result_parts() {
        let outcome = RetrievalOutcome {
            report: RetrievalReport {
                query: "pto".to_string(),
                hit_count: 1,
                results: vec![RankedResult {
                    rank: 1,
                    score: Some(0.9),
                    text: Some("PTO accrues monthly.".to_string()),
                    location: None,
                    metadata: None,
                }],
            },
            summary: "Retrieved 1 HR knowledge-base chunks for: \"pto\".".to_string(),
            raw: json!({ "retrievalResults": [] }),
        };

        let result = tool_result(outcome);
        assert_eq!(result.is_error, Some(false));
        let structured = result.structured_content.unwrap();
        assert_eq!(structured["hitCount"], 1);
        assert_eq!(structured["results"][0]["rank"], 1);
        let meta = result.meta.unwrap();
        assert_eq!(meta.0["bedrockRawResponse"], json!({ "retrievalResults": [] }));
    }
}
