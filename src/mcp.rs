//! MCP JSON-RPC protocol bridge.
//!
//! Adapts the [`ToolRegistry`] to rmcp's [`ServerHandler`], so the same tools
//! are reachable over the stdio and Streamable HTTP transports.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};
use serde_json::Value;
use tracing::warn;

use crate::backend::Backend;
use crate::config::Config;
use crate::tool_params::validate_params;
use crate::traits::{InvalidArgument, ToolContext, ToolRegistry};

/// Bridges the tool registry to the MCP JSON-RPC protocol.
///
/// Each MCP session receives a clone of this struct (everything is
/// behind `Arc`), so all sessions share one backend client.
#[derive(Clone)]
pub struct McpBridge {
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
    backend: Arc<dyn Backend>,
}

impl McpBridge {
    pub fn new(config: Arc<Config>, tools: Arc<ToolRegistry>, backend: Arc<dyn Backend>) -> Self {
        Self {
            config,
            tools,
            backend,
        }
    }

    /// Convert a registered tool into an rmcp `Tool` descriptor.
    fn to_mcp_tool(tool: &dyn crate::traits::Tool) -> Tool {
        let input_schema: Arc<serde_json::Map<String, Value>> = match tool.parameters_schema() {
            Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

/// One text block per array element, otherwise a single block.
pub fn to_text_blocks(result: &Value) -> Vec<String> {
    match result {
        Value::Array(items) => items
            .iter()
            .map(|item| serde_json::to_string_pretty(item).unwrap_or_default())
            .collect(),
        other => vec![serde_json::to_string_pretty(other).unwrap_or_default()],
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "weaviate-context".to_string(),
                title: Some("Weaviate Context".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Hybrid search over a Weaviate chunk collection. Results are grouped per \
                 document (and page, when the collection stores page numbers); set extK to \
                 pull in neighboring chunks around every hit."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool = self.tools.find(&request.name).ok_or_else(|| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            )
        })?;

        let params = request
            .arguments
            .map(Value::Object)
            .unwrap_or(Value::Object(serde_json::Map::new()));

        let params = validate_params(&tool.parameters_schema(), &params)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let ctx = ToolContext::new(self.config.clone(), self.backend.clone());
        match tool.execute(params, &ctx).await {
            Ok(result) => Ok(CallToolResult::success(
                to_text_blocks(&result)
                    .into_iter()
                    .map(Content::text)
                    .collect(),
            )),
            Err(e) if e.downcast_ref::<InvalidArgument>().is_some() => {
                Err(McpError::invalid_params(e.to_string(), None))
            }
            Err(e) => {
                warn!(tool = %request.name, error = %e, "tool call failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}
