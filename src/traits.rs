//! Tool extension trait and registry.
//!
//! Every callable tool implements [`Tool`] and is registered in a
//! [`ToolRegistry`]. Both the MCP bridge ([`crate::mcp`]) and the plain HTTP
//! API ([`crate::server`]) dispatch through the same registry, so a tool
//! behaves identically on every transport.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │             ToolRegistry             │
//! │  ┌────────────────┐ ┌─────────────┐  │
//! │  │ Weaviate_Hybrid│ │   Custom    │  │
//! │  │ _Search_with_  │ │   (Rust)    │  │
//! │  │ Extension      │ │   Tools     │  │
//! │  └────────────────┘ └─────────────┘  │
//! └──────────────┬───────────────────────┘
//!                ▼
//!       MCP (stdio / streamable HTTP), POST /tools/{name}
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::backend::Backend;
use crate::config::Config;
use crate::extend::{search_with_extension, ExtensionRequest};
use crate::filter::{is_graphql_name, WhereValue};
use crate::models::Passage;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that MCP clients can discover and call.
///
/// # Lifecycle
///
/// 1. The tool is registered via [`ToolRegistry::register`].
/// 2. [`name`](Tool::name), [`description`](Tool::description), and
///    [`parameters_schema`](Tool::parameters_schema) are read for tool
///    listings.
/// 3. [`execute`](Tool::execute) runs on every call, after the parameters
///    have been checked against the schema.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's name, used as the MCP tool name and the
    /// `POST /tools/{name}` route segment.
    fn name(&self) -> &str;

    /// Returns a one-line description for client discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with the crate. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// Returns the JSON Schema for the tool's parameters.
    ///
    /// Must be an object schema with `properties` and optionally
    /// `required`.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with validated parameters.
    ///
    /// A JSON array result is delivered to MCP clients as one text block per
    /// element; any other value becomes a single block.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Tool listing entry returned by `GET /tools/list` and `wvctx tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Per-call bridge from a tool to the configured chunk store.
pub struct ToolContext {
    config: Arc<Config>,
    backend: Arc<dyn Backend>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, backend: Arc<dyn Backend>) -> Self {
        Self { config, backend }
    }

    /// Run one hybrid search with context extension using the configured
    /// extension policy.
    pub async fn search(&self, request: &ExtensionRequest) -> Result<Vec<Passage>> {
        search_with_extension(
            self.backend.as_ref(),
            request,
            &self.config.extension.options(),
        )
        .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

pub const HYBRID_SEARCH_TOOL: &str = "Weaviate_Hybrid_Search_with_Extension";

/// Largest accepted `extK`. Without a chunk-count bound every position in
/// range becomes a point fetch.
pub const MAX_EXT_K: u64 = 1024;

/// A tool argument that failed validation.
#[derive(Error, Debug)]
#[error("invalid {name}: {reason}")]
pub struct InvalidArgument {
    pub name: &'static str,
    pub reason: String,
}

impl InvalidArgument {
    fn new(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            reason: reason.into(),
        }
    }
}

/// Hybrid search with neighbor-chunk context extension.
pub struct HybridSearchTool {
    default_top_k: u64,
    default_ext_k: u64,
}

impl HybridSearchTool {
    pub fn new(default_top_k: u64, default_ext_k: u64) -> Self {
        Self {
            default_top_k,
            default_ext_k,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.search.default_top_k, config.search.default_ext_k)
    }

    /// Turn validated tool parameters into an [`ExtensionRequest`].
    pub fn parse_request(&self, params: &Value) -> Result<ExtensionRequest> {
        let collection = params["collection"].as_str().unwrap_or("");
        if !is_graphql_name(collection) {
            return Err(InvalidArgument::new(
                "collection",
                format!("'{}' is not a collection name", collection),
            )
            .into());
        }

        let Some(query) = params["query"].as_str() else {
            return Err(InvalidArgument::new("query", "must be a string").into());
        };

        let ext_k = count_param(params, "extK", self.default_ext_k)?;
        if ext_k > MAX_EXT_K {
            return Err(
                InvalidArgument::new("extK", format!("must be at most {}, got {}", MAX_EXT_K, ext_k))
                    .into(),
            );
        }

        let where_filter = match params.get("where") {
            None | Some(Value::Null) => None,
            Some(w) => Some(WhereValue::from(w.clone())),
        };

        Ok(ExtensionRequest {
            collection: collection.to_string(),
            query: query.to_string(),
            where_filter,
            top_k: count_param(params, "topK", self.default_top_k)?,
            ext_k,
        })
    }
}

/// A non-negative integral number; integral floats such as `3.0` pass.
fn count_param(params: &Value, name: &'static str, default: u64) -> Result<u64, InvalidArgument> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => {
            if let Some(n) = v.as_u64() {
                return Ok(n);
            }
            match v.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
                _ => Err(InvalidArgument::new(
                    name,
                    format!("must be a non-negative integer, got {}", v),
                )),
            }
        }
    }
}

#[async_trait]
impl Tool for HybridSearchTool {
    fn name(&self) -> &str {
        HYBRID_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Hybrid search in Weaviate with context extension"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "collection": {
                    "type": "string",
                    "description": "The name of the Weaviate collection to query. This should be the name of the collection where your documents are stored."
                },
                "query": {
                    "type": "string",
                    "description": "The search query or requirements from the user. This is the main input for the hybrid search."
                },
                "where": {
                    "description": "Optional Weaviate where filter, e.g. {\"path\": [\"source\"], \"operator\": \"Equal\", \"valueText\": \"manual.pdf\"}. Applied to the initial search and to every context extension fetch."
                },
                "topK": {
                    "type": "number",
                    "minimum": 0,
                    "default": self.default_top_k,
                    "description": "The number of top results to return from the hybrid search. This defines how many objects will be returned from the initial hybrid search query."
                },
                "extK": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": MAX_EXT_K,
                    "default": self.default_ext_k,
                    "description": "The number of additional chunks to include before and after each topK result. This allows for context extension around the top results, providing more comprehensive information."
                }
            },
            "required": ["collection", "query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let request = self.parse_request(&params)?;
        let passages = ctx.search(&request).await?;
        Ok(serde_json::to_value(passages)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry for tools (built-in and custom Rust).
///
/// # Example
///
/// ```rust
/// use weaviate_context::config::Config;
/// use weaviate_context::traits::ToolRegistry;
///
/// let mut tools = ToolRegistry::with_builtins(&Config::minimal());
/// // tools.register(Box::new(MyTool::new()));
/// assert_eq!(tools.len(), 1);
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry holding the built-in hybrid search tool.
    pub fn with_builtins(config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(HybridSearchTool::from_config(config)));
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Get all registered tools.
    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    /// Find a tool by name.
    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Return the count of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
