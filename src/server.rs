//! MCP server transports and the plain HTTP tool API.
//!
//! Two ways to serve the [`ToolRegistry`]:
//!
//! - [`run_stdio`] — MCP over stdin/stdout, for clients that spawn the
//!   binary directly.
//! - [`run_http`] — an Axum app combining the MCP Streamable HTTP endpoint
//!   with a small JSON API.
//!
//! # Endpoints (`run_http`)
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `*`    | `/mcp` | MCP Streamable HTTP endpoint |
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call any registered tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "missing required parameter: query" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `backend_error` (502),
//! `tool_error` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::backend::weaviate::WeaviateError;
use crate::backend::Backend;
use crate::config::Config;
use crate::mcp::McpBridge;
use crate::tool_params::validate_params;
use crate::traits::{InvalidArgument, ToolContext, ToolInfo, ToolRegistry};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
    backend: Arc<dyn Backend>,
}

impl AppState {
    pub fn new(config: Arc<Config>, tools: Arc<ToolRegistry>, backend: Arc<dyn Backend>) -> Self {
        Self {
            config,
            tools,
            backend,
        }
    }

    fn bridge(&self) -> McpBridge {
        McpBridge::new(self.config.clone(), self.tools.clone(), self.backend.clone())
    }
}

/// Serve MCP over stdin/stdout until the client disconnects.
pub async fn run_stdio(state: AppState) -> anyhow::Result<()> {
    info!("starting MCP server on stdio");
    let service = state.bridge().serve(stdio()).await?;
    service.waiting().await?;
    info!("MCP stdio session closed");
    Ok(())
}

/// Serve the HTTP app on `[server].bind` until the process is terminated.
pub async fn run_http(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.bind.clone();

    for t in state.tools.tools() {
        info!(tool = t.name(), "registered tool");
    }

    let app = router(state);

    info!("MCP server listening on http://{}/mcp", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the Axum router. Exposed for embedding and tests.
pub fn router(state: AppState) -> Router {
    let bridge = state.bridge();
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Map a tool failure to a status code. Backend failures surface as 502,
/// argument problems as 400, anything else as 500.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = format!("{}: {:#}", tool_name, err);

    if err.downcast_ref::<WeaviateError>().is_some() {
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "backend_error",
            message,
        }
    } else if err.downcast_ref::<InvalidArgument>().is_some() {
        bad_request(message)
    } else {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "tool_error",
            message,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.tools.tools().iter().map(|t| ToolInfo::of(t.as_ref())).collect(),
    })
}

// ============ POST /tools/{name} ============

/// Unified tool dispatch: look up, validate, execute.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let validated_params = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    let ctx = ToolContext::new(state.config.clone(), state.backend.clone());
    let result = tool
        .execute(validated_params, &ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
