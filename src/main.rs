//! # Weaviate Context CLI (`wvctx`)
//!
//! ## Usage
//!
//! ```bash
//! wvctx --config ./config/wvctx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wvctx search <collection> "<query>"` | Run one hybrid search with context extension |
//! | `wvctx probe <collection>` | Report whether page grouping is available |
//! | `wvctx tools` | List registered tools and their parameter schemas |
//! | `wvctx serve stdio` | Serve MCP over stdin/stdout |
//! | `wvctx serve http` | Serve MCP Streamable HTTP plus the JSON tool API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use weaviate_context::backend::weaviate::WeaviateBackend;
use weaviate_context::backend::Backend;
use weaviate_context::config;
use weaviate_context::search::{self, SearchArgs};
use weaviate_context::server::{self, AppState};
use weaviate_context::traits::{ToolInfo, ToolRegistry};

/// Weaviate Context CLI — hybrid search with neighbor-chunk context
/// extension, served as an MCP tool.
#[derive(Parser)]
#[command(name = "wvctx", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Built-in defaults are used when the file does not exist.
    #[arg(long, global = true, default_value = "./config/wvctx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one hybrid search with context extension and print the passages.
    Search {
        /// Weaviate collection (class) name.
        collection: String,

        /// Free-text query.
        query: String,

        /// Number of ranked hits to retrieve.
        #[arg(long)]
        top_k: Option<u64>,

        /// Neighbor radius around every hit.
        #[arg(long)]
        ext_k: Option<u64>,

        /// Weaviate `where` filter as JSON.
        #[arg(long = "where")]
        where_json: Option<String>,

        /// Print each passage as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },

    /// Check whether a collection exposes `page_number`.
    Probe {
        /// Weaviate collection (class) name.
        collection: String,
    },

    /// List registered tools with their parameter schemas.
    Tools,

    /// Start the MCP server.
    Serve {
        #[command(subcommand)]
        transport: ServeTransport,
    },
}

#[derive(Subcommand)]
enum ServeTransport {
    /// MCP over stdin/stdout.
    Stdio,
    /// MCP Streamable HTTP on `/mcp` plus `/tools/*`, bound to `[server].bind`.
    Http,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the stdio MCP channel; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Search {
            collection,
            query,
            top_k,
            ext_k,
            where_json,
            json,
        } => {
            let args = SearchArgs {
                collection,
                query,
                top_k,
                ext_k,
                where_json,
                json,
            };
            search::run_search(&cfg, &args).await?;
        }
        Commands::Probe { collection } => {
            search::run_probe(&cfg, &collection).await?;
        }
        Commands::Tools => {
            let registry = ToolRegistry::with_builtins(&cfg);
            let infos: Vec<ToolInfo> = registry
                .tools()
                .iter()
                .map(|t| ToolInfo::of(t.as_ref()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&infos)?);
        }
        Commands::Serve { transport } => {
            let backend: Arc<dyn Backend> = Arc::new(WeaviateBackend::new(&cfg.weaviate)?);
            let tools = Arc::new(ToolRegistry::with_builtins(&cfg));
            let state = AppState::new(Arc::new(cfg), tools, backend);
            match transport {
                ServeTransport::Stdio => server::run_stdio(state).await?,
                ServeTransport::Http => server::run_http(state).await?,
            }
        }
    }

    Ok(())
}
