//! # Weaviate Context
//!
//! Hybrid search with context extension over a chunk-indexed Weaviate
//! collection, exposed as an MCP tool.
//!
//! A query retrieves the top-ranked chunks; each hit is then widened with
//! its neighboring chunks from the same source document, so the consuming
//! model sees coherent passages instead of isolated fragments.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────────────────────────┐   ┌──────────┐
//! │   MCP    │──▶│ probe → search → group →       │──▶│ Weaviate │
//! │ stdio /  │   │ [extend] → aggregate           │   │ GraphQL  │
//! │  HTTP    │   └────────────────────────────────┘   └──────────┘
//! └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wvctx probe Documents                        # is page grouping available?
//! wvctx search Documents "carbon accounting" --ext-k 1
//! wvctx serve stdio                            # MCP over stdin/stdout
//! wvctx serve http                             # MCP Streamable HTTP on /mcp
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Hits, chunk refs, groups, passages |
//! | [`filter`] | `where` filter values and GraphQL rendering |
//! | [`query`] | GraphQL query construction |
//! | [`backend`] | `Backend` trait, Weaviate and in-memory implementations |
//! | [`extend`] | Grouping, neighbor resolution and aggregation |
//! | [`traits`] | `Tool` trait, `ToolContext`, `ToolRegistry` |
//! | [`tool_params`] | Tool parameter validation |
//! | [`mcp`] | rmcp `ServerHandler` bridge |
//! | [`server`] | stdio and HTTP transports |
//! | [`search`] | CLI search and probe commands |

pub mod backend;
pub mod config;
pub mod extend;
pub mod filter;
pub mod mcp;
pub mod models;
pub mod query;
pub mod search;
pub mod server;
pub mod tool_params;
pub mod traits;
