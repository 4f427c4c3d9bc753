//! CLI front-ends for one-off searches and capability probes.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::backend::weaviate::WeaviateBackend;
use crate::backend::Backend;
use crate::config::Config;
use crate::models::Passage;
use crate::traits::{HybridSearchTool, ToolContext};

/// Command-line arguments for `wvctx search`, before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub collection: String,
    pub query: String,
    pub top_k: Option<u64>,
    pub ext_k: Option<u64>,
    /// Raw JSON text of the `where` filter.
    pub where_json: Option<String>,
    pub json: bool,
}

impl SearchArgs {
    /// The equivalent tool-call parameters.
    pub fn to_params(&self) -> Result<serde_json::Value> {
        let mut params = serde_json::json!({
            "collection": self.collection,
            "query": self.query,
        });
        if let Some(top_k) = self.top_k {
            params["topK"] = top_k.into();
        }
        if let Some(ext_k) = self.ext_k {
            params["extK"] = ext_k.into();
        }
        if let Some(raw) = &self.where_json {
            params["where"] = serde_json::from_str(raw).context("--where is not valid JSON")?;
        }
        Ok(params)
    }
}

pub async fn run_search(config: &Config, args: &SearchArgs) -> Result<()> {
    let backend: Arc<dyn Backend> = Arc::new(WeaviateBackend::new(&config.weaviate)?);
    let ctx = ToolContext::new(Arc::new(config.clone()), backend);

    let request = HybridSearchTool::from_config(config).parse_request(&args.to_params()?)?;
    let passages = ctx.search(&request).await?;

    if args.json {
        for p in &passages {
            println!("{}", serde_json::to_string_pretty(p)?);
        }
        return Ok(());
    }

    if passages.is_empty() {
        println!("No results.");
        return Ok(());
    }

    print!("{}", render_passages(&passages));
    Ok(())
}

pub async fn run_probe(config: &Config, collection: &str) -> Result<()> {
    let backend = WeaviateBackend::new(&config.weaviate)?;
    let with_page = backend.has_page_number(collection).await;
    println!(
        "{}: page grouping {}",
        collection,
        if with_page { "available" } else { "unavailable" }
    );
    Ok(())
}

fn render_passages(passages: &[Passage]) -> String {
    let mut out = String::new();
    for (i, p) in passages.iter().enumerate() {
        let source = if p.source.is_empty() {
            "(unknown source)"
        } else {
            p.source.as_str()
        };
        match p.page_number {
            Some(page) => out.push_str(&format!("{}. {} (page {})\n", i + 1, source, page)),
            None => out.push_str(&format!("{}. {}\n", i + 1, source)),
        }
        for line in p.content.lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
