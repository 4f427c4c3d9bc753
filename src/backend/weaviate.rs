//! Weaviate [`Backend`] over the REST schema endpoint and the GraphQL API.
//!
//! - `GET  {url}/v1/schema/{collection}` — capability probe
//! - `POST {url}/v1/graphql` — search, aggregate count and point fetch
//!
//! Any response carrying a non-empty `errors` payload is fatal for the call.
//! No request is retried.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::Backend;
use crate::config::WeaviateConfig;
use crate::filter::WhereValue;
use crate::models::{ChunkRef, Hit};
use crate::query::{
    count_query, hybrid_query, point_fetch_query, HybridQuery, CHUNK_ID_FIELD, CONTENT_FIELD,
    PAGE_FIELD, SOURCE_FIELD,
};

/// Failures talking to Weaviate.
#[derive(Error, Debug)]
pub enum WeaviateError {
    #[error("Weaviate request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Weaviate returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Weaviate returned an invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Weaviate query error: {0}")]
    GraphQl(String),
}

pub struct WeaviateBackend {
    client: reqwest::Client,
    base_url: String,
}

impl WeaviateBackend {
    pub fn new(config: &WeaviateConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// POST a GraphQL document and return its `data` member.
    async fn graphql(&self, query: String) -> Result<Value, WeaviateError> {
        let response = self
            .client
            .post(format!("{}/v1/graphql", self.base_url))
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let json: Value = match serde_json::from_str(&body) {
            Ok(json) => json,
            Err(_) if !status.is_success() => {
                return Err(WeaviateError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(errors) = json.get("errors") {
            let empty = errors.is_null() || errors.as_array().is_some_and(|a| a.is_empty());
            if !empty {
                return Err(WeaviateError::GraphQl(errors.to_string()));
            }
        }

        Ok(json.get("data").cloned().unwrap_or(Value::Null))
    }

    async fn probe(&self, collection: &str) -> Result<bool, WeaviateError> {
        let response = self
            .client
            .get(format!("{}/v1/schema/{}", self.base_url, collection))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeaviateError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let class: Value = serde_json::from_str(&response.text().await?)?;
        Ok(has_property(&class, PAGE_FIELD))
    }
}

#[async_trait]
impl Backend for WeaviateBackend {
    async fn has_page_number(&self, collection: &str) -> bool {
        match self.probe(collection).await {
            Ok(flag) => flag,
            Err(e) => {
                debug!(collection, error = %e, "schema probe failed; page grouping disabled");
                false
            }
        }
    }

    async fn hybrid_search(&self, query: &HybridQuery<'_>) -> Result<Vec<Hit>> {
        let data = self.graphql(hybrid_query(query)).await?;
        Ok(get_rows(&data, query.collection)
            .iter()
            .map(|row| hit_from_row(row, query.with_page))
            .collect())
    }

    async fn count_chunks(&self, collection: &str, document_id: &str) -> Result<u64> {
        let data = self.graphql(count_query(collection, document_id)).await?;
        Ok(data
            .pointer(&format!("/Aggregate/{}/0/meta/count", collection))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    async fn fetch_chunk(
        &self,
        collection: &str,
        chunk: &ChunkRef,
        where_filter: Option<&WhereValue>,
        with_page: bool,
    ) -> Result<Option<Hit>> {
        let data = self
            .graphql(point_fetch_query(collection, chunk, where_filter, with_page))
            .await?;
        Ok(get_rows(&data, collection)
            .first()
            .map(|row| hit_from_row(row, with_page)))
    }
}

fn has_property(class: &Value, name: &str) -> bool {
    class
        .get("properties")
        .and_then(Value::as_array)
        .is_some_and(|props| {
            props
                .iter()
                .any(|p| p.get("name").and_then(Value::as_str) == Some(name))
        })
}

fn get_rows<'a>(data: &'a Value, collection: &str) -> &'a [Value] {
    data.get("Get")
        .and_then(|g| g.get(collection))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Null becomes empty; non-string scalars are stringified.
fn text_field(row: &Value, field: &str) -> String {
    match row.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Integers, integral floats and numeric strings are accepted.
fn page_field(row: &Value) -> Option<i64> {
    match row.get(PAGE_FIELD)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn hit_from_row(row: &Value, with_page: bool) -> Hit {
    Hit {
        content: text_field(row, CONTENT_FIELD),
        doc_chunk_id: text_field(row, CHUNK_ID_FIELD),
        source: text_field(row, SOURCE_FIELD),
        page_number: if with_page { page_field(row) } else { None },
    }
}
