//! GraphQL query construction for the Weaviate backend.
//!
//! Three query shapes are produced:
//!
//! - **hybrid search** — relevance-ranked `Get` over the `content` property,
//!   bounded by `limit`, optionally filtered by the caller's `where`;
//! - **chunk count** — `Aggregate` count of chunks whose composite id starts
//!   with a document id;
//! - **point fetch** — `Get` of one chunk by exact composite id, conjoined
//!   with the caller's `where`.

use crate::filter::{quote, WhereValue};
use crate::models::ChunkRef;

pub const CONTENT_FIELD: &str = "content";
pub const SOURCE_FIELD: &str = "source";
pub const CHUNK_ID_FIELD: &str = "doc_chunk_id";
pub const PAGE_FIELD: &str = "page_number";

/// Properties requested on every `Get`.
pub fn field_list(with_page: bool) -> Vec<&'static str> {
    let mut fields = vec![CONTENT_FIELD, SOURCE_FIELD, CHUNK_ID_FIELD];
    if with_page {
        fields.push(PAGE_FIELD);
    }
    fields
}

/// Inputs for the initial ranked search.
#[derive(Debug, Clone)]
pub struct HybridQuery<'a> {
    pub collection: &'a str,
    pub query: &'a str,
    pub where_filter: Option<&'a WhereValue>,
    pub limit: u64,
    pub with_page: bool,
}

pub fn hybrid_query(q: &HybridQuery<'_>) -> String {
    let mut args = vec![format!(
        "hybrid: {{query: {}, properties: [{}]}}",
        quote(q.query),
        quote(CONTENT_FIELD)
    )];
    if let Some(w) = q.where_filter {
        args.push(format!("where: {}", w.to_graphql()));
    }
    args.push(format!("limit: {}", q.limit));
    get_query(q.collection, &args, q.with_page)
}

pub fn count_query(collection: &str, document_id: &str) -> String {
    let prefix = format!("{}_*", document_id);
    let filter = WhereValue::text_condition(CHUNK_ID_FIELD, "Like", &prefix);
    format!(
        "{{\n  Aggregate {{\n    {}(where: {}) {{\n      meta {{ count }}\n    }}\n  }}\n}}",
        collection,
        filter.to_graphql()
    )
}

pub fn point_fetch_query(
    collection: &str,
    chunk: &ChunkRef,
    where_filter: Option<&WhereValue>,
    with_page: bool,
) -> String {
    let filter =
        WhereValue::text_condition(CHUNK_ID_FIELD, "Equal", &chunk.to_string()).and(where_filter);
    let args = vec![format!("where: {}", filter.to_graphql()), "limit: 1".to_string()];
    get_query(collection, &args, with_page)
}

fn get_query(collection: &str, args: &[String], with_page: bool) -> String {
    let args = args
        .iter()
        .map(|a| format!("      {}", a))
        .collect::<Vec<_>>()
        .join("\n");
    let fields = field_list(with_page)
        .iter()
        .map(|f| format!("      {}", f))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{{\n  Get {{\n    {}(\n{}\n    ) {{\n{}\n    }}\n  }}\n}}",
        collection, args, fields
    )
}
