//! Backend abstraction for the chunk store.
//!
//! The [`Backend`] trait covers the four operations the extension pipeline
//! needs from a chunk-indexed store, so the grouping and neighbor logic can
//! run against Weaviate in production and an in-memory store in tests.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`has_page_number`](Backend::has_page_number) | Capability probe (fail-open to `false`) |
//! | [`hybrid_search`](Backend::hybrid_search) | Initial relevance-ranked search |
//! | [`count_chunks`](Backend::count_chunks) | Number of chunks stored for a document |
//! | [`fetch_chunk`](Backend::fetch_chunk) | Point lookup of one chunk by composite id |

pub mod memory;
pub mod weaviate;

use anyhow::Result;
use async_trait::async_trait;

use crate::filter::WhereValue;
use crate::models::{ChunkRef, Hit};
use crate::query::HybridQuery;

/// Abstract chunk store.
///
/// Implementations must be `Send + Sync`; the resolver issues concurrent
/// `fetch_chunk` calls against a shared reference.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Whether the collection exposes a `page_number` property.
    ///
    /// Never fails: transport or parse problems yield `false`.
    async fn has_page_number(&self, collection: &str) -> bool;

    /// Run the ranked search. Hits come back in rank order.
    async fn hybrid_search(&self, query: &HybridQuery<'_>) -> Result<Vec<Hit>>;

    /// Count the chunks whose composite id is prefixed by `document_id`.
    async fn count_chunks(&self, collection: &str, document_id: &str) -> Result<u64>;

    /// Fetch at most one chunk by exact composite id, restricted by the
    /// caller's filter. `Ok(None)` means the chunk does not exist.
    async fn fetch_chunk(
        &self,
        collection: &str,
        chunk: &ChunkRef,
        where_filter: Option<&WhereValue>,
        with_page: bool,
    ) -> Result<Option<Hit>>;
}
