//! In-memory [`Backend`] implementation for tests and local experiments.
//!
//! Ranking is not computed: the caller fixes the ranked order with
//! [`InMemoryBackend::with_ranking`], and `hybrid_search` returns that order
//! truncated to the requested limit. Filters are recorded but not evaluated.
//! Every count and point fetch is logged so callers can assert on traffic.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::Backend;
use crate::filter::WhereValue;
use crate::models::{ChunkRef, Hit};
use crate::query::HybridQuery;

/// A point fetch observed by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRecord {
    pub chunk: ChunkRef,
    pub where_filter: Option<WhereValue>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    page_property: bool,
    chunks: HashMap<String, Hit>,
    ranking: Vec<String>,
    fetches: Mutex<Vec<FetchRecord>>,
    counts: Mutex<Vec<String>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the collection schema has a `page_number` property.
    pub fn with_page_property(mut self, enabled: bool) -> Self {
        self.page_property = enabled;
        self
    }

    pub fn with_chunk(mut self, hit: Hit) -> Self {
        self.chunks.insert(hit.doc_chunk_id.clone(), hit);
        self
    }

    pub fn with_chunks(self, hits: impl IntoIterator<Item = Hit>) -> Self {
        hits.into_iter().fold(self, Self::with_chunk)
    }

    /// Composite ids returned by `hybrid_search`, best first. Ids with no
    /// stored chunk are skipped.
    pub fn with_ranking<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.ranking = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn fetches(&self) -> Vec<FetchRecord> {
        self.fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn fetched_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.fetches().iter().map(|f| f.chunk.to_string()).collect();
        ids.sort();
        ids
    }

    pub fn counted_documents(&self) -> Vec<String> {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn project(&self, hit: &Hit, with_page: bool) -> Hit {
        let mut hit = hit.clone();
        if !(with_page && self.page_property) {
            hit.page_number = None;
        }
        hit
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn has_page_number(&self, _collection: &str) -> bool {
        self.page_property
    }

    async fn hybrid_search(&self, query: &HybridQuery<'_>) -> Result<Vec<Hit>> {
        Ok(self
            .ranking
            .iter()
            .filter_map(|id| self.chunks.get(id))
            .take(query.limit as usize)
            .map(|hit| self.project(hit, query.with_page))
            .collect())
    }

    async fn count_chunks(&self, _collection: &str, document_id: &str) -> Result<u64> {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(document_id.to_string());
        let prefix = format!("{}_", document_id);
        Ok(self
            .chunks
            .keys()
            .filter(|id| id.starts_with(&prefix))
            .count() as u64)
    }

    async fn fetch_chunk(
        &self,
        _collection: &str,
        chunk: &ChunkRef,
        where_filter: Option<&WhereValue>,
        with_page: bool,
    ) -> Result<Option<Hit>> {
        self.fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(FetchRecord {
                chunk: chunk.clone(),
                where_filter: where_filter.cloned(),
            });
        Ok(self
            .chunks
            .get(&chunk.to_string())
            .map(|hit| self.project(hit, with_page)))
    }
}
