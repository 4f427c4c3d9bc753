//! Core data models used throughout the extension pipeline.
//!
//! These types represent the raw hits returned by the backend, the parsed
//! chunk identifiers, the per-call result groups, and the merged passages
//! handed back to the caller.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One raw result row from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub content: String,
    /// Composite identifier, `"<documentId>_<position>"`.
    pub doc_chunk_id: String,
    pub source: String,
    /// Only populated when the collection has a `page_number` property and
    /// the row carried a numeric value for it.
    pub page_number: Option<i64>,
}

/// A parsed composite chunk identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkRef {
    pub document_id: String,
    pub position: u64,
}

impl ChunkRef {
    pub fn new(document_id: impl Into<String>, position: u64) -> Self {
        Self {
            document_id: document_id.into(),
            position,
        }
    }

    /// Split a composite identifier at its last `_`.
    ///
    /// Returns `None` when there is no separator, the document part is
    /// empty, or the position is not a non-negative integer.
    pub fn parse(raw: &str) -> Option<Self> {
        let (document_id, position) = raw.rsplit_once('_')?;
        if document_id.is_empty() {
            return None;
        }
        let position = position.parse::<u64>().ok()?;
        Some(Self::new(document_id, position))
    }
}

impl fmt::Display for ChunkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.document_id, self.position)
    }
}

/// Identity of a result group: a document, optionally narrowed to a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub document_id: String,
    pub page: Option<i64>,
}

/// Chunks collected for one group during a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub document_id: String,
    pub page_number: Option<i64>,
    /// First non-empty source label seen for this key.
    pub source: String,
    pub chunks: BTreeMap<u64, String>,
    /// Positions that came directly from the ranked search. Always a subset
    /// of the keys of `chunks`.
    pub seeds: BTreeSet<u64>,
}

impl Group {
    pub fn new(key: &GroupKey, source: String) -> Self {
        Self {
            document_id: key.document_id.clone(),
            page_number: key.page,
            source,
            chunks: BTreeMap::new(),
            seeds: BTreeSet::new(),
        }
    }

    pub fn insert_seed(&mut self, position: u64, content: String) {
        self.chunks.insert(position, content);
        self.seeds.insert(position);
    }

    /// Insert a neighbor chunk unless the position is already held.
    pub fn insert_neighbor(&mut self, position: u64, content: &str) -> bool {
        if self.chunks.contains_key(&position) {
            return false;
        }
        self.chunks.insert(position, content.to_string());
        true
    }
}

/// One merged passage, the unit of the tool response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub content: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_ref() {
        let r = ChunkRef::parse("D1_5").unwrap();
        assert_eq!(r.document_id, "D1");
        assert_eq!(r.position, 5);
    }

    #[test]
    fn test_parse_splits_at_last_separator() {
        let r = ChunkRef::parse("report_2024_final_12").unwrap();
        assert_eq!(r.document_id, "report_2024_final");
        assert_eq!(r.position, 12);
        assert_eq!(r.to_string(), "report_2024_final_12");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ChunkRef::parse("nounderscore").is_none());
        assert!(ChunkRef::parse("D1_").is_none());
        assert!(ChunkRef::parse("D1_abc").is_none());
        assert!(ChunkRef::parse("D1_-3").is_none());
        assert!(ChunkRef::parse("_4").is_none());
        assert!(ChunkRef::parse("D1_4.5").is_none());
    }

    #[test]
    fn test_neighbor_insert_is_idempotent() {
        let key = GroupKey {
            document_id: "D1".to_string(),
            page: None,
        };
        let mut g = Group::new(&key, "a.pdf".to_string());
        g.insert_seed(3, "seed".to_string());
        assert!(!g.insert_neighbor(3, "other"));
        assert!(g.insert_neighbor(4, "next"));
        assert!(!g.insert_neighbor(4, "again"));
        assert_eq!(g.chunks[&3], "seed");
        assert_eq!(g.chunks[&4], "next");
        assert!(g.seeds.contains(&3));
        assert!(!g.seeds.contains(&4));
    }

    #[test]
    fn test_passage_omits_missing_page() {
        let p = Passage {
            content: "x".to_string(),
            source: "s".to_string(),
            page_number: None,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert!(v.get("page_number").is_none());

        let p = Passage {
            page_number: Some(2),
            ..p
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["page_number"], 2);
    }
}
