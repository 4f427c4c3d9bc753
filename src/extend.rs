//! Result grouping and neighbor extension.
//!
//! The pipeline for one call is strictly linear:
//!
//! ```text
//! probe → search → group → [extend] → aggregate
//! ```
//!
//! 1. **Probe** — ask the backend whether `page_number` exists.
//! 2. **Search** — ranked hybrid search, `top_k` hits.
//! 3. **Group** — partition hits by document (and page, when available);
//!    every hit becomes a seed chunk of its group.
//! 4. **Extend** (only when `ext_k > 0`) — for each seed, request positions
//!    `seed ± 1..=ext_k` the group does not hold yet. Requests are
//!    deduplicated across groups by `(document, position)`, fetched
//!    concurrently, and merged back sequentially once every fetch has
//!    settled.
//! 5. **Aggregate** — per group, join chunk texts in ascending position.
//!
//! All state is call-scoped and passed explicitly between stages.

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use crate::backend::Backend;
use crate::filter::WhereValue;
use crate::models::{ChunkRef, Group, GroupKey, Hit, Passage};
use crate::query::HybridQuery;

/// How the forward edge of a document is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionBound {
    /// Count each document's chunks first and never request past the end.
    #[default]
    Count,
    /// Skip the count round-trip; out-of-range fetches simply find nothing.
    None,
}

#[derive(Debug, Clone, Default)]
pub struct ExtensionOptions {
    pub bound: ExtensionBound,
    /// Cap on in-flight backend requests. `None` fans out to every request.
    pub max_concurrent_fetches: Option<usize>,
    /// Attach a fetched neighbor to a page-scoped group only when its own
    /// page matches.
    pub verify_page: bool,
}

/// Validated inputs for one call.
#[derive(Debug, Clone)]
pub struct ExtensionRequest {
    pub collection: String,
    pub query: String,
    pub where_filter: Option<WhereValue>,
    pub top_k: u64,
    pub ext_k: u64,
}

/// Output of [`group_hits`].
#[derive(Debug, Default)]
pub struct Grouping {
    pub groups: BTreeMap<GroupKey, Group>,
    pub document_ids: BTreeSet<String>,
}

/// Neighbor positions still missing, each mapped to the groups that want it.
pub type NeighborPlan = BTreeMap<ChunkRef, BTreeSet<GroupKey>>;

/// Result of one point fetch.
#[derive(Debug, Clone)]
pub struct FetchedChunk {
    pub request: ChunkRef,
    pub hit: Option<Hit>,
}

/// Partition ranked hits into groups keyed by document, or by document and
/// page when `with_page` is set and the hit carries a page.
pub fn group_hits(hits: &[Hit], with_page: bool) -> Grouping {
    let mut grouping = Grouping::default();

    for hit in hits {
        let Some(chunk) = ChunkRef::parse(&hit.doc_chunk_id) else {
            debug!(doc_chunk_id = %hit.doc_chunk_id, "skipping hit with unparseable chunk id");
            continue;
        };
        grouping.document_ids.insert(chunk.document_id.clone());

        let key = GroupKey {
            document_id: chunk.document_id,
            page: if with_page { hit.page_number } else { None },
        };

        let group = grouping
            .groups
            .entry(key)
            .or_insert_with_key(|key| Group::new(key, hit.source.clone()));
        if group.source.is_empty() {
            group.source = hit.source.clone();
        }
        group.insert_seed(chunk.position, hit.content.clone());
    }

    grouping
}

/// Collect the neighbor positions each group needs.
///
/// With `totals`, forward candidates at or beyond a document's chunk count
/// are dropped; a document missing from `totals` gets no forward neighbors.
pub fn plan_neighbors(
    groups: &BTreeMap<GroupKey, Group>,
    ext_k: u64,
    totals: Option<&HashMap<String, u64>>,
) -> NeighborPlan {
    let mut plan = NeighborPlan::new();
    if ext_k == 0 {
        return plan;
    }

    for (key, group) in groups {
        let limit = totals.map(|t| t.get(&group.document_id).copied().unwrap_or(0));
        for &seed in &group.seeds {
            // Past this radius both sides are out of range.
            let radius = match limit {
                Some(total) => ext_k.min(seed.max(total.saturating_sub(seed))),
                None => ext_k,
            };
            for i in 1..=radius {
                let before = seed.checked_sub(i);
                let after = seed
                    .checked_add(i)
                    .filter(|next| limit.map_or(true, |total| *next < total));
                if before.is_none() && after.is_none() {
                    break;
                }

                for position in [before, after].into_iter().flatten() {
                    if group.chunks.contains_key(&position) {
                        continue;
                    }
                    plan.entry(ChunkRef::new(group.document_id.clone(), position))
                        .or_default()
                        .insert(key.clone());
                }
            }
        }
    }

    plan
}

fn fan_out_width(options: &ExtensionOptions, requests: usize) -> usize {
    options
        .max_concurrent_fetches
        .unwrap_or(requests)
        .clamp(1, requests.max(1))
}

/// Chunk counts for every document, fetched concurrently.
pub async fn count_documents<B: Backend + ?Sized>(
    backend: &B,
    collection: &str,
    document_ids: &BTreeSet<String>,
    options: &ExtensionOptions,
) -> Result<HashMap<String, u64>> {
    stream::iter(document_ids.iter().cloned())
        .map(|document_id| async move {
            let total = backend.count_chunks(collection, &document_id).await?;
            Ok::<_, anyhow::Error>((document_id, total))
        })
        .buffer_unordered(fan_out_width(options, document_ids.len()))
        .try_collect()
        .await
}

/// Issue one fetch per planned chunk and wait for all of them.
///
/// The first backend error aborts the whole resolution.
pub async fn resolve_neighbors<B: Backend + ?Sized>(
    backend: &B,
    collection: &str,
    plan: &NeighborPlan,
    where_filter: Option<&WhereValue>,
    with_page: bool,
    options: &ExtensionOptions,
) -> Result<Vec<FetchedChunk>> {
    stream::iter(plan.keys().cloned())
        .map(|chunk| async move {
            let hit = backend
                .fetch_chunk(collection, &chunk, where_filter, with_page)
                .await?;
            Ok::<_, anyhow::Error>(FetchedChunk {
                request: chunk,
                hit,
            })
        })
        .buffer_unordered(fan_out_width(options, plan.len()))
        .try_collect()
        .await
}

/// Write fetched neighbors into every group that requested them.
///
/// Missing chunks, chunks with unparseable ids and chunks other than the one
/// requested are dropped. Returns the number of chunk insertions made.
pub fn merge_fetched(
    groups: &mut BTreeMap<GroupKey, Group>,
    plan: &NeighborPlan,
    fetched: Vec<FetchedChunk>,
    verify_page: bool,
) -> usize {
    let mut inserted = 0;

    for FetchedChunk { request, hit } in fetched {
        let Some(hit) = hit else {
            continue;
        };
        let Some(chunk) = ChunkRef::parse(&hit.doc_chunk_id) else {
            debug!(requested = %request, doc_chunk_id = %hit.doc_chunk_id, "dropping neighbor with unparseable chunk id");
            continue;
        };
        if chunk != request {
            debug!(requested = %request, doc_chunk_id = %hit.doc_chunk_id, "dropping neighbor that does not match the requested chunk");
            continue;
        }
        let Some(demand) = plan.get(&request) else {
            continue;
        };

        for key in demand {
            let Some(group) = groups.get_mut(key) else {
                continue;
            };
            if verify_page && group.page_number.is_some() && group.page_number != hit.page_number {
                continue;
            }
            if group.insert_neighbor(chunk.position, &hit.content) {
                inserted += 1;
            }
        }
    }

    inserted
}

/// One passage per group, chunk texts joined in ascending position.
pub fn aggregate(groups: BTreeMap<GroupKey, Group>) -> Vec<Passage> {
    groups
        .into_values()
        .map(|group| Passage {
            content: group.chunks.into_values().collect(),
            source: group.source,
            page_number: group.page_number,
        })
        .collect()
}

/// Run the full pipeline for one call.
pub async fn search_with_extension<B: Backend + ?Sized>(
    backend: &B,
    request: &ExtensionRequest,
    options: &ExtensionOptions,
) -> Result<Vec<Passage>> {
    let collection = request.collection.as_str();
    let where_filter = request.where_filter.as_ref();

    let with_page = backend.has_page_number(collection).await;

    let hits = backend
        .hybrid_search(&HybridQuery {
            collection,
            query: &request.query,
            where_filter,
            limit: request.top_k,
            with_page,
        })
        .await?;

    let Grouping {
        mut groups,
        document_ids,
    } = group_hits(&hits, with_page);

    let mut neighbors = 0;
    if request.ext_k > 0 && !groups.is_empty() {
        let totals = match options.bound {
            ExtensionBound::Count => {
                Some(count_documents(backend, collection, &document_ids, options).await?)
            }
            ExtensionBound::None => None,
        };

        let plan = plan_neighbors(&groups, request.ext_k, totals.as_ref());
        if !plan.is_empty() {
            let fetched =
                resolve_neighbors(backend, collection, &plan, where_filter, with_page, options)
                    .await?;
            neighbors = merge_fetched(
                &mut groups,
                &plan,
                fetched,
                options.verify_page && with_page,
            );
        }
    }

    info!(
        collection,
        hits = hits.len(),
        groups = groups.len(),
        neighbors,
        page_grouping = with_page,
        "hybrid search with extension completed"
    );

    Ok(aggregate(groups))
}
