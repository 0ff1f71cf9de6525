//! Result fusion: merge, deduplicate, rank, truncate.
//!
//! Chunk-backed results are deduplicated by `chunk_id`; graph results by
//! `fact_id` in a separate key space, so a fact never collides with a chunk.
//! When a key appears more than once the result that ranks first under
//! [`compare_results`] survives. Because that is a minimum over a total
//! order, fusion is associative and commutative: fusing `[A, B]` then `[C]`
//! yields the same set as fusing `[A]` then `[B, C]`, and fusing an
//! already-fused list is a no-op.
//!
//! # Ranking
//!
//! 1. Score descending.
//! 2. Result kind priority: hybrid, vector, graph.
//! 3. Key (chunk id or fact id) ascending.
//! 4. Content, then document id, ascending.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::models::SearchResult;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum FusionKey {
    Chunk(String),
    Fact(String),
}

fn fusion_key(result: &SearchResult) -> FusionKey {
    match (&result.chunk_id, &result.fact_id) {
        (Some(chunk_id), _) => FusionKey::Chunk(chunk_id.clone()),
        (None, Some(fact_id)) => FusionKey::Fact(fact_id.clone()),
        (None, None) => FusionKey::Fact(String::new()),
    }
}

/// Total ranking order over results; `Less` ranks first.
pub fn compare_results(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.result_kind.priority().cmp(&b.result_kind.priority()))
        .then_with(|| a.key().cmp(b.key()))
        .then_with(|| a.content.cmp(&b.content))
        .then_with(|| a.document_id.cmp(&b.document_id))
}

/// Fuse any number of result lists into one ranked list of at most `limit`.
pub fn fuse<I>(lists: I, limit: usize) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Vec<SearchResult>>,
{
    let mut best: BTreeMap<FusionKey, SearchResult> = BTreeMap::new();

    for result in lists.into_iter().flatten() {
        if !result.score.is_finite() {
            tracing::warn!(key = result.key(), "dropping result with non-finite score");
            continue;
        }
        match best.entry(fusion_key(&result)) {
            Entry::Vacant(slot) => {
                slot.insert(result);
            }
            Entry::Occupied(mut slot) => {
                if compare_results(&result, slot.get()) == Ordering::Less {
                    slot.insert(result);
                }
            }
        }
    }

    let mut fused: Vec<SearchResult> = best.into_values().collect();
    fused.sort_by(compare_results);
    fused.truncate(limit);
    fused
}

/// Fuse a vector-origin list with a graph-origin list.
pub fn merge(
    vector_results: Vec<SearchResult>,
    graph_results: Vec<SearchResult>,
    limit: usize,
) -> Vec<SearchResult> {
    fuse([vector_results, graph_results], limit)
}
