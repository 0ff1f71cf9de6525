//! Hybrid scoring: weighted merge of vector similarity and lexical relevance.
//!
//! # Scoring
//!
//! ```text
//! combined = vector_similarity × (1 − text_weight) + text_similarity × text_weight
//! ```
//!
//! The candidate set is the union (by chunk id) of the vector hits and the
//! keyword hits. A candidate missing from the vector hits has
//! `vector_similarity = 0`. A candidate missing from the keyword hits has its
//! `text_similarity` computed in-process with [`lexical::text_similarity`],
//! so every candidate is scored on both axes.
//!
//! When the vector half is unavailable the caller scores with
//! `text_weight = 1.0`, which makes `combined = text_similarity`.

use std::collections::BTreeMap;

use crate::lexical;
use crate::models::{ChunkHit, ResultKind, SearchResult};

pub const VECTOR_SIMILARITY: &str = "vector_similarity";
pub const TEXT_SIMILARITY: &str = "text_similarity";

/// Weighted combination of the two relevance signals.
pub fn combined_score(vector_similarity: f64, text_similarity: f64, text_weight: f64) -> f64 {
    vector_similarity * (1.0 - text_weight) + text_similarity * text_weight
}

/// Score the union of vector and keyword hits as hybrid results.
///
/// Output order is by chunk id; ranking is left to the fuser.
pub fn score_candidates(
    query: &str,
    vector_hits: &[ChunkHit],
    keyword_hits: &[ChunkHit],
    text_weight: f64,
) -> Vec<SearchResult> {
    struct Candidate<'a> {
        hit: &'a ChunkHit,
        vector_similarity: f64,
        text_similarity: Option<f64>,
    }

    let mut candidates: BTreeMap<&str, Candidate> = BTreeMap::new();
    for hit in vector_hits {
        candidates.insert(
            hit.chunk_id.as_str(),
            Candidate {
                hit,
                vector_similarity: hit.score,
                text_similarity: None,
            },
        );
    }
    for hit in keyword_hits {
        candidates
            .entry(hit.chunk_id.as_str())
            .and_modify(|c| c.text_similarity = Some(hit.score))
            .or_insert(Candidate {
                hit,
                vector_similarity: 0.0,
                text_similarity: Some(hit.score),
            });
    }

    candidates
        .into_values()
        .map(|c| {
            let text = c
                .text_similarity
                .unwrap_or_else(|| lexical::text_similarity(query, &c.hit.content));
            let mut component_scores = BTreeMap::new();
            component_scores.insert(VECTOR_SIMILARITY.to_string(), c.vector_similarity);
            component_scores.insert(TEXT_SIMILARITY.to_string(), text);
            SearchResult {
                score: combined_score(c.vector_similarity, text, text_weight),
                component_scores,
                result_kind: ResultKind::Hybrid,
                ..SearchResult::from_vector_hit(c.hit.clone())
            }
        })
        .collect()
}
