//! Storage abstraction for Research Harness.
//!
//! Three independent, read-only capabilities back the retrieval engine:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`VectorStore`] | Nearest-chunk similarity search and lexical candidate lookup |
//! | [`GraphStore`] | Knowledge-graph fact lookup by free text |
//! | [`DocumentStore`] | Document lookup by id and stable paginated listing |
//!
//! Each may fail independently; failures are reported as `anyhow::Error`
//! and classified by the orchestrator. Every call is all-or-nothing: an
//! implementation never returns a truncated result set on error.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sample;

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkHit, Document, GraphFact, MetadataFilter};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Nearest chunks to `query_vec` by cosine similarity, ordered by
    /// [`rank_hits`]. `limit` is in `[1, 50]`, enforced by the caller.
    async fn similarity_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ChunkHit>>;

    /// Chunks with non-zero lexical relevance to `query`, scored in
    /// `[0.0, 1.0]` and ordered by [`rank_hits`].
    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ChunkHit>>;
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Facts relevant to `query`, including expired ones. Temporal ordering
    /// and filtering are applied by [`crate::graph::order_facts`].
    async fn search_facts(&self, query: &str) -> Result<Vec<GraphFact>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// One page of the corpus in `created_at` ascending, `id` ascending order.
    async fn list_documents(
        &self,
        limit: usize,
        offset: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>>;
}

/// Deterministic store ordering: score descending, then `document_id`
/// ascending, then `chunk_index` ascending.
pub fn compare_hits(a: &ChunkHit, b: &ChunkHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.document_id.cmp(&b.document_id))
        .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// Sort hits with [`compare_hits`] and keep the first `limit`.
pub fn rank_hits(mut hits: Vec<ChunkHit>, limit: usize) -> Vec<ChunkHit> {
    hits.sort_by(compare_hits);
    hits.truncate(limit);
    hits
}

/// Fixed listing order shared by every [`DocumentStore`].
pub fn compare_documents(a: &Document, b: &Document) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}
