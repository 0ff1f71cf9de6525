//! In-memory store implementing all three store traits.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Vector search is brute-force cosine similarity over all stored vectors;
//! keyword and graph lookups use the lexical scorer. Useful for tests and
//! for embedding the engine without a database.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::lexical::text_similarity;
use crate::models::{Chunk, ChunkHit, Document, GraphFact, MetadataFilter};

use super::{compare_documents, rank_hits, DocumentStore, GraphStore, VectorStore};

struct StoredChunk {
    chunk: Chunk,
    vector: Option<Vec<f32>>,
}

/// In-memory store for tests and database-free deployments.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<StoredChunk>>,
    facts: RwLock<Vec<GraphFact>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_document(&self, doc: Document) -> Result<()> {
        write(&self.docs)?.insert(doc.id.clone(), doc);
        Ok(())
    }

    /// Replace all chunks for a document, optionally storing one vector per chunk.
    pub fn replace_chunks(
        &self,
        doc_id: &str,
        chunks: Vec<Chunk>,
        vectors: Option<Vec<Vec<f32>>>,
    ) -> Result<()> {
        let mut stored = write(&self.chunks)?;
        stored.retain(|sc| sc.chunk.document_id != doc_id);
        let mut vectors = vectors.map(|v| v.into_iter());
        for chunk in chunks {
            let vector = vectors.as_mut().and_then(|it| it.next());
            stored.push(StoredChunk { chunk, vector });
        }
        Ok(())
    }

    pub fn upsert_fact(&self, fact: GraphFact) -> Result<()> {
        let mut facts = write(&self.facts)?;
        facts.retain(|f| f.id != fact.id);
        facts.push(fact);
        Ok(())
    }
}

fn to_hit(docs: &HashMap<String, Document>, chunk: &Chunk, score: f64) -> ChunkHit {
    let (title, source) = docs
        .get(&chunk.document_id)
        .map(|d| (d.title.clone(), d.source.clone()))
        .unwrap_or_default();
    ChunkHit {
        chunk_id: chunk.id.clone(),
        document_id: chunk.document_id.clone(),
        chunk_index: chunk.chunk_index,
        content: chunk.content.clone(),
        document_title: title,
        document_source: source,
        score,
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn similarity_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ChunkHit>> {
        let docs = read(&self.docs)?;
        let chunks = read(&self.chunks)?;
        let hits = chunks
            .iter()
            .filter_map(|sc| {
                let v = sc.vector.as_ref()?;
                let sim = cosine_similarity(query_vec, v) as f64;
                Some(to_hit(&docs, &sc.chunk, sim))
            })
            .collect();
        Ok(rank_hits(hits, limit))
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ChunkHit>> {
        let docs = read(&self.docs)?;
        let chunks = read(&self.chunks)?;
        let hits = chunks
            .iter()
            .filter_map(|sc| {
                let score = text_similarity(query, &sc.chunk.content);
                (score > 0.0).then(|| to_hit(&docs, &sc.chunk, score))
            })
            .collect();
        Ok(rank_hits(hits, limit))
    }
}

#[async_trait]
impl GraphStore for InMemoryStore {
    async fn search_facts(&self, query: &str) -> Result<Vec<GraphFact>> {
        let facts = read(&self.facts)?;
        Ok(facts
            .iter()
            .filter_map(|f| {
                let confidence = text_similarity(query, &f.fact_text);
                (confidence > 0.0).then(|| GraphFact {
                    confidence,
                    ..f.clone()
                })
            })
            .collect())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(read(&self.docs)?.get(id).cloned())
    }

    async fn list_documents(
        &self,
        limit: usize,
        offset: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        let docs = read(&self.docs)?;
        let mut matching: Vec<&Document> = docs
            .values()
            .filter(|d| filter.map_or(true, |f| f.matches(&d.metadata)))
            .collect();
        matching.sort_by(|a, b| compare_documents(a, b));
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
