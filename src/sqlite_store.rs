//! SQLite-backed production stores.
//!
//! One [`SqliteStore`] implements all three store traits over the schema
//! created by [`crate::migrate`]:
//!
//! - **Vector search**: brute-force cosine similarity over `chunk_vectors`,
//!   computed in Rust.
//! - **Keyword search**: FTS5 narrows the candidate set (any query token
//!   matches), then candidates are scored with the lexical scorer so the
//!   score is identical to the in-process fallback.
//! - **Graph search**: every fact is scored against the query with the
//!   lexical scorer; facts with zero relevance are omitted.
//! - **Documents**: `chunk_count` is derived from the `chunks` table.
//!
//! Timestamps are stored as Unix seconds.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use research_harness_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use research_harness_core::lexical::{text_similarity, tokenize};
use research_harness_core::models::{
    Chunk, ChunkHit, Document, GraphFact, Metadata, MetadataFilter,
};
use research_harness_core::store::{rank_hits, DocumentStore, GraphStore, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or update a document row. `chunk_count` is ignored; it is
    /// always derived from the stored chunks.
    pub async fn upsert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, source, metadata_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                source = excluded.source,
                metadata_json = excluded.metadata_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.source)
        .bind(serde_json::to_string(&doc.metadata)?)
        .bind(doc.created_at.timestamp())
        .bind(doc.updated_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Atomically replace every chunk of `doc_id`, storing `vectors[i]` for
    /// `chunks[i]` when vectors are given.
    pub async fn replace_chunks(
        &self,
        doc_id: &str,
        chunks: &[Chunk],
        vectors: Option<&[Vec<f32>]>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chunk_vectors WHERE chunk_id IN (SELECT id FROM chunks WHERE document_id = ?)",
        )
        .bind(doc_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        for (i, chunk) in chunks.iter().enumerate() {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, content, metadata_json) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(doc_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(serde_json::to_string(&chunk.metadata)?)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunks_fts (chunk_id, document_id, content) VALUES (?, ?, ?)")
                .bind(&chunk.id)
                .bind(doc_id)
                .bind(&chunk.content)
                .execute(&mut *tx)
                .await?;

            if let Some(vec) = vectors.and_then(|v| v.get(i)) {
                sqlx::query(
                    "INSERT INTO chunk_vectors (chunk_id, document_id, embedding) VALUES (?, ?, ?)",
                )
                .bind(&chunk.id)
                .bind(doc_id)
                .bind(vec_to_blob(vec))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Insert or update a graph fact. `confidence` is query-dependent and
    /// not persisted.
    pub async fn upsert_fact(&self, fact: &GraphFact) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO graph_facts (id, fact_text, valid_at, invalid_at, source_entity_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                fact_text = excluded.fact_text,
                valid_at = excluded.valid_at,
                invalid_at = excluded.invalid_at,
                source_entity_id = excluded.source_entity_id
            "#,
        )
        .bind(&fact.id)
        .bind(&fact.fact_text)
        .bind(fact.valid_at.timestamp())
        .bind(fact.invalid_at.map(|t| t.timestamp()))
        .bind(&fact.source_entity_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn from_ts(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| anyhow!("timestamp out of range: {}", ts))
}

fn parse_metadata(raw: &str) -> Result<Metadata> {
    serde_json::from_str(raw).with_context(|| "invalid metadata_json")
}

fn row_to_hit(row: &SqliteRow, score: f64) -> Result<ChunkHit> {
    Ok(ChunkHit {
        chunk_id: row.try_get("chunk_id")?,
        document_id: row.try_get("document_id")?,
        chunk_index: row.try_get("chunk_index")?,
        content: row.try_get("content")?,
        document_title: row.try_get("title")?,
        document_source: row.try_get("source")?,
        score,
    })
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let metadata_json: String = row.try_get("metadata_json")?;
    Ok(Document {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        source: row.try_get("source")?,
        metadata: parse_metadata(&metadata_json)?,
        created_at: from_ts(row.try_get("created_at")?)?,
        updated_at: from_ts(row.try_get("updated_at")?)?,
        chunk_count: row.try_get("chunk_count")?,
    })
}

const DOCUMENT_COLUMNS: &str = r#"
    d.id, d.title, d.source, d.metadata_json, d.created_at, d.updated_at,
    (SELECT COUNT(*) FROM chunks c WHERE c.document_id = d.id) AS chunk_count
"#;

#[async_trait]
impl VectorStore for SqliteStore {
    async fn similarity_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ChunkHit>> {
        let rows = sqlx::query(
            r#"
            SELECT cv.chunk_id, c.document_id, c.chunk_index, c.content,
                   d.title, d.source, cv.embedding
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            JOIN documents d ON d.id = c.document_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.try_get("embedding")?;
                let similarity = cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64;
                row_to_hit(row, similarity)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(rank_hits(hits, limit))
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ChunkHit>> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        // Tokens are alphanumeric, so quoting each one yields a valid FTS5 expression.
        let match_expr = tokens
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR ");

        let rows = sqlx::query(
            r#"
            SELECT c.id AS chunk_id, c.document_id, c.chunk_index, c.content,
                   d.title, d.source
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.chunk_id
            JOIN documents d ON d.id = c.document_id
            WHERE chunks_fts MATCH ?
            "#,
        )
        .bind(&match_expr)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let content: String = row.try_get("content")?;
            let score = text_similarity(query, &content);
            if score > 0.0 {
                hits.push(row_to_hit(row, score)?);
            }
        }

        Ok(rank_hits(hits, limit))
    }
}

#[async_trait]
impl GraphStore for SqliteStore {
    async fn search_facts(&self, query: &str) -> Result<Vec<GraphFact>> {
        let rows = sqlx::query(
            "SELECT id, fact_text, valid_at, invalid_at, source_entity_id FROM graph_facts",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut facts = Vec::new();
        for row in &rows {
            let fact_text: String = row.try_get("fact_text")?;
            let confidence = text_similarity(query, &fact_text);
            if confidence <= 0.0 {
                continue;
            }
            let invalid_at: Option<i64> = row.try_get("invalid_at")?;
            facts.push(GraphFact {
                id: row.try_get("id")?,
                fact_text,
                valid_at: from_ts(row.try_get("valid_at")?)?,
                invalid_at: invalid_at.map(from_ts).transpose()?,
                source_entity_id: row.try_get("source_entity_id")?,
                confidence,
            });
        }
        Ok(facts)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let sql = format!("SELECT {} FROM documents d WHERE d.id = ?", DOCUMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_documents(
        &self,
        limit: usize,
        offset: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        let filter = filter.filter(|f| !f.is_empty());

        match filter {
            None => {
                let sql = format!(
                    "SELECT {} FROM documents d ORDER BY d.created_at ASC, d.id ASC LIMIT ? OFFSET ?",
                    DOCUMENT_COLUMNS
                );
                let rows = sqlx::query(&sql)
                    .bind(limit as i64)
                    .bind(offset as i64)
                    .fetch_all(&self.pool)
                    .await?;
                rows.iter().map(row_to_document).collect()
            }
            // Arbitrary JSON values do not compare reliably through json_extract,
            // so filtered listings page in Rust.
            Some(filter) => {
                let sql = format!(
                    "SELECT {} FROM documents d ORDER BY d.created_at ASC, d.id ASC",
                    DOCUMENT_COLUMNS
                );
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
                let mut docs = Vec::new();
                for row in &rows {
                    let doc = row_to_document(row)?;
                    if filter.matches(&doc.metadata) {
                        docs.push(doc);
                    }
                }
                Ok(docs.into_iter().skip(offset).take(limit).collect())
            }
        }
    }
}
