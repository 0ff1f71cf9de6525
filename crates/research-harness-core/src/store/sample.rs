//! Deterministic sample-data store used in mock mode.
//!
//! Serves a fixed two-document corpus (Federal Reserve research notes), four
//! chunks, and four knowledge-graph facts. Scores are fixed per sample item
//! and independent of the query, so identical requests always produce
//! identical responses.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::models::{ChunkHit, Document, GraphFact, Metadata, MetadataFilter};

use super::{compare_documents, rank_hits, DocumentStore, GraphStore, VectorStore};

/// Lexical relevance reported for every sample chunk.
pub const SAMPLE_TEXT_SIMILARITY: f64 = 0.8;

const FED_DOC: &str = "doc-fed-q4-2024";
const FED_TITLE: &str = "Federal Reserve Interest Rate Decision Q4 2024";
const FED_SOURCE: &str = "Federal Reserve Interest Rate Decision Q4 2024.pdf";
const POLICY_DOC: &str = "doc-monetary-policy-2024";
const POLICY_TITLE: &str = "Monetary Policy Transmission Mechanisms 2024";
const POLICY_SOURCE: &str = "monetary_policy_2024.pdf";

/// (chunk_id, document_id, chunk_index, similarity, content)
const SAMPLE_CHUNKS: &[(&str, &str, i64, f64, &str)] = &[
    (
        "550e8400-e29b-41d4-a716-446655440000",
        FED_DOC,
        0,
        0.95,
        "The Federal Open Market Committee (FOMC) decided to raise the federal funds rate by 25 basis points to 5.50-5.75% in Q4 2024, citing persistent inflationary pressures in the services sector and robust labor market conditions. This decision reflects the Committee's commitment to achieving its dual mandate of price stability and maximum employment.",
    ),
    (
        "550e8400-e29b-41d4-a716-446655440001",
        FED_DOC,
        1,
        0.92,
        "The Committee expects that the cumulative effects of monetary policy tightening will continue to slow economic activity and reduce inflation toward the 2% target. Recent data indicates core PCE inflation remains elevated at 3.7%, though showing signs of moderation in goods prices while services inflation persists.",
    ),
    (
        "550e8400-e29b-41d4-a716-446655440002",
        FED_DOC,
        2,
        0.89,
        "Labor market conditions remain tight with unemployment at 3.9% and job openings still elevated relative to historical norms. The Committee will continue to monitor employment data closely as policy transmission effects through credit markets may affect hiring and wage growth in coming quarters.",
    ),
    (
        "550e8400-e29b-41d4-a716-446655440003",
        POLICY_DOC,
        14,
        0.85,
        "Financial conditions have tightened considerably since the beginning of the tightening cycle, with corporate bond spreads widening and equity valuations declining from peak levels. Bank lending standards have tightened for both commercial and consumer loans, which should contribute to slower credit growth.",
    ),
];

/// (fact_id, source_entity_id, confidence, fact_text)
const SAMPLE_FACTS: &[(&str, &str, f64, &str)] = &[
    (
        "fact-550e8400-e29b-41d4-a716-446655440000",
        "node-federal-reserve",
        0.9,
        "Federal Reserve RAISED federal_funds_rate TO 5.50-5.75% IN Q4_2024 DUE_TO persistent_inflation",
    ),
    (
        "fact-550e8400-e29b-41d4-a716-446655440001",
        "node-inflation-metrics",
        0.85,
        "core_PCE_inflation MEASURED_AT 3.7% ABOVE federal_reserve_target OF 2%",
    ),
    (
        "fact-550e8400-e29b-41d4-a716-446655440002",
        "node-labor-market",
        0.8,
        "unemployment_rate DECREASED_TO 3.9% INDICATING tight_labor_market",
    ),
    (
        "fact-550e8400-e29b-41d4-a716-446655440003",
        "node-financial-conditions",
        0.75,
        "financial_conditions TIGHTENED due_to higher_interest_rates AFFECTING credit_markets",
    ),
];

fn ts(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, 0)
        .single()
        .unwrap_or_default()
}

fn metadata(value: serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

/// Fixed sample corpus implementing every store trait.
pub struct SampleStore {
    documents: Vec<Document>,
    chunks: Vec<ChunkHit>,
    facts: Vec<GraphFact>,
}

impl SampleStore {
    pub fn new() -> Self {
        let documents = vec![
            Document {
                id: FED_DOC.to_string(),
                title: FED_TITLE.to_string(),
                source: FED_SOURCE.to_string(),
                metadata: metadata(json!({
                    "author": "Federal Open Market Committee",
                    "pages": 25,
                    "category": "monetary_policy"
                })),
                created_at: ts(2024, 10, 15, 10, 0),
                updated_at: ts(2024, 10, 15, 10, 0),
                chunk_count: 18,
            },
            Document {
                id: POLICY_DOC.to_string(),
                title: POLICY_TITLE.to_string(),
                source: POLICY_SOURCE.to_string(),
                metadata: metadata(json!({
                    "author": "Federal Reserve Economic Research",
                    "pages": 47,
                    "category": "economic_analysis"
                })),
                created_at: ts(2024, 9, 20, 14, 30),
                updated_at: ts(2024, 9, 20, 14, 30),
                chunk_count: 32,
            },
        ];

        let chunks = SAMPLE_CHUNKS
            .iter()
            .map(|&(chunk_id, doc_id, chunk_index, similarity, content)| {
                let (title, source) = if doc_id == FED_DOC {
                    (FED_TITLE, FED_SOURCE)
                } else {
                    (POLICY_TITLE, POLICY_SOURCE)
                };
                ChunkHit {
                    chunk_id: chunk_id.to_string(),
                    document_id: doc_id.to_string(),
                    chunk_index,
                    content: content.to_string(),
                    document_title: title.to_string(),
                    document_source: source.to_string(),
                    score: similarity,
                }
            })
            .collect();

        let facts = SAMPLE_FACTS
            .iter()
            .map(|&(id, entity, confidence, text)| GraphFact {
                id: id.to_string(),
                fact_text: text.to_string(),
                valid_at: ts(2024, 10, 1, 0, 0),
                invalid_at: None,
                source_entity_id: entity.to_string(),
                confidence,
            })
            .collect();

        Self {
            documents,
            chunks,
            facts,
        }
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for SampleStore {
    async fn similarity_search(&self, _query_vec: &[f32], limit: usize) -> Result<Vec<ChunkHit>> {
        Ok(rank_hits(self.chunks.clone(), limit))
    }

    async fn keyword_search(&self, _query: &str, limit: usize) -> Result<Vec<ChunkHit>> {
        let hits = self
            .chunks
            .iter()
            .map(|c| ChunkHit {
                score: SAMPLE_TEXT_SIMILARITY,
                ..c.clone()
            })
            .collect();
        Ok(rank_hits(hits, limit))
    }
}

#[async_trait]
impl GraphStore for SampleStore {
    async fn search_facts(&self, _query: &str) -> Result<Vec<GraphFact>> {
        Ok(self.facts.clone())
    }
}

#[async_trait]
impl DocumentStore for SampleStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn list_documents(
        &self,
        limit: usize,
        offset: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        let mut docs: Vec<&Document> = self
            .documents
            .iter()
            .filter(|d| filter.map_or(true, |f| f.matches(&d.metadata)))
            .collect();
        docs.sort_by(|a, b| compare_documents(a, b));
        Ok(docs.into_iter().skip(offset).take(limit).cloned().collect())
    }
}
