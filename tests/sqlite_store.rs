//! Integration tests for the SQLite production stores.
//!
//! Each test builds a fresh database in a temporary directory, writes a small
//! corpus through the store's write helpers, and reads it back through the
//! store traits and the orchestrator.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use research_harness::capabilities::Capabilities;
use research_harness::config::{Config, RetrievalConfig};
use research_harness::db;
use research_harness::migrate;
use research_harness::orchestrator::RetrievalOrchestrator;
use research_harness::sqlite_store::SqliteStore;
use research_harness_core::embedding::SampleEmbedder;
use research_harness_core::models::{
    Chunk, Document, GraphFact, Metadata, MetadataFilter, Mode, ResultKind, RetrievalRequest,
    Strategy,
};
use research_harness_core::store::{DocumentStore, GraphStore, VectorStore};

fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::minimal();
    config.mode = Mode::Production;
    config.db.path = tmp.path().join("data").join("rh.sqlite");
    config
}

fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, day, 12, 0, 0).unwrap()
}

fn metadata(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

fn document(id: &str, title: &str, created_day: u32, category: &str) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        source: format!("{}.pdf", id),
        metadata: metadata(json!({ "category": category })),
        created_at: ts(created_day),
        updated_at: ts(created_day),
        chunk_count: 0,
    }
}

fn chunk(doc_id: &str, index: i64, content: &str) -> Chunk {
    Chunk {
        id: format!("{}-c{}", doc_id, index),
        document_id: doc_id.to_string(),
        content: content.to_string(),
        chunk_index: index,
        metadata: Metadata::new(),
    }
}

/// Three documents (two created at the same instant), five chunks with
/// sample-embedder vectors, and three graph facts (one expired).
async fn seeded_store(tmp: &TempDir) -> SqliteStore {
    let config = test_config(tmp);
    migrate::run_migrations(&config).await.unwrap();
    let store = SqliteStore::new(db::connect(&config).await.unwrap());
    let embedder = SampleEmbedder::default();

    let corpus = vec![
        (
            document("doc-b", "Inflation Report", 10, "inflation"),
            vec![
                "core inflation remains elevated in services",
                "goods inflation is moderating",
            ],
        ),
        (
            document("doc-a", "Labor Market Notes", 10, "labor"),
            vec!["unemployment held at 3.9 percent"],
        ),
        (
            document("doc-c", "Rate Decision", 20, "monetary_policy"),
            vec![
                "the committee raised the federal funds rate",
                "credit conditions tightened for consumer loans",
            ],
        ),
    ];

    for (doc, texts) in corpus {
        store.upsert_document(&doc).await.unwrap();
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| chunk(&doc.id, i as i64, t))
            .collect();
        let vectors: Vec<Vec<f32>> = texts.iter().map(|t| embedder.embed_sync(t)).collect();
        store
            .replace_chunks(&doc.id, &chunks, Some(&vectors))
            .await
            .unwrap();
    }

    let facts = vec![
        GraphFact {
            id: "fact-1".to_string(),
            fact_text: "FOMC RAISED federal funds rate".to_string(),
            valid_at: ts(20),
            invalid_at: None,
            source_entity_id: "node-fomc".to_string(),
            confidence: 0.0,
        },
        GraphFact {
            id: "fact-2".to_string(),
            fact_text: "FOMC HELD federal funds rate".to_string(),
            valid_at: ts(1),
            invalid_at: Some(ts(20)),
            source_entity_id: "node-fomc".to_string(),
            confidence: 0.0,
        },
        GraphFact {
            id: "fact-3".to_string(),
            fact_text: "unemployment DECREASED_TO 3.9%".to_string(),
            valid_at: ts(5),
            invalid_at: None,
            source_entity_id: "node-labor".to_string(),
            confidence: 0.0,
        },
    ];
    for fact in &facts {
        store.upsert_fact(fact).await.unwrap();
    }

    store
}

// ─── Schema ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_init_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    migrate::run_migrations(&config).await.unwrap();
    migrate::run_migrations(&config).await.unwrap();
    assert!(config.db.path.exists());
}

// ─── Documents ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_order_and_pagination() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;

    let all = store.list_documents(50, 0, None).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|d| d.id.as_str()).collect();
    // doc-a and doc-b share created_at; id breaks the tie
    assert_eq!(ids, vec!["doc-a", "doc-b", "doc-c"]);

    let page1 = store.list_documents(2, 0, None).await.unwrap();
    let page2 = store.list_documents(2, 2, None).await.unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page2.len(), 1);
    assert_eq!(page2[0].id, "doc-c");

    let mut wanted = std::collections::BTreeMap::new();
    wanted.insert("category".to_string(), json!("inflation"));
    let filtered = store
        .list_documents(10, 0, Some(&MetadataFilter(wanted)))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, "doc-b");
}

#[tokio::test]
async fn test_get_document() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;

    let doc = store.get_document("doc-c").await.unwrap().unwrap();
    assert_eq!(doc.title, "Rate Decision");
    assert_eq!(doc.chunk_count, 2);
    assert_eq!(doc.created_at, ts(20));
    assert_eq!(doc.metadata["category"], json!("monetary_policy"));

    assert!(store.get_document("doc-missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_replace_chunks_replaces() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;

    store
        .replace_chunks("doc-c", &[chunk("doc-c", 0, "a single replacement")], None)
        .await
        .unwrap();
    let doc = store.get_document("doc-c").await.unwrap().unwrap();
    assert_eq!(doc.chunk_count, 1);

    let hits = store.keyword_search("federal funds", 10).await.unwrap();
    assert!(hits.iter().all(|h| h.document_id != "doc-c"));
}

// ─── Vector and keyword search ──────────────────────────────────────

#[tokio::test]
async fn test_similarity_search_ordering() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;
    let query = SampleEmbedder::default().embed_sync("goods inflation is moderating");

    let hits = store.similarity_search(&query, 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].chunk_id, "doc-b-c1");
    assert!((hits[0].score - 1.0).abs() < 1e-5);
    assert_eq!(hits[0].document_title, "Inflation Report");
    for w in hits.windows(2) {
        assert!(w[0].score >= w[1].score);
    }
}

#[tokio::test]
async fn test_keyword_search_uses_lexical_scores() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;

    let hits = store.keyword_search("services inflation", 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk_id, "doc-b-c0");
    assert!((hits[0].score - 1.0).abs() < 1e-12);
    assert_eq!(hits[1].chunk_id, "doc-b-c1");
    assert!((hits[1].score - 0.5).abs() < 1e-12);

    assert!(store.keyword_search("the of and", 10).await.unwrap().is_empty());
    assert!(store.keyword_search("\"*) OR (", 10).await.unwrap().is_empty());
}

// ─── Graph ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_graph_search_scores_relevance() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;

    let mut facts = store.search_facts("federal funds rate").await.unwrap();
    facts.sort_by(|a, b| a.id.cmp(&b.id));
    let ids: Vec<&str> = facts.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["fact-1", "fact-2"]);
    assert!((facts[0].confidence - 1.0).abs() < 1e-12);
    assert_eq!(facts[1].invalid_at, Some(ts(20)));
}

// ─── End to end ─────────────────────────────────────────────────────

fn production_engine(store: SqliteStore) -> RetrievalOrchestrator {
    let store = Arc::new(store);
    let caps = Capabilities::new(
        Mode::Production,
        Arc::new(SampleEmbedder::default()),
        store.clone(),
        store.clone(),
        store,
    );
    RetrievalOrchestrator::new(caps, RetrievalConfig::default())
}

#[tokio::test]
async fn test_production_comprehensive_search() {
    let tmp = TempDir::new().unwrap();
    let engine = production_engine(seeded_store(&tmp).await);

    let response = engine
        .search(RetrievalRequest::new("federal funds rate", Strategy::Comprehensive).with_limit(5))
        .await
        .unwrap();
    assert_eq!(response.mode, Mode::Production);
    assert!(!response.partial);
    assert!(response.results.len() <= 5);
    assert!(response
        .results
        .iter()
        .any(|r| r.result_kind == ResultKind::Graph && r.key() == "fact-1"));
    // expired fact excluded without timeline
    assert!(response.results.iter().all(|r| r.key() != "fact-2"));

    let with_timeline = engine
        .search(
            RetrievalRequest::new("federal funds rate", Strategy::Graph).with_timeline(true),
        )
        .await
        .unwrap();
    let keys: Vec<&str> = with_timeline.results.iter().map(|r| r.key()).collect();
    assert_eq!(keys, vec!["fact-1", "fact-2"]);
    assert!((with_timeline.results[1].score - 0.5).abs() < 1e-12);
}

#[tokio::test]
async fn test_production_hybrid_search() {
    let tmp = TempDir::new().unwrap();
    let engine = production_engine(seeded_store(&tmp).await);

    let response = engine
        .search(RetrievalRequest::new("core inflation services", Strategy::Hybrid).with_limit(3))
        .await
        .unwrap();
    assert!(!response.degraded);
    assert_eq!(response.results[0].key(), "doc-b-c0");
    assert_eq!(response.results[0].result_kind, ResultKind::Hybrid);

    let mut seen = std::collections::HashSet::new();
    for r in &response.results {
        assert!(seen.insert(r.key().to_string()), "duplicate {}", r.key());
    }
}
