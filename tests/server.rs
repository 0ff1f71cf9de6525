//! HTTP surface tests: the router is served on an ephemeral port against the
//! sample corpus and exercised with a real client.

use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use research_harness::capabilities::Capabilities;
use research_harness::config::RetrievalConfig;
use research_harness::db;
use research_harness::orchestrator::RetrievalOrchestrator;
use research_harness::server::router;
use research_harness::sqlite_store::SqliteStore;
use research_harness_core::embedding::SampleEmbedder;
use research_harness_core::models::Mode;

async fn spawn_server() -> String {
    serve(RetrievalOrchestrator::new(
        Capabilities::sample(),
        RetrievalConfig::default(),
    ))
    .await
}

/// Production engine over a database file that was never initialised, so
/// every store query fails with a driver error.
async fn spawn_broken_production(tmp: &TempDir) -> String {
    let pool = db::connect_path(&tmp.path().join("empty.sqlite"))
        .await
        .unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let caps = Capabilities::new(
        Mode::Production,
        Arc::new(SampleEmbedder::default()),
        store.clone(),
        store.clone(),
        store,
    );
    serve(RetrievalOrchestrator::new(caps, RetrievalConfig::default())).await
}

async fn serve(engine: RetrievalOrchestrator) -> String {
    let engine = Arc::new(engine);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(engine)).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_reports_mode() {
    let base = spawn_server().await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mode"], "mock");
    for component in ["embedding", "vector", "graph", "documents"] {
        assert_eq!(body["components"][component], "ok", "{}", component);
    }
}

#[tokio::test]
async fn test_health_reports_unavailable_stores() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_broken_production(&tmp).await;

    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["mode"], "production");
    assert_eq!(body["components"]["embedding"], "ok");
    assert_eq!(body["components"]["vector"], "unavailable");
    assert_eq!(body["components"]["graph"], "unavailable");
    assert_eq!(body["components"]["documents"], "unavailable");
}

#[tokio::test]
async fn test_store_failure_message_has_no_backend_detail() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_broken_production(&tmp).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/tools/search", base))
        .json(&json!({ "query": "rates", "strategy": "graph" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "store_unavailable");
    assert_eq!(body["error"]["message"], "graph store unavailable");

    let resp = client
        .post(format!("{}/tools/list_documents", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    let message = body["error"]["message"].as_str().unwrap();
    assert_eq!(message, "document store unavailable");
    assert!(!message.contains("no such table"));
}

#[tokio::test]
async fn test_search_hybrid_default() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/tools/search", base))
        .json(&json!({ "query": "machine learning", "limit": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["strategy"], "hybrid");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!((results[0]["score"].as_f64().unwrap() - 0.905).abs() < 1e-9);
    assert_eq!(results[0]["result_kind"], "hybrid");
}

#[tokio::test]
async fn test_search_validation_errors() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    for payload in [
        json!({ "query": "rates", "limit": 0 }),
        json!({ "query": "rates", "limit": 21 }),
        json!({ "query": "rates", "text_weight": 1.5 }),
        json!({ "query": "rates", "strategy": "fuzzy" }),
        json!({ "query": "   " }),
        json!({ "limit": 3 }),
    ] {
        let resp = client
            .post(format!("{}/tools/search", base))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "payload {}", payload);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["error"]["message"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_get_document() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/tools/get", base))
        .json(&json!({ "id": "doc-fed-q4-2024" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let doc: Value = resp.json().await.unwrap();
    assert_eq!(doc["chunk_count"], 18);

    let resp = client
        .post(format!("{}/tools/get", base))
        .json(&json!({ "id": "doc-missing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_list_documents() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/tools/list_documents", base))
        .json(&json!({ "limit": 1, "offset": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let docs = body["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["id"], "doc-fed-q4-2024");
    assert_eq!(body["offset"], 1);

    let resp = client
        .post(format!("{}/tools/list_documents", base))
        .json(&json!({ "limit": 51 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
