//! `rh get` and `rh list`: document lookup and listing.

use anyhow::{bail, Result};

use research_harness_core::models::{Document, MetadataFilter};

use crate::config::Config;
use crate::orchestrator::RetrievalOrchestrator;

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let engine = RetrievalOrchestrator::from_config(config).await?;
    let doc = match engine.get_document(id).await? {
        Some(doc) => doc,
        None => bail!("document not found: {}", id),
    };

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("title:        {}", doc.title);
    println!("source:       {}", doc.source);
    println!("created_at:   {}", doc.created_at.to_rfc3339());
    println!("updated_at:   {}", doc.updated_at.to_rfc3339());
    println!("chunk_count:  {}", doc.chunk_count);
    println!(
        "metadata:     {}",
        serde_json::Value::Object(doc.metadata.clone())
    );

    Ok(())
}

pub async fn run_list(
    config: &Config,
    limit: usize,
    offset: usize,
    filters: Vec<(String, String)>,
) -> Result<()> {
    let engine = RetrievalOrchestrator::from_config(config).await?;
    let filter = build_filter(filters);
    let docs = engine
        .list_documents(limit, offset, (!filter.is_empty()).then_some(&filter))
        .await?;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for (i, doc) in docs.iter().enumerate() {
        print_row(offset + i + 1, doc);
    }
    Ok(())
}

/// Values that parse as JSON (numbers, booleans, quoted strings) compare as
/// JSON; anything else compares as a bare string.
pub fn build_filter(pairs: Vec<(String, String)>) -> MetadataFilter {
    MetadataFilter(
        pairs
            .into_iter()
            .map(|(key, raw)| {
                let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));
                (key, value)
            })
            .collect(),
    )
}

fn print_row(n: usize, doc: &Document) {
    println!(
        "{}. {}  {}  ({} chunks, created {})",
        n,
        doc.id,
        doc.title,
        doc.chunk_count,
        doc.created_at.format("%Y-%m-%d")
    );
}
