//! `rh search`: run one request and print the ranked results.

use anyhow::Result;

use research_harness_core::models::{RetrievalRequest, SearchResponse, SearchResult, Strategy};

use crate::config::Config;
use crate::orchestrator::RetrievalOrchestrator;

pub struct SearchArgs {
    pub query: String,
    pub strategy: String,
    pub limit: Option<usize>,
    pub text_weight: Option<f64>,
    pub timeline: bool,
    pub json: bool,
}

pub async fn run_search(config: &Config, args: SearchArgs) -> Result<()> {
    let strategy: Strategy = args.strategy.parse()?;
    let engine = RetrievalOrchestrator::from_config(config).await?;

    let mut request = RetrievalRequest::new(args.query, strategy)
        .with_limit(args.limit.unwrap_or(config.retrieval.default_limit))
        .with_timeline(args.timeline);
    request.text_weight = args.text_weight;

    let response = engine.search(request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &SearchResponse) {
    println!(
        "strategy: {}  mode: {}{}{}",
        response.strategy,
        response.mode,
        if response.degraded { "  [degraded]" } else { "" },
        if response.partial { "  [partial]" } else { "" },
    );
    if !response.failed_sources.is_empty() {
        let failed: Vec<&str> = response.failed_sources.iter().map(|s| s.as_str()).collect();
        println!("failed sources: {}", failed.join(", "));
    }
    println!();

    if response.results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, result) in response.results.iter().enumerate() {
        print_result(i + 1, result);
    }
}

fn print_result(rank: usize, result: &SearchResult) {
    println!(
        "{}. [{:.3}] ({}) {}",
        rank,
        result.score,
        result.result_kind,
        result
            .document_title
            .as_deref()
            .or(result.document_source.as_deref())
            .unwrap_or("(untitled)")
    );
    for (name, value) in &result.component_scores {
        println!("    {}: {:.3}", name, value);
    }
    if let Some(valid_at) = result.valid_at {
        let until = result
            .invalid_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "present".to_string());
        println!("    valid: {} .. {}", valid_at.format("%Y-%m-%d"), until);
    }
    println!(
        "    excerpt: \"{}\"",
        truncate(&result.content.replace('\n', " "), 240).trim()
    );
    println!("    id: {}", result.key());
    println!();
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}
