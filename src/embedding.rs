//! Embedding provider implementations.
//!
//! The [`EmbeddingProvider`] trait lives in `research-harness-core`. This
//! module supplies the concrete backends:
//! - **[`DisabledProvider`]**: always fails; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API.
//! - **`SampleEmbedder`** (core): deterministic hashing embedder for mock mode.
//!
//! # Provider Selection
//!
//! ```rust
//! # use research_harness::config::EmbeddingConfig;
//! # use research_harness::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```
//!
//! # Failure model
//!
//! Every provider makes exactly one attempt per call. Unreachable services,
//! non-success HTTP statuses, and malformed payloads (including a vector of
//! the wrong dimensionality) are all errors. Retry with backoff is owned by
//! the orchestrator so that it stays inside the request deadline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use research_harness_core::embedding::{check_dims, EmbeddingProvider, SampleEmbedder};

use crate::config::EmbeddingConfig;

// ============ Disabled Provider ============

/// A provider that always returns errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API (`POST {api_base}/embeddings`).
///
/// The API key is read from `OPENAI_API_KEY` once, at construction.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config,
    /// or if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            url: format!("{}/embeddings", config.api_base.trim_end_matches('/')),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let vector = parse_openai_response(&json)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))?;
        check_dims(&vector, self.dims)?;
        Ok(vector)
    }
}

/// Extract the `data[].embedding` arrays from an embeddings API response.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    data.iter()
        .map(|item| {
            let values = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
            values
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| anyhow!("Invalid OpenAI response: non-numeric component"))
                })
                .collect()
        })
        .collect()
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"sample"` | `SampleEmbedder` (`dims` defaults to 64) |
/// | `"openai"` | [`OpenAIProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "sample" => Ok(Arc::new(SampleEmbedder::new(
            config.dims.unwrap_or(SampleEmbedder::DEFAULT_DIMS),
        ))),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({
            "data": [{ "index": 0, "embedding": [0.5, -0.25, 1.0] }]
        });
        let parsed = parse_openai_response(&json).unwrap();
        assert_eq!(parsed, vec![vec![0.5f32, -0.25, 1.0]]);
    }

    #[test]
    fn test_parse_openai_response_malformed() {
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
        let json = serde_json::json!({ "data": [{ "embedding": [0.1, "x"] }] });
        assert!(parse_openai_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_disabled_provider_fails() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        assert!(provider.embed("rates").await.is_err());
    }

    #[tokio::test]
    async fn test_sample_provider_dims() {
        let config = EmbeddingConfig {
            provider: "sample".to_string(),
            dims: Some(16),
            ..EmbeddingConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.dims(), 16);
        assert_eq!(provider.embed("rates").await.unwrap().len(), 16);
    }
}
