//! The capability bundle the orchestrator runs against.
//!
//! Mock and production differ only in which implementations fill the
//! bundle. The choice is made once, from `Config::mode`, when the bundle is
//! built; the orchestrator never inspects the concrete types.

use std::sync::Arc;

use anyhow::Result;

use research_harness_core::embedding::{EmbeddingProvider, SampleEmbedder};
use research_harness_core::models::Mode;
use research_harness_core::store::sample::SampleStore;
use research_harness_core::store::{DocumentStore, GraphStore, VectorStore};

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
pub struct Capabilities {
    pub mode: Mode,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub vectors: Arc<dyn VectorStore>,
    pub graph: Arc<dyn GraphStore>,
    pub documents: Arc<dyn DocumentStore>,
}

impl Capabilities {
    pub fn new(
        mode: Mode,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            mode,
            embedder,
            vectors,
            graph,
            documents,
        }
    }

    /// Deterministic sample corpus with the hashing embedder.
    pub fn sample() -> Self {
        let store = Arc::new(SampleStore::new());
        Self::new(
            Mode::Mock,
            Arc::new(SampleEmbedder::default()),
            store.clone(),
            store.clone(),
            store,
        )
    }

    /// SQLite stores plus the configured embedding provider.
    pub async fn production(config: &Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let pool = db::connect(config).await?;
        let store = Arc::new(SqliteStore::new(pool));
        Ok(Self::new(
            Mode::Production,
            embedder,
            store.clone(),
            store.clone(),
            store,
        ))
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        match config.mode {
            Mode::Mock => Ok(Self::sample()),
            Mode::Production => Self::production(config).await,
        }
    }
}
