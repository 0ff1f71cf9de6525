//! Error taxonomy surfaced by the retrieval engine.
//!
//! Store adapters report failures as plain `anyhow::Error`s; the
//! orchestrator classifies them by the branch that failed and converts them
//! into a [`RetrievalError`]. A document lookup miss is not an error and is
//! reported as `Ok(None)`.

use std::fmt;

use crate::models::SourceKind;

/// Which backing store a [`RetrievalError::StoreUnavailable`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Vector,
    Graph,
    Document,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreKind::Vector => "vector",
            StoreKind::Graph => "graph",
            StoreKind::Document => "document",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Malformed request, rejected before any store is contacted.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{store} store unavailable: {reason}")]
    StoreUnavailable { store: StoreKind, reason: String },

    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Every dispatched branch failed.
    #[error("all sources unavailable: {}", join_sources(.failed))]
    AllSourcesUnavailable { failed: Vec<SourceKind> },

    /// A broken engine invariant, such as an illegal request-state transition.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RetrievalError {
    /// Machine-readable classification used by the HTTP error contract.
    pub fn code(&self) -> &'static str {
        match self {
            RetrievalError::Validation(_) => "bad_request",
            RetrievalError::StoreUnavailable { .. } => "store_unavailable",
            RetrievalError::EmbeddingUnavailable(_) => "embedding_unavailable",
            RetrievalError::AllSourcesUnavailable { .. } => "all_sources_unavailable",
            RetrievalError::Internal(_) => "internal",
        }
    }

    /// Caller-facing message: the classification only. Adapter reasons
    /// (driver errors, upstream response bodies) stay in `Display` for logs.
    pub fn public_message(&self) -> String {
        match self {
            RetrievalError::Validation(_) | RetrievalError::AllSourcesUnavailable { .. } => {
                self.to_string()
            }
            RetrievalError::StoreUnavailable { store, .. } => format!("{} store unavailable", store),
            RetrievalError::EmbeddingUnavailable(_) => "embedding service unavailable".to_string(),
            RetrievalError::Internal(_) => "internal error".to_string(),
        }
    }

    pub fn store(store: StoreKind, err: &anyhow::Error) -> Self {
        RetrievalError::StoreUnavailable {
            store,
            reason: err.to_string(),
        }
    }
}

fn join_sources(failed: &[SourceKind]) -> String {
    failed
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_sources_message() {
        let err = RetrievalError::AllSourcesUnavailable {
            failed: vec![SourceKind::Vector, SourceKind::Graph],
        };
        assert_eq!(err.to_string(), "all sources unavailable: vector, graph");
        assert_eq!(err.code(), "all_sources_unavailable");
    }

    #[test]
    fn test_store_message() {
        let err = RetrievalError::store(StoreKind::Graph, &anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "graph store unavailable: connection refused");
    }

    #[test]
    fn test_public_message_omits_adapter_reason() {
        let store = RetrievalError::store(
            StoreKind::Graph,
            &anyhow::anyhow!("error returned from database: no such table: graph_facts"),
        );
        assert_eq!(store.public_message(), "graph store unavailable");

        let embedding = RetrievalError::EmbeddingUnavailable(
            "OpenAI API error (401): {\"error\": \"invalid api key\"}".to_string(),
        );
        assert_eq!(embedding.public_message(), "embedding service unavailable");

        let internal = RetrievalError::Internal("illegal transition Idle -> Fusing".to_string());
        assert_eq!(internal.public_message(), "internal error");

        let invalid = RetrievalError::Validation("limit must be in [1, 20]".to_string());
        assert_eq!(invalid.public_message(), invalid.to_string());
    }
}
