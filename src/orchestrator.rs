//! Request lifecycle: validate, dispatch, await, fuse.
//!
//! Every search walks the same state machine:
//!
//! ```text
//! Idle → Validating → Dispatching → Awaiting → Fusing → Completed
//!   └──────────┴────────────┴───────────┴─────────┴──→ Errored
//! ```
//!
//! Validation happens before any capability is touched. Branches of one
//! request run concurrently under `tokio::join!`, each step bounded by the
//! request deadline; a step that misses the deadline is dropped and counts
//! as a failure of its branch. Dropping the `search` future cancels every
//! in-flight branch.
//!
//! # Failure policy
//!
//! | Strategy | Failure | Outcome |
//! |----------|---------|---------|
//! | vector | embedding | `EmbeddingUnavailable` |
//! | vector, keyword | vector store | `StoreUnavailable(vector)` |
//! | graph | graph store | `StoreUnavailable(graph)` |
//! | hybrid | embedding or vector store | lexical-only, `degraded` |
//! | hybrid | keyword lookup | in-process text scores, `degraded` |
//! | comprehensive | one branch | surviving results, `partial` |
//! | hybrid, comprehensive | every branch | `AllSourcesUnavailable` |

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use research_harness_core::embedding::check_dims;
use research_harness_core::error::{RetrievalError, StoreKind};
use research_harness_core::fusion;
use research_harness_core::graph::{fact_to_result, order_facts};
use research_harness_core::hybrid::score_candidates;
use research_harness_core::models::{
    validate_page, Document, MetadataFilter, Mode, RetrievalRequest, SearchResponse,
    SearchResult, SourceKind, Strategy, MAX_PAGE_LIMIT,
};

use crate::capabilities::Capabilities;
use crate::config::{Config, RetrievalConfig, MAX_TIMEOUT_MS};

/// Lifecycle state of a single search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Dispatching,
    Awaiting,
    Fusing,
    Completed,
    Errored,
}

impl Phase {
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Idle, Validating)
            | (Validating, Dispatching)
            | (Dispatching, Awaiting)
            | (Awaiting, Fusing)
            | (Fusing, Completed) => true,
            (Completed | Errored, _) => false,
            (_, Errored) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks and enforces the [`Phase`] of one request.
#[derive(Debug)]
pub struct PhaseMachine {
    phase: Phase,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self { phase: Phase::Idle }
    }
}

impl PhaseMachine {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn advance(&mut self, next: Phase) -> Result<(), RetrievalError> {
        if !self.phase.can_transition_to(next) {
            return Err(RetrievalError::Internal(format!(
                "illegal transition {} -> {}",
                self.phase, next
            )));
        }
        debug!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        Ok(())
    }
}

/// Why a single branch produced nothing.
#[derive(Debug)]
enum BranchError {
    Embedding(String),
    Store(StoreKind, String),
}

impl BranchError {
    fn source(&self) -> SourceKind {
        match self {
            BranchError::Embedding(_) => SourceKind::Embedding,
            BranchError::Store(StoreKind::Graph, _) => SourceKind::Graph,
            BranchError::Store(_, _) => SourceKind::Vector,
        }
    }

    fn into_error(self) -> RetrievalError {
        match self {
            BranchError::Embedding(reason) => RetrievalError::EmbeddingUnavailable(reason),
            BranchError::Store(store, reason) => RetrievalError::StoreUnavailable { store, reason },
        }
    }
}

impl fmt::Display for BranchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchError::Embedding(reason) => write!(f, "embedding: {}", reason),
            BranchError::Store(store, reason) => write!(f, "{} store: {}", store, reason),
        }
    }
}

/// Result lists awaiting fusion, plus how the request fared.
#[derive(Default)]
struct Gathered {
    lists: Vec<Vec<SearchResult>>,
    degraded: bool,
    partial: bool,
    failed: Vec<SourceKind>,
}

impl Gathered {
    fn complete(lists: Vec<Vec<SearchResult>>) -> Self {
        Self {
            lists,
            ..Self::default()
        }
    }
}

fn all_failed(errors: &[&BranchError]) -> RetrievalError {
    let mut failed: Vec<SourceKind> = errors.iter().map(|e| e.source()).collect();
    failed.sort();
    failed.dedup();
    RetrievalError::AllSourcesUnavailable { failed }
}

async fn within<T, F>(deadline: Instant, what: &str, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    timeout_at(deadline, fut)
        .await
        .map_err(|_| anyhow!("{} exceeded the request deadline", what))?
}

/// Reachability of one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Ok,
    Unavailable,
}

/// Overall health: `ok` when every capability answers, `error` when none do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub mode: Mode,
    /// Keyed by `embedding`, `vector`, `graph`, `documents`.
    pub components: BTreeMap<String, ComponentStatus>,
}

/// The root of the retrieval engine.
pub struct RetrievalOrchestrator {
    caps: Capabilities,
    settings: RetrievalConfig,
}

impl RetrievalOrchestrator {
    pub fn new(caps: Capabilities, settings: RetrievalConfig) -> Self {
        Self { caps, settings }
    }

    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let caps = Capabilities::from_config(config).await?;
        Ok(Self::new(caps, config.retrieval.clone()))
    }

    pub fn mode(&self) -> Mode {
        self.caps.mode
    }

    pub fn settings(&self) -> &RetrievalConfig {
        &self.settings
    }

    /// Request deadline from now. `timeout_ms` is clamped to
    /// [`MAX_TIMEOUT_MS`] so settings built without `Config::validate` stay
    /// representable.
    fn deadline(&self) -> Instant {
        let budget = Duration::from_millis(self.settings.timeout_ms.min(MAX_TIMEOUT_MS));
        Instant::now() + budget
    }

    /// Run one search request to completion.
    pub async fn search(&self, request: RetrievalRequest) -> Result<SearchResponse, RetrievalError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "search",
            %request_id,
            strategy = %request.strategy,
            mode = %self.caps.mode,
        );
        async move {
            let mut machine = PhaseMachine::default();
            let outcome = self.drive(&mut machine, &request).await;
            match &outcome {
                Ok(response) => info!(
                    results = response.results.len(),
                    degraded = response.degraded,
                    partial = response.partial,
                    "search completed"
                ),
                Err(e) => {
                    if machine.phase() != Phase::Errored {
                        machine.advance(Phase::Errored)?;
                    }
                    warn!(code = e.code(), error = %e, "search failed");
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        machine: &mut PhaseMachine,
        request: &RetrievalRequest,
    ) -> Result<SearchResponse, RetrievalError> {
        machine.advance(Phase::Validating)?;
        request.validate()?;

        machine.advance(Phase::Dispatching)?;
        let deadline = self.deadline();
        let now = Utc::now();
        let query = request.query_text.as_str();

        machine.advance(Phase::Awaiting)?;
        let gathered = match request.strategy {
            Strategy::Vector => {
                let results = self
                    .vector_branch(query, request.limit, deadline)
                    .await
                    .map_err(BranchError::into_error)?;
                Gathered::complete(vec![results])
            }
            Strategy::Keyword => {
                let results = self
                    .keyword_branch(query, request.limit, deadline)
                    .await
                    .map_err(BranchError::into_error)?;
                Gathered::complete(vec![results])
            }
            Strategy::Graph => {
                let results = self
                    .graph_branch(query, request.include_timeline, now, deadline)
                    .await
                    .map_err(BranchError::into_error)?;
                Gathered::complete(vec![results])
            }
            Strategy::Hybrid => {
                let text_weight = request
                    .text_weight
                    .unwrap_or(self.settings.default_text_weight);
                self.hybrid(query, request.limit, text_weight, deadline)
                    .await?
            }
            Strategy::Comprehensive => {
                self.comprehensive(query, request, now, deadline).await?
            }
        };

        machine.advance(Phase::Fusing)?;
        let results = fusion::fuse(gathered.lists, request.limit);

        machine.advance(Phase::Completed)?;
        Ok(SearchResponse {
            results,
            strategy: request.strategy,
            mode: self.caps.mode,
            degraded: gathered.degraded,
            partial: gathered.partial,
            failed_sources: gathered.failed,
        })
    }

    /// Embed `text`, retrying with exponential backoff inside the deadline.
    async fn embed(&self, text: &str, deadline: Instant) -> Result<Vec<f32>, BranchError> {
        let attempts = self.settings.embedding_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let factor = 1u64 << (attempt - 2).min(5);
                let delay =
                    Duration::from_millis(self.settings.retry_backoff_ms.saturating_mul(factor));
                match Instant::now().checked_add(delay) {
                    Some(wake) if wake < deadline => {}
                    _ => break,
                }
                tokio::time::sleep(delay).await;
            }

            let embedded = within(deadline, "embedding", self.caps.embedder.embed(text))
                .await
                .and_then(|v| {
                    check_dims(&v, self.caps.embedder.dims())?;
                    Ok(v)
                });
            match embedded {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "embedding attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(BranchError::Embedding(
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "request deadline exceeded".to_string()),
        ))
    }

    async fn vector_branch(
        &self,
        query: &str,
        limit: usize,
        deadline: Instant,
    ) -> Result<Vec<SearchResult>, BranchError> {
        let query_vec = self.embed(query, deadline).await?;
        let hits = within(
            deadline,
            "vector search",
            self.caps.vectors.similarity_search(&query_vec, limit),
        )
        .await
        .map_err(|e| BranchError::Store(StoreKind::Vector, e.to_string()))?;
        Ok(hits.into_iter().map(SearchResult::from_vector_hit).collect())
    }

    async fn keyword_branch(
        &self,
        query: &str,
        limit: usize,
        deadline: Instant,
    ) -> Result<Vec<SearchResult>, BranchError> {
        let hits = within(
            deadline,
            "keyword search",
            self.caps.vectors.keyword_search(query, limit),
        )
        .await
        .map_err(|e| BranchError::Store(StoreKind::Vector, e.to_string()))?;
        Ok(score_candidates(query, &[], &hits, 1.0))
    }

    async fn graph_branch(
        &self,
        query: &str,
        include_timeline: bool,
        now: DateTime<Utc>,
        deadline: Instant,
    ) -> Result<Vec<SearchResult>, BranchError> {
        let facts = within(deadline, "graph search", self.caps.graph.search_facts(query))
            .await
            .map_err(|e| BranchError::Store(StoreKind::Graph, e.to_string()))?;
        Ok(order_facts(facts, include_timeline, now)
            .into_iter()
            .map(|f| fact_to_result(f, now))
            .collect())
    }

    async fn hybrid(
        &self,
        query: &str,
        limit: usize,
        text_weight: f64,
        deadline: Instant,
    ) -> Result<Gathered, RetrievalError> {
        let candidate_k = limit.max(self.settings.candidate_k).min(MAX_PAGE_LIMIT);

        let vector_half = async {
            let query_vec = self.embed(query, deadline).await?;
            let hits = within(
                deadline,
                "vector search",
                self.caps.vectors.similarity_search(&query_vec, candidate_k),
            )
            .await
            .map_err(|e| BranchError::Store(StoreKind::Vector, e.to_string()))?;
            Ok::<_, BranchError>(hits)
        };
        let keyword_half = within(
            deadline,
            "keyword search",
            self.caps.vectors.keyword_search(query, candidate_k),
        );

        let (vector_hits, keyword_hits) = tokio::join!(vector_half, keyword_half);

        match (vector_hits, keyword_hits) {
            (Ok(vector_hits), Ok(keyword_hits)) => Ok(Gathered::complete(vec![score_candidates(
                query,
                &vector_hits,
                &keyword_hits,
                text_weight,
            )])),
            (Err(e), Ok(keyword_hits)) => {
                warn!(error = %e, "hybrid search degraded to lexical-only");
                Ok(Gathered {
                    lists: vec![score_candidates(query, &[], &keyword_hits, 1.0)],
                    degraded: true,
                    partial: false,
                    failed: vec![e.source()],
                })
            }
            (Ok(vector_hits), Err(e)) => {
                warn!(error = %e, "keyword lookup failed; scoring text in-process");
                Ok(Gathered {
                    lists: vec![score_candidates(query, &vector_hits, &[], text_weight)],
                    degraded: true,
                    partial: false,
                    failed: vec![SourceKind::Vector],
                })
            }
            (Err(vector_err), Err(keyword_err)) => {
                let keyword_err = BranchError::Store(StoreKind::Vector, keyword_err.to_string());
                Err(all_failed(&[&vector_err, &keyword_err]))
            }
        }
    }

    async fn comprehensive(
        &self,
        query: &str,
        request: &RetrievalRequest,
        now: DateTime<Utc>,
        deadline: Instant,
    ) -> Result<Gathered, RetrievalError> {
        let (vector, graph) = tokio::join!(
            self.vector_branch(query, request.limit, deadline),
            self.graph_branch(query, request.include_timeline, now, deadline),
        );

        match (vector, graph) {
            (Ok(vector), Ok(graph)) => Ok(Gathered::complete(vec![vector, graph])),
            (Ok(results), Err(e)) | (Err(e), Ok(results)) => {
                warn!(error = %e, "comprehensive search returning partial results");
                Ok(Gathered {
                    lists: vec![results],
                    degraded: false,
                    partial: true,
                    failed: vec![e.source()],
                })
            }
            (Err(vector_err), Err(graph_err)) => Err(all_failed(&[&vector_err, &graph_err])),
        }
    }

    /// Check every capability with one cheap call each, concurrently and
    /// under the request deadline. Never fails; unreachable capabilities
    /// are reported as `unavailable`.
    pub async fn health(&self) -> HealthReport {
        const HEALTH_QUERY: &str = "health check";
        let deadline = self.deadline();

        let embedding = within(deadline, "embedding", async {
            let v = self.caps.embedder.embed(HEALTH_QUERY).await?;
            check_dims(&v, self.caps.embedder.dims())
        });
        let vector = within(deadline, "vector search", async {
            let zero = vec![0.0f32; self.caps.embedder.dims().max(1)];
            self.caps.vectors.similarity_search(&zero, 1).await?;
            self.caps.vectors.keyword_search(HEALTH_QUERY, 1).await?;
            Ok::<_, anyhow::Error>(())
        });
        let graph = within(deadline, "graph search", async {
            self.caps.graph.search_facts(HEALTH_QUERY).await.map(|_| ())
        });
        let documents = within(deadline, "document listing", async {
            self.caps.documents.list_documents(1, 0, None).await.map(|_| ())
        });

        let (embedding, vector, graph, documents) =
            tokio::join!(embedding, vector, graph, documents);

        let mut components = BTreeMap::new();
        for (name, outcome) in [
            ("embedding", embedding),
            ("vector", vector),
            ("graph", graph),
            ("documents", documents),
        ] {
            let status = match outcome {
                Ok(()) => ComponentStatus::Ok,
                Err(e) => {
                    warn!(component = name, error = %e, "health check failed");
                    ComponentStatus::Unavailable
                }
            };
            components.insert(name.to_string(), status);
        }

        let up = components
            .values()
            .filter(|s| **s == ComponentStatus::Ok)
            .count();
        let status = if up == components.len() {
            HealthStatus::Ok
        } else if up == 0 {
            HealthStatus::Error
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            mode: self.caps.mode,
            components,
        }
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>, RetrievalError> {
        if id.trim().is_empty() {
            return Err(RetrievalError::Validation(
                "document id must not be empty".to_string(),
            ));
        }
        let deadline = self.deadline();
        within(deadline, "document lookup", self.caps.documents.get_document(id))
            .await
            .map_err(|e| RetrievalError::store(StoreKind::Document, &e))
    }

    pub async fn list_documents(
        &self,
        limit: usize,
        offset: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>, RetrievalError> {
        validate_page(limit)?;
        let deadline = self.deadline();
        within(
            deadline,
            "document listing",
            self.caps.documents.list_documents(limit, offset, filter),
        )
        .await
        .map_err(|e| RetrievalError::store(StoreKind::Document, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut m = PhaseMachine::default();
        for next in [
            Phase::Validating,
            Phase::Dispatching,
            Phase::Awaiting,
            Phase::Fusing,
            Phase::Completed,
        ] {
            m.advance(next).unwrap();
        }
        assert_eq!(m.phase(), Phase::Completed);
    }

    #[test]
    fn test_errored_reachable_from_any_active_phase() {
        for phase in [
            Phase::Idle,
            Phase::Validating,
            Phase::Dispatching,
            Phase::Awaiting,
            Phase::Fusing,
        ] {
            assert!(phase.can_transition_to(Phase::Errored), "{}", phase);
        }
        assert!(!Phase::Completed.can_transition_to(Phase::Errored));
        assert!(!Phase::Errored.can_transition_to(Phase::Errored));
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut m = PhaseMachine::default();
        let err = m.advance(Phase::Fusing).unwrap_err();
        assert_eq!(err.code(), "internal");
        assert_eq!(m.phase(), Phase::Idle);

        assert!(!Phase::Awaiting.can_transition_to(Phase::Dispatching));
        assert!(!Phase::Completed.can_transition_to(Phase::Idle));
        assert!(!Phase::Validating.can_transition_to(Phase::Completed));
    }

    #[test]
    fn test_all_failed_sorts_and_dedups() {
        let a = BranchError::Embedding("down".into());
        let b = BranchError::Store(StoreKind::Vector, "down".into());
        let c = BranchError::Store(StoreKind::Vector, "also down".into());
        match all_failed(&[&a, &b, &c]) {
            RetrievalError::AllSourcesUnavailable { failed } => {
                assert_eq!(failed, vec![SourceKind::Vector, SourceKind::Embedding]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
