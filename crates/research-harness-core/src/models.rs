//! Core data models used throughout Research Harness.
//!
//! These types represent the documents, chunks, graph facts, and search
//! results that flow through the retrieval pipeline, plus the request and
//! response value objects exchanged with callers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// Hybrid text weight applied when a request does not specify one.
pub const DEFAULT_TEXT_WEIGHT: f64 = 0.3;
/// Result limit applied when a request does not specify one.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
/// Upper bound for `RetrievalRequest::limit`.
pub const MAX_SEARCH_LIMIT: usize = 20;
/// Upper bound for a single store call and for document listing pages.
pub const MAX_PAGE_LIMIT: usize = 50;

/// Open string -> value mapping carried by documents and chunks.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A source artifact owned by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Origin filename or URI.
    pub source: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub chunk_count: i64,
}

/// A retrievable span of text belonging to exactly one [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub chunk_index: i64,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A chunk candidate returned by a [`VectorStore`](crate::store::VectorStore).
///
/// Carries the parent document's title and source so results can be
/// attributed without another store round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHit {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub document_title: String,
    pub document_source: String,
    /// Cosine similarity for vector lookups, lexical relevance for keyword lookups.
    pub score: f64,
}

/// A temporal relationship assertion from the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphFact {
    pub id: String,
    pub fact_text: String,
    pub valid_at: DateTime<Utc>,
    /// `None` means the fact is still valid.
    pub invalid_at: Option<DateTime<Utc>>,
    pub source_entity_id: String,
    /// Relevance of the fact to the query, in `[0.0, 1.0]`.
    #[serde(default)]
    pub confidence: f64,
}

impl GraphFact {
    /// True when the fact has not been invalidated as of `now`.
    pub fn is_current_at(&self, now: DateTime<Utc>) -> bool {
        match self.invalid_at {
            Some(invalid_at) => invalid_at > now,
            None => true,
        }
    }

    /// True when `invalid_at`, if set, is strictly after `valid_at`.
    pub fn has_valid_interval(&self) -> bool {
        self.invalid_at.map_or(true, |t| t > self.valid_at)
    }
}

/// Which retrieval modality produced a [`SearchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Hybrid,
    Vector,
    Graph,
}

impl ResultKind {
    /// Tie-break priority during fusion; lower ranks first.
    pub fn priority(self) -> u8 {
        match self {
            ResultKind::Hybrid => 0,
            ResultKind::Vector => 1,
            ResultKind::Graph => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultKind::Hybrid => "hybrid",
            ResultKind::Vector => "vector",
            ResultKind::Graph => "graph",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked, source-attributed entry of a search response.
///
/// Chunk-backed results carry `chunk_id`; graph results carry `fact_id` and
/// the temporal fields instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub content: String,
    pub score: f64,
    #[serde(default)]
    pub component_scores: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_source: Option<String>,
    pub result_kind: ResultKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<String>,
}

impl SearchResult {
    /// Build a pure vector-similarity result from a store hit.
    pub fn from_vector_hit(hit: ChunkHit) -> Self {
        Self {
            chunk_id: Some(hit.chunk_id),
            fact_id: None,
            document_id: Some(hit.document_id),
            content: hit.content,
            score: hit.score,
            component_scores: BTreeMap::new(),
            relationship_confidence: None,
            document_title: Some(hit.document_title),
            document_source: Some(hit.document_source),
            result_kind: ResultKind::Vector,
            valid_at: None,
            invalid_at: None,
            source_entity_id: None,
        }
    }

    /// The identifier this result is ranked and deduplicated under.
    pub fn key(&self) -> &str {
        self.chunk_id
            .as_deref()
            .or(self.fact_id.as_deref())
            .unwrap_or_default()
    }
}

/// Retrieval strategy requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Pure semantic similarity.
    Vector,
    /// Weighted semantic + lexical.
    Hybrid,
    /// Knowledge-graph facts only.
    Graph,
    /// Vector and graph concurrently, fused.
    Comprehensive,
    /// Lexical relevance only; needs no embedding.
    Keyword,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Vector,
        Strategy::Hybrid,
        Strategy::Graph,
        Strategy::Comprehensive,
        Strategy::Keyword,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Vector => "vector",
            Strategy::Hybrid => "hybrid",
            Strategy::Graph => "graph",
            Strategy::Comprehensive => "comprehensive",
            Strategy::Keyword => "keyword",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Strategy::ALL
            .into_iter()
            .find(|st| st.as_str() == wanted)
            .ok_or_else(|| {
                RetrievalError::Validation(format!(
                    "unknown strategy: '{}'. Use vector, hybrid, graph, comprehensive, or keyword.",
                    s
                ))
            })
    }
}

/// Whether the engine runs against production stores or sample data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Mock,
    Production,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Mock => "mock",
            Mode::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrieval capability that failed while serving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Graph,
    Embedding,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Vector => "vector",
            SourceKind::Graph => "graph",
            SourceKind::Embedding => "embedding",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single search invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query_text: String,
    pub strategy: Strategy,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Only consulted by the hybrid strategy. Defaults to [`DEFAULT_TEXT_WEIGHT`].
    #[serde(default)]
    pub text_weight: Option<f64>,
    /// Only consulted by strategies that touch the graph.
    #[serde(default)]
    pub include_timeline: bool,
}

fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

impl RetrievalRequest {
    pub fn new(query_text: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            query_text: query_text.into(),
            strategy,
            limit: DEFAULT_SEARCH_LIMIT,
            text_weight: None,
            include_timeline: false,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_text_weight(mut self, text_weight: f64) -> Self {
        self.text_weight = Some(text_weight);
        self
    }

    pub fn with_timeline(mut self, include_timeline: bool) -> Self {
        self.include_timeline = include_timeline;
        self
    }

    /// Reject malformed requests. Performs no I/O.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.query_text.trim().is_empty() {
            return Err(RetrievalError::Validation(
                "query must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_SEARCH_LIMIT).contains(&self.limit) {
            return Err(RetrievalError::Validation(format!(
                "limit must be in [1, {}], got {}",
                MAX_SEARCH_LIMIT, self.limit
            )));
        }
        if let Some(w) = self.text_weight {
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(RetrievalError::Validation(format!(
                    "text_weight must be in [0.0, 1.0], got {}",
                    w
                )));
            }
        }
        Ok(())
    }
}

/// Validate `list_documents` paging arguments.
pub fn validate_page(limit: usize) -> Result<(), RetrievalError> {
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(RetrievalError::Validation(format!(
            "limit must be in [1, {}], got {}",
            MAX_PAGE_LIMIT, limit
        )));
    }
    Ok(())
}

/// Exact-match conjunction over top-level document metadata keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter(pub BTreeMap<String, serde_json::Value>);

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0
            .iter()
            .all(|(key, wanted)| metadata.get(key) == Some(wanted))
    }
}

/// The payload returned by a successful search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub strategy: Strategy,
    pub mode: Mode,
    pub degraded: bool,
    pub partial: bool,
    pub failed_sources: Vec<SourceKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_strategy_parse_case_insensitive() {
        assert_eq!("Hybrid".parse::<Strategy>().unwrap(), Strategy::Hybrid);
        assert_eq!(
            " comprehensive ".parse::<Strategy>().unwrap(),
            Strategy::Comprehensive
        );
    }

    #[test]
    fn test_strategy_parse_unknown_is_validation() {
        let err = "semantic".parse::<Strategy>().unwrap_err();
        assert!(matches!(err, RetrievalError::Validation(_)));
    }

    #[test]
    fn test_validate_limits() {
        let req = RetrievalRequest::new("rates", Strategy::Vector);
        assert!(req.clone().with_limit(1).validate().is_ok());
        assert!(req.clone().with_limit(20).validate().is_ok());
        assert!(req.clone().with_limit(0).validate().is_err());
        assert!(req.with_limit(21).validate().is_err());
    }

    #[test]
    fn test_validate_text_weight() {
        let req = RetrievalRequest::new("rates", Strategy::Hybrid);
        assert!(req.clone().with_text_weight(0.0).validate().is_ok());
        assert!(req.clone().with_text_weight(1.0).validate().is_ok());
        assert!(req.clone().with_text_weight(-0.01).validate().is_err());
        assert!(req.clone().with_text_weight(1.5).validate().is_err());
        assert!(req.with_text_weight(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_validate_empty_query() {
        let req = RetrievalRequest::new("   ", Strategy::Graph);
        assert!(matches!(
            req.validate(),
            Err(RetrievalError::Validation(_))
        ));
    }

    #[test]
    fn test_fact_currency() {
        let valid_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut fact = GraphFact {
            id: "f1".into(),
            fact_text: "A RELATES_TO B".into(),
            valid_at,
            invalid_at: None,
            source_entity_id: "node-a".into(),
            confidence: 0.5,
        };
        assert!(fact.is_current_at(now));
        fact.invalid_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert!(!fact.is_current_at(now));
        assert!(fact.has_valid_interval());
        fact.invalid_at = Some(valid_at);
        assert!(!fact.has_valid_interval());
    }

    #[test]
    fn test_metadata_filter() {
        let mut metadata = Metadata::new();
        metadata.insert("category".into(), serde_json::json!("monetary_policy"));
        metadata.insert("pages".into(), serde_json::json!(25));

        let mut wanted = BTreeMap::new();
        wanted.insert("category".to_string(), serde_json::json!("monetary_policy"));
        assert!(MetadataFilter(wanted.clone()).matches(&metadata));

        wanted.insert("pages".to_string(), serde_json::json!(47));
        assert!(!MetadataFilter(wanted).matches(&metadata));
        assert!(MetadataFilter::default().matches(&metadata));
    }
}
