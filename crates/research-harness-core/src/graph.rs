//! Temporal policy for knowledge-graph facts.
//!
//! Facts still valid at `now` come first, most recently valid first. Expired
//! facts are dropped unless the caller asks for the timeline, in which case
//! they follow the current facts in the same `valid_at` descending order.
//! Facts whose `invalid_at` does not come after `valid_at` are malformed and
//! always dropped.

use chrono::{DateTime, Utc};

use crate::models::{GraphFact, ResultKind, SearchResult};

/// Score multiplier applied to expired facts returned through the timeline.
pub const HISTORICAL_DISCOUNT: f64 = 0.5;

/// Apply the temporal ordering and filtering policy.
pub fn order_facts(
    facts: Vec<GraphFact>,
    include_timeline: bool,
    now: DateTime<Utc>,
) -> Vec<GraphFact> {
    let (mut current, mut expired): (Vec<GraphFact>, Vec<GraphFact>) = facts
        .into_iter()
        .filter(|f| {
            let ok = f.has_valid_interval();
            if !ok {
                tracing::warn!(fact_id = %f.id, "dropping graph fact with invalid_at <= valid_at");
            }
            ok
        })
        .partition(|f| f.is_current_at(now));

    let by_recency = |a: &GraphFact, b: &GraphFact| {
        b.valid_at.cmp(&a.valid_at).then_with(|| a.id.cmp(&b.id))
    };
    current.sort_by(by_recency);
    if include_timeline {
        expired.sort_by(by_recency);
        current.extend(expired);
    }
    current
}

/// Convert an ordered fact into a graph search result.
pub fn fact_to_result(fact: GraphFact, now: DateTime<Utc>) -> SearchResult {
    let confidence = if fact.is_current_at(now) {
        fact.confidence
    } else {
        fact.confidence * HISTORICAL_DISCOUNT
    };
    SearchResult {
        chunk_id: None,
        fact_id: Some(fact.id),
        document_id: None,
        content: fact.fact_text,
        score: confidence,
        component_scores: Default::default(),
        relationship_confidence: Some(confidence),
        document_title: None,
        document_source: Some("knowledge_graph".to_string()),
        result_kind: ResultKind::Graph,
        valid_at: Some(fact.valid_at),
        invalid_at: fact.invalid_at,
        source_entity_id: Some(fact.source_entity_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn fact(id: &str, valid: u32, invalid: Option<u32>) -> GraphFact {
        GraphFact {
            id: id.to_string(),
            fact_text: format!("fact {}", id),
            valid_at: day(valid),
            invalid_at: invalid.map(day),
            source_entity_id: "node".to_string(),
            confidence: 0.8,
        }
    }

    fn ids(facts: &[GraphFact]) -> Vec<&str> {
        facts.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_current_facts_newest_first() {
        let facts = vec![fact("a", 1, None), fact("b", 5, None), fact("c", 3, None)];
        let ordered = order_facts(facts, false, day(20));
        assert_eq!(ids(&ordered), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_expired_excluded_without_timeline() {
        let facts = vec![fact("old", 2, Some(4)), fact("cur", 1, None)];
        let ordered = order_facts(facts, false, day(20));
        assert_eq!(ids(&ordered), vec!["cur"]);
    }

    #[test]
    fn test_timeline_appends_expired_after_current() {
        let facts = vec![
            fact("old1", 2, Some(4)),
            fact("cur", 1, None),
            fact("old2", 8, Some(9)),
            fact("future_expiry", 3, Some(28)),
        ];
        let ordered = order_facts(facts, true, day(20));
        assert_eq!(ids(&ordered), vec!["future_expiry", "cur", "old2", "old1"]);
    }

    #[test]
    fn test_malformed_interval_dropped() {
        let facts = vec![fact("bad", 5, Some(5)), fact("ok", 1, None)];
        let ordered = order_facts(facts, true, day(20));
        assert_eq!(ids(&ordered), vec!["ok"]);
    }

    #[test]
    fn test_fact_to_result_discounts_expired() {
        let now = day(20);
        let current = fact_to_result(fact("cur", 1, None), now);
        let expired = fact_to_result(fact("old", 1, Some(2)), now);
        assert_eq!(current.result_kind, ResultKind::Graph);
        assert_eq!(current.relationship_confidence, Some(0.8));
        assert!(current.chunk_id.is_none());
        assert!(current.component_scores.is_empty());
        assert!((expired.score - 0.4).abs() < 1e-12);
    }
}
