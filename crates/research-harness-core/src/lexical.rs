//! Lexical relevance scoring.
//!
//! A deterministic token-overlap score used for the text half of hybrid
//! search, for keyword lookups, and for ranking graph facts.
//!
//! # Algorithm
//!
//! 1. Lowercase the text and split on every non-alphanumeric character.
//! 2. Drop stop words and empty tokens.
//! 3. Score = |distinct query tokens found in the content| / |distinct query tokens|.
//!
//! The score is always in `[0.0, 1.0]`. A query with no indexable tokens
//! scores `0.0` against everything.

use std::collections::BTreeSet;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "to", "was", "were", "what", "which", "who", "with",
];

/// Split text into distinct, lowercased, non-stop-word tokens.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Fraction of the query's distinct tokens that occur in `content`.
pub fn text_similarity(query: &str, content: &str) -> f64 {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let content_tokens = tokenize(content);
    let matched = query_tokens
        .iter()
        .filter(|t| content_tokens.contains(*t))
        .count();
    matched as f64 / query_tokens.len() as f64
}
