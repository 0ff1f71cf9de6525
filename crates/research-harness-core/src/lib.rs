//! # Research Harness Core
//!
//! Runtime-agnostic logic for the Research Harness retrieval engine: data
//! models, the error taxonomy, store and embedding traits, lexical and hybrid
//! scoring, the knowledge-graph temporal policy, and result fusion.
//!
//! This crate contains no tokio, sqlx, or network dependencies. The async
//! orchestration (deadlines, concurrent branches) and the production store
//! adapters live in the `research-harness` app crate.

pub mod embedding;
pub mod error;
pub mod fusion;
pub mod graph;
pub mod hybrid;
pub mod lexical;
pub mod models;
pub mod store;
