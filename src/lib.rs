//! # Research Harness
//!
//! A hybrid retrieval fusion engine for research-assistant backends.
//!
//! Given a natural-language query, the engine runs one or more retrieval
//! strategies (semantic similarity, weighted semantic + lexical "hybrid",
//! knowledge-graph temporal facts) concurrently and in isolation, then fuses
//! their outputs into one ranked, deduplicated, source-attributed result set.
//! A failing store degrades the response instead of failing it whenever some
//! other source can still answer.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌────────────────────────┐
//!  CLI / HTTP ───▶│ RetrievalOrchestrator  │
//!                 └───────────┬────────────┘
//!          ┌──────────────────┼──────────────────┐
//!          ▼                  ▼                  ▼
//!   ┌────────────┐     ┌────────────┐     ┌────────────┐
//!   │ Embedding  │────▶│VectorStore │     │ GraphStore │
//!   └────────────┘     └─────┬──────┘     └─────┬──────┘
//!                            └────────┬─────────┘
//!                                     ▼
//!                              ┌────────────┐
//!                              │ ResultFuser│
//!                              └────────────┘
//! ```
//!
//! Scoring, fusion, and the store traits live in `research-harness-core`;
//! this crate adds configuration, the SQLite and OpenAI adapters, the async
//! orchestrator, and the CLI and HTTP surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`capabilities`] | Mock vs production capability bundle |
//! | [`orchestrator`] | Request state machine, dispatch, deadlines |
//! | [`embedding`] | Embedding providers |
//! | [`sqlite_store`] | Production stores |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema bootstrap |
//! | [`search`] | `rh search` output |
//! | [`get`] | `rh get` / `rh list` output |
//! | [`server`] | JSON HTTP server |

pub mod capabilities;
pub mod config;
pub mod db;
pub mod embedding;
pub mod get;
pub mod logging;
pub mod migrate;
pub mod orchestrator;
pub mod search;
pub mod server;
pub mod sqlite_store;
