//! # Research Harness CLI (`rh`)
//!
//! ## Usage
//!
//! ```bash
//! rh --config ./config/rh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rh init` | Create the SQLite database and schema |
//! | `rh search "<query>"` | Run a retrieval request |
//! | `rh get <id>` | Show one document |
//! | `rh list` | Page through the corpus |
//! | `rh serve` | Start the JSON HTTP server |
//!
//! When the config file does not exist, `rh` runs in mock mode against the
//! built-in sample corpus.
//!
//! ## Examples
//!
//! ```bash
//! rh search "machine learning" --strategy hybrid --limit 2 --text-weight 0.3
//! rh search "federal reserve" --strategy comprehensive --timeline --json
//! rh list --limit 1 --offset 1 --filter category=economic_analysis
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use research_harness::config::{self, Config};
use research_harness::search::SearchArgs;
use research_harness::{get, logging, migrate, search, server};

/// Research Harness: a hybrid retrieval fusion engine for research assistants.
#[derive(Parser)]
#[command(name = "rh", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rh.toml`. A missing file means mock mode with
    /// default settings.
    #[arg(long, global = true, default_value = "./config/rh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents, chunks,
    /// chunk_vectors, and graph_facts tables. Idempotent.
    Init,

    /// Search the corpus.
    Search {
        /// The query text.
        query: String,

        /// Retrieval strategy: vector, hybrid, graph, comprehensive, or keyword.
        #[arg(long, default_value = "hybrid")]
        strategy: String,

        /// Maximum number of results (1-20).
        #[arg(long)]
        limit: Option<usize>,

        /// Lexical weight for hybrid search, in [0.0, 1.0].
        #[arg(long)]
        text_weight: Option<f64>,

        /// Include expired knowledge-graph facts.
        #[arg(long)]
        timeline: bool,

        /// Print the raw JSON response.
        #[arg(long)]
        json: bool,
    },

    /// Show a document by id.
    Get {
        /// Document id.
        id: String,
    },

    /// List documents in creation order.
    List {
        /// Page size (1-50).
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Number of documents to skip.
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Exact-match metadata filter as `key=value`; repeatable.
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,
    },

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,
}

/// Parse a `key=value` pair for `--filter` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::minimal()
    };
    logging::init_tracing(&cfg.logging)?;
    if !cli.config.exists() {
        tracing::info!(path = %cli.config.display(), "config file not found; running in mock mode");
    }

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Search {
            query,
            strategy,
            limit,
            text_weight,
            timeline,
            json,
        } => {
            search::run_search(
                &cfg,
                SearchArgs {
                    query,
                    strategy,
                    limit,
                    text_weight,
                    timeline,
                    json,
                },
            )
            .await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::List {
            limit,
            offset,
            filters,
        } => {
            get::run_list(&cfg, limit, offset, filters).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
