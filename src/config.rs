//! Configuration parsing and validation.
//!
//! Research Harness is configured via a TOML file (default: `config/rh.toml`).
//! Every section has defaults, so a file containing only `mode = "mock"` is
//! a complete configuration.
//!
//! # Example
//!
//! ```toml
//! mode = "production"
//!
//! [db]
//! path = "./data/rh.sqlite"
//!
//! [retrieval]
//! default_text_weight = 0.3
//! candidate_k = 20
//! timeout_ms = 3000
//! embedding_attempts = 2
//! retry_backoff_ms = 200
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [server]
//! bind = "127.0.0.1:7341"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```
//!
//! `mode` is resolved exactly once, when capabilities are built; nothing
//! reads the environment to decide it at request time.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use research_harness_core::models::{Mode, MAX_PAGE_LIMIT, MAX_SEARCH_LIMIT};

/// Upper bound for `retrieval.timeout_ms` (ten minutes).
pub const MAX_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_mode() -> Mode {
    Mode::Mock
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/rh.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_text_weight")]
    pub default_text_weight: f64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Candidates fetched per half of a hybrid search before scoring.
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    /// Per-request deadline covering every store and embedding call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Total embedding attempts per request; `1` disables retry.
    #[serde(default = "default_embedding_attempts")]
    pub embedding_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_text_weight: default_text_weight(),
            default_limit: default_limit(),
            candidate_k: default_candidate_k(),
            timeout_ms: default_timeout_ms(),
            embedding_attempts: default_embedding_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_text_weight() -> f64 {
    research_harness_core::models::DEFAULT_TEXT_WEIGHT
}
fn default_limit() -> usize {
    research_harness_core::models::DEFAULT_SEARCH_LIMIT
}
fn default_candidate_k() -> usize {
    20
}
fn default_timeout_ms() -> u64 {
    3000
}
fn default_embedding_attempts() -> u32 {
    1
}
fn default_retry_backoff_ms() -> u64 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7341".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}
fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Config {
    /// Mock-mode configuration with every default applied.
    pub fn minimal() -> Self {
        Self {
            mode: Mode::Mock,
            db: DbConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Check cross-field constraints. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if !r.default_text_weight.is_finite() || !(0.0..=1.0).contains(&r.default_text_weight) {
            bail!("retrieval.default_text_weight must be in [0.0, 1.0]");
        }
        if !(1..=MAX_SEARCH_LIMIT).contains(&r.default_limit) {
            bail!("retrieval.default_limit must be in [1, {}]", MAX_SEARCH_LIMIT);
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&r.candidate_k) {
            bail!("retrieval.candidate_k must be in [1, {}]", MAX_PAGE_LIMIT);
        }
        if !(1..=MAX_TIMEOUT_MS).contains(&r.timeout_ms) {
            bail!("retrieval.timeout_ms must be in [1, {}]", MAX_TIMEOUT_MS);
        }
        if r.embedding_attempts == 0 {
            bail!("retrieval.embedding_attempts must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "sample" => {}
            "openai" => {
                if self.embedding.dims.unwrap_or(0) == 0 {
                    bail!("embedding.dims must be > 0 when provider is 'openai'");
                }
                if self.embedding.model.is_none() {
                    bail!("embedding.model must be specified when provider is 'openai'");
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, sample, or openai.",
                other
            ),
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
