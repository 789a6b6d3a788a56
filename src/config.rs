/// Configuration for the notes RAG service.
///
/// Non-secret settings live in a JSON file; API keys and the Pinecone
/// environment are read from the process environment at startup.
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::indexer::markdown::ParseOptions;
use crate::indexer::splitter::SplitterConfig;
use crate::vector_store::{IndexSpec, Metric, QueryMode};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

pub const PINECONE_API_KEY: &str = "PINECONE_API_KEY";
pub const PINECONE_ENVIRONMENT: &str = "PINECONE_ENVIRONMENT";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

// ── Default value functions ──────────────────────────────────────────

fn default_knowledge_base_dir() -> String {
    "./knowledge_base".to_string()
}

fn default_chunk_size() -> usize {
    1024
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_embed_batch_size() -> usize {
    64
}

fn default_search_top_k() -> usize {
    10
}

fn default_synthesis_top_k() -> usize {
    2
}

fn default_mmr_lambda() -> f32 {
    0.5
}

fn default_index_name() -> String {
    "test-llamaindex-rag".to_string()
}

fn default_dimension() -> usize {
    1536
}

fn default_metric() -> Metric {
    Metric::Euclidean
}

fn default_pod_type() -> String {
    "p1".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_completion_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_knowledge_base_dir")]
    pub knowledge_base_dir: String,

    #[serde(default)]
    pub remove_hyperlinks: bool,

    #[serde(default)]
    pub remove_images: bool,

    /// Maximum node length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Matches returned by `/retrieval`.
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    /// Matches used as context by `/synthesis`.
    #[serde(default = "default_synthesis_top_k")]
    pub synthesis_top_k: usize,

    #[serde(default)]
    pub query_mode: QueryModeSetting,

    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryModeSetting {
    #[default]
    Default,
    Mmr,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default = "default_metric")]
    pub metric: Metric,

    #[serde(default = "default_pod_type")]
    pub pod_type: String,

    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            knowledge_base_dir: default_knowledge_base_dir(),
            remove_hyperlinks: false,
            remove_images: false,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embed_batch_size: default_embed_batch_size(),
            search_top_k: default_search_top_k(),
            synthesis_top_k: default_synthesis_top_k(),
            query_mode: QueryModeSetting::default(),
            mmr_lambda: default_mmr_lambda(),
            index: IndexConfig::default(),
            openai: OpenAiConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            dimension: default_dimension(),
            metric: default_metric(),
            pod_type: default_pod_type(),
            namespace: String::new(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            completion_model: default_completion_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and writes a
    /// template when the default path was used. Malformed JSON is an error.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;
        let cfg: Config =
            serde_json::from_str(&data).with_context(|| format!("invalid JSON in {path}"))?;

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            self.chunk_overlap,
            self.chunk_size
        );
        anyhow::ensure!(self.embed_batch_size > 0, "embed_batch_size must be positive");
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(self.synthesis_top_k > 0, "synthesis_top_k must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.mmr_lambda),
            "mmr_lambda must be within [0, 1]"
        );
        anyhow::ensure!(!self.index.name.is_empty(), "index.name must not be empty");
        anyhow::ensure!(self.index.dimension > 0, "index.dimension must be positive");
        anyhow::ensure!(self.openai.max_tokens > 0, "openai.max_tokens must be positive");
        Ok(())
    }

    #[must_use]
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            remove_hyperlinks: self.remove_hyperlinks,
            remove_images: self.remove_images,
        }
    }

    #[must_use]
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    #[must_use]
    pub fn query_mode(&self) -> QueryMode {
        match self.query_mode {
            QueryModeSetting::Default => QueryMode::Default,
            QueryModeSetting::Mmr => QueryMode::Mmr {
                lambda: self.mmr_lambda,
            },
        }
    }

    #[must_use]
    pub fn index_spec(&self) -> IndexSpec {
        IndexSpec {
            name: self.index.name.clone(),
            dimension: self.index.dimension,
            metric: self.index.metric,
            pod_type: self.index.pod_type.clone(),
        }
    }
}

// ── Secrets ──────────────────────────────────────────────────────────

/// Credentials required to reach Pinecone and OpenAI.
#[derive(Clone)]
pub struct Secrets {
    pub pinecone_api_key: String,
    pub pinecone_environment: String,
    pub openai_api_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("pinecone_api_key", &"<redacted>")
            .field("pinecone_environment", &self.pinecone_environment)
            .field("openai_api_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    /// Reads all secrets from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads all secrets through `lookup`, failing on the first missing one.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => bail!("environment variable {key} is not set"),
            }
        };

        Ok(Self {
            pinecone_api_key: require(PINECONE_API_KEY)?,
            pinecone_environment: require(PINECONE_ENVIRONMENT)?,
            openai_api_key: require(OPENAI_API_KEY)?,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────
