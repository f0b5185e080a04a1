//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working local setup: SQLite index, OpenAI embeddings and
//! chat completions. Secrets are never read from the file; the OpenAI and
//! Pinecone keys come from `OPENAI_API_KEY` and `PINECONE_API_KEY`.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//!
//! [index]
//! provider = "pinecone"
//! name = "aws-study-partner"
//!
//! [study]
//! max_history = 5
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use study_partner_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use study_partner_core::PipelineOptions;

pub use study_partner_core::pipeline::MAX_TOP_K;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub quiz: QuizConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:3001".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Texts per embeddings API call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout(),
            base_url: default_openai_base_url(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_dims() -> usize {
    3072
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    1
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `"sqlite"`, `"pinecone"` or `"memory"`.
    #[serde(default = "default_index_provider")]
    pub provider: String,
    /// SQLite database file (sqlite provider).
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    /// Pinecone index name.
    #[serde(default = "default_index_name")]
    pub name: String,
    /// Pinecone data-plane host. Resolved through the control plane when unset.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Chunks per upload batch.
    #[serde(default = "default_upload_batch_size")]
    pub upload_batch_size: usize,
    /// Retries for Pinecone data-plane calls on 429/5xx/network errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            path: default_index_path(),
            name: default_index_name(),
            host: None,
            cloud: default_cloud(),
            region: default_region(),
            upload_batch_size: default_upload_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_index_provider() -> String {
    "sqlite".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/study.sqlite")
}
fn default_index_name() -> String {
    "aws-study-partner".to_string()
}
fn default_cloud() -> String {
    "aws".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_upload_batch_size() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
            base_url: default_openai_base_url(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    500
}
fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StudyConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_answer_excerpt_chars")]
    pub answer_excerpt_chars: usize,
    #[serde(default = "default_source_excerpt_chars")]
    pub source_excerpt_chars: usize,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            history_window: default_history_window(),
            answer_excerpt_chars: default_answer_excerpt_chars(),
            source_excerpt_chars: default_source_excerpt_chars(),
            default_top_k: default_top_k(),
        }
    }
}

fn default_max_history() -> usize {
    5
}
fn default_history_window() -> usize {
    3
}
fn default_answer_excerpt_chars() -> usize {
    100
}
fn default_source_excerpt_chars() -> usize {
    300
}
fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuizConfig {
    /// Ask the model for a reference answer key when a quiz is generated.
    #[serde(default = "default_answer_key")]
    pub answer_key: bool,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            answer_key: default_answer_key(),
        }
    }
}

fn default_answer_key() -> bool {
    true
}

impl Config {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            max_history: self.study.max_history,
            history_window: self.study.history_window,
            answer_excerpt_chars: self.study.answer_excerpt_chars,
            source_excerpt_chars: self.study.source_excerpt_chars,
            default_top_k: self.study.default_top_k,
            answer_key: self.quiz.answer_key,
        }
    }
}

/// Load and validate a configuration file.
///
/// A missing file is not an error: built-in defaults are used and a warning
/// is logged. A file that exists but fails to parse or validate is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::warn!(
            "Config file {} not found; using built-in defaults",
            path.display()
        );
        Config::default()
    };
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

pub fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    // Study
    if config.study.max_history == 0 {
        bail!("study.max_history must be >= 1");
    }
    if !(1..=MAX_TOP_K).contains(&config.study.default_top_k) {
        bail!("study.default_top_k must be in [1, {}]", MAX_TOP_K);
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.trim().is_empty() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be >= 1");
    }

    // Index
    match config.index.provider.as_str() {
        "sqlite" | "pinecone" | "memory" => {}
        other => bail!(
            "Unknown index provider: '{}'. Must be sqlite, pinecone, or memory.",
            other
        ),
    }
    if config.index.upload_batch_size == 0 {
        bail!("index.upload_batch_size must be >= 1");
    }

    // LLM
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.max_tokens == 0 {
        bail!("llm.max_tokens must be >= 1");
    }

    Ok(())
}
