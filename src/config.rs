use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Origins allowed by CORS. Empty list permits any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Base URL of the vector search service.
    pub url: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Distance cutoff below which a passage counts as relevant.
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,
    /// Tag filter restricting search to a knowledge subset.
    #[serde(default = "default_tag")]
    pub tag: Option<String>,
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_top_k() -> usize {
    5
}
fn default_relevance_threshold() -> f32 {
    0.7
}
fn default_tag() -> Option<String> {
    Some("faq".to_string())
}
fn default_retrieval_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Override for the API base URL. Empty uses the provider default.
    #[serde(default)]
    pub url: Option<String>,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "groq".to_string()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_llm_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    /// Database path for the sqlite backend.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Namespace prefix baked into every cache key.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            path: default_cache_path(),
            ttl_secs: default_ttl_secs(),
            namespace: default_namespace(),
        }
    }
}

fn default_cache_backend() -> String {
    "memory".to_string()
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("./data/answers.sqlite")
}
fn default_ttl_secs() -> u64 {
    172_800 // 48 hours
}
fn default_namespace() -> String {
    "faq".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    /// Maximum allowed ratio of non-alphanumeric characters in a message.
    #[serde(default = "default_max_symbol_ratio")]
    pub max_symbol_ratio: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
            max_symbol_ratio: default_max_symbol_ratio(),
        }
    }
}

fn default_max_message_chars() -> usize {
    500
}
fn default_max_symbol_ratio() -> f64 {
    0.3
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.url.trim().is_empty() {
        anyhow::bail!("retrieval.url must be set");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.relevance_threshold <= 0.0 {
        anyhow::bail!("retrieval.relevance_threshold must be > 0");
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "groq" | "openai" => {}
        other => anyhow::bail!("Unknown llm provider: '{}'. Must be groq or openai.", other),
    }
    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must be set");
    }

    // Validate cache
    match config.cache.backend.as_str() {
        "memory" | "sqlite" => {}
        other => anyhow::bail!(
            "Unknown cache backend: '{}'. Must be memory or sqlite.",
            other
        ),
    }
    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }

    // Validate pipeline
    if config.pipeline.max_attempts == 0 {
        anyhow::bail!("pipeline.max_attempts must be >= 1");
    }

    // Validate limits
    if config.limits.max_message_chars == 0 {
        anyhow::bail!("limits.max_message_chars must be > 0");
    }
    if !(0.0..=1.0).contains(&config.limits.max_symbol_ratio) {
        anyhow::bail!("limits.max_symbol_ratio must be in [0.0, 1.0]");
    }

    Ok(config)
}
