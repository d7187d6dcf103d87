//! TOML configuration.
//!
//! ```toml
//! [corpus]
//! courses = "data/all_course_embeddings.json"
//! certificates = "data/grad_cert_embedding.json"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [engine]
//! top_k_courses = 10
//! top_k_certificates = 3
//! ```
//!
//! Only `[corpus]` is required; every other section has defaults. The
//! OpenAI API key is read from `OPENAI_API_KEY`, never from the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use optilearn_core::models::CorpusKind;
use optilearn_core::rank::{DEFAULT_SIMILARITY_FLOOR, MAX_TECH_RATIO};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Paths to the precomputed corpora. `.jsonl` files are read as JSON lines.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorpusConfig {
    #[serde(default)]
    pub courses: Option<PathBuf>,
    #[serde(default)]
    pub certificates: Option<PathBuf>,
}

impl CorpusConfig {
    pub fn path_for(&self, kind: CorpusKind) -> Option<&Path> {
        match kind {
            CorpusKind::Courses => self.courses.as_deref(),
            CorpusKind::Certificates => self.certificates.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Total attempts per text, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay before the second attempt; doubles on each retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (OpenAI-compatible gateway or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    500
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
pub struct EngineConfig {
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f64,
    #[serde(default = "default_top_k_courses")]
    pub top_k_courses: usize,
    #[serde(default = "default_top_k_certificates")]
    pub top_k_certificates: usize,
    /// Budget for embedding the requirement text on interactive calls.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_tech_ratio")]
    pub default_tech_ratio: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_floor: default_similarity_floor(),
            top_k_courses: default_top_k_courses(),
            top_k_certificates: default_top_k_certificates(),
            deadline_secs: default_deadline_secs(),
            default_tech_ratio: default_tech_ratio(),
        }
    }
}

impl EngineConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn top_k_for(&self, kind: CorpusKind) -> usize {
        match kind {
            CorpusKind::Courses => self.top_k_courses,
            CorpusKind::Certificates => self.top_k_certificates,
        }
    }
}

fn default_similarity_floor() -> f64 {
    DEFAULT_SIMILARITY_FLOOR
}
fn default_top_k_courses() -> usize {
    10
}
fn default_top_k_certificates() -> usize {
    3
}
fn default_deadline_secs() -> u64 {
    45
}
fn default_tech_ratio() -> u8 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.corpus.courses.is_none() && config.corpus.certificates.is_none() {
        anyhow::bail!("[corpus] must set at least one of courses or certificates");
    }

    // Validate engine
    let engine = &config.engine;
    if !(-1.0..=1.0).contains(&engine.similarity_floor) {
        anyhow::bail!("engine.similarity_floor must be in [-1.0, 1.0]");
    }
    if engine.top_k_courses < 1 || engine.top_k_certificates < 1 {
        anyhow::bail!("engine.top_k_courses and engine.top_k_certificates must be >= 1");
    }
    if engine.default_tech_ratio > MAX_TECH_RATIO {
        anyhow::bail!("engine.default_tech_ratio must be in [0, {}]", MAX_TECH_RATIO);
    }
    if engine.deadline_secs == 0 {
        anyhow::bail!("engine.deadline_secs must be > 0");
    }

    // Validate embedding
    if config.embedding.max_attempts == 0 {
        anyhow::bail!("embedding.max_attempts must be >= 1");
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(config)
}
