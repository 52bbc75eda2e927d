//! Configuration for the fondrag assistant.
//!
//! TOML file at `~/.fondrag/config.toml` (created with defaults on first
//! run) with environment overrides for deployment secrets.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the backend API token
pub const ENV_API_TOKEN: &str = "FONDRAG_API_TOKEN";
/// Environment variable overriding the backend base URL
pub const ENV_BASE_URL: &str = "FONDRAG_BASE_URL";
/// Environment variable overriding the generation model name
pub const ENV_MODEL: &str = "FONDRAG_MODEL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompt: PromptLimits,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

/// Similarity-search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum number of chunks to retrieve per query
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to count as grounding context
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_score: 0.3,
        }
    }
}

/// Prompt assembly limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptLimits {
    /// Character budget for context chunks included in a prompt
    pub max_prompt_chars: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_prompt_chars: 4000,
        }
    }
}

/// Retry and deadline policy for the generation client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per generation call (first try included)
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub base_backoff_ms: u64,
    /// Cap applied to any single backoff delay
    pub max_backoff_ms: u64,
    /// Wall-clock budget across all attempts and backoff waits
    pub overall_deadline_ms: u64,
    /// Apply ±25% random variation to backoff delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 8000,
            overall_deadline_ms: 30000,
            jitter: true,
        }
    }
}

/// Remote generation endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// OpenAI-compatible API base, e.g. `https://api.proxyapi.ru/openai/v1`
    pub base_url: String,
    /// Model name sent in chat-completion requests
    pub model: String,
    /// Bearer token; usually supplied via `FONDRAG_API_TOKEN`
    pub api_token: Option<String>,
    /// Per-attempt request timeout
    pub request_timeout_secs: u64,
    /// Sampling temperature (kept low for factual answers)
    pub temperature: f32,
    /// Response length cap in tokens
    pub max_tokens: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.proxyapi.ru/openai/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_token: None,
            request_timeout_secs: 30,
            temperature: 0.3,
            max_tokens: 800,
        }
    }
}

/// Embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider kind: `local` (transformer encoder) or `hashed` (offline)
    pub provider: EmbeddingProviderKind,
    /// Hugging Face model id for the local provider
    pub model_id: String,
    /// Output vector length; every chunk and query embedding must match
    pub dimension: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    Local,
    Hashed,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Local,
            model_id: "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".to_string(),
            dimension: 384,
        }
    }
}

/// Knowledge-base corpus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Path to the knowledge-base TOML file; defaults next to the config
    pub path: Option<PathBuf>,
    /// Character budget per chunk when splitting documents
    pub max_chunk_chars: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_chunk_chars: 1000,
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default().with_env_overrides();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config.with_env_overrides())
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".fondrag").join("config.toml"))
    }

    /// Default knowledge-base path: `knowledge.toml` next to the config file
    pub fn knowledge_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.knowledge.path {
            return Ok(path.clone());
        }

        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".fondrag").join("knowledge.toml"))
    }

    /// Apply environment overrides for deployment secrets
    fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            if !token.is_empty() {
                self.backend.api_token = Some(token);
            }
        }
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.is_empty() {
                self.backend.base_url = url;
            }
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            if !model.is_empty() {
                self.backend.model = model;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.embedding.dimension, 384);
        assert!(config.backend.api_token.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = Config::default();
        config.retrieval.top_k = 5;
        config.retry.overall_deadline_ms = 15000;

        let toml_string = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_string).unwrap();

        assert_eq!(parsed.retrieval.top_k, 5);
        assert_eq!(parsed.retry.overall_deadline_ms, 15000);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [retrieval]
            top_k = 7
            min_score = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(parsed.retrieval.top_k, 7);
        assert_eq!(parsed.prompt.max_prompt_chars, 4000);
        assert_eq!(parsed.retry.base_backoff_ms, 500);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [backend]
            base_url = "http://localhost:9999/v1"
            model = "test-model"
            request_timeout_secs = 5
            temperature = 0.1
            max_tokens = 100
            "#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend.request_timeout_secs, 5);
        assert_eq!(config.backend.max_tokens, 100);
    }

    #[test]
    fn test_embedding_provider_kind_parses() {
        let parsed: Config = toml::from_str(
            r#"
            [embedding]
            provider = "hashed"
            model_id = ""
            dimension = 64
            "#,
        )
        .unwrap();

        assert_eq!(parsed.embedding.provider, EmbeddingProviderKind::Hashed);
        assert_eq!(parsed.embedding.dimension, 64);
    }
}
