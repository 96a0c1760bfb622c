use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: default_corpus_dir(),
            extension: default_extension(),
        }
    }
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("./knowledge_base")
}
fn default_extension() -> String {
    "txt".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    #[serde(default = "default_documents_path")]
    pub documents_path: PathBuf,
    /// Reject persisted artifacts whose fingerprint no longer matches the corpus.
    #[serde(default = "default_true")]
    pub verify_corpus: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            documents_path: default_documents_path(),
            verify_corpus: true,
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/vector_store.index")
}
fn default_documents_path() -> PathBuf {
    PathBuf::from("./data/documents.json")
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts for remote providers after the first failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: None,
            batch_size: default_batch_size(),
            url: None,
            timeout_secs: default_embedding_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

impl EmbeddingConfig {
    /// Backoff for remote providers: 1s, 2s, 4s, ...
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries.saturating_add(1), Duration::from_secs(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Passages retrieved per question. One keeps answers tightly grounded.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_generation_model(),
            api_key_env: default_api_key_env(),
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_generation_model() -> String {
    "gemini-2.5-flash-preview-09-2025".to_string()
}
fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    2000
}
fn default_generation_timeout_secs() -> u64 {
    60
}

impl GenerationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
        )
    }

    /// Read the API key from the configured environment variable.
    ///
    /// A missing or blank variable is a [`RagError::Configuration`].
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(RagError::Configuration(format!(
                "{} is not set. Export it or add it to a .env file in the working directory.",
                self.api_key_env
            ))),
        }
    }
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
    "127.0.0.1:8080".to_string()
}

/// Load `KEY=value` pairs from a `.env` file into the process environment.
///
/// Variables already set in the environment win. A missing file is not an
/// error; returns whether a file was read.
pub fn load_dotenv(path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    dotenvy::from_path(path).map_err(|e| {
        RagError::Configuration(format!("failed to read {}: {}", path.display(), e))
    })?;
    tracing::debug!(path = %path.display(), "loaded environment file");
    Ok(true)
}

/// Load and validate the configuration file.
///
/// A missing file yields the defaults; an unreadable or invalid one is a
/// [`RagError::Configuration`].
pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagError::Configuration(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            RagError::Configuration(format!(
                "failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?
    } else {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let invalid = |msg: &str| Err(RagError::Configuration(msg.to_string()));

    if config.corpus.extension.trim_start_matches('.').is_empty() {
        return invalid("corpus.extension must not be empty");
    }
    if config.retrieval.top_k < 1 {
        return invalid("retrieval.top_k must be >= 1");
    }
    if config.generation.max_attempts < 1 {
        return invalid("generation.max_attempts must be >= 1");
    }
    if config.embedding.batch_size < 1 {
        return invalid("embedding.batch_size must be >= 1");
    }
    if config.embedding.dims == Some(0) {
        return invalid("embedding.dims must be > 0 when set");
    }

    match config.embedding.provider.as_str() {
        "local" | "ollama" => Ok(()),
        other => Err(RagError::Configuration(format!(
            "Unknown embedding provider: '{}'. Must be local or ollama.",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.retrieval.top_k, 1);
        assert_eq!(config.generation.max_attempts, 5);
        assert_eq!(config.generation.initial_delay_ms, 2000);
        assert_eq!(config.corpus.extension, "txt");
        assert_eq!(config.embedding.provider, "local");
        assert!(config.index.verify_corpus);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
[corpus]
dir = "/srv/kb"

[generation]
max_attempts = 3
initial_delay_ms = 10
"#,
        )
        .unwrap();
        assert_eq!(config.corpus.dir, PathBuf::from("/srv/kb"));
        assert_eq!(config.corpus.extension, "txt");
        let policy = config.generation.retry_policy();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.initial_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let config: Config = toml::from_str("[retrieval]\ntop_k = 0").unwrap();
        assert!(matches!(validate(&config), Err(RagError::Configuration(_))));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let config: Config = toml::from_str("[generation]\nmax_attempts = 0").unwrap();
        assert!(matches!(validate(&config), Err(RagError::Configuration(_))));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let config: Config = toml::from_str("[embedding]\nprovider = \"openai\"").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let config = GenerationConfig {
            api_key_env: "SDRAG_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..GenerationConfig::default()
        };
        let err = config.api_key().unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
        assert!(err.to_string().contains("SDRAG_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_malformed_config_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "[retrieval\ntop_k = ").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_api_key_from_dotenv_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(".env");
        std::fs::write(&path, "SDRAG_TEST_DOTENV_KEY=key-from-dotenv\n").unwrap();

        assert!(load_dotenv(&path).unwrap());
        let config = GenerationConfig {
            api_key_env: "SDRAG_TEST_DOTENV_KEY".to_string(),
            ..GenerationConfig::default()
        };
        assert_eq!(config.api_key().unwrap(), "key-from-dotenv");
    }

    #[test]
    fn test_missing_dotenv_file_is_allowed() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(!load_dotenv(&tmp.path().join(".env")).unwrap());
    }

    #[test]
    fn test_missing_api_key_mentions_dotenv() {
        let config = GenerationConfig {
            api_key_env: "SDRAG_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..GenerationConfig::default()
        };
        assert!(config.api_key().unwrap_err().to_string().contains(".env"));
    }
}
