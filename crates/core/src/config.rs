//! Configuration management for MedIntel.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - YAML config file (`--config`, `MEDINTEL_CONFIG`, or `./medintel.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The resulting [`AppConfig`] is built once in `main` and handed to each
//! component constructor; nothing reads settings from a global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "medintel.yaml";

/// Generation providers accepted by `llm.provider`.
pub const KNOWN_LLM_PROVIDERS: [&str; 3] = ["ollama", "openai", "gemini"];

/// Embedding providers accepted by `embedding.provider`.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Config file the settings were read from, if any
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,

    /// Generation provider settings
    pub llm: LlmSettings,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// Retrieval and gating settings
    pub retrieval: RetrievalSettings,

    /// Index location and chunking parameters
    pub index: IndexSettings,

    /// Timeouts and retries for capability calls
    pub runtime: RuntimeSettings,
}

/// Generation provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider name ("ollama", "openai", "gemini")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Custom endpoint URL
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key_env: None,
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Provider name ("trigram", "ollama")
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum texts per embedding call during ingestion
    #[serde(rename = "batchSize")]
    pub batch_size: usize,

    /// Custom endpoint URL
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            batch_size: 64,
            endpoint: None,
        }
    }
}

/// Retrieval and sufficiency-gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of fragments to retrieve
    #[serde(rename = "topK")]
    pub top_k: usize,

    /// Minimum similarity for a fragment to count as evidence
    #[serde(rename = "confidenceThreshold")]
    pub confidence_threshold: f32,

    /// Display length of source excerpts
    #[serde(rename = "excerptChars")]
    pub excerpt_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            confidence_threshold: 0.75,
            excerpt_chars: 200,
        }
    }
}

/// Index persistence and chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Path of the persisted index file
    pub path: PathBuf,

    /// Maximum fragment length in characters
    #[serde(rename = "chunkSize")]
    pub chunk_size: usize,

    /// Characters shared by consecutive fragments
    #[serde(rename = "chunkOverlap")]
    pub chunk_overlap: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/index.sqlite"),
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Capability call policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Per-call timeout for embedding and generation requests
    #[serde(rename = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,

    /// Extra attempts after a transport failure
    pub retries: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            retries: 1,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    retrieval: Option<RetrievalSettings>,
    index: Option<IndexSettings>,
    runtime: Option<RuntimeSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl AppConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Environment variables:
    /// - `MEDINTEL_CONFIG`: Path to config file (when `config_file` is `None`)
    /// - `MEDINTEL_PROVIDER`: Generation provider
    /// - `MEDINTEL_MODEL`: Generation model
    /// - `MEDINTEL_EMBEDDING_PROVIDER`: Embedding provider
    /// - `MEDINTEL_INDEX_PATH`: Index file
    /// - `MEDINTEL_TOP_K`: Fragments to retrieve
    /// - `MEDINTEL_CONFIDENCE_THRESHOLD`: Sufficiency threshold
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use medintel_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Index: {:?}", config.index.path);
    /// ```
    pub fn load(config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let explicit = config_file.or_else(|| std::env::var("MEDINTEL_CONFIG").ok().map(PathBuf::from));

        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                config = config.merge_yaml(&path)?;
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    config = config.merge_yaml(&path)?;
                }
            }
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Environment variables override YAML config.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(provider) = std::env::var("MEDINTEL_PROVIDER") {
            self.llm.provider = provider;
        }

        if let Ok(model) = std::env::var("MEDINTEL_MODEL") {
            self.llm.model = model;
        }

        if let Ok(provider) = std::env::var("MEDINTEL_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Ok(path) = std::env::var("MEDINTEL_INDEX_PATH") {
            self.index.path = PathBuf::from(path);
        }

        if let Ok(top_k) = std::env::var("MEDINTEL_TOP_K") {
            self.retrieval.top_k = top_k.parse().map_err(|e| {
                AppError::Config(format!("Invalid MEDINTEL_TOP_K '{}': {}", top_k, e))
            })?;
        }

        if let Ok(threshold) = std::env::var("MEDINTEL_CONFIDENCE_THRESHOLD") {
            self.retrieval.confidence_threshold = threshold.parse().map_err(|e| {
                AppError::Config(format!(
                    "Invalid MEDINTEL_CONFIDENCE_THRESHOLD '{}': {}",
                    threshold, e
                ))
            })?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();
        result.config_file = Some(path.to_path_buf());

        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(index) = config_file.index {
            result.index = index;
        }
        if let Some(runtime) = config_file.runtime {
            result.runtime = runtime;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over the config file and environment.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        index_path: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        json_logs: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.llm.provider = provider;
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(index_path) = index_path {
            self.index.path = index_path;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if json_logs {
            self.json_logs = true;
        }

        self
    }

    /// Resolve the generation API key from the environment.
    ///
    /// `MEDINTEL_API_KEY` wins; otherwise the configured `apiKeyEnv`, falling
    /// back to the provider's conventional variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("MEDINTEL_API_KEY") {
            return Some(key);
        }

        let env_var = match &self.llm.api_key_env {
            Some(var) => var.as_str(),
            None => match self.llm.provider.as_str() {
                "openai" => "OPENAI_API_KEY",
                "gemini" => "GEMINI_API_KEY",
                _ => return None,
            },
        };

        std::env::var(env_var).ok()
    }

    /// Validate configuration before any component is constructed.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.llm.provider,
                KNOWN_LLM_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be positive".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(AppError::Config("Batch size must be positive".to_string()));
        }

        if self.index.chunk_size == 0 {
            return Err(AppError::Config("Chunk size must be positive".to_string()));
        }

        if self.index.chunk_overlap >= self.index.chunk_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.index.chunk_overlap, self.index.chunk_size
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("top_k must be positive".to_string()));
        }

        let threshold = self.retrieval.confidence_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(AppError::Config(format!(
                "Confidence threshold {} outside [-1, 1]",
                threshold
            )));
        }

        if self.runtime.request_timeout_secs == 0 {
            return Err(AppError::Config(
                "Request timeout must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
