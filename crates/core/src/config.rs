//! Configuration management for ragbot.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.ragbot/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.ragbot/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const RAGBOT_DIR: &str = ".ragbot";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .ragbot/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log record format ("text" or "json")
    pub log_format: String,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub web_search: WebSearchSettings,
    pub retrieval: RetrievalSettings,
    pub chunking: ChunkingSettings,
}

/// Local LLM service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "gemma:2b".to_string(),
            timeout_secs: 60,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// "ollama" or "trigram" (offline hashing embedder)
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
            timeout_secs: 30,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct VectorStoreSettings {
    /// Database path, relative paths resolve against the workspace
    pub path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(RAGBOT_DIR).join("vectors.sqlite"),
            timeout_secs: 10,
        }
    }
}

/// Web search (fallback) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WebSearchSettings {
    pub provider: String,
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub max_results: usize,
    pub search_depth: String,
    pub timeout_secs: u64,
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            provider: "tavily".to_string(),
            endpoint: "https://api.tavily.com".to_string(),
            api_key_env: "TAVILY_API_KEY".to_string(),
            max_results: 3,
            search_depth: "basic".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Retrieval and fallback defaults for answer requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    pub max_results: usize,
    pub max_context_length: usize,
    pub fallback_threshold: f32,
    pub use_fallback: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            max_context_length: 2000,
            fallback_threshold: 0.3,
            use_fallback: true,
        }
    }
}

/// Chunking and quality-filter settings used during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_chars: usize,
    pub min_words: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
            min_chars: 50,
            min_words: 5,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    vector_store: Option<VectorStoreSettings>,
    web_search: Option<WebSearchSettings>,
    retrieval: Option<RetrievalSettings>,
    chunking: Option<ChunkingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            log_format: "text".to_string(),
            verbose: false,
            no_color: false,
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            vector_store: VectorStoreSettings::default(),
            web_search: WebSearchSettings::default(),
            retrieval: RetrievalSettings::default(),
            chunking: ChunkingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `RAGBOT_WORKSPACE`: Override workspace path
    /// - `RAGBOT_CONFIG`: Path to config file
    /// - `RAGBOT_MODEL`: LLM model identifier
    /// - `RAGBOT_OLLAMA_URL`: Ollama endpoint for generation and embeddings
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use ragbot_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("RAGBOT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("RAGBOT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.ragbot_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(model) = std::env::var("RAGBOT_MODEL") {
            config.llm.model = model;
        }

        if let Ok(url) = std::env::var("RAGBOT_OLLAMA_URL") {
            config.llm.endpoint = url.clone();
            config.embedding.endpoint = url;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    ///
    /// Sections present in the file replace the corresponding section;
    /// keys missing inside a section fall back to their defaults.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| {
                AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(vector_store) = config_file.vector_store {
            result.vector_store = vector_store;
        }
        if let Some(web_search) = config_file.web_search {
            result.web_search = web_search;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(model) = model {
            self.llm.model = model;
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

        self
    }

    /// Get the path to the .ragbot directory.
    pub fn ragbot_dir(&self) -> PathBuf {
        self.workspace.join(RAGBOT_DIR)
    }

    /// Ensure the .ragbot directory exists.
    pub fn ensure_ragbot_dir(&self) -> AppResult<()> {
        let ragbot_dir = self.ragbot_dir();
        if !ragbot_dir.exists() {
            std::fs::create_dir_all(&ragbot_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .ragbot directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Absolute path of the vector database.
    pub fn vector_store_path(&self) -> PathBuf {
        if self.vector_store.path.is_absolute() {
            self.vector_store.path.clone()
        } else {
            self.workspace.join(&self.vector_store.path)
        }
    }

    /// Path of the document registry journal.
    pub fn registry_path(&self) -> PathBuf {
        self.ragbot_dir().join("documents.jsonl")
    }

    /// Resolve the web search API key from its environment variable.
    pub fn resolve_web_api_key(&self) -> Option<String> {
        std::env::var(&self.web_search.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }

    pub fn vector_store_timeout(&self) -> Duration {
        Duration::from_secs(self.vector_store.timeout_secs)
    }

    pub fn web_search_timeout(&self) -> Duration {
        Duration::from_secs(self.web_search.timeout_secs)
    }

    /// Validate provider names and numeric ranges.
    pub fn validate(&self) -> AppResult<()> {
        check_known("LLM provider", &self.llm.provider, &["ollama"])?;
        check_known(
            "embedding provider",
            &self.embedding.provider,
            &["ollama", "trigram"],
        )?;
        check_known("web search provider", &self.web_search.provider, &["tavily"])?;
        check_known("log format", &self.log_format, &["text", "json"])?;

        if self.chunking.chunk_size == 0 {
            return Err(AppError::Config(
                "chunking.chunkSize must be greater than zero".to_string(),
            ));
        }

        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "embedding.dimensions and embedding.batchSize must be greater than zero"
                    .to_string(),
            ));
        }

        let threshold = self.retrieval.fallback_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(AppError::Config(format!(
                "retrieval.fallbackThreshold must be a cosine similarity in [-1, 1], got {}",
                threshold
            )));
        }

        if self.retrieval.max_results == 0 || self.retrieval.max_context_length == 0 {
            return Err(AppError::Config(
                "retrieval.maxResults and retrieval.maxContextLength must be greater than zero"
                    .to_string(),
            ));
        }

        let timeouts = [
            ("llm", self.llm.timeout_secs),
            ("embedding", self.embedding.timeout_secs),
            ("vectorStore", self.vector_store.timeout_secs),
            ("webSearch", self.web_search.timeout_secs),
        ];
        for (section, secs) in timeouts {
            if secs == 0 {
                return Err(AppError::Config(format!(
                    "{}.timeoutSecs must be greater than zero",
                    section
                )));
            }
        }

        Ok(())
    }
}

fn check_known(what: &str, value: &str, known: &[&str]) -> AppResult<()> {
    if known.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown {}: {}. Supported: {}",
            what,
            value,
            known.join(", ")
        )))
    }
}
