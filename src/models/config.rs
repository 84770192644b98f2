use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost:5432/simplisearch";
pub const DEFAULT_TABLE: &str = "embeddings";
pub const DEFAULT_SOURCE_LABEL: &str = "cli_index";
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "onnx";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("simplisearch").join("config.toml"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indexing.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "indexing.batch_size must be at least 1".to_string(),
            ));
        }
        if self.server.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "server.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        if self.search.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "search.top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.search.threshold) {
            return Err(ConfigError::ValidationError(
                "search.threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.server.api_connections == 0 {
            return Err(ConfigError::ValidationError(
                "server.api_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local ONNX model run in-process
    #[default]
    Onnx,
    /// Remote text-embeddings server
    Http,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "onnx" => Ok(EmbeddingProvider::Onnx),
            "http" => Ok(EmbeddingProvider::Http),
            _ => Err(format!("unknown embedding provider: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Onnx => write!(f, "onnx"),
            EmbeddingProvider::Http => write!(f, "http"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Directory holding `model.onnx` and `tokenizer.json`
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_normalize")]
    pub normalize: bool,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    128
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_normalize() -> bool {
    true
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model_dir: default_model_dir(),
            url: default_embedding_url(),
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
            dimension: default_dimension(),
            normalize: default_normalize(),
        }
    }
}

/// Column type the `vector` column is bound as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorColumn {
    /// `FLOAT8[]`
    #[default]
    Float8,
    /// pgvector `vector(n)`
    Pgvector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default)]
    pub vector_column: VectorColumn,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u32,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_acquire_timeout() -> u32 {
    30
}

impl VectorStoreConfig {
    pub fn qualified_table_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.table),
            None => self.table.clone(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            schema: None,
            table: default_table(),
            vector_column: VectorColumn::default(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Provenance label written to each record's `source` metadata field
    #[serde(default = "default_source_label")]
    pub source_label: String,
}

fn default_batch_size() -> usize {
    32
}

fn default_source_label() -> String {
    DEFAULT_SOURCE_LABEL.to_string()
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            source_label: default_source_label(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Extension appended to artifact names that do not already carry it
    #[serde(default = "default_extension")]
    pub extension: Option<String>,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Mount `/api/search` and `/api/add` next to the artifact routes
    #[serde(default)]
    pub search_api: bool,

    /// Pool size used by the search API
    #[serde(default = "default_api_connections")]
    pub api_connections: u32,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_extension() -> Option<String> {
    Some(DEFAULT_ARTIFACT_EXTENSION.to_string())
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

fn default_api_connections() -> u32 {
    4
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            models_dir: default_models_dir(),
            extension: default_extension(),
            chunk_size: default_chunk_size(),
            search_api: false,
            api_connections: default_api_connections(),
        }
    }
}

/// Defaults for similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum similarity (`1 - cosine distance`) a hit must reach
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            threshold: default_threshold(),
        }
    }
}
