//! Error types for the indexer and the artifact server.

use thiserror::Error;

/// Errors related to loading the local embedding model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("failed to load model: {0}")]
    LoadError(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("inference error: {0}")]
    InferenceError(String),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

/// Errors related to vector store operations.
///
/// `RowWrite` is local to a single upsert and leaves the surrounding batch
/// transaction usable. Every other variant means the transaction can no
/// longer be trusted.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to PostgreSQL: {0}")]
    Connection(String),

    #[error("row write failed for {key}: {message}")]
    RowWrite { key: String, message: String },

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("PostgreSQL error: {0}")]
    Postgres(String),

    #[error("invalid table name: {0}")]
    InvalidTableName(String),
}


/// Errors that stop an indexing run.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("data source unavailable: {path}: {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Errors from similarity search and single-document writes.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search query cannot be empty")]
    EmptyQuery,

    #[error("document key cannot be empty")]
    EmptyKey,

    #[error("document text cannot be empty")]
    EmptyText,

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("threshold must be between 0.0 and 1.0, got {0}")]
    InvalidThreshold(f32),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

impl SearchError {
    /// Returns true when the request itself was invalid.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SearchError::EmptyQuery
                | SearchError::EmptyKey
                | SearchError::EmptyText
                | SearchError::InvalidTopK
                | SearchError::InvalidThreshold(_)
        )
    }
}

/// Errors raised while resolving or streaming a model artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found")]
    NotFound,

    #[error("requested range not satisfiable (size {size})")]
    RangeNotSatisfiable { size: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}
