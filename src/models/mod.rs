mod config;
mod format;
mod record;
mod search;
mod summary;

pub use config::{
    Config, DEFAULT_ARTIFACT_EXTENSION, DEFAULT_BIND, DEFAULT_DATABASE_URL,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_SOURCE_LABEL, DEFAULT_TABLE, DEFAULT_THRESHOLD,
    DEFAULT_TOP_K, EmbeddingConfig, EmbeddingProvider, IndexingConfig, SearchConfig, ServerConfig,
    VectorColumn, VectorStoreConfig,
};
pub use format::OutputFormat;
pub use record::{IndexRecord, RowOutcome};
pub use search::{AddRequest, SearchHit, SearchRequest, SearchResults};
pub use summary::{AbortKind, AbortReason, IndexSummary, SkippedRow};
