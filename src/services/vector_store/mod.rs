//! Vector store abstraction layer.
//!
//! The indexer writes through a [`BatchTransaction`]. All upserts of a batch
//! share one transaction that is committed or rolled back as a unit.

mod postgres;

pub use postgres::PgVectorStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{IndexRecord, SearchHit, VectorStoreConfig};

/// Table information.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub records_count: u64,
}

/// Abstract trait for vector store operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Get information about the target table.
    /// Returns None if the table doesn't exist.
    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Open a transaction scoped to one batch.
    async fn begin_batch(&self) -> Result<Box<dyn BatchTransaction>, VectorStoreError>;

    /// Up to `top_k` records by cosine similarity to `query`, best first,
    /// keeping only those with similarity >= `threshold`.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, VectorStoreError>;

    /// Upsert a single record in its own transaction.
    async fn upsert_one(&self, record: &IndexRecord) -> Result<(), VectorStoreError> {
        let mut tx = self.begin_batch().await?;
        if let Err(e) = tx.upsert(record).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed upsert failed");
            }
            return Err(e);
        }
        tx.commit().await
    }
}

/// A batch-scoped write transaction.
///
/// `upsert` returning [`VectorStoreError::RowWrite`] leaves the transaction
/// usable; any other error means it must be rolled back.
#[async_trait]
pub trait BatchTransaction: Send {
    async fn upsert(&mut self, record: &IndexRecord) -> Result<(), VectorStoreError>;

    /// Apply every row whose upsert succeeded.
    async fn commit(self: Box<Self>) -> Result<(), VectorStoreError>;

    /// Discard every row written in this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), VectorStoreError>;
}

/// Connect the PostgreSQL backend described by `config`.
pub async fn create_backend(
    config: &VectorStoreConfig,
) -> Result<Box<dyn VectorStore>, VectorStoreError> {
    let backend = PgVectorStore::connect(config).await?;
    Ok(Box::new(backend))
}

/// Connect a backend shared by concurrent request handlers.
pub async fn create_shared_backend(
    config: &VectorStoreConfig,
    max_connections: u32,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    let backend = PgVectorStore::connect_with(config, max_connections).await?;
    Ok(Arc::new(backend))
}
