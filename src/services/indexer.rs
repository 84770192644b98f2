//! Batch embedding indexer.
//!
//! Lines are embedded and upserted in fixed-size batches, in source order.
//! Each batch is one store transaction. A row that fails to write is skipped
//! and reported; an embedding failure or a lost connection ends the run.

use std::path::Path;
use std::time::Instant;

use indicatif::ProgressBar;
use tracing::{debug, error, info, warn};

use crate::error::{EmbeddingError, IndexError, VectorStoreError};
use crate::models::{AbortKind, IndexRecord, IndexSummary, IndexingConfig, RowOutcome};
use crate::services::embedding::Embedder;
use crate::services::vector_store::VectorStore;
use crate::utils::read_lines;

/// Receives `(batches_completed, batches_total)` after every commit.
pub trait IndexProgress: Send + Sync {
    fn batch_committed(&self, completed: usize, total: usize);
}

impl IndexProgress for () {
    fn batch_committed(&self, _completed: usize, _total: usize) {}
}

impl IndexProgress for ProgressBar {
    fn batch_committed(&self, completed: usize, total: usize) {
        self.set_length(total as u64);
        self.set_position(completed as u64);
    }
}

pub struct BatchIndexer<'a> {
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
    source_label: String,
}

impl<'a> BatchIndexer<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        store: &'a dyn VectorStore,
        config: &IndexingConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            source_label: config.source_label.clone(),
        }
    }

    /// Index a newline-delimited text file, one record per line.
    pub async fn index_file(
        &self,
        path: &Path,
        batch_size: usize,
        progress: &dyn IndexProgress,
    ) -> Result<IndexSummary, IndexError> {
        let lines = read_lines(path).map_err(|source| IndexError::SourceUnavailable {
            path: path.display().to_string(),
            source,
        })?;
        self.index(&path.display().to_string(), &lines, batch_size, progress)
            .await
    }

    /// Index `lines` in batches of at most `batch_size`.
    ///
    /// Only configuration errors are returned as `Err`. A run that stops early
    /// still yields a summary, with `aborted` set and every batch committed
    /// before the failure accounted for.
    pub async fn index(
        &self,
        source: &str,
        lines: &[String],
        batch_size: usize,
        progress: &dyn IndexProgress,
    ) -> Result<IndexSummary, IndexError> {
        if batch_size == 0 {
            return Err(IndexError::InvalidBatchSize);
        }

        let started = Instant::now();
        let batches_total = lines.len().div_ceil(batch_size);
        let mut summary = IndexSummary::new(source, lines.len(), batches_total);

        info!(
            source,
            lines = lines.len(),
            batch_size,
            batches = batches_total,
            "indexing started"
        );

        for (batch_index, texts) in lines.chunks(batch_size).enumerate() {
            let batch_number = batch_index + 1;
            let offset = batch_index * batch_size;

            match self.index_batch(offset, texts).await {
                Ok(outcomes) => {
                    summary.record_batch(outcomes);
                    progress.batch_committed(summary.batches_completed, batches_total);
                    info!(
                        "Indexed batch {}/{}",
                        summary.batches_completed, batches_total
                    );
                }
                Err(e) => {
                    let kind = abort_kind(&e);
                    error!(batch = batch_number, error = %e, "indexing aborted: {}", kind);
                    summary.abort(kind, batch_number, e.to_string());
                    break;
                }
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        if summary.is_complete() {
            info!(
                indexed = summary.records_indexed,
                skipped = summary.records_skipped,
                "indexing from '{}' completed",
                source
            );
        }
        Ok(summary)
    }

    async fn index_batch(
        &self,
        offset: usize,
        texts: &[String],
    ) -> Result<Vec<RowOutcome>, IndexError> {
        let vectors = self.embedder.embed(texts).await?;
        self.check_vectors(texts.len(), &vectors)?;

        let mut tx = self.store.begin_batch().await?;
        let mut outcomes = Vec::with_capacity(texts.len());

        for (i, (text, vector)) in texts.iter().zip(vectors).enumerate() {
            let record = IndexRecord::new(offset + i, text, vector, &self.source_label);
            match tx.upsert(&record).await {
                Ok(()) => outcomes.push(RowOutcome::Written { key: record.key }),
                Err(VectorStoreError::RowWrite { key, message }) => {
                    warn!(key = %key, error = %message, "database error during indexing, row skipped");
                    outcomes.push(RowOutcome::Skipped {
                        key,
                        reason: message,
                    });
                }
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "rollback after connection failure failed");
                    }
                    return Err(e.into());
                }
            }
        }

        tx.commit().await?;
        debug!(offset, rows = outcomes.len(), "batch committed");
        Ok(outcomes)
    }

    fn check_vectors(&self, expected: usize, vectors: &[Vec<f32>]) -> Result<(), EmbeddingError> {
        if vectors.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                expected,
                vectors.len()
            )));
        }
        let dimension = self.embedder.dimension();
        if let Some(v) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} dimensions, got {}",
                dimension,
                v.len()
            )));
        }
        Ok(())
    }
}

fn abort_kind(err: &IndexError) -> AbortKind {
    match err {
        IndexError::Embedding(_) => AbortKind::Embedding,
        _ => AbortKind::StoreConnection,
    }
}
