//! Similarity search and single-document writes over the indexed table.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{EmbeddingError, SearchError};
use crate::models::{IndexRecord, SearchConfig, SearchResults};
use crate::services::embedding::Embedder;
use crate::services::vector_store::VectorStore;

/// Embeds queries and documents with the same model used for indexing.
#[derive(Clone)]
pub struct Searcher {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    defaults: SearchConfig,
    source_label: String,
}

impl Searcher {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        defaults: SearchConfig,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            defaults,
            source_label: source_label.into(),
        }
    }

    /// Rank stored records against `query`. `None` falls back to the
    /// configured `top_k` / `threshold`.
    pub async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<SearchResults, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let top_k = top_k.unwrap_or(self.defaults.top_k);
        if top_k == 0 {
            return Err(SearchError::InvalidTopK);
        }
        let threshold = threshold.unwrap_or(self.defaults.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SearchError::InvalidThreshold(threshold));
        }

        let started = Instant::now();
        let vector = self.embed_one(query).await?;
        let hits = self.store.search(&vector, top_k, threshold).await?;
        debug!(query, top_k, threshold, hits = hits.len(), "search completed");

        Ok(SearchResults {
            query: query.to_string(),
            top_k,
            threshold,
            hits,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Embed `text` and upsert it under `key`.
    ///
    /// The caller's metadata is stored as given; `source` and `text_content`
    /// are filled in when absent so the record reads like an indexed line.
    pub async fn add(
        &self,
        key: &str,
        text: &str,
        mut metadata: Map<String, Value>,
    ) -> Result<(), SearchError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(SearchError::EmptyKey);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SearchError::EmptyText);
        }

        let vector = self.embed_one(text).await?;
        metadata
            .entry("source")
            .or_insert_with(|| Value::String(self.source_label.clone()));
        metadata
            .entry("text_content")
            .or_insert_with(|| Value::String(text.to_string()));

        let record = IndexRecord {
            key: key.to_string(),
            vector,
            metadata,
        };
        self.store.upsert_one(&record).await?;
        debug!(key, "document added");
        Ok(())
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embedder.embed(&[text.to_string()]).await?;
        let vector = vectors.pop().filter(|_| vectors.is_empty()).ok_or_else(|| {
            EmbeddingError::InvalidResponse("expected exactly one embedding".to_string())
        })?;
        if vector.len() != self.embedder.dimension() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} dimensions, got {}",
                self.embedder.dimension(),
                vector.len()
            )));
        }
        Ok(vector)
    }
}
