use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One embedded line, ready to upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub key: String,
    pub vector: Vec<f32>,
    pub metadata: Map<String, Value>,
}

impl IndexRecord {
    /// Key for the line at `line_index` (0-based, counted over the whole source).
    pub fn key_for(line_index: usize) -> String {
        format!("doc_{}", line_index)
    }

    pub fn new(line_index: usize, text: &str, vector: Vec<f32>, source: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::String(source.to_string()));
        metadata.insert(
            "text_content".to_string(),
            Value::String(text.trim().to_string()),
        );
        Self {
            key: Self::key_for(line_index),
            vector,
            metadata,
        }
    }

    /// Vector widened to the store's 8-byte float representation.
    pub fn vector_f64(&self) -> Vec<f64> {
        self.vector.iter().map(|&v| f64::from(v)).collect()
    }
}

/// Result of attempting a single upsert inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    Written { key: String },
    Skipped { key: String, reason: String },
}
