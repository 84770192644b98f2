use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One stored record ranked against a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: String,
    /// Cosine similarity, `1 - cosine distance`
    pub similarity: f32,
    pub metadata: Map<String, Value>,
}

impl SearchHit {
    /// The indexed line, when the record carries one.
    pub fn text(&self) -> Option<&str> {
        self.metadata.get("text_content").and_then(Value::as_str)
    }
}

/// Search results with query metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub top_k: usize,
    pub threshold: f32,
    pub hits: Vec<SearchHit>,
    pub duration_ms: u64,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

/// Body of `POST /api/add`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddRequest {
    pub key: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_text() {
        let hit: SearchHit = serde_json::from_value(json!({
            "key": "doc_4",
            "similarity": 0.91,
            "metadata": { "source": "cli_index", "text_content": "rust ownership" }
        }))
        .unwrap();
        assert_eq!(hit.text(), Some("rust ownership"));

        let bare = SearchHit {
            metadata: Map::new(),
            ..hit
        };
        assert_eq!(bare.text(), None);
    }

    #[test]
    fn test_search_request_optional_fields() {
        let request: SearchRequest = serde_json::from_str(r#"{"query":"hello"}"#).unwrap();
        assert_eq!(request.query, "hello");
        assert!(request.top_k.is_none());
        assert!(request.threshold.is_none());
    }

    #[test]
    fn test_add_request_defaults_metadata() {
        let request: AddRequest =
            serde_json::from_str(r#"{"key":"faq_1","text":"How do I reset?"}"#).unwrap();
        assert!(request.metadata.is_empty());
    }
}
