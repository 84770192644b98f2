use serde::{Deserialize, Serialize};

use super::record::RowOutcome;

/// Why an indexing run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortKind {
    Embedding,
    StoreConnection,
}

impl std::fmt::Display for AbortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortKind::Embedding => write!(f, "embedding failure"),
            AbortKind::StoreConnection => write!(f, "store connection failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortReason {
    pub kind: AbortKind,
    /// 1-based number of the batch that was being processed
    pub batch: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub key: String,
    pub reason: String,
}

/// Outcome of a full indexing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSummary {
    pub source: String,
    pub total_lines: usize,
    pub batches_total: usize,
    pub batches_completed: usize,
    pub records_indexed: usize,
    pub records_skipped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped: Vec<SkippedRow>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub aborted: Option<AbortReason>,
    pub started_at: String,
    pub duration_ms: u64,
}

impl IndexSummary {
    pub fn new(source: impl Into<String>, total_lines: usize, batches_total: usize) -> Self {
        Self {
            source: source.into(),
            total_lines,
            batches_total,
            started_at: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        }
    }

    /// Folds the row outcomes of a committed batch into the totals.
    pub fn record_batch(&mut self, outcomes: Vec<RowOutcome>) {
        for outcome in outcomes {
            match outcome {
                RowOutcome::Written { .. } => self.records_indexed += 1,
                RowOutcome::Skipped { key, reason } => {
                    self.records_skipped += 1;
                    self.skipped.push(SkippedRow { key, reason });
                }
            }
        }
        self.batches_completed += 1;
    }

    pub fn abort(&mut self, kind: AbortKind, batch: usize, message: impl Into<String>) {
        self.aborted = Some(AbortReason {
            kind,
            batch,
            message: message.into(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_batch_counts() {
        let mut summary = IndexSummary::new("data.txt", 5, 1);
        summary.record_batch(vec![
            RowOutcome::Written {
                key: "doc_0".to_string(),
            },
            RowOutcome::Skipped {
                key: "doc_1".to_string(),
                reason: "bad row".to_string(),
            },
            RowOutcome::Written {
                key: "doc_2".to_string(),
            },
        ]);
        assert_eq!(summary.records_indexed, 2);
        assert_eq!(summary.records_skipped, 1);
        assert_eq!(summary.skipped[0].key, "doc_1");
        assert_eq!(summary.batches_completed, 1);
        assert!(summary.is_complete());
    }

    #[test]
    fn test_abort_marks_incomplete() {
        let mut summary = IndexSummary::new("data.txt", 10, 2);
        summary.abort(AbortKind::Embedding, 2, "model crashed");
        assert!(!summary.is_complete());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["aborted"]["kind"], "embedding");
        assert_eq!(json["aborted"]["batch"], 2);
    }
}
