use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::{Axis, Ix2, Ix3};
use ort::session::{Session, SessionOutputs, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams, TruncationStrategy};

use crate::error::{EmbeddingError, ModelError};
use crate::models::EmbeddingConfig;
use crate::services::embedding::Embedder;

/// Sentence encoder backed by a local ONNX export and its `tokenizer.json`.
///
/// Models emitting `[batch, seq, hidden]` are pooled on the first (CLS) token;
/// models emitting `[batch, hidden]` are used as-is.
#[derive(Clone)]
pub struct OnnxEmbedder {
    model: Arc<OnnxModel>,
}

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    input_count: usize,
    dimension: usize,
    normalize: bool,
}

impl OnnxEmbedder {
    pub fn load(config: &EmbeddingConfig) -> Result<Self, ModelError> {
        Self::load_from_dir(config, &config.model_dir)
    }

    pub fn load_from_dir(config: &EmbeddingConfig, model_dir: &Path) -> Result<Self, ModelError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(ModelError::NotFound(format!(
                "model not found: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .with_intra_threads(num_cpus())
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?;

        let input_count = session.inputs.len();
        if !(1..=3).contains(&input_count) {
            return Err(ModelError::LoadError(format!(
                "unsupported model signature: {} inputs",
                input_count
            )));
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        // Truncate to the model's window so long lines cannot blow up memory
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_tokens as usize,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        // Pad to the longest sequence in each batch
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(
            model = %model_path.display(),
            inputs = input_count,
            dimension = config.dimension,
            "ONNX embedding model loaded"
        );

        Ok(Self {
            model: Arc::new(OnnxModel {
                session: Mutex::new(session),
                tokenizer,
                input_count,
                dimension: config.dimension as usize,
                normalize: config.normalize,
            }),
        })
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || model.embed(texts))
            .await
            .map_err(|e| ModelError::InferenceError(format!("inference task failed: {}", e)))??;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.model.dimension
    }
}

impl OnnxModel {
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ModelError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = encodings.len();

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * max_len;
            for (j, ((&id, &m), &t)) in encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids())
                .enumerate()
            {
                input_ids[row + j] = id as i64;
                attention_mask[row + j] = m as i64;
                token_type_ids[row + j] = t as i64;
            }
        }

        let shape = [batch_size, max_len];
        let input_ids = Tensor::from_array((shape, input_ids))
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::InferenceError("session lock poisoned".to_string()))?;

        let outputs = match self.input_count {
            1 => session.run(ort::inputs![input_ids]),
            2 => {
                let attention_mask = Tensor::from_array((shape, attention_mask))
                    .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;
                session.run(ort::inputs![input_ids, attention_mask])
            }
            _ => {
                let attention_mask = Tensor::from_array((shape, attention_mask))
                    .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;
                let token_type_ids = Tensor::from_array((shape, token_type_ids))
                    .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;
                session.run(ort::inputs![input_ids, attention_mask, token_type_ids])
            }
        }
        .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        // [batch, seq, hidden] is pooled on the CLS token
        let pooled = pool_outputs(&outputs)?;

        pooled
            .into_iter()
            .map(|v| {
                if v.len() != self.dimension {
                    return Err(ModelError::InferenceError(format!(
                        "model produced {} dimensions, expected {}",
                        v.len(),
                        self.dimension
                    )));
                }
                Ok(if self.normalize { normalize(&v) } else { v })
            })
            .collect()
    }
}

fn pool_outputs(outputs: &SessionOutputs) -> Result<Vec<Vec<f32>>, ModelError> {
    let output_array = outputs[0]
        .try_extract_array::<f32>()
        .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

    match output_array.ndim() {
        3 => {
            let hidden = output_array
                .into_dimensionality::<Ix3>()
                .map_err(|e| ModelError::InferenceError(e.to_string()))?;
            Ok(hidden
                .index_axis(Axis(1), 0)
                .outer_iter()
                .map(|row| row.to_vec())
                .collect())
        }
        2 => {
            let pooled = output_array
                .into_dimensionality::<Ix2>()
                .map_err(|e| ModelError::InferenceError(e.to_string()))?;
            Ok(pooled.outer_iter().map(|row| row.to_vec()).collect())
        }
        _ => Err(ModelError::InferenceError(format!(
            "unexpected output shape: {:?}",
            output_array.shape()
        ))),
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_missing_model_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig::default();
        let result = OnnxEmbedder::load_from_dir(&config, dir.path());
        assert!(matches!(result, Err(ModelError::NotFound(_))));
    }
}
