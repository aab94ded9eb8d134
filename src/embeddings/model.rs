//! ONNX embedding model management.
//!
//! Loads a sentence-embedding model and its tokenizer from a local model
//! directory and runs feature extraction with ONNX Runtime.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{ArrayView3, Axis};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::builder::SessionBuilder;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use tokenizers::Tokenizer;

use super::pipeline::{l2_normalize, mean_pool, ExtractOptions, FeatureExtractor, PipelineFactory};
use super::progress::LoadProgress;
use crate::error::EmbeddingError;

/// ONNX graph file inside a model directory.
pub const MODEL_FILE: &str = "model.onnx";

/// Tokenizer file inside a model directory.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Embedding dimension for gte-small.
pub const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length for the model.
pub const MAX_SEQ_LENGTH: usize = 512;

/// Read granularity for progress reporting.
const READ_CHUNK_BYTES: usize = 1 << 20;

/// ONNX feature-extraction pipeline.
pub struct OnnxPipeline {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model_dir: PathBuf,
    uses_token_type_ids: bool,
    dimension: usize,
}

impl OnnxPipeline {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if either file is missing or cannot be loaded.
    pub fn load(
        model_dir: impl AsRef<Path>,
        name: &str,
        progress: &dyn Fn(LoadProgress),
    ) -> Result<Self, EmbeddingError> {
        let model_dir = model_dir.as_ref().to_path_buf();

        tracing::info!(path = %model_dir.display(), "Loading ONNX embedding model");

        let tokenizer_bytes = read_with_progress(&model_dir, TOKENIZER_FILE, name, progress)?;
        let mut tokenizer = Tokenizer::from_bytes(&tokenizer_bytes)
            .map_err(|e| EmbeddingError::Tokenization(format!("failed to load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::Tokenization(format!("failed to set truncation: {e}")))?;

        let model_bytes = read_with_progress(&model_dir, MODEL_FILE, name, progress)?;
        let session = SessionBuilder::new()
            .map_err(|e| EmbeddingError::Runtime(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbeddingError::Runtime(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(1)
            .map_err(|e| EmbeddingError::Runtime(format!("failed to set threads: {e}")))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| EmbeddingError::ModelLoad(format!("failed to load model: {e}")))?;

        let uses_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        tracing::info!(
            path = %model_dir.display(),
            inputs = session.inputs().len(),
            outputs = session.outputs().len(),
            uses_token_type_ids,
            "Model loaded successfully"
        );

        let mut pipeline = Self {
            session: Mutex::new(session),
            tokenizer,
            model_dir,
            uses_token_type_ids,
            dimension: 0,
        };
        pipeline.dimension = pipeline.extract("dimension probe", ExtractOptions::SEARCH)?.len();

        progress(LoadProgress::ready(name));
        Ok(pipeline)
    }

    /// Get the model directory.
    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }
}

impl FeatureExtractor for OnnxPipeline {
    fn extract(&self, text: &str, options: ExtractOptions) -> Result<Vec<f32>, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::Tokenization(format!("failed to tokenize: {e}")))?;

        let len = encoding.get_ids().len().min(MAX_SEQ_LENGTH);
        let widen = |values: &[u32]| -> Vec<i64> {
            values.iter().take(len).map(|&v| i64::from(v)).collect()
        };
        let input_ids = widen(encoding.get_ids());
        let attention_mask = widen(encoding.get_attention_mask());
        let token_type_ids = widen(encoding.get_type_ids());

        let tensor = |name: &str, data: Vec<i64>| {
            Tensor::from_array(([1usize, len], data))
                .map_err(|e| EmbeddingError::Runtime(format!("failed to create {name}: {e}")))
        };
        let input_ids_tensor = tensor("input_ids", input_ids)?;
        let attention_tensor = tensor("attention_mask", attention_mask.clone())?;

        let mut session = self.session.lock();
        let outputs = if self.uses_token_type_ids {
            let token_type_tensor = tensor("token_type_ids", token_type_ids)?;
            session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_tensor,
                "token_type_ids" => token_type_tensor,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_tensor,
            ])
        }
        .map_err(|e| EmbeddingError::Inference(format!("session run failed: {e}")))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::Inference(format!("failed to read output: {e}")))?;

        let dims: Vec<usize> = shape
            .iter()
            .map(|&d| usize::try_from(d).unwrap_or(0))
            .collect();
        let &[batch, seq_len, hidden] = dims.as_slice() else {
            return Err(EmbeddingError::Inference(format!(
                "expected [batch, seq, hidden] output, got {dims:?}"
            )));
        };

        let hidden_states = ArrayView3::from_shape((batch, seq_len, hidden), data)
            .map_err(|e| EmbeddingError::Inference(format!("bad output shape: {e}")))?;
        let mut pooled = mean_pool(hidden_states.index_axis(Axis(0), 0), &attention_mask);
        drop(outputs);
        drop(session);

        if options.normalize {
            l2_normalize(&mut pooled);
        }
        Ok(pooled)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

impl std::fmt::Debug for OnnxPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPipeline")
            .field("model_dir", &self.model_dir)
            .field("dimension", &self.dimension)
            .field("session", &"<Mutex<Session>>")
            .finish_non_exhaustive()
    }
}

/// Builds [`OnnxPipeline`]s from `{model_dir}/{model_id}`.
#[derive(Debug, Clone)]
pub struct OnnxPipelineFactory {
    model_path: PathBuf,
    model_id: String,
}

impl OnnxPipelineFactory {
    /// Create a factory for a model directory.
    #[must_use]
    pub fn new(model_path: impl Into<PathBuf>, model_id: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            model_id: model_id.into(),
        }
    }
}

impl PipelineFactory for OnnxPipelineFactory {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn create(
        &self,
        progress: &dyn Fn(LoadProgress),
    ) -> Result<Arc<dyn FeatureExtractor>, EmbeddingError> {
        let pipeline = OnnxPipeline::load(&self.model_path, &self.model_id, progress)?;
        Ok(Arc::new(pipeline))
    }
}

/// Read a model file in chunks, emitting progress for each.
fn read_with_progress(
    model_dir: &Path,
    file: &str,
    name: &str,
    progress: &dyn Fn(LoadProgress),
) -> Result<Vec<u8>, EmbeddingError> {
    let path = model_dir.join(file);
    progress(LoadProgress::initiate(name, file));

    if !path.exists() {
        return Err(EmbeddingError::ModelLoad(format!(
            "model file not found: {}",
            path.display()
        )));
    }

    let open_err = |e: std::io::Error| {
        EmbeddingError::ModelLoad(format!("failed to read {}: {e}", path.display()))
    };
    let mut reader = std::fs::File::open(&path).map_err(open_err)?;
    let total = reader.metadata().map_err(open_err)?.len();

    progress(LoadProgress::download(name, file));

    let mut bytes = Vec::with_capacity(usize::try_from(total).unwrap_or(0));
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let n = reader.read(&mut buf).map_err(open_err)?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&buf[..n]);
        progress(LoadProgress::progress(name, file, bytes.len() as u64, total));
    }

    progress(LoadProgress::done(name, file));
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::ProgressStatus;
    use std::cell::RefCell;

    #[test]
    fn test_constants() {
        assert_eq!(EMBEDDING_DIM, 384);
        assert_eq!(MAX_SEQ_LENGTH, 512);
        assert!(MODEL_FILE.ends_with(".onnx"));
    }

    #[test]
    fn test_load_nonexistent_model() {
        let result = OnnxPipeline::load("/nonexistent/model", "missing", &|_| {});
        let err = result.unwrap_err();
        assert!(matches!(err, EmbeddingError::ModelLoad(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_factory_reports_missing_files() {
        let factory = OnnxPipelineFactory::new("/nonexistent/model", "missing/model");
        assert_eq!(factory.model_id(), "missing/model");
        assert_eq!(factory.task(), "feature-extraction");
        assert!(factory.create(&|_| {}).is_err());
    }

    #[test]
    fn test_read_with_progress() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), b"{\"x\": 1}").unwrap();

        let events = RefCell::new(Vec::new());
        let bytes = read_with_progress(dir.path(), "tokenizer.json", "m", &|p| {
            events.borrow_mut().push(p);
        })
        .unwrap();

        assert_eq!(bytes, b"{\"x\": 1}");
        let statuses: Vec<_> = events.borrow().iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                ProgressStatus::Initiate,
                ProgressStatus::Download,
                ProgressStatus::Progress,
                ProgressStatus::Done,
            ]
        );
        let last_progress = &events.borrow()[2];
        assert_eq!(last_progress.loaded, Some(8));
        assert_eq!(last_progress.progress, Some(100.0));
    }
}
