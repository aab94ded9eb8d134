//! Deterministic hashing embedder.
//!
//! Each lowercased word maps to a pseudo-random vector derived from its
//! blake3 digest; a text embeds as the pooled word vectors. Texts sharing
//! words land close together, which is enough for offline runs and tests.

use std::sync::Arc;

use ndarray::Array2;

use super::model::EMBEDDING_DIM;
use super::pipeline::{l2_normalize, mean_pool, ExtractOptions, FeatureExtractor, PipelineFactory};
use super::progress::LoadProgress;
use crate::error::EmbeddingError;

/// Model id reported by the placeholder backend.
pub const PLACEHOLDER_MODEL_ID: &str = "placeholder/hashing";

/// Hashing feature extractor.
#[derive(Debug, Clone)]
pub struct PlaceholderPipeline {
    dimension: usize,
}

impl PlaceholderPipeline {
    /// Create an extractor producing vectors of `dimension` floats.
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for PlaceholderPipeline {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl FeatureExtractor for PlaceholderPipeline {
    fn extract(&self, text: &str, options: ExtractOptions) -> Result<Vec<f32>, EmbeddingError> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        if words.is_empty() {
            return Err(EmbeddingError::Inference("no tokens to embed".to_string()));
        }

        let mut hidden = Vec::with_capacity(words.len() * self.dimension);
        for word in &words {
            hidden.extend(word_vector(word, self.dimension));
        }

        let hidden = Array2::from_shape_vec((words.len(), self.dimension), hidden)
            .map_err(|e| EmbeddingError::Inference(format!("bad token matrix: {e}")))?;
        let mask = vec![1i64; words.len()];

        let mut pooled = mean_pool(hidden.view(), &mask);
        if options.normalize {
            l2_normalize(&mut pooled);
        }
        Ok(pooled)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Factory for [`PlaceholderPipeline`].
#[derive(Debug, Clone)]
pub struct PlaceholderPipelineFactory {
    dimension: usize,
}

impl PlaceholderPipelineFactory {
    /// Create a factory producing vectors of `dimension` floats.
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for PlaceholderPipelineFactory {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl PipelineFactory for PlaceholderPipelineFactory {
    fn model_id(&self) -> &str {
        PLACEHOLDER_MODEL_ID
    }

    fn create(
        &self,
        progress: &dyn Fn(LoadProgress),
    ) -> Result<Arc<dyn FeatureExtractor>, EmbeddingError> {
        progress(LoadProgress::ready(PLACEHOLDER_MODEL_ID));
        Ok(Arc::new(PlaceholderPipeline::new(self.dimension)))
    }
}

/// Pseudo-random vector in [-1, 1) seeded from the word's digest.
#[allow(clippy::cast_precision_loss)]
fn word_vector(word: &str, dimension: usize) -> impl Iterator<Item = f32> {
    let digest = blake3::hash(word.as_bytes());
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest.as_bytes()[..8]);
    let mut seed = u64::from_le_bytes(seed_bytes);

    (0..dimension).map(move |_| {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        (((seed >> 33) as f32) / (u32::MAX as f32)).mul_add(4.0, -1.0)
    })
}
