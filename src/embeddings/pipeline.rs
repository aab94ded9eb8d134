//! Feature-extraction pipeline abstractions.
//!
//! A pipeline maps text to a single vector. Backends implement
//! [`FeatureExtractor`]; [`PipelineFactory`] is what the loader calls to
//! build one.

use std::sync::Arc;

use ndarray::{ArrayView2, Axis};

use super::progress::LoadProgress;
use super::FEATURE_EXTRACTION;
use crate::error::EmbeddingError;

/// Options passed to a pipeline call.
///
/// Token vectors are always mean pooled over attended tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Scale the pooled vector to unit L2 length.
    pub normalize: bool,
}

impl ExtractOptions {
    /// Mean pooling with L2 normalization. Used for every search embedding.
    pub const SEARCH: Self = Self { normalize: true };
}

/// A loaded inference procedure mapping text to a vector.
pub trait FeatureExtractor: Send + Sync {
    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization or inference fails.
    fn extract(&self, text: &str, options: ExtractOptions) -> Result<Vec<f32>, EmbeddingError>;

    /// Length of the vectors this pipeline produces.
    fn dimension(&self) -> usize;
}

/// Builds a pipeline. Called at most once per successful load.
pub trait PipelineFactory: Send + Sync {
    /// Pipeline task name.
    fn task(&self) -> &str {
        FEATURE_EXTRACTION
    }

    /// Model identifier used in logs and progress events.
    fn model_id(&self) -> &str;

    /// Load the model, reporting progress as it goes.
    ///
    /// Runs on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    fn create(
        &self,
        progress: &dyn Fn(LoadProgress),
    ) -> Result<Arc<dyn FeatureExtractor>, EmbeddingError>;
}

/// Shared reference to a loaded pipeline.
///
/// Cheap to clone. Always embeds with [`ExtractOptions::SEARCH`].
#[derive(Clone)]
pub struct PipelineHandle {
    extractor: Arc<dyn FeatureExtractor>,
    model_id: Arc<str>,
}

impl PipelineHandle {
    /// Wrap a loaded extractor.
    #[must_use]
    pub fn new(extractor: Arc<dyn FeatureExtractor>, model_id: impl Into<Arc<str>>) -> Self {
        Self {
            extractor,
            model_id: model_id.into(),
        }
    }

    /// Compute a mean-pooled, L2-normalized embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying pipeline fails.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.extractor.extract(text, ExtractOptions::SEARCH)
    }

    /// Embedding dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.extractor.dimension()
    }

    /// Model identifier.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension())
            .finish_non_exhaustive()
    }
}

/// Mean of the token vectors (`[seq_len, hidden]`) whose mask is 1.
///
/// An all-zero mask yields a zero vector.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_pool(hidden: ArrayView2<'_, f32>, attention_mask: &[i64]) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden.len_of(Axis(1))];
    let mut count = 0usize;

    for (row, &mask) in hidden.outer_iter().zip(attention_mask) {
        if mask == 1 {
            for (s, v) in sum.iter_mut().zip(row.iter()) {
                *s += v;
            }
            count += 1;
        }
    }

    if count > 0 {
        let count = count as f32;
        for s in &mut sum {
            *s /= count;
        }
    }
    sum
}

/// Scale a vector to unit L2 length in place. Zero vectors are left alone.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_mean_pool_respects_mask() {
        let hidden = Array2::from_shape_vec(
            (3, 3),
            vec![
                1.0, 2.0, 3.0, // token 0
                4.0, 5.0, 6.0, // token 1
                7.0, 8.0, 9.0, // token 2
            ],
        )
        .unwrap();

        let pooled = mean_pool(hidden.view(), &[1, 1, 0]);
        assert_eq!(pooled, vec![2.5, 3.5, 4.5]);
    }

    #[test]
    fn test_mean_pool_empty_mask() {
        let hidden = Array2::from_shape_vec((1, 3), vec![1.0, 2.0, 3.0]).unwrap();
        let pooled = mean_pool(hidden.view(), &[0]);
        assert!(pooled.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn test_search_options_are_fixed() {
        assert!(ExtractOptions::SEARCH.normalize);
    }
}
