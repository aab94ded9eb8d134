//! Sentence embeddings for semantic search.
//!
//! This module provides:
//! - A feature-extraction pipeline abstraction with ONNX and hashing backends
//! - A loader that builds the pipeline once and shares the in-flight load
//! - A single background worker speaking a small message protocol

mod loader;
mod model;
mod pipeline;
mod placeholder;
mod progress;
mod protocol;
mod worker;

use std::sync::Arc;

pub use loader::{LoadRetryPolicy, PipelineLoader, ProgressCallback};
pub use model::{
    OnnxPipeline, OnnxPipelineFactory, EMBEDDING_DIM, MAX_SEQ_LENGTH, MODEL_FILE, TOKENIZER_FILE,
};
pub use pipeline::{
    l2_normalize, mean_pool, ExtractOptions, FeatureExtractor, PipelineFactory, PipelineHandle,
};
pub use placeholder::{PlaceholderPipeline, PlaceholderPipelineFactory, PLACEHOLDER_MODEL_ID};
pub use progress::{LoadEvent, LoadProgress, ProgressStatus};
pub use protocol::{EmbeddingRequest, ErrorKind, OutboundMessage};
pub use worker::EmbeddingWorker;

use crate::config::{Backend, Config};

/// Pipeline task name.
pub const FEATURE_EXTRACTION: &str = "feature-extraction";

/// Default embedding model.
pub const DEFAULT_MODEL_ID: &str = "sauravpanda/gte-small-onnx";

/// Build the pipeline factory selected by the configuration.
#[must_use]
pub fn factory_for(config: &Config) -> Arc<dyn PipelineFactory> {
    match config.backend {
        Backend::Onnx => Arc::new(OnnxPipelineFactory::new(
            config.model_path(),
            config.model_id.clone(),
        )),
        Backend::Placeholder => Arc::new(PlaceholderPipelineFactory::default()),
    }
}

/// Build a loader for the configured backend and retry policy.
#[must_use]
pub fn loader_for(config: &Config) -> Arc<PipelineLoader> {
    Arc::new(PipelineLoader::new(factory_for(config), config.retry_policy))
}

/// Spawn a worker for the configured backend.
///
/// # Errors
///
/// Returns an error if the worker thread cannot be started.
pub fn spawn_worker(config: &Config) -> crate::Result<EmbeddingWorker> {
    EmbeddingWorker::spawn(loader_for(config), config.queue_capacity)
}
