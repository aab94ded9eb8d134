//! Configuration settings and validation.

use crate::embeddings::{LoadRetryPolicy, DEFAULT_MODEL_ID};
use crate::{Error, Result};
use std::path::PathBuf;

/// Which embedding pipeline backs the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    /// ONNX Runtime with a local model directory.
    #[default]
    Onnx,
    /// Deterministic hashing embedder, no model files required.
    Placeholder,
}

/// Main configuration for docsearch.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one sub-directory per model id.
    pub model_dir: PathBuf,

    /// Model identifier, e.g. `sauravpanda/gte-small-onnx`.
    pub model_id: String,

    /// Embedding backend.
    pub backend: Backend,

    /// What the loader does after a failed model load.
    pub retry_policy: LoadRetryPolicy,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Capacity of the worker's inbound queue.
    pub queue_capacity: usize,

    /// Default number of search hits.
    pub top_k: usize,

    /// Default minimum similarity score.
    pub min_score: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./models"),
            model_id: DEFAULT_MODEL_ID.to_string(),
            backend: Backend::default(),
            retry_policy: LoadRetryPolicy::default(),
            log_level: "info".to_string(),
            queue_capacity: 64,
            top_k: 5,
            min_score: 0.0,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.model_id.trim().is_empty() {
            return Err(Error::config("model_id cannot be empty"));
        }

        if self.model_id.split('/').any(|part| part == "..") {
            return Err(Error::config("model_id cannot contain '..'"));
        }

        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity cannot be 0"));
        }

        if self.top_k == 0 {
            return Err(Error::config("top_k cannot be 0"));
        }

        if !(-1.0..=1.0).contains(&self.min_score) {
            return Err(Error::config("min_score must be within [-1.0, 1.0]"));
        }

        Ok(())
    }

    /// Directory the ONNX backend reads `model.onnx` and `tokenizer.json` from.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_id)
    }
}
