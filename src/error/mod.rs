//! Error types and Result aliases for docsearch.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using docsearch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for docsearch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Embedding pipeline error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Worker message protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Similarity search error.
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// Content tree error.
    #[error("content error: {0}")]
    Content(#[from] ContentError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Embedding-specific errors.
///
/// Cloneable so a single failed load can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    /// ONNX runtime error.
    #[error("ONNX runtime error: {0}")]
    Runtime(String),

    /// Model loading error.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Tokenization error.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// Inference failed for a single request.
    #[error("inference error: {0}")]
    Inference(String),

    /// The worker thread is gone.
    #[error("worker closed: {0}")]
    WorkerClosed(String),
}

/// Inbound message validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Message has no `text` field.
    #[error("message is missing the 'text' field")]
    MissingText,

    /// `text` is present but blank.
    #[error("'text' must be a non-empty string")]
    EmptyText,

    /// Message is not an object or `text` is not a string.
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Similarity search errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// Query and corpus vectors have different lengths.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The embedding worker could not answer.
    #[error("search temporarily unavailable: {0}")]
    Unavailable(String),

    /// The corpus index has no entries.
    #[error("corpus index is empty")]
    EmptyCorpus,
}

/// Content tree errors.
#[derive(Error, Debug)]
pub enum ContentError {
    /// A document could not be parsed.
    #[error("failed to parse '{path}': {reason}")]
    Parse { path: String, reason: String },

    /// No document exists for the slug.
    #[error("document not found: '{0}'")]
    NotFound(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl ContentError {
    /// Create a parse error for a file.
    pub fn parse(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests;
