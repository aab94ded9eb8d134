//! Precomputed chunk embeddings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::content::{chunk_document, Chunker, Document, DocumentChunk};
use crate::embeddings::PipelineHandle;
use crate::error::SearchError;
use crate::observability::spans;
use crate::Result;

/// A chunk and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Source chunk.
    pub chunk: DocumentChunk,
    /// Normalized embedding.
    pub vector: Vec<f32>,
}

impl IndexEntry {
    /// Pair a chunk with its vector.
    #[must_use]
    pub const fn new(chunk: DocumentChunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }
}

/// Corpus of chunk embeddings, all produced by one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusIndex {
    model_id: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl CorpusIndex {
    /// Create an index from existing entries.
    ///
    /// # Errors
    ///
    /// Returns an error if any vector's length differs from `dimension`.
    pub fn from_entries(
        model_id: impl Into<String>,
        dimension: usize,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        let index = Self {
            model_id: model_id.into(),
            dimension,
            entries,
        };
        index.validate()?;
        Ok(index)
    }

    /// Chunk and embed every document.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding any chunk fails.
    pub fn build<'a>(
        documents: impl IntoIterator<Item = &'a Document>,
        handle: &PipelineHandle,
        chunker: &Chunker,
    ) -> Result<Self> {
        let mut entries = Vec::new();

        for document in documents {
            let span = spans::index_span(&document.slug);
            let _guard = span.enter();

            let chunks = chunk_document(document, chunker);
            tracing::debug!(chunks = chunks.len(), "Embedding document");

            for chunk in chunks {
                let vector = handle.embed(&chunk.text)?;
                entries.push(IndexEntry::new(chunk, vector));
            }
        }

        tracing::info!(
            model = handle.model_id(),
            entries = entries.len(),
            "Corpus index built"
        );

        Self::from_entries(handle.model_id(), handle.dimension(), entries)
    }

    /// Read an index written by [`CorpusIndex::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or has vectors of
    /// the wrong length.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let index: Self = serde_json::from_str(&json)?;
        index.validate()?;

        tracing::info!(
            path = %path.as_ref().display(),
            model = %index.model_id,
            entries = index.entries.len(),
            "Corpus index loaded"
        );
        Ok(index)
    }

    /// Write the index as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Model that produced the vectors.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Vector length.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// All entries.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn validate(&self) -> std::result::Result<(), SearchError> {
        for entry in &self.entries {
            if entry.vector.len() != self.dimension {
                return Err(SearchError::DimensionMismatch {
                    expected: self.dimension,
                    got: entry.vector.len(),
                });
            }
        }
        Ok(())
    }
}
