//! Search front end.
//!
//! Embeds queries on the background worker and ranks them against a
//! loaded corpus index. Worker failures surface as
//! [`SearchError::Unavailable`] so callers can show a degraded state.

use tracing::Instrument;

use super::index::CorpusIndex;
use super::ranker::{rank, SearchHit, SearchOptions};
use crate::embeddings::{EmbeddingWorker, LoadProgress};
use crate::error::SearchError;
use crate::observability::spans;
use crate::{Error, Result};

/// Semantic search over a corpus index.
pub struct SemanticSearch {
    worker: EmbeddingWorker,
    index: CorpusIndex,
    defaults: SearchOptions,
}

impl SemanticSearch {
    /// Create a search front end.
    #[must_use]
    pub fn new(worker: EmbeddingWorker, index: CorpusIndex, defaults: SearchOptions) -> Self {
        Self {
            worker,
            index,
            defaults,
        }
    }

    /// Search with the default options.
    ///
    /// # Errors
    ///
    /// See [`SemanticSearch::search_with`].
    pub async fn search(
        &mut self,
        query: &str,
        on_progress: impl FnMut(&LoadProgress),
    ) -> Result<Vec<SearchHit>> {
        let options = self.defaults.clone();
        self.search_with(query, &options, on_progress).await
    }

    /// Search with explicit options.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::EmptyCorpus` for an empty index,
    /// `SearchError::Unavailable` if the worker cannot embed the query, and
    /// `SearchError::DimensionMismatch` if the model does not match the index.
    pub async fn search_with(
        &mut self,
        query: &str,
        options: &SearchOptions,
        on_progress: impl FnMut(&LoadProgress),
    ) -> Result<Vec<SearchHit>> {
        let span = spans::search_span(query, options.limit);
        self.embed_and_rank(query, options, on_progress)
            .instrument(span)
            .await
    }

    async fn embed_and_rank(
        &mut self,
        query: &str,
        options: &SearchOptions,
        on_progress: impl FnMut(&LoadProgress),
    ) -> Result<Vec<SearchHit>> {
        if self.index.is_empty() {
            return Err(SearchError::EmptyCorpus.into());
        }

        let vector = match self.worker.embed(query, on_progress).await {
            Ok(vector) => vector,
            Err(Error::Protocol(e)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Search unavailable");
                return Err(SearchError::Unavailable(e.to_string()).into());
            }
        };

        Ok(rank(&vector, &self.index, options)?)
    }

    /// The loaded corpus.
    #[must_use]
    pub const fn index(&self) -> &CorpusIndex {
        &self.index
    }

    /// Shut down the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread panicked.
    pub async fn shutdown(self) -> Result<()> {
        self.worker.terminate().await
    }
}

impl std::fmt::Debug for SemanticSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticSearch")
            .field("model_id", &self.index.model_id())
            .field("entries", &self.index.len())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
