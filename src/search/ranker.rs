//! Cosine-similarity ranking.

use std::cmp::Ordering;

use serde::Serialize;

use super::index::CorpusIndex;
use crate::content::DocumentChunk;
use crate::error::SearchError;

/// Search options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results to return.
    pub limit: usize,

    /// Minimum cosine similarity (-1.0 to 1.0).
    pub min_score: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            min_score: 0.0,
        }
    }
}

impl SearchOptions {
    /// Create new search options with limit.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    /// Set minimum similarity score.
    #[must_use]
    pub fn with_min_score(mut self, score: f32) -> Self {
        self.min_score = score.clamp(-1.0, 1.0);
        self
    }
}

/// One ranked chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Matching chunk.
    pub chunk: DocumentChunk,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// Cosine similarity of two equal-length vectors. Zero vectors score 0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Rank the corpus against a query vector, best first.
///
/// # Errors
///
/// Returns an error if the query's dimension differs from the corpus.
pub fn rank(
    query: &[f32],
    index: &CorpusIndex,
    options: &SearchOptions,
) -> Result<Vec<SearchHit>, SearchError> {
    if query.len() != index.dimension() {
        return Err(SearchError::DimensionMismatch {
            expected: index.dimension(),
            got: query.len(),
        });
    }

    let mut scored: Vec<(usize, f32)> = index
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| (i, cosine_similarity(query, &entry.vector)))
        .filter(|(_, score)| *score >= options.min_score)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(options.limit);

    let hits: Vec<SearchHit> = scored
        .into_iter()
        .map(|(i, score)| SearchHit {
            chunk: index.entries()[i].chunk.clone(),
            score,
        })
        .collect();

    tracing::debug!(
        count = hits.len(),
        limit = options.limit,
        corpus = index.len(),
        "Ranking completed"
    );

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::IndexEntry;

    fn chunk(id: &str) -> DocumentChunk {
        DocumentChunk {
            id: id.to_string(),
            url: format!("/docs/{id}"),
            title: id.to_string(),
            index: 0,
            text: id.to_string(),
        }
    }

    fn test_index() -> CorpusIndex {
        CorpusIndex::from_entries(
            "test",
            4,
            vec![
                IndexEntry::new(chunk("exact"), vec![1.0, 0.0, 0.0, 0.0]),
                IndexEntry::new(chunk("close"), vec![0.9, 0.1, 0.0, 0.0]),
                IndexEntry::new(chunk("orthogonal"), vec![0.0, 1.0, 0.0, 0.0]),
                IndexEntry::new(chunk("opposite"), vec![-1.0, 0.0, 0.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_search_options_default() {
        let opts = SearchOptions::default();
        assert_eq!(opts.limit, 5);
        assert_eq!(opts.min_score, 0.0);
    }

    #[test]
    fn test_search_options_min_score_clamping() {
        assert_eq!(SearchOptions::new(10).with_min_score(2.0).min_score, 1.0);
        assert_eq!(SearchOptions::new(10).with_min_score(-3.0).min_score, -1.0);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_orders_by_score() {
        let hits = rank(&[1.0, 0.0, 0.0, 0.0], &test_index(), &SearchOptions::new(10)).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        // min_score 0.0 drops the opposite vector.
        assert_eq!(ids, vec!["exact", "close", "orthogonal"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_rank_limit_and_threshold() {
        let index = test_index();
        let hits = rank(&[1.0, 0.0, 0.0, 0.0], &index, &SearchOptions::new(1)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "exact");

        let hits = rank(
            &[1.0, 0.0, 0.0, 0.0],
            &index,
            &SearchOptions::new(10).with_min_score(0.5),
        )
        .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.score >= 0.5));

        let hits = rank(
            &[1.0, 0.0, 0.0, 0.0],
            &index,
            &SearchOptions::new(10).with_min_score(-1.0),
        )
        .unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[3].chunk.id, "opposite");
    }

    #[test]
    fn test_rank_dimension_mismatch() {
        let err = rank(&[1.0, 0.0], &test_index(), &SearchOptions::default()).unwrap_err();
        assert_eq!(
            err,
            SearchError::DimensionMismatch {
                expected: 4,
                got: 2
            }
        );
    }
}
