//! Semantic search over the documentation corpus.
//!
//! This module provides:
//! - Cosine-similarity ranking of chunk vectors
//! - A persisted corpus index of precomputed chunk embeddings
//! - A search front end driving the embedding worker

mod index;
mod ranker;
mod service;

pub use index::{CorpusIndex, IndexEntry};
pub use ranker::{cosine_similarity, rank, SearchHit, SearchOptions};
pub use service::SemanticSearch;
