//! docsearch
//!
//! Semantic search for documentation sites: a lazily loaded sentence
//! embedding pipeline behind a single background worker, and cosine ranking
//! against a precomputed corpus of page chunks.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod content;
pub mod embeddings;
pub mod error;
pub mod observability;
pub mod search;

pub use config::Config;
pub use error::{Error, Result};
