//! Documentation content corpus.
//!
//! This module provides:
//! - Loading the site's JSON block documents from the content tree
//! - Plain-text extraction for search
//! - Paragraph-aligned chunking

mod chunker;
mod document;

pub use chunker::{chunk_document, Chunker, ChunkerConfig, DocumentChunk};
pub use document::{doc_by_slug, fetch_all_content, load_section, Block, Document, Section};
