//! Configuration management for docsearch.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables (`DOCSEARCH_*`)
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{Backend, Config};
