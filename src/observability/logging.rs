//! Structured logging and tracing configuration.
//!
//! Logs go to stderr so stdout stays free for `docsearch serve` replies.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Initialize tracing.
///
/// `RUST_LOG` wins over `level` when set.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed in this process.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
}

/// Spans shared across the crate.
pub mod spans {
    use tracing::{info_span, Span};

    /// Span for one search query.
    #[must_use]
    pub fn search_span(query: &str, limit: usize) -> Span {
        info_span!("search", query = %query, limit)
    }

    /// Span for indexing one document.
    #[must_use]
    pub fn index_span(slug: &str) -> Span {
        info_span!("index_document", slug = %slug)
    }
}
