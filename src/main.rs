//! docsearch - semantic search for documentation sites
//!
//! Entry point for the docsearch CLI.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docsearch::config::Backend;
use docsearch::content::{fetch_all_content, Chunker};
use docsearch::embeddings::{
    loader_for, spawn_worker, LoadProgress, LoadRetryPolicy, OutboundMessage,
};
use docsearch::observability::{init_metrics, init_tracing, metrics};
use docsearch::search::{CorpusIndex, SearchOptions, SemanticSearch};
use docsearch::Config;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// docsearch - semantic search for documentation sites
#[derive(Parser, Debug)]
#[command(name = "docsearch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding one sub-directory per model id
    #[arg(long, env = "DOCSEARCH_MODEL_DIR", default_value = "./models", global = true)]
    model_dir: PathBuf,

    /// Embedding model id
    #[arg(long, env = "DOCSEARCH_MODEL_ID", default_value = docsearch::embeddings::DEFAULT_MODEL_ID, global = true)]
    model_id: String,

    /// Embedding backend
    #[arg(long, env = "DOCSEARCH_BACKEND", value_enum, default_value_t = Backend::Onnx, global = true)]
    backend: Backend,

    /// What to do after a failed model load
    #[arg(long, env = "DOCSEARCH_RETRY_POLICY", value_enum, default_value_t = LoadRetryPolicy::Retry, global = true)]
    retry_policy: LoadRetryPolicy,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DOCSEARCH_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "DOCSEARCH_LOG_JSON", global = true)]
    log_json: bool,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk and embed the content tree into an index file
    Index {
        /// Content root containing `docs/` and `articles/`
        #[arg(long, env = "DOCSEARCH_CONTENT_DIR", default_value = "./_contents")]
        content_dir: PathBuf,

        /// Index file to write
        #[arg(long, short, env = "DOCSEARCH_INDEX", default_value = "./search-index.json")]
        output: PathBuf,
    },

    /// Search an index
    Search {
        /// Query text
        query: String,

        /// Index file to read
        #[arg(long, short, env = "DOCSEARCH_INDEX", default_value = "./search-index.json")]
        index: PathBuf,

        /// Maximum number of hits
        #[arg(long, short, default_value = "5")]
        limit: usize,

        /// Minimum cosine similarity
        #[arg(long, default_value = "0.0")]
        min_score: f32,
    },

    /// Embed one text and print the worker's reply as JSON
    Embed {
        /// Text to embed
        text: String,
    },

    /// Speak the worker protocol as line-delimited JSON on stdin/stdout
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);
    init_metrics();

    tracing::info!("docsearch v{} starting...", env!("CARGO_PKG_VERSION"));

    let (top_k, min_score) = match &cli.command {
        Command::Search {
            limit, min_score, ..
        } => (*limit, *min_score),
        _ => (5, 0.0),
    };

    let config = Config {
        model_dir: cli.model_dir,
        model_id: cli.model_id,
        backend: cli.backend,
        retry_policy: cli.retry_policy,
        log_level: cli.log_level,
        top_k,
        min_score,
        ..Default::default()
    };

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    let result = match cli.command {
        Command::Index {
            content_dir,
            output,
        } => run_index(&config, &content_dir, &output).await,
        Command::Search { query, index, .. } => run_search(&config, &query, &index).await,
        Command::Embed { text } => run_embed(&config, &text).await,
        Command::Serve => run_serve(&config).await,
    };

    if cli.print_metrics {
        eprintln!("{}", metrics::render());
    }
    result
}

fn log_progress(progress: &LoadProgress) {
    tracing::info!(
        status = ?progress.status,
        file = progress.file.as_deref().unwrap_or(""),
        percent = progress.progress.unwrap_or(0.0),
        "Model load progress"
    );
}

async fn run_index(
    config: &Config,
    content_dir: &std::path::Path,
    output: &std::path::Path,
) -> anyhow::Result<()> {
    let documents = fetch_all_content(content_dir)
        .with_context(|| format!("failed to read content from {}", content_dir.display()))?;

    let loader = loader_for(config);
    let handle = loader
        .get_instance(Some(Box::new(|p| log_progress(&p))))
        .await?;

    let index = tokio::task::spawn_blocking(move || {
        CorpusIndex::build(documents.values(), &handle, &Chunker::default_chunker())
    })
    .await??;

    index
        .save(output)
        .with_context(|| format!("failed to write index to {}", output.display()))?;

    println!(
        "Indexed {} chunks ({} dimensions) into {}",
        index.len(),
        index.dimension(),
        output.display()
    );
    Ok(())
}

async fn run_search(config: &Config, query: &str, index_path: &std::path::Path) -> anyhow::Result<()> {
    let index = CorpusIndex::load(index_path)
        .with_context(|| format!("failed to load index from {}", index_path.display()))?;

    if index.model_id() != config.model_id && config.backend == Backend::Onnx {
        tracing::warn!(
            index_model = index.model_id(),
            model = %config.model_id,
            "Index was built with a different model"
        );
    }

    let worker = spawn_worker(config)?;
    let options = SearchOptions::new(config.top_k).with_min_score(config.min_score);
    let mut search = SemanticSearch::new(worker, index, options);

    let hits = search.search(query, log_progress).await;
    search.shutdown().await?;

    for (rank, hit) in hits?.iter().enumerate() {
        println!(
            "{:>2}. {:.4}  {}  {}",
            rank + 1,
            hit.score,
            hit.chunk.url,
            hit.chunk.title
        );
    }
    Ok(())
}

async fn run_embed(config: &Config, text: &str) -> anyhow::Result<()> {
    let mut worker = spawn_worker(config)?;
    let output = worker.embed(text, log_progress).await;
    worker.terminate().await?;

    let reply = OutboundMessage::Complete { output: output? };
    println!("{}", serde_json::to_string(&reply)?);
    Ok(())
}

/// Relay stdin lines to the worker and worker replies to stdout.
async fn run_serve(config: &Config) -> anyhow::Result<()> {
    let mut worker = spawn_worker(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut pending = 0usize;
    let mut stdin_open = true;

    tracing::info!("Serving worker protocol on stdin/stdout");

    while stdin_open || pending > 0 {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        let message = serde_json::from_str(&line)
                            .unwrap_or_else(|_| serde_json::Value::String(line));
                        worker.post_message(message).await?;
                        pending += 1;
                    }
                    None => stdin_open = false,
                }
            }
            reply = worker.next_message() => {
                let Some(reply) = reply else { break };
                if reply.is_terminal() {
                    pending = pending.saturating_sub(1);
                }
                let mut line = serde_json::to_string(&reply)?;
                line.push('\n');
                stdout.write_all(line.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
    }

    worker.terminate().await?;
    Ok(())
}
