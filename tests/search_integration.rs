//! Integration tests for indexing a content tree and searching it.

use std::fs;
use std::path::Path;

use docsearch::config::Backend;
use docsearch::content::{fetch_all_content, Chunker};
use docsearch::embeddings::{loader_for, spawn_worker};
use docsearch::error::SearchError;
use docsearch::search::{CorpusIndex, SearchOptions, SemanticSearch};
use docsearch::{Config, Error};
use serde_json::json;
use tempfile::TempDir;

fn write_doc(root: &Path, relative: &str, title: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let doc = json!({
        "id": relative,
        "title": title,
        "blocks": [
            { "id": "1", "type": "heading", "content": title },
            { "id": "2", "type": "paragraph", "content": body },
        ],
    });
    fs::write(path, doc.to_string()).unwrap();
}

fn placeholder_config() -> Config {
    Config {
        backend: Backend::Placeholder,
        ..Default::default()
    }
}

async fn build_index(root: &Path) -> CorpusIndex {
    let documents = fetch_all_content(root).unwrap();
    let handle = loader_for(&placeholder_config())
        .get_instance(None)
        .await
        .unwrap();
    CorpusIndex::build(documents.values(), &handle, &Chunker::default_chunker()).unwrap()
}

/// Test that a query ranks the page sharing its words first.
#[tokio::test]
async fn test_index_and_search_content_tree() {
    let tmp = TempDir::new().unwrap();
    write_doc(
        tmp.path(),
        "docs/getting-started/install.json",
        "Install guide",
        "Follow this install guide to set up the tool.",
    );
    write_doc(
        tmp.path(),
        "docs/api/authentication.json",
        "API authentication",
        "Every API request needs an authentication token.",
    );
    write_doc(
        tmp.path(),
        "articles/release-notes.json",
        "Release notes",
        "What changed in this release.",
    );

    let index = build_index(tmp.path()).await;
    assert_eq!(index.len(), 3);

    let path = tmp.path().join("index.json");
    index.save(&path).unwrap();
    let index = CorpusIndex::load(&path).unwrap();

    let config = placeholder_config();
    let worker = spawn_worker(&config).unwrap();
    let mut search = SemanticSearch::new(worker, index, SearchOptions::new(2));

    let hits = search.search("install guide", |_| {}).await.unwrap();
    assert!(!hits.is_empty() && hits.len() <= 2);
    assert_eq!(hits[0].chunk.url, "/docs/getting-started/install");
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

    let hits = search
        .search_with("api authentication", &SearchOptions::new(1), |_| {})
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.url, "/docs/api/authentication");

    search.shutdown().await.unwrap();
}

/// Test that an empty corpus is reported instead of returning nothing.
#[tokio::test]
async fn test_empty_corpus() {
    let tmp = TempDir::new().unwrap();
    let index = build_index(tmp.path()).await;
    assert!(index.is_empty());

    let worker = spawn_worker(&placeholder_config()).unwrap();
    let mut search = SemanticSearch::new(worker, index, SearchOptions::default());

    let err = search.search("anything", |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::Search(SearchError::EmptyCorpus)));

    search.shutdown().await.unwrap();
}

/// Test that a missing model degrades to "search unavailable".
#[tokio::test]
async fn test_missing_model_degrades_to_unavailable() {
    let tmp = TempDir::new().unwrap();
    write_doc(tmp.path(), "docs/intro.json", "Intro", "Welcome to the docs.");
    let index = build_index(tmp.path()).await;

    let config = Config {
        backend: Backend::Onnx,
        model_dir: tmp.path().join("no-models-here"),
        ..Default::default()
    };
    let worker = spawn_worker(&config).unwrap();
    let mut search = SemanticSearch::new(worker, index, SearchOptions::default());

    let err = search.search("welcome", |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::Search(SearchError::Unavailable(_))));
    assert!(err.to_string().contains("temporarily unavailable"));

    search.shutdown().await.unwrap();
}

/// Test that an index from a different model dimension is rejected at query time.
#[tokio::test]
async fn test_dimension_mismatch_between_model_and_index() {
    let chunk = docsearch::content::DocumentChunk {
        id: "x".to_string(),
        url: "/docs/x".to_string(),
        title: "X".to_string(),
        index: 0,
        text: "x".to_string(),
    };
    let index = CorpusIndex::from_entries(
        "other/model",
        3,
        vec![docsearch::search::IndexEntry::new(chunk, vec![1.0, 0.0, 0.0])],
    )
    .unwrap();

    let worker = spawn_worker(&placeholder_config()).unwrap();
    let mut search = SemanticSearch::new(worker, index, SearchOptions::default());

    let err = search.search("x", |_| {}).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Search(SearchError::DimensionMismatch { expected: 3, .. })
    ));

    search.shutdown().await.unwrap();
}
