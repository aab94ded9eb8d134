//! Paragraph-aligned text chunking for indexing.

use serde::{Deserialize, Serialize};

use super::document::Document;

/// A searchable piece of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable id derived from url, index and text.
    pub id: String,
    /// Site path of the source page.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Chunk index within the page.
    pub index: usize,
    /// Chunk text.
    pub text: String,
}

/// Chunking configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Soft size limit when packing paragraphs, in characters.
    pub target_chars: usize,
    /// Hard limit for a single paragraph, in characters.
    pub max_chars: usize,
    /// Paragraphs repeated at the start of the next chunk.
    pub overlap_paragraphs: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_chars: 800,
            max_chars: 1200,
            overlap_paragraphs: 1,
        }
    }
}

/// Text chunker.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with config.
    #[must_use]
    pub const fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Create a chunker with default config.
    #[must_use]
    pub fn default_chunker() -> Self {
        Self::new(ChunkerConfig::default())
    }

    /// Split text into chunks on paragraph boundaries.
    ///
    /// Every paragraph appears in at least one chunk. Paragraphs longer than
    /// `max_chars` are split on whitespace first.
    #[must_use]
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let paragraphs: Vec<String> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .flat_map(|p| self.split_long(p))
            .collect();

        if paragraphs.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < paragraphs.len() {
            let end = self.find_chunk_end(&paragraphs, start);
            chunks.push(paragraphs[start..end].join("\n\n"));

            if end >= paragraphs.len() {
                break;
            }

            // Move start with overlap
            start = end
                .saturating_sub(self.config.overlap_paragraphs)
                .max(start + 1);
        }

        chunks
    }

    /// Pack paragraphs from `start` until the target size is reached.
    fn find_chunk_end(&self, paragraphs: &[String], start: usize) -> usize {
        let mut size = 0;
        let mut end = start;

        while end < paragraphs.len() {
            let separator = if end > start { 2 } else { 0 };
            let added = paragraphs[end].chars().count() + separator;
            if end > start && size + added > self.config.target_chars {
                break;
            }
            size += added;
            end += 1;
        }

        end
    }

    /// Break a paragraph into pieces of at most `max_chars` characters.
    fn split_long(&self, paragraph: &str) -> Vec<String> {
        let max = self.config.max_chars.max(1);
        if paragraph.chars().count() <= max {
            return vec![paragraph.to_string()];
        }

        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();

            if word_len > max {
                if !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let chars: Vec<char> = word.chars().collect();
                pieces.extend(chars.chunks(max).map(|c| c.iter().collect::<String>()));
                continue;
            }

            let needed = if current.is_empty() { word_len } else { word_len + 1 };
            if current_len + needed > max {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }

        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}

/// Chunk a document's plain text.
///
/// Chunks without a single alphanumeric character are dropped.
#[must_use]
pub fn chunk_document(document: &Document, chunker: &Chunker) -> Vec<DocumentChunk> {
    let url = document.url_path();

    chunker
        .chunk_text(&document.plain_text())
        .into_iter()
        .filter(|text| text.chars().any(char::is_alphanumeric))
        .enumerate()
        .map(|(index, text)| DocumentChunk {
            id: chunk_id(&url, index, &text),
            url: url.clone(),
            title: document.title.clone(),
            index,
            text,
        })
        .collect()
}

fn chunk_id(url: &str, index: usize, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(url.as_bytes());
    hasher.update(&[0]);
    hasher.update(&index.to_le_bytes());
    hasher.update(&[0]);
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}
