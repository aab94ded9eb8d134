//! JSON block documents.
//!
//! The content tree looks like:
//!
//! ```text
//! _contents/
//!   docs/getting-started/install.json
//!   articles/welcome.json
//! ```
//!
//! Each file holds `{ id, title, description, blocks: [{ type, content }] }`.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use walkdir::WalkDir;

use crate::error::ContentError;
use crate::Result;

/// Block types carrying no searchable text.
const NON_TEXT_BLOCKS: &[&str] = &["image", "video", "audio", "divider", "spacer", "file"];

/// Top-level content section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// Product documentation.
    #[default]
    Docs,
    /// Blog-style articles.
    Articles,
}

impl Section {
    /// All sections, in load order.
    pub const ALL: [Self; 2] = [Self::Articles, Self::Docs];

    /// Directory name under the content root.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Docs => "docs",
            Self::Articles => "articles",
        }
    }
}

/// A content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block type, e.g. `heading`, `paragraph`, `list`, `code`.
    #[serde(rename = "type")]
    pub kind: String,
    /// String, list of strings, or nested lists (tables).
    #[serde(default)]
    pub content: Value,
}

impl Block {
    /// Searchable text of this block, if any.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        if NON_TEXT_BLOCKS.contains(&self.kind.as_str()) {
            return None;
        }

        let mut parts = Vec::new();
        collect_strings(&self.content, &mut parts);
        let text = parts
            .iter()
            .map(|p| strip_tags(p))
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        (!text.is_empty()).then_some(text)
    }
}

/// A documentation page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier from the file, if any.
    #[serde(default)]
    pub id: Option<String>,
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Short summary.
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered content blocks.
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// Path under the section directory without `.json`.
    #[serde(skip)]
    pub slug: String,
    /// Section the file was loaded from.
    #[serde(skip)]
    pub section: Section,
}

impl Document {
    /// Parse a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a document.
    pub fn from_json(path: &str, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ContentError::parse(path, e).into())
    }

    /// Title, description and block text as blank-line separated paragraphs.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let mut paragraphs = Vec::new();
        if !self.title.trim().is_empty() {
            paragraphs.push(self.title.trim().to_string());
        }
        if let Some(description) = self.description.as_deref().map(str::trim) {
            if !description.is_empty() {
                paragraphs.push(description.to_string());
            }
        }
        paragraphs.extend(self.blocks.iter().filter_map(Block::text));
        paragraphs.join("\n\n")
    }

    /// Site path of this page, e.g. `/docs/getting-started/install`.
    #[must_use]
    pub fn url_path(&self) -> String {
        format!("/{}/{}", self.section.dir_name(), self.slug)
    }
}

/// Load every document under `articles/` and `docs/`.
///
/// Keys are paths relative to the content root, e.g. `docs/intro.json`.
/// Missing section directories are skipped.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed.
pub fn fetch_all_content(root: impl AsRef<Path>) -> Result<BTreeMap<String, Document>> {
    let root = root.as_ref();
    let mut content = BTreeMap::new();

    for section in Section::ALL {
        for document in load_section(root, section)? {
            let key = format!("{}/{}.json", section.dir_name(), document.slug);
            content.insert(key, document);
        }
    }

    tracing::info!(root = %root.display(), documents = content.len(), "Loaded content tree");
    Ok(content)
}

/// Load all documents of one section, sorted by slug.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed.
pub fn load_section(root: impl AsRef<Path>, section: Section) -> Result<Vec<Document>> {
    let dir = root.as_ref().join(section.dir_name());
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "Section directory missing, skipping");
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = entry.map_err(|e| ContentError::parse(dir.display().to_string(), e))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }

        let relative = path
            .strip_prefix(&dir)
            .map_err(|e| ContentError::parse(path.display().to_string(), e))?;
        let slug = slug_from_relative(relative);

        let json = std::fs::read_to_string(path)?;
        let mut document = Document::from_json(&path.display().to_string(), &json)?;
        document.slug = slug;
        document.section = section;
        documents.push(document);
    }

    Ok(documents)
}

/// Load one document by slug. An empty slug means `index`.
///
/// # Errors
///
/// Returns `ContentError::NotFound` if no such file exists or the slug
/// escapes the section directory.
pub fn doc_by_slug(root: impl AsRef<Path>, section: Section, slug: &str) -> Result<Document> {
    let slug = slug.trim_matches('/');
    let slug = if slug.is_empty() { "index" } else { slug };

    let relative = Path::new(slug);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(ContentError::NotFound(slug.to_string()).into());
    }

    let path = root
        .as_ref()
        .join(section.dir_name())
        .join(format!("{slug}.json"));
    if !path.is_file() {
        return Err(ContentError::NotFound(slug.to_string()).into());
    }

    let json = std::fs::read_to_string(&path)?;
    let mut document = Document::from_json(&path.display().to_string(), &json)?;
    document.slug = slug.to_string();
    document.section = section;
    Ok(document)
}

fn slug_from_relative(relative: &Path) -> String {
    let without_ext = relative.with_extension("");
    without_ext
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        Value::Object(map) => {
            // List items and table cells sometimes wrap their text.
            for key in ["content", "text"] {
                if let Some(inner) = map.get(key) {
                    collect_strings(inner, out);
                }
            }
        }
        _ => {}
    }
}

/// Drop inline HTML tags such as `<strong>`.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_doc(root: &Path, relative: &str, value: &Value) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    #[test]
    fn test_block_text_variants() {
        let paragraph = Block {
            kind: "paragraph".to_string(),
            content: json!("Run <strong>npm install</strong> first."),
        };
        assert_eq!(paragraph.text().unwrap(), "Run npm install first.");

        let list = Block {
            kind: "list".to_string(),
            content: json!(["one", "two"]),
        };
        assert_eq!(list.text().unwrap(), "one\ntwo");

        let image = Block {
            kind: "image".to_string(),
            content: json!("https://example.com/logo.png"),
        };
        assert!(image.text().is_none());

        let empty = Block {
            kind: "paragraph".to_string(),
            content: Value::Null,
        };
        assert!(empty.text().is_none());
    }

    #[test]
    fn test_plain_text() {
        let document = Document::from_json(
            "docs/intro.json",
            r#"{
                "id": "intro",
                "title": "Introduction",
                "description": "What this is",
                "blocks": [
                    { "id": "1", "type": "heading", "content": "Overview" },
                    { "id": "2", "type": "divider", "content": "" },
                    { "id": "3", "type": "paragraph", "content": "Body text." }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            document.plain_text(),
            "Introduction\n\nWhat this is\n\nOverview\n\nBody text."
        );
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = Document::from_json("docs/broken.json", "{ not json").unwrap_err();
        assert!(err.to_string().contains("docs/broken.json"));
    }

    #[test]
    fn test_fetch_all_content() {
        let tmp = TempDir::new().unwrap();
        write_doc(tmp.path(), "docs/intro.json", &json!({ "title": "Intro", "blocks": [] }));
        write_doc(
            tmp.path(),
            "docs/guides/install.json",
            &json!({ "title": "Install", "blocks": [] }),
        );
        write_doc(tmp.path(), "articles/welcome.json", &json!({ "title": "Welcome" }));
        fs::write(tmp.path().join("docs/notes.txt"), "ignored").unwrap();

        let content = fetch_all_content(tmp.path()).unwrap();
        let keys: Vec<_> = content.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "articles/welcome.json",
                "docs/guides/install.json",
                "docs/intro.json"
            ]
        );

        let install = &content["docs/guides/install.json"];
        assert_eq!(install.slug, "guides/install");
        assert_eq!(install.section, Section::Docs);
        assert_eq!(install.url_path(), "/docs/guides/install");
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(fetch_all_content(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_doc_by_slug() {
        let tmp = TempDir::new().unwrap();
        write_doc(tmp.path(), "docs/index.json", &json!({ "title": "Home" }));
        write_doc(tmp.path(), "docs/api/auth.json", &json!({ "title": "Auth" }));

        assert_eq!(doc_by_slug(tmp.path(), Section::Docs, "").unwrap().title, "Home");
        let auth = doc_by_slug(tmp.path(), Section::Docs, "/api/auth/").unwrap();
        assert_eq!(auth.title, "Auth");
        assert_eq!(auth.slug, "api/auth");

        let err = doc_by_slug(tmp.path(), Section::Docs, "missing").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_doc_by_slug_rejects_traversal() {
        let tmp = TempDir::new().unwrap();
        write_doc(tmp.path(), "secret.json", &json!({ "title": "Secret" }));
        assert!(doc_by_slug(tmp.path(), Section::Docs, "../secret").is_err());
    }
}
