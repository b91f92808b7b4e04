//! Data types for documents, chunks, and search results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a [`Document`]; every [`Chunk`] records the id of its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for DocumentId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Document-level type tag, taken from the uploaded file's extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Txt,
    Markdown,
    Other(String),
}

impl DocumentKind {
    /// Infer the kind from a file name or extension (case-insensitive).
    pub fn from_filename(name: &str) -> Self {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or(name);
        Self::parse(ext)
    }

    /// Parse a stored type tag.
    pub fn parse(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            other => Self::Other(other.to_string()),
        }
    }

    /// The tag stored alongside the document.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Markdown => "md",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source document. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier; owns every chunk derived from this document.
    pub id: DocumentId,
    /// Human-readable title (usually the file name without extension).
    pub title: String,
    /// The plain text content.
    pub text: String,
    /// Document-level type tag.
    pub kind: DocumentKind,
    /// When the document was created.
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Wrap raw text under a source label. The label doubles as id and title.
    pub fn from_text(text: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            id: DocumentId::new(source.clone()),
            kind: DocumentKind::from_filename(&source),
            title: source,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// A contiguous, word-bounded passage of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// The passage text.
    pub content: String,
    /// The owning document.
    pub source: DocumentId,
    /// Position of this chunk within its document, starting at zero.
    pub chunk_index: usize,
}

/// A [`Chunk`] paired with its embedding, as held inside the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_filename() {
        assert_eq!(DocumentKind::from_filename("War and Peace.PDF"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("notes.txt"), DocumentKind::Txt);
        assert_eq!(DocumentKind::from_filename("README.md"), DocumentKind::Markdown);
        assert_eq!(DocumentKind::from_filename("data.csv"), DocumentKind::Other("csv".into()));
    }

    #[test]
    fn from_text_uses_label_as_id_and_title() {
        let doc = Document::from_text("hello", "doc1");
        assert_eq!(doc.id, DocumentId::new("doc1"));
        assert_eq!(doc.title, "doc1");
        assert_eq!(doc.text, "hello");
    }

    #[test]
    fn document_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&DocumentId::from(42)).unwrap();
        assert_eq!(json, "\"42\"");
    }
}
