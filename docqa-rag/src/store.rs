//! Durable document storage.
//!
//! The vector index is not persisted. Documents are, and the index is rebuilt
//! at startup by replaying every stored document through the retriever (see
//! [`Pipeline::restore`](crate::Pipeline::restore)).

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::document::{Document, DocumentId, DocumentKind};
use crate::error::Result;

/// A document that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    pub text: String,
    pub kind: DocumentKind,
}

impl NewDocument {
    /// Describe an uploaded file: the title is the file name without its extension.
    pub fn from_file(filename: &str, text: impl Into<String>) -> Self {
        let title = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
        Self {
            title: title.to_string(),
            text: text.into(),
            kind: DocumentKind::from_filename(filename),
        }
    }
}

/// Storage of source documents, keyed by numeric id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a document and return it with its assigned id and timestamp.
    async fn insert(&self, document: NewDocument) -> Result<Document>;

    /// Fetch one document.
    async fn get(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// Every stored document in id order.
    async fn list(&self) -> Result<Vec<Document>>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, id: &DocumentId) -> Result<bool>;
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    documents: Vec<Document>,
}

/// A [`DocumentStore`] that lives for the duration of the process.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    state: RwLock<MemoryState>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, document: NewDocument) -> Result<Document> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let stored = Document {
            id: DocumentId::from(state.next_id),
            title: document.title,
            text: document.text,
            kind: document.kind,
            created_at: Utc::now(),
        };
        state.documents.push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
        Ok(self.state.read().await.documents.iter().find(|d| &d.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Document>> {
        Ok(self.state.read().await.documents.clone())
    }

    async fn delete(&self, id: &DocumentId) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.documents.len();
        state.documents.retain(|d| &d.id != id);
        Ok(state.documents.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_drops_extension() {
        let doc = NewDocument::from_file("War and Peace.pdf", "text");
        assert_eq!(doc.title, "War and Peace");
        assert_eq!(doc.kind, DocumentKind::Pdf);
    }

    #[tokio::test]
    async fn ids_are_sequential_and_never_reused() {
        let store = InMemoryDocumentStore::new();
        let a = store.insert(NewDocument::from_file("a.txt", "alpha")).await.unwrap();
        let b = store.insert(NewDocument::from_file("b.txt", "beta")).await.unwrap();
        assert_eq!(a.id.as_str(), "1");
        assert_eq!(b.id.as_str(), "2");

        assert!(store.delete(&a.id).await.unwrap());
        assert!(!store.delete(&a.id).await.unwrap());

        let c = store.insert(NewDocument::from_file("c.txt", "gamma")).await.unwrap();
        assert_eq!(c.id.as_str(), "3");

        let titles: Vec<String> =
            store.list().await.unwrap().into_iter().map(|d| d.title).collect();
        assert_eq!(titles, vec!["b", "c"]);
        assert_eq!(store.get(&b.id).await.unwrap().unwrap().text, "beta");
        assert!(store.get(&a.id).await.unwrap().is_none());
    }
}
