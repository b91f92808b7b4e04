//! Vector index trait for storing chunk embeddings and answering k-NN queries.

use async_trait::async_trait;

use crate::document::{DocumentId, IndexEntry, SearchResult};
use crate::error::Result;

/// A store of `(chunk, embedding)` entries with similarity search.
///
/// Implementations must serialize mutations against each other and against
/// searches; concurrent searches may proceed in parallel.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.add(entries).await?;
/// let results = index.search(&query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append entries in order.
    ///
    /// All-or-nothing: if any embedding's length differs from the index's
    /// dimensionality (or from the rest of the batch when the index is empty),
    /// nothing is added and [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch)
    /// is returned.
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Return up to `k` entries most similar to `query`, most similar first.
    ///
    /// Ties are broken by insertion order. An empty index yields an empty
    /// result, never an error.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Remove every entry whose chunk belongs to `source`. Returns the count removed.
    async fn remove(&self, source: &DocumentId) -> Result<usize>;

    /// Number of entries currently stored.
    async fn len(&self) -> usize;

    /// Whether the index holds no entries.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
