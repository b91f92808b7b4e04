//! Retrieval orchestration: chunk → embed → index, and embed → search.
//!
//! The [`Retriever`] owns its [`Chunker`], [`EmbeddingProvider`] and
//! [`VectorIndex`]. Embedding runs outside any index lock; only the final
//! `add`/`search` call enters the index's critical section.

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, WordChunker};
use crate::config::RagConfig;
use crate::document::{Document, DocumentId, IndexEntry, SearchResult};
use crate::embedding::{EmbeddingProvider, embed_in_batches};
use crate::error::{RagError, Result, with_timeout};
use crate::inmemory::InMemoryVectorIndex;
use crate::vectorindex::VectorIndex;

/// Ingests documents into a vector index and answers retrieval queries.
///
/// Construct one via [`Retriever::builder()`].
pub struct Retriever {
    config: RagConfig,
    chunker: Box<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Box<dyn VectorIndex>,
}

impl Retriever {
    /// Create a new [`RetrieverBuilder`].
    pub fn builder() -> RetrieverBuilder {
        RetrieverBuilder::default()
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Number of chunks currently indexed.
    pub async fn indexed_chunks(&self) -> usize {
        self.index.len().await
    }

    /// Ingest a document: chunk → embed (one batched call) → add.
    ///
    /// All-or-nothing: the index is only touched once every chunk has an
    /// embedding, and the add itself either stores the whole batch or none of
    /// it. Returns the number of chunks indexed.
    ///
    /// # Errors
    ///
    /// - [`RagError::Timeout`] if embedding exceeds the configured timeout.
    /// - [`RagError::EmbeddingError`] if the provider fails.
    /// - [`RagError::DimensionMismatch`] if the embeddings do not match the index.
    pub async fn ingest(&self, document: &Document) -> Result<usize> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let provider = self.embedding_provider.as_ref();
        let batches = embed_in_batches(provider, &texts, self.config.embed_batch_size);
        let embeddings = with_timeout("embedding", self.config.timeout, batches)
            .await
            .inspect_err(|e| {
                error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            })?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();
        let chunk_count = entries.len();

        self.index.add(entries).await.inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "indexing failed during ingestion");
        })?;

        info!(document.id = %document.id, chunk_count, "ingested document");
        Ok(chunk_count)
    }

    /// Retrieve the `k` chunks most similar to `text`, most relevant first.
    ///
    /// An index that has never been populated yields an empty result without
    /// calling the embedder.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidTopK`] for `k == 0`, and embedding or
    /// timeout errors from the query embedding.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::InvalidTopK(k));
        }
        if self.index.is_empty().await {
            info!(result_count = 0, "query against empty index");
            return Ok(Vec::new());
        }

        let embedding = self.embedding_provider.embed(text);
        let query_embedding = with_timeout("query embedding", self.config.timeout, embedding)
            .await
            .inspect_err(|e| error!(error = %e, "embedding failed during query"))?;

        let results = self.index.search(&query_embedding, k).await?;
        info!(result_count = results.len(), "query completed");
        Ok(results)
    }

    /// Remove every chunk of document `id`. Returns whether anything was removed.
    pub async fn delete_document(&self, id: &DocumentId) -> Result<bool> {
        let removed = self.index.remove(id).await?;
        info!(document.id = %id, removed, "deleted document chunks");
        Ok(removed > 0)
    }
}

/// Builder for constructing a [`Retriever`].
///
/// Only the embedding provider is required. The chunker defaults to a
/// [`WordChunker`] sized by `config.chunk_size` and the index to a fresh
/// [`InMemoryVectorIndex`].
///
/// # Example
///
/// ```rust,ignore
/// let retriever = Retriever::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RetrieverBuilder {
    config: Option<RagConfig>,
    chunker: Option<Box<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Box<dyn VectorIndex>>,
}

impl RetrieverBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: impl Chunker + 'static) -> Self {
        self.chunker = Some(Box::new(chunker));
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index.
    pub fn index(mut self, index: impl VectorIndex + 'static) -> Self {
        self.index = Some(Box::new(index));
        self
    }

    /// Build the [`Retriever`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no embedding provider was set.
    pub fn build(self) -> Result<Retriever> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| Box::new(WordChunker::new(config.chunk_size)));
        let index = self.index.unwrap_or_else(|| Box::new(InMemoryVectorIndex::new()));

        Ok(Retriever { config, chunker, embedding_provider, index })
    }
}
