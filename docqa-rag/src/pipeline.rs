//! Question-answering pipeline.
//!
//! The [`Pipeline`] is the surface the front end talks to: it wraps raw text
//! into documents for the [`Retriever`], and answers questions by retrieving
//! the top chunks and handing them to the active [`AnswerGenerator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{AnswerGenerator, GeneratorConfig, Pipeline, Retriever};
//!
//! let retriever = Retriever::builder()
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .build()?;
//! let pipeline = Pipeline::builder()
//!     .retriever(retriever)
//!     .generator(AnswerGenerator::from_config(&GeneratorConfig::from_env()).await?)
//!     .build()?;
//!
//! pipeline.ingest_text("The cat sat on the mat.", "doc1").await?;
//! let answer = pipeline.ask("Where did the cat sit?").await?;
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::RagConfig;
use crate::document::{Document, DocumentId, SearchResult};
use crate::error::{RagError, Result};
use crate::generator::{APOLOGY_ANSWER, AnswerGenerator, BackendInfo};
use crate::retriever::Retriever;
use crate::store::DocumentStore;

/// Separator placed between retrieved chunks in the generation context.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// An answer together with the chunks it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchResult>,
}

/// Ingests text and answers questions about it.
///
/// The generator sits behind a lock so it can be replaced while the pipeline
/// is shared; each `ask` takes its own handle to the generator and releases
/// the lock before generating.
pub struct Pipeline {
    retriever: Retriever,
    generator: RwLock<Arc<AnswerGenerator>>,
}

impl Pipeline {
    /// Create a new [`PipelineBuilder`].
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        self.retriever.config()
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Ingest raw text under `label`. The label becomes the document id.
    ///
    /// Returns the number of chunks indexed.
    pub async fn ingest_text(&self, text: &str, label: &str) -> Result<usize> {
        self.ingest_document(&Document::from_text(text, label)).await
    }

    /// Ingest an already-built document. Returns the number of chunks indexed.
    pub async fn ingest_document(&self, document: &Document) -> Result<usize> {
        self.retriever.ingest(document).await
    }

    /// Remove every chunk of document `id` from the index.
    pub async fn delete_document(&self, id: &DocumentId) -> Result<bool> {
        self.retriever.delete_document(id).await
    }

    /// The `top_k` chunks most relevant to `query`, most relevant first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retriever.query(query, self.config().top_k).await
    }

    /// Answer `query` from the indexed documents.
    ///
    /// # Errors
    ///
    /// Retrieval errors propagate. Generation failures and generation
    /// timeouts do not: they are logged and answered with [`APOLOGY_ANSWER`].
    pub async fn ask(&self, query: &str) -> Result<String> {
        Ok(self.ask_with_sources(query).await?.text)
    }

    /// Like [`ask`](Self::ask), also returning the retrieved chunks.
    pub async fn ask_with_sources(&self, query: &str) -> Result<Answer> {
        let sources = self.retrieve(query).await?;
        let context = sources
            .iter()
            .map(|r| r.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        let generator = Arc::clone(&*self.generator.read().await);
        let text = match generator.generate(query, &context).await {
            Ok(text) => text,
            Err(e @ (RagError::GenerationFailure { .. } | RagError::Timeout { .. })) => {
                warn!(error = %e, "generation failed; returning apology");
                APOLOGY_ANSWER.to_string()
            }
            Err(e) => {
                error!(error = %e, "unexpected error during generation");
                return Err(e);
            }
        };

        info!(source_count = sources.len(), answer_len = text.len(), "answered question");
        Ok(Answer { text, sources })
    }

    /// Swap the answer generator. Questions already being answered finish on
    /// the generator they started with.
    pub async fn replace_generator(&self, generator: AnswerGenerator) {
        let generator = Arc::new(generator.with_timeout(self.config().timeout));
        let info = generator.info();
        *self.generator.write().await = generator;
        info!(kind = ?info.kind, model = %info.model, "generator replaced");
    }

    /// Describe the active generation backend.
    pub async fn generator_info(&self) -> BackendInfo {
        self.generator.read().await.info()
    }

    /// Rebuild the index from every document in `store`.
    ///
    /// Returns the number of documents replayed.
    pub async fn restore(&self, store: &dyn DocumentStore) -> Result<usize> {
        let documents = store.list().await?;
        for document in &documents {
            self.retriever.ingest(document).await.inspect_err(|e| {
                error!(document.id = %document.id, error = %e, "failed to restore document");
            })?;
        }
        info!(document_count = documents.len(), "index restored from store");
        Ok(documents.len())
    }
}

/// Builder for constructing a [`Pipeline`].
///
/// Both the retriever and the generator are required. The generator's
/// timeout is taken from the retriever's [`RagConfig`].
#[derive(Default)]
pub struct PipelineBuilder {
    retriever: Option<Retriever>,
    generator: Option<AnswerGenerator>,
}

impl PipelineBuilder {
    /// Set the retriever.
    pub fn retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: AnswerGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`Pipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing.
    pub fn build(self) -> Result<Pipeline> {
        let retriever = self
            .retriever
            .ok_or_else(|| RagError::ConfigError("retriever is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        let generator = generator.with_timeout(retriever.config().timeout);

        Ok(Pipeline { retriever, generator: RwLock::new(Arc::new(generator)) })
    }
}
