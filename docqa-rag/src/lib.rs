//! Question answering over uploaded documents.
//!
//! This crate provides:
//! - Word-bounded chunking of plain text
//! - Embedding providers (feature hashing, OpenAI, local BERT)
//! - An in-memory cosine-similarity vector index
//! - Answer generation through a hosted chat API or a local T5 model
//! - A [`Pipeline`] that ties ingestion and question answering together
//! - Durable document stores used to rebuild the index at startup
//! - A log of past questions and answers
//!
//! # Features
//!
//! - `openai`: OpenAI embeddings and hosted chat completion
//! - `sqlite`: [`SqliteDocumentStore`]
//! - `candle`: local BERT embeddings and T5 generation
//! - `full`: all of the above

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod history;
pub mod inmemory;
pub mod pipeline;
pub mod retriever;
pub mod store;
pub mod vectorindex;

#[cfg(feature = "candle")]
pub mod candle;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use chunking::{Chunker, WordChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, DocumentId, DocumentKind, IndexEntry, SearchResult};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider, embed_in_batches};
pub use error::{RagError, Result};
pub use generator::{
    APOLOGY_ANSWER, AnswerGenerator, BackendInfo, BackendKind, DecodingParams, GenerationBackend,
    GeneratorConfig, HostedConfig, LocalConfig, LocalModelSize, LocalSeq2SeqBackend,
    NO_CONTEXT_ANSWER, Prompt, Seq2SeqModel,
};
pub use history::{DEFAULT_HISTORY_LIMIT, Exchange, HistoryLog, InMemoryHistoryLog};
pub use inmemory::InMemoryVectorIndex;
pub use pipeline::{Answer, Pipeline, PipelineBuilder};
pub use retriever::{Retriever, RetrieverBuilder};
pub use store::{DocumentStore, InMemoryDocumentStore, NewDocument};
pub use vectorindex::VectorIndex;

#[cfg(feature = "candle")]
pub use candle::{CandleBertEmbeddingProvider, DEFAULT_EMBEDDING_MODEL, T5Model};
#[cfg(feature = "openai")]
pub use generator::HostedChatBackend;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDocumentStore;
