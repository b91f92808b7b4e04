//! Error types for the `docqa-rag` crate.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in retrieval and answer generation.
#[derive(Debug, Error)]
pub enum RagError {
    /// An embedding model or generation backend could not be initialized.
    ///
    /// Fatal for the component that reported it; never retried.
    #[error("Model unavailable ({component}): {message}")]
    ModelUnavailable {
        /// The component whose model failed to load.
        component: String,
        /// A description of the failure.
        message: String,
    },

    /// An embedding's length differs from the dimensionality the index has established.
    #[error("Dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        /// The dimensionality already held by the index.
        expected: usize,
        /// The offending vector length.
        actual: usize,
    },

    /// A search was requested with `k == 0`.
    #[error("Invalid top_k: {0} (must be greater than zero)")]
    InvalidTopK(usize),

    /// An error occurred while computing embeddings.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation backend failed to produce an answer.
    #[error("Generation failure ({backend}): {message}")]
    GenerationFailure {
        /// The backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A bounded wait was exceeded.
    #[error("Timed out after {after:?} during {operation}")]
    Timeout {
        /// The operation that did not finish in time.
        operation: String,
        /// The limit that was exceeded.
        after: Duration,
    },

    /// An error occurred in the document store.
    #[error("Document store error ({backend}): {message}")]
    StoreError {
        /// The store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Run `future` under an optional time limit.
///
/// Returns [`RagError::Timeout`] naming `operation` if the limit elapses first.
/// The future is dropped on timeout, so callers must not have mutated shared
/// state before awaiting it.
pub(crate) async fn with_timeout<T, F>(
    operation: &str,
    limit: Option<Duration>,
    future: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, future)
            .await
            .map_err(|_| RagError::Timeout { operation: operation.to_string(), after })?,
        None => future.await,
    }
}
