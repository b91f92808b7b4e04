//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a brute-force index backed by
//! a `Vec` protected by a `tokio::sync::RwLock`. Every search scans all
//! entries, which is the known scalability ceiling of this index: fine for a
//! personal library of books, not for millions of chunks.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::document::{DocumentId, IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorindex::VectorIndex;

/// Score assigned when either vector has zero magnitude (or the score is NaN).
///
/// Lower than any cosine similarity, so a degenerate embedding can never rank
/// above a valid one.
pub const DEGENERATE_SCORE: f32 = f32::MIN;

/// A stored entry with its magnitude cached at insertion.
#[derive(Debug)]
struct Row {
    entry: IndexEntry,
    norm: f32,
}

#[derive(Debug, Default)]
struct IndexState {
    /// Established by the first non-empty batch; cleared when the index empties.
    dimensions: Option<usize>,
    /// Insertion order. A row's position is its implicit id.
    rows: Vec<Row>,
}

/// An in-memory vector index using cosine similarity for search.
///
/// Entries keep insertion order. Removal compacts the row storage in place
/// while preserving the relative order of survivors, so positions never point
/// at a stale or foreign entry and ties keep resolving to the earliest insert.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.add(entries).await?;
/// let top = index.search(&query, 3).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    state: RwLock<IndexState>,
}

impl InMemoryVectorIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// The dimensionality established by the stored entries, if any.
    pub async fn dimensions(&self) -> Option<usize> {
        self.state.read().await.dimensions
    }
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity given precomputed magnitudes.
fn cosine_similarity(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return DEGENERATE_SCORE;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let score = dot / (norm_a * norm_b);
    if score.is_nan() { DEGENERATE_SCORE } else { score }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        let mut state = self.state.write().await;
        let expected = state.dimensions.unwrap_or(first.embedding.len());

        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != expected) {
            error!(
                expected,
                actual = bad.embedding.len(),
                source = %bad.chunk.source,
                "rejected batch"
            );
            return Err(RagError::DimensionMismatch { expected, actual: bad.embedding.len() });
        }

        state.dimensions = Some(expected);
        state.rows.reserve(entries.len());
        for entry in entries {
            let norm = magnitude(&entry.embedding);
            state.rows.push(Row { entry, norm });
        }
        debug!(total = state.rows.len(), dimensions = expected, "index grew");
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::InvalidTopK(k));
        }

        let state = self.state.read().await;
        let Some(dimensions) = state.dimensions else {
            return Ok(Vec::new());
        };
        if query.len() != dimensions {
            return Err(RagError::DimensionMismatch { expected: dimensions, actual: query.len() });
        }

        let query_norm = magnitude(query);
        let mut scored: Vec<(usize, f32)> = state
            .rows
            .iter()
            .enumerate()
            .map(|(position, row)| {
                (position, cosine_similarity(&row.entry.embedding, row.norm, query, query_norm))
            })
            .collect();

        scored.sort_by(|(pos_a, score_a), (pos_b, score_b)| {
            match score_b.total_cmp(score_a) {
                Ordering::Equal => pos_a.cmp(pos_b),
                other => other,
            }
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult {
                chunk: state.rows[position].entry.chunk.clone(),
                score,
            })
            .collect())
    }

    async fn remove(&self, source: &DocumentId) -> Result<usize> {
        let mut state = self.state.write().await;
        let before = state.rows.len();
        state.rows.retain(|row| &row.entry.chunk.source != source);
        let removed = before - state.rows.len();
        if state.rows.is_empty() {
            state.dimensions = None;
        }
        debug!(%source, removed, remaining = state.rows.len(), "removed document chunks");
        Ok(removed)
    }

    async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }
}
