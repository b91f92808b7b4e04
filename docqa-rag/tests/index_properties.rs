//! Property tests for chunking and the in-memory vector index.

use docqa_rag::chunking::split_words;
use docqa_rag::document::{Chunk, DocumentId, IndexEntry, SearchResult};
use docqa_rag::inmemory::InMemoryVectorIndex;
use docqa_rag::vectorindex::VectorIndex;
use proptest::prelude::*;

const DIM: usize = 8;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-3 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Embeddings no two of which point in nearly the same direction.
fn arb_distinct_embeddings(count: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Vec<f32>>> {
    proptest::collection::vec(arb_normalized_embedding(DIM), count).prop_filter(
        "embeddings must be pairwise distinct in direction",
        |vs| {
            vs.iter().enumerate().all(|(i, a)| vs[i + 1..].iter().all(|b| dot(a, b) < 0.999))
        },
    )
}

fn entries_for(source: &str, embeddings: &[Vec<f32>]) -> Vec<IndexEntry> {
    embeddings
        .iter()
        .enumerate()
        .map(|(i, embedding)| IndexEntry {
            chunk: Chunk {
                content: format!("{source} chunk {i}"),
                source: DocumentId::new(source),
                chunk_index: i,
            },
            embedding: embedding.clone(),
        })
        .collect()
}

fn search(index: &InMemoryVectorIndex, query: &[f32], k: usize) -> Vec<SearchResult> {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(index.search(query, k)).unwrap()
}

fn populated(batches: &[Vec<IndexEntry>]) -> InMemoryVectorIndex {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let index = InMemoryVectorIndex::new();
    for batch in batches {
        rt.block_on(index.add(batch.clone())).unwrap();
    }
    index
}

mod prop_chunking {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_reproduce_word_sequence(
            text in "[a-zA-Z0-9 \t\n.,]{0,400}",
            target in 1usize..120,
        ) {
            let chunks = split_words(&text, target);

            let rejoined = chunks.join(" ");
            let original: Vec<&str> = text.split_whitespace().collect();
            let reproduced: Vec<&str> = rejoined.split_whitespace().collect();
            prop_assert_eq!(reproduced, original.clone());

            prop_assert!(chunks.iter().all(|c| !c.trim().is_empty()));
            prop_assert_eq!(chunks.is_empty(), original.is_empty());
        }
    }
}

mod prop_index_search {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_descending_and_bounded(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let index = populated(&[entries_for("doc", &embeddings)]);
            let results = search(&index, &query, k);

            prop_assert_eq!(results.len(), k.min(embeddings.len()));
            for window in results.windows(2) {
                prop_assert!(window[0].score >= window[1].score);
            }
        }

        #[test]
        fn stored_vector_finds_itself(
            embeddings in arb_distinct_embeddings(1..16),
            pick in any::<proptest::sample::Index>(),
        ) {
            let index = populated(&[entries_for("doc", &embeddings)]);
            let target = pick.index(embeddings.len());

            let top = search(&index, &embeddings[target], 1);

            prop_assert_eq!(top.len(), 1);
            prop_assert_eq!(top[0].chunk.chunk_index, target);
        }

        #[test]
        fn smaller_k_is_a_prefix(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..20,
        ) {
            let index = populated(&[entries_for("doc", &embeddings)]);
            let shorter = search(&index, &query, k);
            let longer = search(&index, &query, k + 1);

            prop_assert!(shorter.len() <= longer.len());
            prop_assert_eq!(&longer[..shorter.len()], &shorter[..]);
        }

        #[test]
        fn removal_leaves_only_the_other_document(
            a in proptest::collection::vec(arb_normalized_embedding(DIM), 1..10),
            b in proptest::collection::vec(arb_normalized_embedding(DIM), 1..10),
            query in arb_normalized_embedding(DIM),
        ) {
            let (a_entries, b_entries) = (entries_for("a", &a), entries_for("b", &b));
            // Interleave the two documents across batches.
            let batches: Vec<Vec<IndexEntry>> = a_entries
                .chunks(2)
                .zip(b_entries.chunks(3))
                .flat_map(|(x, y)| [x.to_vec(), y.to_vec()])
                .chain(a_entries.chunks(2).skip(b_entries.chunks(3).len()).map(<[_]>::to_vec))
                .chain(b_entries.chunks(3).skip(a_entries.chunks(2).len()).map(<[_]>::to_vec))
                .collect();
            let index = populated(&batches);

            let rt = tokio::runtime::Runtime::new().unwrap();
            let removed = rt.block_on(index.remove(&DocumentId::new("a"))).unwrap();
            prop_assert_eq!(removed, a.len());

            let results = search(&index, &query, a.len() + b.len());
            prop_assert_eq!(results.len(), b.len());
            for result in &results {
                prop_assert_eq!(&result.chunk, &b_entries[result.chunk.chunk_index].chunk);
                let expected = dot(&b[result.chunk.chunk_index], &query);
                prop_assert!((result.score - expected).abs() < 1e-4);
            }
        }
    }
}
