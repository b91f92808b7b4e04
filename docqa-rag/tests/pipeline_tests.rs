//! End-to-end tests for ingestion and question answering.

use std::sync::Arc;

use async_trait::async_trait;
use docqa_rag::{
    AnswerGenerator, BackendInfo, BackendKind, DocumentId, GenerationBackend,
    HashingEmbeddingProvider, NO_CONTEXT_ANSWER, Pipeline, Prompt, RagConfig, Result, Retriever,
};

/// Answers with the context sentence that shares the most words with the question.
struct ExtractiveBackend;

#[async_trait]
impl GenerationBackend for ExtractiveBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            kind: BackendKind::Local,
            model: "extractive".into(),
            description: "Picks the best matching context sentence".into(),
        }
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let (context, question) = prompt
            .user
            .split_once("Context:\n")
            .and_then(|(_, rest)| rest.split_once("\n\nQuestion: "))
            .unwrap_or_default();
        let words = |s: &str| -> Vec<String> {
            s.split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase)
                .collect()
        };
        let question_words = words(question);

        let best = context
            .split_inclusive('.')
            .max_by_key(|sentence| {
                words(sentence).iter().filter(|w| question_words.contains(w)).count()
            })
            .unwrap_or_default();
        Ok(best.trim().to_string())
    }
}

fn pipeline(chunk_size: usize) -> Pipeline {
    let config = RagConfig::builder().chunk_size(chunk_size).build().unwrap();
    let retriever = Retriever::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .build()
        .unwrap();
    Pipeline::builder()
        .retriever(retriever)
        .generator(AnswerGenerator::new(Arc::new(ExtractiveBackend)))
        .build()
        .unwrap()
}

#[tokio::test]
async fn cat_on_the_mat() {
    let pipeline = pipeline(1000);
    let chunks = pipeline
        .ingest_text("The cat sat on the mat. The dog ran in the park.", "doc1")
        .await
        .unwrap();
    assert_eq!(chunks, 1);

    let retrieved = pipeline.retrieve("Where did the cat sit?").await.unwrap();
    assert_eq!(retrieved.len(), 1);
    assert_eq!(retrieved[0].chunk.source, DocumentId::new("doc1"));
    assert_eq!(retrieved[0].chunk.content, "The cat sat on the mat. The dog ran in the park.");

    let answer = pipeline.ask("Where did the cat sit?").await.unwrap();
    assert!(answer.contains("mat"), "answer was {answer:?}");
}

#[tokio::test]
async fn empty_store_gives_defined_answer() {
    let pipeline = pipeline(1000);
    let answer = pipeline.ask("anything").await.unwrap();
    assert_eq!(answer, NO_CONTEXT_ANSWER);
}

#[tokio::test]
async fn same_text_under_two_ids_is_independently_deletable() {
    let pipeline = pipeline(30);
    let text = "Rust guarantees memory safety without a garbage collector. \
                Ownership rules are checked at compile time by the borrow checker.";

    let first = pipeline.ingest_text(text, "copy-a").await.unwrap();
    let second = pipeline.ingest_text(text, "copy-b").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(pipeline.retriever().indexed_chunks().await, first + second);

    assert!(pipeline.delete_document(&DocumentId::new("copy-a")).await.unwrap());
    assert_eq!(pipeline.retriever().indexed_chunks().await, second);

    let results = pipeline.retriever().query("borrow checker", second).await.unwrap();
    assert_eq!(results.len(), second);
    assert!(results.iter().all(|r| r.chunk.source == DocumentId::new("copy-b")));

    let mut indices: Vec<usize> = results.iter().map(|r| r.chunk.chunk_index).collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..second).collect::<Vec<_>>());
}

#[tokio::test]
async fn deleted_document_is_no_longer_used_for_answers() {
    let pipeline = pipeline(1000);
    pipeline.ingest_text("The cat sat on the mat.", "cats").await.unwrap();
    pipeline.delete_document(&DocumentId::new("cats")).await.unwrap();

    assert_eq!(pipeline.ask("Where did the cat sit?").await.unwrap(), NO_CONTEXT_ANSWER);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_questions_during_ingestion() {
    let pipeline = Arc::new(pipeline(40));
    pipeline.ingest_text("The cat sat on the mat.", "cats").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                let text = format!("Document number {i} talks about parks and dogs running.");
                pipeline.ingest_text(&text, &format!("doc-{i}")).await.map(|_| String::new())
            } else {
                pipeline.ask("Where did the cat sit?").await
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(pipeline.retriever().indexed_chunks().await >= 5);
}
