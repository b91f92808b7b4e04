//! Word-bounded document chunking.
//!
//! Text is split on whitespace only and never inside a word. Words are
//! accumulated into a buffer; once the buffer's length (each word plus one
//! separator) reaches the target size it is flushed as a chunk. There is no
//! overlap between chunks and no sentence detection.

use crate::document::{Chunk, Document};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no words.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Split `text` into passages of roughly `target_chunk_size` characters.
///
/// A single word longer than the target becomes its own chunk untruncated.
/// Joining the result with single spaces reproduces the input's word sequence.
///
/// # Example
///
/// ```rust
/// use docqa_rag::chunking::split_words;
///
/// let chunks = split_words("alpha beta gamma", 11);
/// assert_eq!(chunks, vec!["alpha beta", "gamma"]);
/// ```
pub fn split_words(text: &str, target_chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0;

    for word in text.split_whitespace() {
        current.push(word);
        current_size += word.chars().count() + 1;

        if current_size >= target_chunk_size {
            chunks.push(current.join(" "));
            current.clear();
            current_size = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

/// [`Chunker`] that applies [`split_words`] with a fixed target size.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::WordChunker;
///
/// let chunker = WordChunker::new(1000);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WordChunker {
    chunk_size: usize,
}

impl WordChunker {
    /// Create a chunker targeting `chunk_size` characters per chunk.
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// The target chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split raw text with this chunker's target size.
    pub fn split(&self, text: &str) -> Vec<String> {
        split_words(text, self.chunk_size)
    }
}

impl Chunker for WordChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| Chunk {
                content,
                source: document.id.clone(),
                chunk_index,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_input_produce_no_chunks() {
        assert!(split_words("", 10).is_empty());
        assert!(split_words(" \n\t  ", 10).is_empty());
    }

    #[test]
    fn flushes_when_size_reaches_target() {
        // "ab " = 3, "cd " = 3 -> 6 reaches target 6
        assert_eq!(split_words("ab cd ef", 6), vec!["ab cd", "ef"]);
    }

    #[test]
    fn long_word_is_its_own_chunk() {
        let chunks = split_words("a supercalifragilistic b", 5);
        assert_eq!(chunks, vec!["a supercalifragilistic", "b"]);

        let chunks = split_words("supercalifragilistic", 5);
        assert_eq!(chunks, vec!["supercalifragilistic"]);
    }

    #[test]
    fn collapses_mixed_whitespace() {
        let chunks = split_words("one\n\ntwo\tthree   four", 1000);
        assert_eq!(chunks, vec!["one two three four"]);
    }

    #[test]
    fn chunks_carry_source_and_index() {
        let doc = Document::from_text("one two three four five six", "book");
        let chunks = WordChunker::new(8).chunk(&doc);

        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.source.as_str(), "book");
        }
        assert_eq!(chunks[0].content, "one two");
    }
}
