//! Document chunking.
//!
//! [`FixedSizeChunker`] splits a document into windows of at most
//! `chunk_size` characters, each window starting `chunk_overlap` characters
//! before the end of the previous one. Sizes are counted in Unicode scalar
//! values, never bytes, so multi-byte text is never split mid-character.

use tracing::debug;

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text but no embeddings.
/// Embeddings are attached later when the index is built.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split every document, preserving document order.
    fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunk(d)).collect();
        debug!(document_count = documents.len(), chunk_count = chunks.len(), "chunked documents");
        chunks
    }
}

/// Splits text into fixed-size chunks by character count with overlap.
///
/// Every chunk except the last of a document is exactly `chunk_size`
/// characters long, and consecutive chunks share exactly `chunk_overlap`
/// characters. A document no longer than `chunk_size` yields one chunk.
///
/// # Example
///
/// ```rust
/// use qa_rag::{Chunker, Document, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(800, 200)?;
/// let doc = Document { id: "qa_0".into(), text: "Question: Q\nAnswer: A".into() };
/// assert_eq!(chunker.chunk(&doc).len(), 1);
/// # Ok::<(), qa_rag::RagError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    ///
    /// # Errors
    ///
    /// See [`FixedSizeChunker::new`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Character windows `(start, end)` covering a text of `len` characters.
    fn windows(&self, len: usize) -> Vec<(usize, usize)> {
        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(len);
            windows.push((start, end));
            if end == len {
                break;
            }
            start = end - self.chunk_overlap;
        }
        windows
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let text = &document.text;
        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let char_count = boundaries.len() - 1;

        self.windows(char_count)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start, end))| Chunk {
                id: format!("{}_{chunk_index}", document.id),
                text: text[boundaries[start]..boundaries[end]].to_string(),
                embedding: Vec::new(),
                document_id: document.id.clone(),
                chunk_index,
                start_char: start,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document { id: "qa_0".into(), text: text.into() }
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunker = FixedSizeChunker::new(800, 200).unwrap();
        let chunks = chunker.chunk(&doc("Question: Q\nAnswer: A"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Question: Q\nAnswer: A");
        assert_eq!(chunks[0].id, "qa_0_0");
        assert!(chunks[0].embedding.is_empty());
    }

    #[test]
    fn exact_size_document_is_one_chunk() {
        let chunker = FixedSizeChunker::new(800, 200).unwrap();
        assert_eq!(chunker.chunk(&doc(&"x".repeat(800))).len(), 1);
    }

    #[test]
    fn windows_back_up_by_overlap() {
        let chunker = FixedSizeChunker::new(10, 4).unwrap();
        let text: String = ('a'..='z').collect();
        let chunks = chunker.chunk(&doc(&text));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcdefghij", "ghijklmnop", "mnopqrstuv", "stuvwxyz"]);
        assert_eq!(chunks[2].start_char, 12);
        assert_eq!(chunks[3].chunk_index, 3);
    }

    #[test]
    fn no_redundant_tail_chunk() {
        // 1400 chars: [0, 800) and [600, 1400) already cover everything.
        let chunker = FixedSizeChunker::new(800, 200).unwrap();
        assert_eq!(chunker.chunk(&doc(&"y".repeat(1400))).len(), 2);
        assert_eq!(chunker.chunk(&doc(&"y".repeat(1401))).len(), 3);
    }

    #[test]
    fn multibyte_text_is_counted_in_chars() {
        let chunker = FixedSizeChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk(&doc("żółćęśą"));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["żółć", "ćęśą"]);
    }

    #[test]
    fn empty_document_has_no_chunks() {
        let chunker = FixedSizeChunker::new(800, 200).unwrap();
        assert!(chunker.chunk(&doc("")).is_empty());
    }

    #[test]
    fn invalid_sizes_are_config_errors() {
        assert!(matches!(FixedSizeChunker::new(200, 200), Err(RagError::ConfigError(_))));
        assert!(matches!(FixedSizeChunker::new(100, 300), Err(RagError::ConfigError(_))));
        assert!(matches!(FixedSizeChunker::new(0, 0), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn chunk_all_preserves_document_order() {
        let chunker = FixedSizeChunker::new(800, 200).unwrap();
        let docs = vec![
            Document { id: "qa_0".into(), text: "first".into() },
            Document { id: "qa_1".into(), text: "second".into() },
        ];
        let chunks = chunker.chunk_all(&docs);
        assert_eq!(chunks[0].document_id, "qa_0");
        assert_eq!(chunks[1].document_id, "qa_1");
    }
}
