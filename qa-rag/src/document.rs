//! Data types for corpus records, documents, chunks, and search results.

use serde::{Deserialize, Serialize};

/// A single question/answer pair as stored in the corpus source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QaRecord {
    /// The question text.
    #[serde(rename = "QUESTION")]
    pub question: String,
    /// The answer text.
    #[serde(rename = "ANSWER")]
    pub answer: String,
}

impl QaRecord {
    /// Create a record from a question and its answer.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// A source document derived from one [`QaRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Unique identifier for the document (`qa_{record_index}`).
    pub id: String,
    /// The text content of the document.
    pub text: String,
}

impl Document {
    /// Render a record into its document form.
    pub fn from_record(index: usize, record: &QaRecord) -> Self {
        Self {
            id: format!("qa_{index}"),
            text: format!("Question: {}\nAnswer: {}", record.question, record.answer),
        }
    }
}

/// A segment of a [`Document`] with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk (`{document_id}_{chunk_index}`).
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The unit-length embedding for this chunk's text. Empty until indexed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk within its document.
    pub chunk_index: usize,
    /// Character offset of the chunk start within the document text.
    pub start_char: usize,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
