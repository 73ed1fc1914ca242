//! # qa-rag
//!
//! Retrieval-augmented question answering over a fixed question/answer corpus.
//!
//! ## Overview
//!
//! The corpus is loaded once, each record is rendered as
//! `"Question: {q}\nAnswer: {a}"`, split into overlapping fixed-size chunks,
//! embedded, and stored in an [`EmbeddingIndex`] persisted to disk. Each
//! query then runs through the [`AnswerPolicy`]:
//!
//! - greetings are answered directly
//! - queries with no usable context get [`FALLBACK_ANSWER`]
//! - otherwise a grounding prompt goes to the [`Generator`], and a
//!   degenerate or failed generation falls back to the retrieved context
//!
//! The policy never returns an error to the caller.
//!
//! ## Components
//!
//! | Component | Type |
//! |-----------|------|
//! | Corpus loader | [`corpus`] |
//! | Chunker | [`FixedSizeChunker`] |
//! | Embeddings | [`HashingEmbeddingProvider`], `openai::OpenAIEmbeddingProvider` |
//! | Index | [`EmbeddingIndex`], [`IndexHandle`] |
//! | Retriever | [`Retriever`] |
//! | Answer policy | [`AnswerPolicy`] |
//! | Generators | `chat::OpenAIChatClient`, [`MockGenerator`] |
//!
//! ## Features
//!
//! - `openai` – OpenAI embeddings and OpenAI-compatible chat completions

pub mod assistant;
#[cfg(feature = "openai")]
pub mod chat;
pub mod chunking;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod hashing;
pub mod index;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod policy;
pub mod retriever;

pub use assistant::{Assistant, AssistantBuilder, CorpusSource, prepare_index};
pub use chunking::{Chunker, FixedSizeChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, QaRecord, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{FALLBACK_ANSWER, Generator, grounding_prompt};
pub use hashing::{DEFAULT_HASHING_DIMENSIONS, HashingEmbeddingProvider};
pub use index::{EmbeddingIndex, IndexHandle, IndexManifest};
pub use mock::MockGenerator;
pub use policy::{Answer, AnswerPolicy, AnswerSource, GREETING_RESPONSE};
pub use retriever::{ContextRetriever, Retriever};

#[cfg(feature = "openai")]
pub use chat::{ChatConfig, OpenAIChatClient};
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
