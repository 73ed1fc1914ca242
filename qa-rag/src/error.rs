//! Error types for the `qa-rag` crate.

use thiserror::Error;

/// Errors that can occur while loading, indexing, retrieving, or answering.
#[derive(Debug, Error)]
pub enum RagError {
    /// The question/answer corpus could not be read or parsed.
    #[error("Corpus load error ({path}): {message}")]
    CorpusLoadError {
        /// The corpus source that failed to load.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The persisted index is missing, unreadable, corrupted, or was built
    /// with a different embedding model.
    #[error("Index unavailable ({path}): {message}")]
    IndexUnavailableError {
        /// The index directory.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generative model call failed (timeout, auth, rate limit, bad response).
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagError {
    pub(crate) fn index_unavailable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IndexUnavailableError { path: path.into(), message: message.into() }
    }

    pub(crate) fn corpus(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorpusLoadError { path: path.into(), message: message.into() }
    }

    /// Whether the error leaves the process unable to serve queries.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::GenerationError { .. } | Self::EmbeddingError { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
