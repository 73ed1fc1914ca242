//! Startup wiring: corpus → chunks → index → answer policy.
//!
//! [`Assistant`] is the narrow interface the outer surface calls:
//! `answer(query)` once per submitted question. It can only be obtained
//! from a completely built index, and it is `Send + Sync`, so one instance
//! behind an `Arc` can serve any number of concurrent sessions.
//!
//! # Example
//!
//! ```rust,ignore
//! use qa_rag::{Assistant, HashingEmbeddingProvider, MockGenerator, RagConfig};
//!
//! let assistant = Assistant::builder()
//!     .config(RagConfig::default())
//!     .corpus_file("MyQ&A_cleaned.json")
//!     .index_dir("./vistula_index")
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .generator(Arc::new(MockGenerator::new()))
//!     .build()
//!     .await?;
//!
//! println!("{}", assistant.answer_text("What are the admission requirements?").await);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::corpus;
use crate::document::{Chunk, QaRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::index::{EmbeddingIndex, IndexHandle};
use crate::policy::{Answer, AnswerPolicy};
use crate::retriever::Retriever;

/// Where the question/answer records come from.
#[derive(Debug, Clone)]
pub enum CorpusSource {
    /// A JSON file read once at startup.
    File(PathBuf),
    /// Records already in memory.
    Records(Vec<QaRecord>),
}

impl CorpusSource {
    /// Load the records and cut them into chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CorpusLoadError`] if the file cannot be loaded.
    pub async fn load_chunks(&self, chunker: &dyn Chunker) -> Result<Vec<Chunk>> {
        let documents = match self {
            Self::File(path) => corpus::load_documents(path).await?,
            Self::Records(records) => corpus::to_documents(records),
        };
        Ok(chunker.chunk_all(&documents))
    }
}

/// Load the corpus, chunk it, and open or build the index.
///
/// With `index_dir` set the index is reused from disk when valid and
/// persisted after a build; without it the index lives only in memory.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] for invalid chunking parameters,
/// [`RagError::CorpusLoadError`] if the corpus cannot be read, and any
/// embedding or storage failure from building the index.
pub async fn prepare_index(
    config: &RagConfig,
    corpus: &CorpusSource,
    index_dir: Option<&Path>,
    provider: Arc<dyn EmbeddingProvider>,
    rebuild: bool,
) -> Result<EmbeddingIndex> {
    config.validate()?;
    let chunker = FixedSizeChunker::from_config(config)?;
    let chunks = corpus.load_chunks(&chunker).await?;
    info!(chunk_count = chunks.len(), model = %provider.model_id(), "prepared corpus chunks");

    match index_dir {
        Some(dir) => EmbeddingIndex::open_or_build(dir, chunks, provider, rebuild).await,
        None => EmbeddingIndex::build(chunks, provider).await,
    }
}

/// The question-answering entry point.
pub struct Assistant {
    index: Arc<EmbeddingIndex>,
    policy: AnswerPolicy,
}

impl Assistant {
    /// Create a new [`AssistantBuilder`].
    pub fn builder() -> AssistantBuilder {
        AssistantBuilder::default()
    }

    /// Wire an assistant over a fully built index.
    pub fn new(
        index: Arc<EmbeddingIndex>,
        generator: Arc<dyn Generator>,
        config: &RagConfig,
    ) -> Self {
        let retriever = Arc::new(Retriever::new(index.clone(), config));
        let policy = AnswerPolicy::new(retriever, generator, config);
        Self { index, policy }
    }

    /// Answer `query` with the text and the state that produced it.
    pub async fn answer(&self, query: &str) -> Answer {
        self.policy.answer(query).await
    }

    /// Answer `query`, returning only the text.
    pub async fn answer_text(&self, query: &str) -> String {
        self.policy.answer_text(query).await
    }

    /// The index answering queries.
    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }
}

/// Builder for an [`Assistant`].
///
/// `corpus`, `embedding_provider`, and `generator` are required; `config`
/// defaults to [`RagConfig::default`]. Passing a shared
/// [`IndexHandle`] lets several assistants reuse one index built once.
#[derive(Default)]
pub struct AssistantBuilder {
    config: Option<RagConfig>,
    corpus: Option<CorpusSource>,
    index_dir: Option<PathBuf>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn Generator>>,
    index_handle: Option<Arc<IndexHandle>>,
    rebuild: bool,
}

impl AssistantBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Read the corpus from a JSON file.
    pub fn corpus_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus = Some(CorpusSource::File(path.into()));
        self
    }

    /// Use in-memory records as the corpus.
    pub fn records(mut self, records: Vec<QaRecord>) -> Self {
        self.corpus = Some(CorpusSource::Records(records));
        self
    }

    /// Persist the index in (and reuse it from) `dir`.
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generative model.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Share a readiness-gated index slot with other assistants.
    ///
    /// Once the handle holds an index, `build` reuses it as is: this
    /// builder's corpus, index directory, chunking settings, and embedding
    /// provider are not consulted again.
    pub fn index_handle(mut self, handle: Arc<IndexHandle>) -> Self {
        self.index_handle = Some(handle);
        self
    }

    /// Ignore any stored index and rebuild from the corpus.
    pub fn rebuild(mut self, rebuild: bool) -> Self {
        self.rebuild = rebuild;
        self
    }

    /// Load the corpus, make the index ready, and build the [`Assistant`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the config is invalid, and propagates failures from
    /// [`prepare_index`].
    pub async fn build(self) -> Result<Assistant> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let corpus =
            self.corpus.ok_or_else(|| RagError::ConfigError("corpus is required".to_string()))?;
        let provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        let handle = self.index_handle.unwrap_or_default();
        let index_dir = self.index_dir;
        let rebuild = self.rebuild;

        if handle.is_ready() {
            debug!("index handle already initialised; ignoring corpus and embedding settings");
        }

        let index = handle
            .get_or_try_init(|| {
                prepare_index(&config, &corpus, index_dir.as_deref(), provider, rebuild)
            })
            .await?;

        Ok(Assistant::new(index, generator, &config))
    }
}
