//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use qa_rag::RagConfig;

use crate::telemetry::LogFormat;

/// University question-answering assistant.
///
/// Every option can also be set through the environment variable shown in
/// `--help`; a `.env` file in the working directory is loaded first.
#[derive(Debug, Clone, Parser)]
#[command(name = "qa-assistant", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// JSON file holding the question/answer records.
    #[arg(long, env = "QA_CORPUS", default_value = "MyQ&A_cleaned.json", global = true)]
    pub corpus: PathBuf,

    /// Directory the embedding index is persisted in.
    #[arg(long, env = "QA_INDEX_DIR", default_value = "./vistula_index", global = true)]
    pub index_dir: PathBuf,

    /// Embedding backend.
    #[arg(
        long,
        env = "QA_EMBEDDER",
        value_enum,
        default_value_t = EmbedderKind::Hashing,
        global = true
    )]
    pub embedder: EmbedderKind,

    /// Embedding model for `--embedder openai`.
    #[arg(long, env = "QA_EMBEDDING_MODEL", global = true)]
    pub embedding_model: Option<String>,

    /// API base for `--embedder openai`.
    #[arg(long, env = "QA_EMBEDDING_API_BASE", global = true)]
    pub embedding_api_base: Option<String>,

    /// Answer from retrieved context only, without calling a language model.
    #[arg(long, env = "QA_OFFLINE", global = true)]
    pub offline: bool,

    /// Passages retrieved per question.
    #[arg(long, env = "QA_TOP_K", default_value_t = 4, global = true)]
    pub top_k: usize,

    /// Drop retrieved passages scoring at or below this similarity.
    #[arg(long, env = "QA_SIMILARITY_THRESHOLD", global = true)]
    pub similarity_threshold: Option<f32>,

    /// Maximum characters per chunk.
    #[arg(long, env = "QA_CHUNK_SIZE", default_value_t = 800, global = true)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks.
    #[arg(long, env = "QA_CHUNK_OVERLAP", default_value_t = 200, global = true)]
    pub chunk_overlap: usize,

    /// Seconds to wait for the language model before falling back.
    #[arg(long, env = "QA_GENERATION_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub generation_timeout_secs: u64,

    /// Append-only interaction log.
    #[arg(long, env = "QA_LOG_FILE", default_value = "logs/chat_log.txt", global = true)]
    pub log_file: PathBuf,

    /// Do not write the interaction log.
    #[arg(long, global = true)]
    pub no_interaction_log: bool,

    /// Diagnostic log format on stderr.
    #[arg(
        long,
        env = "QA_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,

    /// Ignore any stored index and rebuild it from the corpus.
    #[arg(long, global = true)]
    pub rebuild: bool,
}

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Load the corpus and (re)build the persisted index.
    Build,
    /// Answer a single question and exit.
    Ask {
        /// The question; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive chat (the default).
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Offline feature-hashing embeddings.
    Hashing,
    /// OpenAI-compatible embeddings API (needs `OPENAI_API_KEY`).
    Openai,
}

impl Cli {
    /// The pipeline configuration described by the flags.
    ///
    /// # Errors
    ///
    /// Returns [`qa_rag::RagError::ConfigError`] for inconsistent sizes.
    pub fn rag_config(&self) -> qa_rag::Result<RagConfig> {
        let mut builder = RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .generation_timeout(Duration::from_secs(self.generation_timeout_secs));
        if let Some(threshold) = self.similarity_threshold {
            builder = builder.similarity_threshold(threshold);
        }
        builder.build()
    }

    /// The subcommand to run, defaulting to chat.
    pub fn selected_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }
}
