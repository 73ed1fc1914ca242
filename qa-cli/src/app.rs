//! Wires the flags into the assistant and runs the chosen command.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use qa_rag::{
    Assistant, ChatConfig, CorpusSource, EmbeddingProvider, Generator, HashingEmbeddingProvider,
    OpenAIChatClient, OpenAIEmbeddingProvider, prepare_index,
};
use tracing::info;

use crate::cli::{Cli, Command, EmbedderKind};
use crate::console::{ChatSession, run_chat};
use crate::interaction_log::InteractionLog;

/// A generator that never produces text, so every answer with usable
/// context is the retrieved context itself.
#[derive(Debug, Default)]
pub struct RetrievalOnly;

#[async_trait]
impl Generator for RetrievalOnly {
    fn name(&self) -> &str {
        "retrieval-only"
    }

    async fn complete(&self, _prompt: &str) -> qa_rag::Result<String> {
        Ok(String::new())
    }
}

/// The embedding provider selected by `--embedder`.
///
/// # Errors
///
/// Fails when the OpenAI provider is selected without an API key.
pub fn embedding_provider(cli: &Cli) -> qa_rag::Result<Arc<dyn EmbeddingProvider>> {
    match cli.embedder {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbeddingProvider::default())),
        EmbedderKind::Openai => {
            let mut provider = OpenAIEmbeddingProvider::from_env()?;
            if let Some(model) = &cli.embedding_model {
                provider = provider.with_model(model);
            }
            if let Some(base) = &cli.embedding_api_base {
                provider = provider.with_base_url(base);
            }
            Ok(Arc::new(provider))
        }
    }
}

/// The generative model, or [`RetrievalOnly`] with `--offline`.
///
/// # Errors
///
/// Fails when `OPENAI_API_KEY` is missing and `--offline` is not set.
pub fn generator(cli: &Cli) -> qa_rag::Result<Arc<dyn Generator>> {
    if cli.offline {
        info!("offline mode: answers come from retrieved context only");
        return Ok(Arc::new(RetrievalOnly));
    }
    let client = OpenAIChatClient::new(ChatConfig::from_env()?)?;
    let config = client.config();
    info!(model = %config.model, base_url = %config.base_url, "chat model configured");
    Ok(Arc::new(client))
}

/// Load the corpus, open or build the index, and build the assistant.
///
/// # Errors
///
/// Propagates configuration, corpus, embedding, and index failures.
pub async fn build_assistant(cli: &Cli) -> anyhow::Result<Assistant> {
    let config = cli.rag_config().context("invalid configuration")?;
    let generator =
        generator(cli).context("chat model unavailable (set OPENAI_API_KEY or pass --offline)")?;
    let provider = embedding_provider(cli).context("embedding provider unavailable")?;

    Assistant::builder()
        .config(config)
        .corpus_file(&cli.corpus)
        .index_dir(&cli.index_dir)
        .embedding_provider(provider)
        .generator(generator)
        .rebuild(cli.rebuild)
        .build()
        .await
        .with_context(|| format!("failed to prepare assistant from {}", cli.corpus.display()))
}

fn interaction_log(cli: &Cli) -> Option<InteractionLog> {
    (!cli.no_interaction_log).then(|| InteractionLog::new(&cli.log_file))
}

/// Run the command selected on the command line.
///
/// # Errors
///
/// Returns startup failures; answering a question never fails.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.selected_command() {
        Command::Build => {
            let config = cli.rag_config().context("invalid configuration")?;
            let provider = embedding_provider(&cli).context("embedding provider unavailable")?;
            let corpus = CorpusSource::File(cli.corpus.clone());
            let index = prepare_index(&config, &corpus, Some(&cli.index_dir), provider, true)
                .await
                .with_context(|| format!("failed to build index from {}", cli.corpus.display()))?;
            println!(
                "Indexed {} chunks into {} ({})",
                index.len(),
                cli.index_dir.display(),
                index.manifest().model_id
            );
        }
        Command::Ask { question } => {
            let assistant = build_assistant(&cli).await?;
            let question = question.join(" ");
            let answer = assistant.answer(&question).await;
            if let Some(log) = interaction_log(&cli) {
                log.record(&question, &answer).await;
            }
            println!("{}", answer.text);
        }
        Command::Chat => {
            let assistant = Arc::new(build_assistant(&cli).await?);
            run_chat(ChatSession::new(assistant, interaction_log(&cli))).await?;
        }
    }
    Ok(())
}
