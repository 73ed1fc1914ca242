//! Chat sessions and single-shot commands over a small on-disk corpus.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use qa_cli::{ChatSession, Cli, InteractionLog, Step, build_assistant};
use qa_rag::{
    AnswerSource, Assistant, FALLBACK_ANSWER, GREETING_RESPONSE, HashingEmbeddingProvider,
    MockGenerator, RagConfig,
};

const CORPUS: &str = r#"[
  {"QUESTION":"What are the admission requirements?","ANSWER":"You need a high school diploma and a passport."},
  {"QUESTION":"How much is tuition?","ANSWER":"Tuition fees depend on the programme."}
]"#;

fn write_corpus(dir: &Path) -> PathBuf {
    let path = dir.join("qa.json");
    std::fs::write(&path, CORPUS).unwrap();
    path
}

async fn assistant(dir: &Path, generator: MockGenerator) -> Arc<Assistant> {
    let assistant = Assistant::builder()
        .config(RagConfig::default())
        .corpus_file(write_corpus(dir))
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .generator(Arc::new(generator))
        .build()
        .await
        .unwrap();
    Arc::new(assistant)
}

fn offline_cli(corpus: &Path, index_dir: &Path) -> Cli {
    let args: [&OsStr; 7] = [
        OsStr::new("qa-assistant"),
        OsStr::new("--offline"),
        OsStr::new("--no-interaction-log"),
        OsStr::new("--corpus"),
        corpus.as_os_str(),
        OsStr::new("--index-dir"),
        index_dir.as_os_str(),
    ];
    Cli::try_parse_from(args).unwrap()
}

#[tokio::test]
async fn session_keeps_history_and_logs_each_answer() {
    let dir = tempfile::tempdir().unwrap();
    let generator = MockGenerator::new().with_reply("Bring a diploma.");
    let assistant = assistant(dir.path(), generator).await;
    let log = InteractionLog::new(dir.path().join("logs/chat_log.txt"));
    let mut session = ChatSession::new(assistant, Some(log.clone()));

    assert_eq!(session.handle("hello").await, Step::Reply(GREETING_RESPONSE.to_string()));
    assert_eq!(
        session.handle("What are the admission requirements?").await,
        Step::Reply("Bring a diploma.".to_string())
    );
    assert_eq!(session.handle("   ").await, Step::Continue);

    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history()[0].answer.source, AnswerSource::Greeting);
    assert_eq!(session.history()[1].answer.source, AnswerSource::Model);

    let Step::Reply(history) = session.handle("/history").await else {
        panic!("expected history listing");
    };
    assert!(history.contains("1. You: hello"));
    assert!(history.contains("2. You: What are the admission requirements?"));

    let written = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(written.matches("| Question: ").count(), 2);
    assert!(written.contains("| Source: model"));
}

#[tokio::test]
async fn clear_and_exit() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = assistant(dir.path(), MockGenerator::new()).await;
    let mut session = ChatSession::new(assistant, None);

    session.handle("hi").await;
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.handle("/clear").await, Step::Reply("History cleared.".to_string()));
    assert!(session.history().is_empty());
    assert_eq!(session.handle("/history").await, Step::Reply("No questions yet.".to_string()));
    assert_eq!(session.handle("quit").await, Step::Exit);
}

#[tokio::test]
async fn unrelated_question_is_still_grounded_in_retrieved_context() {
    let dir = tempfile::tempdir().unwrap();
    let generator = MockGenerator::new().with_reply(FALLBACK_ANSWER);
    let assistant = assistant(dir.path(), generator).await;
    let mut session = ChatSession::new(assistant, None);

    assert_eq!(
        session.handle("asdkjasjd completely unrelated gibberish").await,
        Step::Reply(FALLBACK_ANSWER.to_string())
    );
    assert_eq!(session.history()[0].answer.source, AnswerSource::Model);
}

#[tokio::test]
async fn offline_flags_build_a_retrieval_only_assistant() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path());
    let index_dir = dir.path().join("index");
    let cli = offline_cli(&corpus, &index_dir);

    let assistant = build_assistant(&cli).await.unwrap();
    let answer = assistant.answer("What are the admission requirements?").await;

    assert_eq!(answer.source, AnswerSource::ContextFallback);
    assert!(answer.text.contains("high school diploma"));
    assert!(index_dir.join("manifest.json").exists());
}

#[tokio::test]
async fn missing_corpus_is_a_startup_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    let cli = offline_cli(&missing, &dir.path().join("index"));

    let err = build_assistant(&cli).await.err().unwrap();
    assert!(format!("{err:#}").contains("nope.json"));
}
