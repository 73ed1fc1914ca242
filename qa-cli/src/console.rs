//! Interactive chat console.
//!
//! The console owns the conversation history; the assistant itself answers
//! each question independently.

use std::sync::Arc;

use qa_rag::{Answer, Assistant};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, error, info};

use crate::interaction_log::InteractionLog;

const PROMPT: &str = "You: ";
const BANNER: &str = "Ask a question about the university. \
                      Type /history, /clear, or exit.";

/// One question and the answer shown for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub question: String,
    pub answer: Answer,
}

/// What a line of console input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Exit,
    History,
    Clear,
    Empty,
    Question(String),
}

/// Classify one line typed at the prompt.
pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    match trimmed.to_lowercase().as_str() {
        "" => Input::Empty,
        "exit" | "quit" | "/exit" | "/quit" => Input::Exit,
        "/history" => Input::History,
        "/clear" => Input::Clear,
        _ => Input::Question(trimmed.to_string()),
    }
}

/// Result of handling one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Print this and keep going.
    Reply(String),
    /// Nothing to print.
    Continue,
    /// Leave the loop.
    Exit,
}

/// A single user's conversation.
pub struct ChatSession {
    assistant: Arc<Assistant>,
    log: Option<InteractionLog>,
    history: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new(assistant: Arc<Assistant>, log: Option<InteractionLog>) -> Self {
        Self { assistant, log, history: Vec::new() }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Handle one line of input.
    pub async fn handle(&mut self, line: &str) -> Step {
        match parse_input(line) {
            Input::Exit => Step::Exit,
            Input::Empty => Step::Continue,
            Input::Clear => {
                self.history.clear();
                Step::Reply("History cleared.".to_string())
            }
            Input::History => Step::Reply(self.render_history()),
            Input::Question(question) => {
                let answer = self.assistant.answer(&question).await;
                if let Some(log) = &self.log {
                    log.record(&question, &answer).await;
                }
                let text = answer.text.clone();
                self.history.push(ChatTurn { question, answer });
                Step::Reply(text)
            }
        }
    }

    fn render_history(&self) -> String {
        if self.history.is_empty() {
            return "No questions yet.".to_string();
        }
        self.history
            .iter()
            .enumerate()
            .map(|(i, turn)| {
                format!("{}. You: {}\n   Assistant: {}", i + 1, turn.question, turn.answer.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Add a non-blank line to the editor's recall history.
fn remember(editor: &mut DefaultEditor, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    if let Err(e) = editor.add_history_entry(line) {
        debug!(error = %e, "failed to record line in editor history");
    }
}

/// Run the read-answer loop until `exit`, Ctrl-C, or end of input.
///
/// # Errors
///
/// Returns an error if the terminal cannot be initialised or read.
pub async fn run_chat(mut session: ChatSession) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("{BANNER}");

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                error!(error = %e, "failed to read input");
                return Err(e.into());
            }
        };
        remember(&mut editor, &line);

        match session.handle(&line).await {
            Step::Reply(text) => println!("Assistant: {text}\n"),
            Step::Continue => {}
            Step::Exit => break,
        }
    }

    info!(turns = session.history().len(), "chat session ended");
    println!("Goodbye!");
    Ok(())
}
