//! # qa-cli
//!
//! Console front end for the [`qa_rag`] assistant: flags and environment
//! configuration, logging setup, the interaction log, and the chat loop.

pub mod app;
pub mod cli;
pub mod console;
pub mod interaction_log;
pub mod telemetry;

pub use app::{RetrievalOnly, build_assistant, run};
pub use cli::{Cli, Command, EmbedderKind};
pub use console::{ChatSession, ChatTurn, Input, Step, parse_input};
pub use interaction_log::InteractionLog;
pub use telemetry::{LogFormat, init_tracing};
