//! Answer policy.
//!
//! Every query walks the same chain and stops at the first terminal state:
//!
//! 1. **Greeting**: the trimmed, lower-cased query is a greeting token;
//!    reply with [`GREETING_RESPONSE`] without retrieving anything.
//! 2. **NoContext**: nothing was retrieved, or the newline-joined passages
//!    are shorter than `min_context_chars` after trimming; reply with
//!    [`FALLBACK_ANSWER`].
//! 3. **Generate**: send the grounding prompt to the generator, bounded by
//!    `generation_timeout`, and trim the reply.
//! 4. **DegenerateAnswer**: the reply is empty, contains "i don't know",
//!    or the call failed or timed out; reply with the joined passages
//!    themselves (or [`FALLBACK_ANSWER`] if they are empty).
//! 5. **Success**: reply with the generated text.
//!
//! The policy keeps no state between calls and never returns an error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::generation::{FALLBACK_ANSWER, Generator, grounding_prompt};
use crate::retriever::ContextRetriever;

/// Reply to a greeting.
pub const GREETING_RESPONSE: &str = "👋 Hello! How can I assist you today?";

/// Queries that are answered with [`GREETING_RESPONSE`].
pub const GREETING_TOKENS: [&str; 5] = ["hi", "hello", "hey", "merhaba", "greetings"];

/// Which terminal state produced an [`Answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// The query was a greeting.
    Greeting,
    /// Retrieval found nothing usable.
    NoContext,
    /// The generator produced the answer.
    Model,
    /// The generator failed or gave a degenerate reply; the retrieved
    /// context was returned instead.
    ContextFallback,
}

impl AnswerSource {
    /// Stable lower-case name, as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::NoContext => "no_context",
            Self::Model => "model",
            Self::ContextFallback => "context_fallback",
        }
    }
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The text returned to the user and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// User-facing answer text.
    pub text: String,
    /// Terminal state that produced `text`.
    pub source: AnswerSource,
}

impl Answer {
    fn new(text: impl Into<String>, source: AnswerSource) -> Self {
        Self { text: text.into(), source }
    }
}

/// Whether `query` is one of the [`GREETING_TOKENS`].
pub fn is_greeting(query: &str) -> bool {
    let normalized = query.trim().to_lowercase();
    GREETING_TOKENS.contains(&normalized.as_str())
}

/// Whether a generated answer is unusable: empty, or admitting ignorance.
pub fn is_degenerate(answer: &str) -> bool {
    let lowered = answer.trim().to_lowercase();
    lowered.is_empty() || lowered.contains("i don't know") || lowered.contains("i don\u{2019}t know")
}

/// Decides how each query is answered. See the module docs for the states.
pub struct AnswerPolicy {
    retriever: Arc<dyn ContextRetriever>,
    generator: Arc<dyn Generator>,
    min_context_chars: usize,
    generation_timeout: Duration,
}

impl AnswerPolicy {
    /// Create a policy using `min_context_chars` and `generation_timeout`
    /// from `config`.
    pub fn new(
        retriever: Arc<dyn ContextRetriever>,
        generator: Arc<dyn Generator>,
        config: &RagConfig,
    ) -> Self {
        Self {
            retriever,
            generator,
            min_context_chars: config.min_context_chars,
            generation_timeout: config.generation_timeout,
        }
    }

    /// Answer `query`. Always returns text.
    pub async fn answer(&self, query: &str) -> Answer {
        if is_greeting(query) {
            debug!(state = "greeting", "answered greeting");
            return Answer::new(GREETING_RESPONSE, AnswerSource::Greeting);
        }

        let passages = match self.retriever.retrieve(query).await {
            Ok(passages) => passages,
            Err(e) => {
                error!(error = %e, "retrieval failed; treating as no context");
                Vec::new()
            }
        };
        let context = passages.join("\n");

        if passages.is_empty() || context.trim().chars().count() < self.min_context_chars {
            info!(state = "no_context", passage_count = passages.len(), "no usable context");
            return Answer::new(FALLBACK_ANSWER, AnswerSource::NoContext);
        }

        let prompt = grounding_prompt(query, &context);
        let generated =
            match tokio::time::timeout(self.generation_timeout, self.generator.complete(&prompt))
                .await
            {
                Ok(Ok(text)) => Some(text.trim().to_string()),
                Ok(Err(e)) => {
                    warn!(generator = self.generator.name(), error = %e, "generation failed");
                    None
                }
                Err(_) => {
                    warn!(
                        generator = self.generator.name(),
                        timeout_secs = self.generation_timeout.as_secs_f64(),
                        "generation timed out"
                    );
                    None
                }
            };

        match generated {
            Some(text) if !is_degenerate(&text) => {
                info!(state = "success", passage_count = passages.len(), "answered from model");
                Answer::new(text, AnswerSource::Model)
            }
            _ => {
                info!(state = "degenerate_answer", "falling back to retrieved context");
                if context.is_empty() {
                    Answer::new(FALLBACK_ANSWER, AnswerSource::NoContext)
                } else {
                    Answer::new(context, AnswerSource::ContextFallback)
                }
            }
        }
    }

    /// Answer `query`, returning only the text.
    pub async fn answer_text(&self, query: &str) -> String {
        self.answer(query).await.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_detection_trims_and_folds_case() {
        assert!(is_greeting("hello"));
        assert!(is_greeting("  Hello "));
        assert!(is_greeting("MERHABA"));
        assert!(is_greeting("Greetings\n"));
        assert!(!is_greeting("hello there"));
        assert!(!is_greeting("hi!"));
        assert!(!is_greeting(""));
    }

    #[test]
    fn degenerate_detection() {
        assert!(is_degenerate(""));
        assert!(is_degenerate("   "));
        assert!(is_degenerate("I don't know."));
        assert!(is_degenerate("Honestly, I DON'T KNOW the answer"));
        assert!(is_degenerate("I don\u{2019}t know"));
        assert!(!is_degenerate("You need a diploma."));
        assert!(!is_degenerate("I do not have that"));
    }

    #[test]
    fn source_names() {
        assert_eq!(AnswerSource::ContextFallback.to_string(), "context_fallback");
        assert_eq!(
            serde_json::to_string(&AnswerSource::NoContext).unwrap(),
            "\"no_context\""
        );
    }
}
