//! Scripted [`Generator`] for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::generation::Generator;

/// One scripted reply.
#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Error(String),
    Delayed(Duration, String),
}

/// A [`Generator`] that replays scripted replies and records every prompt.
///
/// Replies are consumed in order; once the script is exhausted the last
/// reply repeats. An empty script answers with an empty string.
///
/// # Example
///
/// ```rust,ignore
/// use qa_rag::{Generator, MockGenerator};
///
/// let generator = MockGenerator::new().with_reply("Diploma and passport.");
/// assert_eq!(generator.complete("prompt").await?, "Diploma and passport.");
/// assert_eq!(generator.prompts(), vec!["prompt".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct MockGenerator {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Create a generator with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a successful reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Reply::Text(text.into()))
    }

    /// Append a failing reply.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(Reply::Error(message.into()))
    }

    /// Append a reply that arrives after `delay`.
    pub fn with_delayed_reply(self, delay: Duration, text: impl Into<String>) -> Self {
        self.push(Reply::Delayed(delay, text.into()))
    }

    /// Every prompt received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of completed or attempted calls.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    fn push(self, reply: Reply) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    fn next_reply(&self) -> Option<Reply> {
        let popped = self.replies.lock().ok()?.pop_front();
        let mut last = self.last.lock().ok()?;
        if let Some(reply) = popped {
            *last = Some(reply);
        }
        last.clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match self.next_reply() {
            None => Ok(String::new()),
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Error(message)) => {
                Err(RagError::GenerationError { provider: "mock".into(), message })
            }
            Some(Reply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_then_repeats_last() {
        let generator = MockGenerator::new().with_reply("one").with_error("rate limited");
        assert_eq!(generator.complete("a").await.unwrap(), "one");
        assert!(generator.complete("b").await.is_err());
        assert!(generator.complete("c").await.is_err());
        assert_eq!(generator.call_count(), 3);
    }

    #[tokio::test]
    async fn empty_script_answers_empty() {
        let generator = MockGenerator::new();
        assert_eq!(generator.complete("a").await.unwrap(), "");
    }
}
