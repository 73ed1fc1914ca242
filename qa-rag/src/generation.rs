//! Generative model abstraction and the grounding prompt.

use async_trait::async_trait;

use crate::error::Result;

/// The sentence returned whenever no usable information is available.
pub const FALLBACK_ANSWER: &str = "I'm sorry, but I don't have information on this topic.";

/// A text-completion backend.
///
/// One synchronous-from-the-caller's-view request per prompt. Failures
/// (network, auth, rate limit, malformed response) are reported as
/// [`RagError::GenerationError`](crate::RagError::GenerationError).
#[async_trait]
pub trait Generator: Send + Sync {
    /// Name of the model behind this generator, for logs.
    fn name(&self) -> &str;

    /// Complete `prompt` and return the raw model output.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build the grounding prompt sent to the generator.
///
/// The model is told to answer only from `context`, never to guess, to skip
/// introductions, and to reply with [`FALLBACK_ANSWER`] when the context
/// does not cover the question.
pub fn grounding_prompt(query: &str, context: &str) -> String {
    format!(
        "Below is the available information for answering student inquiries about the university.

Follow this order when answering:
1. Use only the information provided below.
2. If the information lacks relevant details, do not fill the gap yourself.
3. If no useful information is found, respond with: \"{FALLBACK_ANSWER}\"

Important rules:
- Do not start with introductions or greetings. Provide the answer directly.
- If no information is available, do not add lengthy explanations.
- Never make up or guess information.

Available information:
{context}

Question:
{query}

---
If no relevant information is found, simply say:
\"{FALLBACK_ANSWER}\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_context_query_and_fallback() {
        let prompt = grounding_prompt(
            "What are the admission requirements?",
            "Question: What are the admission requirements?\nAnswer: A diploma.",
        );
        let context_at = prompt.find("Answer: A diploma.").unwrap();
        let question_at = prompt.rfind("What are the admission requirements?").unwrap();
        assert!(context_at < question_at);
        assert_eq!(prompt.matches(FALLBACK_ANSWER).count(), 2);
        assert!(prompt.contains("Never make up or guess information."));
    }
}
