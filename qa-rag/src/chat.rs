//! OpenAI-compatible chat completion client.
//!
//! This module is only available when the `openai` feature is enabled. It
//! speaks the `/chat/completions` protocol shared by OpenAI, Groq, vLLM,
//! Ollama and friends, so any of them can back the answer policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::openai::ErrorResponse;

/// Default API base: Groq's OpenAI-compatible endpoint.
pub const DEFAULT_CHAT_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "llama3-8b-8192";

/// Settings for [`OpenAIChatClient`].
#[derive(Clone)]
pub struct ChatConfig {
    /// Bearer token sent with every request.
    pub api_key: String,
    /// API base URL without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature; `0.0` keeps answers stable.
    pub temperature: f32,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ChatConfig {
    /// Config with the default base URL, model, and a temperature of zero.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_CHAT_API_BASE.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
        }
    }

    /// Read the config from the process environment.
    ///
    /// - `OPENAI_API_KEY` (required)
    /// - `OPENAI_API_BASE` (optional, defaults to [`DEFAULT_CHAT_API_BASE`])
    /// - `QA_CHAT_MODEL` (optional, defaults to [`DEFAULT_CHAT_MODEL`])
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `OPENAI_API_KEY` is unset or empty.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RagError::ConfigError("OPENAI_API_KEY environment variable not set".to_string())
            })?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_API_BASE") {
            config = config.with_base_url(base_url);
        }
        if let Ok(model) = std::env::var("QA_CHAT_MODEL") {
            config = config.with_model(model);
        }
        Ok(config)
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A [`Generator`] calling an OpenAI-compatible `/chat/completions` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use qa_rag::chat::{ChatConfig, OpenAIChatClient};
///
/// let client = OpenAIChatClient::new(ChatConfig::from_env()?)?;
/// let answer = client.complete("Say hi").await?;
/// ```
pub struct OpenAIChatClient {
    client: reqwest::Client,
    config: ChatConfig,
}

impl OpenAIChatClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the API key is empty.
    pub fn new(config: ChatConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(RagError::ConfigError("chat API key must not be empty".to_string()));
        }
        Ok(Self { client: reqwest::Client::new(), config })
    }

    /// The config this client was created with.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn generation_error(&self, message: String) -> RagError {
        RagError::GenerationError { provider: self.config.model.clone(), message }
    }
}

// ── Chat completion request/response types ──────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Generator for OpenAIChatClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.config.model, prompt_len = prompt.len(), "chat completion");

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: self.config.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.config.model, error = %e, "chat request failed");
                self.generation_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            error!(model = %self.config.model, %status, "chat API error");
            return Err(self.generation_error(format!("API returned {status}: {detail}")));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(model = %self.config.model, error = %e, "failed to parse chat response");
            self.generation_error(format!("failed to parse response: {e}"))
        })?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}
