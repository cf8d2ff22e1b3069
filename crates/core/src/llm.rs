//! Chat-completion client seam shared by both agent roles.

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestMessage, CreateChatCompletionRequestArgs, ResponseFormat},
};
use async_trait::async_trait;

/// Parameters for one chat completion call.
///
/// The two roles differ only in sampling temperature and whether they demand
/// a JSON object back, so one request shape serves both.
pub struct CompletionRequest {
    pub messages: Vec<ChatCompletionRequestMessage>,
    pub temperature: f32,
    pub json_object: bool,
}

/// A generic client for one-shot chat completions.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Makes a single, non-streaming call and returns the assistant text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// An implementation of `ChatClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The client configuration, including API key and base URL.
    /// * `model` - The model identifier to use for completions (e.g. "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl ChatClient for OpenAICompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(request.messages)
            .temperature(request.temperature);
        if request.json_object {
            args.response_format(ResponseFormat::JsonObject);
        }

        let response = self.client.chat().create(args.build()?).await?;
        let choice = response
            .choices
            .first()
            .context("no choices in completion response")?;
        choice
            .message
            .content
            .clone()
            .context("completion had no text content")
    }
}
