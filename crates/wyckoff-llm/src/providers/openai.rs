//! OpenAI-compatible provider implementation
//!
//! Speaks the chat-completions protocol. Besides the official endpoint, the
//! same provider serves relays and self-hosted gateways by pointing
//! `api_base` elsewhere.
//!
//! # Example
//!
//! ```no_run
//! use wyckoff_llm::{CompletionRequest, LLMProvider, Message};
//! use wyckoff_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OpenAIConfig::new("sk-...")
//!     .with_api_base("https://relay.example.com/v1")
//!     .with_name("relay");
//! let provider = OpenAIProvider::with_config(config)?;
//!
//! let request = CompletionRequest::new("gpt-4o")
//!     .with_message(Message::user("Hello!"));
//! let response = provider.complete(request).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

use super::{DEFAULT_TIMEOUT_SECS, http_error};
use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMError, LLMProvider, Message, Result,
    Role, StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Configuration for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL (default: "https://api.openai.com/v1")
    pub api_base: String,

    /// Per-request timeout, seconds
    pub timeout_secs: u64,

    /// Label reported by [`LLMProvider::name`] (default: "openai")
    pub name: String,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            name: "openai".to_string(),
        }
    }

    /// Create config from `{PREFIX}_API_KEY` and optional `{PREFIX}_API_BASE`
    ///
    /// `from_env_prefix("OPENAI")` reads `OPENAI_API_KEY` / `OPENAI_API_BASE`,
    /// `from_env_prefix("RELAY")` reads `RELAY_API_KEY` / `RELAY_API_BASE`.
    pub fn from_env_prefix(prefix: &str) -> Result<Self> {
        let key_var = format!("{prefix}_API_KEY");
        let api_key = wyckoff_utils::env_opt(&key_var).ok_or_else(|| {
            LLMError::ConfigurationError(format!("{key_var} environment variable not set"))
        })?;
        let api_base =
            wyckoff_utils::env_or(&format!("{prefix}_API_BASE"), DEFAULT_OPENAI_API_BASE);

        Ok(Self::new(api_key)
            .with_api_base(api_base)
            .with_name(prefix.to_ascii_lowercase()))
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the provider label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// OpenAI-compatible chat-completions provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a new provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider from `{PREFIX}_API_KEY` / `{PREFIX}_API_BASE`
    pub fn from_env_prefix(prefix: &str) -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env_prefix(prefix)?)
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(
        skip(self, request),
        fields(model = %request.model, api_base = %self.config.api_base)
    )]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to {}", self.config.api_base);

        let openai_request = OpenAIRequest {
            model: request.model.clone(),
            messages: build_openai_messages(request.system, request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&openai_request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

        let text = choice.message.content.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LLMError::EmptyResponse);
        }

        let finish_reason = choice.finish_reason.unwrap_or_default();
        debug!("Received response - finish_reason: {finish_reason}");

        Ok(CompletionResponse {
            message: Message::assistant(text),
            stop_reason: map_stop_reason(&finish_reason),
            usage: openai_response.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

// Wire format: request

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: OpenAIContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

// Wire format: response

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

/// System instruction goes first in the messages array for this protocol
fn build_openai_messages(system: Option<String>, messages: Vec<Message>) -> Vec<OpenAIMessage> {
    let mut result = Vec::with_capacity(messages.len() + 1);

    if let Some(sys) = system {
        result.push(OpenAIMessage {
            role: "system",
            content: OpenAIContent::Text(sys),
        });
    }

    result.extend(messages.into_iter().map(convert_message));
    result
}

fn convert_message(msg: Message) -> OpenAIMessage {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };

    let content = match msg.content.as_slice() {
        // plain string content for text-only turns
        [ContentBlock::Text { text }] => OpenAIContent::Text(text.clone()),
        _ => OpenAIContent::Parts(
            msg.content
                .into_iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => ContentPart::Text { text },
                    ContentBlock::Image { source } => ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: source.data_url(),
                        },
                    },
                })
                .collect(),
        ),
    };

    OpenAIMessage { role, content }
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "length" => StopReason::MaxTokens,
        "content_filter" => {
            debug!("Content filtered by provider safety systems");
            StopReason::ContentFilter
        }
        _ => StopReason::EndTurn,
    }
}
