//! Concrete LLM provider implementations

pub mod gemini;
pub mod openai;

pub use gemini::{GeminiConfig, GeminiProvider};
pub use openai::{OpenAIConfig, OpenAIProvider};

/// Default per-call timeout for inference requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Map a non-success response to [`crate::LLMError::Http`]
pub(crate) async fn http_error(response: reqwest::Response) -> crate::LLMError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    crate::LLMError::Http { status, body }
}
