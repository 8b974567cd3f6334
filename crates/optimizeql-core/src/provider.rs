//! Model backend contract

use async_trait::async_trait;
use thiserror::Error;

/// Failure talking to a model backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Non-success status or a body that does not match the backend's protocol
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out")]
    Timeout,

    /// Unknown provider tag, missing API key or unusable base URL
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// Result type for model backend calls
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// A large-language-model backend.
///
/// `generate` returns an empty string when the backend answers without usable
/// content; only transport, authentication and protocol failures are errors.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider tag, e.g. `openrouter`
    fn name(&self) -> &str;

    /// Model identifier sent with each request
    fn model(&self) -> &str;

    async fn generate(&self, system_prompt: &str, user_message: &str, max_tokens: u32) -> LlmResult<String>;
}
