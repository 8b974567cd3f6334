//! optimizeql LLM - model backends behind the `LlmProvider` trait
//!
//! One provider type per backend family: OpenAI-compatible chat completions
//! (with presets for several vendors), OpenRouter, Anthropic messages and
//! Google Gemini. `create_provider` resolves a `ProviderKind` against the
//! runtime `Settings`.

mod anthropic;
mod factory;
mod gemini;
mod http;
mod openai;
mod openrouter;

pub use anthropic::AnthropicProvider;
pub use factory::{ProviderKind, create_default_provider, create_provider, create_provider_by_name};
pub use gemini::GeminiProvider;
pub use openai::OpenAiCompatibleProvider;
pub use openrouter::OpenRouterProvider;

pub use optimizeql_core::{LlmError, LlmProvider, LlmResult};
