use async_trait::async_trait;
use optimizeql_core::{LlmProvider, LlmResult};

use crate::openai::{ChatResponse, OpenAiCompatibleProvider};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// OpenRouter, an OpenAI-compatible gateway.
///
/// Some "thinking" models routed through it leave `content` empty and put
/// the answer in `reasoning_content` or `reasoning`; those are used as a
/// fallback.
pub struct OpenRouterProvider {
    inner: OpenAiCompatibleProvider,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> LlmResult<Self> {
        Self::with_base_url(api_key, model, OPENROUTER_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> LlmResult<Self> {
        Ok(Self {
            inner: OpenAiCompatibleProvider::new("openrouter", api_key, model, base_url)?,
        })
    }
}

pub(crate) fn content_with_reasoning_fallback(response: ChatResponse, model: &str) -> String {
    let served_by = response.model.clone().unwrap_or_else(|| model.to_string());
    let Some(choice) = response.choices.into_iter().next() else {
        tracing::error!(model = %served_by, "OpenRouter returned no choices");
        return String::new();
    };

    let message = choice.message;
    if let Some(content) = message.content.filter(|c| !c.is_empty()) {
        return content;
    }

    let reasoning = [message.reasoning_content, message.reasoning]
        .into_iter()
        .flatten()
        .find(|r| !r.is_empty());
    match reasoning {
        Some(reasoning) => {
            tracing::warn!(
                model = %served_by,
                chars = reasoning.len(),
                "empty content, using the reasoning field instead"
            );
            reasoning
        }
        None => {
            tracing::error!(
                model = %served_by,
                finish_reason = ?choice.finish_reason,
                "OpenRouter returned empty content"
            );
            String::new()
        }
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    #[tracing::instrument(skip_all, fields(provider = "openrouter", model = %self.inner.model()))]
    async fn generate(&self, system_prompt: &str, user_message: &str, max_tokens: u32) -> LlmResult<String> {
        let response = self.inner.chat(system_prompt, user_message, max_tokens).await?;
        Ok(content_with_reasoning_fallback(response, self.inner.model()))
    }
}
