use async_trait::async_trait;
use optimizeql_core::{LlmError, LlmProvider, LlmResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http::{build_client, check_status, endpoint, send_error};

/// Chat-completions provider for any OpenAI-compatible API
/// (OpenAI, DeepSeek, xAI, Qwen, Meta Llama, Kimi, ...).
pub struct OpenAiCompatibleProvider {
    name: String,
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> LlmResult<Self> {
        Ok(Self {
            name: name.into(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            client: build_client()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST one chat completion and decode the response body
    pub(crate) async fn chat(
        &self,
        system_prompt: &str,
        user_message: &str,
        max_tokens: u32,
    ) -> LlmResult<ChatResponse> {
        let request = ChatRequest {
            model: &self.model,
            max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;

        check_status(response, &self.name)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[derive(Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub(crate) model: Option<String>,
    #[serde(default)]
    pub(crate) choices: Vec<ChatChoice>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatChoice {
    #[serde(default)]
    pub(crate) message: ChatChoiceMessage,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(default)]
    pub(crate) reasoning_content: Option<String>,
    #[serde(default)]
    pub(crate) reasoning: Option<String>,
}

/// Content of the first choice, or an empty string when there is none
pub(crate) fn first_choice_content(response: ChatResponse, model: &str) -> String {
    let Some(choice) = response.choices.into_iter().next() else {
        tracing::error!(model = %model, "provider returned no choices");
        return String::new();
    };

    let content = choice.message.content.unwrap_or_default();
    if content.is_empty() {
        tracing::error!(
            model = %model,
            finish_reason = ?choice.finish_reason,
            "provider returned empty content"
        );
    }
    content
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[tracing::instrument(skip_all, fields(provider = %self.name, model = %self.model))]
    async fn generate(&self, system_prompt: &str, user_message: &str, max_tokens: u32) -> LlmResult<String> {
        let response = self.chat(system_prompt, user_message, max_tokens).await?;
        Ok(first_choice_content(response, &self.model))
    }
}

#[cfg(test)]
mod tests;
