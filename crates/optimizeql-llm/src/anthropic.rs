use async_trait::async_trait;
use optimizeql_core::{LlmError, LlmProvider, LlmResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http::{build_client, check_status, endpoint, send_error};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> LlmResult<Self> {
        Self::with_base_url(api_key, model, ANTHROPIC_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> LlmResult<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            client: build_client()?,
        })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Concatenate the text blocks of a Messages response
fn response_text(response: MessagesResponse, model: &str) -> String {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    if text.is_empty() {
        tracing::error!(model = %model, stop_reason = ?response.stop_reason, "Anthropic returned no text");
    }
    text
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[tracing::instrument(skip_all, fields(provider = "anthropic", model = %self.model))]
    async fn generate(&self, system_prompt: &str, user_message: &str, max_tokens: u32) -> LlmResult<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            system: system_prompt,
            messages: [UserMessage {
                role: "user",
                content: user_message,
            }],
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;

        let response: MessagesResponse = check_status(response, "anthropic")
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(response_text(response, &self.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_response_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "{\"summary\":"},
                {"type": "text", "text": "\"fine\"}"}
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        assert_eq!(response_text(response, "claude"), "{\"summary\":\"fine\"}");
    }

    #[test]
    fn test_response_without_text_is_empty() {
        let response: MessagesResponse =
            serde_json::from_value(json!({"content": [], "stop_reason": "max_tokens"})).unwrap();
        assert_eq!(response_text(response, "claude"), "");
    }

    #[test]
    fn test_request_shape() {
        let request = MessagesRequest {
            model: "claude-sonnet",
            max_tokens: 4096,
            system: "be terse",
            messages: [UserMessage {
                role: "user",
                content: "SELECT 1",
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "claude-sonnet",
                "max_tokens": 4096,
                "system": "be terse",
                "messages": [{"role": "user", "content": "SELECT 1"}]
            })
        );
    }
}
