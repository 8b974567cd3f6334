use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn response(body: serde_json::Value) -> ChatResponse {
    serde_json::from_value(body).unwrap()
}

#[test]
fn test_first_choice_content() {
    let body = response(json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": "{\"summary\":\"ok\"}"}, "finish_reason": "stop"},
            {"index": 1, "message": {"role": "assistant", "content": "ignored"}, "finish_reason": "stop"}
        ]
    }));
    assert_eq!(first_choice_content(body, "gpt-4o"), "{\"summary\":\"ok\"}");
}

#[test]
fn test_no_choices_is_empty_string() {
    let body = response(json!({"id": "chatcmpl-2", "choices": []}));
    assert_eq!(first_choice_content(body, "gpt-4o"), "");
}

#[test]
fn test_null_content_is_empty_string() {
    let body = response(json!({
        "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "length"}]
    }));
    assert_eq!(first_choice_content(body, "deepseek-chat"), "");
}

#[test]
fn test_request_shape() {
    let request = ChatRequest {
        model: "gpt-4o",
        max_tokens: 128,
        messages: [
            ChatMessage {
                role: "system",
                content: "sys",
            },
            ChatMessage {
                role: "user",
                content: "hi",
            },
        ],
    };
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "model": "gpt-4o",
            "max_tokens": 128,
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hi"}
            ]
        })
    );
}

#[test]
fn test_provider_reports_name_and_model() {
    let provider = OpenAiCompatibleProvider::new("deepseek", "sk-test", "deepseek-chat", "https://api.deepseek.com/v1")
        .unwrap();
    assert_eq!(provider.name(), "deepseek");
    assert_eq!(provider.model(), "deepseek-chat");
    assert_eq!(provider.base_url(), "https://api.deepseek.com/v1");
}
