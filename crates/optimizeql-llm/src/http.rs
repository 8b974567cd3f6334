//! HTTP plumbing shared by every backend

use optimizeql_core::{LlmError, LlmResult};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Analysis prompts are large and answers can take a while
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest slice of an error body kept in an error message
const ERROR_BODY_LIMIT: usize = 500;

pub(crate) fn build_client() -> LlmResult<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| LlmError::ProviderUnavailable(format!("Failed to create HTTP client: {}", e)))
}

/// Join a base URL and a path without doubling the slash
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub(crate) fn send_error(error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Network(error.to_string())
    }
}

/// Turn a non-success status into the matching `LlmError`
pub(crate) async fn check_status(response: Response, provider: &str) -> LlmResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, provider, &body))
}

pub(crate) fn status_error(status: StatusCode, provider: &str, body: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::Authentication(format!("{} rejected the API key", provider))
        }
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited(format!("{} rate limit exceeded", provider)),
        _ => LlmError::InvalidResponse(format!(
            "Status {}: {}",
            status,
            body.chars().take(ERROR_BODY_LIMIT).collect::<String>()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(endpoint("http://localhost:8080/v1", "messages"), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "openai", ""),
            LlmError::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "openai", ""),
            LlmError::RateLimited(_)
        ));
        let err = status_error(StatusCode::BAD_GATEWAY, "openai", &"x".repeat(2000));
        match err {
            LlmError::InvalidResponse(msg) => {
                assert!(msg.starts_with("Status 502"));
                assert!(msg.len() < 600);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
