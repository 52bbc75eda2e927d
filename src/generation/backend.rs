//! Completion backends.
//!
//! The capability trait keeps orchestration independent of the concrete
//! endpoint; `ChatBackend` speaks the OpenAI-compatible chat-completions
//! dialect used by proxy providers.

use crate::errors::GenerationError;
use crate::rag::prompt::Prompt;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sends a finished prompt to a text-generation endpoint.
///
/// `complete` makes exactly one attempt and classifies failures; retry
/// handling lives in the generation client.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, GenerationError>;

    /// Cheap reachability probe for diagnostics
    async fn ping(&self) -> bool;

    /// Model name, for health reporting
    fn model(&self) -> &str;
}

/// OpenAI-compatible chat-completions backend
#[derive(Debug, Clone)]
pub struct ChatBackend {
    client: Client,
    base_url: String,
    model: String,
    api_token: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl ChatBackend {
    pub fn new(config: &crate::config::BackendConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenerationError::Fatal(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_token: config.api_token.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn bearer_token(&self) -> Result<&str, GenerationError> {
        self.api_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GenerationError::Fatal("API token is not configured".to_string()))
    }
}

#[async_trait]
impl CompletionBackend for ChatBackend {
    async fn complete(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let token = self.bearer_token()?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system_instructions().to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user_message(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: 0.9,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            GenerationError::Fatal(format!("unexpected response shape: {}", e))
        })?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Fatal("response contained no choices".to_string()))?;

        Ok(answer.trim().to_string())
    }

    async fn ping(&self) -> bool {
        let mut request = self.client.get(format!("{}/models", self.base_url));
        if let Some(token) = self.api_token.as_deref() {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Transient vs. fatal classification for HTTP status codes.
///
/// Rate limits, request timeouts, and server-side errors are worth
/// retrying; authentication and malformed-request responses are not.
fn classify_status(status: StatusCode, body: &str) -> GenerationError {
    let detail: String = body.chars().take(200).collect();

    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT {
        return GenerationError::Retryable(format!("HTTP {}: {}", status.as_u16(), detail));
    }

    if status.is_server_error() {
        return GenerationError::Retryable(format!("HTTP {}: {}", status.as_u16(), detail));
    }

    GenerationError::Fatal(format!("HTTP {}: {}", status.as_u16(), detail))
}

fn classify_transport_error(error: reqwest::Error) -> GenerationError {
    if error.is_timeout() {
        GenerationError::Retryable("request timed out".to_string())
    } else {
        GenerationError::Retryable(format!("transport error: {}", error))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, GenerationError::Retryable(_)));
    }

    #[test]
    fn test_server_errors_are_retryable() {
        for code in [500u16, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(matches!(
                classify_status(status, ""),
                GenerationError::Retryable(_)
            ));
        }
    }

    #[test]
    fn test_auth_errors_are_fatal() {
        for code in [400u16, 401, 403, 404] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(matches!(
                classify_status(status, ""),
                GenerationError::Fatal(_)
            ));
        }
    }

    #[test]
    fn test_status_detail_is_truncated() {
        let long_body = "x".repeat(1000);
        let err = classify_status(StatusCode::BAD_GATEWAY, &long_body);
        assert!(err.to_string().len() < 300);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let backend = ChatBackend::new(&BackendConfig {
            base_url: "http://localhost:8000/v1/".to_string(),
            ..BackendConfig::default()
        })
        .unwrap();
        assert_eq!(backend.base_url, "http://localhost:8000/v1");
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_any_request() {
        let backend = ChatBackend::new(&BackendConfig::default()).unwrap();
        let prompt = Prompt::for_test("question");

        let result = backend.complete(&prompt).await;
        assert!(matches!(result, Err(GenerationError::Fatal(_))));
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![ChatMessage {
                role: "system".to_string(),
                content: "instructions".to_string(),
            }],
            temperature: 0.3,
            max_tokens: 800,
            top_p: 0.9,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "system");
    }
}
