//! OpenAI-compatible chat-completions client with retry for transient errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::error::{LlmError, RetryConfig};
use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient, TokenUsage};

/// Chat-completions client for OpenAI or any API speaking the same protocol.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    retry_config: RetryConfig,
}

impl OpenAiClient {
    /// Create a client for `<base_url>/chat/completions`.
    pub fn new(api_key: String, base_url: &str) -> Self {
        Self::with_retry_config(api_key, base_url, RetryConfig::default())
    }

    pub fn with_retry_config(api_key: String, base_url: &str, retry_config: RetryConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            retry_config,
        }
    }

    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, request: &CompletionRequest<'_>) -> Result<ChatResponse, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network_error(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    LlmError::network_error(format!("Connection failed: {}", e))
                } else {
                    LlmError::network_error(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body, retry_after));
        }

        parse_completion(&body, request.model)
    }

    async fn execute_with_retry(&self, request: &CompletionRequest<'_>) -> Result<ChatResponse, LlmError> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match self.execute_request(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(
                            "Completion succeeded after {} retries ({:?})",
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(response);
                }
                Err(error) => {
                    if !self.retry_config.should_retry(&error, attempt) {
                        tracing::error!("Completion failed after {} retries: {}", attempt, error);
                        return Err(error);
                    }

                    let remaining = self
                        .retry_config
                        .max_retry_duration
                        .saturating_sub(start.elapsed());
                    let delay = error.suggested_delay(attempt).min(remaining);
                    if delay.is_zero() {
                        tracing::warn!("Retry budget exhausted: {}", error);
                        return Err(error);
                    }

                    tracing::warn!(
                        "Completion attempt {} failed with {}, retrying in {:?}",
                        attempt + 1,
                        error.kind,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Turn a 2xx response body into a [`ChatResponse`].
fn parse_completion(body: &str, requested_model: &str) -> Result<ChatResponse, LlmError> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(500).collect();
        LlmError::parse_error(format!("Failed to parse response: {}, body: {}", e, preview))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::parse_error("No choices in response".to_string()))?;

    Ok(ChatResponse {
        content: choice.message.content,
        finish_reason: choice.finish_reason,
        usage: parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        model: parsed.model.or_else(|| Some(requested_model.to_string())),
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let request = CompletionRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        tracing::debug!("Sending completion request: model={}", model);

        self.execute_with_retry(&request).await
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let request = CompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: Some(0.1),
            max_tokens: Some(2000),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 2000);
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;
        let response = parse_completion(body, "gpt-4o-mini").unwrap();
        assert_eq!(response.text(), "hello");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.unwrap().total_tokens, 12);
        assert_eq!(response.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
    }

    #[test]
    fn test_parse_completion_without_choices() {
        let err = parse_completion(r#"{"choices": []}"#, "m").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ParseError);

        let err = parse_completion("not json", "m").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ParseError);
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = OpenAiClient::new("k".to_string(), "http://localhost:1234/v1/");
        assert_eq!(client.endpoint, "http://localhost:1234/v1/chat/completions");
    }
}
