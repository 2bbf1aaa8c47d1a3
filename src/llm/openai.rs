//! OpenAI-compatible chat completions client

use super::CompletionClient;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::metrics::METRICS;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Completion client for any `/chat/completions` endpoint
pub struct OpenAiCompletionClient {
    client: Client,
    config: LlmConfig,
    api_key: Option<SecretString>,
}

impl OpenAiCompletionClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LlmError::InitializationError(e.to_string()))?;

        let api_key = config.api_key.clone().map(SecretString::new);
        if api_key.is_none() {
            warn!("No API key configured for {}", config.api_url);
        }

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    async fn send_once(&self, request: &ChatCompletionRequest<'_>) -> Result<String, Attempt> {
        let mut req = self.client.post(&self.config.api_url).json(request);
        if let Some(ref api_key) = self.api_key {
            req = req.bearer_auth(api_key.expose_secret());
        }

        let response = req
            .send()
            .await
            .map_err(|e| Attempt::Retry(LlmError::NetworkError(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = LlmError::ApiError(format!("HTTP {}: {}", status, body));
            return Err(if is_retryable(status) {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            Attempt::Fatal(LlmError::ApiError(format!("Failed to parse response: {}", e)))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Attempt::Fatal(LlmError::ApiError("No choices in response".to_string())))?;

        choice
            .message
            .content
            .ok_or(Attempt::Fatal(LlmError::EmptyCompletion))
    }
}

enum Attempt {
    Retry(LlmError),
    Fatal(LlmError),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
        };

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {} for completion", attempt);
                tokio::time::sleep(self.config.retry_backoff() * (1u32 << (attempt - 1).min(10))).await;
            }

            match self.send_once(&request).await {
                Ok(content) => {
                    METRICS.record_llm_request(true);
                    return Ok(content);
                }
                Err(Attempt::Retry(e)) => {
                    warn!("Completion request failed: {}", e);
                    last_error = Some(e);
                }
                Err(Attempt::Fatal(e)) => {
                    error!("Completion request failed: {}", e);
                    METRICS.record_llm_request(false);
                    return Err(e);
                }
            }
        }

        METRICS.record_llm_request(false);
        Err(last_error.unwrap_or(LlmError::EmptyCompletion))
    }
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
