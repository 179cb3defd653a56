//! OpenAI-compatible chat completions implementation
//!
//! Calls `POST {base_url}/chat/completions` with a bearer credential using
//! the reqwest HTTP client. The default endpoint is Groq's OpenAI-compatible
//! API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    ChatMessage, CompletionRequest, CompletionResponse, CompletionService, RelayConfig, RelayError,
};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat completions request body
#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Chat completions response body
#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[allow(dead_code)]
    role: Option<String>,
    content: Option<String>,
}

/// OpenAI-compatible completion service implementation
pub struct OpenAiService {
    client: Client,
    config: RelayConfig,
    base_url: String,
}

impl OpenAiService {
    /// Create a new service from provider configuration
    pub fn new(config: RelayConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        // Bounded timeout: a hung provider call is an UpstreamError, never a
        // hung conversation.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            config,
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl CompletionService for OpenAiService {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, RelayError> {
        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model
        };

        let body = ChatCompletionsRequest {
            model: model.clone(),
            messages: request.messages,
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
        };

        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(model = %model, "Sending chat completions request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout
                } else {
                    RelayError::Request(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());

            return Err(RelayError::Response(format!(
                "Provider returned {}: {}",
                status, error_body
            )));
        }

        let api_response: ChatCompletionsResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Protocol(format!("Failed to parse response: {}", e)))?;

        let content = api_response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                RelayError::Protocol("Response contains no choices with a message".to_string())
            })?;

        Ok(CompletionResponse {
            content,
            model: api_response.model.unwrap_or(model),
        })
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }
}
