//! AI completion provider client for LiveDesk
//!
//! Speaks the OpenAI-compatible chat-completions protocol over HTTPS with a
//! bearer credential. The provider is configured by environment (endpoint,
//! credential, model, timeout); a deterministic mock is available for tests
//! and local development.

pub mod mock;
pub mod openai;

pub use mock::MockCompletionService;
pub use openai::OpenAiService;

use livedesk_common::Config;
use serde::{Deserialize, Serialize};

/// Role of a chat message sent to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of the chat history, in provider wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// A completion request: full history (system instruction included) plus
/// sampling parameters. Empty `model` falls back to the configured default.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A successful completion
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
}

/// Errors from the completion provider boundary
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The HTTP request could not be sent or the connection failed
    #[error("Request failed: {0}")]
    Request(String),

    /// The provider did not answer within the configured timeout
    #[error("Provider call timed out")]
    Timeout,

    /// The provider answered with a non-success status
    #[error("Provider error: {0}")]
    Response(String),

    /// The provider answered 2xx but the body did not have the expected
    /// `{choices: [{message: {role, content}}]}` shape
    #[error("Malformed provider response: {0}")]
    Protocol(String),
}

impl From<RelayError> for livedesk_common::Error {
    // Protocol errors are treated as upstream failures by callers; both mean
    // "no reply was generated, nothing was persisted".
    fn from(err: RelayError) -> Self {
        livedesk_common::Error::Upstream(err.to_string())
    }
}

/// Completion service abstraction
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    /// Request a completion for the given history
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, RelayError>;

    /// Model used when the request does not name one
    fn default_model(&self) -> &str;
}

/// Provider configuration, extracted from the application [`Config`]
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub provider: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// Sampling defaults applied when a request leaves them unset
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

impl RelayConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider: config.ai_provider.clone(),
            api_key: config.ai_api_key.clone(),
            base_url: config.ai_base_url.clone(),
            default_model: config.ai_model.clone(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: config.ai_timeout_secs,
        }
    }
}

/// Factory for completion services, selected by the `provider` field
pub struct CompletionServiceFactory;

impl CompletionServiceFactory {
    pub fn create(config: RelayConfig) -> anyhow::Result<Box<dyn CompletionService>> {
        match config.provider.as_str() {
            "openai" => Ok(Box::new(OpenAiService::new(config))),
            "mock" => Ok(Box::new(MockCompletionService::new())),
            other => Err(anyhow::anyhow!("Unknown AI provider: {}", other)),
        }
    }
}
