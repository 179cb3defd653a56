//! Mock completion service implementation
//!
//! Minimal mock used by `CompletionServiceFactory` when provider is `"mock"`.
//! Returns deterministic responses for testing; failure and latency can be
//! injected for relay orchestration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{ChatRole, CompletionRequest, CompletionResponse, CompletionService, RelayError};

/// Mock completion service for testing
#[derive(Debug, Default)]
pub struct MockCompletionService {
    /// Fixed reply; when unset the mock echoes the last user message
    reply: Option<String>,
    /// When set, every call fails with this upstream-style error message
    fail_with: Option<String>,
    /// Artificial latency before answering
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockCompletionService {
    /// Create a new mock completion service
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that always answers with the given text
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Mock that fails every call
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Add artificial latency to each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completed calls
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CompletionService for MockCompletionService {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, RelayError> {
        tracing::info!("Mock completion service processing request");

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(ref message) = self.fail_with {
            return Err(RelayError::Response(message.clone()));
        }

        let model = if request.model.is_empty() {
            "mock-model".to_string()
        } else {
            request.model
        };

        let content = match self.reply {
            Some(ref fixed) => fixed.clone(),
            None => {
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == ChatRole::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("empty");
                format!("Mock response to: {}", last_user)
            }
        };

        Ok(CompletionResponse { content, model })
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }
}
