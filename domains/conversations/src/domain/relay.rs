//! AI relay: turns a conversation's history into a persisted company reply
//!
//! Reply generation for one conversation is serialized behind a
//! per-conversation gate, so no two replies can be produced from overlapping
//! histories. Provider failures surface as `Upstream` errors and never leave
//! a persisted side effect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use livedesk_common::{Error, Result};
use livedesk_relay::{ChatMessage, ChatRole, CompletionRequest, CompletionService};
use uuid::Uuid;

use crate::domain::entities::{Message, SenderType};
use crate::repository::ConversationStore;

/// Fixed instruction prepended to every provider call
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful customer service assistant. Be concise, professional, and friendly.";

pub struct AiRelay {
    store: Arc<dyn ConversationStore>,
    completions: Arc<dyn CompletionService>,
    /// Per-conversation reply gates; scoped per id so unrelated
    /// conversations never contend
    gates: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl AiRelay {
    pub fn new(store: Arc<dyn ConversationStore>, completions: Arc<dyn CompletionService>) -> Self {
        Self {
            store,
            completions,
            gates: Mutex::new(HashMap::new()),
        }
    }

    fn gate(&self, conversation_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().expect("relay gate lock poisoned");
        gates
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Generate and persist a company reply for the conversation.
    ///
    /// The history is read under the gate rather than taken from the caller:
    /// a caller-captured transcript could already be stale by the time its
    /// turn comes.
    pub async fn reply(&self, conversation_id: Uuid) -> Result<Message> {
        let gate = self.gate(conversation_id);
        let _guard = gate.lock().await;

        let history = self.store.list_messages(conversation_id).await?;

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage {
            role: ChatRole::System,
            content: SYSTEM_INSTRUCTION.to_string(),
        });
        messages.extend(history.iter().map(|m| ChatMessage {
            role: match m.sender_type {
                SenderType::User => ChatRole::User,
                SenderType::Company => ChatRole::Assistant,
            },
            content: m.content.clone(),
        }));

        let request = CompletionRequest {
            model: String::new(),
            messages,
            temperature: None,
            max_tokens: None,
        };

        tracing::debug!(
            conversation_id = %conversation_id,
            turns = history.len(),
            "Requesting AI reply"
        );

        let response = self.completions.complete(request).await?;

        if response.content.trim().is_empty() {
            return Err(Error::Upstream(
                "Provider returned an empty completion".to_string(),
            ));
        }

        let message = self
            .store
            .append_message(conversation_id, &response.content, SenderType::Company)
            .await?;

        tracing::info!(
            conversation_id = %conversation_id,
            message_id = %message.id,
            model = %response.model,
            "AI reply persisted"
        );

        Ok(message)
    }
}
