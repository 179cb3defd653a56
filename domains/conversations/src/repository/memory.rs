//! In-memory conversation store
//!
//! Backs unit and API tests without a database and doubles as the storage
//! backend for local demos. All mutation happens under one mutex, giving the
//! same atomicity the Postgres store gets from transactions. Storage faults
//! can be injected to exercise failure paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use livedesk_common::{Error, Result};
use uuid::Uuid;

use crate::domain::entities::{Conversation, ConversationStatus, Message, SenderType};
use crate::feed::{ChangeEvent, ChangeFeed, ChangeKind, Topic};
use crate::repository::ConversationStore;

#[derive(Default)]
struct Inner {
    conversations: HashMap<Uuid, Conversation>,
    /// Insertion order of conversation ids, oldest first
    directory_order: Vec<Uuid>,
    messages: HashMap<Uuid, Vec<Message>>,
    fail_next_append: bool,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    feed: Arc<ChangeFeed>,
}

impl MemoryStore {
    pub fn new(feed: Arc<ChangeFeed>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            feed,
        }
    }

    /// Make the next `append_message` fail before writing anything
    pub fn fail_next_append(&self) {
        self.inner.lock().expect("store lock poisoned").fail_next_append = true;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store lock poisoned")
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<Conversation> {
        {
            let mut inner = self.lock();
            inner
                .conversations
                .insert(conversation.id, conversation.clone());
            inner.directory_order.push(conversation.id);
            inner.messages.entry(conversation.id).or_default();
        }

        self.feed.publish(ChangeEvent {
            topic: Topic::Conversations,
            kind: ChangeKind::Insert,
            entity: conversation.id,
        });

        Ok(conversation.clone())
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.lock()
            .conversations
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let inner = self.lock();
        // created_at descending, insertion order breaking ties
        let conversations = inner
            .directory_order
            .iter()
            .rev()
            .filter_map(|id| inner.conversations.get(id).cloned())
            .collect();
        Ok(conversations)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ConversationStatus,
    ) -> Result<Conversation> {
        let updated = {
            let mut inner = self.lock();
            let conversation = inner
                .conversations
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;
            conversation.status = status;
            conversation.clone()
        };

        self.feed.publish(ChangeEvent {
            topic: Topic::Conversations,
            kind: ChangeKind::Update,
            entity: id,
        });

        Ok(updated)
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        content: &str,
        sender_type: SenderType,
    ) -> Result<Message> {
        Message::validate_content(content)?;

        let created = {
            let mut inner = self.lock();

            if !inner.conversations.contains_key(&conversation_id) {
                return Err(Error::NotFound("Conversation not found".to_string()));
            }

            // Fault injection happens before any mutation, so a failed append
            // leaves both the log and the directory untouched.
            if inner.fail_next_append {
                inner.fail_next_append = false;
                return Err(Error::Storage("Simulated storage failure".to_string()));
            }

            let log = inner.messages.entry(conversation_id).or_default();
            let sequence = log.last().map(|m| m.sequence).unwrap_or(0) + 1;
            let message =
                Message::new(conversation_id, content.to_string(), sender_type, sequence)?;
            log.push(message.clone());

            if let Some(conversation) = inner.conversations.get_mut(&conversation_id) {
                conversation.last_message = Some(message.content.clone());
            }

            message
        };

        self.feed.publish(ChangeEvent {
            topic: Topic::Messages(conversation_id),
            kind: ChangeKind::Insert,
            entity: created.id,
        });
        self.feed.publish(ChangeEvent {
            topic: Topic::Conversations,
            kind: ChangeKind::Update,
            entity: conversation_id,
        });

        Ok(created)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let inner = self.lock();
        if !inner.conversations.contains_key(&conversation_id) {
            return Err(Error::NotFound("Conversation not found".to_string()));
        }
        Ok(inner
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}
