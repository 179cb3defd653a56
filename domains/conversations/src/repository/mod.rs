//! Repository implementations for the Conversations domain
//!
//! The store is the single synchronization point of the system: every
//! mutation goes through one of its atomic operations, and every successful
//! write publishes to the change feed only after the write is durable.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use livedesk_common::Result;
use uuid::Uuid;

use crate::domain::entities::{Conversation, ConversationStatus, Message, SenderType};

/// Conversation directory + message store behind one trait.
///
/// Folding both behind a single seam lets `append_message` keep the directory
/// `last_message` equal to the newest stored message without a cross-object
/// transaction primitive in the interface.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persist a new conversation and publish a directory insert event
    async fn create_conversation(&self, conversation: &Conversation) -> Result<Conversation>;

    /// Fetch one conversation; `NotFound` when absent
    async fn get_conversation(&self, id: Uuid) -> Result<Conversation>;

    /// All conversations, most recently created first
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Explicit agent-side status change; publishes a directory update event
    async fn update_status(
        &self,
        id: Uuid,
        status: ConversationStatus,
    ) -> Result<Conversation>;

    /// Append a message and update the conversation's `last_message` as one
    /// atomic unit, then publish message-insert and directory-update events.
    ///
    /// Fails with `Validation` for empty/whitespace content and `NotFound`
    /// for an unknown conversation; on any failure nothing is written and
    /// nothing is published.
    async fn append_message(
        &self,
        conversation_id: Uuid,
        content: &str,
        sender_type: SenderType,
    ) -> Result<Message>;

    /// All messages of a conversation in insertion order; `NotFound` when
    /// the conversation does not exist
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>>;
}
