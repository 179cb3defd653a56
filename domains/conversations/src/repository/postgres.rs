//! PostgreSQL-backed conversation store

use std::sync::Arc;

use async_trait::async_trait;
use livedesk_common::{Error, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{Conversation, ConversationStatus, Message, SenderType};
use crate::feed::{ChangeEvent, ChangeFeed, ChangeKind, Topic};
use crate::repository::ConversationStore;

const CONVERSATION_COLUMNS: &str = "id, user_name, user_email, user_phone, page_title, \
     last_message, status, created_at";

const MESSAGE_COLUMNS: &str = "id, conversation_id, content, sender_type, sequence, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    feed: Arc<ChangeFeed>,
}

impl PgStore {
    pub fn new(pool: PgPool, feed: Arc<ChangeFeed>) -> Self {
        Self { pool, feed }
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<Conversation> {
        let created = sqlx::query_as::<_, Conversation>(&format!(
            r#"
            INSERT INTO conversations (
                id, user_name, user_email, user_phone, page_title,
                last_message, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CONVERSATION_COLUMNS}
            "#,
        ))
        .bind(conversation.id)
        .bind(&conversation.user_name)
        .bind(&conversation.user_email)
        .bind(&conversation.user_phone)
        .bind(&conversation.page_title)
        .bind(&conversation.last_message)
        .bind(conversation.status)
        .bind(conversation.created_at)
        .fetch_one(&self.pool)
        .await?;

        self.feed.publish(ChangeEvent {
            topic: Topic::Conversations,
            kind: ChangeKind::Insert,
            entity: created.id,
        });

        Ok(created)
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conversations = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY created_at DESC",
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ConversationStatus,
    ) -> Result<Conversation> {
        let updated = sqlx::query_as::<_, Conversation>(&format!(
            r#"
            UPDATE conversations SET status = $2
            WHERE id = $1
            RETURNING {CONVERSATION_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;

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

        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent appends to one conversation; it also
        // makes the MAX(sequence) read safe.
        let exists = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM conversations WHERE id = $1 FOR UPDATE",
        )
        .bind(conversation_id)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            return Err(Error::NotFound("Conversation not found".to_string()));
        }

        let sequence = sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM messages WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_one(&mut *tx)
        .await?;

        let message = Message::new(conversation_id, content.to_string(), sender_type, sequence)?;

        let created = sqlx::query_as::<_, Message>(&format!(
            r#"
            INSERT INTO messages (id, conversation_id, content, sender_type, sequence, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MESSAGE_COLUMNS}
            "#,
        ))
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(&message.content)
        .bind(message.sender_type)
        .bind(message.sequence)
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await?;

        // Trailing step of the same transaction: last_message can never be
        // observed ahead of the message it reflects.
        sqlx::query("UPDATE conversations SET last_message = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(&created.content)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            conversation_id = %conversation_id,
            sender = %created.sender_type,
            sequence = created.sequence,
            "Message appended"
        );

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
        // Existence check so an unknown conversation is NotFound, not empty
        self.get_conversation(conversation_id).await?;

        let messages = sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE conversation_id = $1
            ORDER BY sequence ASC
            "#,
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }
}
