//! Domain entities for the Conversations domain
//!
//! A `Conversation` is a thread between one end user and the company side;
//! a `Message` is one turn in that thread. Entities validate their own
//! construction rules; persistence-level guarantees (sequencing, last-message
//! denormalization) live in the repository layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use livedesk_common::{Error, Result};

/// Conversation status, mutated only by explicit agent action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "conversation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Open,
    Waiting,
    Resolved,
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationStatus::Open => write!(f, "open"),
            ConversationStatus::Waiting => write!(f, "waiting"),
            ConversationStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Which side of the conversation sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sender_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Company,
}

impl std::fmt::Display for SenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SenderType::User => write!(f, "user"),
            SenderType::Company => write!(f, "company"),
        }
    }
}

/// Maximum name string length (varchar(200))
const MAX_NAME_LENGTH: usize = 200;

/// Maximum email string length (varchar(320))
const MAX_EMAIL_LENGTH: usize = 320;

/// Maximum phone string length (varchar(50))
const MAX_PHONE_LENGTH: usize = 50;

/// Maximum page title length (varchar(200))
const MAX_PAGE_TITLE_LENGTH: usize = 200;

/// Conversation entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: String,
    pub page_title: String,
    pub last_message: Option<String>,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new conversation from intake form fields
    pub fn new(
        user_name: String,
        user_email: String,
        user_phone: String,
        page_title: String,
    ) -> Result<Self> {
        if user_name.trim().is_empty() {
            return Err(Error::Validation("Name is required".to_string()));
        }
        if user_name.len() > MAX_NAME_LENGTH {
            return Err(Error::Validation(format!(
                "Name must be at most {} characters",
                MAX_NAME_LENGTH
            )));
        }

        if user_email.trim().is_empty() {
            return Err(Error::Validation("Email is required".to_string()));
        }
        if user_email.len() > MAX_EMAIL_LENGTH {
            return Err(Error::Validation(format!(
                "Email must be at most {} characters",
                MAX_EMAIL_LENGTH
            )));
        }

        if user_phone.len() > MAX_PHONE_LENGTH {
            return Err(Error::Validation(format!(
                "Phone must be at most {} characters",
                MAX_PHONE_LENGTH
            )));
        }

        if page_title.len() > MAX_PAGE_TITLE_LENGTH {
            return Err(Error::Validation(format!(
                "Page title must be at most {} characters",
                MAX_PAGE_TITLE_LENGTH
            )));
        }

        Ok(Conversation {
            id: Uuid::new_v4(),
            user_name,
            user_email,
            user_phone,
            page_title,
            last_message: None,
            status: ConversationStatus::default(),
            created_at: Utc::now(),
        })
    }
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
    pub sender_type: SenderType,
    /// Insertion order within the conversation; the tie-breaker when two
    /// messages share a `created_at` timestamp
    pub sequence: i32,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(
        conversation_id: Uuid,
        content: String,
        sender_type: SenderType,
        sequence: i32,
    ) -> Result<Self> {
        Self::validate_content(&content)?;
        Self::validate_sequence(sequence)?;

        Ok(Message {
            id: Uuid::new_v4(),
            conversation_id,
            content,
            sender_type,
            sequence,
            created_at: Utc::now(),
        })
    }

    /// Validate message content (CHECK (length(trim(content)) > 0))
    pub fn validate_content(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(Error::Validation(
                "Message content cannot be empty or whitespace-only".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate sequence (CHECK (sequence >= 1))
    fn validate_sequence(sequence: i32) -> Result<()> {
        if sequence < 1 {
            return Err(Error::Validation(
                "Message sequence must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
