//! Conversation management API handlers (intake boundary + inbox)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use livedesk_common::{Result, ValidatedJson};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::ConversationsState;
use crate::domain::entities::ConversationStatus;
use crate::domain::session::{ConversationSession, IntakeForm};

/// Request for creating a conversation (the intake form)
#[derive(Debug, Deserialize, Validate)]
pub struct CreateConversationRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub page_title: String,
}

/// Request for updating a conversation's status (explicit agent action)
#[derive(Debug, Deserialize)]
pub struct UpdateConversationRequest {
    pub status: ConversationStatus,
}

/// Conversation response DTO
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: String,
    pub page_title: String,
    pub last_message: Option<String>,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
}

impl From<crate::domain::entities::Conversation> for ConversationResponse {
    fn from(c: crate::domain::entities::Conversation) -> Self {
        Self {
            id: c.id,
            user_name: c.user_name,
            user_email: c.user_email,
            user_phone: c.user_phone,
            page_title: c.page_title,
            last_message: c.last_message,
            status: c.status,
            created_at: c.created_at,
        }
    }
}

/// Create a new conversation from the intake form.
///
/// Runs the session's intake flow: conversation + personalized greeting
/// message, both visible to live subscribers via the change feed.
pub async fn create_conversation(
    State(state): State<ConversationsState>,
    ValidatedJson(req): ValidatedJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>)> {
    let mut session =
        ConversationSession::new(state.store.clone(), state.relay.clone(), state.feed.clone());

    let created = session
        .submit_intake(IntakeForm {
            name: req.name,
            email: req.email,
            phone: req.phone,
            page_title: req.page_title,
        })
        .await?;

    // Re-read so the response reflects the greeting in last_message
    let conversation = state.store.get_conversation(created.id).await?;
    Ok((StatusCode::CREATED, Json(conversation.into())))
}

/// List all conversations, most recent first (company inbox)
pub async fn list_conversations(
    State(state): State<ConversationsState>,
) -> Result<Json<Vec<ConversationResponse>>> {
    let conversations = state.store.list_conversations().await?;
    let responses: Vec<ConversationResponse> =
        conversations.into_iter().map(Into::into).collect();
    Ok(Json(responses))
}

/// Get a single conversation by ID
pub async fn get_conversation(
    State(state): State<ConversationsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationResponse>> {
    let conversation = state.store.get_conversation(id).await?;
    Ok(Json(conversation.into()))
}

/// Update a conversation's status
pub async fn update_conversation(
    State(state): State<ConversationsState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateConversationRequest>,
) -> Result<Json<ConversationResponse>> {
    let updated = state.store.update_status(id, req.status).await?;
    Ok(Json(updated.into()))
}
