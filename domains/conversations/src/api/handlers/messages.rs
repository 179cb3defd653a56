//! Message API handlers (send boundary + transcript)

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
use crate::domain::entities::SenderType;

/// Request for sending a message
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, message = "Message content is required"))]
    pub content: String,
}

/// Message response DTO
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
    pub sender_type: SenderType,
    pub sequence: i32,
    pub created_at: DateTime<Utc>,
}

impl From<crate::domain::entities::Message> for MessageResponse {
    fn from(m: crate::domain::entities::Message) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            content: m.content,
            sender_type: m.sender_type,
            sequence: m.sequence,
            created_at: m.created_at,
        }
    }
}

/// Response for send message (the stored user message plus the AI reply)
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub user_message: MessageResponse,
    pub reply: MessageResponse,
}

/// Send a user message and generate the AI reply.
///
/// The user message is persisted first; the relay then reads the history
/// under its per-conversation gate and persists the reply. On upstream
/// failure the user message stays, no reply is written, and the caller gets
/// 502 — the client shows a transient notice without polluting the
/// transcript.
pub async fn send_message(
    State(state): State<ConversationsState>,
    Path(conversation_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>)> {
    let user_message = state
        .store
        .append_message(conversation_id, &req.content, SenderType::User)
        .await?;

    let reply = state.relay.reply(conversation_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            user_message: user_message.into(),
            reply: reply.into(),
        }),
    ))
}

/// List messages for a conversation in insertion order
pub async fn list_messages(
    State(state): State<ConversationsState>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Vec<MessageResponse>>> {
    let messages = state.store.list_messages(conversation_id).await?;
    let responses: Vec<MessageResponse> = messages.into_iter().map(Into::into).collect();
    Ok(Json(responses))
}
