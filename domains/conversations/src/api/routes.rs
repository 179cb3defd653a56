//! Route definitions for the Conversations domain API

use axum::{routing::get, Router};

use super::handlers::{conversations, events, messages};
use super::middleware::ConversationsState;

/// Create conversation routes
fn conversation_routes() -> Router<ConversationsState> {
    Router::new()
        .route(
            "/v1/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/v1/conversations/{id}",
            get(conversations::get_conversation).patch(conversations::update_conversation),
        )
}

/// Create message routes
fn message_routes() -> Router<ConversationsState> {
    Router::new().route(
        "/v1/conversations/{conversation_id}/messages",
        get(messages::list_messages).post(messages::send_message),
    )
}

/// Create change-notification (SSE) routes
fn event_routes() -> Router<ConversationsState> {
    Router::new()
        .route("/v1/conversations/events", get(events::directory_events))
        .route(
            "/v1/conversations/{conversation_id}/events",
            get(events::conversation_events),
        )
}

/// Create all Conversations domain API routes
pub fn routes() -> Router<ConversationsState> {
    Router::new()
        .merge(conversation_routes())
        .merge(message_routes())
        .merge(event_routes())
}
