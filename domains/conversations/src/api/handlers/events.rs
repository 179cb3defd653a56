//! Change notification API handlers (SSE bridge over the change feed)
//!
//! Events only say "something changed, re-read"; clients re-fetch the
//! canonical entity rather than trusting the event payload. A client that
//! reconnects gets no backfill and must reconcile by re-reading first.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use livedesk_common::Result;
use uuid::Uuid;

use crate::api::middleware::ConversationsState;
use crate::feed::{Subscription, Topic};

fn event_stream(
    mut subscription: Subscription,
) -> impl futures_core::Stream<Item = std::result::Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(change) = subscription.next().await {
            let data = serde_json::to_string(&change).unwrap_or_else(|_| "{}".to_string());
            yield Ok(Event::default().event("change").data(data));
        }
    }
}

/// Stream change events for one conversation's messages
pub async fn conversation_events(
    State(state): State<ConversationsState>,
    Path(conversation_id): Path<Uuid>,
) -> Result<
    Sse<impl futures_core::Stream<Item = std::result::Result<Event, std::convert::Infallible>>>,
> {
    // 404 for unknown conversations before holding a stream open
    state.store.get_conversation(conversation_id).await?;

    let subscription = state.feed.subscribe(Topic::Messages(conversation_id));
    Ok(Sse::new(event_stream(subscription)).keep_alive(KeepAlive::default()))
}

/// Stream change events for the conversation directory (inbox)
pub async fn directory_events(
    State(state): State<ConversationsState>,
) -> Sse<impl futures_core::Stream<Item = std::result::Result<Event, std::convert::Infallible>>> {
    let subscription = state.feed.subscribe(Topic::Conversations);
    Sse::new(event_stream(subscription)).keep_alive(KeepAlive::default())
}
