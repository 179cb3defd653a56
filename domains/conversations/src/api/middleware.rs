//! Conversations domain state shared across handlers

use std::sync::Arc;

use crate::domain::relay::AiRelay;
use crate::feed::ChangeFeed;
use crate::repository::ConversationStore;

/// Application state for the Conversations domain
#[derive(Clone)]
pub struct ConversationsState {
    pub store: Arc<dyn ConversationStore>,
    pub relay: Arc<AiRelay>,
    pub feed: Arc<ChangeFeed>,
}
