//! Conversations domain: support threads, messages, change feed, AI relay

pub mod api;
pub mod domain;
pub mod feed;
pub mod repository;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{Conversation, ConversationStatus, Message, SenderType};
pub use domain::relay::{AiRelay, SYSTEM_INSTRUCTION};
pub use domain::session::{ConversationSession, FieldError, IntakeForm, SessionState, FALLBACK_NOTICE};

// Re-export change feed types
pub use feed::{ChangeEvent, ChangeFeed, ChangeKind, Subscription, Topic};

// Re-export repository types
pub use repository::{ConversationStore, MemoryStore, PgStore};

// Re-export API types
pub use api::routes;
pub use api::ConversationsState;
