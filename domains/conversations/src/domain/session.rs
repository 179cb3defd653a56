//! Conversation session: one client's live view of one conversation
//!
//! A session starts `Anonymous` (intake form not yet submitted) and becomes
//! `Active` once the form is accepted; there is no way back. While a reply
//! is outstanding further sends are queued and processed FIFO. All session
//! state is local to the session; the store and the change feed are the only
//! shared resources it touches.

use std::collections::VecDeque;
use std::sync::Arc;

use livedesk_common::{Error, Result};
use uuid::Uuid;

use crate::domain::entities::{Conversation, Message, SenderType};
use crate::domain::relay::AiRelay;
use crate::feed::{ChangeEvent, ChangeFeed, Subscription, Topic};
use crate::repository::ConversationStore;

/// Live-view-only fallback shown when the provider fails; never persisted,
/// so the stored transcript stays faithful to what was actually generated.
pub const FALLBACK_NOTICE: &str =
    "Sorry, we could not reply right now. Please try again in a moment.";

/// Intake form, captured once before the conversation exists
#[derive(Debug, Clone, Default)]
pub struct IntakeForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub page_title: String,
}

/// A field-level validation failure on the intake form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl IntakeForm {
    /// Field-level validation; an empty result means the form is acceptable
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError {
                field: "name",
                message: "Name is required".to_string(),
            });
        }
        if self.email.trim().is_empty() {
            errors.push(FieldError {
                field: "email",
                message: "Email is required".to_string(),
            });
        }
        errors
    }
}

/// Session lifecycle; no transition back to `Anonymous`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Active { conversation_id: Uuid },
}

pub struct ConversationSession {
    store: Arc<dyn ConversationStore>,
    relay: Arc<AiRelay>,
    feed: Arc<ChangeFeed>,
    state: SessionState,
    /// Local snapshot of the transcript, replaced wholesale on re-read
    transcript: Vec<Message>,
    transient_notice: Option<String>,
    /// Sends queued while a reply is outstanding, drained FIFO
    outbox: VecDeque<String>,
    awaiting_reply: bool,
    directory_events: Subscription,
    message_events: Option<Subscription>,
}

impl ConversationSession {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        relay: Arc<AiRelay>,
        feed: Arc<ChangeFeed>,
    ) -> Self {
        let directory_events = feed.subscribe(Topic::Conversations);
        Self {
            store,
            relay,
            feed,
            state: SessionState::Anonymous,
            transcript: Vec::new(),
            transient_notice: None,
            outbox: VecDeque::new(),
            awaiting_reply: false,
            directory_events,
            message_events: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn conversation_id(&self) -> Option<Uuid> {
        match self.state {
            SessionState::Active { conversation_id } => Some(conversation_id),
            SessionState::Anonymous => None,
        }
    }

    /// The rendered transcript as of the last re-read
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Live-view-only notice from the last failed reply, if any
    pub fn transient_notice(&self) -> Option<&str> {
        self.transient_notice.as_deref()
    }

    /// Submit the intake form: create the conversation, append the greeting,
    /// transition to `Active`.
    ///
    /// On validation failure the session stays `Anonymous` and the error
    /// carries the joined field-level messages (`IntakeForm::field_errors`
    /// gives the structured form).
    pub async fn submit_intake(&mut self, form: IntakeForm) -> Result<Conversation> {
        if self.state != SessionState::Anonymous {
            return Err(Error::Validation(
                "Intake form already submitted".to_string(),
            ));
        }

        let errors = form.field_errors();
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Validation(joined));
        }

        let conversation = Conversation::new(form.name.clone(), form.email, form.phone, form.page_title)?;
        let created = self.store.create_conversation(&conversation).await?;

        // Subscribe before the greeting lands so its change event is seen
        self.message_events = Some(self.feed.subscribe(Topic::Messages(created.id)));

        let greeting = greeting_for(&form.name);
        self.store
            .append_message(created.id, &greeting, SenderType::Company)
            .await?;

        self.state = SessionState::Active {
            conversation_id: created.id,
        };
        self.refresh().await?;

        tracing::info!(conversation_id = %created.id, "Session activated");

        Ok(created)
    }

    /// Send a user message and await the AI reply.
    ///
    /// Valid only in `Active`. If a reply is already outstanding the content
    /// is queued and the in-flight call drains it in submission order. An
    /// upstream failure sets the transient notice instead of failing the
    /// send; the user message itself is always persisted first.
    pub async fn send(&mut self, content: impl Into<String>) -> Result<()> {
        let conversation_id = self.conversation_id().ok_or_else(|| {
            Error::Validation("Cannot send before the intake form is submitted".to_string())
        })?;

        let content = content.into();
        Message::validate_content(&content)?;

        self.outbox.push_back(content);
        if self.awaiting_reply {
            return Ok(());
        }

        self.awaiting_reply = true;
        let result = self.drain_outbox(conversation_id).await;
        self.awaiting_reply = false;
        result
    }

    async fn drain_outbox(&mut self, conversation_id: Uuid) -> Result<()> {
        while let Some(content) = self.outbox.pop_front() {
            self.store
                .append_message(conversation_id, &content, SenderType::User)
                .await?;

            match self.relay.reply(conversation_id).await {
                Ok(_) => {
                    self.transient_notice = None;
                }
                Err(Error::Upstream(reason)) => {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        %reason,
                        "AI reply failed; showing transient fallback"
                    );
                    self.transient_notice = Some(FALLBACK_NOTICE.to_string());
                }
                Err(other) => return Err(other),
            }
        }
        self.refresh().await
    }

    /// Re-read this session's data from the store. Idempotent: replaying it
    /// for writes the session itself issued cannot duplicate anything.
    pub async fn refresh(&mut self) -> Result<()> {
        if let Some(conversation_id) = self.conversation_id() {
            self.transcript = self.store.list_messages(conversation_id).await?;
        }
        Ok(())
    }

    /// Await the next change event on either subscribed topic, then re-read.
    /// Returns `None` when every subscription has closed.
    pub async fn next_change(&mut self) -> Result<Option<ChangeEvent>> {
        let event = match self.message_events.as_mut() {
            Some(messages) => tokio::select! {
                event = messages.next() => event,
                event = self.directory_events.next() => event,
            },
            None => self.directory_events.next().await,
        };

        if event.is_some() {
            self.refresh().await?;
        }
        Ok(event)
    }
}

fn greeting_for(name: &str) -> String {
    format!("Hello {}! How can we help you today?", name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChangeKind;
    use crate::repository::MemoryStore;
    use livedesk_relay::{CompletionService, MockCompletionService};

    struct Fixture {
        store: Arc<MemoryStore>,
        relay: Arc<AiRelay>,
        feed: Arc<ChangeFeed>,
    }

    fn fixture_with(completions: Arc<dyn CompletionService>) -> Fixture {
        let feed = Arc::new(ChangeFeed::new());
        let store = Arc::new(MemoryStore::new(feed.clone()));
        let relay = Arc::new(AiRelay::new(store.clone(), completions));
        Fixture { store, relay, feed }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(MockCompletionService::new()))
    }

    fn session(fx: &Fixture) -> ConversationSession {
        ConversationSession::new(fx.store.clone(), fx.relay.clone(), fx.feed.clone())
    }

    fn ana_form() -> IntakeForm {
        IntakeForm {
            name: "Ana".to_string(),
            email: "a@x.com".to_string(),
            phone: "555".to_string(),
            page_title: "Home".to_string(),
        }
    }

    #[tokio::test]
    async fn test_intake_creates_conversation_and_greeting() {
        let fx = fixture();
        let mut session = session(&fx);

        let conversation = session.submit_intake(ana_form()).await.unwrap();

        assert_eq!(
            session.state(),
            SessionState::Active {
                conversation_id: conversation.id
            }
        );
        assert_eq!(session.transcript().len(), 1);
        let greeting = &session.transcript()[0];
        assert_eq!(greeting.sender_type, SenderType::Company);
        assert!(greeting.content.contains("Ana"));
    }

    #[tokio::test]
    async fn test_intake_validation_keeps_session_anonymous() {
        let fx = fixture();
        let mut session = session(&fx);

        let form = IntakeForm {
            name: "".to_string(),
            email: "".to_string(),
            ..IntakeForm::default()
        };
        let errors = form.field_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "name");
        assert_eq!(errors[1].field, "email");

        let result = session.submit_intake(form).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(fx.store.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_intake_cannot_be_submitted_twice() {
        let fx = fixture();
        let mut session = session(&fx);

        session.submit_intake(ana_form()).await.unwrap();
        let result = session.submit_intake(ana_form()).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_send_before_intake_rejected() {
        let fx = fixture();
        let mut session = session(&fx);

        let result = session.send("hello").await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_send_empty_content_rejected() {
        let fx = fixture();
        let mut session = session(&fx);
        session.submit_intake(ana_form()).await.unwrap();

        let result = session.send("   ").await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(session.transcript().len(), 1);
    }

    // End-to-end: intake, one send, three stored messages
    #[tokio::test]
    async fn test_intake_then_send_yields_three_messages() {
        let fx = fixture();
        let mut session = session(&fx);

        let conversation = session.submit_intake(ana_form()).await.unwrap();
        session.send("I need a refund").await.unwrap();

        let messages = fx.store.list_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].sender_type, SenderType::Company); // greeting
        assert_eq!(messages[1].sender_type, SenderType::User);
        assert_eq!(messages[1].content, "I need a refund");
        assert_eq!(messages[2].sender_type, SenderType::Company); // AI reply
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_sequential_sends_interleave_user_then_reply() {
        let fx = fixture();
        let mut session = session(&fx);
        let conversation = session.submit_intake(ana_form()).await.unwrap();

        session.send("first").await.unwrap();
        session.send("second").await.unwrap();

        let messages = fx.store.list_messages(conversation.id).await.unwrap();
        let senders: Vec<SenderType> = messages.iter().map(|m| m.sender_type).collect();
        assert_eq!(
            senders,
            vec![
                SenderType::Company, // greeting
                SenderType::User,
                SenderType::Company,
                SenderType::User,
                SenderType::Company,
            ]
        );
        // A reply never precedes its triggering user message
        assert_eq!(messages[1].content, "first");
        assert_eq!(messages[3].content, "second");
    }

    #[tokio::test]
    async fn test_queued_sends_drain_fifo() {
        let fx = fixture();
        let mut session = session(&fx);
        let conversation = session.submit_intake(ana_form()).await.unwrap();

        // Simulate an outstanding reply: these sends only enqueue
        session.awaiting_reply = true;
        session.send("queued one").await.unwrap();
        session.send("queued two").await.unwrap();
        assert_eq!(fx.store.list_messages(conversation.id).await.unwrap().len(), 1);

        // The in-flight call finishes and drains the outbox in order
        session.awaiting_reply = false;
        session.send("queued three").await.unwrap();

        let messages = fx.store.list_messages(conversation.id).await.unwrap();
        let user_messages: Vec<&str> = messages
            .iter()
            .filter(|m| m.sender_type == SenderType::User)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(user_messages, vec!["queued one", "queued two", "queued three"]);
    }

    #[tokio::test]
    async fn test_upstream_failure_sets_transient_notice_only() {
        let fx = fixture_with(Arc::new(MockCompletionService::failing("down")));
        let mut session = session(&fx);
        let conversation = session.submit_intake(ana_form()).await.unwrap();

        session.send("anyone there?").await.unwrap();

        assert_eq!(session.transient_notice(), Some(FALLBACK_NOTICE));

        // The user message is stored; the fallback notice is not
        let messages = fx.store.list_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.content != FALLBACK_NOTICE));
    }

    #[tokio::test]
    async fn test_transient_notice_cleared_on_next_success() {
        let fx = fixture();
        let mut session = session(&fx);
        session.submit_intake(ana_form()).await.unwrap();

        session.transient_notice = Some(FALLBACK_NOTICE.to_string());
        session.send("works again").await.unwrap();
        assert!(session.transient_notice().is_none());
    }

    #[tokio::test]
    async fn test_change_event_triggers_reread() {
        let fx = fixture();
        let mut session = session(&fx);
        let conversation = session.submit_intake(ana_form()).await.unwrap();

        // Another writer (e.g. a second session) appends directly
        fx.store
            .append_message(conversation.id, "from elsewhere", SenderType::Company)
            .await
            .unwrap();

        let event = session.next_change().await.unwrap().unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[1].content, "from elsewhere");
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let fx = fixture();
        let mut session = session(&fx);
        session.submit_intake(ana_form()).await.unwrap();
        session.send("hello").await.unwrap();

        let before = session.transcript().to_vec();
        session.refresh().await.unwrap();
        session.refresh().await.unwrap();
        assert_eq!(session.transcript(), before.as_slice());
    }
}
