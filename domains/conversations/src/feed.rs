//! Change feed: topic-scoped publish/subscribe for live viewers
//!
//! The feed is a liveness signal, not a replicated log: delivery is
//! at-least-once and best-effort, there is no backfill, and a subscriber
//! that (re)connects reconciles by re-reading the store. Events published
//! for one topic reach a given subscriber in publish order; nothing is
//! guaranteed across topics.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Per-topic channel capacity. A subscriber that lags past this many events
/// skips ahead; since events only mean "re-read", skipping is harmless.
const TOPIC_BUFFER_SIZE: usize = 256;

/// A subscription topic: the whole conversation directory, or the messages
/// of one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", content = "conversation_id", rename_all = "lowercase")]
pub enum Topic {
    Conversations,
    Messages(Uuid),
}

/// What happened to the entity the event points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A change notification. The entity id identifies what changed; viewers
/// re-fetch the canonical record rather than trusting the event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub topic: Topic,
    pub kind: ChangeKind,
    pub entity: Uuid,
}

/// Handle to an active subscription. Dropping it (or calling
/// [`Subscription::unsubscribe`]) stops delivery.
pub struct Subscription {
    topic: Topic,
    rx: Option<broadcast::Receiver<ChangeEvent>>,
}

impl Subscription {
    /// Await the next change event.
    ///
    /// Returns `None` once the subscription has been closed. A lagged
    /// receiver resumes with the oldest retained event; the gap is safe
    /// because subscribers re-read canonical state on every event.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = ?self.topic, skipped, "Change feed subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll for a pending event; `None` when the queue is empty.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Stop delivery. Idempotent and safe to call multiple times.
    pub fn unsubscribe(&mut self) {
        self.rx = None;
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

/// Topic-scoped publish/subscribe hub decoupling writers from live viewers
pub struct ChangeFeed {
    topics: Mutex<HashMap<Topic, broadcast::Sender<ChangeEvent>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a topic. Only events published after this call are
    /// delivered; callers reconcile by re-reading the store first.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let mut topics = self.topics.lock().expect("change feed lock poisoned");
        let tx = topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(TOPIC_BUFFER_SIZE).0);

        tracing::debug!(topic = ?topic, "Change feed subscription opened");

        Subscription {
            topic,
            rx: Some(tx.subscribe()),
        }
    }

    /// Publish an event to all active subscriptions on a topic.
    ///
    /// Best-effort: with no listeners the event is dropped and the idle
    /// channel is pruned.
    pub fn publish(&self, event: ChangeEvent) {
        let mut topics = self.topics.lock().expect("change feed lock poisoned");
        if let Some(tx) = topics.get(&event.topic) {
            match tx.send(event.clone()) {
                Ok(receivers) => {
                    tracing::debug!(topic = ?event.topic, receivers, "Change event published");
                }
                Err(_) => {
                    topics.remove(&event.topic);
                }
            }
        }
    }

    /// Number of topics with at least one active channel (for diagnostics)
    pub fn topic_count(&self) -> usize {
        self.topics.lock().expect("change feed lock poisoned").len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_event(topic: Topic) -> ChangeEvent {
        ChangeEvent {
            topic,
            kind: ChangeKind::Insert,
            entity: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let feed = ChangeFeed::new();
        let conversation_id = Uuid::new_v4();
        let topic = Topic::Messages(conversation_id);

        let mut sub = feed.subscribe(topic);
        let event = insert_event(topic);
        feed.publish(event.clone());

        let received = sub.next().await.unwrap();
        assert_eq!(received.topic, topic);
        assert_eq!(received.entity, event.entity);
    }

    #[tokio::test]
    async fn test_events_delivered_in_publish_order() {
        let feed = ChangeFeed::new();
        let topic = Topic::Conversations;
        let mut sub = feed.subscribe(topic);

        let first = insert_event(topic);
        let second = insert_event(topic);
        feed.publish(first.clone());
        feed.publish(second.clone());

        assert_eq!(sub.next().await.unwrap().entity, first.entity);
        assert_eq!(sub.next().await.unwrap().entity, second.entity);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let feed = ChangeFeed::new();
        let topic_a = Topic::Messages(Uuid::new_v4());
        let topic_b = Topic::Messages(Uuid::new_v4());

        let mut sub_a = feed.subscribe(topic_a);
        let _sub_b = feed.subscribe(topic_b);

        feed.publish(insert_event(topic_b));
        assert!(sub_a.try_next().is_none());
    }

    #[tokio::test]
    async fn test_all_subscribers_on_topic_notified() {
        let feed = ChangeFeed::new();
        let topic = Topic::Conversations;
        let mut sub_one = feed.subscribe(topic);
        let mut sub_two = feed.subscribe(topic);

        let event = insert_event(topic);
        feed.publish(event.clone());

        assert_eq!(sub_one.next().await.unwrap().entity, event.entity);
        assert_eq!(sub_two.next().await.unwrap().entity, event.entity);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery_and_is_idempotent() {
        let feed = ChangeFeed::new();
        let topic = Topic::Conversations;
        let mut sub = feed.subscribe(topic);

        sub.unsubscribe();
        sub.unsubscribe(); // second call must be safe
        assert!(!sub.is_active());

        feed.publish(insert_event(topic));
        assert!(sub.next().await.is_none());
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn test_no_backfill_for_late_subscriber() {
        let feed = ChangeFeed::new();
        let topic = Topic::Conversations;

        // Keep the channel alive so publish is not a pure no-op.
        let _early = feed.subscribe(topic);
        feed.publish(insert_event(topic));

        let mut late = feed.subscribe(topic);
        assert!(late.try_next().is_none());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let feed = ChangeFeed::new();
        feed.publish(insert_event(Topic::Conversations));
        assert_eq!(feed.topic_count(), 0);
    }

    #[test]
    fn test_topic_serialization() {
        let json = serde_json::to_value(Topic::Conversations).unwrap();
        assert_eq!(json["scope"], "conversations");

        let id = Uuid::new_v4();
        let json = serde_json::to_value(Topic::Messages(id)).unwrap();
        assert_eq!(json["scope"], "messages");
        assert_eq!(json["conversation_id"], id.to_string());
    }
}
