//! # PubSub Broker
//!
//! Topic-keyed fan-out of change events to subscribed connections.
//!
//! ## Locking
//!
//! The whole subscriber map sits behind one reader/writer lock. Publishing
//! holds the read lock for the duration of its fan-out; subscribe and
//! unsubscribe take the write lock. There are no per-topic locks.
//!
//! ## Delivery
//!
//! Best-effort, at-most-once. Each subscriber gets one write attempt per
//! publish. A failed write is logged and skipped; the broker never evicts a
//! subscriber on its own, the owning connection unsubscribes when it tears
//! itself down.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::codec::encode_columns;
use super::errors::{RealtimeError, RealtimeResult};
use super::event::Columns;
use super::topic::Topic;

/// Writable end of a subscriber's connection
#[async_trait]
pub trait SubscriberSink: Send + Sync {
    /// Write one serialized message to the connection
    async fn deliver(&self, message: &str) -> RealtimeResult<()>;
}

/// A registered listener on one topic.
///
/// Identity is the pair (subject id, connection id); the sink is only the
/// handle used to write to that connection.
#[derive(Clone)]
pub struct Subscriber {
    id: String,
    connection_id: Uuid,
    sink: Arc<dyn SubscriberSink>,
}

impl Subscriber {
    /// Create a subscriber for a connection
    pub fn new(id: impl Into<String>, connection_id: Uuid, sink: Arc<dyn SubscriberSink>) -> Self {
        Self {
            id: id.into(),
            connection_id,
            sink,
        }
    }

    /// Subject id from the connection's token
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// One write attempt; sink failures come back as [`RealtimeError::Delivery`]
    pub async fn deliver(&self, message: &str) -> RealtimeResult<()> {
        self.sink
            .deliver(message)
            .await
            .map_err(|e| RealtimeError::Delivery {
                subscriber: self.id.clone(),
                message: e.to_string(),
            })
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.connection_id == other.connection_id
    }
}

impl Eq for Subscriber {}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("connection_id", &self.connection_id)
            .finish()
    }
}

/// Outcome of one publish call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers registered on the topic when the publish started
    pub matched: usize,
    /// Successful writes
    pub delivered: usize,
    /// Failed writes (skipped)
    pub failed: usize,
}

/// Topic to subscriber-list broker
#[derive(Default)]
pub struct Broker {
    topics: RwLock<HashMap<String, Vec<Subscriber>>>,
}

impl Broker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber under a topic.
    ///
    /// Registering the same subscriber twice on one topic keeps a single
    /// entry, so it is never delivered the same event twice.
    pub async fn subscribe(&self, topic: &Topic, subscriber: Subscriber) {
        let key = topic.key();
        let mut topics = self.topics.write().await;
        let subscribers = topics.entry(key.clone()).or_default();

        if subscribers.contains(&subscriber) {
            tracing::debug!(topic = %key, subscriber = %subscriber.id, "already subscribed");
            return;
        }

        tracing::info!(
            topic = %key,
            subscriber = %subscriber.id,
            connection = %subscriber.connection_id,
            "subscriber registered"
        );
        subscribers.push(subscriber);
    }

    /// Remove the first matching subscriber entry from a topic.
    ///
    /// Absent subscribers are ignored.
    pub async fn unsubscribe(&self, topic: &Topic, subscriber: &Subscriber) {
        let key = topic.key();
        let mut topics = self.topics.write().await;

        let Some(subscribers) = topics.get_mut(&key) else {
            return;
        };

        if let Some(index) = subscribers.iter().position(|s| s == subscriber) {
            subscribers.remove(index);
            tracing::info!(
                topic = %key,
                subscriber = %subscriber.id,
                connection = %subscriber.connection_id,
                "subscriber removed"
            );
        }

        if subscribers.is_empty() {
            topics.remove(&key);
        }
    }

    /// Serialize `columns` once and deliver it to every current subscriber of `topic`
    pub async fn publish(&self, topic: &Topic, columns: &Columns) -> RealtimeResult<PublishReport> {
        let message = encode_columns(columns)?;
        let key = topic.key();

        let topics = self.topics.read().await;
        let Some(subscribers) = topics.get(&key) else {
            tracing::debug!(topic = %key, "no subscribers");
            return Ok(PublishReport::default());
        };

        let mut report = PublishReport {
            matched: subscribers.len(),
            ..PublishReport::default()
        };

        for subscriber in subscribers {
            match subscriber.deliver(&message).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        topic = %key,
                        subscriber = %subscriber.id,
                        connection = %subscriber.connection_id,
                        error = %e,
                        "delivery failed, skipping subscriber"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Number of subscribers on a topic
    pub async fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .read()
            .await
            .get(&topic.key())
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Number of topics with at least one subscriber
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker").finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{BrokenSink, RecordingSink};
    use super::*;
    use crate::realtime::event::Operation;

    fn columns(pairs: &[(&str, &str)]) -> Columns {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn recording_subscriber(id: &str) -> (Subscriber, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let subscriber = Subscriber::new(id, Uuid::new_v4(), sink.clone());
        (subscriber, sink)
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let broker = Broker::new();
        let topic = Topic::new(Operation::Insert, "orders");
        let (subscriber, sink) = recording_subscriber("user-1");

        broker.subscribe(&topic, subscriber).await;
        let report = broker
            .publish(&topic, &columns(&[("id", "1"), ("total", "9.99")]))
            .await
            .unwrap();

        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(sink.messages(), vec![r#"{"id":"1","total":"9.99"}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_publish_is_topic_scoped() {
        let broker = Broker::new();
        let (inserts, insert_sink) = recording_subscriber("a");
        let (updates, update_sink) = recording_subscriber("b");

        broker.subscribe(&Topic::new(Operation::Insert, "orders"), inserts).await;
        broker.subscribe(&Topic::new(Operation::Update, "orders"), updates).await;

        broker
            .publish(&Topic::new(Operation::Insert, "orders"), &columns(&[("id", "1")]))
            .await
            .unwrap();

        assert_eq!(insert_sink.messages().len(), 1);
        assert!(update_sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_fan_out_survives_broken_subscriber() {
        let broker = Broker::new();
        let topic = Topic::new(Operation::Delete, "orders");

        let mut sinks = Vec::new();
        for i in 0..3 {
            let (subscriber, sink) = recording_subscriber(&format!("user-{}", i));
            broker.subscribe(&topic, subscriber).await;
            sinks.push(sink);
        }
        let broken = Subscriber::new("gone", Uuid::new_v4(), Arc::new(BrokenSink));
        broker.subscribe(&topic, broken.clone()).await;

        let report = broker.publish(&topic, &columns(&[("id", "9")])).await.unwrap();

        assert_eq!(report.matched, 4);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 1);
        for sink in &sinks {
            assert_eq!(sink.messages().len(), 1);
        }

        // Broker never evicts on its own
        assert_eq!(broker.subscriber_count(&topic).await, 4);
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_delivers_once() {
        let broker = Broker::new();
        let topic = Topic::new(Operation::Insert, "orders");
        let (subscriber, sink) = recording_subscriber("user-1");

        broker.subscribe(&topic, subscriber.clone()).await;
        broker.subscribe(&topic, subscriber).await;
        broker.publish(&topic, &columns(&[("id", "1")])).await.unwrap();

        assert_eq!(sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_same_subject_on_two_connections_gets_two_copies() {
        let broker = Broker::new();
        let topic = Topic::new(Operation::Insert, "orders");
        let (first, first_sink) = recording_subscriber("user-1");
        let (second, second_sink) = recording_subscriber("user-1");

        broker.subscribe(&topic, first).await;
        broker.subscribe(&topic, second).await;
        broker.publish(&topic, &columns(&[("id", "1")])).await.unwrap();

        assert_eq!(first_sink.messages().len(), 1);
        assert_eq!(second_sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_absent_is_noop() {
        let broker = Broker::new();
        let topic = Topic::new(Operation::Insert, "orders");
        let (subscriber, _sink) = recording_subscriber("user-1");

        broker.unsubscribe(&topic, &subscriber).await;
        assert_eq!(broker.topic_count().await, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_only_that_subscriber() {
        let broker = Broker::new();
        let topic = Topic::new(Operation::Insert, "orders");
        let (stays, stays_sink) = recording_subscriber("stays");
        let (leaves, leaves_sink) = recording_subscriber("leaves");

        broker.subscribe(&topic, stays).await;
        broker.subscribe(&topic, leaves.clone()).await;
        broker.unsubscribe(&topic, &leaves).await;
        broker.publish(&topic, &columns(&[("id", "1")])).await.unwrap();

        assert_eq!(stays_sink.messages().len(), 1);
        assert!(leaves_sink.messages().is_empty());
        assert_eq!(broker.subscriber_count(&topic).await, 1);
    }

    #[tokio::test]
    async fn test_sequential_publishes_arrive_in_order() {
        let broker = Broker::new();
        let topic = Topic::new(Operation::Update, "orders");
        let (subscriber, sink) = recording_subscriber("user-1");
        broker.subscribe(&topic, subscriber).await;

        for i in 0..5 {
            let id = i.to_string();
            broker.publish(&topic, &columns(&[("id", &id)])).await.unwrap();
        }

        let ids: Vec<String> = sink
            .messages()
            .iter()
            .map(|m| serde_json::from_str::<Columns>(m).unwrap()["id"].clone())
            .collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_failed_write_is_a_delivery_error() {
        let subscriber = Subscriber::new("user-7", Uuid::new_v4(), Arc::new(BrokenSink));

        match subscriber.deliver("{}").await {
            Err(RealtimeError::Delivery { subscriber, message }) => {
                assert_eq!(subscriber, "user-7");
                assert_eq!(message, "Connection closed");
            }
            other => panic!("expected a delivery error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let broker = Broker::new();
        let report = broker
            .publish(&Topic::new(Operation::Insert, "nobody"), &columns(&[("id", "1")]))
            .await
            .unwrap();
        assert_eq!(report, PublishReport::default());
    }
}
