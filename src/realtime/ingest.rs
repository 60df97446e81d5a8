//! # Webhook Ingestion
//!
//! Entry point for rows posted by database triggers.

use std::sync::Arc;

use super::broker::{Broker, PublishReport};
use super::codec::decode_columns;
use super::errors::RealtimeResult;
use super::event::ChangeEvent;
use super::topic::Topic;

/// Turns trigger callouts into broker publishes
#[derive(Debug, Clone)]
pub struct Ingestor {
    broker: Arc<Broker>,
}

impl Ingestor {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    /// Decode one posted row and publish it on `<operation>:<table>`.
    ///
    /// Table and operation are validated before the body is looked at; a
    /// validation failure publishes nothing.
    pub async fn ingest(
        &self,
        table: Option<&str>,
        operation: Option<&str>,
        body: &[u8],
    ) -> RealtimeResult<PublishReport> {
        let topic = Topic::from_params(operation, table)?;
        let decoded = decode_columns(body)?;

        if !decoded.skipped.is_empty() {
            tracing::warn!(
                topic = %topic,
                skipped = decoded.skipped.len(),
                segments = ?decoded.skipped,
                "skipped malformed row segments"
            );
        }

        let event = ChangeEvent::new(topic.table(), topic.operation(), decoded.columns);
        let report = self.broker.publish(&topic, &event.columns).await?;

        tracing::debug!(
            topic = %topic,
            columns = event.columns.len(),
            matched = report.matched,
            delivered = report.delivered,
            failed = report.failed,
            "change event published"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::realtime::broker::testing::RecordingSink;
    use crate::realtime::broker::Subscriber;
    use crate::realtime::errors::RealtimeError;
    use crate::realtime::event::{Columns, Operation};

    async fn setup(topic: Topic) -> (Ingestor, Arc<RecordingSink>) {
        let broker = Arc::new(Broker::new());
        let sink = Arc::new(RecordingSink::default());
        broker
            .subscribe(&topic, Subscriber::new("user-1", Uuid::new_v4(), sink.clone()))
            .await;
        (Ingestor::new(broker), sink)
    }

    #[tokio::test]
    async fn test_ingest_routes_to_topic() {
        let (ingestor, sink) = setup(Topic::new(Operation::Insert, "orders")).await;

        let report = ingestor
            .ingest(Some("orders"), Some("INSERT"), b"id: 1, total: 9.99")
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(sink.messages(), vec![r#"{"id":"1","total":"9.99"}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_ingest_does_not_cross_operations() {
        let (ingestor, sink) = setup(Topic::new(Operation::Update, "orders")).await;

        ingestor
            .ingest(Some("orders"), Some("INSERT"), b"id: 1, total: 9.99")
            .await
            .unwrap();

        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_requires_table_and_event() {
        let (ingestor, sink) = setup(Topic::new(Operation::Insert, "orders")).await;

        let err = ingestor.ingest(None, Some("INSERT"), b"id: 1").await.unwrap_err();
        assert!(matches!(err, RealtimeError::MissingParameter("table")));

        let err = ingestor.ingest(Some("orders"), Some(""), b"id: 1").await.unwrap_err();
        assert!(matches!(err, RealtimeError::MissingParameter("event")));

        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_garbage_body_is_not_an_error() {
        let (ingestor, sink) = setup(Topic::new(Operation::Insert, "t")).await;

        let report = ingestor.ingest(Some("t"), Some("INSERT"), b"garbage").await.unwrap();

        assert_eq!(report.delivered, 1);
        let delivered: Columns = serde_json::from_str(&sink.messages()[0]).unwrap();
        assert!(delivered.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_json_body() {
        let (ingestor, sink) = setup(Topic::new(Operation::Delete, "orders")).await;

        ingestor
            .ingest(Some("orders"), Some("delete"), br#"{"id": "4", "note": null}"#)
            .await
            .unwrap();

        assert_eq!(sink.messages(), vec![r#"{"id":"4","note":"NULL"}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_ingest_broken_json_publishes_nothing() {
        let (ingestor, sink) = setup(Topic::new(Operation::Insert, "orders")).await;

        let err = ingestor
            .ingest(Some("orders"), Some("INSERT"), br#"{"id": "#)
            .await
            .unwrap_err();

        assert!(err.is_malformed_event());
        assert!(sink.messages().is_empty());
    }
}
