//! # Gateway Connections
//!
//! Lifecycle of one long-lived subscriber connection:
//!
//! ```text
//! Connecting -> Authenticated -> Subscribed -> Closed
//! ```
//!
//! A connection authenticates with a bearer token, subscribes to exactly one
//! topic, then only reads from the socket to notice that it went away. Leaving
//! `Subscribed` always unsubscribes from the broker exactly once, including
//! when the read loop ends with an error or the session is dropped early.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::broker::{Broker, Subscriber, SubscriberSink};
use super::errors::{RealtimeError, RealtimeResult};
use super::topic::Topic;
use crate::auth::{AuthError, Subject, TokenVerifier};

/// Connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, no token verified yet
    Connecting,
    /// Token verified, no topic yet
    Authenticated,
    /// Registered with the broker
    Subscribed,
    /// Torn down; never re-enters `Subscribed`
    Closed,
}

/// Why the read loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame
    ClientClosed,
    /// Inbound stream ended without a close frame
    StreamEnded,
    /// Reading from the socket failed
    ReadError(String),
    /// Process is shutting down
    Shutdown,
}

/// One gateway connection
pub struct GatewaySession {
    connection_id: Uuid,
    state: ConnectionState,
    subject: Option<Subject>,
    subscription: Option<(Topic, Subscriber)>,
    broker: Arc<Broker>,
}

impl GatewaySession {
    /// Start a session for a freshly accepted connection
    pub fn new(broker: Arc<Broker>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            state: ConnectionState::Connecting,
            subject: None,
            subscription: None,
            broker,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    /// Verify the bearer token. `Connecting -> Authenticated`.
    pub fn authenticate(
        &mut self,
        verifier: &dyn TokenVerifier,
        token: Option<&str>,
    ) -> RealtimeResult<&Subject> {
        self.expect_state(ConnectionState::Connecting)?;

        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let subject = verifier.verify(token)?;

        tracing::debug!(
            connection = %self.connection_id,
            subject = %subject.id,
            "gateway connection authenticated"
        );

        self.state = ConnectionState::Authenticated;
        let subject = self.subject.insert(subject);
        Ok(&*subject)
    }

    /// Register with the broker. `Authenticated -> Subscribed`.
    pub async fn subscribe(
        &mut self,
        topic: Topic,
        sink: Arc<dyn SubscriberSink>,
    ) -> RealtimeResult<()> {
        self.expect_state(ConnectionState::Authenticated)?;

        let subject_id = self
            .subject
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(RealtimeError::Authentication(AuthError::MissingSubject))?;

        let subscriber = Subscriber::new(subject_id, self.connection_id, sink);
        self.broker.subscribe(&topic, subscriber.clone()).await;

        self.subscription = Some((topic, subscriber));
        self.state = ConnectionState::Subscribed;
        Ok(())
    }

    /// Tear the session down, unsubscribing if it was subscribed.
    ///
    /// Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some((topic, subscriber)) = self.subscription.take() {
            self.broker.unsubscribe(&topic, &subscriber).await;
        }
        self.state = ConnectionState::Closed;
    }

    fn expect_state(&self, expected: ConnectionState) -> RealtimeResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RealtimeError::ConnectionError(format!(
                "invalid transition from {:?} (expected {:?})",
                self.state, expected
            )))
        }
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        let Some((topic, subscriber)) = self.subscription.take() else {
            return;
        };

        // Dropped while still subscribed; release asynchronously.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let broker = Arc::clone(&self.broker);
                handle.spawn(async move {
                    broker.unsubscribe(&topic, &subscriber).await;
                });
            }
            Err(_) => tracing::error!(
                connection = %self.connection_id,
                topic = %topic,
                "session dropped outside a runtime, subscriber left registered"
            ),
        }
    }
}

/// Writes broker messages to the outgoing half of a WebSocket
pub struct WebSocketSink {
    inner: Mutex<SplitSink<WebSocket, Message>>,
}

impl WebSocketSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            inner: Mutex::new(sink),
        }
    }

    /// Send a close frame; errors are ignored since the peer may be gone
    pub async fn close(&self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        let _ = self.inner.lock().await.send(Message::Close(Some(frame))).await;
    }
}

#[async_trait]
impl SubscriberSink for WebSocketSink {
    async fn deliver(&self, message: &str) -> RealtimeResult<()> {
        self.inner
            .lock()
            .await
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| RealtimeError::ConnectionError(e.to_string()))
    }
}

/// Read from the socket until it closes, fails, or shutdown is signalled.
///
/// Inbound application messages are ignored. `shutdown` flips to `true` once
/// and stays there, so a receiver created after the flip still observes it.
pub async fn read_until_closed<S>(
    inbound: &mut S,
    shutdown: &mut watch::Receiver<bool>,
) -> CloseReason
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        tokio::select! {
            msg = inbound.next() => match msg {
                Some(Ok(Message::Close(_))) => return CloseReason::ClientClosed,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return CloseReason::ReadError(e.to_string()),
                None => return CloseReason::StreamEnded,
            },
            _ = shutdown.wait_for(|stopping| *stopping) => return CloseReason::Shutdown,
        }
    }
}

/// Drive an upgraded, already authenticated connection to completion
pub async fn run_connection(
    mut session: GatewaySession,
    topic: Topic,
    socket: WebSocket,
    mut shutdown: watch::Receiver<bool>,
) {
    let (outgoing, mut inbound) = socket.split();
    let sink = Arc::new(WebSocketSink::new(outgoing));
    let connection_id = session.connection_id();

    if *shutdown.borrow() {
        tracing::info!(connection = %connection_id, "upgrade finished after shutdown, closing");
        sink.close(1001, "server shutting down").await;
        session.close().await;
        return;
    }

    if let Err(e) = session.subscribe(topic.clone(), sink.clone()).await {
        tracing::error!(connection = %connection_id, error = %e, "gateway subscribe failed");
        sink.close(e.close_code(), &e.to_string()).await;
        session.close().await;
        return;
    }

    tracing::info!(
        connection = %connection_id,
        topic = %topic,
        subject = session.subject().map(|s| s.id.as_str()).unwrap_or_default(),
        "gateway connection subscribed"
    );

    let reason = read_until_closed(&mut inbound, &mut shutdown).await;
    session.close().await;

    match &reason {
        CloseReason::ReadError(e) => {
            tracing::warn!(connection = %connection_id, error = %e, "gateway connection read failed")
        }
        CloseReason::Shutdown => sink.close(1001, "server shutting down").await,
        CloseReason::ClientClosed | CloseReason::StreamEnded => {}
    }

    tracing::info!(connection = %connection_id, reason = ?reason, "gateway connection closed");
}
