//! End-to-end relay tests
//!
//! A real server on an ephemeral port, real WebSocket clients, and trigger
//! callouts posted over plain HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use realtimer::auth::{JwtConfig, JwtManager};
use realtimer::http_server::{HttpServer, HttpServerConfig};
use realtimer::realtime::{Broker, Operation, Topic};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    broker: Arc<Broker>,
    tokens: Arc<JwtManager>,
    closing: watch::Sender<bool>,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let broker = Arc::new(Broker::new());
        let tokens = Arc::new(JwtManager::new(JwtConfig {
            secret: "e2e_secret".to_string(),
            ..JwtConfig::default()
        }));
        let server = HttpServer::new(HttpServerConfig::default(), broker.clone(), tokens.clone());
        let closing = server.shutdown_handle();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    let _ = stopped.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            broker,
            tokens,
            closing,
            stop: Some(stop),
            handle,
        }
    }

    async fn connect(&self, subject: &str, event: &str, table: &str) -> Client {
        let token = self.tokens.issue_token(subject).unwrap();
        let url = format!(
            "ws://{}/api/ws?token={}&event={}&table={}",
            self.addr, token, event, table
        );
        let (client, _) = connect_async(url).await.unwrap();
        client
    }

    /// Raw HTTP/1.1 POST; returns the status line
    async fn post_row(&self, table: &str, event: &str, body: &str) -> String {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        let request = format!(
            "POST /api/db?table={}&event={} HTTP/1.1\r\n\
             Host: {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            table,
            event,
            self.addr,
            body.len(),
            body
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response.lines().next().unwrap_or_default().to_string()
    }

    async fn wait_for_subscribers(&self, topic: &Topic, expected: usize) {
        let waited = timeout(Duration::from_secs(5), async {
            while self.broker.subscriber_count(topic).await != expected {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "expected {} subscribers on {}", expected, topic);
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        timeout(Duration::from_secs(5), self.handle)
            .await
            .unwrap()
            .unwrap();
    }
}

async fn next_text(client: &mut Client) -> String {
    match timeout(Duration::from_secs(5), client.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        other => panic!("expected a text frame, got {:?}", other),
    }
}

// =============================================================================
// DELIVERY
// =============================================================================

#[tokio::test]
async fn test_posted_row_reaches_subscriber() {
    let server = TestServer::spawn().await;
    let topic = Topic::new(Operation::Insert, "orders");

    let mut client = server.connect("user-1", "insert", "orders").await;
    server.wait_for_subscribers(&topic, 1).await;

    let status = server
        .post_row("orders", "INSERT", r#"{"id": "1", "total": "9.99"}"#)
        .await;
    assert!(status.contains("200"), "{}", status);

    assert_eq!(next_text(&mut client).await, r#"{"id":"1","total":"9.99"}"#);

    client.close(None).await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_subscribe_is_case_insensitive_on_event() {
    let server = TestServer::spawn().await;
    let topic = Topic::new(Operation::Update, "orders");

    let mut client = server.connect("user-1", "UPDATE", "orders").await;
    server.wait_for_subscribers(&topic, 1).await;

    server.post_row("orders", "update", "id: 3").await;

    assert_eq!(next_text(&mut client).await, r#"{"id":"3"}"#);
    server.stop().await;
}

#[tokio::test]
async fn test_other_operations_are_not_delivered() {
    let server = TestServer::spawn().await;
    let delete_topic = Topic::new(Operation::Delete, "orders");
    let insert_topic = Topic::new(Operation::Insert, "orders");

    let mut deletes = server.connect("user-1", "delete", "orders").await;
    let mut inserts = server.connect("user-2", "insert", "orders").await;
    server.wait_for_subscribers(&delete_topic, 1).await;
    server.wait_for_subscribers(&insert_topic, 1).await;

    server.post_row("orders", "INSERT", "id: 1").await;
    server.post_row("orders", "DELETE", "id: 2").await;

    assert_eq!(next_text(&mut inserts).await, r#"{"id":"1"}"#);
    assert_eq!(next_text(&mut deletes).await, r#"{"id":"2"}"#);
    server.stop().await;
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_client_close_unsubscribes() {
    let server = TestServer::spawn().await;
    let topic = Topic::new(Operation::Insert, "orders");

    let mut client = server.connect("user-1", "insert", "orders").await;
    server.wait_for_subscribers(&topic, 1).await;

    client.close(None).await.unwrap();
    server.wait_for_subscribers(&topic, 0).await;

    let status = server.post_row("orders", "INSERT", "id: 1").await;
    assert!(status.contains("200"), "{}", status);
    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_gateway_connections() {
    let server = TestServer::spawn().await;
    let topic = Topic::new(Operation::Insert, "orders");

    let mut client = server.connect("user-1", "insert", "orders").await;
    server.wait_for_subscribers(&topic, 1).await;

    let broker = server.broker.clone();
    server.stop().await;

    match timeout(Duration::from_secs(5), client.next()).await {
        Ok(Some(Ok(Message::Close(Some(frame))))) => assert_eq!(frame.code, CloseCode::Away),
        other => panic!("expected a close frame, got {:?}", other),
    }
    assert_eq!(broker.subscriber_count(&topic).await, 0);
}

#[tokio::test]
async fn test_connection_upgraded_after_shutdown_is_closed() {
    let server = TestServer::spawn().await;
    let topic = Topic::new(Operation::Insert, "orders");

    // Listener still accepts, but gateway sessions are already told to stop.
    server.closing.send_replace(true);
    let mut client = server.connect("user-1", "insert", "orders").await;

    match timeout(Duration::from_secs(5), client.next()).await {
        Ok(Some(Ok(Message::Close(Some(frame))))) => assert_eq!(frame.code, CloseCode::Away),
        other => panic!("expected a close frame, got {:?}", other),
    }
    assert_eq!(server.broker.subscriber_count(&topic).await, 0);

    server.stop().await;
}

// =============================================================================
// REJECTION
// =============================================================================

#[tokio::test]
async fn test_bad_token_rejected_before_upgrade() {
    let server = TestServer::spawn().await;

    let url = format!(
        "ws://{}/api/ws?token=not-a-token&event=insert&table=orders",
        server.addr
    );
    match connect_async(url).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 401),
        other => panic!("expected HTTP 401, got {:?}", other.map(|_| ())),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_missing_table_rejected_before_upgrade() {
    let server = TestServer::spawn().await;
    let token = server.tokens.issue_token("user-1").unwrap();

    let url = format!("ws://{}/api/ws?token={}&event=insert", server.addr, token);
    match connect_async(url).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 400),
        other => panic!("expected HTTP 400, got {:?}", other.map(|_| ())),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_callout_is_bad_request() {
    let server = TestServer::spawn().await;

    let status = server.post_row("orders", "TRUNCATE", "id: 1").await;
    assert!(status.contains("400"), "{}", status);

    server.stop().await;
}
