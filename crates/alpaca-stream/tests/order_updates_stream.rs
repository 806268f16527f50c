//! Order updates stream integration tests against an in-process mock server.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use alpaca_stream::{
    ConnectionState, Credentials, DomainEvent, OrderEventType, OrderUpdatesStream, StreamConfig,
    StreamSettings,
};

const AUTHORIZED: &str =
    r#"{"stream":"authorization","data":{"status":"authorized","action":"authenticate"}}"#;
const UNAUTHORIZED: &str =
    r#"{"stream":"authorization","data":{"status":"unauthorized","action":"authenticate"}}"#;
const LISTENING: &str = r#"{"stream":"listening","data":{"streams":["trade_updates"]}}"#;

/// Route client logs through the env filter when debugging a test run.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn test_config(url: &str, max_attempts: u32) -> StreamConfig {
    StreamConfig::new(Credentials::new("test-key", "test-secret").unwrap())
        .with_url(url)
        .with_settings(StreamSettings {
            reconnect_delay_initial: Duration::from_millis(10),
            reconnect_delay_max: Duration::from_millis(80),
            max_reconnect_attempts: max_attempts,
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(60),
        })
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text.to_string()),
            Ok(Message::Ping(data)) => {
                let _ = ws.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            _ => {}
        }
    }
    None
}

async fn send_text(ws: &mut WebSocketStream<TcpStream>, text: &str) {
    ws.send(Message::Text(text.into())).await.unwrap();
}

#[tokio::test]
async fn dispatches_order_updates_after_listen_handshake() {
    init_tracing();
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let auth = next_text(&mut ws).await.unwrap();
        let auth: serde_json::Value = serde_json::from_str(&auth).unwrap();
        assert_eq!(auth["action"], "auth");
        assert_eq!(auth["key"], "test-key");
        send_text(&mut ws, AUTHORIZED).await;

        let listen = next_text(&mut ws).await.unwrap();
        let listen: serde_json::Value = serde_json::from_str(&listen).unwrap();
        assert_eq!(listen["action"], "listen");
        assert_eq!(listen["data"]["streams"], serde_json::json!(["trade_updates"]));
        send_text(&mut ws, LISTENING).await;

        send_text(
            &mut ws,
            r#"{"stream":"trade_updates","data":{"event":"fill","execution_id":"e1","price":"185.50","qty":"100","order":{"id":"order-1","symbol":"AAPL","side":"buy","filled_qty":"100","status":"filled"}}}"#,
        )
        .await;

        while next_text(&mut ws).await.is_some() {}
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = OrderUpdatesStream::start(test_config(&url, 0), move |event| {
        let _ = tx.send(event);
    })
    .unwrap();

    let event = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        DomainEvent::OrderUpdate(update) => {
            assert_eq!(update.event, OrderEventType::Fill);
            assert_eq!(update.order.id, "order-1");
            assert_eq!(update.order.symbol, "AAPL");
            assert_eq!(update.qty.as_deref(), Some("100"));
        }
        other => panic!("expected an order update, got {other:?}"),
    }

    // The authorization and listening acks never reach the callback.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(handle.status(), ConnectionState::Connected);

    handle.stop();
    handle.join().await;
    server.abort();
}

#[tokio::test]
async fn connected_only_after_listening_confirmation() {
    init_tracing();
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _auth = next_text(&mut ws).await.unwrap();
        send_text(&mut ws, AUTHORIZED).await;

        let _listen = next_text(&mut ws).await.unwrap();
        // Hold the listening ack back long enough to observe the state.
        tokio::time::sleep(Duration::from_millis(300)).await;
        send_text(&mut ws, LISTENING).await;
        while next_text(&mut ws).await.is_some() {}
    });

    let handle = OrderUpdatesStream::start(test_config(&url, 0), |_event| {}).unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(handle.status(), ConnectionState::Authenticating);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while handle.status() != ConnectionState::Connected && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(handle.status(), ConnectionState::Connected);

    handle.stop();
    handle.join().await;
    server.abort();
}

#[tokio::test]
async fn rejected_authorization_reconnects_then_gives_up() {
    init_tracing();
    let (listener, url) = bind().await;
    let connections = Arc::new(AtomicU32::new(0));

    let server = tokio::spawn({
        let connections = Arc::clone(&connections);
        async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                connections.fetch_add(1, Ordering::SeqCst);
                let mut ws = accept_async(stream).await.unwrap();
                let _auth = next_text(&mut ws).await;
                let _ = ws.send(Message::Text(UNAUTHORIZED.into())).await;
            }
        }
    });

    let handle = OrderUpdatesStream::start(test_config(&url, 1), |_event| {}).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while connections.load(Ordering::SeqCst) < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(connections.load(Ordering::SeqCst), 2);
    assert_eq!(handle.status(), ConnectionState::Disconnected);
    server.abort();
}

#[tokio::test]
async fn stop_during_backoff_leaves_closed_state() {
    init_tracing();
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        }
    });

    let mut config = test_config(&url, 0);
    config.settings.reconnect_delay_initial = Duration::from_secs(30);
    config.settings.reconnect_delay_max = Duration::from_secs(30);
    let handle = OrderUpdatesStream::start(config, |_event| {}).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while handle.status() != ConnectionState::Disconnected
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    handle.stop();
    let finished = timeout(Duration::from_secs(1), async {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while handle.status() != ConnectionState::Closed
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.status()
    })
    .await
    .unwrap();
    assert_eq!(finished, ConnectionState::Closed);
    server.abort();
}
