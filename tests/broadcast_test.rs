//! Integration tests: real server on a random port, real WebSocket clients.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use ws_hub::envelope::{JOINED_CONTENT, LEFT_CONTENT};
use ws_hub::stats::HubStats;
use ws_hub::{Envelope, HubHandle, HubServer, ServerConfig};

type Client = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Start the server on a random port and return its address and hub handle.
async fn start_test_server(config: ServerConfig) -> (SocketAddr, HubHandle) {
    let server = HubServer::new(config);
    let hub = server.hub().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    (addr, hub)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("WebSocket connect failed");
    ws
}

/// Wait until the hub has processed enough events to satisfy `f`.
async fn settle(hub: &HubHandle, f: impl FnMut(&HubStats) -> bool) -> HubStats {
    let mut stats = hub.stats();
    let seen = timeout(Duration::from_secs(2), stats.wait_for(f))
        .await
        .expect("timed out waiting for hub")
        .expect("hub stopped");
    *seen
}

/// Read the next text frame as an envelope, skipping control frames.
async fn next_envelope(ws: &mut Client) -> Envelope {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("read error");
        if let Message::Text(text) = msg {
            return Envelope::decode(&text).expect("invalid envelope");
        }
    }
}

/// Assert nothing arrives within a short window.
async fn assert_quiet(ws: &mut Client) {
    if let Ok(Some(Ok(Message::Text(text)))) =
        timeout(Duration::from_millis(200), ws.next()).await
    {
        panic!("unexpected message: {}", text);
    }
}

#[tokio::test]
async fn test_join_relay_and_leave() {
    let (addr, hub) = start_test_server(ServerConfig::default()).await;

    let mut a = connect(addr).await;
    settle(&hub, |s| s.total_connections == 1).await;
    let mut b = connect(addr).await;
    settle(&hub, |s| s.total_connections == 2).await;
    let mut c = connect(addr).await;
    settle(&hub, |s| s.total_connections == 3).await;

    assert_eq!(next_envelope(&mut a).await.content, JOINED_CONTENT);
    assert_eq!(next_envelope(&mut a).await.content, JOINED_CONTENT);
    assert_eq!(next_envelope(&mut b).await.content, JOINED_CONTENT);

    a.send(Message::Text("hi".into())).await.unwrap();

    // The sender's echo tells us which id the server gave it
    let echo = next_envelope(&mut a).await;
    assert_eq!(echo.content, "hi");
    assert!(!echo.sender.is_empty());

    for peer in [&mut b, &mut c] {
        let envelope = next_envelope(peer).await;
        assert_eq!(envelope.sender, echo.sender);
        assert_eq!(envelope.content, "hi");
        assert!(envelope.recipient.is_empty());
    }

    c.close(None).await.unwrap();

    for peer in [&mut a, &mut b] {
        let envelope = next_envelope(peer).await;
        assert!(envelope.is_system());
        assert_eq!(envelope.content, LEFT_CONTENT);
    }

    let stats = settle(&hub, |s| s.active_connections == 2).await;
    assert_eq!(stats.total_connections, 3);
    assert_eq!(stats.evictions, 0);

    assert_quiet(&mut a).await;
    assert_quiet(&mut b).await;
}

#[tokio::test]
async fn test_wire_format_omits_empty_fields() {
    let (addr, hub) = start_test_server(ServerConfig::default()).await;

    let mut a = connect(addr).await;
    settle(&hub, |s| s.total_connections == 1).await;
    let _b = connect(addr).await;
    settle(&hub, |s| s.total_connections == 2).await;

    let raw = timeout(Duration::from_secs(2), a.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(
        raw,
        Message::Text(r#"{"content":"/A new socket has connected."}"#.into())
    );
}

#[tokio::test]
async fn test_binary_frames_are_relayed_as_text() {
    let (addr, hub) = start_test_server(ServerConfig::default()).await;

    let mut a = connect(addr).await;
    settle(&hub, |s| s.total_connections == 1).await;

    a.send(Message::Binary(b"bytes".to_vec())).await.unwrap();

    let echo = next_envelope(&mut a).await;
    assert_eq!(echo.content, "bytes");
}

#[tokio::test]
async fn test_identities_are_distinct() {
    let (addr, hub) = start_test_server(ServerConfig::default()).await;

    let mut clients = Vec::new();
    for i in 0..5 {
        clients.push(connect(addr).await);
        settle(&hub, move |s| s.total_connections == i + 1).await;
    }

    let mut senders = HashSet::new();
    for (i, client) in clients.iter_mut().enumerate() {
        client
            .send(Message::Text(format!("from {}", i)))
            .await
            .unwrap();

        // Skip join announcements until our own echo shows up
        loop {
            let envelope = next_envelope(client).await;
            if envelope.content == format!("from {}", i) {
                senders.insert(envelope.sender);
                break;
            }
        }
    }

    assert_eq!(senders.len(), 5);
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let (addr, hub) = start_test_server(ServerConfig::default()).await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/other", addr)).await;

    match result {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 404),
        other => panic!("expected 404, got {:?}", other.map(|_| ())),
    }

    assert_eq!(hub.stats().borrow().total_connections, 0);
}

#[tokio::test]
async fn test_connection_limit() {
    let (addr, hub) = start_test_server(ServerConfig::default().max_connections(1)).await;

    let _first = connect(addr).await;
    settle(&hub, |s| s.active_connections == 1).await;

    let second = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr)).await;
    assert!(second.is_err());
}

#[tokio::test]
async fn test_abrupt_disconnect_announces_leave() {
    let (addr, hub) = start_test_server(ServerConfig::default()).await;

    let mut a = connect(addr).await;
    settle(&hub, |s| s.total_connections == 1).await;
    let b = connect(addr).await;
    settle(&hub, |s| s.total_connections == 2).await;
    assert_eq!(next_envelope(&mut a).await.content, JOINED_CONTENT);

    // No close handshake, the socket just goes away
    drop(b);

    assert_eq!(next_envelope(&mut a).await.content, LEFT_CONTENT);
    settle(&hub, |s| s.active_connections == 1).await;
}
