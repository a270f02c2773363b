//! Integration tests for the collaboration relay.
//!
//! Verifies:
//! - Peers on the same document receive each other's operations, stamped
//!   with increasing versions, and never their own echo
//! - Documents are isolated from one another
//! - Operations sent while offline are replayed on connect
//! - A peer whose socket dies is removed from its room
//! - Connection lifecycle never blocks on an undrained event stream
//! - Two pagination engines converge through the relay
//! - Applying a remote operation does not produce outbound traffic

use std::sync::Arc;
use std::time::Instant;

use folio_collab::{
    CollabMessage, CollaborationSync, ConnectionState, InboundOutcome, RelayConfig, RelayServer,
    SyncClient, SyncEvent,
};
use folio_core::{Delta, EditorRuntimeConfig, Page};
use folio_layout::{PaginationEngine, Source};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

// ─── Helpers ───────────────────────────────────────────────────────

async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a relay on a free port and return its base URL.
async fn start_relay() -> String {
    let port = free_port().await;
    let server = RelayServer::new(RelayConfig {
        bind_addr: format!("127.0.0.1:{port}"),
        ..Default::default()
    });
    tokio::spawn(async move {
        server.run().await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("ws://127.0.0.1:{port}")
}

async fn connected(url: &str, doc_id: Uuid) -> (SyncClient, mpsc::Receiver<SyncEvent>) {
    let mut client = SyncClient::new(url);
    let mut events = client.take_event_rx().unwrap();
    client.connect(doc_id).await.unwrap();
    match next_event(&mut events).await {
        Some(SyncEvent::Connected) => {}
        other => panic!("expected Connected, got {other:?}"),
    }
    (client, events)
}

async fn next_event(events: &mut mpsc::Receiver<SyncEvent>) -> Option<SyncEvent> {
    timeout(Duration::from_secs(2), events.recv()).await.ok().flatten()
}

async fn next_remote(events: &mut mpsc::Receiver<SyncEvent>) -> CollabMessage {
    match next_event(events).await {
        Some(SyncEvent::RemoteOperation(msg)) => msg,
        other => panic!("expected a remote operation, got {other:?}"),
    }
}

/// Let the relay register freshly connected peers.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn engine_with(text: &str) -> PaginationEngine<folio_layout::MeasuredFactory> {
    let mut engine = PaginationEngine::measured(EditorRuntimeConfig::default());
    engine.load_pages(vec![Page::new(Delta::new().insert(text))]);
    engine
}

// ─── Relay ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_peer_receives_stamped_operation_without_echo() {
    let url = start_relay().await;
    let doc_id = Uuid::new_v4();
    let (alice, mut alice_events) = connected(&url, doc_id).await;
    let (_bob, mut bob_events) = connected(&url, doc_id).await;
    settle().await;

    alice.send_operation(&Delta::new().insert("hi"), 0).await.unwrap();
    let msg = next_remote(&mut bob_events).await;
    assert_eq!(msg.version, 1);
    assert!(msg.is_from(alice.client_id()));
    assert_eq!(msg.delta(), Delta::new().insert("hi"));

    alice.send_operation(&Delta::new().retain(2).insert("!"), 1).await.unwrap();
    assert_eq!(next_remote(&mut bob_events).await.version, 2);

    let echo = timeout(Duration::from_millis(200), alice_events.recv()).await;
    assert!(echo.is_err(), "sender must not receive its own operation");
}

#[tokio::test]
async fn test_documents_are_isolated() {
    let url = start_relay().await;
    let (alice, _alice_events) = connected(&url, Uuid::new_v4()).await;
    let (_carol, mut carol_events) = connected(&url, Uuid::new_v4()).await;
    settle().await;

    alice.send_operation(&Delta::new().insert("private"), 0).await.unwrap();
    let leaked = timeout(Duration::from_millis(200), carol_events.recv()).await;
    assert!(leaked.is_err(), "operations must stay in their document");
}

#[tokio::test]
async fn test_offline_operations_replay_on_connect() {
    let url = start_relay().await;
    let doc_id = Uuid::new_v4();
    let (_bob, mut bob_events) = connected(&url, doc_id).await;
    settle().await;

    let mut alice = SyncClient::new(&url);
    let _alice_events = alice.take_event_rx().unwrap();
    alice.send_operation(&Delta::new().insert("a"), 0).await.unwrap();
    alice.send_operation(&Delta::new().retain(1).insert("b"), 0).await.unwrap();
    assert_eq!(alice.offline_queue_len().await, 2);

    alice.connect(doc_id).await.unwrap();
    assert_eq!(alice.connection_state().await, ConnectionState::Connected);
    assert_eq!(alice.offline_queue_len().await, 0);

    let first = next_remote(&mut bob_events).await;
    let second = next_remote(&mut bob_events).await;
    assert_eq!(first.delta(), Delta::new().insert("a"));
    assert_eq!(second.delta(), Delta::new().retain(1).insert("b"));
    assert!(second.version > first.version);
}

#[tokio::test]
async fn test_disconnect_emits_event() {
    let url = start_relay().await;
    let (mut alice, mut events) = connected(&url, Uuid::new_v4()).await;
    alice.disconnect().await;
    assert!(matches!(next_event(&mut events).await, Some(SyncEvent::Disconnected)));
    assert_eq!(alice.connection_state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_dropped_peer_leaves_room() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let server = Arc::new(RelayServer::with_defaults());
    let relay = server.clone();
    tokio::spawn(async move {
        relay.serve(listener).await.unwrap();
    });

    let doc_id = Uuid::new_v4();
    let (alice, _alice_events) = connected(&url, doc_id).await;
    let (bob_socket, _) = tokio_tungstenite::connect_async(format!("{url}/{doc_id}"))
        .await
        .unwrap();
    settle().await;
    let room = server.rooms().get(&doc_id).await.unwrap();
    assert_eq!(room.peer_count().await, 2);

    // no close handshake: the relay finds out on read or on its next send
    drop(bob_socket);
    for n in 0..5 {
        alice.send_operation(&Delta::new().retain(n).insert("x"), n as u64).await.unwrap();
    }

    let mut remaining = room.peer_count().await;
    for _ in 0..40 {
        if remaining == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        remaining = room.peer_count().await;
    }
    assert_eq!(remaining, 1);
    let stats = server.stats().await;
    assert_eq!(stats.total_connections, 2);
    assert_eq!(stats.active_connections, 1);
}

#[tokio::test]
async fn test_lifecycle_does_not_wait_on_undrained_events() {
    let url = start_relay().await;
    let doc_id = Uuid::new_v4();
    let mut alice = SyncClient::new(&url);
    // held but never read
    let _events = alice.take_event_rx().unwrap();

    let cycles = async {
        for _ in 0..150 {
            alice.connect(doc_id).await.unwrap();
            alice.disconnect().await;
        }
    };
    timeout(Duration::from_secs(20), cycles)
        .await
        .expect("connect/disconnect blocked on the event channel");
    assert_eq!(alice.connection_state().await, ConnectionState::Disconnected);
}

// ─── Engines ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_two_engines_converge() {
    let url = start_relay().await;
    let doc_id = Uuid::new_v4();
    let (alice_client, _alice_events) = connected(&url, doc_id).await;
    let (_bob_client, mut bob_events) = connected(&url, doc_id).await;
    settle().await;

    let mut alice = engine_with("Hello");
    let mut bob = engine_with("Hello");
    let mut alice_sync = CollaborationSync::new(alice_client.client_id());
    let mut bob_sync = CollaborationSync::default();

    let page = alice.page_ids()[0];
    alice
        .edit_page(page, &Delta::new().retain(5).insert(", world"), Source::User, Instant::now())
        .unwrap();
    let changes = alice.take_user_changes();
    alice_sync.record_page_changes(&alice, changes);
    assert_eq!(alice_sync.flush(&alice_client).await.unwrap(), 1);

    let msg = next_remote(&mut bob_events).await;
    let outcome = bob_sync.apply_inbound(&msg, &mut bob, Instant::now());
    assert!(matches!(outcome, InboundOutcome::Applied(ref pages) if pages.len() == 1));

    assert_eq!(bob.plain_text(), "Hello, world");
    assert_eq!(bob.plain_text(), alice.plain_text());
    assert_eq!(bob_sync.version(), 1);
    assert!(bob.take_user_changes().is_empty());
    assert!(!bob_sync.has_outbound());
}
