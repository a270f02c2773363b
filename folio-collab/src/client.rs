//! WebSocket client for the collaboration channel.
//!
//! Provides:
//! - Connection lifecycle (connect, disconnect)
//! - Outbound operations stamped with this client's id
//! - Offline queue for edits made while disconnected
//! - An event stream of remote operations
//!
//! The channel for a document lives at `{server_url}/{document_id}`.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use folio_core::Delta;

use crate::protocol::{CollabMessage, ProtocolError};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events emitted by the sync client.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected,
    /// The channel closed or failed; local editing is unaffected.
    Disconnected,
    /// An operation from another client.
    RemoteOperation(CollabMessage),
}

/// Operations made while disconnected, replayed in order on reconnect.
pub struct OfflineQueue {
    queue: VecDeque<CollabMessage>,
    max_size: usize,
}

impl OfflineQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Returns false when the queue is full.
    pub fn enqueue(&mut self, msg: CollabMessage) -> bool {
        if self.queue.len() >= self.max_size {
            return false;
        }
        self.queue.push_back(msg);
        true
    }

    pub fn drain(&mut self) -> Vec<CollabMessage> {
        self.queue.drain(..).collect()
    }

    /// Put messages back at the head of the queue, ahead of anything
    /// queued since they were drained. The capacity limit does not apply.
    pub fn requeue_front(&mut self, msgs: Vec<CollabMessage>) {
        for msg in msgs.into_iter().rev() {
            self.queue.push_front(msg);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

pub struct SyncClient {
    client_id: Uuid,
    server_url: String,
    doc_id: Option<Uuid>,
    state: Arc<RwLock<ConnectionState>>,
    offline_queue: Arc<Mutex<OfflineQueue>>,
    /// Text frames for the writer task.
    outgoing_tx: Option<mpsc::Sender<String>>,
    event_rx: Option<mpsc::Receiver<SyncEvent>>,
    event_tx: mpsc::Sender<SyncEvent>,
    reader: Option<JoinHandle<()>>,
}

impl SyncClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_client_id(Uuid::new_v4(), server_url)
    }

    pub fn with_client_id(client_id: Uuid, server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            client_id,
            server_url: server_url.into(),
            doc_id: None,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            offline_queue: Arc::new(Mutex::new(OfflineQueue::new(10_000))),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
            reader: None,
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    /// Open the channel for `doc_id` and replay anything queued offline.
    pub async fn connect(&mut self, doc_id: Uuid) -> Result<(), ProtocolError> {
        if self.connection_state().await == ConnectionState::Connected {
            self.disconnect().await;
        }
        *self.state.write().await = ConnectionState::Connecting;
        self.doc_id = Some(doc_id);

        let url = format!("{}/{}", self.server_url.trim_end_matches('/'), doc_id);
        let ws_stream = match tokio_tungstenite::connect_async(&url).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::Connect { url, reason: e.to_string() });
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward outgoing frames; closing the channel closes
        // the socket.
        let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if ws_writer.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            let _ = ws_writer.send(Message::Close(None)).await;
        });

        *self.state.write().await = ConnectionState::Connected;
        self.emit(SyncEvent::Connected);
        log::info!("connected to {url}");

        self.replay_offline(&out_tx).await;
        self.outgoing_tx = Some(out_tx);

        // Reader task: surface remote operations, skipping our own echoes.
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        let client_id = self.client_id;
        self.reader = Some(tokio::spawn(async move {
            while let Some(frame) = ws_reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => match CollabMessage::decode(text.as_str()) {
                        Ok(msg) if msg.is_from(client_id) => {}
                        Ok(msg) => {
                            let _ = event_tx.send(SyncEvent::RemoteOperation(msg)).await;
                        }
                        Err(e) => log::warn!("dropping undecodable frame: {e}"),
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(SyncEvent::Disconnected).await;
            log::info!("collaboration channel closed");
        }));

        Ok(())
    }

    /// Send everything queued offline through `out_tx`, oldest first.
    /// Whatever cannot be handed to the writer goes back on the queue.
    /// Returns how many messages were sent.
    async fn replay_offline(&self, out_tx: &mpsc::Sender<String>) -> usize {
        let mut queued: VecDeque<CollabMessage> = self.offline_queue.lock().await.drain().into();
        if queued.is_empty() {
            return 0;
        }
        log::info!("replaying {} queued operation(s)", queued.len());
        let mut sent = 0;
        while let Some(msg) = queued.pop_front() {
            let text = match msg.encode() {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("dropping queued operation that cannot be encoded: {e}");
                    continue;
                }
            };
            if out_tx.send(text).await.is_err() {
                queued.push_front(msg);
                log::warn!("writer closed during replay; {} operation(s) stay queued", queued.len());
                self.offline_queue.lock().await.requeue_front(queued.into());
                break;
            }
            sent += 1;
        }
        sent
    }

    /// Lifecycle events never wait on the receiver.
    fn emit(&self, event: SyncEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            log::warn!("sync event not delivered: {e}");
        }
    }

    /// Close the channel. Operations sent afterwards are queued.
    pub async fn disconnect(&mut self) {
        // dropping the sender ends the writer task, which closes the socket
        self.outgoing_tx = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        let was_open = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, ConnectionState::Disconnected) != ConnectionState::Disconnected
        };
        if was_open {
            self.emit(SyncEvent::Disconnected);
        }
    }

    /// Send a change against the flat document, based on `base_version`.
    ///
    /// While disconnected the operation is queued for replay.
    pub async fn send_operation(&self, change: &Delta, base_version: u64) -> Result<(), ProtocolError> {
        let msg = CollabMessage::new(self.client_id, base_version, change);

        let connected = *self.state.read().await == ConnectionState::Connected;
        match (&self.outgoing_tx, connected) {
            (Some(tx), true) => tx
                .send(msg.encode()?)
                .await
                .map_err(|_| ProtocolError::ConnectionClosed),
            _ => {
                let mut queue = self.offline_queue.lock().await;
                if !queue.enqueue(msg) {
                    return Err(ProtocolError::QueueFull(queue.len()));
                }
                Ok(())
            }
        }
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn doc_id(&self) -> Option<Uuid> {
        self.doc_id
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub async fn offline_queue_len(&self) -> usize {
        self.offline_queue.lock().await.len()
    }
}
