//! Reference relay server: one room per document.
//!
//! ```text
//! Client A ──┐                         ┌──► Client B
//!             ├── /{doc_id} ── Room ───┤
//! Client C ──┘   (version++)           └──► Client C (not A)
//! ```
//!
//! The relay does not interpret operations. It stamps each one with the
//! room's next version and forwards it to every other connection in the
//! room. Conflict policy beyond that ordering is out of its hands.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::broadcast::{RelayFrame, RoomManager};
use crate::protocol::CollabMessage;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: String,
    /// Frames buffered per connection before a slow peer starts lagging.
    pub broadcast_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9090".to_string(),
            broadcast_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub relayed_operations: u64,
    pub rejected_frames: u64,
}

pub struct RelayServer {
    config: RelayConfig,
    rooms: Arc<RoomManager>,
    stats: Arc<RwLock<RelayStats>>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        let rooms = Arc::new(RoomManager::new(config.broadcast_capacity));
        Self {
            config,
            rooms,
            stats: Arc::new(RwLock::new(RelayStats::default())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RelayConfig::default())
    }

    pub fn rooms(&self) -> Arc<RoomManager> {
        self.rooms.clone()
    }

    pub async fn stats(&self) -> RelayStats {
        self.stats.read().await.clone()
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(&self) -> Result<(), BoxError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("relay listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Accept connections forever. A failed accept is logged and skipped;
    /// it does not take the relay down.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), BoxError> {
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("accept failed: {e}");
                    continue;
                }
            };
            log::debug!("new TCP connection from {addr}");

            let rooms = self.rooms.clone();
            let stats = self.stats.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, rooms, stats).await {
                    log::error!("connection error from {addr}: {e}");
                }
            });
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        rooms: Arc<RoomManager>,
        stats: Arc<RwLock<RelayStats>>,
    ) -> Result<(), BoxError> {
        let mut path = String::new();
        let ws_stream = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                path = req.uri().path().to_string();
                Ok(resp)
            },
        )
        .await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let doc_id = match Uuid::parse_str(path.trim_matches('/')) {
            Ok(id) => id,
            Err(_) => {
                log::warn!("rejecting {addr}: '{path}' is not a document channel");
                ws_sender.send(Message::Close(None)).await?;
                return Ok(());
            }
        };

        let conn_id = Uuid::new_v4();
        let room = rooms.get_or_create(doc_id).await;
        let mut broadcast_rx = room.add_peer(conn_id).await;
        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }
        log::info!("{addr} joined document {doc_id}");

        loop {
            tokio::select! {
                frame = ws_receiver.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match CollabMessage::decode(text.as_str()) {
                                Ok(mut msg) => {
                                    msg.version = room.next_version();
                                    match msg.encode() {
                                        Ok(payload) => {
                                            room.broadcast(RelayFrame { sender: conn_id, payload });
                                            stats.write().await.relayed_operations += 1;
                                        }
                                        Err(e) => {
                                            log::warn!("dropping frame from {addr}: {e}");
                                            stats.write().await.rejected_frames += 1;
                                        }
                                    }
                                }
                                Err(e) => {
                                    log::warn!("dropping frame from {addr}: {e}");
                                    stats.write().await.rejected_frames += 1;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                                log::warn!("pong to {addr} failed: {e}");
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            log::error!("WebSocket error from {addr}: {e}");
                            break;
                        }
                        _ => {}
                    }
                }

                relayed = broadcast_rx.recv() => {
                    match relayed {
                        Ok(frame) if frame.sender == conn_id => {}
                        Ok(frame) => {
                            let text = Message::Text(frame.payload.clone().into());
                            if let Err(e) = ws_sender.send(text).await {
                                log::warn!("relay to {addr} failed: {e}");
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            log::warn!("{addr} lagged by {n} operation(s)");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        // every exit from the loop above lands here
        room.remove_peer(&conn_id).await;
        rooms.remove_if_empty(&doc_id).await;
        {
            let mut s = stats.write().await;
            s.active_connections = s.active_connections.saturating_sub(1);
        }
        log::info!("{addr} left document {doc_id}");
        Ok(())
    }
}
