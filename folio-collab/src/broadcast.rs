//! Per-document fan-out for the relay server.
//!
//! Every connection in a room subscribes to one tokio broadcast channel.
//! Frames carry the sending connection's id so each connection can skip
//! its own messages; filtering is the receiver's job.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// One encoded message on its way to the peers of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFrame {
    pub sender: Uuid,
    pub payload: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub messages_sent: u64,
    pub active_peers: usize,
    pub version: u64,
}

/// A broadcast group for a single document room.
pub struct BroadcastGroup {
    sender: broadcast::Sender<Arc<RelayFrame>>,
    peers: RwLock<HashSet<Uuid>>,
    capacity: usize,
    /// Last version handed out in this room.
    version: AtomicU64,
    messages_sent: AtomicU64,
}

impl BroadcastGroup {
    /// `capacity` bounds how far a slow peer may lag before it starts
    /// losing frames.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            peers: RwLock::new(HashSet::new()),
            capacity,
            version: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
        }
    }

    pub async fn add_peer(&self, peer: Uuid) -> broadcast::Receiver<Arc<RelayFrame>> {
        self.peers.write().await.insert(peer);
        self.sender.subscribe()
    }

    pub async fn remove_peer(&self, peer: &Uuid) -> bool {
        self.peers.write().await.remove(peer)
    }

    /// Claim the room's next document version.
    pub fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Send to every subscriber. Returns how many receivers got the frame.
    pub fn broadcast(&self, frame: RelayFrame) -> usize {
        let count = self.sender.send(Arc::new(frame)).unwrap_or(0);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn has_peer(&self, peer: &Uuid) -> bool {
        self.peers.read().await.contains(peer)
    }

    pub async fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            active_peers: self.peers.read().await.len(),
            version: self.version(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Maps document ids to their broadcast groups.
pub struct RoomManager {
    rooms: RwLock<HashMap<Uuid, Arc<BroadcastGroup>>>,
    default_capacity: usize,
}

impl RoomManager {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            default_capacity,
        }
    }

    pub async fn get_or_create(&self, doc_id: Uuid) -> Arc<BroadcastGroup> {
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(&doc_id) {
                return room.clone();
            }
        }

        let mut rooms = self.rooms.write().await;
        // another connection may have created it meanwhile
        if let Some(room) = rooms.get(&doc_id) {
            return room.clone();
        }
        let room = Arc::new(BroadcastGroup::new(self.default_capacity));
        rooms.insert(doc_id, room.clone());
        log::debug!("opened room for document {doc_id}");
        room
    }

    pub async fn get(&self, doc_id: &Uuid) -> Option<Arc<BroadcastGroup>> {
        self.rooms.read().await.get(doc_id).cloned()
    }

    /// Drop a room nobody is connected to. Its version history goes with it.
    pub async fn remove_if_empty(&self, doc_id: &Uuid) -> bool {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get(doc_id) {
            if room.peer_count().await == 0 {
                rooms.remove(doc_id);
                log::debug!("closed empty room for document {doc_id}");
                return true;
            }
        }
        false
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
