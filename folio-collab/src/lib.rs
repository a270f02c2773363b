//! # folio-collab — real-time collaboration for the folio paginated editor
//!
//! Clients exchange Delta changes expressed against the flat document
//! (pages joined with page-break markers). A relay server stamps each
//! change with the room's next version and fans it out to every other
//! peer in the room. There is no server-side document and no transform:
//! the relay orders, it does not merge.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐                      ┌─────────────┐
//! │ PaginationEngine  │                      │ RelayServer │
//! └───────┬───────────┘                      │  /{doc_id}  │
//!         │ lift / route                     └──────┬──────┘
//!         ▼                                         │
//! ┌───────────────────┐   WebSocket (JSON)   ┌──────┴───────┐
//! │ CollaborationSync │ ◄──────────────────► │BroadcastGroup│
//! │ + SyncClient      │                      │ (fan-out)    │
//! └───────────────────┘                      └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — JSON wire message (`version`, `clientId`, `ops`)
//! - [`broadcast`] — per-document rooms with version stamping
//! - [`server`] — WebSocket relay
//! - [`client`] — WebSocket client with offline queue
//! - [`sync`] — engine ⇄ channel bookkeeping

pub mod broadcast;
pub mod client;
pub mod protocol;
pub mod server;
pub mod sync;

pub use broadcast::{BroadcastGroup, BroadcastStats, RelayFrame, RoomManager};
pub use client::{ConnectionState, OfflineQueue, SyncClient, SyncEvent};
pub use protocol::{CollabMessage, ProtocolError};
pub use server::{RelayConfig, RelayServer, RelayStats};
pub use sync::{CollaborationSync, InboundOutcome};
