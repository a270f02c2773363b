//! JSON wire protocol for collaborative edits.
//!
//! One message kind travels over the channel: an operation against the
//! flat (serialized) document, sent as a WebSocket text frame.
//!
//! ```text
//! {"version": 7, "clientId": "6f1c…", "ops": [{"retain": 12}, {"insert": "x"}]}
//! ```
//!
//! `version` is the sender's last-known document version on the way out;
//! the relay stamps the room's next version on the way back.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use folio_core::{Delta, Op};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollabMessage {
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    pub ops: Vec<Op>,
}

impl CollabMessage {
    pub fn new(client_id: Uuid, version: u64, change: &Delta) -> Self {
        Self {
            version,
            client_id: Some(client_id),
            ops: change.ops.clone(),
        }
    }

    /// The carried change, ops as received.
    pub fn delta(&self) -> Delta {
        Delta { ops: self.ops.clone() }
    }

    /// Whether this message was sent by `client_id`.
    pub fn is_from(&self, client_id: Uuid) -> bool {
        self.client_id == Some(client_id)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Offline queue is full ({0} operations)")]
    QueueFull(usize),
}
