//! Bookkeeping between the pagination engine and the collaboration channel.
//!
//! Outbound: user changes on a page are lifted to flat offsets and queued
//! as messages carrying the last-known version. Inbound: remote messages
//! are applied through the engine silently, so they are never queued back
//! out and never count as local edits.

use std::collections::VecDeque;
use std::time::Instant;

use uuid::Uuid;

use folio_core::{Delta, PageId};
use folio_layout::{PaginationEngine, StoreFactory};

use crate::client::SyncClient;
use crate::protocol::{CollabMessage, ProtocolError};

/// What happened to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Our own operation coming back.
    Echo,
    /// Applied to these pages.
    Applied(Vec<PageId>),
}

#[derive(Debug, Clone)]
pub struct CollaborationSync {
    client_id: Uuid,
    version: u64,
    outbound: VecDeque<CollabMessage>,
}

impl Default for CollaborationSync {
    fn default() -> Self {
        Self::new(Uuid::new_v4())
    }
}

impl CollaborationSync {
    pub fn new(client_id: Uuid) -> Self {
        Self {
            client_id,
            version: 0,
            outbound: VecDeque::new(),
        }
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// Last-known document version.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Queue a change that is already expressed against the flat document.
    pub fn record_local(&mut self, flat_change: &Delta) {
        if flat_change.is_empty() {
            return;
        }
        self.outbound
            .push_back(CollabMessage::new(self.client_id, self.version, flat_change));
    }

    /// Lift page-local user changes and queue them. Changes for pages the
    /// engine no longer has are dropped.
    pub fn record_page_changes<F: StoreFactory>(
        &mut self,
        engine: &PaginationEngine<F>,
        changes: Vec<(PageId, Delta)>,
    ) -> usize {
        let mut recorded = 0;
        for (page, change) in changes {
            match engine.lift_change(page, &change) {
                Ok(flat) => {
                    self.record_local(&flat);
                    recorded += 1;
                }
                Err(e) => log::warn!("not broadcasting change: {e}"),
            }
        }
        recorded
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    pub fn drain_outbound(&mut self) -> Vec<CollabMessage> {
        self.outbound.drain(..).collect()
    }

    /// Apply a remote message through the engine, silently.
    pub fn apply_inbound<F: StoreFactory>(
        &mut self,
        msg: &CollabMessage,
        engine: &mut PaginationEngine<F>,
        now: Instant,
    ) -> InboundOutcome {
        if msg.is_from(self.client_id) {
            return InboundOutcome::Echo;
        }
        self.version = self.version.max(msg.version);
        InboundOutcome::Applied(engine.apply_flat_change(&msg.delta(), now))
    }

    /// Send everything queued. Messages that fail to send stay queued.
    pub async fn flush(&mut self, client: &SyncClient) -> Result<usize, ProtocolError> {
        let mut sent = 0;
        while let Some(msg) = self.outbound.pop_front() {
            if let Err(e) = client.send_operation(&msg.delta(), msg.version).await {
                self.outbound.push_front(msg);
                return Err(e);
            }
            sent += 1;
        }
        Ok(sent)
    }
}
