//! Autosave bookkeeping.
//!
//! ```text
//!   Idle ──edit──▶ Dirty ──due──▶ Saving ──ok──▶ Saved ──edit──▶ Dirty
//!                    ▲                  │
//!                    └──────edit────── Error ◀──fail──┘
//! ```
//!
//! Only user edits mark the document dirty. A failed save keeps the dirty
//! flag, so the next due check retries.

use std::time::{Duration, Instant};

use crate::schedule::Debouncer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Dirty,
    Saving,
    Saved { version: u64 },
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct AutoSave {
    state: SaveState,
    dirty: bool,
    timer: Debouncer,
}

impl AutoSave {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: SaveState::Idle,
            dirty: false,
            timer: Debouncer::new(delay),
        }
    }

    pub fn state(&self) -> &SaveState {
        &self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record a user edit and (re)arm the save timer.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        if self.state != SaveState::Saving {
            self.state = SaveState::Dirty;
        }
        self.timer.schedule(now);
    }

    /// True once the debounce window after the last edit has elapsed and
    /// there is something to save.
    pub fn due(&mut self, now: Instant) -> bool {
        if !self.dirty || self.state == SaveState::Saving {
            return false;
        }
        self.timer.fire(now).is_some()
    }

    /// Enter `Saving`. Edits arriving while saving keep the flag set.
    pub fn begin(&mut self) {
        self.dirty = false;
        self.timer.cancel();
        self.state = SaveState::Saving;
    }

    pub fn succeed(&mut self, version: u64) {
        self.state = if self.dirty {
            SaveState::Dirty
        } else {
            SaveState::Saved { version }
        };
    }

    pub fn fail(&mut self, message: impl Into<String>, now: Instant) {
        let message = message.into();
        log::warn!("save failed: {message}");
        self.dirty = true;
        self.state = SaveState::Error { message };
        self.timer.schedule(now);
    }

    /// When the pending save comes due, if one is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.pending().map(|t| t.deadline)
    }
}
