//! Per-page undo history.
//!
//! Only user changes are recorded. Silent changes (engine moves, remote
//! operations) are never undone; instead every recorded step is rebased
//! over them so it still applies to the content that is actually there.

use std::time::{Duration, Instant};

use folio_core::{Delta, HistoryPolicy};

#[derive(Debug, Clone)]
pub struct History {
    undo: Vec<Delta>,
    redo: Vec<Delta>,
    delay: Duration,
    max_stack: usize,
    /// Start of the step currently open for grouping.
    last_recorded: Option<Instant>,
}

impl History {
    pub fn new(policy: &HistoryPolicy) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            delay: policy.delay(),
            max_stack: policy.max_stack,
            last_recorded: None,
        }
    }

    /// Record a user change made to `before`. A change made within the
    /// delay of the open step is folded into it.
    pub fn record(&mut self, change: &Delta, before: &Delta, now: Option<Instant>) {
        if change.is_empty() {
            return;
        }
        self.redo.clear();
        let mut undo = change.invert(before);
        let joins = match (now, self.last_recorded) {
            (Some(now), Some(last)) => now < last + self.delay,
            _ => false,
        };
        match self.undo.pop() {
            Some(previous) if joins => undo = undo.compose(&previous),
            previous => {
                self.undo.extend(previous);
                self.last_recorded = now;
            }
        }
        if undo.is_empty() {
            return;
        }
        self.undo.push(undo);
        if self.undo.len() > self.max_stack {
            self.undo.remove(0);
        }
    }

    /// Rebase both stacks over a change that is not part of the history.
    pub fn transform(&mut self, change: &Delta) {
        if change.is_empty() {
            return;
        }
        rebase(&mut self.undo, change);
        rebase(&mut self.redo, change);
    }

    pub fn pop_undo(&mut self) -> Option<Delta> {
        self.last_recorded = None;
        self.undo.pop()
    }

    pub fn pop_redo(&mut self) -> Option<Delta> {
        self.last_recorded = None;
        self.redo.pop()
    }

    /// Keep the reverse of an applied undo step for redo.
    pub fn push_redo(&mut self, delta: Delta) {
        if !delta.is_empty() {
            self.redo.push(delta);
        }
    }

    /// Keep the reverse of an applied redo step. Unlike [`History::record`]
    /// this leaves the redo stack alone.
    pub fn push_undo(&mut self, delta: Delta) {
        if !delta.is_empty() {
            self.undo.push(delta);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }
}

/// Newest entry first: each entry was made after the ones below it, so
/// the foreign change is carried down the stack as it goes.
fn rebase(stack: &mut Vec<Delta>, change: &Delta) {
    let mut foreign = change.clone();
    for i in (0..stack.len()).rev() {
        let entry = std::mem::take(&mut stack[i]);
        stack[i] = foreign.transform(&entry, true);
        foreign = entry.transform(&foreign, false);
        if stack[i].is_empty() {
            stack.remove(i);
        }
    }
}
