//! Debounced layout checks.
//!
//! One coalescing timer per check kind. Each request re-arms the timer and
//! adds the page to that kind's pending set; when the timer fires, every
//! pending page is checked once.
//!
//! ```text
//!  insert ──► overflow timer (300ms) ─┐
//!  format ──► both                    ├──► tick(now) ──► DueChecks
//!  delete ──► reflow timer   (450ms) ─┘
//! ```

use std::time::Instant;

use folio_core::{Delta, Op, PageId, TimerToken, Timing};
use folio_core::schedule::Debouncer;

/// What a change did, for deciding which checks it needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub inserts: bool,
    pub deletes: bool,
    pub formats: bool,
}

impl ChangeSummary {
    pub fn of(change: &Delta) -> Self {
        let mut summary = Self::default();
        for op in &change.ops {
            match op {
                Op::Insert { .. } => summary.inserts = true,
                Op::Delete { .. } => summary.deletes = true,
                Op::Retain { attributes, .. } if !attributes.is_empty() => summary.formats = true,
                Op::Retain { .. } => {}
            }
        }
        summary
    }

    /// Content may have grown.
    pub fn may_grow(&self) -> bool {
        self.inserts || self.formats
    }

    /// Content may have shrunk.
    pub fn may_shrink(&self) -> bool {
        self.deletes || self.formats
    }
}

/// Pages whose checks are due, in request order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DueChecks {
    pub overflow: Vec<PageId>,
    pub reflow: Vec<PageId>,
}

impl DueChecks {
    pub fn is_empty(&self) -> bool {
        self.overflow.is_empty() && self.reflow.is_empty()
    }
}

#[derive(Debug, Clone)]
struct PendingCheck {
    timer: Debouncer,
    pages: Vec<PageId>,
}

impl PendingCheck {
    fn new(timer: Debouncer) -> Self {
        Self {
            timer,
            pages: Vec::new(),
        }
    }

    fn request(&mut self, page: PageId, now: Instant) -> TimerToken {
        if !self.pages.contains(&page) {
            self.pages.push(page);
        }
        self.timer.schedule(now)
    }

    fn take_due(&mut self, now: Instant) -> Vec<PageId> {
        match self.timer.fire(now) {
            Some(_) => std::mem::take(&mut self.pages),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckScheduler {
    overflow: PendingCheck,
    reflow: PendingCheck,
}

impl CheckScheduler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            overflow: PendingCheck::new(Debouncer::new(timing.overflow_delay())),
            reflow: PendingCheck::new(Debouncer::new(timing.reflow_delay())),
        }
    }

    /// Schedule the checks `summary` calls for.
    pub fn request(&mut self, page: PageId, summary: ChangeSummary, now: Instant) {
        if summary.may_grow() {
            self.request_overflow(page, now);
        }
        if summary.may_shrink() {
            self.request_reflow(page, now);
        }
    }

    pub fn request_overflow(&mut self, page: PageId, now: Instant) -> TimerToken {
        self.overflow.request(page, now)
    }

    pub fn request_reflow(&mut self, page: PageId, now: Instant) -> TimerToken {
        self.reflow.request(page, now)
    }

    /// Drop a page from the pending sets (it was removed).
    pub fn forget(&mut self, page: PageId) {
        self.overflow.pages.retain(|p| *p != page);
        self.reflow.pages.retain(|p| *p != page);
    }

    pub fn clear(&mut self) {
        for check in [&mut self.overflow, &mut self.reflow] {
            check.timer.cancel();
            check.pages.clear();
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.overflow.timer.is_pending() && !self.reflow.timer.is_pending()
    }

    /// Earliest instant at which something becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.overflow.timer.pending(), self.reflow.timer.pending()]
            .into_iter()
            .flatten()
            .map(|t| t.deadline)
            .min()
    }

    pub fn due(&mut self, now: Instant) -> DueChecks {
        DueChecks {
            overflow: self.overflow.take_due(now),
            reflow: self.reflow.take_due(now),
        }
    }
}
