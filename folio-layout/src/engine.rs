//! The pagination engine.
//!
//! Owns the ordered page list and one [`PageContentStore`] per page, and
//! keeps every page within the target height by moving content between
//! neighbours:
//!
//! ```text
//!            overflow-split                       reflow-pull
//!  ┌────────┐          ┌────────┐      ┌────────┐          ┌────────┐
//!  │ page i │  tail ─► │page i+1│      │ page i │ ◄─ head  │page i+1│
//!  │▓▓▓▓▓▓▓▓│          │        │      │▓▓▓     │   line   │▓▓▓▓▓▓▓ │
//!  │▓▓▓▓▓▓▓▓│          │        │      │        │          │        │
//!  └▓▓▓▓▓▓▓▓┘          └────────┘      └────────┘          └────────┘
//! ```
//!
//! All moves are silent: they never reach the user-change log, so they are
//! neither broadcast nor counted as dirty.
//!
//! Checks are debounced through the [`CheckScheduler`]; the host calls
//! [`PaginationEngine::tick`] with the current time. Overflow propagates
//! iteratively along the page chain: page `i` is fully settled before page
//! `i + 1` is examined, so a later page only ever sees the completed move
//! into it.

use std::time::Instant;

use rustc_hash::FxHashMap;

use folio_core::{serializer, Delta, EditorRuntimeConfig, Op, Page, PageId};

use crate::error::LayoutError;
use crate::index::PageIndex;
use crate::measure::MeasuredFactory;
use crate::scheduler::{ChangeSummary, CheckScheduler};
use crate::store::{prepare_content, LineBox, PageContentStore, Source, StoreFactory};

// ───────────────────────────────────────────────────────────────────
// Reports
// ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverflowReport {
    pub pages_created: usize,
    /// Tail moves from one page to the next.
    pub moves: usize,
    /// A page was left over-height because its content could not be split.
    pub aborted: bool,
    /// A boundary newline was dropped from moved content.
    pub trimmed: bool,
}

impl OverflowReport {
    pub fn absorb(&mut self, other: OverflowReport) {
        self.pages_created += other.pages_created;
        self.moves += other.moves;
        self.aborted |= other.aborted;
        self.trimmed |= other.trimmed;
    }

    pub fn changed(&self) -> bool {
        self.moves > 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReflowReport {
    pub lines_pulled: usize,
    pub pages_removed: usize,
}

impl ReflowReport {
    pub fn absorb(&mut self, other: ReflowReport) {
        self.lines_pulled += other.lines_pulled;
        self.pages_removed += other.pages_removed;
    }

    pub fn changed(&self) -> bool {
        self.lines_pulled > 0 || self.pages_removed > 0
    }
}

/// Everything one [`PaginationEngine::tick`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutReport {
    pub overflow: OverflowReport,
    pub reflow: ReflowReport,
}

impl LayoutReport {
    pub fn changed(&self) -> bool {
        self.overflow.changed() || self.reflow.changed()
    }
}

// ───────────────────────────────────────────────────────────────────
// Split-point search
// ───────────────────────────────────────────────────────────────────

/// Offset just after the last position kept on the page, or `None` when
/// nothing can be kept. `chars` has one entry per position.
fn find_split(boxes: &[LineBox], chars: &[char], target: f32) -> Option<usize> {
    let line = boxes.iter().find(|b| b.bottom() > target)?;
    let available = (target - line.top).max(0.0);

    if available < line.line_height {
        return Some(line.start);
    }

    // Ratio estimate; the re-check loop corrects any residue.
    let estimate = ((line.length as f32) * available / line.height).floor() as usize;
    let estimate = estimate.min(line.length.saturating_sub(1));

    let boundary = (1..=estimate)
        .rev()
        .find(|&k| chars.get(line.start + k - 1).is_some_and(|c| c.is_whitespace()));
    match boundary {
        Some(k) => Some(line.start + k),
        None if estimate > 0 => Some(line.start + estimate),
        None => Some(line.start),
    }
}

fn is_bare_newline(op: &Op) -> bool {
    match op {
        Op::Insert { attributes, .. } => attributes.is_empty() && op.insert_text() == Some("\n"),
        _ => false,
    }
}

// ───────────────────────────────────────────────────────────────────
// Engine
// ───────────────────────────────────────────────────────────────────

struct PageSlot<S> {
    id: PageId,
    store: S,
}

pub struct PaginationEngine<F: StoreFactory> {
    config: EditorRuntimeConfig,
    factory: F,
    slots: Vec<PageSlot<F::Store>>,
    /// page id → slot position, rebuilt after structural changes
    positions: FxHashMap<PageId, usize>,
    active: Option<PageId>,
    scheduler: CheckScheduler,
}

impl PaginationEngine<MeasuredFactory> {
    /// Engine over in-memory measured buffers.
    pub fn measured(config: EditorRuntimeConfig) -> Self {
        let factory = MeasuredFactory::new(config.clone());
        Self::new(config, factory)
    }
}

impl<F: StoreFactory> PaginationEngine<F> {
    /// A fresh engine holding one blank, focused page.
    pub fn new(config: EditorRuntimeConfig, factory: F) -> Self {
        let scheduler = CheckScheduler::new(&config.timing);
        let mut engine = Self {
            config,
            factory,
            slots: Vec::new(),
            positions: FxHashMap::default(),
            active: None,
            scheduler,
        };
        engine.load_pages(vec![Page::blank()]);
        engine
    }

    pub fn config(&self) -> &EditorRuntimeConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Page list
    // ---------------------------------------------------------------

    /// Replace every page. An empty list loads one blank page. Invalid page
    /// content is replaced by a blank page without failing the load.
    pub fn load_pages(&mut self, pages: Vec<Page>) {
        let pages = if pages.is_empty() { vec![Page::blank()] } else { pages };
        self.scheduler.clear();
        let slots: Vec<_> = pages
            .into_iter()
            .map(|page| {
                let store = self.materialize(&page);
                PageSlot { id: page.id, store }
            })
            .collect();
        self.slots = slots;
        self.reindex();
        self.active = None;
        self.focus_at(0);
        log::debug!("loaded {} page(s)", self.slots.len());
    }

    /// Load a flat (serialized) document.
    pub fn load_flat(&mut self, flat: &Delta) {
        self.load_pages(serializer::deserialize(flat));
    }

    pub fn page_count(&self) -> usize {
        self.slots.len()
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        self.slots.iter().map(|s| s.id).collect()
    }

    pub fn page_index(&self, id: PageId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn store(&self, id: PageId) -> Option<&F::Store> {
        let idx = self.page_index(id)?;
        Some(&self.slots[idx].store)
    }

    pub fn page_content(&self, id: PageId) -> Option<Delta> {
        self.store(id).map(PageContentStore::contents)
    }

    /// Current content of every page, in order.
    pub fn pages(&self) -> Vec<Page> {
        self.slots
            .iter()
            .map(|s| Page { id: s.id, content: s.store.contents() })
            .collect()
    }

    pub fn serialize(&self) -> Delta {
        serializer::serialize(&self.pages())
    }

    /// Each page's text, pages concatenated in order.
    pub fn plain_text(&self) -> String {
        self.pages().iter().map(Page::text).collect()
    }

    pub fn flat_index(&self) -> PageIndex {
        PageIndex::build(self.slots.iter().map(|s| (s.id, s.store.len())))
    }

    /// Append a blank page and focus it.
    pub fn add_page(&mut self) -> PageId {
        let page = Page::blank();
        let id = page.id;
        let idx = self.slots.len();
        self.insert_slot(idx, page);
        self.focus_at(idx);
        id
    }

    /// Remove a page. The last remaining page can never be removed.
    pub fn remove_page(&mut self, id: PageId) -> Result<(), LayoutError> {
        let idx = self.position(id)?;
        if self.slots.len() <= 1 {
            return Err(LayoutError::LastPage);
        }
        self.remove_at(idx);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Focus
    // ---------------------------------------------------------------

    pub fn active_page(&self) -> Option<PageId> {
        self.active
    }

    pub fn set_active_page(&mut self, id: PageId) -> Result<(), LayoutError> {
        let idx = self.position(id)?;
        if self.active != Some(id) {
            self.focus_at(idx);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Edits
    // ---------------------------------------------------------------

    /// Apply a change to one page and schedule the checks it calls for.
    pub fn edit_page(
        &mut self,
        id: PageId,
        change: &Delta,
        source: Source,
        now: Instant,
    ) -> Result<(), LayoutError> {
        let idx = self.position(id)?;
        let store = &mut self.slots[idx].store;
        if source == Source::User {
            store.mark_time(now);
        }
        store.update_contents(change, source);
        self.request_checks(id, ChangeSummary::of(change), now);
        Ok(())
    }

    /// Undo the last user step on a page. The revert is a user change and
    /// is picked up by [`PaginationEngine::take_user_changes`]. Returns
    /// false when the page has nothing to undo.
    pub fn undo_page(&mut self, id: PageId, now: Instant) -> Result<bool, LayoutError> {
        let idx = self.position(id)?;
        let applied = self.slots[idx].store.undo();
        Ok(self.after_history_step(id, applied, now))
    }

    pub fn redo_page(&mut self, id: PageId, now: Instant) -> Result<bool, LayoutError> {
        let idx = self.position(id)?;
        let applied = self.slots[idx].store.redo();
        Ok(self.after_history_step(id, applied, now))
    }

    fn after_history_step(&mut self, id: PageId, applied: Option<Delta>, now: Instant) -> bool {
        match applied {
            Some(change) => {
                self.request_checks(id, ChangeSummary::of(&change), now);
                true
            }
            None => false,
        }
    }

    /// Schedule checks for a page whose store was mutated elsewhere.
    pub fn request_checks(&mut self, id: PageId, summary: ChangeSummary, now: Instant) {
        if self.positions.contains_key(&id) {
            self.scheduler.request(id, summary, now);
        }
    }

    /// User-sourced changes recorded by the stores, oldest first per page.
    pub fn take_user_changes(&mut self) -> Vec<(PageId, Delta)> {
        self.slots
            .iter_mut()
            .flat_map(|slot| {
                let id = slot.id;
                slot.store.take_changes().into_iter().map(move |c| (id, c))
            })
            .collect()
    }

    /// Express a page-local change against the flat document.
    pub fn lift_change(&self, id: PageId, change: &Delta) -> Result<Delta, LayoutError> {
        self.flat_index()
            .lift(id, change)
            .ok_or(LayoutError::PageNotFound(id))
    }

    /// Apply a change expressed against the flat document, silently.
    ///
    /// The change is routed to the pages it touches. A change that adds or
    /// removes a page break is composed onto the flat document instead and
    /// the pages are re-split, keeping existing page ids where possible.
    /// Returns the pages that changed.
    ///
    /// A change that reaches past the end of the flat document was made
    /// against a different document; it is refused and nothing changes.
    pub fn apply_flat_change(&mut self, change: &Delta, now: Instant) -> Vec<PageId> {
        let index = self.flat_index();
        let reach: usize = change
            .ops
            .iter()
            .filter(|op| !matches!(op, Op::Insert { .. }))
            .map(Op::len)
            .sum();
        if reach > index.total_len() {
            log::warn!(
                "refusing flat change reaching offset {reach} of a {}-position document",
                index.total_len()
            );
            return Vec::new();
        }
        match index.route(change) {
            Ok(routed) => {
                let mut touched = Vec::with_capacity(routed.len());
                for (id, delta) in routed {
                    if let Some(idx) = self.page_index(id) {
                        self.slots[idx].store.update_contents(&delta, Source::Silent);
                        self.scheduler.request(id, ChangeSummary::of(&delta), now);
                        touched.push(id);
                    }
                }
                touched
            }
            Err(e) => {
                log::debug!("{e}; re-splitting the document");
                let flat = self.serialize().compose(change);
                self.resplit(&flat, now)
            }
        }
    }

    // ---------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Run every check that has come due.
    pub fn tick(&mut self, now: Instant) -> LayoutReport {
        let due = self.scheduler.due(now);
        let mut report = LayoutReport::default();
        if due.is_empty() {
            return report;
        }

        let mut overflow = due.overflow;
        overflow.sort_by_key(|id| self.page_index(*id));
        for id in overflow {
            // earlier checks may have removed the page
            if let Ok(r) = self.check_overflow(id) {
                report.overflow.absorb(r);
            }
        }
        for id in due.reflow {
            if let Ok(r) = self.check_reflow(id) {
                report.reflow.absorb(r);
            }
        }
        if report.changed() {
            log::debug!("layout tick: {report:?}");
        }
        report
    }

    /// Check every page now, first to last, then reflow.
    pub fn paginate_all(&mut self) -> LayoutReport {
        let mut report = LayoutReport::default();
        let mut idx = 0;
        while idx < self.slots.len() {
            let id = self.slots[idx].id;
            if let Ok(r) = self.check_overflow(id) {
                report.overflow.absorb(r);
            }
            idx += 1;
        }
        let mut idx = 0;
        while idx < self.slots.len() {
            let id = self.slots[idx].id;
            if let Ok(r) = self.check_reflow(id) {
                report.reflow.absorb(r);
            }
            idx += 1;
        }
        report
    }

    // ---------------------------------------------------------------
    // Overflow-split
    // ---------------------------------------------------------------

    /// Move content off `id` until it fits, then follow the chain of pages
    /// that received content.
    pub fn check_overflow(&mut self, id: PageId) -> Result<OverflowReport, LayoutError> {
        let mut idx = self.position(id)?;
        let mut report = OverflowReport::default();
        while self.overflow_page(idx, &mut report) {
            idx += 1;
            if idx >= self.slots.len() {
                break;
            }
        }
        Ok(report)
    }

    /// Settle one page. Returns whether anything moved to the next page.
    fn overflow_page(&mut self, idx: usize, report: &mut OverflowReport) -> bool {
        let target = self.config.target_height_px();
        let mut moved = false;

        loop {
            let page_id = self.slots[idx].id;
            let source = &mut self.slots[idx].store;
            source.settle();
            let len = source.len();
            let height = source.content_height();
            if height <= target || len <= 1 {
                break;
            }

            let boxes = source.line_boxes();
            let chars = source.contents().positional_chars();
            let mut split = find_split(&boxes, &chars, target).unwrap_or(0);
            if split == 0 {
                // nothing of the first line fits: move everything after it
                split = boxes.first().map_or(0, |b| b.end());
            }
            if split == 0 || split >= len - 1 {
                log::warn!(
                    "page {page_id} is {height:.0}px tall but its first line cannot be split; leaving it over target"
                );
                report.aborted = true;
                break;
            }

            let mut overflow = source.contents_range(split, len - split);
            let had_focus = source.has_focus();
            let cursor = source.cursor();
            source.delete_range(split, len - split, Source::Silent);
            source.settle();

            let mut leading_trim = 0;
            if overflow.ops.len() > 1 && overflow.ops.first().is_some_and(is_bare_newline) {
                overflow.ops.remove(0);
                leading_trim = 1;
                report.trimmed = true;
            }

            let dest_idx = idx + 1;
            if dest_idx >= self.slots.len() {
                self.insert_slot(dest_idx, Page::blank());
                report.pages_created += 1;
            }

            let dest = &mut self.slots[dest_idx].store;
            if dest.is_blank() {
                if overflow.ops.len() > 1 && overflow.ops.last().is_some_and(is_bare_newline) {
                    // the blank page's own terminator takes its place
                    overflow.ops.pop();
                    report.trimmed = true;
                }
                dest.set_contents(overflow, Source::Silent);
            } else {
                let shift = overflow.len();
                let dest_cursor = dest.cursor();
                dest.update_contents(&overflow, Source::Silent);
                // the cursor stays with the text it was next to
                if let Some(c) = dest_cursor {
                    dest.set_cursor(c + shift);
                }
            }
            dest.settle();
            report.moves += 1;
            moved = true;

            if let Some(cursor) = cursor.filter(|c| had_focus && *c >= split) {
                self.focus_at(dest_idx);
                let dest = &mut self.slots[dest_idx].store;
                dest.set_cursor((cursor - split).saturating_sub(leading_trim));
                dest.scroll_into_view();
            }

            log::debug!(
                "moved {} position(s) from page {} to page {}",
                len - split,
                idx,
                dest_idx
            );
        }
        moved
    }

    // ---------------------------------------------------------------
    // Reflow-pull
    // ---------------------------------------------------------------

    /// Pull lines back from the following pages while `id` has room.
    pub fn check_reflow(&mut self, id: PageId) -> Result<ReflowReport, LayoutError> {
        let idx = self.position(id)?;
        let threshold = self.config.reflow_threshold_px();
        let limit = self.config.reflow_limit_px();
        let mut report = ReflowReport::default();

        while idx + 1 < self.slots.len() {
            let source = &mut self.slots[idx].store;
            source.settle();
            if source.content_height() >= threshold {
                break;
            }

            let next = &mut self.slots[idx + 1].store;
            if next.is_blank() {
                self.remove_at(idx + 1);
                report.pages_removed += 1;
                continue;
            }
            next.settle();
            let Some(first) = next.line_boxes().first().copied() else {
                break;
            };
            let line = next.contents_range(first.start, first.length);

            let source = &mut self.slots[idx].store;
            let original_len = source.len();
            let was_blank = source.is_blank();
            if was_blank {
                source.set_contents(line.clone(), Source::Silent);
            } else {
                source.update_contents(&Delta::new().retain(original_len).concat(&line), Source::Silent);
            }
            source.settle();

            if source.content_height() > limit {
                if was_blank {
                    source.set_contents(Delta::terminator(), Source::Silent);
                } else {
                    source.delete_range(original_len, line.len(), Source::Silent);
                }
                source.settle();
                break;
            }

            let next = &mut self.slots[idx + 1].store;
            next.delete_range(first.start, first.length, Source::Silent);
            next.settle();
            report.lines_pulled += 1;
            if next.is_blank() {
                self.remove_at(idx + 1);
                report.pages_removed += 1;
            }
        }
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn position(&self, id: PageId) -> Result<usize, LayoutError> {
        self.page_index(id).ok_or(LayoutError::PageNotFound(id))
    }

    fn reindex(&mut self) {
        self.positions = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
    }

    fn materialize(&mut self, page: &Page) -> F::Store {
        let mut store = self.factory.create(&page.id);
        store.set_contents(prepare_content(&self.config, &page.content), Source::Silent);
        store.settle();
        store
    }

    fn insert_slot(&mut self, idx: usize, page: Page) {
        let store = self.materialize(&page);
        self.slots.insert(idx, PageSlot { id: page.id, store });
        self.reindex();
    }

    /// Focus the page at `idx`, blurring whichever page held focus.
    /// A page gaining focus without a cursor gets it at its end.
    fn focus_at(&mut self, idx: usize) {
        for slot in &mut self.slots {
            if slot.store.has_focus() {
                slot.store.blur();
            }
        }
        let slot = &mut self.slots[idx];
        let had_cursor = slot.store.cursor().is_some();
        slot.store.focus();
        if !had_cursor {
            let end = slot.store.len().saturating_sub(1);
            slot.store.set_cursor(end);
        }
        self.active = Some(slot.id);
    }

    /// Remove the page at `idx`, keeping at least one page. Focus moves to
    /// the preceding page (or the first) with the cursor at its end.
    fn remove_at(&mut self, idx: usize) -> bool {
        if self.slots.len() <= 1 {
            return false;
        }
        let slot = self.slots.remove(idx);
        self.scheduler.forget(slot.id);
        self.reindex();
        if self.active == Some(slot.id) || slot.store.has_focus() {
            let target = idx.saturating_sub(1);
            self.focus_at(target);
            let store = &mut self.slots[target].store;
            let end = store.len().saturating_sub(1);
            store.set_cursor(end);
            store.scroll_into_view();
        }
        log::debug!("removed page {} at position {idx}", slot.id);
        true
    }

    /// Replace all pages with the split of `flat`, reusing slots in order.
    fn resplit(&mut self, flat: &Delta, now: Instant) -> Vec<PageId> {
        let contents = serializer::split(flat);
        let mut touched = Vec::new();
        for (i, content) in contents.iter().enumerate() {
            let content = prepare_content(&self.config, content);
            if i < self.slots.len() {
                let store = &mut self.slots[i].store;
                if store.contents() != content {
                    store.set_contents(content, Source::Silent);
                    store.settle();
                    touched.push(self.slots[i].id);
                }
            } else {
                let page = Page::new(content);
                touched.push(page.id);
                self.insert_slot(i, page);
            }
        }
        while self.slots.len() > contents.len() {
            let last = self.slots.len() - 1;
            self.remove_at(last);
        }
        for id in &touched {
            self.scheduler.request(
                *id,
                ChangeSummary { inserts: true, deletes: true, formats: false },
                now,
            );
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::PageGeometry;
    use serde_json::json;
    use std::time::Duration;

    /// 400px wide (50 chars per line), 504px tall (21 lines of 24px).
    fn config() -> EditorRuntimeConfig {
        EditorRuntimeConfig {
            page: PageGeometry::content_box(400.0, 504.0),
            ..EditorRuntimeConfig::default()
        }
    }

    fn engine_with(texts: &[&str]) -> PaginationEngine<MeasuredFactory> {
        let mut engine = PaginationEngine::measured(config());
        engine.load_pages(texts.iter().map(|t| Page::new(Delta::new().insert(*t))).collect());
        engine
    }

    /// `n` visual lines of 50 characters in one paragraph.
    fn lines(n: usize) -> String {
        "abcdefghi ".repeat(5 * n)
    }

    fn non_newline_chars(engine: &PaginationEngine<MeasuredFactory>) -> usize {
        engine.pages().iter().map(|p| p.content.visible_len()).sum()
    }

    #[test]
    fn test_new_engine_has_one_blank_page() {
        let engine = PaginationEngine::measured(config());
        assert_eq!(engine.page_count(), 1);
        assert_eq!(engine.pages()[0].content, Delta::terminator());
        assert_eq!(engine.active_page(), Some(engine.page_ids()[0]));
    }

    #[test]
    fn test_find_split_backs_off_to_whitespace() {
        let boxes = [LineBox { start: 0, length: 21, top: 0.0, height: 48.0, line_height: 24.0 }];
        let chars: Vec<char> = "aaaa bbbb cccccccccc\n".chars().collect();
        // half the block fits: estimate 10, boundary after "bbbb "
        assert_eq!(find_split(&boxes, &chars, 24.0), Some(10));
    }

    #[test]
    fn test_find_split_keeps_nothing_below_one_line() {
        let boxes = [
            LineBox { start: 0, length: 4, top: 0.0, height: 24.0, line_height: 24.0 },
            LineBox { start: 4, length: 4, top: 24.0, height: 24.0, line_height: 24.0 },
        ];
        let chars: Vec<char> = "abc\ndef\n".chars().collect();
        assert_eq!(find_split(&boxes, &chars, 40.0), Some(4));
    }

    #[test]
    fn test_find_split_mid_word_as_last_resort() {
        let boxes = [LineBox { start: 0, length: 9, top: 0.0, height: 48.0, line_height: 24.0 }];
        let chars: Vec<char> = "abcdefgh\n".chars().collect();
        assert_eq!(find_split(&boxes, &chars, 24.0), Some(4));
    }

    #[test]
    fn test_fitting_page_is_untouched() {
        let mut engine = engine_with(&[&lines(10)]);
        let before = engine.pages();
        let report = engine.check_overflow(engine.page_ids()[0]).unwrap();
        assert_eq!(report, OverflowReport::default());
        assert_eq!(engine.pages(), before);
    }

    #[test]
    fn test_overflow_creates_page_and_conserves_text() {
        let mut engine = engine_with(&[&lines(30)]);
        let before = non_newline_chars(&engine);
        let report = engine.check_overflow(engine.page_ids()[0]).unwrap();
        assert_eq!(report.pages_created, 1);
        assert_eq!(engine.page_count(), 2);
        assert_eq!(non_newline_chars(&engine), before);
        for id in engine.page_ids() {
            assert!(engine.store(id).unwrap().content_height() <= 504.0);
        }
    }

    #[test]
    fn test_overflow_cascades_along_the_chain() {
        let mut engine = engine_with(&[&lines(15), &lines(20)]);
        let first = engine.page_ids()[0];
        engine
            .edit_page(first, &Delta::new().insert(lines(10)), Source::User, Instant::now())
            .unwrap();
        let report = engine.check_overflow(first).unwrap();
        assert!(report.moves >= 2);
        assert_eq!(engine.page_count(), 3);
        for id in engine.page_ids() {
            assert!(engine.store(id).unwrap().content_height() <= 504.0);
        }
    }

    #[test]
    fn test_overflow_prepends_to_next_page() {
        let mut engine = engine_with(&[&lines(22), "tail"]);
        engine.check_overflow(engine.page_ids()[0]).unwrap();
        let second = engine.pages()[1].text();
        assert!(second.ends_with("\ntail"));
        assert!(second.starts_with("abcdefghi"));
    }

    #[test]
    fn test_engine_moves_are_not_user_changes() {
        let mut engine = engine_with(&[&lines(30)]);
        engine.check_overflow(engine.page_ids()[0]).unwrap();
        assert!(engine.take_user_changes().is_empty());
    }

    #[test]
    fn test_cursor_follows_moved_text() {
        let mut engine = engine_with(&[&lines(22)]);
        let first = engine.page_ids()[0];
        let end = engine.store(first).unwrap().len() - 1;
        engine.slots[0].store.set_cursor(end);
        engine.check_overflow(first).unwrap();
        let second = engine.page_ids()[1];
        assert_eq!(engine.active_page(), Some(second));
        let store = engine.store(second).unwrap();
        assert!(store.has_focus());
        assert_eq!(store.cursor(), Some(store.len() - 1));
        assert!(!engine.store(first).unwrap().has_focus());
    }

    #[test]
    fn test_cursor_on_next_page_stays_with_its_text() {
        let mut engine = engine_with(&[&lines(22), "tail"]);
        let second = engine.page_ids()[1];
        engine.slots[1].store.set_cursor(0);
        engine.check_overflow(engine.page_ids()[0]).unwrap();

        let text = engine.pages()[1].text();
        let tail_at = text.chars().count() - "tail".len();
        assert_eq!(engine.store(second).unwrap().cursor(), Some(tail_at));
    }

    #[test]
    fn test_undo_never_reverts_engine_moves() {
        let t0 = Instant::now();
        let mut engine = engine_with(&[&lines(15)]);
        let first = engine.page_ids()[0];
        engine
            .edit_page(first, &Delta::new().insert(lines(10)), Source::User, t0)
            .unwrap();
        engine.check_overflow(first).unwrap();
        assert_eq!(engine.page_count(), 2);
        let moved = engine.pages()[1].clone();

        assert!(engine.undo_page(first, t0).unwrap());
        let pages = engine.pages();
        assert_eq!(pages[1], moved, "the moved text stays where the engine put it");
        assert_eq!(format!("{}{}", pages[0].text(), pages[1].text()), lines(15));
        // the load and the move were silent: nothing older to undo
        assert!(!engine.undo_page(first, t0).unwrap());

        let changes = engine.take_user_changes();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|(id, _)| *id == first));
        assert_eq!(changes[1].1, Delta::new().delete(lines(10).len()));
    }

    #[test]
    fn test_redo_reapplies_undone_step() {
        let t0 = Instant::now();
        let mut engine = engine_with(&["hello"]);
        let page = engine.page_ids()[0];
        engine
            .edit_page(page, &Delta::new().retain(5).insert(" world"), Source::User, t0)
            .unwrap();
        assert!(engine.undo_page(page, t0).unwrap());
        assert_eq!(engine.plain_text(), "hello");
        assert!(engine.redo_page(page, t0).unwrap());
        assert_eq!(engine.plain_text(), "hello world");
        assert!(!engine.redo_page(page, t0).unwrap());
    }

    #[test]
    fn test_cursor_above_split_keeps_focus() {
        let mut engine = engine_with(&[&lines(22)]);
        let first = engine.page_ids()[0];
        engine.slots[0].store.set_cursor(3);
        engine.check_overflow(first).unwrap();
        assert_eq!(engine.active_page(), Some(first));
        assert_eq!(engine.store(first).unwrap().cursor(), Some(3));
    }

    #[test]
    fn test_unsplittable_line_aborts() {
        let mut image = serde_json::Map::new();
        image.insert("image".into(), json!("tall.png"));
        let mut cfg = config();
        cfg.metrics.embed_height_px = 900.0;
        let mut engine = PaginationEngine::measured(cfg);
        engine.load_pages(vec![Page::new(
            Delta::new().insert_embed(image, Default::default()).insert("\n"),
        )]);
        let report = engine.check_overflow(engine.page_ids()[0]).unwrap();
        assert!(report.aborted);
        assert_eq!(report.moves, 0);
        assert_eq!(engine.page_count(), 1);
    }

    #[test]
    fn test_reflow_pulls_lines_and_removes_empty_page() {
        let mut engine = engine_with(&[&lines(2), "one\ntwo"]);
        let first = engine.page_ids()[0];
        let report = engine.check_reflow(first).unwrap();
        assert_eq!(report.lines_pulled, 2);
        assert_eq!(report.pages_removed, 1);
        assert_eq!(engine.page_count(), 1);
        assert!(engine.plain_text().ends_with("\none\ntwo"));
    }

    #[test]
    fn test_reflow_stops_when_line_does_not_fit() {
        let mut engine = engine_with(&[&lines(14), &lines(10)]);
        let first = engine.page_ids()[0];
        let before = engine.pages();
        let report = engine.check_reflow(first).unwrap();
        assert_eq!(report, ReflowReport::default());
        assert_eq!(engine.pages(), before);
    }

    #[test]
    fn test_reflow_removes_blank_follower() {
        let mut engine = engine_with(&["short", ""]);
        let report = engine.check_reflow(engine.page_ids()[0]).unwrap();
        assert_eq!(report.pages_removed, 1);
        assert_eq!(engine.page_count(), 1);
    }

    #[test]
    fn test_remove_page_refocuses_previous() {
        let mut engine = engine_with(&["a", "b", "c"]);
        let ids = engine.page_ids();
        engine.set_active_page(ids[1]).unwrap();
        engine.remove_page(ids[1]).unwrap();
        assert_eq!(engine.active_page(), Some(ids[0]));
        let store = engine.store(ids[0]).unwrap();
        assert_eq!(store.cursor(), Some(1));
        assert!(store.has_focus());
    }

    #[test]
    fn test_last_page_cannot_be_removed() {
        let mut engine = engine_with(&["a", "b"]);
        let ids = engine.page_ids();
        engine.remove_page(ids[0]).unwrap();
        assert_eq!(engine.remove_page(ids[1]), Err(LayoutError::LastPage));
        assert_eq!(engine.page_count(), 1);
        assert_eq!(engine.active_page(), Some(ids[1]));
    }

    #[test]
    fn test_tick_runs_checks_after_debounce() {
        let t0 = Instant::now();
        let mut engine = engine_with(&[&lines(20)]);
        let first = engine.page_ids()[0];
        engine
            .edit_page(first, &Delta::new().insert(lines(5)), Source::User, t0)
            .unwrap();
        assert!(!engine.tick(t0 + Duration::from_millis(299)).changed());
        assert_eq!(engine.page_count(), 1);
        let report = engine.tick(t0 + Duration::from_millis(300));
        assert_eq!(report.overflow.pages_created, 1);
        assert_eq!(engine.page_count(), 2);
    }

    #[test]
    fn test_flat_change_routes_to_owning_page() {
        let mut engine = engine_with(&["abc", "def"]);
        let ids = engine.page_ids();
        // "abc\n" pb "def\n": offset 6 is after "d"
        let touched = engine.apply_flat_change(&Delta::new().retain(6).insert("X"), Instant::now());
        assert_eq!(touched, vec![ids[1]]);
        assert_eq!(engine.pages()[1].text(), "dXef");
        assert!(engine.take_user_changes().is_empty());
    }

    #[test]
    fn test_flat_change_across_break_resplits() {
        let mut engine = engine_with(&["abc", "def"]);
        let first = engine.page_ids()[0];
        engine.apply_flat_change(&Delta::new().retain(3).delete(2), Instant::now());
        assert_eq!(engine.page_count(), 1);
        assert_eq!(engine.page_ids(), vec![first]);
        assert_eq!(engine.plain_text(), "abcdef");
    }

    #[test]
    fn test_flat_change_past_end_is_refused() {
        let mut engine = engine_with(&["abc", "def"]);
        let before = engine.pages();
        let now = Instant::now();

        assert!(engine.apply_flat_change(&Delta::new().retain(6).delete(10), now).is_empty());
        assert_eq!(engine.pages(), before);

        let bold = folio_core::attributes::from_pairs([("bold", json!(true))]);
        assert!(engine.apply_flat_change(&Delta::new().retain(5).retain_with(10, bold), now).is_empty());
        assert_eq!(engine.pages(), before);

        // crossing a break on the way past the end is refused too
        assert!(engine.apply_flat_change(&Delta::new().retain(3).delete(20), now).is_empty());
        assert_eq!(engine.pages(), before);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_lift_change_uses_page_start() {
        let engine = engine_with(&["abc", "def"]);
        let second = engine.page_ids()[1];
        let flat = engine.lift_change(second, &Delta::new().retain(1).insert("Z")).unwrap();
        assert_eq!(flat, Delta::new().retain(6).insert("Z"));
    }

    #[test]
    fn test_invalid_page_content_loads_blank() {
        let mut engine = PaginationEngine::measured(config());
        engine.load_pages(vec![
            Page::new(Delta::new().insert("fine")),
            Page::new(Delta { ops: vec![Op::retain(4)] }),
        ]);
        assert_eq!(engine.page_count(), 2);
        assert_eq!(engine.pages()[1].content, Delta::terminator());
    }
}
