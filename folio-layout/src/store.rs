//! The per-page buffer contract the pagination engine drives.
//!
//! A store is one independently editable rich-text buffer. Its content
//! always ends with a newline, so an empty buffer has length 1. Every
//! mutation carries a [`Source`]: `User` mutations are recorded for
//! dirty-tracking and broadcast, `Silent` ones are engine bookkeeping and
//! leave no trace.

use std::time::Instant;

use folio_core::{Delta, EditorRuntimeConfig, Op, PageId};

/// Who a mutation belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    User,
    Silent,
}

/// Rendered geometry of one block (paragraph) of a buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineBox {
    /// Offset of the block's first position.
    pub start: usize,
    /// Positions in the block, including its newline.
    pub length: usize,
    pub top: f32,
    pub height: f32,
    /// Height of one visual line inside the block.
    pub line_height: f32,
}

impl LineBox {
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

pub trait PageContentStore {
    /// Addressable positions, including the final newline.
    fn len(&self) -> usize;

    /// Only the terminator is left.
    fn is_blank(&self) -> bool {
        self.len() <= 1
    }

    fn contents(&self) -> Delta;

    fn contents_range(&self, offset: usize, length: usize) -> Delta {
        self.contents().slice(offset, offset.saturating_add(length))
    }

    fn delete_range(&mut self, offset: usize, length: usize, source: Source);

    fn set_contents(&mut self, content: Delta, source: Source);

    fn update_contents(&mut self, change: &Delta, source: Source);

    /// Let pending geometry settle after a mutation. Line boxes read after
    /// this call reflect the current content.
    fn settle(&mut self);

    /// Block-level geometry, top to bottom.
    fn line_boxes(&self) -> Vec<LineBox>;

    fn content_height(&self) -> f32 {
        self.line_boxes().last().map_or(0.0, LineBox::bottom)
    }

    fn focus(&mut self);
    fn blur(&mut self);
    fn has_focus(&self) -> bool;
    fn set_cursor(&mut self, offset: usize);
    fn cursor(&self) -> Option<usize>;

    fn scroll_into_view(&mut self) {}

    /// User-sourced changes since the last call, oldest first.
    fn take_changes(&mut self) -> Vec<Delta>;

    /// Time of the user mutations that follow; groups them into undo steps.
    fn mark_time(&mut self, _now: Instant) {}

    /// Revert the last undo step as a user change and return the change
    /// applied. Silent mutations are never part of a step.
    fn undo(&mut self) -> Option<Delta> {
        None
    }

    fn redo(&mut self) -> Option<Delta> {
        None
    }
}

/// Creates the store backing a page when it is first materialized.
pub trait StoreFactory {
    type Store: PageContentStore;

    fn create(&mut self, page: &PageId) -> Self::Store;
}

/// Content a page may start with: validated against the runtime config
/// and newline-terminated. Invalid content becomes a blank page.
pub fn prepare_content(config: &EditorRuntimeConfig, content: &Delta) -> Delta {
    if let Err(e) = config.validate_content(content) {
        log::warn!("invalid page content ({e}); starting the page blank");
        return Delta::terminator();
    }
    terminated(content.clone())
}

/// Append a newline unless `content` already ends with one.
pub fn terminated(mut content: Delta) -> Delta {
    if !content.ends_with_newline() {
        content.push(Op::text("\n"));
    }
    content
}
