//! Deterministic in-memory page store.
//!
//! Text is laid out with fixed advance widths derived from [`TextMetrics`]:
//! each character is `font_size × char_width_ratio` wide and each visual
//! line is as tall as its tallest run (`font_size × line_height_ratio`).
//! Paragraphs are word-wrapped greedily against the content width.
//!
//! # Wrapping rules
//!
//! * Spaces hang at the end of a line and never force a wrap.
//! * A word wider than the whole line is broken between characters.
//! * An embed occupies a visual line of its own, `embed_height_px` tall.
//!
//! [`TextMetrics`]: folio_core::TextMetrics

use std::sync::Arc;
use std::time::Instant;

use folio_core::delta::{Insert, Line};
use folio_core::{Delta, EditorRuntimeConfig, Op, PageId};

use crate::history::History;
use crate::store::{terminated, LineBox, PageContentStore, Source, StoreFactory};

// ───────────────────────────────────────────────────────────────────
// Glyph measurement
// ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
enum Glyph {
    Space { width: f32, line_height: f32 },
    Char { width: f32, line_height: f32 },
    Embed,
}

/// Visual line heights of one paragraph.
fn wrap_block(config: &EditorRuntimeConfig, width_px: f32, line: &Line) -> Vec<f32> {
    let metrics = &config.metrics;
    let mut glyphs = Vec::new();
    for op in &line.content.ops {
        let Op::Insert { insert, attributes } = op else { continue };
        match insert {
            Insert::Text(text) => {
                let size = config.font_size_px(attributes);
                let width = size * metrics.char_width_ratio;
                let line_height = size * metrics.line_height_ratio;
                glyphs.extend(text.chars().map(|c| {
                    if c.is_whitespace() {
                        Glyph::Space { width, line_height }
                    } else {
                        Glyph::Char { width, line_height }
                    }
                }));
            }
            Insert::Embed(_) => glyphs.push(Glyph::Embed),
        }
    }

    let mut lines = Vec::new();
    let mut cur_w = 0.0f32;
    let mut cur_h = 0.0f32;
    let mut i = 0;
    while i < glyphs.len() {
        match glyphs[i] {
            Glyph::Embed => {
                if cur_w > 0.0 {
                    lines.push(cur_h);
                }
                lines.push(metrics.embed_height_px);
                cur_w = 0.0;
                cur_h = 0.0;
                i += 1;
            }
            Glyph::Space { width, line_height } => {
                cur_w += width;
                cur_h = cur_h.max(line_height);
                i += 1;
            }
            Glyph::Char { .. } => {
                let mut j = i;
                let mut word_w = 0.0;
                let mut word_h = 0.0f32;
                while let Some(Glyph::Char { width, line_height }) = glyphs.get(j) {
                    word_w += width;
                    word_h = word_h.max(*line_height);
                    j += 1;
                }
                if cur_w > 0.0 && cur_w + word_w > width_px {
                    lines.push(cur_h);
                    cur_w = 0.0;
                    cur_h = 0.0;
                }
                if word_w > width_px {
                    for glyph in &glyphs[i..j] {
                        if let Glyph::Char { width, line_height } = *glyph {
                            if cur_w > 0.0 && cur_w + width > width_px {
                                lines.push(cur_h);
                                cur_w = 0.0;
                                cur_h = 0.0;
                            }
                            cur_w += width;
                            cur_h = cur_h.max(line_height);
                        }
                    }
                } else {
                    cur_w += word_w;
                    cur_h = cur_h.max(word_h);
                }
                i = j;
            }
        }
    }
    if cur_w > 0.0 {
        lines.push(cur_h);
    }
    if lines.is_empty() {
        // Empty paragraph: one line as tall as its newline's font.
        let size = config.font_size_px(&line.attributes);
        lines.push(size * metrics.line_height_ratio);
    }
    lines
}

/// Block-level boxes for a whole buffer.
pub fn measure(config: &EditorRuntimeConfig, width_px: f32, content: &Delta) -> Vec<LineBox> {
    let mut top = 0.0;
    content
        .lines()
        .iter()
        .map(|line| {
            let visual = wrap_block(config, width_px, line);
            let height: f32 = visual.iter().sum();
            let b = LineBox {
                start: line.start,
                length: line.len,
                top,
                height,
                line_height: height / visual.len() as f32,
            };
            top += height;
            b
        })
        .collect()
}

// ───────────────────────────────────────────────────────────────────
// MeasuredBuffer
// ───────────────────────────────────────────────────────────────────

/// A [`PageContentStore`] backed by a Delta and the fixed-width measure.
#[derive(Debug, Clone)]
pub struct MeasuredBuffer {
    config: Arc<EditorRuntimeConfig>,
    content: Delta,
    layout: Option<Vec<LineBox>>,
    focused: bool,
    cursor: Option<usize>,
    changes: Vec<Delta>,
    history: History,
    clock: Option<Instant>,
    scroll_requests: usize,
}

impl MeasuredBuffer {
    pub fn new(config: Arc<EditorRuntimeConfig>) -> Self {
        let history = History::new(&config.history);
        Self {
            config,
            content: Delta::terminator(),
            layout: None,
            focused: false,
            cursor: None,
            changes: Vec::new(),
            history,
            clock: None,
            scroll_requests: 0,
        }
    }

    pub fn with_content(config: Arc<EditorRuntimeConfig>, content: Delta) -> Self {
        let mut buffer = Self::new(config);
        buffer.set_contents(content, Source::Silent);
        buffer.settle();
        buffer
    }

    /// Whether geometry has been recomputed since the last mutation.
    pub fn is_settled(&self) -> bool {
        self.layout.is_some()
    }

    pub fn scroll_requests(&self) -> usize {
        self.scroll_requests
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    fn width_px(&self) -> f32 {
        self.config.page.content_width_px()
    }

    /// Apply `change` and keep the undo history in step: user changes are
    /// recorded, silent ones rebase what is already recorded.
    fn apply(&mut self, change: Delta, source: Source) {
        match source {
            Source::User => {
                let before = self.content.clone();
                let effective = self.commit(change, source);
                self.history.record(&effective, &before, self.clock);
            }
            Source::Silent => {
                let effective = self.commit(change, source);
                self.history.transform(&effective);
            }
        }
    }

    /// Apply `change`, re-terminate, track the cursor and record the
    /// effective change for user edits. Returns the effective change.
    fn commit(&mut self, change: Delta, source: Source) -> Delta {
        let composed = self.content.compose(&change);
        let mut effective = change;
        if !composed.ends_with_newline() {
            let len = composed.len();
            effective = effective.compose(&Delta::new().retain(len).insert("\n"));
        }
        self.content = terminated(composed);
        if let Some(cursor) = self.cursor {
            // A silent insert exactly at the cursor stays behind it, as a
            // remote insert should. Engine moves re-place the cursor.
            let moved = effective.transform_position(cursor, source != Source::User);
            self.cursor = Some(moved.min(self.content.len().saturating_sub(1)));
        }
        if source == Source::User && !effective.is_empty() {
            self.changes.push(effective.clone());
        }
        self.layout = None;
        effective
    }
}

impl PageContentStore for MeasuredBuffer {
    fn len(&self) -> usize {
        self.content.len()
    }

    fn contents(&self) -> Delta {
        self.content.clone()
    }

    fn delete_range(&mut self, offset: usize, length: usize, source: Source) {
        let len = self.len();
        let offset = offset.min(len);
        let length = length.min(len - offset);
        if length == 0 {
            return;
        }
        self.apply(Delta::new().retain(offset).delete(length), source);
    }

    fn set_contents(&mut self, content: Delta, source: Source) {
        let old_len = self.len();
        let change = Delta::from_ops(content.ops).delete(old_len);
        self.apply(change, source);
    }

    fn update_contents(&mut self, change: &Delta, source: Source) {
        self.apply(change.clone(), source);
    }

    fn settle(&mut self) {
        if self.layout.is_none() {
            self.layout = Some(measure(&self.config, self.width_px(), &self.content));
        }
    }

    fn line_boxes(&self) -> Vec<LineBox> {
        match &self.layout {
            Some(layout) => layout.clone(),
            None => measure(&self.config, self.width_px(), &self.content),
        }
    }

    fn focus(&mut self) {
        self.focused = true;
        if self.cursor.is_none() {
            self.cursor = Some(0);
        }
    }

    fn blur(&mut self) {
        self.focused = false;
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn set_cursor(&mut self, offset: usize) {
        self.cursor = Some(offset.min(self.len().saturating_sub(1)));
    }

    fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    fn scroll_into_view(&mut self) {
        self.scroll_requests += 1;
    }

    fn take_changes(&mut self) -> Vec<Delta> {
        std::mem::take(&mut self.changes)
    }

    fn mark_time(&mut self, now: Instant) {
        self.clock = Some(now);
    }

    fn undo(&mut self) -> Option<Delta> {
        let step = self.history.pop_undo()?;
        let before = self.content.clone();
        let applied = self.commit(step, Source::User);
        self.history.push_redo(applied.invert(&before));
        Some(applied)
    }

    fn redo(&mut self) -> Option<Delta> {
        let step = self.history.pop_redo()?;
        let before = self.content.clone();
        let applied = self.commit(step, Source::User);
        self.history.push_undo(applied.invert(&before));
        Some(applied)
    }
}

/// Builds [`MeasuredBuffer`]s sharing one runtime config.
#[derive(Debug, Clone)]
pub struct MeasuredFactory {
    config: Arc<EditorRuntimeConfig>,
}

impl MeasuredFactory {
    pub fn new(config: EditorRuntimeConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EditorRuntimeConfig {
        &self.config
    }
}

impl StoreFactory for MeasuredFactory {
    type Store = MeasuredBuffer;

    fn create(&mut self, page: &PageId) -> MeasuredBuffer {
        log::debug!("materializing store for page {page}");
        MeasuredBuffer::new(Arc::clone(&self.config))
    }
}
