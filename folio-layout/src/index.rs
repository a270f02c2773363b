//! Flat-offset ⇄ page-offset mapping.
//!
//! The flat document is the pages joined with one page-break marker
//! between neighbours, so each marker occupies exactly one position:
//!
//! ```text
//!  flat    0 1 2 3 │4│ 5 6 │7│ 8 9
//!          ─page 0─ pb ─p1─ pb ─p2─
//! ```
//!
//! Remote changes are expressed against the flat form; [`PageIndex::route`]
//! splits them into per-page changes. Local page changes go the other way
//! through [`PageIndex::lift`].

use std::collections::BTreeMap;

use folio_core::{serializer, Delta, Op, PageId};

use crate::error::LayoutError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSpan {
    pub page: PageId,
    /// Flat offset of the page's first position.
    pub start: usize,
    pub len: usize,
}

impl PageSpan {
    /// Flat offset just past the page (the following marker, if any).
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Clone, Debug, Default)]
pub struct PageIndex {
    spans: Vec<PageSpan>,
}

/// A per-page change under construction. `cursor` is the pre-change
/// in-page offset the delta has consumed so far.
#[derive(Default)]
struct PageEdit {
    delta: Delta,
    cursor: usize,
}

impl PageEdit {
    fn push_at(&mut self, offset: usize, op: Op) {
        if offset > self.cursor {
            self.delta.push(Op::retain(offset - self.cursor));
            self.cursor = offset;
        }
        if !matches!(op, Op::Insert { .. }) {
            self.cursor += op.len();
        }
        self.delta.push(op);
    }
}

impl PageIndex {
    pub fn build(pages: impl IntoIterator<Item = (PageId, usize)>) -> Self {
        let mut spans = Vec::new();
        let mut start = 0;
        for (page, len) in pages {
            spans.push(PageSpan { page, start, len });
            start += len + 1;
        }
        Self { spans }
    }

    pub fn spans(&self) -> &[PageSpan] {
        &self.spans
    }

    /// Length of the flat document, markers included.
    pub fn total_len(&self) -> usize {
        self.spans.last().map_or(0, PageSpan::end)
    }

    pub fn span_of(&self, page: PageId) -> Option<&PageSpan> {
        self.spans.iter().find(|s| s.page == page)
    }

    /// Page and in-page offset of a flat offset. A marker position maps to
    /// the end of the page before it.
    pub fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        let idx = self.spans.partition_point(|s| s.end() < offset);
        let span = self.spans.get(idx)?;
        Some((idx, offset - span.start))
    }

    /// Re-express a change to `page` against the flat document.
    pub fn lift(&self, page: PageId, change: &Delta) -> Option<Delta> {
        let span = self.span_of(page)?;
        Some(Delta::new().retain(span.start).concat(change).chop())
    }

    /// Split a flat change into per-page changes, in page order.
    ///
    /// Formatting that spans pages is applied to each page separately and
    /// leaves the markers alone. Inserting or deleting a marker changes the
    /// page structure and is refused with [`LayoutError::CrossesPageBreak`].
    pub fn route(&self, change: &Delta) -> Result<Vec<(PageId, Delta)>, LayoutError> {
        let total = self.total_len();
        let mut edits: BTreeMap<usize, PageEdit> = BTreeMap::new();
        let mut pos = 0;

        for op in &change.ops {
            match op {
                Op::Insert { .. } => {
                    if serializer::is_page_break(op) {
                        return Err(LayoutError::CrossesPageBreak(pos));
                    }
                    let (idx, offset) = self
                        .locate(pos)
                        .ok_or(LayoutError::OutOfRange { offset: pos, len: 0 })?;
                    if offset == self.spans[idx].len && idx + 1 < self.spans.len() {
                        return Err(LayoutError::CrossesPageBreak(pos));
                    }
                    edits.entry(idx).or_default().push_at(offset, op.clone());
                }
                Op::Retain { retain, attributes } => {
                    let end = pos + retain;
                    if end > total {
                        return Err(LayoutError::OutOfRange { offset: pos, len: *retain });
                    }
                    if !attributes.is_empty() {
                        for (idx, span) in self.spans.iter().enumerate() {
                            let from = pos.max(span.start);
                            let to = end.min(span.end());
                            if from < to {
                                edits.entry(idx).or_default().push_at(
                                    from - span.start,
                                    Op::Retain { retain: to - from, attributes: attributes.clone() },
                                );
                            }
                        }
                    }
                    pos = end;
                }
                Op::Delete { delete } => {
                    let end = pos + delete;
                    if end > total {
                        return Err(LayoutError::OutOfRange { offset: pos, len: *delete });
                    }
                    let (idx, offset) = self
                        .locate(pos)
                        .ok_or(LayoutError::OutOfRange { offset: pos, len: *delete })?;
                    if end > self.spans[idx].end() {
                        return Err(LayoutError::CrossesPageBreak(pos));
                    }
                    edits.entry(idx).or_default().push_at(offset, Op::delete(*delete));
                    pos = end;
                }
            }
        }

        Ok(edits
            .into_iter()
            .map(|(idx, edit)| (self.spans[idx].page, edit.delta.chop()))
            .filter(|(_, delta)| !delta.is_empty())
            .collect())
    }
}
