//! Flat <-> paged document conversion.
//!
//! ```text
//!  pages   [ "A\n" ] [ "B\n" ] [ "C\n" ]
//!            │         │         │
//!  flat    "A\n" ⏎pb "B\n" ⏎pb "C\n"        ⏎pb = {insert:"\n", explicitPageBreak:true}
//! ```
//!
//! Markers exist only in the flat form; they never appear inside a page.

use serde_json::Value;

use crate::attributes;
use crate::delta::{Delta, Op};
use crate::document::Page;

pub const PAGE_BREAK_ATTRIBUTE: &str = "explicitPageBreak";

/// The synthetic operation placed between pages.
pub fn page_break_marker() -> Op {
    Op::text_with("\n", attributes::from_pairs([(PAGE_BREAK_ATTRIBUTE, Value::Bool(true))]))
}

/// Number of page-break markers `op` stands for.
///
/// Adjacent markers merge when pushed, so a run of `n` newlines carrying
/// the flag counts as `n` breaks.
pub fn page_breaks_in(op: &Op) -> usize {
    match op {
        Op::Insert { attributes, .. } if attributes::is_set(attributes, PAGE_BREAK_ATTRIBUTE) => {
            match op.insert_text() {
                Some(text) if !text.is_empty() && text.chars().all(|c| c == '\n') => {
                    text.chars().count()
                }
                _ => 0,
            }
        }
        _ => 0,
    }
}

pub fn is_page_break(op: &Op) -> bool {
    page_breaks_in(op) > 0
}

/// Join pages into one flat delta with a marker between consecutive pages.
pub fn serialize(pages: &[Page]) -> Delta {
    let mut flat = Delta::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            flat.push(page_break_marker());
        }
        if page.content.is_empty() {
            flat.push(Op::text("\n"));
        } else {
            for op in &page.content.ops {
                flat.push(op.clone());
            }
        }
    }
    flat
}

/// Split a flat delta back into page contents at page-break markers.
///
/// An empty segment becomes a single terminator. Always yields at least one
/// page.
pub fn split(flat: &Delta) -> Vec<Delta> {
    let mut pages = Vec::new();
    let mut current = Delta::new();
    for op in &flat.ops {
        let breaks = page_breaks_in(op);
        if breaks == 0 {
            current.push(op.clone());
            continue;
        }
        for _ in 0..breaks {
            pages.push(close(std::mem::take(&mut current)));
        }
    }
    pages.push(close(current));
    pages
}

/// [`split`] into fresh pages.
pub fn deserialize(flat: &Delta) -> Vec<Page> {
    split(flat).into_iter().map(Page::new).collect()
}

fn close(segment: Delta) -> Delta {
    if segment.is_empty() {
        Delta::terminator()
    } else {
        segment
    }
}
