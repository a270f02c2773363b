//! Rich-text operation log ("Delta").
//!
//! A document is an ordered list of insert operations, each optionally
//! carrying [`Attributes`]. A *change* additionally uses retain and delete
//! operations to describe an edit against a document. Deltas are values:
//! every transformation returns a new `Delta`.
//!
//! ```text
//!  document  [ insert "Hello " {bold}, insert "world\n" ]
//!  change    [ retain 6, delete 5, insert "there" ]
//!  compose   [ insert "Hello " {bold}, insert "there\n" ]
//! ```
//!
//! Lengths are counted in Unicode scalar values; an embed counts as one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attributes::{self, Attributes};
use crate::error::DeltaError;

/// Placeholder used where an embed occupies a text position.
pub const OBJECT_REPLACEMENT: char = '\u{FFFC}';

/// Embedded object, e.g. `{"image": "https://..."}`. The first key names
/// the embed type.
pub type EmbedRef = Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Insert {
    Text(String),
    Embed(EmbedRef),
}

impl Insert {
    pub fn len(&self) -> usize {
        match self {
            Insert::Text(s) => s.chars().count(),
            Insert::Embed(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Insert::Text(s) if s.is_empty())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Insert::Text(s) => Some(s),
            Insert::Embed(_) => None,
        }
    }

    pub fn embed_kind(&self) -> Option<&str> {
        match self {
            Insert::Embed(map) => map.keys().next().map(String::as_str),
            Insert::Text(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Retain,
    Delete,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Insert => "insert",
            OpKind::Retain => "retain",
            OpKind::Delete => "delete",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Op {
    Insert {
        insert: Insert,
        #[serde(default, skip_serializing_if = "attributes::is_empty")]
        attributes: Attributes,
    },
    Retain {
        retain: usize,
        #[serde(default, skip_serializing_if = "attributes::is_empty")]
        attributes: Attributes,
    },
    Delete {
        delete: usize,
    },
}

impl Op {
    pub fn text(text: impl Into<String>) -> Self {
        Self::text_with(text, Attributes::new())
    }

    pub fn text_with(text: impl Into<String>, attributes: Attributes) -> Self {
        Op::Insert {
            insert: Insert::Text(text.into()),
            attributes,
        }
    }

    pub fn embed(embed: EmbedRef, attributes: Attributes) -> Self {
        Op::Insert {
            insert: Insert::Embed(embed),
            attributes,
        }
    }

    pub fn retain(n: usize) -> Self {
        Op::Retain {
            retain: n,
            attributes: Attributes::new(),
        }
    }

    pub fn delete(n: usize) -> Self {
        Op::Delete { delete: n }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Op::Insert { .. } => OpKind::Insert,
            Op::Retain { .. } => OpKind::Retain,
            Op::Delete { .. } => OpKind::Delete,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Op::Insert { insert, .. } => insert.len(),
            Op::Retain { retain, .. } => *retain,
            Op::Delete { delete } => *delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Op::Insert { insert, .. } => insert.is_empty(),
            Op::Retain { retain, .. } => *retain == 0,
            Op::Delete { delete } => *delete == 0,
        }
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Op::Insert { attributes, .. } | Op::Retain { attributes, .. } => Some(attributes),
            Op::Delete { .. } => None,
        }
    }

    /// Text of an insert op, `None` for embeds and non-inserts.
    pub fn insert_text(&self) -> Option<&str> {
        match self {
            Op::Insert { insert, .. } => insert.as_text(),
            _ => None,
        }
    }
}

/// One newline-terminated line of a document delta.
#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    /// Offset of the first position of the line.
    pub start: usize,
    /// Line content without its terminating newline.
    pub content: Delta,
    /// Attributes of the terminating newline (block formatting).
    pub attributes: Attributes,
    /// Length including the newline, if any.
    pub len: usize,
    /// False only for trailing content that has no newline.
    pub terminated: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub ops: Vec<Op>,
}

impl From<Vec<Op>> for Delta {
    fn from(ops: Vec<Op>) -> Self {
        Self::from_ops(ops)
    }
}

impl Delta {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Parse either `{"ops": [...]}` or a bare op array.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if value.is_array() {
            Ok(Self {
                ops: serde_json::from_value(value)?,
            })
        } else {
            serde_json::from_value(value)
        }
    }

    /// Build a delta, normalising through [`Delta::push`].
    pub fn from_ops(ops: impl IntoIterator<Item = Op>) -> Self {
        let mut delta = Self::new();
        for op in ops {
            delta.push(op);
        }
        delta
    }

    /// The empty-buffer document: a single `"\n"`.
    pub fn terminator() -> Self {
        Self::new().insert("\n")
    }

    pub fn insert(self, text: impl Into<String>) -> Self {
        self.insert_with(text, Attributes::new())
    }

    pub fn insert_with(mut self, text: impl Into<String>, attributes: Attributes) -> Self {
        self.push(Op::text_with(text, attributes));
        self
    }

    pub fn insert_embed(mut self, embed: EmbedRef, attributes: Attributes) -> Self {
        self.push(Op::embed(embed, attributes));
        self
    }

    pub fn retain(self, n: usize) -> Self {
        self.retain_with(n, Attributes::new())
    }

    pub fn retain_with(mut self, n: usize, attributes: Attributes) -> Self {
        self.push(Op::Retain { retain: n, attributes });
        self
    }

    pub fn delete(mut self, n: usize) -> Self {
        self.push(Op::delete(n));
        self
    }

    /// Append an op, merging it into the previous one when compatible.
    ///
    /// Zero-length ops are dropped. An insert following a delete is placed
    /// before it so equivalent changes have one canonical form.
    pub fn push(&mut self, op: Op) -> &mut Self {
        if op.is_empty() {
            return self;
        }
        let mut index = self.ops.len();
        if let Some(last) = self.ops.last_mut() {
            if let (Op::Delete { delete: a }, Op::Delete { delete: b }) = (&mut *last, &op) {
                *a += *b;
                return self;
            }
            if matches!(last, Op::Delete { .. }) && matches!(op, Op::Insert { .. }) {
                index -= 1;
                if index == 0 {
                    self.ops.insert(0, op);
                    return self;
                }
            }
        }
        if index > 0 {
            match (&mut self.ops[index - 1], &op) {
                (
                    Op::Insert { insert: Insert::Text(a), attributes: aa },
                    Op::Insert { insert: Insert::Text(b), attributes: ba },
                ) if *aa == *ba => {
                    a.push_str(b);
                    return self;
                }
                (
                    Op::Retain { retain: a, attributes: aa },
                    Op::Retain { retain: b, attributes: ba },
                ) if *aa == *ba => {
                    *a += *b;
                    return self;
                }
                _ => {}
            }
        }
        if index == self.ops.len() {
            self.ops.push(op);
        } else {
            self.ops.insert(index, op);
        }
        self
    }

    /// Total length of all ops (for a document: its logical length).
    pub fn len(&self) -> usize {
        self.ops.iter().map(Op::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// True for an empty delta or one holding only the terminator.
    pub fn is_blank(&self) -> bool {
        match self.ops.as_slice() {
            [] => true,
            [op] => op.insert_text() == Some("\n"),
            _ => false,
        }
    }

    pub fn ends_with_newline(&self) -> bool {
        self.ops
            .last()
            .and_then(Op::insert_text)
            .is_some_and(|s| s.ends_with('\n'))
    }

    /// Number of positions that are not newlines.
    pub fn visible_len(&self) -> usize {
        self.positional_chars().iter().filter(|&&c| c != '\n').count()
    }

    /// Drop a trailing attribute-free retain.
    pub fn chop(mut self) -> Self {
        if let Some(Op::Retain { attributes, .. }) = self.ops.last() {
            if attributes.is_empty() {
                self.ops.pop();
            }
        }
        self
    }

    pub fn concat(&self, other: &Delta) -> Delta {
        let mut out = self.clone();
        let mut rest = other.ops.iter().cloned();
        if let Some(first) = rest.next() {
            out.push(first);
            out.ops.extend(rest);
        }
        out
    }

    /// Ops covering `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Delta {
        let mut out = Delta::new();
        let mut iter = OpIter::new(&self.ops);
        let mut index = 0;
        while index < end && iter.has_next() {
            let op = if index < start {
                iter.next(start - index)
            } else {
                let op = iter.next(end - index);
                out.push(op.clone());
                op
            };
            index += op.len();
        }
        out
    }

    /// Apply `other` (a change) on top of `self`.
    pub fn compose(&self, other: &Delta) -> Delta {
        let mut this_iter = OpIter::new(&self.ops);
        let mut other_iter = OpIter::new(&other.ops);
        let mut delta = Delta::new();

        // Leading plain retain: copy the untouched prefix wholesale.
        if let Some(Op::Retain { retain, attributes }) = other_iter.peek() {
            if attributes.is_empty() {
                let mut first_left = *retain;
                while this_iter.peek_kind() == OpKind::Insert && this_iter.peek_len() <= first_left {
                    first_left -= this_iter.peek_len();
                    delta.ops.push(this_iter.next_op());
                }
                if *retain - first_left > 0 {
                    other_iter.next(*retain - first_left);
                }
            }
        }

        while this_iter.has_next() || other_iter.has_next() {
            if other_iter.peek_kind() == OpKind::Insert {
                delta.push(other_iter.next_op());
            } else if this_iter.peek_kind() == OpKind::Delete {
                delta.push(this_iter.next_op());
            } else {
                let length = this_iter.peek_len().min(other_iter.peek_len());
                let this_op = this_iter.next(length);
                let other_op = other_iter.next(length);
                match other_op {
                    Op::Retain { attributes: other_attrs, .. } => {
                        let new_op = match this_op {
                            Op::Retain { attributes, .. } => Op::Retain {
                                retain: length,
                                attributes: attributes::compose(&attributes, &other_attrs, true),
                            },
                            Op::Insert { insert, attributes } => Op::Insert {
                                insert,
                                attributes: attributes::compose(&attributes, &other_attrs, false),
                            },
                            Op::Delete { .. } => continue,
                        };
                        delta.push(new_op.clone());
                        if !other_iter.has_next() && delta.ops.last() == Some(&new_op) {
                            let rest = Delta { ops: this_iter.rest() };
                            return delta.concat(&rest).chop();
                        }
                    }
                    Op::Delete { .. } => {
                        if matches!(this_op, Op::Retain { .. }) {
                            delta.push(other_op);
                        }
                    }
                    Op::Insert { .. } => {}
                }
            }
        }
        delta.chop()
    }

    /// The change that undoes `self` when applied after it. `base` is the
    /// document `self` was applied to.
    pub fn invert(&self, base: &Delta) -> Delta {
        let mut inverted = Delta::new();
        let mut base_index = 0;
        for op in &self.ops {
            match op {
                Op::Insert { .. } => {
                    inverted.push(Op::delete(op.len()));
                }
                Op::Retain { retain, attributes } if attributes.is_empty() => {
                    inverted.push(Op::retain(*retain));
                    base_index += retain;
                }
                Op::Retain { retain, attributes } => {
                    for base_op in base.slice(base_index, base_index + retain).ops {
                        let base_attrs = base_op.attributes().cloned().unwrap_or_default();
                        inverted.push(Op::Retain {
                            retain: base_op.len(),
                            attributes: attributes::invert(attributes, &base_attrs),
                        });
                    }
                    base_index += retain;
                }
                Op::Delete { delete } => {
                    for base_op in base.slice(base_index, base_index + delete).ops {
                        inverted.push(base_op);
                    }
                    base_index += delete;
                }
            }
        }
        inverted.chop()
    }

    /// Rebase `other` onto `self`, both made against the same document.
    ///
    /// With `priority`, `self` is taken to have happened first: its inserts
    /// go before `other`'s at the same position and its attributes win.
    pub fn transform(&self, other: &Delta, priority: bool) -> Delta {
        let mut this_iter = OpIter::new(&self.ops);
        let mut other_iter = OpIter::new(&other.ops);
        let mut delta = Delta::new();
        while this_iter.has_next() || other_iter.has_next() {
            if this_iter.peek_kind() == OpKind::Insert
                && (priority || other_iter.peek_kind() != OpKind::Insert)
            {
                delta.push(Op::retain(this_iter.next_op().len()));
            } else if other_iter.peek_kind() == OpKind::Insert {
                delta.push(other_iter.next_op());
            } else {
                let length = this_iter.peek_len().min(other_iter.peek_len());
                let this_op = this_iter.next(length);
                let other_op = other_iter.next(length);
                match (this_op, other_op) {
                    (Op::Delete { .. }, _) => {}
                    (_, other_op @ Op::Delete { .. }) => {
                        delta.push(other_op);
                    }
                    (this_op, other_op) => {
                        let this_attrs = this_op.attributes().cloned().unwrap_or_default();
                        let other_attrs = other_op.attributes().cloned().unwrap_or_default();
                        delta.push(Op::Retain {
                            retain: length,
                            attributes: attributes::transform(&this_attrs, &other_attrs, priority),
                        });
                    }
                }
            }
        }
        delta.chop()
    }

    /// Where `index` ends up after this change is applied.
    ///
    /// With `priority`, an insert exactly at `index` does not push it.
    pub fn transform_position(&self, mut index: usize, priority: bool) -> usize {
        let mut iter = OpIter::new(&self.ops);
        let mut offset = 0;
        while iter.has_next() && offset <= index {
            let length = iter.peek_len();
            let kind = iter.peek_kind();
            iter.next_op();
            match kind {
                OpKind::Delete => {
                    index -= length.min(index - offset);
                    continue;
                }
                OpKind::Insert if offset < index || !priority => index += length,
                _ => {}
            }
            offset += length;
        }
        index
    }

    /// Plain text of all text inserts; embeds contribute nothing.
    pub fn text(&self) -> String {
        self.ops.iter().filter_map(Op::insert_text).collect()
    }

    /// One char per position, embeds as [`OBJECT_REPLACEMENT`].
    pub fn positional_chars(&self) -> Vec<char> {
        let mut out = Vec::with_capacity(self.len());
        for op in &self.ops {
            match op {
                Op::Insert { insert: Insert::Text(s), .. } => out.extend(s.chars()),
                Op::Insert { insert: Insert::Embed(_), .. } => out.push(OBJECT_REPLACEMENT),
                _ => {}
            }
        }
        out
    }

    /// Split into newline-terminated lines. Stops at the first non-insert.
    pub fn lines(&self) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut iter = OpIter::new(&self.ops);
        let mut content = Delta::new();
        let mut start = 0;
        let mut pos = 0;
        while iter.has_next() {
            let Some(op) = iter.peek() else { break };
            if op.kind() != OpKind::Insert {
                break;
            }
            let newline_at = match op {
                Op::Insert { insert: Insert::Text(s), .. } => {
                    s.chars().skip(iter.offset).position(|c| c == '\n')
                }
                _ => None,
            };
            match newline_at {
                None => {
                    let next = iter.next_op();
                    pos += next.len();
                    content.push(next);
                }
                Some(0) => {
                    let newline = iter.next(1);
                    let attributes = newline.attributes().cloned().unwrap_or_default();
                    pos += 1;
                    lines.push(Line {
                        start,
                        content: std::mem::take(&mut content),
                        attributes,
                        len: pos - start,
                        terminated: true,
                    });
                    start = pos;
                }
                Some(k) => {
                    let next = iter.next(k);
                    pos += k;
                    content.push(next);
                }
            }
        }
        if !content.is_empty() {
            lines.push(Line {
                start,
                content,
                attributes: Attributes::new(),
                len: pos - start,
                terminated: false,
            });
        }
        lines
    }

    /// Check that this is a well-formed document (insert-only, no empties).
    pub fn validate_document(&self) -> Result<(), DeltaError> {
        for (index, op) in self.ops.iter().enumerate() {
            match op {
                Op::Insert { insert: Insert::Text(s), .. } if s.is_empty() => {
                    return Err(DeltaError::EmptyInsert { index });
                }
                Op::Insert { insert: Insert::Embed(map), .. } if map.is_empty() => {
                    return Err(DeltaError::EmptyEmbed { index });
                }
                Op::Insert { .. } => {}
                other => {
                    return Err(DeltaError::NotADocument {
                        index,
                        kind: other.kind().as_str(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Cursor over a slice of ops that can hand out partial ops.
#[derive(Clone)]
struct OpIter<'a> {
    ops: &'a [Op],
    index: usize,
    offset: usize,
}

impl<'a> OpIter<'a> {
    fn new(ops: &'a [Op]) -> Self {
        Self { ops, index: 0, offset: 0 }
    }

    fn has_next(&self) -> bool {
        self.peek_len() < usize::MAX
    }

    fn peek(&self) -> Option<&'a Op> {
        self.ops.get(self.index)
    }

    fn peek_len(&self) -> usize {
        match self.ops.get(self.index) {
            Some(op) => op.len() - self.offset,
            None => usize::MAX,
        }
    }

    fn peek_kind(&self) -> OpKind {
        self.ops.get(self.index).map_or(OpKind::Retain, Op::kind)
    }

    fn next_op(&mut self) -> Op {
        self.next(usize::MAX)
    }

    /// Take up to `length` positions. Past the end, yields a plain retain.
    fn next(&mut self, length: usize) -> Op {
        let Some(op) = self.ops.get(self.index) else {
            return Op::retain(length);
        };
        let offset = self.offset;
        let remaining = op.len() - offset;
        let length = if length >= remaining {
            self.index += 1;
            self.offset = 0;
            remaining
        } else {
            self.offset += length;
            length
        };
        match op {
            Op::Delete { .. } => Op::delete(length),
            Op::Retain { attributes, .. } => Op::Retain {
                retain: length,
                attributes: attributes.clone(),
            },
            Op::Insert { insert: Insert::Text(s), attributes } => Op::Insert {
                insert: Insert::Text(s.chars().skip(offset).take(length).collect()),
                attributes: attributes.clone(),
            },
            Op::Insert { insert: embed @ Insert::Embed(_), attributes } => Op::Insert {
                insert: embed.clone(),
                attributes: attributes.clone(),
            },
        }
    }

    fn rest(&self) -> Vec<Op> {
        if !self.has_next() {
            return Vec::new();
        }
        if self.offset == 0 {
            return self.ops[self.index..].to_vec();
        }
        let mut iter = self.clone();
        let mut out = vec![iter.next_op()];
        out.extend_from_slice(&iter.ops[iter.index..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{from_pairs, BOLD, ITALIC};
    use serde_json::json;

    fn bold() -> Attributes {
        from_pairs([(BOLD, json!(true))])
    }

    #[test]
    fn test_push_merges_adjacent_text() {
        let d = Delta::new().insert("ab").insert("cd");
        assert_eq!(d.ops, vec![Op::text("abcd")]);
    }

    #[test]
    fn test_push_keeps_different_attributes_apart() {
        let d = Delta::new().insert("ab").insert_with("cd", bold());
        assert_eq!(d.ops.len(), 2);
    }

    #[test]
    fn test_push_puts_insert_before_delete() {
        let d = Delta::new().retain(2).delete(3).insert("x");
        assert_eq!(d.ops, vec![Op::retain(2), Op::text("x"), Op::delete(3)]);
    }

    #[test]
    fn test_push_skips_empty_ops() {
        let d = Delta::new().insert("").retain(0).delete(0);
        assert!(d.is_empty());
    }

    #[test]
    fn test_len_counts_chars_and_embeds() {
        let mut embed = EmbedRef::new();
        embed.insert("image".into(), json!("a.png"));
        let d = Delta::new().insert("héllo").insert_embed(embed, Attributes::new()).insert("\n");
        assert_eq!(d.len(), 7);
        assert_eq!(d.positional_chars()[5], OBJECT_REPLACEMENT);
    }

    #[test]
    fn test_slice_across_ops() {
        let d = Delta::new().insert("Hello ").insert_with("world", bold()).insert("\n");
        let s = d.slice(4, 8);
        assert_eq!(s.ops, vec![Op::text("o "), Op::text_with("wo", bold())]);
    }

    #[test]
    fn test_slice_to_end() {
        let d = Delta::new().insert("abc\n");
        assert_eq!(d.slice(1, usize::MAX).text(), "bc\n");
    }

    #[test]
    fn test_concat_merges_boundary() {
        let a = Delta::new().insert("ab");
        let b = Delta::new().insert("cd").insert_with("e", bold());
        let c = a.concat(&b);
        assert_eq!(c.ops, vec![Op::text("abcd"), Op::text_with("e", bold())]);
    }

    #[test]
    fn test_compose_insert_in_middle() {
        let doc = Delta::new().insert("Hello\n");
        let change = Delta::new().retain(5).insert(" world");
        assert_eq!(doc.compose(&change).text(), "Hello world\n");
    }

    #[test]
    fn test_compose_delete() {
        let doc = Delta::new().insert("Hello world\n");
        let change = Delta::new().retain(5).delete(6);
        assert_eq!(doc.compose(&change).text(), "Hello\n");
    }

    #[test]
    fn test_compose_format_and_unformat() {
        let doc = Delta::new().insert("abc\n");
        let formatted = doc.compose(&Delta::new().retain(1).retain_with(1, bold()));
        assert_eq!(
            formatted.ops,
            vec![Op::text("a"), Op::text_with("b", bold()), Op::text("c\n")]
        );
        let cleared = formatted.compose(
            &Delta::new()
                .retain(1)
                .retain_with(1, from_pairs([(BOLD, Value::Null)])),
        );
        assert_eq!(cleared.ops, vec![Op::text("abc\n")]);
    }

    #[test]
    fn test_compose_two_changes_keeps_nulls() {
        let a = Delta::new().retain_with(2, bold());
        let b = Delta::new().retain_with(2, from_pairs([(ITALIC, Value::Null)]));
        let c = a.compose(&b);
        let attrs = c.ops[0].attributes().unwrap();
        assert_eq!(attrs.get(ITALIC), Some(&Value::Null));
        assert_eq!(attrs.get(BOLD), Some(&json!(true)));
    }

    #[test]
    fn test_compose_delete_of_insert_vanishes() {
        let a = Delta::new().insert("abc");
        let b = Delta::new().retain(1).delete(1);
        assert_eq!(a.compose(&b).ops, vec![Op::text("ac")]);
    }

    #[test]
    fn test_invert_restores_document() {
        let base = Delta::new().insert("Hello ").insert_with("world", bold()).insert("\n");
        let change = Delta::new()
            .retain(2)
            .delete(3)
            .insert("y")
            .retain(1)
            .retain_with(5, from_pairs([(BOLD, Value::Null), (ITALIC, json!(true))]));
        let edited = base.compose(&change);
        assert_eq!(edited.compose(&change.invert(&base)), base);
    }

    #[test]
    fn test_invert_of_insert_is_delete() {
        let base = Delta::new().insert("ab\n");
        let change = Delta::new().retain(1).insert("XY");
        assert_eq!(change.invert(&base), Delta::new().retain(1).delete(2));
    }

    #[test]
    fn test_transform_concurrent_inserts() {
        let a = Delta::new().insert("A");
        let b = Delta::new().insert("B");
        assert_eq!(a.transform(&b, true), Delta::new().retain(1).insert("B"));
        assert_eq!(a.transform(&b, false), Delta::new().insert("B"));
    }

    #[test]
    fn test_transform_converges() {
        let doc = Delta::new().insert("abcdef\n");
        let a = Delta::new().retain(1).delete(2).insert("X");
        let b = Delta::new().retain(2).insert("Y").retain(2).delete(1);
        let left = doc.compose(&a).compose(&a.transform(&b, true));
        let right = doc.compose(&b).compose(&b.transform(&a, false));
        assert_eq!(left, right);
    }

    #[test]
    fn test_transform_drops_formatting_of_deleted_text() {
        let a = Delta::new().retain(1).delete(3);
        let b = Delta::new().retain(2).retain_with(4, bold());
        assert_eq!(a.transform(&b, true), Delta::new().retain(1).retain_with(2, bold()));
    }

    #[test]
    fn test_transform_position() {
        let change = Delta::new().retain(2).insert("xyz");
        assert_eq!(change.transform_position(1, false), 1);
        assert_eq!(change.transform_position(2, false), 5);
        assert_eq!(change.transform_position(2, true), 2);
        assert_eq!(change.transform_position(4, false), 7);

        let delete = Delta::new().retain(1).delete(3);
        assert_eq!(delete.transform_position(2, false), 1);
        assert_eq!(delete.transform_position(6, false), 3);
    }

    #[test]
    fn test_lines() {
        let d = Delta::new()
            .insert("ab\n")
            .insert("c")
            .insert_with("\n", from_pairs([("header", json!(1))]))
            .insert("tail");
        let lines = d.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].content.text(), "ab");
        assert_eq!(lines[0].len, 3);
        assert_eq!(lines[1].start, 3);
        assert_eq!(lines[1].attributes.get("header"), Some(&json!(1)));
        assert!(!lines[2].terminated);
        assert_eq!(lines[2].len, 4);
    }

    #[test]
    fn test_blank_and_newline_checks() {
        assert!(Delta::new().is_blank());
        assert!(Delta::terminator().is_blank());
        assert!(!Delta::new().insert("a\n").is_blank());
        assert!(Delta::new().insert("a\n").ends_with_newline());
        assert!(!Delta::new().insert("a").ends_with_newline());
    }

    #[test]
    fn test_validate_document() {
        assert!(Delta::new().insert("a\n").validate_document().is_ok());
        let with_retain = Delta { ops: vec![Op::text("a"), Op::retain(1)] };
        assert_eq!(
            with_retain.validate_document(),
            Err(DeltaError::NotADocument { index: 1, kind: "retain" })
        );
        let empty = Delta { ops: vec![Op::text("")] };
        assert_eq!(empty.validate_document(), Err(DeltaError::EmptyInsert { index: 0 }));
    }

    #[test]
    fn test_json_shape() {
        let d = Delta::new().insert_with("a", bold()).insert("\n");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(
            json,
            json!({"ops": [{"insert": "a", "attributes": {"bold": true}}, {"insert": "\n"}]})
        );
        let change: Delta =
            serde_json::from_value(json!({"ops": [{"retain": 3}, {"delete": 2}, {"insert": {"image": "x.png"}}]}))
                .unwrap();
        assert_eq!(change.ops[0], Op::retain(3));
        assert_eq!(change.ops[1], Op::delete(2));
        assert_eq!(change.ops[2].kind(), OpKind::Insert);
    }

    #[test]
    fn test_unknown_attributes_survive_json() {
        let raw = json!({"ops": [{"insert": "x\n", "attributes": {"table-cell-id": "c1", "future": {"a": 1}}}]});
        let d: Delta = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&d).unwrap(), raw);
    }
}
