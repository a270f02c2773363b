//! Formatting attributes carried by Delta operations.
//!
//! Attributes are a flat, ordered map from attribute name to an opaque JSON
//! value. Names the editor does not know about are kept as-is so documents
//! written by newer clients survive a round-trip through older ones.
//!
//! A `null` value inside a *change* delta means "remove this attribute";
//! inside a document delta nulls are dropped on composition.

use std::collections::BTreeMap;

use serde_json::Value;

/// Attribute map. `BTreeMap` keeps serialisation order deterministic.
pub type Attributes = BTreeMap<String, Value>;

pub const BOLD: &str = "bold";
pub const ITALIC: &str = "italic";
pub const UNDERLINE: &str = "underline";
pub const LINK: &str = "link";
pub const SIZE: &str = "size";
pub const COLOR: &str = "color";
pub const FONT: &str = "font";

/// Used by serde's `skip_serializing_if`.
pub fn is_empty(attributes: &Attributes) -> bool {
    attributes.is_empty()
}

/// Build an attribute map from `(name, value)` pairs.
pub fn from_pairs<I, K>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Compose `b` on top of `a`.
///
/// Keys in `b` win. When `keep_null` is false, `null` entries are removed
/// from the result instead of being carried forward.
pub fn compose(a: &Attributes, b: &Attributes, keep_null: bool) -> Attributes {
    let mut out: Attributes = b.clone();
    if !keep_null {
        out.retain(|_, v| !v.is_null());
    }
    for (key, value) in a {
        if !b.contains_key(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

/// The attributes that undo `attr` when it is applied over `base`: keys
/// `attr` changed go back to their `base` value, keys it added become
/// `null`.
pub fn invert(attr: &Attributes, base: &Attributes) -> Attributes {
    let mut out = Attributes::new();
    for (key, value) in base {
        if attr.get(key).is_some_and(|v| v != value) {
            out.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in attr {
        if !base.contains_key(key) && !value.is_null() {
            out.insert(key.clone(), Value::Null);
        }
    }
    out
}

/// `b` rebased onto `a`, both applied to the same text. With `priority`
/// `a` is considered first and its keys win.
pub fn transform(a: &Attributes, b: &Attributes, priority: bool) -> Attributes {
    if !priority {
        return b.clone();
    }
    b.iter()
        .filter(|(key, _)| !a.contains_key(*key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Whether `key` is present with a truthy value (`true`, non-empty string,
/// non-zero number).
pub fn is_set(attributes: &Attributes, key: &str) -> bool {
    match attributes.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compose_overrides_and_merges() {
        let a = from_pairs([(BOLD, json!(true)), (COLOR, json!("red"))]);
        let b = from_pairs([(COLOR, json!("blue")), (ITALIC, json!(true))]);
        let out = compose(&a, &b, false);
        assert_eq!(out.get(BOLD), Some(&json!(true)));
        assert_eq!(out.get(COLOR), Some(&json!("blue")));
        assert_eq!(out.get(ITALIC), Some(&json!(true)));
    }

    #[test]
    fn test_compose_null_removes_unless_kept() {
        let a = from_pairs([(BOLD, json!(true))]);
        let b = from_pairs([(BOLD, Value::Null)]);
        assert!(compose(&a, &b, false).is_empty());
        assert_eq!(compose(&a, &b, true).get(BOLD), Some(&Value::Null));
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let a = from_pairs([("table-cell-id", json!("c-17"))]);
        let out = compose(&a, &Attributes::new(), false);
        assert_eq!(out.get("table-cell-id"), Some(&json!("c-17")));
    }

    #[test]
    fn test_invert_restores_base() {
        let base = from_pairs([(BOLD, json!(true)), (COLOR, json!("red"))]);
        let attr = from_pairs([(COLOR, json!("blue")), (ITALIC, json!(true))]);
        let inverted = invert(&attr, &base);
        assert_eq!(inverted.get(COLOR), Some(&json!("red")));
        assert_eq!(inverted.get(ITALIC), Some(&Value::Null));
        assert!(!inverted.contains_key(BOLD));
    }

    #[test]
    fn test_transform_priority() {
        let a = from_pairs([(BOLD, json!(true))]);
        let b = from_pairs([(BOLD, json!(false)), (COLOR, json!("red"))]);
        assert_eq!(transform(&a, &b, false), b);
        assert_eq!(transform(&a, &b, true), from_pairs([(COLOR, json!("red"))]));
    }

    #[test]
    fn test_is_set() {
        let attrs = from_pairs([
            ("a", json!(true)),
            ("b", json!(false)),
            ("c", json!("")),
            ("d", json!(2)),
        ]);
        assert!(is_set(&attrs, "a"));
        assert!(!is_set(&attrs, "b"));
        assert!(!is_set(&attrs, "c"));
        assert!(is_set(&attrs, "d"));
        assert!(!is_set(&attrs, "missing"));
    }
}
