//! Dot-notation field lookup over arbitrary JSON values.
//!
//! Paths look like `metrics.accumulated_cost` or `history.0.content`, and may
//! be wrapped in the `len(...)` pseudo-function to get the size of an array,
//! string or object instead of the value itself.

use std::borrow::Cow;

use serde_json::{Number, Value};

/// Maximum characters of serialized JSON shown for an object value.
const OBJECT_PREVIEW_CHARS: usize = 30;

/// Resolve `path` against `root`.
///
/// Returns `None` when any segment is missing or the walk hits a value that
/// cannot be indexed. An explicit `null` leaf comes back as `Some(Null)`.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<Cow<'a, Value>> {
    if path.is_empty() || root.is_null() {
        return None;
    }

    if let Some(inner) = len_argument(path) {
        let len = match &*resolve(root, inner)? {
            Value::Array(items) => items.len(),
            Value::String(s) => s.chars().count(),
            Value::Object(map) => map.len(),
            _ => return None,
        };
        return Some(Cow::Owned(Value::from(len)));
    }

    path.split('.')
        .try_fold(root, |current, key| match current {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .map(Cow::Borrowed)
}

/// Like [`resolve`], falling back to `default` when the path does not resolve.
pub fn resolve_or(root: &Value, path: &str, default: Value) -> Value {
    resolve(root, path).map(Cow::into_owned).unwrap_or(default)
}

/// Format a resolved value for a compact sidebar summary.
pub fn format_for_display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(Value::Bool(true)) => "Yes".to_string(),
        Some(Value::Bool(false)) => "No".to_string(),
        Some(Value::Number(n)) => format_number(n),
        Some(Value::Array(items)) => format!("Array({})", items.len()),
        Some(obj @ Value::Object(_)) => match serde_json::to_string(obj) {
            Ok(json) => truncate_chars(&json, OBJECT_PREVIEW_CHARS),
            Err(_) => "[Object]".to_string(),
        },
        Some(Value::String(s)) => s.clone(),
    }
}

/// Human label for a display field: `len(history)` reads as `history length`.
pub fn display_label(path: &str) -> String {
    match len_argument(path) {
        Some(inner) => format!("{} length", inner),
        None => path.to_string(),
    }
}

/// Truncate to `max` characters, appending `...` when anything was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

fn len_argument(path: &str) -> Option<&str> {
    path.strip_prefix("len(")?.strip_suffix(')')
}

fn format_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.0}", f),
        Some(f) => format!("{:.4}", f),
        None => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_len_of_array() {
        let root = json!({"a": {"b": [1, 2, 3]}});
        assert_eq!(resolve_or(&root, "len(a.b)", json!(0)), json!(3));
    }

    #[test]
    fn test_resolve_len_of_string_and_object() {
        let root = json!({"name": "héllo", "obj": {"x": 1, "y": 2}});
        assert_eq!(resolve_or(&root, "len(name)", json!(0)), json!(5));
        assert_eq!(resolve_or(&root, "len(obj)", json!(0)), json!(2));
    }

    #[test]
    fn test_resolve_len_of_scalar_or_missing_is_default() {
        let root = json!({"n": 4, "nothing": null});
        assert_eq!(resolve_or(&root, "len(n)", json!("D")), json!("D"));
        assert_eq!(resolve_or(&root, "len(nothing)", json!("D")), json!("D"));
        assert_eq!(resolve_or(&root, "len(missing)", json!("D")), json!("D"));
    }

    #[test]
    fn test_resolve_missing_path_is_default() {
        let root = json!({"a": 1});
        assert_eq!(resolve_or(&root, "a.b.c", json!("X")), json!("X"));
        assert_eq!(resolve_or(&root, "zzz", json!("X")), json!("X"));
        assert_eq!(resolve_or(&root, "", json!("X")), json!("X"));
    }

    #[test]
    fn test_resolve_null_leaf_is_kept() {
        let root = json!({"a": null});
        assert_eq!(resolve_or(&root, "a", json!("X")), Value::Null);
        assert_eq!(resolve_or(&root, "a.b", json!("X")), json!("X"));
    }

    #[test]
    fn test_resolve_array_index_segment() {
        let root = json!({"history": [{"content": "first"}, {"content": "second"}]});
        assert_eq!(resolve_or(&root, "history.1.content", Value::Null), json!("second"));
        assert_eq!(resolve_or(&root, "history.x", json!("X")), json!("X"));
    }

    #[test]
    fn test_resolve_borrows_plain_paths() {
        let root = json!({"metrics": {"accumulated_cost": 0.5}});
        assert!(matches!(resolve(&root, "metrics"), Some(Cow::Borrowed(_))));
    }

    #[test]
    fn test_format_for_display() {
        assert_eq!(format_for_display(None), "N/A");
        assert_eq!(format_for_display(Some(&Value::Null)), "N/A");
        assert_eq!(format_for_display(Some(&json!(true))), "Yes");
        assert_eq!(format_for_display(Some(&json!(false))), "No");
        assert_eq!(format_for_display(Some(&json!(42))), "42");
        assert_eq!(format_for_display(Some(&json!(3.0))), "3");
        assert_eq!(format_for_display(Some(&json!(0.123456))), "0.1235");
        assert_eq!(format_for_display(Some(&json!([1, 2]))), "Array(2)");
        assert_eq!(format_for_display(Some(&json!("text"))), "text");
        assert_eq!(format_for_display(Some(&json!({"a": 1}))), "{\"a\":1}");
    }

    #[test]
    fn test_format_long_object_is_truncated() {
        let value = json!({"description": "a fairly long string value here"});
        let shown = format_for_display(Some(&value));
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), OBJECT_PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_display_label() {
        assert_eq!(display_label("len(history)"), "history length");
        assert_eq!(display_label("metrics.accumulated_cost"), "metrics.accumulated_cost");
    }
}
