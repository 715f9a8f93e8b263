//! `$`-rooted dotted-path extraction over parsed documents.

use serde_json::Value;

use crate::error::{LocaleError, LocaleResult};

/// Extracts a subtree from a parsed document.
///
/// The selector must start with `$` (the document root), followed by dotted
/// keys: `$.locales.en` walks two object levels down. A bare `$` returns the
/// whole document. Array indexing is supported with plain numeric keys
/// (`$.items.0`).
pub fn extract<'a>(document: &'a Value, selector: &str) -> Option<&'a Value> {
    let rest = selector.strip_prefix('$')?;
    if rest.is_empty() {
        return Some(document);
    }
    let rest = rest.strip_prefix('.')?;

    let mut node = document;
    for key in rest.split('.') {
        node = match node {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Like [`extract`] but misses are an error carrying the selector.
pub fn extract_required<'a>(document: &'a Value, selector: &str) -> LocaleResult<&'a Value> {
    extract(document, selector).ok_or_else(|| LocaleError::SelectorMiss {
        selector: selector.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_selector() {
        let doc = json!({"a": 1});
        assert_eq!(extract(&doc, "$"), Some(&doc));
    }

    #[test]
    fn test_nested_selector() {
        let doc = json!({"locales": {"en": {"hi": "hello"}}});
        assert_eq!(extract(&doc, "$.locales.en.hi"), Some(&json!("hello")));
    }

    #[test]
    fn test_array_index() {
        let doc = json!({"items": ["a", "b"]});
        assert_eq!(extract(&doc, "$.items.1"), Some(&json!("b")));
    }

    #[test]
    fn test_miss_returns_none() {
        let doc = json!({"a": 1});
        assert_eq!(extract(&doc, "$.b"), None);
        assert_eq!(extract(&doc, "a"), None);
    }

    #[test]
    fn test_required_miss_is_error() {
        let doc = json!({});
        let err = extract_required(&doc, "$.x").unwrap_err();
        assert!(matches!(err, LocaleError::SelectorMiss { .. }));
    }
}
