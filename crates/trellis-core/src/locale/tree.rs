//! Merged locale trees and formatting leaves.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{LocaleError, LocaleResult};

/// A string leaf that doubles as a positional formatter.
///
/// The template may contain `{0}`, `{1}`, … placeholders;
/// [`format`](LocaleText::format) substitutes the Nth argument
/// (stringified). Placeholders with no matching argument are left as-is, as
/// is anything between braces that is not a decimal index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocaleText {
    template: String,
}

impl LocaleText {
    /// Wraps a template string.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The raw template.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitutes `{N}` placeholders with the Nth argument.
    pub fn format(&self, args: &[&dyn std::fmt::Display]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            match tail.find('}') {
                Some(close) => {
                    let body = &tail[1..close];
                    match body.parse::<usize>() {
                        Ok(index) if index < args.len() => {
                            out.push_str(&args[index].to_string());
                        }
                        // Unknown index or non-numeric body: keep literally.
                        _ => out.push_str(&tail[..=close]),
                    }
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl std::fmt::Display for LocaleText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}

/// One node of a merged locale tree.
///
/// Branches hold nested keys; leaves hold formatting templates. The same
/// node is both a lookup step ([`get`](LocaleNode::get) /
/// [`at`](LocaleNode::at)) and, at a leaf, an invokable formatter.
#[derive(Clone, Debug, PartialEq)]
pub enum LocaleNode {
    /// Nested keys. `BTreeMap` keeps traversal deterministic.
    Branch(BTreeMap<String, LocaleNode>),
    /// A formatting template.
    Leaf(LocaleText),
}

impl LocaleNode {
    /// An empty branch.
    pub fn empty() -> Self {
        Self::Branch(BTreeMap::new())
    }

    /// A leaf node.
    pub fn leaf(template: impl Into<String>) -> Self {
        Self::Leaf(LocaleText::new(template))
    }

    /// Child node for a single key, if this is a branch.
    pub fn get(&self, key: &str) -> Option<&LocaleNode> {
        match self {
            Self::Branch(children) => children.get(key),
            Self::Leaf(_) => None,
        }
    }

    /// Node at a dotted path such as `"errors.notFound"`.
    pub fn at(&self, path: &str) -> Option<&LocaleNode> {
        let mut node = self;
        for key in path.split('.') {
            node = node.get(key)?;
        }
        Some(node)
    }

    /// The formatting leaf at this node, if it is one.
    pub fn text(&self) -> Option<&LocaleText> {
        match self {
            Self::Leaf(text) => Some(text),
            Self::Branch(_) => None,
        }
    }

    /// Formats the leaf at a dotted path.
    pub fn format(&self, path: &str, args: &[&dyn std::fmt::Display]) -> Option<String> {
        self.at(path)?.text().map(|t| t.format(args))
    }

    /// Returns `true` if this branch has no children.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Branch(children) => children.is_empty(),
            Self::Leaf(_) => false,
        }
    }

    /// Fills keys that are structurally absent in `self` from `other`.
    ///
    /// Existing keys are never overwritten — the first-registered value for
    /// any nested key path wins. A leaf/branch conflict keeps the existing
    /// node.
    pub fn fill_missing_from(&mut self, other: &LocaleNode) {
        let (Self::Branch(mine), Self::Branch(theirs)) = (&mut *self, other) else {
            return;
        };
        for (key, their_child) in theirs {
            match mine.get_mut(key) {
                Some(my_child) => my_child.fill_missing_from(their_child),
                None => {
                    mine.insert(key.clone(), their_child.clone());
                }
            }
        }
    }

    /// Builds a tree from parsed JSON: objects become branches, strings
    /// become leaves. Anything else is rejected.
    pub fn from_json(source: &str, value: &Value) -> LocaleResult<LocaleNode> {
        match value {
            Value::String(s) => Ok(Self::leaf(s.clone())),
            Value::Object(map) => {
                let mut children = BTreeMap::new();
                for (key, child) in map {
                    children.insert(key.clone(), Self::from_json(source, child)?);
                }
                Ok(Self::Branch(children))
            }
            other => Err(LocaleError::InvalidData {
                path: source.to_string(),
                reason: format!("expected string or object, got {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_positional() {
        let text = LocaleText::new("hello {0}, you have {1} messages");
        assert_eq!(
            text.format(&[&"sam", &3]),
            "hello sam, you have 3 messages"
        );
    }

    #[test]
    fn test_format_repeated_and_out_of_range() {
        let text = LocaleText::new("{0} {0} {5} {not-a-number}");
        assert_eq!(text.format(&[&"x"]), "x x {5} {not-a-number}");
    }

    #[test]
    fn test_format_unclosed_brace() {
        let text = LocaleText::new("tail {0");
        assert_eq!(text.format(&[&"x"]), "tail {0");
    }

    #[test]
    fn test_at_and_text() {
        let tree =
            LocaleNode::from_json("test", &json!({"a": {"b": "deep {0}"}})).unwrap();
        assert_eq!(tree.at("a.b").unwrap().text().unwrap().as_str(), "deep {0}");
        assert_eq!(tree.format("a.b", &[&1]), Some("deep 1".to_string()));
        assert!(tree.at("a.missing").is_none());
    }

    #[test]
    fn test_fill_missing_first_wins() {
        let mut first =
            LocaleNode::from_json("a", &json!({"x": {"y": "1"}})).unwrap();
        let second =
            LocaleNode::from_json("b", &json!({"x": {"y": "2", "z": "3"}})).unwrap();
        first.fill_missing_from(&second);

        assert_eq!(first.at("x.y").unwrap().text().unwrap().as_str(), "1");
        assert_eq!(first.at("x.z").unwrap().text().unwrap().as_str(), "3");
    }

    #[test]
    fn test_fill_missing_keeps_existing_on_shape_conflict() {
        let mut first = LocaleNode::from_json("a", &json!({"x": "leaf"})).unwrap();
        let second =
            LocaleNode::from_json("b", &json!({"x": {"y": "branch"}})).unwrap();
        first.fill_missing_from(&second);

        assert_eq!(first.at("x").unwrap().text().unwrap().as_str(), "leaf");
    }

    #[test]
    fn test_from_json_rejects_non_string_leaves() {
        let err = LocaleNode::from_json("test", &json!({"n": 42})).unwrap_err();
        assert!(matches!(err, LocaleError::InvalidData { .. }));
    }
}
