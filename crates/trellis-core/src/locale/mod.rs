//! Locale fragments, merged trees, and resolution.
//!
//! Each pack owns a [`LocaleStore`] of fragments. The root orchestrator
//! combines every pack's merged per-language view into one tree per language
//! (first-wins, like content fragments merge), back-fills non-default
//! languages from the default language, and hands dispatch a
//! [`ResolvedLocale`] so handlers can look up and format strings without
//! caring which language actually supplied them.

mod path;
mod store;
mod tree;

pub use path::{extract, extract_required};
pub use store::{
    CommandLocalization, InteractionLocaleFragment, LocaleFragment, LocaleStore,
    OptionLocalization,
};
pub use tree::{LocaleNode, LocaleText};

use std::sync::Arc;

/// The language used when the configuration names none.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A language resolved for one dispatch, bound to its merged tree.
#[derive(Clone)]
pub struct ResolvedLocale {
    language: String,
    tree: Arc<LocaleNode>,
}

impl ResolvedLocale {
    /// Binds a language tag to a merged tree.
    pub fn new(language: impl Into<String>, tree: Arc<LocaleNode>) -> Self {
        Self {
            language: language.into(),
            tree,
        }
    }

    /// A locale with no strings at all.
    pub fn empty(language: impl Into<String>) -> Self {
        Self::new(language, Arc::new(LocaleNode::empty()))
    }

    /// The resolved language tag.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The merged tree backing this locale.
    pub fn tree(&self) -> &LocaleNode {
        &self.tree
    }

    /// Node at a dotted path.
    pub fn at(&self, path: &str) -> Option<&LocaleNode> {
        self.tree.at(path)
    }

    /// Raw template at a dotted path.
    pub fn text(&self, path: &str) -> Option<&str> {
        self.tree.at(path)?.text().map(LocaleText::as_str)
    }

    /// Formats the leaf at a dotted path with positional arguments.
    pub fn format(&self, path: &str, args: &[&dyn std::fmt::Display]) -> Option<String> {
        self.tree.format(path, args)
    }
}

impl std::fmt::Debug for ResolvedLocale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedLocale")
            .field("language", &self.language)
            .finish()
    }
}
