//! Per-container locale fragment store.
//!
//! A pack registers *fragments*: one unit of translated content (or
//! interaction metadata) for one language. The store keeps a merged view per
//! language, recomputed only for the affected language when a fragment is
//! added or disposed.
//!
//! The two fragment kinds merge differently, and the asymmetry is
//! deliberate (inherited behavior, kept as specified rather than unified):
//!
//! - **Content** fragments deep-merge; the first-registered value for a
//!   nested key path wins, later fragments only fill gaps.
//! - **Interaction** fragments overwrite per top-level command id; the
//!   last-registered fragment wins.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::tree::LocaleNode;
use crate::disposer::Disposer;

/// One unit of translated content for one language.
#[derive(Clone, Debug)]
pub struct LocaleFragment {
    /// Author-assigned fragment id.
    pub id: String,
    /// Language tag, e.g. `"en"` or `"tr"`.
    pub language: String,
    /// Nested string tree.
    pub data: LocaleNode,
}

/// Localized command metadata: name words, description, options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandLocalization {
    /// Word-by-word name mapping (`"user" -> "kullanıcı"`).
    #[serde(default)]
    pub names: HashMap<String, String>,
    /// Localized description.
    #[serde(default)]
    pub description: Option<String>,
    /// Per-option localization, keyed by option name.
    #[serde(default)]
    pub options: HashMap<String, OptionLocalization>,
}

/// Localization of one command option.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionLocalization {
    /// Localized option name.
    #[serde(default)]
    pub name: Option<String>,
    /// Localized option description.
    #[serde(default)]
    pub description: Option<String>,
    /// Localized choice labels, keyed by canonical choice name.
    #[serde(default)]
    pub choices: HashMap<String, String>,
}

/// One unit of interaction metadata for one language.
#[derive(Clone, Debug)]
pub struct InteractionLocaleFragment {
    /// Author-assigned fragment id.
    pub id: String,
    /// Language tag.
    pub language: String,
    /// Per-command-id localization records.
    pub commands: HashMap<String, CommandLocalization>,
}

struct StoreState {
    next_seq: u64,
    content: Vec<(u64, LocaleFragment)>,
    interaction: Vec<(u64, InteractionLocaleFragment)>,
    merged_content: HashMap<String, LocaleNode>,
    merged_interaction: HashMap<String, HashMap<String, CommandLocalization>>,
}

impl StoreState {
    /// Recomputes the merged content view for one language only.
    fn rebuild_content(&mut self, language: &str) {
        let mut merged = LocaleNode::empty();
        for (_, fragment) in &self.content {
            if fragment.language == language {
                merged.fill_missing_from(&fragment.data);
            }
        }
        if merged.is_empty() {
            self.merged_content.remove(language);
        } else {
            self.merged_content.insert(language.to_string(), merged);
        }
    }

    /// Recomputes the merged interaction view for one language only.
    ///
    /// Last-registered wins per command id, so later fragments simply
    /// overwrite in registration order.
    fn rebuild_interaction(&mut self, language: &str) {
        let mut merged: HashMap<String, CommandLocalization> = HashMap::new();
        for (_, fragment) in &self.interaction {
            if fragment.language == language {
                for (command_id, localization) in &fragment.commands {
                    merged.insert(command_id.clone(), localization.clone());
                }
            }
        }
        if merged.is_empty() {
            self.merged_interaction.remove(language);
        } else {
            self.merged_interaction.insert(language.to_string(), merged);
        }
    }
}

/// Stores locale fragments and their merged per-language views.
///
/// Clones share the same underlying store.
#[derive(Clone)]
pub struct LocaleStore {
    state: Arc<RwLock<StoreState>>,
}

impl Default for LocaleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocaleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState {
                next_seq: 0,
                content: Vec::new(),
                interaction: Vec::new(),
                merged_content: HashMap::new(),
                merged_interaction: HashMap::new(),
            })),
        }
    }

    /// Registers a content fragment.
    ///
    /// The returned disposer removes exactly this fragment and recomputes
    /// the merged view for its language only.
    pub fn add_fragment(&self, fragment: LocaleFragment) -> Disposer {
        let language = fragment.language.clone();
        let seq = {
            let mut state = self.state.write();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.content.push((seq, fragment));
            state.rebuild_content(&language);
            seq
        };

        let state = Arc::clone(&self.state);
        Disposer::new(move || {
            let mut state = state.write();
            state.content.retain(|(s, _)| *s != seq);
            state.rebuild_content(&language);
        })
    }

    /// Registers an interaction fragment.
    pub fn add_interaction_fragment(&self, fragment: InteractionLocaleFragment) -> Disposer {
        let language = fragment.language.clone();
        let seq = {
            let mut state = self.state.write();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.interaction.push((seq, fragment));
            state.rebuild_interaction(&language);
            seq
        };

        let state = Arc::clone(&self.state);
        Disposer::new(move || {
            let mut state = state.write();
            state.interaction.retain(|(s, _)| *s != seq);
            state.rebuild_interaction(&language);
        })
    }

    /// Merged content tree for one language.
    pub fn content(&self, language: &str) -> Option<LocaleNode> {
        self.state.read().merged_content.get(language).cloned()
    }

    /// Merged interaction records for one language.
    pub fn interaction(&self, language: &str) -> Option<HashMap<String, CommandLocalization>> {
        self.state.read().merged_interaction.get(language).cloned()
    }

    /// Every language with at least one merged view.
    pub fn languages(&self) -> Vec<String> {
        let state = self.state.read();
        let mut languages: Vec<String> = state
            .merged_content
            .keys()
            .chain(state.merged_interaction.keys())
            .cloned()
            .collect();
        languages.sort();
        languages.dedup();
        languages
    }

    /// Removes every fragment and merged view.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.content.clear();
        state.interaction.clear();
        state.merged_content.clear();
        state.merged_interaction.clear();
    }
}

impl std::fmt::Debug for LocaleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("LocaleStore")
            .field("content_fragments", &state.content.len())
            .field("interaction_fragments", &state.interaction.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fragment(id: &str, language: &str, data: serde_json::Value) -> LocaleFragment {
        LocaleFragment {
            id: id.to_string(),
            language: language.to_string(),
            data: LocaleNode::from_json(id, &data).unwrap(),
        }
    }

    #[test]
    fn test_content_merge_first_wins() {
        let store = LocaleStore::new();
        store.add_fragment(fragment("a", "en", json!({"x": {"y": "1"}})));
        store.add_fragment(fragment("b", "en", json!({"x": {"y": "2", "z": "3"}})));

        let merged = store.content("en").unwrap();
        assert_eq!(merged.at("x.y").unwrap().text().unwrap().as_str(), "1");
        assert_eq!(merged.at("x.z").unwrap().text().unwrap().as_str(), "3");
    }

    #[test]
    fn test_dispose_recomputes_only_that_language() {
        let store = LocaleStore::new();
        let en = store.add_fragment(fragment("a", "en", json!({"x": "1"})));
        store.add_fragment(fragment("b", "en", json!({"x": "2", "y": "2"})));
        store.add_fragment(fragment("c", "tr", json!({"x": "tr"})));

        en.dispose();

        // The later "en" fragment now provides the only values.
        let merged = store.content("en").unwrap();
        assert_eq!(merged.at("x").unwrap().text().unwrap().as_str(), "2");
        // The other language is untouched.
        let tr = store.content("tr").unwrap();
        assert_eq!(tr.at("x").unwrap().text().unwrap().as_str(), "tr");
    }

    #[test]
    fn test_dispose_last_fragment_drops_language() {
        let store = LocaleStore::new();
        let d = store.add_fragment(fragment("a", "en", json!({"x": "1"})));
        d.dispose();
        assert!(store.content("en").is_none());
        assert!(store.languages().is_empty());
    }

    #[test]
    fn test_interaction_merge_last_wins() {
        let store = LocaleStore::new();
        let first = CommandLocalization {
            description: Some("first".to_string()),
            ..Default::default()
        };
        let second = CommandLocalization {
            description: Some("second".to_string()),
            ..Default::default()
        };

        store.add_interaction_fragment(InteractionLocaleFragment {
            id: "a".to_string(),
            language: "en".to_string(),
            commands: HashMap::from([("cmd".to_string(), first)]),
        });
        store.add_interaction_fragment(InteractionLocaleFragment {
            id: "b".to_string(),
            language: "en".to_string(),
            commands: HashMap::from([("cmd".to_string(), second.clone())]),
        });

        let merged = store.interaction("en").unwrap();
        assert_eq!(merged["cmd"], second);
    }

    #[test]
    fn test_languages_lists_both_kinds() {
        let store = LocaleStore::new();
        store.add_fragment(fragment("a", "en", json!({"x": "1"})));
        store.add_interaction_fragment(InteractionLocaleFragment {
            id: "b".to_string(),
            language: "tr".to_string(),
            commands: HashMap::from([("cmd".to_string(), CommandLocalization::default())]),
        });

        assert_eq!(store.languages(), vec!["en", "tr"]);
    }
}
