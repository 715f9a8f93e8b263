//! Locale fragment loading from files.
//!
//! JSON documents are always supported; YAML requires the `yaml-locale`
//! feature. A `$`-rooted selector can pick a subtree of the document, so
//! several fragments may share one file:
//!
//! ```rust,ignore
//! let fragment = locale_files::read_fragment(
//!     Path::new("locales/en.json"),
//!     "greetings",
//!     "en",
//!     Some("$.greetings"),
//! )?;
//! pack.mount(fragment)?;
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use trellis_core::error::{LocaleError, LocaleResult};
use trellis_core::locale::{
    self, CommandLocalization, InteractionLocaleFragment, LocaleFragment, LocaleNode,
};

/// Reads and parses a locale document, dispatching on file extension.
pub fn read_document(path: &Path) -> LocaleResult<Value> {
    let display = path.display().to_string();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let text = match ext {
        "json" => std::fs::read_to_string(path),
        #[cfg(feature = "yaml-locale")]
        "yaml" | "yml" => std::fs::read_to_string(path),
        _ => {
            return Err(LocaleError::UnsupportedFormat { path: display });
        }
    }
    .map_err(|_| LocaleError::MissingPath {
        path: display.clone(),
    })?;

    match ext {
        "json" => serde_json::from_str(&text).map_err(|e| LocaleError::InvalidData {
            path: display,
            reason: e.to_string(),
        }),
        #[cfg(feature = "yaml-locale")]
        "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| LocaleError::InvalidData {
            path: display,
            reason: e.to_string(),
        }),
        _ => unreachable!("extension already checked"),
    }
}

/// Applies an optional `$`-rooted selector to a document.
fn select<'a>(document: &'a Value, selector: Option<&str>) -> LocaleResult<&'a Value> {
    match selector {
        Some(selector) => locale::extract_required(document, selector),
        None => Ok(document),
    }
}

/// Reads a content locale fragment from a file.
pub fn read_fragment(
    path: &Path,
    id: &str,
    language: &str,
    selector: Option<&str>,
) -> LocaleResult<LocaleFragment> {
    let document = read_document(path)?;
    let subtree = select(&document, selector)?;
    let data = LocaleNode::from_json(&path.display().to_string(), subtree)?;
    debug!(id, language, path = %path.display(), "locale fragment loaded");
    Ok(LocaleFragment {
        id: id.to_string(),
        language: language.to_string(),
        data,
    })
}

/// Reads an interaction locale fragment from a file.
///
/// The selected subtree must deserialize to a map of command id to
/// localization record.
pub fn read_interaction_fragment(
    path: &Path,
    id: &str,
    language: &str,
    selector: Option<&str>,
) -> LocaleResult<InteractionLocaleFragment> {
    let document = read_document(path)?;
    let subtree = select(&document, selector)?;
    let commands: HashMap<String, CommandLocalization> =
        serde_json::from_value(subtree.clone()).map_err(|e| LocaleError::InvalidData {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    Ok(InteractionLocaleFragment {
        id: id.to_string(),
        language: language.to_string(),
        commands,
    })
}

/// Reads a content fragment from a file and mounts it on a pack.
///
/// The returned disposer removes exactly that fragment again.
pub fn mount_fragment(
    pack: &trellis_framework::pack::Pack,
    path: &Path,
    id: &str,
    language: &str,
    selector: Option<&str>,
) -> crate::error::RuntimeResult<trellis_core::Disposer> {
    let fragment = read_fragment(path, id, language, selector)?;
    Ok(pack.mount(fragment)?)
}

/// Reads an interaction fragment from a file and mounts it on a pack.
pub fn mount_interaction_fragment(
    pack: &trellis_framework::pack::Pack,
    path: &Path,
    id: &str,
    language: &str,
    selector: Option<&str>,
) -> crate::error::RuntimeResult<trellis_core::Disposer> {
    let fragment = read_interaction_fragment(path, id, language, selector)?;
    Ok(pack.mount(fragment)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("trellis-test-{name}"));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read_json_fragment() {
        let path = temp_file(
            "strings.json",
            r#"{"locales": {"greet": "hello {0}"}}"#,
        );
        let fragment = read_fragment(&path, "strings", "en", Some("$.locales")).unwrap();
        assert_eq!(
            fragment.data.at("greet").unwrap().text().unwrap().as_str(),
            "hello {0}"
        );
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_unsupported_extension() {
        let err = read_document(Path::new("strings.ini")).unwrap_err();
        assert!(matches!(err, LocaleError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = read_document(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, LocaleError::MissingPath { .. }));
    }

    #[test]
    fn test_selector_miss() {
        let path = temp_file("miss.json", r#"{"a": "b"}"#);
        let err = read_fragment(&path, "x", "en", Some("$.nope")).unwrap_err();
        assert!(matches!(err, LocaleError::SelectorMiss { .. }));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_read_interaction_fragment() {
        let path = temp_file(
            "commands.json",
            r#"{"cmd": {"names": {"user": "kullanıcı"}, "description": "açıklama"}}"#,
        );
        let fragment = read_interaction_fragment(&path, "cmds", "tr", None).unwrap();
        let record = &fragment.commands["cmd"];
        assert_eq!(record.names["user"], "kullanıcı");
        assert_eq!(record.description.as_deref(), Some("açıklama"));
        std::fs::remove_file(path).ok();
    }
}
