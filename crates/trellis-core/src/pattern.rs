//! Command-name pattern grammar.
//!
//! A pattern is a whitespace-separated list of tokens. Each token is either a
//! literal word, an alternation group `(a|b|c)` contributing exactly one of
//! its options per combination, or an optional group `(word)?` contributing
//! the word or nothing. [`expand`] produces every literal combination; the
//! caller decides what to do with an empty result.

use crate::error::{RegistryError, RegistryResult};

/// Platform limit: words per command name.
pub const MAX_WORDS: usize = 3;

/// Platform limit: characters per word.
pub const MAX_WORD_LEN: usize = 32;

/// One parsed token: the branches it contributes to the product.
///
/// `None` marks the absent branch of an optional group.
fn token_branches(token: &str) -> Vec<Option<&str>> {
    let (body, optional) = match token.strip_suffix('?') {
        Some(rest) => (rest, true),
        None => (token, false),
    };

    let inner = body
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'));

    let mut branches: Vec<Option<&str>> = match inner {
        Some(inner) => {
            let options: Vec<&str> = inner.split('|').collect();
            if options.iter().any(|o| o.is_empty()) {
                // Malformed group such as `()` or `(a|)`: contributes no
                // branches, which collapses the whole product to zero.
                return Vec::new();
            }
            options.into_iter().map(Some).collect()
        }
        // A bare `word?` is not optional syntax; treat the token literally.
        None => vec![Some(token)],
    };

    if optional && inner.is_some() {
        branches.push(None);
    }
    branches
}

/// Expands a pattern into every literal combination.
///
/// Combinations are emitted in a stable order: lexicographic over the choice
/// indices of each group, left to right. Absent optional tokens are simply
/// omitted from the joined output. Duplicate combinations (e.g. from
/// `(a|a)`) are removed, keeping the first occurrence.
///
/// A pattern with no group syntax expands to exactly itself. An empty or
/// malformed pattern expands to zero combinations; reporting that is the
/// caller's job.
pub fn expand(pattern: &str) -> Vec<String> {
    let tokens: Vec<&str> = pattern.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut combos: Vec<Vec<&str>> = vec![Vec::new()];
    for token in tokens {
        let branches = token_branches(token);
        if branches.is_empty() {
            return Vec::new();
        }
        let mut next = Vec::with_capacity(combos.len() * branches.len());
        for combo in &combos {
            for branch in &branches {
                let mut words = combo.clone();
                if let Some(word) = branch {
                    words.push(word);
                }
                next.push(words);
            }
        }
        combos = next;
    }

    let mut seen = std::collections::HashSet::new();
    combos
        .into_iter()
        .map(|words| words.join(" "))
        .filter(|combo| seen.insert(combo.clone()))
        .collect()
}

/// Checks every combination against the platform naming limits.
///
/// Returns the first violation as a distinct error variant so callers can
/// branch on it. An empty combination list is reported as
/// [`RegistryError::EmptyPattern`].
pub fn validate(pattern: &str, combinations: &[String]) -> RegistryResult<()> {
    if combinations.is_empty() {
        return Err(RegistryError::EmptyPattern {
            pattern: pattern.to_string(),
        });
    }

    for combination in combinations {
        let words: Vec<&str> = combination.split(' ').collect();
        if words.len() > MAX_WORDS {
            return Err(RegistryError::TooManyWords {
                combination: combination.clone(),
                words: words.len(),
                limit: MAX_WORDS,
            });
        }
        for word in words {
            let len = word.chars().count();
            if len > MAX_WORD_LEN {
                return Err(RegistryError::WordTooLong {
                    combination: combination.clone(),
                    word: word.to_string(),
                    len,
                    limit: MAX_WORD_LEN,
                });
            }
        }
    }
    Ok(())
}
