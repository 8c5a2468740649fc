//! Soft-404 keyword list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Keywords used when no list is configured.
pub const DEFAULT_NOT_FOUND_KEYWORDS: &[&str] = &["404", "not found", "tidak ditemukan"];

/// A normalized, case-insensitive set of "not found" keywords.
///
/// Keywords are trimmed and lower-cased on construction, empty entries are
/// dropped (an empty keyword would match every title) and duplicates are
/// removed while keeping the first occurrence's position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct KeywordSet {
    keywords: Vec<String>,
}

/// Error type for keyword list parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeywordError {
    #[error("keyword list is empty")]
    Empty,
}

impl KeywordSet {
    /// Build a keyword set from any list of strings.
    pub fn new<I, S>(keywords: I) -> Result<Self, KeywordError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !normalized.contains(&keyword) {
                normalized.push(keyword);
            }
        }

        if normalized.is_empty() {
            return Err(KeywordError::Empty);
        }

        Ok(Self {
            keywords: normalized,
        })
    }

    /// Return the first keyword contained in `text`, compared case-insensitively.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        if text.is_empty() {
            return None;
        }
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .find(|k| text.contains(k.as_str()))
            .map(String::as_str)
    }

    /// Iterate over the normalized keywords.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl Default for KeywordSet {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_NOT_FOUND_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl FromStr for KeywordSet {
    type Err = KeywordError;

    /// Parse a comma-separated list such as `404,not found,tidak ditemukan`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split(','))
    }
}

impl fmt::Display for KeywordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keywords.join(","))
    }
}

impl TryFrom<Vec<String>> for KeywordSet {
    type Error = KeywordError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeywordSet> for Vec<String> {
    fn from(set: KeywordSet) -> Self {
        set.keywords
    }
}
