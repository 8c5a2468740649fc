//! Rules deciding which candidates a worker does not probe.

use crate::types::UrlRecord;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Consecutive identical failures after which a path is suppressed.
pub const FAILURE_WINDOW: usize = 3;

/// Why a candidate was not probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Pattern,
    Extension,
    RepeatedFailure,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pattern => "skip pattern",
            Self::Extension => "excluded extension",
            Self::RepeatedFailure => "repeated failure on path",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shell-style glob (`*` any run, `?` one character) matched against URL paths.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::with_capacity(pattern.len() * 2 + 2);
        expr.push('^');
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                c => expr.push_str(&regex::escape(&c.to_string())),
            }
        }
        expr.push('$');

        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&expr)?,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Static skip rules shared (read-only) by all workers.
#[derive(Debug, Clone, Default)]
pub struct SkipRules {
    patterns: Vec<GlobPattern>,
    excluded_extensions: HashSet<String>,
}

impl SkipRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add glob patterns matched against the URL path.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if !pattern.is_empty() {
                self.patterns.push(GlobPattern::new(pattern)?);
            }
        }
        Ok(self)
    }

    /// Exclude file extensions (case-insensitive, leading dot optional).
    pub fn with_excluded_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_extensions.extend(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty()),
        );
        self
    }

    /// Check the static rules for one record.
    pub fn check(&self, record: &UrlRecord) -> Option<SkipReason> {
        let path = record.url().path();
        if self.patterns.iter().any(|p| p.is_match(path)) {
            return Some(SkipReason::Pattern);
        }

        if let Some(ext) = record.extension() {
            if self.excluded_extensions.contains(&ext) {
                return Some(SkipReason::Extension);
            }
        }

        None
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.excluded_extensions.is_empty()
    }
}

/// Tracks recent outcomes per (common prefix, path) within one worker.
///
/// Once the last [`FAILURE_WINDOW`] outcomes for a key are the same
/// non-alive label, further URLs with that key are suppressed.
#[derive(Debug, Default)]
pub struct FailureTracker {
    recent: HashMap<(String, String), VecDeque<&'static str>>,
    suppressed: HashSet<(String, String)>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(record: &UrlRecord) -> (String, String) {
        (record.common_prefix(), record.path_without_query())
    }

    pub fn is_suppressed(&self, record: &UrlRecord) -> bool {
        !self.suppressed.is_empty() && self.suppressed.contains(&Self::key(record))
    }

    /// Record the outcome label of a probe.
    pub fn observe(&mut self, record: &UrlRecord, label: &'static str, alive: bool) {
        let key = Self::key(record);
        let window = self.recent.entry(key.clone()).or_default();
        if window.len() == FAILURE_WINDOW {
            window.pop_front();
        }
        window.push_back(label);

        if !alive && window.len() == FAILURE_WINDOW && window.iter().all(|l| *l == label) {
            tracing::debug!(prefix = %key.0, path = %key.1, label, "suppressing path after repeated outcome");
            self.suppressed.insert(key);
        }
    }

    pub fn suppressed_count(&self) -> usize {
        self.suppressed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> UrlRecord {
        UrlRecord::parse(url).unwrap()
    }

    #[test]
    fn test_glob_pattern() {
        let glob = GlobPattern::new("*/tag/*").unwrap();
        assert!(glob.is_match("/blog/tag/rust"));
        assert!(!glob.is_match("/blog/tags"));

        let glob = GlobPattern::new("/v?/users").unwrap();
        assert!(glob.is_match("/v1/users"));
        assert!(!glob.is_match("/v10/users"));
    }

    #[test]
    fn test_glob_escapes_regex_characters() {
        let glob = GlobPattern::new("/a.b/*").unwrap();
        assert!(glob.is_match("/a.b/c"));
        assert!(!glob.is_match("/axb/c"));
    }

    #[test]
    fn test_skip_rules() {
        let rules = SkipRules::new()
            .with_patterns(["*/id/*"])
            .unwrap()
            .with_excluded_extensions([".PNG", "css"]);

        assert_eq!(rules.check(&record("https://x.test/id/42")), Some(SkipReason::Pattern));
        assert_eq!(
            rules.check(&record("https://x.test/logo.png?v=2")),
            Some(SkipReason::Extension)
        );
        assert_eq!(rules.check(&record("https://x.test/login")), None);
        assert!(SkipRules::new().is_empty());
    }

    #[test]
    fn test_tracker_suppresses_after_three_identical_failures() {
        let mut tracker = FailureTracker::new();
        for q in 1..=3 {
            let r = record(&format!("https://x.test/a/item?id={q}"));
            assert!(!tracker.is_suppressed(&r));
            tracker.observe(&r, "SOFT_NOT_FOUND", false);
        }
        assert!(tracker.is_suppressed(&record("https://x.test/a/item?id=9")));
        assert!(!tracker.is_suppressed(&record("https://x.test/a/other")));
        assert_eq!(tracker.suppressed_count(), 1);
    }

    #[test]
    fn test_tracker_ignores_mixed_or_alive_outcomes() {
        let mut tracker = FailureTracker::new();
        let r = record("https://x.test/b/page");
        tracker.observe(&r, "UNKNOWN", false);
        tracker.observe(&r, "SOFT_NOT_FOUND", false);
        tracker.observe(&r, "UNKNOWN", false);
        assert!(!tracker.is_suppressed(&r));

        for _ in 0..3 {
            tracker.observe(&r, "ALIVE", true);
        }
        assert!(!tracker.is_suppressed(&r));
    }
}
