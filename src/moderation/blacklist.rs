//! Blacklist pattern compilation and message matching.
//!
//! Pattern grammar, one entry per config line:
//! - `/.../` is a regular expression,
//! - entries containing `*` or `?` are glob-style wildcards (`*` matches any
//!   run, `?` a single character, everything else literal),
//! - `"..."` is a case-sensitive substring,
//! - anything else is a case-insensitive substring.
//!
//! Patterns compile once at startup. Invalid regexes are logged and skipped;
//! a bad pattern never takes the bot down.

use regex::Regex;
use tracing::warn;

/// A single compiled blacklist pattern.
#[derive(Debug)]
enum Pattern {
    /// Explicit regex or compiled wildcard.
    Regex(Regex),
    /// Case-sensitive substring.
    Exact(String),
    /// Case-insensitive substring (stored lowercased).
    Substring(String),
}

impl Pattern {
    fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Regex(re) => re.is_match(text),
            Pattern::Exact(needle) => text.contains(needle.as_str()),
            Pattern::Substring(needle) => text.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Compiled content blacklist.
#[derive(Debug, Default)]
pub struct Blacklist {
    patterns: Vec<Pattern>,
}

impl Blacklist {
    /// Compile raw config entries, skipping invalid or empty ones.
    pub fn compile(raw: &[String]) -> Self {
        let mut patterns = Vec::new();
        for entry in raw {
            match compile_entry(entry) {
                Some(pattern) => patterns.push(pattern),
                None => warn!(pattern = %entry, "skipping unusable blacklist pattern"),
            }
        }
        Self { patterns }
    }

    /// Whether `text` matches any blacklist entry.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(text))
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn compile_entry(raw: &str) -> Option<Pattern> {
    if raw.is_empty() {
        return None;
    }

    if let Some(inner) = raw.strip_prefix('/').and_then(|s| s.strip_suffix('/')) {
        if inner.is_empty() {
            return None;
        }
        return Regex::new(inner).ok().map(Pattern::Regex);
    }

    if raw.contains('*') || raw.contains('?') {
        return compile_wildcard(raw).map(Pattern::Regex);
    }

    if let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        if inner.is_empty() {
            return None;
        }
        return Some(Pattern::Exact(inner.to_string()));
    }

    Some(Pattern::Substring(raw.to_lowercase()))
}

/// Translate a glob-style entry into a regex, escaping everything else.
fn compile_wildcard(raw: &str) -> Option<Regex> {
    let mut pattern = String::new();
    for ch in raw.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    Regex::new(&pattern).ok()
}
