/*!
 * Glob-like key path patterns.
 *
 * Patterns are dot-separated segments matched against flat keys:
 * - a literal segment matches itself
 * - `*` matches exactly one segment and never crosses a dot; inside a
 *   segment (`btn_*`, `items[*]`) it matches any run of non-dot characters
 * - `**` matches the remaining segments, at least one of them
 *
 * Each pattern is classified and compiled once when it is parsed.
 */

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::errors::{Error, Result};

/// Wildcard shape of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// No wildcard: plain string equality
    Exact,
    /// Contains `*` somewhere other than a leading segment
    SingleWildcard,
    /// Contains `**`
    RecursiveWildcard,
    /// Starts with `*.` and has no `**`
    PositionalWildcard,
}

impl PatternKind {
    /// Derive the kind from the wildcard shape of a raw pattern
    pub fn classify(pattern: &str) -> Self {
        if pattern.contains("**") {
            PatternKind::RecursiveWildcard
        } else if pattern.starts_with("*.") {
            PatternKind::PositionalWildcard
        } else if pattern.contains('*') {
            PatternKind::SingleWildcard
        } else {
            PatternKind::Exact
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Compiled(Regex),
}

/// A compiled key pattern
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    kind: PatternKind,
    matcher: Matcher,
}

impl KeyPattern {
    /// Validate, classify and compile a single pattern
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::validation("Key pattern cannot be empty"));
        }

        let segments: Vec<&str> = raw.split('.').collect();
        for segment in &segments {
            if segment.is_empty() {
                return Err(Error::validation(format!(
                    "Invalid key pattern '{}': empty path segment",
                    raw
                ))
                .with_context("pattern", raw));
            }
            if segment.contains("**") && *segment != "**" {
                return Err(Error::validation(format!(
                    "Invalid key pattern '{}': '**' must be a whole segment",
                    raw
                ))
                .with_context("pattern", raw));
            }
        }

        let kind = PatternKind::classify(raw);
        let matcher = match kind {
            PatternKind::Exact => Matcher::Exact(raw.to_string()),
            PatternKind::SingleWildcard | PatternKind::PositionalWildcard => {
                let body: Vec<String> = segments.iter().map(|s| segment_regex(s)).collect();
                Matcher::Compiled(compile(raw, &format!("^{}$", body.join(r"\.")))?)
            }
            PatternKind::RecursiveWildcard => {
                let prefix: Vec<String> = segments
                    .iter()
                    .take_while(|s| **s != "**")
                    .map(|s| segment_regex(s))
                    .collect();
                let expression = if prefix.is_empty() {
                    "^.*$".to_string()
                } else {
                    format!(r"^{}\..+$", prefix.join(r"\."))
                };
                Matcher::Compiled(compile(raw, &expression)?)
            }
        };

        Ok(Self {
            raw: raw.to_string(),
            kind,
            matcher,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// Test a flat key against this pattern
    pub fn matches(&self, key: &str) -> bool {
        match &self.matcher {
            Matcher::Exact(expected) => expected == key,
            Matcher::Compiled(regex) => regex.is_match(key),
        }
    }
}

impl FromStr for KeyPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn segment_regex(segment: &str) -> String {
    if segment == "*" {
        return "[^.]+".to_string();
    }
    segment
        .split('*')
        .map(|part| regex::escape(part))
        .collect::<Vec<_>>()
        .join("[^.]*")
}

fn compile(raw: &str, expression: &str) -> Result<Regex> {
    Regex::new(expression).map_err(|e| {
        Error::validation(format!("Invalid key pattern '{}'", raw))
            .with_cause(e)
            .with_context("pattern", raw)
    })
}

/// Parse a comma-separated pattern list; blank entries are dropped
pub fn parse_patterns(csv: &str) -> Result<Vec<KeyPattern>> {
    csv.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(KeyPattern::parse)
        .collect()
}

/// Parse several pattern lists, each of which may itself be comma-separated
pub fn parse_pattern_list<S: AsRef<str>>(lists: &[S]) -> Result<Vec<KeyPattern>> {
    let mut patterns = Vec::new();
    for list in lists {
        patterns.extend(parse_patterns(list.as_ref())?);
    }
    Ok(patterns)
}

/// Whether any pattern matches the key
pub fn matches_any(patterns: &[KeyPattern], key: &str) -> bool {
    patterns.iter().any(|p| p.matches(key))
}
