//! Annotation maps.
//!
//! Contracts and methods carry a flat `key -> string` map parsed from doc
//! comment lines that start with the [`MARKER`]:
//!
//! ```text
//! /// Item storage service.
//! /// @tg http-server log
//! /// @tg http-prefix=api/v1 summary="Item storage"
//! /// @tg 404=shop::errors:NotFound
//! ```
//!
//! Bare keys are stored as `"true"`. Later lines override earlier ones.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Annotation marker recognised at the start of a doc comment line.
pub const MARKER: &str = "@tg";

/// Flat annotation map with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, or `default` when the key is absent.
    pub fn value(&self, key: &str, default: &str) -> String {
        self.0
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// True when the key is present with a truthy value.
    pub fn is_set(&self, key: &str) -> bool {
        self.0
            .get(key)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
            .unwrap_or(false)
    }

    /// Entries under `prefix.`, with the prefix stripped.
    pub fn sub(&self, prefix: &str) -> Tags {
        let dotted = format!("{}.", prefix);
        Tags(
            self.0
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix(&dotted)
                        .map(|rest| (rest.to_string(), v.clone()))
                })
                .collect(),
        )
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Copy entries from `other`, overriding existing keys.
    pub fn merge(&mut self, other: &Tags) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// A copy of `base` with `self` layered on top.
    pub fn layered_over(&self, base: &Tags) -> Tags {
        let mut out = base.clone();
        out.merge(self);
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, String)> for Tags {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Tags(iter.into_iter().collect())
    }
}

/// Doc comment lines split into free text and annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocs {
    pub docs: Vec<String>,
    pub tags: Tags,
}

/// Split doc comment lines into plain documentation and `@tg` annotations.
pub fn parse_doc_lines<S: AsRef<str>>(lines: &[S]) -> ParsedDocs {
    let mut parsed = ParsedDocs::default();
    for line in lines {
        match annotation_rest(line.as_ref()) {
            Some(rest) => parse_annotation_line(rest, &mut parsed.tags),
            None => parsed.docs.push(line.as_ref().to_string()),
        }
    }
    while parsed.docs.last().is_some_and(|l| l.trim().is_empty()) {
        parsed.docs.pop();
    }
    parsed
}

/// Returns true if any of the lines carries the annotation marker.
pub fn has_marker<S: AsRef<str>>(lines: &[S]) -> bool {
    lines.iter().any(|l| annotation_rest(l.as_ref()).is_some())
}

/// Text after the marker when `line` is an annotation line. The marker must
/// stand alone or be followed by whitespace.
fn annotation_rest(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix(MARKER)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
}

fn parse_annotation_line(rest: &str, tags: &mut Tags) {
    let mut chars = rest.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }

        if chars.peek() != Some(&'=') {
            tags.set(key, "true");
            continue;
        }
        chars.next();

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut escaped = false;
            for c in chars.by_ref() {
                match c {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => break,
                    _ => {
                        escaped = false;
                        value.push(c);
                    }
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        if !key.is_empty() {
            tags.set(key, value);
        }
    }
}
