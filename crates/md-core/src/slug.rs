//! Heading slugification (spec §4.1).
//!
//! Grounded on `blz-core`'s `heading::normalize_for_search`: NFKD-normalize,
//! drop combining marks, lowercase, and filter to a known-safe character
//! set — the same shape, retargeted from a search-token normalizer to a
//! URI-fragment slug generator. The behavior differs in one important way:
//! a slug is *produced only by this module* (spec §3 invariant), so unlike
//! `normalize_for_search` it never collapses runs into a single separator
//! mid-string without also tracking duplicate-heading collisions, which is
//! what [`SlugBuilder`] is for.

use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// A canonical heading anchor. Produced only by [`from_heading`] or
/// [`SlugBuilder::add`]; equality is byte-equal comparison of the inner
/// string (spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slug {
    value: String,
}

impl Slug {
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    fn from_raw(value: String) -> Self {
        Self { value }
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// CJK punctuation stripped alongside ASCII punctuation (spec §4.1: "a
/// specified CJK set"). See DESIGN.md for why this particular range was
/// chosen — it is an Open Question the spec leaves to the implementation.
fn is_stripped_cjk_punctuation(c: char) -> bool {
    matches!(c as u32,
        0x3000..=0x303F // CJK Symbols and Punctuation
        | 0xFF00..=0xFF0F
        | 0xFF1A..=0xFF20
        | 0xFF3B..=0xFF40
        | 0xFF5B..=0xFF65 // Fullwidth ASCII variants
    )
}

fn is_stripped_ascii_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() && c != '-' && c != '_'
}

/// Produce a slug from raw heading text, independent of any other heading
/// in the document. For deduplicating slugs across a document, use
/// [`SlugBuilder`] instead.
#[must_use]
pub fn from_heading(text: &str) -> Slug {
    Slug::from_raw(slugify(text))
}

fn slugify(text: &str) -> String {
    let trimmed = text.trim();

    // Fold case first (Unicode-aware) before normalizing, so that e.g. a
    // capital letter with a combining mark still lowercases correctly.
    let lowered: String = trimmed.chars().flat_map(char::to_lowercase).collect();

    let mut stripped = String::with_capacity(lowered.len());
    for c in lowered.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if is_stripped_ascii_punctuation(c) || is_stripped_cjk_punctuation(c) {
            continue;
        }
        stripped.push(c);
    }

    // Collapse whitespace runs to a single '-'.
    let mut collapsed = String::with_capacity(stripped.len());
    let mut in_space = false;
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !in_space {
                collapsed.push('-');
                in_space = true;
            }
        } else {
            collapsed.push(c);
            in_space = false;
        }
    }

    let collapsed = collapsed.trim_matches('-');

    percent_encode_slug(collapsed)
}

fn percent_encode_slug(s: &str) -> String {
    use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

    // Unreserved per RFC 3986 plus `-`/`_`/`.`/`~`, which slugs already
    // rely on; everything else (including remaining Unicode letters from
    // non-Latin scripts) is percent-encoded for URI safety.
    const SLUG_ENCODE_SET: &AsciiSet = &CONTROLS
        .add(b' ')
        .add(b'"')
        .add(b'#')
        .add(b'%')
        .add(b'<')
        .add(b'>')
        .add(b'[')
        .add(b'\\')
        .add(b']')
        .add(b'^')
        .add(b'`')
        .add(b'{')
        .add(b'|')
        .add(b'}');

    utf8_percent_encode(s, SLUG_ENCODE_SET).to_string()
}

/// Tracks previously produced slugs within a single document so that
/// duplicate heading text gets `x`, `x-1`, `x-2`, … suffixes in source
/// order (spec §3 invariant).
#[derive(Debug, Default)]
pub struct SlugBuilder {
    seen: HashMap<String, u32>,
}

impl SlugBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a heading's text and return its (possibly suffixed) slug.
    pub fn add(&mut self, text: &str) -> Slug {
        let base = slugify(text);
        let count = self.seen.entry(base.clone()).or_insert(0);
        let value = if *count == 0 {
            base.clone()
        } else {
            format!("{base}-{count}")
        };
        *count += 1;
        Slug::from_raw(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_slug() {
        assert_eq!(from_heading("Hello World").value(), "hello-world");
    }

    #[test]
    fn strips_punctuation_and_collapses_whitespace() {
        assert_eq!(from_heading("  Foo,   Bar!  ").value(), "foo-bar");
    }

    #[test]
    fn keeps_hyphens_and_underscores() {
        assert_eq!(from_heading("snake_case-thing").value(), "snake_case-thing");
    }

    #[test]
    fn duplicate_headings_get_numeric_suffixes() {
        let mut b = SlugBuilder::new();
        assert_eq!(b.add("a").value(), "a");
        assert_eq!(b.add("a").value(), "a-1");
        assert_eq!(b.add("a").value(), "a-2");
    }

    #[test]
    fn unicode_is_lowercased_and_encoded() {
        let s = from_heading("Café");
        assert!(!s.value().contains(char::is_uppercase));
    }
}
