//! Table of contents construction (spec §4.7, C7).
//!
//! Grounded on `blz-core/src/parser.rs`'s `extract_headings`/`add_to_toc`
//! (walk a flat token/heading stream, track a level stack, build entries as
//! you go) adapted from `blz`'s nested `TocEntry.children` tree to the
//! spec's flat, source-ordered `Vec<TocEntry>` with explicit
//! `sectionRange`/`headerRange`/`headerTextRange` spans instead of a
//! `"start-end"` display string.

use crate::document::{Position, Range, TextDocument};
use crate::parser::{Token, TokenType};
use crate::slug::{Slug, SlugBuilder, from_heading};

/// One heading in a document's table of contents (spec §3 "TocEntry").
#[derive(Debug, Clone)]
pub struct TocEntry {
    pub slug: Slug,
    pub text: String,
    pub level: u8,
    pub line: u32,
    /// Spans from this header's line to the line before the next header of
    /// equal-or-lower level, or the end of the document.
    pub section_range: Range,
    /// The entire header line.
    pub header_range: Range,
    /// The span of the heading's text content within its line, excluding
    /// leading `#`s and any trailing closing `#`s.
    pub header_text_range: Range,
}

/// A document's table of contents, in source order.
#[derive(Debug, Clone, Default)]
pub struct Toc {
    entries: Vec<TocEntry>,
}

impl Toc {
    #[must_use]
    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a heading by URI fragment: the fragment is slugified and
    /// compared against each entry's slug, returning the first match in
    /// source order.
    #[must_use]
    pub fn lookup_by_fragment(&self, fragment: &str) -> Option<&TocEntry> {
        let query = from_heading(fragment);
        self.entries.iter().find(|e| e.slug == query)
    }

    /// The entry whose `line` exactly equals `line`, if any.
    #[must_use]
    pub fn entry_at_line(&self, line: u32) -> Option<&TocEntry> {
        self.entries.iter().find(|e| e.line == line)
    }

    /// Concatenate several documents' TOCs in order (spec §4.7:
    /// "containing document" TOC is the concatenation of its children's
    /// TOCs in child order).
    #[must_use]
    pub fn concat(tocs: impl IntoIterator<Item = Toc>) -> Self {
        let mut entries = Vec::new();
        for toc in tocs {
            entries.extend(toc.entries);
        }
        Self { entries }
    }
}

/// Build a document's table of contents from its token stream.
#[must_use]
pub fn build(tokens: &[Token], doc: &TextDocument) -> Toc {
    let mut builder = SlugBuilder::new();
    let mut raw_headings: Vec<(u8, u32, String)> = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].kind == TokenType::HeadingOpen {
            let level = level_from_markup(tokens[i].markup.as_deref());
            let line = tokens[i].map.map_or(0, |(start, _)| start);
            let text = tokens
                .get(i + 1)
                .filter(|t| t.kind == TokenType::Inline)
                .and_then(|t| t.children.as_ref())
                .map(|children| {
                    children
                        .iter()
                        .map(|c| c.content.as_str())
                        .collect::<String>()
                        .trim()
                        .to_string()
                })
                .unwrap_or_default();
            raw_headings.push((level, line, text));
        }
        i += 1;
    }

    let doc_end = Position::new(doc.line_count() as u32, 0);
    let mut entries = Vec::with_capacity(raw_headings.len());

    for (idx, (level, line, text)) in raw_headings.iter().enumerate() {
        let slug = builder.add(text);
        let header_range = Range::whole_line(*line);
        let header_text_range = header_text_range(doc, *line);

        let section_end = raw_headings[idx + 1..]
            .iter()
            .find(|(other_level, _, _)| *other_level <= *level)
            .map_or(doc_end, |(_, other_line, _)| Position::new(*other_line, 0));

        entries.push(TocEntry {
            slug,
            text: text.clone(),
            level: *level,
            line: *line,
            section_range: Range::new(Position::new(*line, 0), section_end),
            header_range,
            header_text_range,
        });
    }

    Toc { entries }
}

fn level_from_markup(markup: Option<&str>) -> u8 {
    match markup {
        Some("=") => 1,
        Some("-") => 2,
        Some(hashes) => hashes.len().clamp(1, 6) as u8,
        None => 1,
    }
}

fn header_text_range(doc: &TextDocument, line: u32) -> Range {
    let Some(text) = doc.get_line(line as usize) else {
        return Range::whole_line(line);
    };

    if let Some(rest) = text.trim_start().strip_prefix('#') {
        // ATX: find where the markup+whitespace ends and where an
        // optional closing markup+whitespace begins.
        let hashes_len = text.chars().take_while(|&c| c == '#').count();
        let after_hashes = &text[hashes_len..];
        let ws_len = after_hashes.chars().take_while(|c| c.is_whitespace()).count();
        let content_start = hashes_len + ws_len;

        let content = &text[content_start..];
        let trimmed_end_ws = content.trim_end();
        let without_close = trimmed_end_ws.trim_end_matches('#');
        let content_end = if without_close.len() != trimmed_end_ws.len()
            && (without_close.is_empty() || without_close.ends_with(char::is_whitespace))
        {
            content_start + without_close.trim_end().chars().count()
        } else {
            content_start + trimmed_end_ws.chars().count()
        };

        let _ = rest;
        Range::new(
            Position::new(line, content_start as u32),
            Position::new(line, content_end as u32),
        )
    } else {
        // Setext: the whole trimmed line.
        let trimmed_start = text.len() - text.trim_start().len();
        let trimmed_end = text.trim_end().chars().count();
        Range::new(
            Position::new(line, trimmed_start as u32),
            Position::new(line, trimmed_end as u32),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MarkdownParser;
    use crate::uri::Uri;

    fn build_toc(src: &str) -> Toc {
        let doc = TextDocument::new(Uri::parse("file:///t.md"), 1, src);
        let tokens = MarkdownParser::new().unwrap().tokenize(&doc).unwrap();
        build(&tokens, &doc)
    }

    #[test]
    fn duplicate_headings_get_suffixed_slugs() {
        let toc = build_toc("# a\n# a\n## a\n");
        let slugs: Vec<&str> = toc.entries().iter().map(|e| e.slug.value()).collect();
        assert_eq!(slugs, vec!["a", "a-1", "a-2"]);
    }

    #[test]
    fn section_range_ends_before_next_equal_or_lower_level() {
        let toc = build_toc("# A\ntext\n## B\nmore\n# C\n");
        let a = &toc.entries()[0];
        assert_eq!(a.section_range.end, Position::new(4, 0));
        let b = &toc.entries()[1];
        assert_eq!(b.section_range.end, Position::new(4, 0));
        let c = &toc.entries()[2];
        assert_eq!(c.section_range.end, Position::new(5, 0));
    }

    #[test]
    fn section_contains_header_contains_header_text() {
        let toc = build_toc("# Hello World\nbody\n");
        let e = &toc.entries()[0];
        assert!(e.section_range.contains_range(&e.header_range) || e.section_range == e.header_range.clone());
        assert!(e.header_range.contains_range(&e.header_text_range));
    }

    #[test]
    fn lookup_by_fragment_slugifies_query() {
        let toc = build_toc("# Getting Started\n");
        assert!(toc.lookup_by_fragment("Getting Started").is_some());
        assert!(toc.lookup_by_fragment("getting-started").is_some());
        assert!(toc.lookup_by_fragment("nope").is_none());
    }

    #[test]
    fn headings_inside_fenced_code_are_not_headings() {
        let toc = build_toc("```\n# not a heading\n```\n# real\n");
        assert_eq!(toc.entries().len(), 1);
        assert_eq!(toc.entries()[0].text, "real");
    }
}
