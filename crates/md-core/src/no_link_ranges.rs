//! Regions where link extraction must be suppressed (spec §4.5).

use crate::document::{Position, Range, TextDocument};
use crate::parser::{Token, TokenType};

/// Multiline block intervals plus per-line inline-code-span ranges inside
/// which [`crate::link_extractor`] must not emit links.
#[derive(Debug, Clone, Default)]
pub struct NoLinkRanges {
    /// Half-open `[start_line, end_line)` row intervals from fenced/
    /// indented code blocks and HTML blocks.
    multiline: Vec<(u32, u32)>,
    /// Inline code-span ranges, keyed loosely by line via the range itself.
    inline: Vec<Range>,
}

impl NoLinkRanges {
    /// Derive no-link ranges from a token stream and the document's raw
    /// text (spec §4.5).
    #[must_use]
    pub fn compute(tokens: &[Token], doc: &TextDocument) -> Self {
        let mut multiline = Vec::new();
        for token in tokens {
            if matches!(
                token.kind,
                TokenType::Fence | TokenType::CodeBlock | TokenType::HtmlBlock
            ) {
                if let Some(map) = token.map {
                    multiline.push(map);
                }
            }
        }

        let mut inline = Vec::new();
        for line_no in 0..doc.line_count() {
            let Some(line) = doc.get_line(line_no) else {
                continue;
            };
            for (start, end) in find_code_spans(line) {
                inline.push(Range::new(
                    Position::new(line_no as u32, start),
                    Position::new(line_no as u32, end),
                ));
            }
        }

        Self { multiline, inline }
    }

    /// Whether `pos` falls inside a suppressed region.
    #[must_use]
    pub fn contains(&self, pos: Position) -> bool {
        if self
            .multiline
            .iter()
            .any(|&(start, end)| pos.line >= start && pos.line < end)
        {
            return true;
        }
        self.inline.iter().any(|r| r.contains(pos))
    }

    /// Return a copy of these ranges with `extra` inline ranges appended
    /// (spec §4.6: reference-link scanning augments inline ranges with the
    /// spans of inline links already emitted, so link text is not
    /// re-matched as a reference).
    #[must_use]
    pub fn concat(&self, extra: impl IntoIterator<Item = Range>) -> Self {
        let mut inline = self.inline.clone();
        inline.extend(extra);
        Self {
            multiline: self.multiline.clone(),
            inline,
        }
    }
}

/// Find CommonMark-consistent inline code spans on a single line.
///
/// A code span opens at a backtick run of length N and closes at the next
/// backtick run of exactly length N; un-matched runs are not spans. This
/// only handles single-line spans, since the consumers of this module
/// (link suppression within one line's text) never need spans that cross
/// lines — a backtick run left open at end of line simply does not close
/// on that line and is ignored, matching CommonMark's line-oriented
/// tokenization for the purposes of link suppression.
fn find_code_spans(line: &str) -> Vec<(u32, u32)> {
    let chars: Vec<char> = line.chars().collect();
    // `Position.character` counts UTF-16 code units (spec §3), so a char's
    // index into `chars` must be converted to its UTF-16 unit offset before
    // it becomes part of a `Range` — a non-BMP char before a span otherwise
    // throws every downstream offset off by one.
    let mut utf16_offsets = Vec::with_capacity(chars.len() + 1);
    let mut offset = 0u32;
    for &c in &chars {
        utf16_offsets.push(offset);
        offset += c.len_utf16() as u32;
    }
    utf16_offsets.push(offset);

    let mut spans = Vec::new();
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i] == '`' {
            let run_start = i;
            while i < chars.len() && chars[i] == '`' {
                i += 1;
            }
            let run_len = i - run_start;
            if let Some(close_start) = find_matching_run(&chars, i, run_len) {
                spans.push((utf16_offsets[run_start], utf16_offsets[close_start + run_len]));
                i = close_start + run_len;
            }
        } else {
            i += 1;
        }
    }
    spans
}

fn find_matching_run(chars: &[char], from: usize, run_len: usize) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        if chars[i] == '`' {
            let start = i;
            while i < chars.len() && chars[i] == '`' {
                i += 1;
            }
            if i - start == run_len {
                return Some(start);
            }
        } else {
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MarkdownParser;
    use crate::uri::Uri;

    fn ranges(src: &str) -> NoLinkRanges {
        let doc = TextDocument::new(Uri::parse("file:///t.md"), 1, src);
        let tokens = MarkdownParser::new().unwrap().tokenize(&doc).unwrap();
        NoLinkRanges::compute(&tokens, &doc)
    }

    #[test]
    fn fenced_code_suppresses_whole_block() {
        let r = ranges("text\n```\n[a](b)\n```\nmore");
        assert!(r.contains(Position::new(2, 0)));
        assert!(!r.contains(Position::new(0, 0)));
        assert!(!r.contains(Position::new(4, 0)));
    }

    #[test]
    fn inline_code_span_detected() {
        let r = ranges("see `[a](b)` here");
        assert!(r.contains(Position::new(0, 6)));
        assert!(!r.contains(Position::new(0, 0)));
    }

    #[test]
    fn unmatched_backtick_run_is_not_a_span() {
        let r = ranges("a ` b ``` c");
        // Single unmatched backtick then a triple run with nothing to
        // close it: no spans should be produced.
        assert!(!r.contains(Position::new(0, 2)));
    }

    #[test]
    fn inline_code_span_after_non_bmp_char_uses_utf16_offsets() {
        // \u{1F600} (an emoji) is two UTF-16 units but one `char`; the span
        // boundaries must be reported in UTF-16 units to line up with the
        // positions `link_extractor` computes via `encode_utf16().count()`.
        let r = ranges("\u{1F600} `[a](b)` here");
        // "\u{1F600} " is 3 UTF-16 units (2 for the emoji, 1 for the space),
        // so the span starts at unit 3 and the link text falls inside it.
        assert!(r.contains(Position::new(0, 4)));
        assert!(!r.contains(Position::new(0, 0)));
    }

    #[test]
    fn concat_adds_extra_inline_ranges() {
        let base = ranges("plain text");
        let extra = Range::new(Position::new(0, 0), Position::new(0, 5));
        let merged = base.concat(vec![extra]);
        assert!(merged.contains(Position::new(0, 2)));
    }
}
