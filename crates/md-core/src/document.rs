//! Document identity and the read-only text-document view (spec §3 "Document",
//! §4.2 "Text document").

use crate::uri::Uri;

/// A zero-based line/character position. Characters are counted in UTF-16
/// code units, matching the convention most editor protocols use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[must_use]
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A half-open `[start, end)` span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width range at `pos`.
    #[must_use]
    pub fn empty(pos: Position) -> Self {
        Self::new(pos, pos)
    }

    /// Whether `pos` falls inside this half-open range: `start <= pos < end`.
    #[must_use]
    pub fn contains(&self, pos: Position) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Whether `other` is entirely contained within `self`.
    #[must_use]
    pub fn contains_range(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// A range spanning an entire line (`line, 0` to `line + 1, 0`).
    #[must_use]
    pub fn whole_line(line: u32) -> Self {
        Self::new(Position::new(line, 0), Position::new(line + 1, 0))
    }
}

/// A read-only, versioned snapshot of a Markdown document's text (spec §3
/// "Document", §4.2).
///
/// Line offsets are precomputed once at construction so that
/// [`TextDocument::position_at`]/[`TextDocument::offset_at`] are O(log n)
/// rather than re-scanning the text on every call — the same "derive once,
/// answer many" shape `blz-core`'s `LineIndex` uses for search-hit line
/// mapping.
#[derive(Debug, Clone)]
pub struct TextDocument {
    uri: Uri,
    version: i64,
    text: String,
    /// UTF-16 offset of the start of each line, plus one trailing entry for
    /// the end of the document.
    line_starts_utf16: Vec<u32>,
    lines: Vec<String>,
}

impl TextDocument {
    #[must_use]
    pub fn new(uri: Uri, version: i64, text: impl Into<String>) -> Self {
        let text = text.into();
        let lines: Vec<String> = split_lines(&text);
        let mut line_starts_utf16 = Vec::with_capacity(lines.len() + 1);
        let mut offset = 0u32;
        for line in &lines {
            line_starts_utf16.push(offset);
            // +1 for the newline that `split_lines` strips; the last line
            // may lack one but that is immaterial to start offsets.
            offset += line.encode_utf16().count() as u32 + 1;
        }
        line_starts_utf16.push(offset);

        Self {
            uri,
            version,
            text,
            line_starts_utf16,
            lines,
        }
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn full_text(&self) -> &str {
        &self.text
    }

    /// The nth line's text, without its trailing newline.
    #[must_use]
    pub fn get_line(&self, n: usize) -> Option<&str> {
        self.lines.get(n).map(String::as_str)
    }

    /// Text within `range`, or the whole document if `range` is `None`.
    #[must_use]
    pub fn text(&self, range: Option<Range>) -> String {
        let Some(range) = range else {
            return self.text.clone();
        };
        let start = self.offset_at(range.start);
        let end = self.offset_at(range.end);
        utf16_slice(&self.text, start, end)
    }

    /// Convert an absolute UTF-16 offset into the document to a position.
    #[must_use]
    pub fn position_at(&self, offset: u32) -> Position {
        match self.line_starts_utf16.binary_search(&offset) {
            Ok(line) => Position::new(line as u32, 0),
            Err(0) => Position::new(0, offset),
            Err(next) => {
                let line = next - 1;
                let character = offset - self.line_starts_utf16[line];
                Position::new(line as u32, character)
            },
        }
    }

    /// Convert a position back to an absolute UTF-16 offset.
    #[must_use]
    pub fn offset_at(&self, pos: Position) -> u32 {
        let line = pos.line as usize;
        if line >= self.lines.len() {
            return *self.line_starts_utf16.last().unwrap_or(&0);
        }
        let line_start = self.line_starts_utf16[line];
        let line_len_utf16 = self.lines[line].encode_utf16().count() as u32;
        line_start + pos.character.min(line_len_utf16)
    }

    /// A range covering this document's final character.
    #[must_use]
    pub fn end_position(&self) -> Position {
        if self.lines.is_empty() {
            return Position::new(0, 0);
        }
        let last = self.lines.len() - 1;
        Position::new(
            last as u32,
            self.lines[last].encode_utf16().count() as u32,
        )
    }
}

fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        lines.push(line.to_string());
    }
    lines
}

fn utf16_slice(text: &str, start: u32, end: u32) -> String {
    let units: Vec<u16> = text
        .encode_utf16()
        .skip(start as usize)
        .take((end.saturating_sub(start)) as usize)
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> TextDocument {
        TextDocument::new(Uri::parse("file:///t.md"), 1, text)
    }

    #[test]
    fn line_count_and_get_line() {
        let d = doc("a\nbb\nccc");
        assert_eq!(d.line_count(), 3);
        assert_eq!(d.get_line(1), Some("bb"));
        assert_eq!(d.get_line(3), None);
    }

    #[test]
    fn position_and_offset_roundtrip() {
        let d = doc("hello\nworld\n!");
        let pos = d.position_at(8);
        assert_eq!(pos, Position::new(1, 2));
        assert_eq!(d.offset_at(pos), 8);
    }

    #[test]
    fn text_range_extraction() {
        let d = doc("hello\nworld");
        let r = Range::new(Position::new(0, 1), Position::new(1, 3));
        assert_eq!(d.text(Some(r)), "ello\nwor");
    }

    #[test]
    fn range_contains_is_half_open() {
        let r = Range::new(Position::new(0, 0), Position::new(0, 5));
        assert!(r.contains(Position::new(0, 0)));
        assert!(r.contains(Position::new(0, 4)));
        assert!(!r.contains(Position::new(0, 5)));
    }
}
