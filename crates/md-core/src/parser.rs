//! A tree-sitter-md based block parser producing the token stream contract
//! of spec §4.3.
//!
//! Grounded on `blz-core/src/parser.rs`: the same `tree_sitter::Parser`
//! wrapper around `tree_sitter_md::LANGUAGE`, the same node-kind matching
//! (`atx_heading`, `setext_heading`, `fenced_code_block`,
//! `indented_code_block`, `html_block`), and the same "slice the node's raw
//! byte range out of the source text" extraction style rather than driving
//! a second inline grammar. Unlike the teacher, this adapter's only job is
//! to hand [`crate::toc`] and [`crate::no_link_ranges`] a faithful-enough
//! token stream — it does not build heading-path content blocks, since
//! this engine has no search index to feed.

use crate::document::TextDocument;
use crate::error::{Error, Result};
use tree_sitter::{Node, Parser as TsParser, TreeCursor};

/// The kinds of token this crate's consumers need (spec §4.3): enough to
/// derive no-link ranges and the table of contents, nothing more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenType {
    HeadingOpen,
    HeadingClose,
    /// The inline content of a heading; `children` holds its leaf tokens.
    Inline,
    Text,
    CodeInline,
    Emoji,
    Fence,
    CodeBlock,
    HtmlBlock,
}

/// A single token in the block-level stream (spec §4.3).
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenType,
    /// ATX markup (`"#".."######"`) or setext markup (`"="`/`"-"`).
    pub markup: Option<String>,
    /// Half-open `[start_line, end_line)` row range this token spans.
    pub map: Option<(u32, u32)>,
    /// Leaf content; only populated on `Inline` tokens.
    pub children: Option<Vec<Token>>,
    /// Raw text content; populated on `Text`/`CodeInline`/`Emoji` leaves.
    pub content: String,
}

impl Token {
    fn leaf(kind: TokenType, content: impl Into<String>) -> Self {
        Self {
            kind,
            markup: None,
            map: None,
            children: None,
            content: content.into(),
        }
    }
}

/// A tree-sitter-md powered parser adapter (spec C3).
///
/// Not thread-safe — tree-sitter parsers hold mutable internal state.
/// Create one instance per thread, as `blz-core::MarkdownParser` does.
pub struct MarkdownParser {
    inner: TsParser,
}

impl MarkdownParser {
    /// # Errors
    /// Returns [`Error::Parse`] if the `tree-sitter-md` grammar cannot be
    /// loaded (effectively infallible in practice).
    pub fn new() -> Result<Self> {
        let mut inner = TsParser::new();
        inner
            .set_language(&tree_sitter_md::LANGUAGE.into())
            .map_err(|e| Error::Parse(format!("failed to load markdown grammar: {e}")))?;
        Ok(Self { inner })
    }

    /// Tokenize a document's current text.
    ///
    /// # Errors
    /// Returns [`Error::Parse`] if tree-sitter fails to produce a tree at
    /// all (not the same as the tree containing error nodes, which is
    /// tolerated silently, matching `blz-core`'s fallback behavior).
    pub fn tokenize(&mut self, doc: &TextDocument) -> Result<Vec<Token>> {
        self.tokenize_str(doc.full_text())
    }

    /// Tokenize raw Markdown source text directly.
    pub fn tokenize_str(&mut self, text: &str) -> Result<Vec<Token>> {
        let tree = self
            .inner
            .parse(text, None)
            .ok_or_else(|| Error::Parse("failed to parse markdown".into()))?;

        let mut tokens = Vec::new();
        let mut cursor = tree.root_node().walk();
        walk(&mut cursor, text, &mut tokens);
        Ok(tokens)
    }
}

fn walk(cursor: &mut TreeCursor, text: &str, tokens: &mut Vec<Token>) {
    let node = cursor.node();
    let mut descend = true;

    match node.kind() {
        "atx_heading" => {
            emit_atx_heading(node, text, tokens);
            descend = false;
        },
        "setext_heading" => {
            emit_setext_heading(node, text, tokens);
            descend = false;
        },
        "fenced_code_block" => {
            let (start, end) = row_range(node);
            let markup = fence_markup(node, text);
            tokens.push(Token {
                kind: TokenType::Fence,
                markup: Some(markup),
                map: Some((start, end)),
                children: None,
                content: String::new(),
            });
            descend = false;
        },
        "indented_code_block" => {
            let (start, end) = row_range(node);
            tokens.push(Token {
                kind: TokenType::CodeBlock,
                markup: None,
                map: Some((start, end)),
                children: None,
                content: String::new(),
            });
            descend = false;
        },
        "html_block" => {
            let (start, end) = row_range(node);
            tokens.push(Token {
                kind: TokenType::HtmlBlock,
                markup: None,
                map: Some((start, end)),
                children: None,
                content: String::new(),
            });
            descend = false;
        },
        _ => {},
    }

    if descend && cursor.goto_first_child() {
        loop {
            walk(cursor, text, tokens);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
}

fn row_range(node: Node) -> (u32, u32) {
    (node.start_position().row as u32, node.end_position().row as u32 + 1)
}

fn fence_markup(node: Node, text: &str) -> String {
    let first_line_end = text[node.byte_range()].find('\n').unwrap_or(0);
    let first_line = &text[node.byte_range()][..first_line_end];
    let fence_char = first_line.trim_start().chars().next().unwrap_or('`');
    first_line
        .trim_start()
        .chars()
        .take_while(|&c| c == fence_char)
        .collect()
}

fn emit_atx_heading(node: Node, text: &str, tokens: &mut Vec<Token>) {
    let (start, end) = row_range(node);
    let raw = &text[node.byte_range()];
    let first_line = raw.lines().next().unwrap_or("");
    let level = first_line
        .chars()
        .take_while(|&c| c == '#')
        .count()
        .clamp(1, 6);
    let markup = "#".repeat(level);

    let after_hashes = first_line.trim_start_matches('#');
    let without_leading_ws = after_hashes.trim_start();
    // Strip a trailing run of `#`s preceded by whitespace (closing ATX
    // sequence), then trailing whitespace.
    let heading_text = strip_trailing_atx_close(without_leading_ws);

    tokens.push(Token {
        kind: TokenType::HeadingOpen,
        markup: Some(markup),
        map: Some((start, start + 1)),
        children: None,
        content: String::new(),
    });
    tokens.push(inline_token(heading_text, (start, start + 1)));
    tokens.push(Token {
        kind: TokenType::HeadingClose,
        markup: None,
        map: Some((start, end)),
        children: None,
        content: String::new(),
    });
}

fn strip_trailing_atx_close(s: &str) -> &str {
    let trimmed = s.trim_end();
    let without_hashes = trimmed.trim_end_matches('#');
    if without_hashes.len() == trimmed.len() {
        return trimmed;
    }
    // Only treat as a close sequence if hashes were preceded by whitespace
    // (or the text became empty), per ATX heading rules.
    if without_hashes.is_empty() || without_hashes.ends_with(char::is_whitespace) {
        without_hashes.trim_end()
    } else {
        trimmed
    }
}

fn emit_setext_heading(node: Node, text: &str, tokens: &mut Vec<Token>) {
    let (start, end) = row_range(node);
    let raw = &text[node.byte_range()];
    let mut lines = raw.lines();
    let content_line = lines.next().unwrap_or("");
    let underline = raw.lines().last().unwrap_or("");
    let level = if underline.trim_start().starts_with('=') {
        1
    } else {
        2
    };
    let markup = if level == 1 { "=" } else { "-" }.to_string();

    tokens.push(Token {
        kind: TokenType::HeadingOpen,
        markup: Some(markup),
        map: Some((start, start + 1)),
        children: None,
        content: String::new(),
    });
    tokens.push(inline_token(content_line.trim(), (start, start + 1)));
    tokens.push(Token {
        kind: TokenType::HeadingClose,
        markup: None,
        map: Some((start, end)),
        children: None,
        content: String::new(),
    });
}

/// Build an `Inline` token whose children are the `Text`/`CodeInline`
/// leaves of `raw` (spec §4.7: TOC text is "concatenation of inline text
/// and code-inline and emoji child content"; emphasis markers contribute no
/// leaf and are therefore excluded automatically).
fn inline_token(raw: &str, map: (u32, u32)) -> Token {
    let children = scan_inline_children(raw);
    Token {
        kind: TokenType::Inline,
        markup: None,
        map: Some(map),
        children: Some(children),
        content: String::new(),
    }
}

fn scan_inline_children(raw: &str) -> Vec<Token> {
    let mut children = Vec::new();
    let mut text_buf = String::new();
    let bytes = raw.as_bytes();
    let mut i = 0;

    let flush = |buf: &mut String, out: &mut Vec<Token>| {
        if !buf.is_empty() {
            out.push(Token::leaf(TokenType::Text, std::mem::take(buf)));
        }
    };

    while i < bytes.len() {
        match bytes[i] {
            b'`' => {
                let run_start = i;
                while i < bytes.len() && bytes[i] == b'`' {
                    i += 1;
                }
                let fence_len = i - run_start;
                if let Some(close) = find_backtick_close(raw, i, fence_len) {
                    flush(&mut text_buf, &mut children);
                    let inner = &raw[i..close];
                    children.push(Token::leaf(TokenType::CodeInline, inner.trim()));
                    i = close + fence_len;
                } else {
                    text_buf.push_str(&raw[run_start..i]);
                }
            },
            b':' => {
                if let Some(end) = find_emoji_close(raw, i) {
                    flush(&mut text_buf, &mut children);
                    children.push(Token::leaf(TokenType::Emoji, &raw[i + 1..end]));
                    i = end + 1;
                } else {
                    text_buf.push(':');
                    i += 1;
                }
            },
            b'*' | b'_' | b'~' => {
                // Emphasis/strikethrough markers: skip the marker run but
                // keep scanning so inner text still contributes leaves.
                i += 1;
            },
            _ => {
                let ch_len = utf8_char_len(bytes[i]);
                let end = (i + ch_len).min(bytes.len());
                text_buf.push_str(&raw[i..end]);
                i = end;
            },
        }
    }
    flush(&mut text_buf, &mut children);
    children
}

fn utf8_char_len(first_byte: u8) -> usize {
    if first_byte & 0x80 == 0 {
        1
    } else if first_byte & 0xE0 == 0xC0 {
        2
    } else if first_byte & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

fn find_backtick_close(raw: &str, from: usize, fence_len: usize) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut i = from;
    let fence: String = "`".repeat(fence_len);
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let run_start = i;
            while i < bytes.len() && bytes[i] == b'`' {
                i += 1;
            }
            if i - run_start == fence_len {
                return Some(run_start);
            }
        } else {
            i += 1;
        }
    }
    let _ = fence;
    None
}

fn find_emoji_close(raw: &str, open: usize) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut i = open + 1;
    if i >= bytes.len() {
        return None;
    }
    let start = i;
    while i < bytes.len() {
        match bytes[i] {
            b':' if i > start => return Some(i),
            b' ' | b'\t' => return None,
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(src: &str) -> Vec<Token> {
        MarkdownParser::new().unwrap().tokenize_str(src).unwrap()
    }

    #[test]
    fn atx_heading_produces_open_inline_close() {
        let tokens = tokenize("# Hello World\n\nbody\n");
        assert_eq!(tokens[0].kind, TokenType::HeadingOpen);
        assert_eq!(tokens[0].markup.as_deref(), Some("#"));
        assert_eq!(tokens[1].kind, TokenType::Inline);
        let text: String = tokens[1]
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(text, "Hello World");
        assert_eq!(tokens[2].kind, TokenType::HeadingClose);
    }

    #[test]
    fn atx_heading_strips_trailing_close_sequence() {
        let tokens = tokenize("## Title ##\n");
        let text: String = tokens[1]
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(text, "Title");
    }

    #[test]
    fn setext_heading_level_from_underline() {
        let tokens = tokenize("Title\n=====\n");
        assert_eq!(tokens[0].markup.as_deref(), Some("="));
        let tokens2 = tokenize("Title\n-----\n");
        assert_eq!(tokens2[0].markup.as_deref(), Some("-"));
    }

    #[test]
    fn fenced_code_block_detected() {
        let tokens = tokenize("```rust\nfn main() {}\n```\n");
        assert!(tokens.iter().any(|t| t.kind == TokenType::Fence));
    }

    #[test]
    fn inline_code_and_emoji_are_leaves() {
        let tokens = tokenize("# Use `foo()` :tada:\n");
        let kinds: Vec<&TokenType> = tokens[1]
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|t| &t.kind)
            .collect();
        assert!(kinds.contains(&&TokenType::CodeInline));
        assert!(kinds.contains(&&TokenType::Emoji));
    }

    #[test]
    fn emphasis_markers_contribute_no_separate_token_but_keep_text() {
        let tokens = tokenize("# **Bold** text\n");
        let text: String = tokens[1]
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(text, "Bold text");
    }
}
