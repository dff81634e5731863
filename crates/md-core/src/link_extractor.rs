//! The link extractor (spec §4.6, C6): four ordered byte-scanning
//! sub-scanners over a document's raw text, gated by [`NoLinkRanges`].
//!
//! Per spec §9's design note, this is deliberately scan-driven over source
//! text rather than built from a full inline AST — angle-bracket and
//! whitespace fidelity are otherwise lost. The balanced-bracket/paren
//! primitives are [`crate::link`]'s, themselves grounded on
//! `blz-core::heading`.

use crate::document::{Position, Range, TextDocument};
use crate::link::{
    find_balanced_bracket_close, find_matching_paren, has_balanced_parens, DefinitionRef, Href,
    LinkSource, MdLink,
};
use crate::no_link_ranges::NoLinkRanges;

struct Scan<'a> {
    doc: &'a TextDocument,
    text: &'a str,
    bytes: &'a [u8],
}

impl Scan<'_> {
    /// Convert a byte offset into `text` to a document [`Position`]. Every
    /// caller derives `byte_offset` from an ASCII delimiter match (`[`,
    /// `]`, `(`, `<`, a line start, …), which is always a valid UTF-8
    /// char boundary.
    fn pos(&self, byte_offset: usize) -> Position {
        let safe = byte_offset.min(self.text.len());
        let utf16 = self.text[..safe].encode_utf16().count() as u32;
        self.doc.position_at(utf16)
    }

    fn range(&self, start: usize, end: usize) -> Range {
        Range::new(self.pos(start), self.pos(end))
    }
}

/// Extract every link occurrence in `doc` (spec §4.6).
///
/// `resolve` classifies a raw destination string into an [`Href`]
/// (typically [`crate::resolver::resolve_link`] partially applied to the
/// document's URI and workspace folders); it is never called for
/// `Reference`-form occurrences, which never need resolution.
#[must_use]
pub fn extract(doc: &TextDocument, no_link_ranges: &NoLinkRanges, resolve: &dyn Fn(&str) -> Href) -> Vec<MdLink> {
    let text = doc.full_text();
    let scan = Scan {
        doc,
        text,
        bytes: text.as_bytes(),
    };

    let inline_links = find_inline_links_in(&scan, no_link_ranges, resolve, 0, scan.bytes.len());
    let inline_ranges: Vec<Range> = inline_links.iter().map(|l| l.source().range).collect();
    let no_link_for_refs = no_link_ranges.concat(inline_ranges);

    let reference_links = scan_reference_links(&scan, &no_link_for_refs);
    let definitions = scan_definitions(&scan, no_link_ranges, resolve);
    let autolinks = scan_autolinks(&scan, no_link_ranges, resolve);

    let mut all = Vec::with_capacity(
        inline_links.len() + reference_links.len() + definitions.len() + autolinks.len(),
    );
    all.extend(inline_links);
    all.extend(reference_links);
    all.extend(definitions);
    all.extend(autolinks);
    all.sort_by_key(|l| doc.offset_at(l.source().range.start));
    all
}

fn is_ascii_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_escaped(bytes: &[u8], idx: usize) -> bool {
    let mut count = 0;
    let mut j = idx;
    while j > 0 && bytes[j - 1] == b'\\' {
        count += 1;
        j -= 1;
    }
    count % 2 == 1
}

fn split_href_fragment(dest_start: usize, dest: &str) -> (String, Option<(usize, usize)>) {
    match dest.find('#') {
        Some(idx) => {
            let path_text = dest[..idx].to_string();
            let frag_start = dest_start + idx + 1;
            let frag_end = dest_start + dest.len();
            (path_text, Some((frag_start, frag_end)))
        },
        None => (dest.to_string(), None),
    }
}

fn parse_title_at(bytes: &[u8], start: usize, limit: usize) -> Option<(usize, usize)> {
    if start >= limit {
        return None;
    }
    let close = match bytes[start] {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };
    let mut i = start + 1;
    while i < limit {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == close {
            return Some((start + 1, i));
        }
        i += 1;
    }
    None
}

// ---------------------------------------------------------------------
// 1. Inline links: [text](dest "title")
// ---------------------------------------------------------------------

struct InlineTarget {
    dest: String,
    dest_start: usize,
    dest_end: usize,
    is_angle_bracket: bool,
    title_range: Option<(usize, usize)>,
    close_paren: usize,
}

fn parse_inline_target(bytes: &[u8], text: &str, paren_open: usize) -> Option<InlineTarget> {
    let close = find_matching_paren(bytes, paren_open)?;
    let mut i = paren_open + 1;
    while i < close && is_ascii_ws(bytes[i]) {
        i += 1;
    }

    if i < close && bytes[i] == b'<' {
        let start = i + 1;
        let mut j = start;
        while j < close && bytes[j] != b'>' {
            j += 1;
        }
        if j >= close {
            return None;
        }
        let dest = text[start..j].to_string();
        let mut k = j + 1;
        while k < close && is_ascii_ws(bytes[k]) {
            k += 1;
        }
        let title_range = parse_title_at(bytes, k, close);
        Some(InlineTarget {
            dest,
            dest_start: start,
            dest_end: j,
            is_angle_bracket: true,
            title_range,
            close_paren: close,
        })
    } else {
        let dest_start = i;
        let mut j = i;
        while j < close && !is_ascii_ws(bytes[j]) {
            j += 1;
        }
        if j <= dest_start {
            return None;
        }
        let dest = &text[dest_start..j];
        if !has_balanced_parens(dest) {
            return None;
        }
        let mut k = j;
        while k < close && is_ascii_ws(bytes[k]) {
            k += 1;
        }
        let title_range = parse_title_at(bytes, k, close);
        Some(InlineTarget {
            dest: dest.to_string(),
            dest_start,
            dest_end: j,
            is_angle_bracket: false,
            title_range,
            close_paren: close,
        })
    }
}

fn find_inline_links_in(
    scan: &Scan,
    no_link: &NoLinkRanges,
    resolve: &dyn Fn(&str) -> Href,
    start: usize,
    end: usize,
) -> Vec<MdLink> {
    let bytes = scan.bytes;
    let mut out = Vec::new();
    let mut i = start;
    while i < end {
        if bytes[i] == b'[' && !is_escaped(bytes, i) {
            if let Some(close_bracket) = find_balanced_bracket_close(bytes, i) {
                if close_bracket < end
                    && close_bracket + 1 < bytes.len()
                    && bytes[close_bracket + 1] == b'('
                {
                    let paren_open = close_bracket + 1;
                    if let Some(target) = parse_inline_target(bytes, scan.text, paren_open) {
                        // Nested inline links inside the text portion (hyperlinked images).
                        out.extend(find_inline_links_in(scan, no_link, resolve, i + 1, close_bracket));

                        let href_pos = scan.pos(target.dest_start);
                        if !no_link.contains(href_pos) {
                            let (path_text, fragment_range) =
                                split_href_fragment(target.dest_start, &target.dest);
                            let full_range = scan.range(i, target.close_paren + 1);
                            let target_range = scan.range(paren_open, target.close_paren + 1);
                            let href_range = scan.range(target.dest_start, target.dest_end);
                            let title_range = target.title_range.map(|(s, e)| scan.range(s, e));
                            let href = resolve(&target.dest);
                            out.push(MdLink::Link {
                                source: LinkSource {
                                    resource: scan.doc.uri().clone(),
                                    range: full_range,
                                    target_range,
                                    href_text: target.dest.clone(),
                                    path_text,
                                    href_range,
                                    fragment_range: fragment_range.map(|(s, e)| scan.range(s, e)),
                                    title_range,
                                    is_angle_bracket_link: target.is_angle_bracket,
                                },
                                href,
                            });
                        }
                        i = target.close_paren + 1;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }
    out
}

// ---------------------------------------------------------------------
// 2. Reference / shortcut links: [text][ref], [ref][], [ref]
// ---------------------------------------------------------------------

fn is_list_marker_prefix(s: &str) -> bool {
    if let Some(rest) = s.strip_prefix(['-', '*', '+']) {
        return rest == " ";
    }
    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    digits_end > 0 && matches!(&s[digits_end..], ". " | ") ")
}

fn is_checkbox(scan: &Scan, bracket_open: usize, bracket_close: usize) -> bool {
    let content = &scan.text[bracket_open + 1..bracket_close];
    if !matches!(content, "x" | "X" | " ") {
        return false;
    }
    let line_start = scan.text[..bracket_open].rfind('\n').map_or(0, |i| i + 1);
    let prefix = scan.text[line_start..bracket_open].trim_start();
    is_list_marker_prefix(prefix)
}

fn reference_href(raw: &str) -> Href {
    Href::Reference {
        reference: raw.to_string(),
    }
}

fn scan_reference_links(scan: &Scan, no_link: &NoLinkRanges) -> Vec<MdLink> {
    let bytes = scan.bytes;
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' && !is_escaped(bytes, i) {
            if let Some(close1) = find_balanced_bracket_close(bytes, i) {
                if close1 + 1 < bytes.len() && bytes[close1 + 1] == b'[' && !is_escaped(bytes, close1 + 1) {
                    let open2 = close1 + 1;
                    if let Some(close2) = find_balanced_bracket_close(bytes, open2) {
                        let explicit_ref = &scan.text[open2 + 1..close2];
                        let (ref_text, ref_start, ref_end) = if explicit_ref.is_empty() {
                            (scan.text[i + 1..close1].to_string(), i + 1, close1)
                        } else {
                            (explicit_ref.to_string(), open2 + 1, close2)
                        };
                        let href_pos = scan.pos(ref_start);
                        if !no_link.contains(href_pos) && !ref_text.trim().is_empty() {
                            let full_range = scan.range(i, close2 + 1);
                            out.push(MdLink::Link {
                                source: LinkSource {
                                    resource: scan.doc.uri().clone(),
                                    range: full_range,
                                    target_range: scan.range(open2, close2 + 1),
                                    href_text: ref_text.clone(),
                                    path_text: ref_text.clone(),
                                    href_range: scan.range(ref_start, ref_end),
                                    fragment_range: None,
                                    title_range: None,
                                    is_angle_bracket_link: false,
                                },
                                href: reference_href(&ref_text),
                            });
                        }
                        i = close2 + 1;
                        continue;
                    }
                } else {
                    let next = bytes.get(close1 + 1).copied();
                    let excluded = matches!(next, Some(b':') | Some(b'(')) || is_checkbox(scan, i, close1);
                    if !excluded {
                        let ref_text = &scan.text[i + 1..close1];
                        // Open question (spec §9): shortcut refs with spaces are
                        // never emitted.
                        if !ref_text.trim().is_empty() && !ref_text.contains(char::is_whitespace) {
                            let href_pos = scan.pos(i + 1);
                            if !no_link.contains(href_pos) {
                                let full_range = scan.range(i, close1 + 1);
                                out.push(MdLink::Link {
                                    source: LinkSource {
                                        resource: scan.doc.uri().clone(),
                                        range: full_range,
                                        target_range: full_range,
                                        href_text: ref_text.to_string(),
                                        path_text: ref_text.to_string(),
                                        href_range: scan.range(i + 1, close1),
                                        fragment_range: None,
                                        title_range: None,
                                        is_angle_bracket_link: false,
                                    },
                                    href: reference_href(ref_text),
                                });
                            }
                        }
                    }
                }
            }
        }
        i += 1;
    }
    out
}

// ---------------------------------------------------------------------
// 3. Definitions: [ref]: dest "title"
// ---------------------------------------------------------------------

fn line_byte_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for line in text.split('\n') {
        let end = start + line.len();
        ranges.push((start, end));
        start = end + 1;
    }
    ranges
}

fn scan_definitions(scan: &Scan, no_link: &NoLinkRanges, resolve: &dyn Fn(&str) -> Href) -> Vec<MdLink> {
    let bytes = scan.bytes;
    let mut out = Vec::new();

    for (line_start, line_end) in line_byte_ranges(scan.text) {
        let line = &scan.text[line_start..line_end];
        let trimmed = line.trim_start();
        if !trimmed.starts_with('[') {
            continue;
        }
        let bracket_open = line_start + (line.len() - trimmed.len());
        let Some(close_bracket) = find_balanced_bracket_close(bytes, bracket_open) else {
            continue;
        };
        if close_bracket >= line_end {
            continue;
        }
        let ref_raw = &scan.text[bracket_open + 1..close_bracket];
        if ref_raw.starts_with('^') || ref_raw.trim().is_empty() {
            continue;
        }
        if bytes.get(close_bracket + 1) != Some(&b':') {
            continue;
        }

        let mut i = close_bracket + 2;
        while i < line_end && is_ascii_ws(bytes[i]) {
            i += 1;
        }

        let (dest, dest_start, dest_end, is_angle, mut cursor) = if i < line_end && bytes[i] == b'<' {
            let start = i + 1;
            let mut j = start;
            while j < line_end && bytes[j] != b'>' {
                j += 1;
            }
            if j >= line_end {
                continue;
            }
            (scan.text[start..j].to_string(), start, j, true, j + 1)
        } else {
            let start = i;
            let mut j = i;
            while j < line_end && !is_ascii_ws(bytes[j]) {
                j += 1;
            }
            if j <= start {
                continue;
            }
            (scan.text[start..j].to_string(), start, j, false, j)
        };
        if dest.is_empty() {
            continue;
        }

        while cursor < line_end && is_ascii_ws(bytes[cursor]) {
            cursor += 1;
        }
        let title_range = parse_title_at(bytes, cursor, line_end);

        let href_pos = scan.pos(dest_start);
        if no_link.contains(href_pos) {
            continue;
        }

        let (path_text, fragment_range) = split_href_fragment(dest_start, &dest);
        let end_pos = title_range.map_or(dest_end, |(_, end)| end + 1);
        let full_range = scan.range(bracket_open, end_pos);
        let target_range = scan.range(close_bracket + 1, end_pos);
        let href_range = scan.range(dest_start, dest_end);
        let href = resolve(&dest);

        out.push(MdLink::Definition {
            source: LinkSource {
                resource: scan.doc.uri().clone(),
                range: full_range,
                target_range,
                href_text: dest.clone(),
                path_text,
                href_range,
                fragment_range: fragment_range.map(|(s, e)| scan.range(s, e)),
                title_range: title_range.map(|(s, e)| scan.range(s, e)),
                is_angle_bracket_link: is_angle,
            },
            href,
            reference: DefinitionRef {
                text: ref_raw.to_string(),
                range: scan.range(bracket_open + 1, close_bracket),
            },
        });
    }
    out
}

// ---------------------------------------------------------------------
// 4. Autolinks: <scheme:...>
// ---------------------------------------------------------------------

fn scan_autolinks(scan: &Scan, no_link: &NoLinkRanges, resolve: &dyn Fn(&str) -> Href) -> Vec<MdLink> {
    use crate::resolver::is_external_scheme;

    let bytes = scan.bytes;
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<' && !is_escaped(bytes, i) {
            let start = i + 1;
            let mut j = start;
            while j < bytes.len() && bytes[j] != b'>' && !is_ascii_ws(bytes[j]) {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'>' && j > start {
                let candidate = &scan.text[start..j];
                if is_external_scheme(candidate) {
                    let pos = scan.pos(start);
                    if !no_link.contains(pos) {
                        let full_range = scan.range(i, j + 1);
                        let href_range = scan.range(start, j);
                        out.push(MdLink::AutoLink {
                            source: LinkSource {
                                resource: scan.doc.uri().clone(),
                                range: full_range,
                                target_range: href_range,
                                href_text: candidate.to_string(),
                                path_text: candidate.to_string(),
                                href_range,
                                fragment_range: None,
                                title_range: None,
                                is_angle_bracket_link: true,
                            },
                            href: resolve(candidate),
                        });
                    }
                    i = j + 1;
                    continue;
                }
            }
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_link;
    use crate::uri::Uri;

    fn links(src: &str) -> Vec<MdLink> {
        let doc = TextDocument::new(Uri::parse("file:///ws/doc.md"), 1, src);
        let tokens = crate::parser::MarkdownParser::new().unwrap().tokenize(&doc).unwrap();
        let no_link = NoLinkRanges::compute(&tokens, &doc);
        let folders = vec![Uri::parse("file:///ws")];
        let doc_uri = doc.uri().clone();
        let resolve = move |href: &str| resolve_link(href, &doc_uri, &folders, None);
        extract(&doc, &no_link, &resolve)
    }

    #[test]
    fn inline_link_has_nested_ranges() {
        let all = links("[text](dest.md \"title\")");
        assert_eq!(all.len(), 1);
        let l = &all[0];
        let s = l.source();
        assert!(s.target_range.contains_range(&s.href_range));
        assert!(s.range.contains_range(&s.target_range));
        assert!(s.title_range.is_some());
    }

    #[test]
    fn angle_bracket_destination_strips_brackets() {
        let all = links("[text](<a b.md>)");
        let s = all[0].source();
        assert!(s.is_angle_bracket_link);
        assert_eq!(s.href_text, "a b.md");
    }

    #[test]
    fn reference_link_and_collapsed_and_shortcut() {
        let all = links("[a][b]\n[c][]\n[d]\n");
        assert_eq!(all.len(), 3);
        for l in &all {
            assert!(matches!(l.href(), Href::Reference { .. }));
        }
    }

    #[test]
    fn shortcut_with_space_is_not_emitted() {
        let all = links("[ref with space]\n");
        assert!(all.is_empty());
    }

    #[test]
    fn checkbox_is_not_a_reference() {
        let all = links("- [x] done\n- [ ] todo\n");
        assert!(all.is_empty());
    }

    #[test]
    fn definition_is_extracted_with_title_and_fragment() {
        let all = links("[ref]: /a.md#frag \"Title\"\n");
        assert_eq!(all.len(), 1);
        match &all[0] {
            MdLink::Definition { reference, href, .. } => {
                assert_eq!(reference.text, "ref");
                assert!(matches!(href, Href::Internal { fragment, .. } if fragment == "frag"));
            },
            _ => panic!("expected a definition"),
        }
    }

    #[test]
    fn autolink_is_external() {
        let all = links("see <https://example.com> here\n");
        assert_eq!(all.len(), 1);
        assert!(matches!(all[0].href(), Href::External { .. }));
    }

    #[test]
    fn code_span_suppresses_inner_link() {
        let all = links("see `[a](b.md)` here\n");
        assert!(all.is_empty());
    }

    #[test]
    fn nested_inline_link_is_emitted_for_hyperlinked_image() {
        let all = links("[![alt](img.png)](page.md)\n");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn angle_bracket_and_plain_destinations_resolve_equal_hrefs() {
        let plain = links("[a](b.md)\n");
        let angled = links("[a](<b.md>)\n");
        assert_eq!(plain[0].href(), angled[0].href());
        assert_ne!(
            plain[0].source().is_angle_bracket_link,
            angled[0].source().is_angle_bracket_link
        );
    }
}
