//! Organize and extract link definitions (spec §4.14, C14).
//!
//! New logic against spec §4.14, built on [`LinkDefinitionSet`] and the
//! workspace-edit model in [`crate::edit`]. Both operations are expressed
//! as a single whole-document replacement rather than a scatter of
//! line-level edits: the spec's idempotency property (§8, "applying it
//! twice equals applying it once") is trivially true of a function from
//! old text to new text, and a replace-the-whole-range edit is still a
//! valid, non-overlapping `WorkspaceEdit` per spec §6.

use crate::document::{Position, Range, TextDocument};
use crate::edit::{TextEdit, WorkspaceEdit};
use crate::link::{normalize_reference_name, DefinitionRef, Href, MdLink};
use std::collections::HashSet;

/// Collect, sort, and re-place a document's link definitions (spec
/// §4.14 "Organize").
///
/// `remove_unused` drops definitions with no referring `Reference` link
/// anywhere in `links`.
#[must_use]
pub fn organize(doc: &TextDocument, links: &[MdLink], remove_unused: bool) -> WorkspaceEdit {
    let mut edit = WorkspaceEdit::new();

    let definitions: Vec<&MdLink> = links.iter().filter(|l| matches!(l, MdLink::Definition { .. })).collect();
    if definitions.is_empty() {
        return edit;
    }

    let used = used_reference_names(links);
    let mut to_place: Vec<&MdLink> = definitions
        .iter()
        .copied()
        .filter(|l| !remove_unused || is_used(l, &used))
        .collect();
    // Stable sort: definitions that compare equal under the
    // case-insensitive key keep their original (source) order (spec:
    // "duplicate refs keep source order within equal keys").
    to_place.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

    let delete_lines: HashSet<u32> = definitions.iter().map(|l| definition_line(l)).collect();
    let had_trailing_newline = doc.full_text().ends_with('\n');

    let mut body_lines: Vec<&str> = Vec::new();
    for i in 0..doc.line_count() {
        if had_trailing_newline && i + 1 == doc.line_count() {
            // `TextDocument::line_count` includes the sentinel empty line
            // after a final newline; it carries no content of its own.
            continue;
        }
        if delete_lines.contains(&(i as u32)) {
            continue;
        }
        body_lines.push(doc.get_line(i).unwrap_or(""));
    }
    while body_lines.last().is_some_and(|l| l.is_empty()) {
        body_lines.pop();
    }

    let placed_lines: Vec<String> = to_place.iter().map(|l| definition_line_text(doc, l)).collect();

    let mut new_text = body_lines.join("\n");
    if !placed_lines.is_empty() {
        if !new_text.is_empty() {
            new_text.push_str("\n\n");
        }
        new_text.push_str(&placed_lines.join("\n"));
    }
    if had_trailing_newline && !new_text.is_empty() {
        new_text.push('\n');
    }

    if new_text == doc.full_text() {
        return edit;
    }

    let full_range = Range::new(Position::new(0, 0), doc.end_position());
    edit.add_edit(doc.uri().clone(), TextEdit::new(full_range, new_text));
    edit
}

fn used_reference_names(links: &[MdLink]) -> HashSet<String> {
    links
        .iter()
        .filter_map(|l| match l.href() {
            Href::Reference { reference } => Some(normalize_reference_name(reference)),
            _ => None,
        })
        .collect()
}

fn is_used(def: &MdLink, used: &HashSet<String>) -> bool {
    let MdLink::Definition { reference, .. } = def else {
        return false;
    };
    used.contains(&normalize_reference_name(&reference.text))
}

fn sort_key(def: &MdLink) -> String {
    let MdLink::Definition { reference, .. } = def else {
        return String::new();
    };
    reference.text.to_lowercase()
}

fn definition_line(def: &MdLink) -> u32 {
    def.source().range.start.line
}

fn definition_line_text(doc: &TextDocument, def: &MdLink) -> String {
    doc.get_line(definition_line(def) as usize).unwrap_or_default().to_string()
}

/// Extract the inline link (or shortcut/reference link) at `pos` into a new
/// trailing definition (spec §4.14 "Extract"); every other occurrence with
/// the identical href, title, and fragment is rewritten to the reference
/// form at the same time.
///
/// For a nested hyperlinked image, only the innermost link containing
/// `pos` is extracted (spec §4.14).
#[must_use]
pub fn extract_link_definition(doc: &TextDocument, links: &[MdLink], pos: Position) -> Option<WorkspaceEdit> {
    let candidate = links
        .iter()
        .filter(|l| matches!(l, MdLink::Link { .. }) && l.source().range.contains(pos))
        .min_by_key(|l| range_width(l.source().range))?;

    let MdLink::Link { source: candidate_source, href: candidate_href } = candidate else {
        unreachable!("filtered to MdLink::Link above")
    };
    if matches!(candidate_href, Href::Reference { .. }) {
        // Already a reference link; nothing to extract.
        return None;
    }

    let title_text = candidate_source
        .title_range
        .map(|r| doc.text(Some(r)));

    let matches: Vec<&MdLink> = links
        .iter()
        .filter(|l| {
            let MdLink::Link { source, href } = l else {
                return false;
            };
            href == candidate_href
                && source.title_range.map(|r| doc.text(Some(r))) == title_text
        })
        .collect();

    let existing_refs: Vec<&DefinitionRef> = links
        .iter()
        .filter_map(|l| match l {
            MdLink::Definition { reference, .. } => Some(reference),
            _ => None,
        })
        .collect();
    let placeholder = fresh_placeholder(links, &existing_refs);

    let mut edit = WorkspaceEdit::new();
    for m in &matches {
        let source = m.source();
        let text_span = doc.text(Some(Range::new(source.range.start, source.target_range.start)));
        edit.add_edit(
            doc.uri().clone(),
            TextEdit::new(source.range, format!("{text_span}[{placeholder}]")),
        );
    }

    let definition_text = render_definition(doc, candidate_source, title_text.as_deref(), &placeholder);
    let last_definition_line = links
        .iter()
        .filter_map(|l| matches!(l, MdLink::Definition { .. }).then(|| definition_line(l)))
        .max();

    let insert_edit = match last_definition_line {
        Some(line) => {
            let pos = Position::new(line + 1, 0);
            TextEdit::new(Range::empty(pos), format!("{definition_text}\n"))
        },
        None => {
            let pos = doc.end_position();
            let prefix = if doc.full_text().ends_with('\n') { "\n" } else { "\n\n" };
            TextEdit::new(Range::empty(pos), format!("{prefix}{definition_text}\n"))
        },
    };
    edit.add_edit(doc.uri().clone(), insert_edit);

    Some(edit)
}

fn range_width(range: Range) -> (u32, u32) {
    let lines = range.end.line.saturating_sub(range.start.line);
    let chars = if lines == 0 {
        range.end.character.saturating_sub(range.start.character)
    } else {
        u32::MAX
    };
    (lines, chars)
}

fn fresh_placeholder(links: &[MdLink], existing_refs: &[&DefinitionRef]) -> String {
    let taken: HashSet<String> = existing_refs.iter().map(|r| normalize_reference_name(&r.text)).collect();
    let used: HashSet<String> = used_reference_names(links);
    if !taken.contains("def") && !used.contains("def") {
        return "def".to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("def{n}");
        if !taken.contains(&candidate) && !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn render_definition(doc: &TextDocument, source: &crate::link::LinkSource, title: Option<&str>, placeholder: &str) -> String {
    let href = doc.text(Some(source.href_range));
    let dest = if source.is_angle_bracket_link {
        format!("<{href}>")
    } else {
        href
    };
    match title {
        Some(t) if !t.is_empty() => format!("[{placeholder}]: {dest} \"{t}\""),
        _ => format!("[{placeholder}]: {dest}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_extractor;
    use crate::no_link_ranges::NoLinkRanges;
    use crate::parser::MarkdownParser;
    use crate::resolver::resolve_link;
    use crate::uri::Uri;

    fn extract_for(doc: &TextDocument) -> Vec<MdLink> {
        let tokens = MarkdownParser::new().unwrap().tokenize(doc).unwrap();
        let no_link = NoLinkRanges::compute(&tokens, doc);
        let doc_uri = doc.uri().clone();
        let resolve = move |href: &str| resolve_link(href, &doc_uri, &[], None);
        link_extractor::extract(doc, &no_link, &resolve)
    }

    #[test]
    fn organize_removes_unused_and_sorts_case_insensitively() {
        // Scenario 6, spec §8.
        let uri = Uri::parse("file:///doc.md");
        let text = "text [a] text [link][c]\n\n[c]: http://c\n[b]: http://b\n[a]: http://a";
        let doc = TextDocument::new(uri, 1, text);
        let links = extract_for(&doc);

        let edit = organize(&doc, &links, true);
        let result = edit.apply_to(doc.uri(), text);
        assert_eq!(result, "text [a] text [link][c]\n\n[a]: http://a\n[c]: http://c");
    }

    #[test]
    fn organize_is_idempotent() {
        let uri = Uri::parse("file:///doc.md");
        let text = "body\n\n[z]: http://z\n[a]: http://a\n";
        let doc = TextDocument::new(uri.clone(), 1, text);
        let links = extract_for(&doc);
        let once = organize(&doc, &links, false).apply_to(&uri, text);

        let doc2 = TextDocument::new(uri.clone(), 2, once.clone());
        let links2 = extract_for(&doc2);
        let twice = organize(&doc2, &links2, false).apply_to(&uri, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn extract_creates_reference_and_definition() {
        let uri = Uri::parse("file:///doc.md");
        let text = "see [link](http://example.com) and [link](http://example.com) again\n";
        let doc = TextDocument::new(uri.clone(), 1, text);
        let links = extract_for(&doc);

        let edit = extract_link_definition(&doc, &links, Position::new(0, 6)).unwrap();
        let result = edit.apply_to(&uri, text);
        assert!(result.contains("[link][def]"));
        assert!(result.contains("[def]: http://example.com"));
        assert_eq!(result.matches("[link][def]").count(), 2);
    }
}
