//! Find-all-references (spec §4.11, C11).
//!
//! Consumes the outputs of C6/C7 (already-extracted links and TOC entries)
//! plus C4 (workspace stat for the `.md`-fallback target resolution) —
//! this module owns no cache of its own, matching spec §4.11's framing as
//! an algorithm over C8/C9 values rather than a component with its own
//! storage.

use crate::config::Config;
use crate::document::{Position, Range};
use crate::link::{normalize_reference_name, Href, MdLink};
use crate::slug::from_heading;
use crate::toc::Toc;
use crate::uri::Uri;
use crate::workspace::Workspace;

/// One occurrence returned by [`find_references`] or
/// [`find_references_to_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub uri: Uri,
    pub range: Range,
    pub is_trigger_location: bool,
}

enum Trigger<'a> {
    DefinitionRef(&'a MdLink),
    Href(&'a MdLink),
}

fn find_trigger(doc_links: &[MdLink], pos: Position) -> Option<Trigger<'_>> {
    for link in doc_links {
        if let MdLink::Definition { reference, .. } = link {
            if reference.range.contains(pos) {
                return Some(Trigger::DefinitionRef(link));
            }
        }
    }
    doc_links
        .iter()
        .find(|link| link.source().href_range.contains(pos))
        .map(Trigger::Href)
}

/// Find all references to whatever is at `pos` in `doc_uri` (spec §4.11).
///
/// `doc_links` is the owning document's already-extracted link list;
/// `all_links` is every workspace document's link list, keyed by URI
/// (typically sourced from the workspace-info cache, C9).
pub async fn find_references<W: Workspace + ?Sized>(
    workspace: &W,
    config: &Config,
    doc_uri: &Uri,
    pos: Position,
    toc: &Toc,
    doc_links: &[MdLink],
    all_links: &[(Uri, Vec<MdLink>)],
) -> Vec<Reference> {
    if let Some(entry) = toc.entry_at_line(pos.line) {
        let mut refs = references_to_header(doc_uri, entry.header_range, &entry.slug, all_links, config);
        if let Some(first) = refs.first_mut() {
            first.is_trigger_location = true;
        }
        return refs;
    }

    let Some(trigger) = find_trigger(doc_links, pos) else {
        return Vec::new();
    };

    let (mut refs, trigger_link) = match trigger {
        Trigger::DefinitionRef(link) => {
            let MdLink::Definition { reference, .. } = link else {
                unreachable!("find_trigger only returns Definition for DefinitionRef")
            };
            (references_to_reference(doc_uri, &reference.text, doc_links), link)
        },
        Trigger::Href(link) => {
            let refs = match link.href() {
                Href::Reference { reference } => references_to_reference(doc_uri, reference, doc_links),
                Href::External { uri } => references_to_external(uri, all_links),
                Href::Internal { path, fragment } => {
                    let in_fragment = link
                        .source()
                        .fragment_range
                        .is_some_and(|r| r.contains(pos));
                    references_to_internal(workspace, config, path, fragment, in_fragment, all_links).await
                },
            };
            (refs, link)
        },
    };

    let trigger_range = trigger_link.source().range;
    for r in &mut refs {
        if &r.uri == doc_uri && r.range == trigger_range {
            r.is_trigger_location = true;
        }
    }
    refs
}

/// The file-URI variant (spec §4.11): references to `file_uri` itself,
/// ignoring fragments, used by the rename planner.
pub async fn find_references_to_file<W: Workspace + ?Sized>(
    workspace: &W,
    config: &Config,
    file_uri: &Uri,
    all_links: &[(Uri, Vec<MdLink>)],
) -> Vec<Reference> {
    references_to_internal(workspace, config, file_uri, "", false, all_links).await
}

pub(crate) fn paths_refer_to_same_document(link_path: &Uri, target: &Uri, config: &Config) -> bool {
    if link_path == target {
        return true;
    }
    if link_path.extension().is_none() {
        for ext in &config.markdown_file_extensions {
            let candidate = link_path.with_path(format!("{}.{}", link_path.path(), ext));
            if &candidate == target {
                return true;
            }
        }
    }
    false
}

fn references_to_header(
    doc_uri: &Uri,
    header_range: Range,
    slug: &crate::slug::Slug,
    all_links: &[(Uri, Vec<MdLink>)],
    config: &Config,
) -> Vec<Reference> {
    let mut out = vec![Reference {
        uri: doc_uri.clone(),
        range: header_range,
        is_trigger_location: false,
    }];
    for (uri, links) in all_links {
        for link in links {
            if let Href::Internal { path, fragment } = link.href() {
                if !fragment.is_empty()
                    && paths_refer_to_same_document(path, doc_uri, config)
                    && &from_heading(fragment) == slug
                {
                    out.push(Reference {
                        uri: uri.clone(),
                        range: link.source().href_range,
                        is_trigger_location: false,
                    });
                }
            }
        }
    }
    out
}

fn references_to_reference(doc_uri: &Uri, ref_name: &str, doc_links: &[MdLink]) -> Vec<Reference> {
    let key = normalize_reference_name(ref_name);
    let mut out = Vec::new();
    for link in doc_links {
        match link {
            MdLink::Definition { reference, .. } if normalize_reference_name(&reference.text) == key => {
                out.push(Reference {
                    uri: doc_uri.clone(),
                    range: reference.range,
                    is_trigger_location: false,
                });
            },
            MdLink::Link {
                source,
                href: Href::Reference { reference },
            } if normalize_reference_name(reference) == key => {
                out.push(Reference {
                    uri: doc_uri.clone(),
                    range: source.href_range,
                    is_trigger_location: false,
                });
            },
            _ => {},
        }
    }
    out
}

fn references_to_external(target: &str, all_links: &[(Uri, Vec<MdLink>)]) -> Vec<Reference> {
    let mut out = Vec::new();
    for (uri, links) in all_links {
        for link in links {
            if let Href::External { uri: candidate } = link.href() {
                if candidate == target {
                    out.push(Reference {
                        uri: uri.clone(),
                        range: link.source().href_range,
                        is_trigger_location: false,
                    });
                }
            }
        }
    }
    out
}

pub(crate) async fn resolve_existing_target<W: Workspace + ?Sized>(workspace: &W, config: &Config, path: &Uri) -> Option<Uri> {
    if workspace.stat(path).await.is_some() {
        return Some(path.clone());
    }
    if path.extension().is_none() {
        for ext in &config.markdown_file_extensions {
            let candidate = path.with_path(format!("{}.{}", path.path(), ext));
            if workspace.stat(&candidate).await.is_some() {
                return Some(candidate);
            }
        }
    }
    None
}

async fn references_to_internal<W: Workspace + ?Sized>(
    workspace: &W,
    config: &Config,
    path: &Uri,
    fragment: &str,
    in_fragment: bool,
    all_links: &[(Uri, Vec<MdLink>)],
) -> Vec<Reference> {
    let Some(target) = resolve_existing_target(workspace, config, path).await else {
        return Vec::new();
    };

    if in_fragment && !fragment.is_empty() && config.is_markdown_path(target.path()) {
        let slug = from_heading(fragment);
        let mut out = Vec::new();
        if let Some(target_doc) = workspace.open_markdown_document(&target).await {
            if let Ok(mut parser) = crate::parser::MarkdownParser::new() {
                if let Ok(tokens) = parser.tokenize(&target_doc) {
                    let toc = crate::toc::build(&tokens, &target_doc);
                    if let Some(entry) = toc.entries().iter().find(|e| e.slug == slug) {
                        out.push(Reference {
                            uri: target.clone(),
                            range: entry.header_range,
                            is_trigger_location: false,
                        });
                    }
                }
            }
        }
        for (uri, links) in all_links {
            for link in links {
                if let Href::Internal { path: p, fragment: f } = link.href() {
                    if !f.is_empty() && paths_refer_to_same_document(p, &target, config) && from_heading(f) == slug {
                        out.push(Reference {
                            uri: uri.clone(),
                            range: link.source().href_range,
                            is_trigger_location: false,
                        });
                    }
                }
            }
        }
        out
    } else {
        let mut out = Vec::new();
        for (uri, links) in all_links {
            for link in links {
                let Href::Internal { path: p, fragment: f } = link.href() else {
                    continue;
                };
                if !paths_refer_to_same_document(p, &target, config) {
                    continue;
                }
                if uri == &target && !f.is_empty() {
                    continue;
                }
                out.push(Reference {
                    uri: uri.clone(),
                    range: link.source().href_range,
                    is_trigger_location: false,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextDocument;
    use crate::link_extractor;
    use crate::no_link_ranges::NoLinkRanges;
    use crate::parser::MarkdownParser;
    use crate::resolver::resolve_link;
    use crate::workspace::InMemoryWorkspace;

    fn extract_for(doc: &TextDocument, folders: &[Uri]) -> Vec<MdLink> {
        let tokens = MarkdownParser::new().unwrap().tokenize(doc).unwrap();
        let no_link = NoLinkRanges::compute(&tokens, doc);
        let doc_uri = doc.uri().clone();
        let folders = folders.to_vec();
        let resolve = move |href: &str| resolve_link(href, &doc_uri, &folders, None);
        link_extractor::extract(doc, &no_link, &resolve)
    }

    #[tokio::test]
    async fn reference_resolution_scenario() {
        // Scenario 2 from spec §8: "[a][b]\n\n[b]: /x.md" — references at
        // `b` return the definition and the inline link.
        let ws = InMemoryWorkspace::new(vec![Uri::parse("file:///ws")]);
        let uri = Uri::parse("file:///ws/doc.md");
        let text = "[a][b]\n\n[b]: /x.md\n";
        let doc = TextDocument::new(uri.clone(), 1, text);
        ws.upsert_document(doc.clone());

        let folders = vec![Uri::parse("file:///ws")];
        let links = extract_for(&doc, &folders);
        let config = Config::default();
        let tokens = MarkdownParser::new().unwrap().tokenize(&doc).unwrap();
        let toc = crate::toc::build(&tokens, &doc);

        // Position inside the definition's `[b]` ref.
        let pos = Position::new(2, 2);
        let all_links = vec![(uri.clone(), links.clone())];
        let refs = find_references(&ws, &config, &uri, pos, &toc, &links, &all_links).await;
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().any(|r| r.is_trigger_location));
    }

    #[tokio::test]
    async fn header_references_find_matching_fragment_links() {
        let ws = InMemoryWorkspace::new(vec![]);
        let uri = Uri::parse("file:///doc.md");
        let text = "# My Header\n\n[link](#my-header)\n";
        let doc = TextDocument::new(uri.clone(), 1, text);
        let links = extract_for(&doc, &[]);
        let config = Config::default();
        let tokens = MarkdownParser::new().unwrap().tokenize(&doc).unwrap();
        let toc = crate::toc::build(&tokens, &doc);

        let all_links = vec![(uri.clone(), links.clone())];
        let refs = find_references(&ws, &config, &uri, Position::new(0, 0), &toc, &links, &all_links).await;
        assert_eq!(refs.len(), 2);
    }
}
