//! Diagnostics engine (spec §4.12, C12).
//!
//! Grounded on `blz-core`'s bounded-concurrency fetch pattern (`futures`
//! `buffer_unordered`, already in the teacher's dependency stack for
//! fanning out search-index reads) applied here to the stat phase instead.

use crate::config::{build_glob_set, Config};
use crate::document::{Position, Range, TextDocument};
use crate::link::{Href, LinkDefinitionSet, MdLink};
use crate::references::resolve_existing_target;
use crate::toc::Toc;
use crate::uri::Uri;
use crate::workspace::Workspace;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

const STAT_CONCURRENCY: usize = 10;

/// Which diagnostic kind was raised (spec §4.12: "codes are contracts").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    NoSuchReference,
    NoSuchHeaderInOwnFile,
    NoSuchFile,
    NoSuchHeaderInFile,
    UnusedLinkDefinition,
    DuplicateLinkDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub range: Range,
    pub message: String,
}

/// Per-request diagnostic options (spec §4.12).
#[derive(Debug, Clone)]
pub struct DiagnosticOptions {
    pub validate_references: bool,
    pub validate_fragment_links: bool,
    pub validate_file_links: bool,
    /// Falls back to `validate_fragment_links` when unset (spec §4.12).
    pub validate_markdown_file_link_fragments: Option<bool>,
    pub validate_unused_link_definitions: bool,
    pub validate_duplicate_link_definitions: bool,
    pub ignore_links: Vec<String>,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self {
            validate_references: true,
            validate_fragment_links: true,
            validate_file_links: true,
            validate_markdown_file_link_fragments: None,
            validate_unused_link_definitions: false,
            validate_duplicate_link_definitions: false,
            ignore_links: Vec::new(),
        }
    }
}

impl DiagnosticOptions {
    fn validate_file_fragments(&self) -> bool {
        self.validate_markdown_file_link_fragments
            .unwrap_or(self.validate_fragment_links)
    }
}

/// `#L5` or `#L5,3` — never diagnosed as missing headers (spec §8).
fn is_line_number_fragment(fragment: &str) -> bool {
    let Some(rest) = fragment.strip_prefix('L') else {
        return false;
    };
    let (line_part, col_part) = match rest.split_once(',') {
        Some((l, c)) => (l, Some(c)),
        None => (rest, None),
    };
    if line_part.is_empty() || !line_part.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match col_part {
        Some(c) if c.is_empty() || !c.bytes().all(|b| b.is_ascii_digit()) => false,
        _ => true,
    }
}

fn definitions_from_links(links: &[MdLink]) -> LinkDefinitionSet {
    let mut set = LinkDefinitionSet::new();
    for link in links {
        if matches!(link, MdLink::Definition { .. }) {
            set.insert_if_absent(link.clone());
        }
    }
    set
}

/// Run every configured diagnostic check for `doc` (spec §4.12).
///
/// `links`/`toc` are `doc`'s own already-extracted link list and table of
/// contents (C6/C7); `definitions` is the document's deduplicated
/// definition set (C6 `LinkDefinitionSet`), built once and shared with
/// other per-document operations.
pub async fn diagnose<W: Workspace + ?Sized>(
    workspace: &W,
    config: &Config,
    _doc: &TextDocument,
    links: &[MdLink],
    toc: &Toc,
    definitions: &LinkDefinitionSet,
    options: &DiagnosticOptions,
) -> Vec<Diagnostic> {
    let ignore = build_glob_set(&options.ignore_links).unwrap_or_else(|_| build_glob_set(&[]).expect("empty glob set always builds"));
    let mut out = Vec::new();

    if options.validate_references {
        out.extend(check_references(links, definitions));
    }

    if options.validate_unused_link_definitions {
        out.extend(check_unused_definitions(links, definitions));
    }

    if options.validate_duplicate_link_definitions {
        out.extend(check_duplicate_definitions(links));
    }

    let internal: Vec<(&Href, &crate::link::LinkSource)> = links
        .iter()
        .filter_map(|l| match l.href() {
            href @ Href::Internal { .. } => Some((href, l.source())),
            _ => None,
        })
        .filter(|(_, source)| !ignore.is_match(&source.path_text) && !ignore.is_match(&source.href_text))
        .collect();

    if options.validate_fragment_links {
        out.extend(check_own_fragment(&internal, toc));
    }

    let cross_file: Vec<(&Uri, &str, &crate::link::LinkSource)> = internal
        .iter()
        .filter_map(|(href, source)| match href {
            Href::Internal { path, fragment } if !source.path_text.is_empty() => Some((path, fragment.as_str(), *source)),
            _ => None,
        })
        .collect();

    if options.validate_file_links || options.validate_file_fragments() {
        out.extend(
            check_cross_file(workspace, config, &cross_file, options)
                .await,
        );
    }

    out
}

fn check_references(links: &[MdLink], definitions: &LinkDefinitionSet) -> Vec<Diagnostic> {
    links
        .iter()
        .filter_map(|link| match (link, link.href()) {
            (MdLink::Link { .. }, Href::Reference { reference }) if !definitions.contains(reference) => Some(Diagnostic {
                kind: DiagnosticKind::NoSuchReference,
                range: link.source().href_range,
                message: format!("No link definition found for reference '{reference}'"),
            }),
            _ => None,
        })
        .collect()
}

fn check_unused_definitions(links: &[MdLink], definitions: &LinkDefinitionSet) -> Vec<Diagnostic> {
    let used: HashSet<String> = links
        .iter()
        .filter_map(|link| match link.href() {
            Href::Reference { reference } => Some(crate::link::normalize_reference_name(reference)),
            _ => None,
        })
        .collect();

    definitions
        .iter()
        .filter_map(|def| {
            let MdLink::Definition { source, reference, .. } = def else {
                return None;
            };
            let key = crate::link::normalize_reference_name(&reference.text);
            if used.contains(&key) {
                None
            } else {
                Some(Diagnostic {
                    kind: DiagnosticKind::UnusedLinkDefinition,
                    range: source.range,
                    message: format!("Link definition '{}' is unused", reference.text),
                })
            }
        })
        .collect()
}

fn check_duplicate_definitions(links: &[MdLink]) -> Vec<Diagnostic> {
    let definitions: Vec<&crate::link::DefinitionRef> = links
        .iter()
        .filter_map(|link| match link {
            MdLink::Definition { reference, .. } => Some(reference),
            _ => None,
        })
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for reference in &definitions {
        *counts.entry(crate::link::normalize_reference_name(&reference.text)).or_default() += 1;
    }

    definitions
        .iter()
        .filter(|reference| counts[&crate::link::normalize_reference_name(&reference.text)] > 1)
        .map(|reference| Diagnostic {
            kind: DiagnosticKind::DuplicateLinkDefinition,
            range: reference.range,
            message: format!("Duplicate link definition '{}'", reference.text),
        })
        .collect()
}

fn check_own_fragment(internal: &[(&Href, &crate::link::LinkSource)], toc: &Toc) -> Vec<Diagnostic> {
    internal
        .iter()
        .filter_map(|(href, source)| {
            let Href::Internal { fragment, .. } = href else {
                return None;
            };
            if !source.path_text.is_empty() || fragment.is_empty() || is_line_number_fragment(fragment) {
                return None;
            }
            if toc.lookup_by_fragment(fragment).is_some() {
                return None;
            }
            let range = source.fragment_range.unwrap_or(source.href_range);
            Some(Diagnostic {
                kind: DiagnosticKind::NoSuchHeaderInOwnFile,
                range,
                message: format!("No header found for fragment '#{fragment}'"),
            })
        })
        .collect()
}

async fn check_cross_file<W: Workspace + ?Sized>(
    workspace: &W,
    config: &Config,
    cross_file: &[(&Uri, &str, &crate::link::LinkSource)],
    options: &DiagnosticOptions,
) -> Vec<Diagnostic> {
    let unique_paths: Vec<Uri> = {
        let mut seen = HashSet::new();
        cross_file
            .iter()
            .filter_map(|(path, ..)| {
                let key = path.to_string();
                seen.insert(key).then(|| (*path).clone())
            })
            .collect()
    };

    let resolved: HashMap<String, Option<Uri>> = stream::iter(unique_paths.into_iter())
        .map(|path| async move {
            let target = resolve_existing_target(workspace, config, &path).await;
            (path.to_string(), target)
        })
        .buffer_unordered(STAT_CONCURRENCY)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect();

    let mut out = Vec::new();
    for (path, fragment, source) in cross_file {
        let Some(target) = resolved.get(&path.to_string()) else {
            continue;
        };
        let Some(target) = target else {
            if options.validate_file_links {
                out.push(Diagnostic {
                    kind: DiagnosticKind::NoSuchFile,
                    range: source.href_range,
                    message: format!("File '{}' does not exist", source.path_text),
                });
            }
            continue;
        };

        if fragment.is_empty() || is_line_number_fragment(fragment) || !options.validate_file_fragments() {
            continue;
        }
        if !config.is_markdown_path(target.path()) {
            continue;
        }
        let Some(target_doc) = workspace.open_markdown_document(target).await else {
            continue;
        };
        let Ok(mut parser) = crate::parser::MarkdownParser::new() else {
            continue;
        };
        let Ok(tokens) = parser.tokenize(&target_doc) else {
            continue;
        };
        let target_toc = crate::toc::build(&tokens, &target_doc);
        if target_toc.lookup_by_fragment(fragment).is_none() {
            let range = source.fragment_range.unwrap_or(source.href_range);
            out.push(Diagnostic {
                kind: DiagnosticKind::NoSuchHeaderInFile,
                range,
                message: format!("No header found for fragment '#{fragment}' in '{}'", source.path_text),
            });
        }
    }
    out
}

// ---------------------------------------------------------------------
// File-watch integration (spec §4.12 "File-watch integration").
// ---------------------------------------------------------------------

/// Emitted when a file that one or more documents link to is created or
/// deleted (spec §6 `onLinkedToFileChanged`).
#[derive(Debug, Clone)]
pub struct LinkedToFileChanged {
    pub changed_resource: Uri,
    pub linking_resources: Vec<Uri>,
}

/// Tracks, per referenced target path, which documents' link sets include
/// it — owned by the diagnostics engine per spec §5 ("the file-link
/// watcher state is owned by the diagnostics engine").
#[derive(Default)]
pub struct FileLinkWatchState {
    referrers: Mutex<HashMap<String, HashSet<String>>>,
}

impl FileLinkWatchState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of file-link targets tracked for `doc_uri`.
    pub fn update_document(&self, doc_uri: &Uri, targets: &[Uri]) {
        let doc_key = doc_uri.to_string();
        let mut referrers = self.referrers.lock().unwrap();
        for set in referrers.values_mut() {
            set.remove(&doc_key);
        }
        for target in targets {
            referrers.entry(target.to_string()).or_default().insert(doc_key.clone());
        }
        referrers.retain(|_, set| !set.is_empty());
    }

    /// Documents that currently link to `target`, if `target`'s create or
    /// delete event should be surfaced.
    #[must_use]
    pub fn linked_to_file_changed(&self, target: &Uri) -> Option<LinkedToFileChanged> {
        let referrers = self.referrers.lock().unwrap();
        let linking: Vec<Uri> = referrers
            .get(&target.to_string())?
            .iter()
            .map(|s| Uri::parse(s))
            .collect();
        if linking.is_empty() {
            None
        } else {
            Some(LinkedToFileChanged {
                changed_resource: target.clone(),
                linking_resources: linking,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_extractor;
    use crate::no_link_ranges::NoLinkRanges;
    use crate::parser::MarkdownParser;
    use crate::resolver::resolve_link;
    use crate::workspace::InMemoryWorkspace;

    fn analyze(doc: &TextDocument, folders: &[Uri]) -> (Vec<MdLink>, Toc) {
        let tokens = MarkdownParser::new().unwrap().tokenize(doc).unwrap();
        let no_link = NoLinkRanges::compute(&tokens, doc);
        let doc_uri = doc.uri().clone();
        let folders_owned = folders.to_vec();
        let resolve = move |href: &str| resolve_link(href, &doc_uri, &folders_owned, None);
        let links = link_extractor::extract(doc, &no_link, &resolve);
        let toc = crate::toc::build(&tokens, doc);
        (links, toc)
    }

    #[tokio::test]
    async fn path_bearing_link_to_own_file_is_cross_file_not_own_fragment() {
        // Scenario 1 from spec §8: `doc.md#no-such` names a path, even though
        // that path happens to resolve to the linking document itself, so it
        // must be diagnosed as `NoSuchHeaderInFile`, not `NoSuchHeaderInOwnFile`.
        let ws = InMemoryWorkspace::new(vec![Uri::parse("file:///ws")]);
        let uri = Uri::parse("file:///ws/sub/doc.md");
        let text = "[bad](doc.md#no-such)\n";
        let doc = TextDocument::new(uri.clone(), 1, text);
        ws.upsert_document(doc.clone());

        let folders = vec![Uri::parse("file:///ws")];
        let (links, toc) = analyze(&doc, &folders);
        let config = Config::default();
        let definitions = definitions_from_links(&links);
        let options = DiagnosticOptions::default();

        let diags = diagnose(&ws, &config, &doc, &links, &toc, &definitions, &options).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::NoSuchHeaderInFile);
    }

    #[tokio::test]
    async fn pure_fragment_link_is_diagnosed_as_own_file() {
        let ws = InMemoryWorkspace::new(vec![Uri::parse("file:///ws")]);
        let uri = Uri::parse("file:///ws/doc.md");
        let text = "[bad](#no-such)\n";
        let doc = TextDocument::new(uri.clone(), 1, text);
        ws.upsert_document(doc.clone());

        let folders = vec![Uri::parse("file:///ws")];
        let (links, toc) = analyze(&doc, &folders);
        let config = Config::default();
        let definitions = definitions_from_links(&links);
        let options = DiagnosticOptions::default();

        let diags = diagnose(&ws, &config, &doc, &links, &toc, &definitions, &options).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::NoSuchHeaderInOwnFile);
    }

    #[tokio::test]
    async fn missing_reference_is_flagged() {
        let ws = InMemoryWorkspace::new(vec![]);
        let uri = Uri::parse("file:///doc.md");
        let text = "[a][b]\n";
        let doc = TextDocument::new(uri.clone(), 1, text);
        let (links, toc) = analyze(&doc, &[]);
        let config = Config::default();
        let definitions = definitions_from_links(&links);
        let options = DiagnosticOptions::default();

        let diags = diagnose(&ws, &config, &doc, &links, &toc, &definitions, &options).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::NoSuchReference);
    }

    #[tokio::test]
    async fn defining_the_reference_clears_the_diagnostic() {
        let ws = InMemoryWorkspace::new(vec![Uri::parse("file:///ws")]);
        let uri = Uri::parse("file:///ws/doc.md");
        let text = "[a][b]\n\n[b]: /x.md\n";
        let doc = TextDocument::new(uri.clone(), 1, text);
        let folders = vec![Uri::parse("file:///ws")];
        let (links, toc) = analyze(&doc, &folders);
        let config = Config::default();
        let definitions = definitions_from_links(&links);
        let mut options = DiagnosticOptions::default();
        options.validate_file_links = false;

        let diags = diagnose(&ws, &config, &doc, &links, &toc, &definitions, &options).await;
        assert!(diags.iter().all(|d| d.kind != DiagnosticKind::NoSuchReference));
    }

    #[tokio::test]
    async fn duplicate_definitions_flags_every_occurrence() {
        let ws = InMemoryWorkspace::new(vec![]);
        let uri = Uri::parse("file:///doc.md");
        let text = "[a][b]\n\n[b]: /x.md\n[b]: /y.md\n";
        let doc = TextDocument::new(uri.clone(), 1, text);
        let (links, toc) = analyze(&doc, &[]);
        let config = Config::default();
        let definitions = definitions_from_links(&links);
        let options = DiagnosticOptions {
            validate_duplicate_link_definitions: true,
            ..DiagnosticOptions::default()
        };

        let diags = diagnose(&ws, &config, &doc, &links, &toc, &definitions, &options).await;
        let dupes: Vec<_> = diags.iter().filter(|d| d.kind == DiagnosticKind::DuplicateLinkDefinition).collect();
        assert_eq!(dupes.len(), 2, "both occurrences of the duplicated reference must be flagged");
    }

    #[tokio::test]
    async fn line_number_fragments_are_never_diagnosed() {
        let ws = InMemoryWorkspace::new(vec![]);
        let uri = Uri::parse("file:///doc.md");
        let text = "[x](#L5,3)\n";
        let doc = TextDocument::new(uri.clone(), 1, text);
        let (links, toc) = analyze(&doc, &[]);
        let config = Config::default();
        let definitions = definitions_from_links(&links);
        let options = DiagnosticOptions::default();

        let diags = diagnose(&ws, &config, &doc, &links, &toc, &definitions, &options).await;
        assert!(diags.is_empty());
    }

    #[test]
    fn file_link_watch_tracks_referrers() {
        let state = FileLinkWatchState::new();
        let doc = Uri::parse("file:///a.md");
        let target = Uri::parse("file:///b.md");
        state.update_document(&doc, &[target.clone()]);
        let changed = state.linked_to_file_changed(&target).unwrap();
        assert_eq!(changed.linking_resources, vec![doc]);
    }
}
