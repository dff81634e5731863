//! Link destination resolution (spec §4.6 `resolveLink`, §4.10, C10).
//!
//! A free function over a document's URI and the workspace's folder list —
//! no caching, no I/O — grounded on `blz-core/src/url.rs`'s scheme-sniffing
//! plus dot-segment-joining approach to turning a raw destination string
//! into a fully resolved location.

use crate::link::Href;
use crate::uri::Uri;
use percent_encoding::percent_decode_str;

/// Resolve a raw link destination string relative to the document that
/// contains it.
///
/// `containing_document` is the URI whose directory relative links are
/// joined against; pass `None` to use `doc_uri` itself. A workspace exposes
/// this for containers such as notebooks, where a link inside a cell
/// resolves relative to the notebook file, not the synthetic cell URI.
#[must_use]
pub fn resolve_link(
    href_text: &str,
    doc_uri: &Uri,
    workspace_folders: &[Uri],
    containing_document: Option<&Uri>,
) -> Href {
    let trimmed = href_text.trim();

    if is_external_scheme(trimmed) {
        return Href::External {
            uri: trimmed.to_string(),
        };
    }

    let (path_part, fragment) = split_path_fragment(trimmed);
    let decoded_path = percent_decode_str(path_part).decode_utf8_lossy().into_owned();

    let base_uri = containing_document.unwrap_or(doc_uri);

    if decoded_path.is_empty() {
        return Href::Internal {
            path: doc_uri.without_fragment(),
            fragment,
        };
    }

    let resolved = if let Some(rest) = decoded_path.strip_prefix('/') {
        let folder = longest_matching_folder(base_uri, workspace_folders);
        folder.join(rest)
    } else if doc_uri.scheme() == "untitled" {
        let folder = workspace_folders
            .first()
            .cloned()
            .unwrap_or_else(|| base_uri.clone());
        folder.join(&decoded_path)
    } else {
        base_uri.join(&decoded_path)
    };

    Href::Internal {
        path: resolved.without_fragment(),
        fragment,
    }
}

/// Whether `s` begins with a recognized absolute-URI scheme
/// (`^[a-z][a-z0-9+.\-]+:`, i.e. at least two scheme characters before the
/// colon).
#[must_use]
pub fn is_external_scheme(s: &str) -> bool {
    external_scheme_len(s).is_some()
}

fn external_scheme_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || !bytes[0].is_ascii_lowercase() {
        return None;
    }
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b':' if i >= 2 => return Some(i),
            b'a'..=b'z' | b'0'..=b'9' | b'+' | b'.' | b'-' => i += 1,
            _ => return None,
        }
    }
    None
}

fn split_path_fragment(s: &str) -> (&str, String) {
    match s.split_once('#') {
        Some((path, frag)) => (path, frag.to_string()),
        None => (s, String::new()),
    }
}

/// The workspace folder whose path is the longest ancestor prefix of
/// `reference`, falling back to the first folder, falling back to a
/// synthetic root derived from `reference` itself when no folders are
/// configured.
fn longest_matching_folder(reference: &Uri, folders: &[Uri]) -> Uri {
    folders
        .iter()
        .filter(|folder| folder.is_ancestor_of(reference))
        .max_by_key(|folder| folder.path().len())
        .cloned()
        .or_else(|| folders.first().cloned())
        .unwrap_or_else(|| Uri::from_parts(reference.scheme(), reference.authority().map(str::to_string), "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        Uri::parse(s)
    }

    #[test]
    fn recognizes_external_schemes() {
        assert!(is_external_scheme("http://example.com"));
        assert!(is_external_scheme("mailto:a@b.com"));
        assert!(!is_external_scheme("a"));
        assert!(!is_external_scheme("./relative.md"));
        assert!(!is_external_scheme("C:/windows/path"));
    }

    #[test]
    fn empty_path_resolves_to_current_document() {
        let doc = uri("file:///ws/doc.md");
        let href = resolve_link("#section", &doc, &[], None);
        assert_eq!(
            href,
            Href::Internal {
                path: doc.without_fragment(),
                fragment: "section".to_string(),
            }
        );
    }

    #[test]
    fn relative_path_joins_document_dirname() {
        let doc = uri("file:///ws/sub/doc.md");
        let href = resolve_link("../a.md", &doc, &[], None);
        assert_eq!(
            href,
            Href::Internal {
                path: uri("file:///ws/a.md"),
                fragment: String::new(),
            }
        );
    }

    #[test]
    fn absolute_path_joins_longest_matching_workspace_folder() {
        let folders = vec![uri("file:///ws"), uri("file:///ws/nested")];
        let doc = uri("file:///ws/nested/doc.md");
        let href = resolve_link("/x.md", &doc, &folders, None);
        assert_eq!(
            href,
            Href::Internal {
                path: uri("file:///ws/nested/x.md"),
                fragment: String::new(),
            }
        );
    }

    #[test]
    fn untitled_scheme_resolves_relative_to_workspace_root() {
        let folders = vec![uri("file:///ws")];
        let doc = uri("untitled:Untitled-1");
        let href = resolve_link("a.md", &doc, &folders, None);
        assert_eq!(
            href,
            Href::Internal {
                path: uri("file:///ws/a.md"),
                fragment: String::new(),
            }
        );
    }

    #[test]
    fn containing_document_overrides_relative_base() {
        let cell = uri("vscode-notebook-cell:///nb.md#cell1");
        let notebook = uri("file:///ws/nb.md");
        let href = resolve_link("./a.md", &cell, &[], Some(&notebook));
        assert_eq!(
            href,
            Href::Internal {
                path: uri("file:///ws/a.md"),
                fragment: String::new(),
            }
        );
    }

    #[test]
    fn percent_escaped_paths_are_decoded() {
        let doc = uri("file:///ws/doc.md");
        let href = resolve_link("a%20b.md", &doc, &[], None);
        assert_eq!(
            href,
            Href::Internal {
                path: uri("file:///ws/a b.md"),
                fragment: String::new(),
            }
        );
    }
}
