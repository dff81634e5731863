//! File-rename link planner (spec §4.13, C13).
//!
//! New logic against spec §4.13 — `blz` never rewrites source files it
//! doesn't own, so there is no teacher analogue for the rewriting itself.
//! The path-rewriting primitives it builds on (balanced-paren detection,
//! percent decoding) are [`crate::link`]/[`crate::resolver`]'s, and the
//! "same document" and "existing target" helpers are shared with
//! [`crate::references`] so a rename and a find-references query agree on
//! what a link points at.

use crate::config::{Config, PreferredMdPathExtensionStyle};
use crate::edit::{TextEdit, WorkspaceEdit};
use crate::link::{Href, MdLink};
use crate::references::paths_refer_to_same_document;
use crate::uri::Uri;
use crate::workspace::Workspace;

/// One `{ oldUri, newUri }` rename, applied in the order given (spec
/// §4.13: "across multiple simultaneous renames, each subsequent rewrite
/// sees links through all other renames that apply to the same resolved
/// target").
#[derive(Debug, Clone)]
pub struct Rename {
    pub old_uri: Uri,
    pub new_uri: Uri,
}

/// Plan the workspace edit for a batch of renames.
///
/// `all_links` is every workspace document's already-extracted link list,
/// keyed by the document's URI *before* any of `renames` are applied — the
/// same value a caller would read out of the workspace-info cache (C9)
/// just prior to the rename.
pub async fn plan_renames<W: Workspace + ?Sized>(
    workspace: &W,
    config: &Config,
    renames: &[Rename],
    all_links: &[(Uri, Vec<MdLink>)],
) -> WorkspaceEdit {
    let mut edit = WorkspaceEdit::new();
    let folders = workspace.workspace_folders();

    // A resolved target moves through every rename that touches it or an
    // ancestor of it, in order, so later renames in the batch see the
    // cumulative effect of earlier ones.
    let remap = |uri: &Uri| -> Uri {
        let mut current = uri.clone();
        for r in renames {
            if let Some(rebased) = r.old_uri.rebase(&current, &r.new_uri) {
                current = rebased;
            }
        }
        current
    };

    for rename in renames {
        if rename.old_uri != rename.new_uri {
            edit.add_rename(rename.old_uri.clone(), rename.new_uri.clone());
        }

        if is_directory_rename(workspace, rename, config).await {
            plan_directory_rename(config, &folders, rename, &remap, all_links, &mut edit);
        } else {
            plan_file_rename(config, &folders, rename, &remap, all_links, &mut edit);
        }
    }

    edit
}

async fn is_directory_rename<W: Workspace + ?Sized>(workspace: &W, rename: &Rename, config: &Config) -> bool {
    if let Some(stat) = workspace.stat(&rename.new_uri).await {
        return stat.is_directory;
    }
    if let Some(stat) = workspace.stat(&rename.old_uri).await {
        return stat.is_directory;
    }
    // Neither side exists yet in the workspace under test (typical of an
    // in-memory fixture); fall back to an extension heuristic.
    !config.is_markdown_path(rename.new_uri.path()) && rename.new_uri.extension().is_none()
}

fn plan_directory_rename(
    config: &Config,
    folders: &[Uri],
    rename: &Rename,
    remap: &dyn Fn(&Uri) -> Uri,
    all_links: &[(Uri, Vec<MdLink>)],
    edit: &mut WorkspaceEdit,
) {
    for (doc_uri, links) in all_links {
        let doc_uri_after = remap(doc_uri);
        let doc_moved = &doc_uri_after != doc_uri;

        for link in links {
            let Href::Internal { path, fragment } = link.href() else {
                continue;
            };
            let target_moved = rename.old_uri.is_ancestor_of(path);
            if !target_moved && !doc_moved {
                continue;
            }

            let new_target = if target_moved {
                rename.old_uri.rebase(path, &rename.new_uri).unwrap_or_else(|| path.clone())
            } else {
                path.clone()
            };

            let source = link.source();
            let original_escaped_via_dotdot = !is_absolute_path_text(&source.path_text)
                && !is_external_path_text(&source.path_text)
                && source.path_text.starts_with("..");

            let Some(new_text) = rewrite_link_target(
                source.path_text.as_str(),
                source.is_angle_bracket_link,
                fragment,
                &new_target,
                &doc_uri_after,
                folders,
                config,
                doc_moved && !target_moved && original_escaped_via_dotdot,
            ) else {
                continue;
            };

            if new_text != source.href_text {
                edit.add_edit(doc_uri_after.clone(), TextEdit::new(source.href_range, new_text));
            }
        }
    }
}

fn plan_file_rename(
    config: &Config,
    folders: &[Uri],
    rename: &Rename,
    remap: &dyn Fn(&Uri) -> Uri,
    all_links: &[(Uri, Vec<MdLink>)],
    edit: &mut WorkspaceEdit,
) {
    let moved_is_markdown = config.is_markdown_path(rename.old_uri.path()) || config.is_markdown_path(rename.new_uri.path());

    for (doc_uri, links) in all_links {
        let is_moved_doc = doc_uri == &rename.old_uri;
        let doc_uri_after = if is_moved_doc { rename.new_uri.clone() } else { doc_uri.clone() };

        for link in links {
            let Href::Internal { path, fragment } = link.href() else {
                continue;
            };

            if is_moved_doc {
                if !moved_is_markdown {
                    continue;
                }
                // The moved file's own relative links: target is
                // unaffected unless it too was renamed in this batch, but
                // the base directory they're resolved from has changed.
                let new_target = remap(path);
                let source = link.source();
                let Some(new_text) = rewrite_link_target(
                    &source.path_text,
                    source.is_angle_bracket_link,
                    fragment,
                    &new_target,
                    &doc_uri_after,
                    folders,
                    config,
                    false,
                ) else {
                    continue;
                };
                if new_text != source.href_text {
                    edit.add_edit(doc_uri_after.clone(), TextEdit::new(source.href_range, new_text));
                }
                continue;
            }

            if !paths_refer_to_same_document(path, &rename.old_uri, config) {
                continue;
            }

            let source = link.source();
            let Some(new_text) = rewrite_link_target(
                &source.path_text,
                source.is_angle_bracket_link,
                fragment,
                &rename.new_uri,
                &doc_uri_after,
                folders,
                config,
                false,
            ) else {
                continue;
            };
            if new_text != source.href_text {
                edit.add_edit(doc_uri_after.clone(), TextEdit::new(source.href_range, new_text));
            }
        }
    }
}

fn is_absolute_path_text(path_text: &str) -> bool {
    path_text.starts_with('/')
}

fn is_external_path_text(path_text: &str) -> bool {
    crate::resolver::is_external_scheme(path_text)
}

/// Rewrite one link destination to point at `new_target`, preserving the
/// original's style (spec §4.13 "Style preservation rules").
///
/// `force_dot_prefix_if_no_dotdot` implements the directory-rename rule:
/// a `..`-escaping link whose recomputed form no longer needs to escape
/// (the rename brought the two paths into the same subtree) is marked
/// with an explicit `./` so it reads as deliberately relative rather than
/// as an unrelated same-directory reference.
#[allow(clippy::too_many_arguments)]
fn rewrite_link_target(
    original_path_text: &str,
    is_angle_bracket: bool,
    fragment: &str,
    new_target: &Uri,
    doc_uri_after: &Uri,
    folders: &[Uri],
    config: &Config,
    force_dot_prefix_if_no_dotdot: bool,
) -> Option<String> {
    if is_external_path_text(original_path_text) {
        return None;
    }

    let had_dot_slash = original_path_text.starts_with("./");
    let was_absolute = is_absolute_path_text(original_path_text);

    let mut base = if was_absolute {
        let folder = longest_matching_folder(new_target, folders);
        let rel = relative_path(folder.path(), new_target.path());
        format!("/{rel}")
    } else {
        let dir = doc_uri_after.dirname();
        let rel = relative_path(dir, new_target.path());
        if force_dot_prefix_if_no_dotdot && !rel.starts_with("..") && !rel.starts_with("./") {
            format!("./{rel}")
        } else if had_dot_slash && !rel.starts_with("..") && !rel.starts_with("./") {
            format!("./{rel}")
        } else {
            rel
        }
    };

    if should_drop_extension(original_path_text, new_target.path(), config) {
        if let Some(stripped) = strip_known_extension(&base, config) {
            base = stripped;
        }
    }

    // `href_range` spans only the interior of an angle-bracket link (the
    // `<`/`>` delimiters themselves sit outside the edited range), so an
    // angle-bracket rewrite only needs to re-escape literal `<`/`>`
    // characters that might appear in the path, not add new delimiters.
    let escaped = if is_angle_bracket {
        base.replace('<', "\\<").replace('>', "\\>")
    } else {
        escape_plain_path(&base)
    };

    Some(if fragment.is_empty() {
        escaped
    } else {
        format!("{escaped}#{fragment}")
    })
}

fn should_drop_extension(original_path_text: &str, new_path: &str, config: &Config) -> bool {
    if !config.is_markdown_path(new_path) {
        return false;
    }
    match config.preferred_md_path_extension_style {
        PreferredMdPathExtensionStyle::RemoveExtension => true,
        PreferredMdPathExtensionStyle::IncludeExtension => false,
        PreferredMdPathExtensionStyle::Auto => !path_text_has_extension(original_path_text),
    }
}

fn path_text_has_extension(path_text: &str) -> bool {
    let without_fragment = path_text.split('#').next().unwrap_or(path_text);
    let name = without_fragment.rsplit('/').next().unwrap_or(without_fragment);
    matches!(name.rfind('.'), Some(idx) if idx > 0)
}

fn strip_known_extension(path: &str, config: &Config) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let idx = name.rfind('.')?;
    if idx == 0 {
        return None;
    }
    let ext = &name[idx + 1..];
    if config.markdown_file_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
        Some(path[..path.len() - (name.len() - idx)].to_string())
    } else {
        None
    }
}

fn escape_plain_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            ' ' => out.push_str("%20"),
            '(' | ')' if !crate::link::has_balanced_parens(path) => {
                out.push('\\');
                out.push(ch);
            },
            _ => out.push(ch),
        }
    }
    out
}

/// The relative path from directory `from_dir` to file path `to_path`,
/// both `/`-joined absolute workspace paths. No leading `./`; `..` is used
/// for each level `to_path` lies above the common ancestor.
fn relative_path(from_dir: &str, to_path: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = to_path.split('/').filter(|s| !s.is_empty()).collect();
    if to.is_empty() {
        return String::new();
    }
    let to_dir = &to[..to.len() - 1];
    let file_name = to[to.len() - 1];

    let common = from.iter().zip(to_dir.iter()).take_while(|(a, b)| a == b).count();
    let ups = from.len() - common;
    let mut segments: Vec<&str> = std::iter::repeat("..").take(ups).collect();
    segments.extend_from_slice(&to_dir[common..]);
    segments.push(file_name);
    segments.join("/")
}

fn longest_matching_folder(reference: &Uri, folders: &[Uri]) -> Uri {
    folders
        .iter()
        .filter(|folder| folder.is_ancestor_of(reference))
        .max_by_key(|folder| folder.path().len())
        .cloned()
        .or_else(|| folders.first().cloned())
        .unwrap_or_else(|| reference.with_path("/"))
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
    async fn no_op_rename_produces_empty_edit() {
        // Testable property, spec §8: `oldUri -> oldUri` is a no-op.
        let ws = InMemoryWorkspace::new(vec![Uri::parse("file:///ws")]);
        let uri = Uri::parse("file:///ws/old.md");
        ws.upsert_document(TextDocument::new(uri.clone(), 1, "no links here\n"));
        let config = Config::default();
        let links = extract_for(
            &ws.open_markdown_document(&uri).await.unwrap(),
            &[Uri::parse("file:///ws")],
        );
        let all_links = vec![(uri.clone(), links)];
        let renames = vec![Rename { old_uri: uri.clone(), new_uri: uri.clone() }];
        let edit = plan_renames(&ws, &config, &renames, &all_links).await;
        assert!(edit.is_empty());
    }

    #[tokio::test]
    async fn single_file_rename_preserves_link_styles() {
        // Scenario 4, spec §8.
        let folders = vec![Uri::parse("file:///ws")];
        let ws = InMemoryWorkspace::new(folders.clone());
        let doc_uri = Uri::parse("file:///ws/doc.md");
        let text = "[x](/old.md) [y](old) [z](./old.md) [w]: ./old.md\n";
        let doc = TextDocument::new(doc_uri.clone(), 1, text);
        ws.upsert_document(doc.clone());
        ws.upsert_document(TextDocument::new(Uri::parse("file:///ws/old.md"), 1, "# Old\n"));

        let links = extract_for(&doc, &folders);
        let all_links = vec![(doc_uri.clone(), links)];
        let config = Config::default();

        let renames = vec![Rename {
            old_uri: Uri::parse("file:///ws/old.md"),
            new_uri: Uri::parse("file:///ws/new.md"),
        }];
        let edit = plan_renames(&ws, &config, &renames, &all_links).await;
        let result = edit.apply_to(&doc_uri, text);
        assert_eq!(result, "[x](/new.md) [y](new) [z](./new.md) [w]: ./new.md\n");
    }

    #[tokio::test]
    async fn directory_rename_rewrites_escaping_link() {
        // Scenario 5, spec §8: `old/doc.md` (containing `[abc](../a.md)`)
        // moves to `new/sub/doc.md`; the link becomes `../../a.md`.
        let folders = vec![Uri::parse("file:///ws")];
        let ws = InMemoryWorkspace::new(folders.clone());
        let doc_uri = Uri::parse("file:///ws/old/doc.md");
        let text = "[abc](../a.md)\n";
        let doc = TextDocument::new(doc_uri.clone(), 1, text);
        ws.upsert_document(doc.clone());
        ws.upsert_document(TextDocument::new(Uri::parse("file:///ws/a.md"), 1, "# A\n"));

        let links = extract_for(&doc, &folders);
        let all_links = vec![(doc_uri.clone(), links)];
        let config = Config::default();

        let renames = vec![Rename {
            old_uri: Uri::parse("file:///ws/old"),
            new_uri: Uri::parse("file:///ws/new/sub"),
        }];
        let edit = plan_renames(&ws, &config, &renames, &all_links).await;

        let new_doc_uri = Uri::parse("file:///ws/new/sub/doc.md");
        let result = edit.apply_to(&new_doc_uri, text);
        assert_eq!(result, "[abc](../../a.md)\n");
    }

    #[test]
    fn relative_path_computes_common_ancestor() {
        assert_eq!(relative_path("/ws/sub", "/ws/a.md"), "../a.md");
        assert_eq!(relative_path("/ws", "/ws/a.md"), "a.md");
        assert_eq!(relative_path("/ws/a/b", "/ws/a/c/d.md"), "../c/d.md");
    }
}
