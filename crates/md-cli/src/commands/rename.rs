//! `mdls rename` — plan the link fixups for moving one path to another
//! (spec §4.13), apply them to every affected document, and perform the
//! filesystem move itself unless `--dry-run` is given.

use crate::analysis::analyze_all;
use crate::output;
use crate::workspace_setup::{resolve_uri, uri_to_path};
use anyhow::{Context, Result};
use md_core::rename::{plan_renames, Rename};
use md_core::{Config, FsWorkspace};
use serde_json::json;
use std::path::Path;

pub async fn run(
    workspace: &FsWorkspace,
    config: &Config,
    root: &Path,
    from: &Path,
    to: &Path,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    let old_uri = resolve_uri(root, from);
    let new_uri = resolve_uri(root, to);

    let all = analyze_all(workspace).await?;
    let all_links: Vec<_> = all.iter().map(|(u, a)| (u.clone(), a.links.clone())).collect();

    let renames = vec![Rename {
        old_uri: old_uri.clone(),
        new_uri: new_uri.clone(),
    }];
    let edit = plan_renames(workspace, config, &renames, &all_links).await;

    if json_output {
        let documents: Vec<_> = edit
            .documents()
            .map(|uri| json!({ "uri": uri.to_string(), "edits": edit.edits_for(uri).len() }))
            .collect();
        output::print_json(&json!({ "renames": edit.renames().len(), "documents": documents }));
    } else if edit.is_empty() {
        println!("{}", output::dim("no link fixups required"));
    } else {
        for uri in edit.documents() {
            println!("{uri}: {} edit(s)", edit.edits_for(uri).len());
        }
    }

    if dry_run {
        return Ok(());
    }

    for uri in edit.documents().cloned().collect::<Vec<_>>() {
        let path = uri_to_path(&uri).with_context(|| format!("cannot write non-file URI '{uri}'"))?;
        let original = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading '{}'", path.display()))?;
        let updated = edit.apply_to(&uri, &original);
        if updated != original {
            tokio::fs::write(&path, updated)
                .await
                .with_context(|| format!("writing '{}'", path.display()))?;
            workspace.notify_changed(&uri);
        }
    }

    let from_path = uri_to_path(&old_uri).context("rename source is not a file:// URI")?;
    let to_path = uri_to_path(&new_uri).context("rename destination is not a file:// URI")?;
    tokio::fs::rename(&from_path, &to_path)
        .await
        .with_context(|| format!("renaming '{}' to '{}'", from_path.display(), to_path.display()))?;

    Ok(())
}
