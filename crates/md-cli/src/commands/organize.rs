//! `mdls organize` — move a document's link definitions to a trailing
//! block, optionally dropping unused ones (spec §4.14).

use crate::analysis::analyze;
use crate::output;
use crate::workspace_setup::{resolve_uri, uri_to_path};
use anyhow::{Context, Result};
use md_core::organize::organize as organize_doc;
use md_core::FsWorkspace;
use serde_json::json;
use std::path::Path;

pub async fn run(workspace: &FsWorkspace, root: &Path, file: &Path, remove_unused: bool, dry_run: bool, json_output: bool) -> Result<()> {
    let uri = resolve_uri(root, file);
    let analysis = analyze(workspace, &uri).await?;
    let edit = organize_doc(&analysis.doc, &analysis.links, remove_unused);

    if edit.is_empty() {
        if json_output {
            output::print_json(&json!({ "changed": false }));
        } else {
            println!("{}", output::dim("already organized"));
        }
        return Ok(());
    }

    let updated = edit.apply_to(&uri, analysis.doc.full_text());

    if json_output {
        output::print_json(&json!({ "changed": true, "dryRun": dry_run }));
    } else if dry_run {
        println!("{updated}");
    }

    if dry_run {
        return Ok(());
    }

    let path = uri_to_path(&uri).context("cannot write non-file URI")?;
    tokio::fs::write(&path, &updated)
        .await
        .with_context(|| format!("writing '{}'", path.display()))?;
    workspace.notify_changed(&uri);
    Ok(())
}
