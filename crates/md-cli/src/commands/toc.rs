//! `mdls toc` — print a document's table of contents (spec §4.7).

use crate::analysis::analyze;
use crate::output;
use crate::workspace_setup::resolve_uri;
use anyhow::Result;
use md_core::FsWorkspace;
use serde_json::json;
use std::path::Path;

pub async fn run(workspace: &FsWorkspace, root: &Path, file: &Path, json_output: bool) -> Result<()> {
    let uri = resolve_uri(root, file);
    let analysis = analyze(workspace, &uri).await?;

    if json_output {
        let entries: Vec<_> = analysis
            .toc
            .entries()
            .iter()
            .map(|e| {
                json!({
                    "slug": e.slug.value(),
                    "text": e.text,
                    "level": e.level,
                    "line": e.line,
                })
            })
            .collect();
        output::print_json(&json!({ "entries": entries }));
        return Ok(());
    }

    for entry in analysis.toc.entries() {
        let indent = "  ".repeat(entry.level.saturating_sub(1) as usize);
        println!("{indent}{} {}", output::dim(&format!("#{}", entry.slug.value())), entry.text);
    }
    Ok(())
}
