//! `mdls references` — find every reference to whatever sits at a given
//! position (spec §4.11).

use crate::analysis::{analyze, analyze_all};
use crate::output;
use crate::workspace_setup::resolve_uri;
use anyhow::Result;
use md_core::references::find_references;
use md_core::{Config, FsWorkspace, Position};
use serde_json::json;
use std::path::Path;

pub async fn run(
    workspace: &FsWorkspace,
    config: &Config,
    root: &Path,
    file: &Path,
    position: (u32, u32),
    json_output: bool,
) -> Result<()> {
    let uri = resolve_uri(root, file);
    let analysis = analyze(workspace, &uri).await?;

    let all = analyze_all(workspace).await?;
    let all_links: Vec<_> = all.iter().map(|(u, a)| (u.clone(), a.links.clone())).collect();

    let pos = Position::new(position.0, position.1);
    let refs = find_references(workspace, config, &uri, pos, &analysis.toc, &analysis.links, &all_links).await;

    if json_output {
        let items: Vec<_> = refs
            .iter()
            .map(|r| {
                json!({
                    "uri": r.uri.to_string(),
                    "range": output::format_range(r.range),
                    "isTriggerLocation": r.is_trigger_location,
                })
            })
            .collect();
        output::print_json(&json!({ "references": items }));
        return Ok(());
    }

    for r in &refs {
        let marker = if r.is_trigger_location { "*" } else { " " };
        println!("{marker} {} {}", r.uri, output::format_range(r.range));
    }
    Ok(())
}
