//! `mdls diagnose` — run the diagnostics engine over one document or every
//! Markdown document in the workspace (spec §4.12).

use crate::analysis::analyze;
use crate::output;
use crate::workspace_setup::resolve_uri;
use anyhow::Result;
use md_core::diagnostics::{diagnose as run_diagnose, Diagnostic, DiagnosticOptions};
use md_core::{Config, FsWorkspace, LinkDefinitionSet, MdLink, Uri, Workspace};
use serde_json::{json, Value};
use std::path::Path;

pub async fn run(
    workspace: &FsWorkspace,
    config: &Config,
    root: &Path,
    file: Option<&Path>,
    unused: bool,
    duplicates: bool,
    json_output: bool,
) -> Result<()> {
    let options = DiagnosticOptions {
        validate_unused_link_definitions: unused,
        validate_duplicate_link_definitions: duplicates,
        ..DiagnosticOptions::default()
    };

    let targets: Vec<Uri> = match file {
        Some(file) => vec![resolve_uri(root, file)],
        None => workspace
            .get_all_markdown_documents()
            .await?
            .into_iter()
            .map(|doc| doc.uri().clone())
            .collect(),
    };

    let mut by_file: Vec<(Uri, Vec<Diagnostic>)> = Vec::with_capacity(targets.len());
    for uri in targets {
        let analysis = analyze(workspace, &uri).await?;
        let definitions = definitions_from(&analysis.links);
        let diags = run_diagnose(workspace, config, &analysis.doc, &analysis.links, &analysis.toc, &definitions, &options).await;
        by_file.push((uri, diags));
    }

    let had_diagnostics = by_file.iter().any(|(_, diags)| !diags.is_empty());

    if json_output {
        let files: Vec<Value> = by_file
            .iter()
            .map(|(uri, diags)| {
                json!({
                    "uri": uri.to_string(),
                    "diagnostics": diags.iter().map(describe_json).collect::<Vec<_>>(),
                })
            })
            .collect();
        output::print_json(&json!({ "files": files }));
    } else {
        for (uri, diags) in &by_file {
            for diag in diags {
                println!("{uri} {} {}", output::format_range(diag.range), describe_text(diag));
            }
        }
    }

    if had_diagnostics {
        std::process::exit(1);
    }
    Ok(())
}

fn definitions_from(links: &[MdLink]) -> LinkDefinitionSet {
    let mut set = LinkDefinitionSet::new();
    for link in links {
        if matches!(link, MdLink::Definition { .. }) {
            set.insert_if_absent(link.clone());
        }
    }
    set
}

fn describe_text(diag: &Diagnostic) -> String {
    format!("{:?}: {}", diag.kind, diag.message)
}

fn describe_json(diag: &Diagnostic) -> Value {
    json!({
        "kind": format!("{:?}", diag.kind),
        "range": output::format_range(diag.range),
        "message": diag.message,
    })
}
