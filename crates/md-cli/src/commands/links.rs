//! `mdls links` — list every link occurrence in a document (spec §4.6).

use crate::analysis::analyze;
use crate::output;
use crate::workspace_setup::resolve_uri;
use anyhow::Result;
use md_core::{FsWorkspace, Href, MdLink};
use serde_json::{json, Value};
use std::path::Path;

pub async fn run(workspace: &FsWorkspace, root: &Path, file: &Path, json_output: bool) -> Result<()> {
    let uri = resolve_uri(root, file);
    let analysis = analyze(workspace, &uri).await?;

    if json_output {
        let links: Vec<Value> = analysis.links.iter().map(describe_json).collect();
        output::print_json(&json!({ "links": links }));
        return Ok(());
    }

    for link in &analysis.links {
        println!("{} {}", output::format_range(link.source().range), describe_text(link));
    }
    Ok(())
}

fn kind_name(link: &MdLink) -> &'static str {
    match link {
        MdLink::Link { .. } => "link",
        MdLink::Definition { .. } => "definition",
        MdLink::AutoLink { .. } => "autolink",
    }
}

fn describe_text(link: &MdLink) -> String {
    let kind = kind_name(link);
    match link.href() {
        Href::External { uri } => format!("{kind} -> {uri}"),
        Href::Internal { path, fragment } if fragment.is_empty() => format!("{kind} -> {path}"),
        Href::Internal { path, fragment } => format!("{kind} -> {path}#{fragment}"),
        Href::Reference { reference } => format!("{kind} -> [{reference}]"),
    }
}

fn describe_json(link: &MdLink) -> Value {
    let href = match link.href() {
        Href::External { uri } => json!({ "type": "external", "uri": uri }),
        Href::Internal { path, fragment } => json!({
            "type": "internal",
            "path": path.to_string(),
            "fragment": fragment,
        }),
        Href::Reference { reference } => json!({ "type": "reference", "reference": reference }),
    };
    json!({
        "kind": kind_name(link),
        "range": output::format_range(link.source().range),
        "href": href,
    })
}
