//! Per-document analysis pipeline shared by every subcommand: parse once
//! and derive the token stream's downstream artifacts, the same sequence
//! `md-core`'s own tests use to exercise the extractor/TOC builder
//! together.

use anyhow::{Context, Result};
use md_core::link_extractor;
use md_core::no_link_ranges::NoLinkRanges;
use md_core::parser::MarkdownParser;
use md_core::resolver::resolve_link;
use md_core::{MdLink, TextDocument, Toc, Uri, Workspace};

pub struct Analysis {
    pub doc: TextDocument,
    pub toc: Toc,
    pub links: Vec<MdLink>,
}

pub async fn analyze<W: Workspace + ?Sized>(workspace: &W, uri: &Uri) -> Result<Analysis> {
    let doc = workspace
        .open_markdown_document(uri)
        .await
        .with_context(|| format!("'{uri}' is not a readable Markdown document"))?;

    let mut parser = MarkdownParser::new()?;
    let tokens = parser.tokenize(&doc)?;
    let no_link = NoLinkRanges::compute(&tokens, &doc);

    let folders = workspace.workspace_folders();
    let doc_uri = doc.uri().clone();
    let resolve = move |href: &str| resolve_link(href, &doc_uri, &folders, None);
    let links = link_extractor::extract(&doc, &no_link, &resolve);
    let toc = md_core::toc::build(&tokens, &doc);

    Ok(Analysis { doc, toc, links })
}

/// Every Markdown document in the workspace with its own analysis — the
/// shape `references`/`rename`/`diagnostics` need for their workspace-wide
/// `all_links` argument.
pub async fn analyze_all<W: Workspace + ?Sized>(workspace: &W) -> Result<Vec<(Uri, Analysis)>> {
    let docs = workspace.get_all_markdown_documents().await?;
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        let uri = doc.uri().clone();
        let analysis = analyze(workspace, &uri).await?;
        out.push((uri, analysis));
    }
    Ok(out)
}
