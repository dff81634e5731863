//! Primary entrypoint for the `mdls` command-line harness over `md-core`.

mod analysis;
mod cli;
mod commands;
mod output;
mod workspace_setup;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let (workspace, config) = workspace_setup::load(&root, cli.config.as_deref()).await?;

    match &cli.command {
        Commands::Toc { file } => commands::toc::run(&workspace, &root, file, cli.json).await,
        Commands::Links { file } => commands::links::run(&workspace, &root, file, cli.json).await,
        Commands::Diagnose { file, unused, duplicates } => {
            commands::diagnose::run(&workspace, &config, &root, file.as_deref(), *unused, *duplicates, cli.json).await
        },
        Commands::References { file, position } => {
            commands::references::run(&workspace, &config, &root, file, *position, cli.json).await
        },
        Commands::Rename { from, to, dry_run } => {
            commands::rename::run(&workspace, &config, &root, from, to, *dry_run, cli.json).await
        },
        Commands::Organize { file, remove_unused, dry_run } => {
            commands::organize::run(&workspace, &root, file, *remove_unused, *dry_run, cli.json).await
        },
    }
}
