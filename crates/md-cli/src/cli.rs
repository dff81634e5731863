//! Command-line surface for `mdls`.
//!
//! Subcommands map roughly one-to-one onto `md-core`'s per-request
//! algorithms: `toc`/`links` are read-only extractors, `diagnose` and
//! `references` are analysis queries, and `rename`/`organize` produce and
//! (unless `--dry-run`) apply a workspace edit.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mdls")]
#[command(version)]
#[command(
    about = "Inspect table of contents, links, diagnostics, references, and rename/organize refactorings for a directory of Markdown files"
)]
pub struct Cli {
    /// Workspace root that relative file arguments and `/`-rooted links are
    /// resolved against. Defaults to the current directory.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML configuration file. Defaults to `<root>/.mdls.toml` if present,
    /// otherwise the built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of colored text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a document's table of contents.
    Toc { file: PathBuf },

    /// List every link occurrence in a document.
    Links { file: PathBuf },

    /// Validate references, fragments, and cross-file links.
    ///
    /// Without `file`, every Markdown document under the workspace root is
    /// checked. Exits non-zero if any diagnostic was raised.
    Diagnose {
        file: Option<PathBuf>,
        /// Also flag link definitions with no referring link.
        #[arg(long)]
        unused: bool,
        /// Also flag duplicate link definitions.
        #[arg(long)]
        duplicates: bool,
    },

    /// Find every reference to whatever sits at a 0-based `line:character`
    /// position in a document.
    References {
        file: PathBuf,
        #[arg(value_parser = parse_position)]
        position: (u32, u32),
    },

    /// Plan the link fixups for moving `from` to `to`, applying them (and
    /// performing the move) unless `--dry-run` is given.
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },

    /// Move a document's link definitions to a trailing block, sorted
    /// case-insensitively by reference name.
    Organize {
        file: PathBuf,
        /// Drop definitions with no referring link.
        #[arg(long)]
        remove_unused: bool,
        /// Print the result instead of writing it back.
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_position(s: &str) -> Result<(u32, u32), String> {
    let (line, character) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LINE:CHARACTER, got '{s}'"))?;
    let line: u32 = line
        .parse()
        .map_err(|_| format!("'{line}' is not a valid line number"))?;
    let character: u32 = character
        .parse()
        .map_err(|_| format!("'{character}' is not a valid character offset"))?;
    Ok((line, character))
}
