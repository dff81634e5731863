//! Shared text/JSON rendering helpers. Most subcommands support both a
//! colored human-readable form and `--json` for scripting, mirroring
//! `blz-cli`'s two-output-format convention.

use colored::Colorize;
use md_core::{Position, Range};
use serde_json::Value;

pub fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

pub fn format_position(pos: Position) -> String {
    format!("{}:{}", pos.line, pos.character)
}

pub fn format_range(range: Range) -> String {
    format!("{}-{}", format_position(range.start), format_position(range.end))
}

pub fn dim(text: &str) -> String {
    text.dimmed().to_string()
}
