//! `md-core`: an editor-agnostic Markdown language service engine.
//!
//! Given a [`workspace::Workspace`] of CommonMark documents, this crate
//! produces the semantic artifacts an editor integration needs to drive
//! navigation, authoring, and refactoring features: document links,
//! headers/sections (table of contents), find-all-references, diagnostics,
//! file-rename link fixups, and organize/extract link-definition edits.
//!
//! Module layout mirrors the component breakdown in the design: leaf
//! value types first (`uri`, `document`, `slug`, `link`), the extractors
//! that build on them (`parser`, `no_link_ranges`, `link_extractor`,
//! `toc`), the caches that memoize per-document and per-workspace results
//! (`doc_cache`, `workspace_cache`), and finally the request-level
//! algorithms that consume all of the above (`resolver`, `references`,
//! `diagnostics`, `rename`, `organize`).

pub mod config;
pub mod diagnostics;
pub mod doc_cache;
pub mod document;
pub mod edit;
pub mod error;
pub mod link;
pub mod link_extractor;
pub mod no_link_ranges;
pub mod organize;
pub mod parser;
pub mod references;
pub mod rename;
pub mod resolver;
pub mod slug;
pub mod toc;
pub mod uri;
pub mod workspace;
pub mod workspace_cache;

pub use config::Config;
pub use document::{Position, Range, TextDocument};
pub use edit::{FileRename, TextEdit, WorkspaceEdit};
pub use error::{Error, Result};
pub use link::{Href, LinkDefinitionSet, LinkSource, MdLink};
pub use rename::Rename;
pub use slug::Slug;
pub use toc::{Toc, TocEntry};
pub use uri::Uri;
pub use workspace::{FsWorkspace, InMemoryWorkspace, SharedWorkspace, Workspace};
