//! Workspace edit output types (spec §6 "Workspace edit output").
//!
//! A plain value type, not a builder pattern with side effects — grounded
//! on the data-first style of `blz-core`'s other output types rather than
//! on any particular editor protocol's edit representation.

use crate::document::Range;
use crate::uri::Uri;
use std::collections::HashMap;

/// One non-overlapping replacement in a single document's pre-edit
/// snapshot (spec §6: "idempotent replacements over non-overlapping ranges
/// in the pre-edit snapshot").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

impl TextEdit {
    #[must_use]
    pub fn new(range: Range, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }
}

/// A rename of one file or directory, as part of a workspace edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRename {
    pub old_uri: Uri,
    pub new_uri: Uri,
}

/// A set of text edits grouped by document URI, plus optional file-rename
/// operations (spec §6).
#[derive(Debug, Clone, Default)]
pub struct WorkspaceEdit {
    edits: HashMap<String, (Uri, Vec<TextEdit>)>,
    renames: Vec<FileRename>,
}

impl WorkspaceEdit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this edit changes nothing (spec §7: "operations that would
    /// produce zero edits return a well-formed empty workspace edit").
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.values().all(|(_, edits)| edits.is_empty()) && self.renames.is_empty()
    }

    pub fn add_edit(&mut self, uri: Uri, edit: TextEdit) {
        self.edits
            .entry(uri.to_string())
            .or_insert_with(|| (uri, Vec::new()))
            .1
            .push(edit);
    }

    pub fn add_edits(&mut self, uri: Uri, edits: impl IntoIterator<Item = TextEdit>) {
        for edit in edits {
            self.add_edit(uri.clone(), edit);
        }
    }

    pub fn add_rename(&mut self, old_uri: Uri, new_uri: Uri) {
        self.renames.push(FileRename { old_uri, new_uri });
    }

    /// Edits for `uri` in the order they were added.
    #[must_use]
    pub fn edits_for(&self, uri: &Uri) -> &[TextEdit] {
        self.edits
            .get(&uri.to_string())
            .map_or(&[], |(_, edits)| edits.as_slice())
    }

    pub fn documents(&self) -> impl Iterator<Item = &Uri> {
        self.edits.values().map(|(uri, _)| uri)
    }

    #[must_use]
    pub fn renames(&self) -> &[FileRename] {
        &self.renames
    }

    /// Apply this edit's text edits for `uri` to `text`, ignoring any
    /// renames (a rename is a workspace-level operation, not a per-document
    /// text transform). Edits apply right-to-left by start position so
    /// earlier ranges remain valid as later ones are applied.
    #[must_use]
    pub fn apply_to(&self, uri: &Uri, text: &str) -> String {
        let mut edits: Vec<&TextEdit> = self.edits_for(uri).iter().collect();
        edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));

        let doc = crate::document::TextDocument::new(uri.clone(), 0, text);
        let mut result = text.to_string();
        for edit in edits {
            let start = doc.offset_at(edit.range.start) as usize;
            let end = doc.offset_at(edit.range.end) as usize;
            let byte_start = utf16_count_to_byte_offset(&result, start);
            let byte_end = utf16_count_to_byte_offset(&result, end);
            result.replace_range(byte_start..byte_end, &edit.new_text);
        }
        result
    }
}

fn utf16_count_to_byte_offset(text: &str, utf16_offset: usize) -> usize {
    let mut count = 0usize;
    for (byte_idx, ch) in text.char_indices() {
        if count >= utf16_offset {
            return byte_idx;
        }
        count += ch.len_utf16();
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Position;

    #[test]
    fn empty_edit_reports_empty() {
        assert!(WorkspaceEdit::new().is_empty());
    }

    #[test]
    fn apply_replaces_in_right_to_left_order() {
        let mut edit = WorkspaceEdit::new();
        let uri = Uri::parse("file:///a.md");
        edit.add_edit(uri.clone(), TextEdit::new(Range::new(Position::new(0, 0), Position::new(0, 1)), "X"));
        edit.add_edit(uri.clone(), TextEdit::new(Range::new(Position::new(0, 2), Position::new(0, 3)), "Y"));
        let result = edit.apply_to(&uri, "abc");
        assert_eq!(result, "XbY");
    }

    #[test]
    fn renames_are_tracked_separately_from_text_edits() {
        let mut edit = WorkspaceEdit::new();
        edit.add_rename(Uri::parse("file:///old.md"), Uri::parse("file:///new.md"));
        assert!(edit.is_empty());
        assert_eq!(edit.renames().len(), 1);
    }
}
