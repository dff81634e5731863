//! The workspace contract (spec §4.4, C4) and two implementations:
//! [`FsWorkspace`], a real filesystem-backed workspace for `md-cli` and
//! integration tests, and [`InMemoryWorkspace`], a test double used by
//! every other module's unit tests.
//!
//! `Workspace` is named as an external collaborator in spec §1 ("specified
//! only by contract"), but spec §2 still budgets implementation share to
//! it, so the trait and one concrete filesystem-backed implementation both
//! live here — grounded on `blz-core/src/storage.rs`'s
//! local-filesystem-is-the-source-of-truth shape for `FsWorkspace`, and on
//! the pack's `zed/crates/fs` `Fs`-trait/backing split for the
//! trait/impl separation itself.

use crate::document::TextDocument;
use crate::error::{Error, Result};
use crate::uri::Uri;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Minimal stat result (spec §4.4 `stat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub is_directory: bool,
}

/// A "containing document" relationship (spec §4.7: notebooks and similar
/// containers whose cells/children share a TOC namespace).
#[derive(Debug, Clone)]
pub struct ContainingDocument {
    pub uri: Uri,
    pub children: Vec<Uri>,
}

/// Workspace change notifications (spec §6 "Events: Workspace").
#[derive(Debug, Clone)]
pub enum WorkspaceEvent {
    Changed(Uri),
    Created(Uri),
    Deleted(Uri),
}

/// A single file-watch notification (spec §4.4 `Watcher`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Created,
    Changed,
    Deleted,
}

/// Which of the three watch events a caller wants suppressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    pub ignore_change: bool,
    pub ignore_create: bool,
    pub ignore_delete: bool,
}

/// A live file watch; drop to unregister.
pub struct Watcher {
    pub events: tokio::sync::mpsc::UnboundedReceiver<WatchEvent>,
    _guard: Box<dyn std::any::Any + Send>,
}

/// The workspace contract every analysis algorithm in this crate is built
/// against (spec §4.4).
#[async_trait]
pub trait Workspace: Send + Sync {
    fn workspace_folders(&self) -> Vec<Uri>;

    async fn get_all_markdown_documents(&self) -> Result<Vec<TextDocument>>;

    async fn has_markdown_document(&self, uri: &Uri) -> bool;

    async fn open_markdown_document(&self, uri: &Uri) -> Option<TextDocument>;

    async fn stat(&self, uri: &Uri) -> Option<Stat>;

    async fn read_directory(&self, uri: &Uri) -> Result<Vec<(String, Stat)>>;

    fn containing_document(&self, _uri: &Uri) -> Option<ContainingDocument> {
        None
    }

    /// Subscribe to document change/create/delete events.
    fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent>;

    /// Watch a single path for create/change/delete. `None` if this
    /// workspace implementation does not support watching.
    fn watch_file(&self, _uri: &Uri, _opts: WatchOptions) -> Option<Watcher> {
        None
    }
}

// ---------------------------------------------------------------------
// In-memory test double
// ---------------------------------------------------------------------

/// A purely in-memory [`Workspace`], used by this crate's own unit tests
/// and available to embedders for testing their own integrations without
/// touching disk.
pub struct InMemoryWorkspace {
    folders: Vec<Uri>,
    docs: Mutex<HashMap<String, TextDocument>>,
    containing: Mutex<HashMap<String, ContainingDocument>>,
    events_tx: broadcast::Sender<WorkspaceEvent>,
}

impl InMemoryWorkspace {
    #[must_use]
    pub fn new(folders: Vec<Uri>) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            folders,
            docs: Mutex::new(HashMap::new()),
            containing: Mutex::new(HashMap::new()),
            events_tx,
        }
    }

    fn key(uri: &Uri) -> String {
        uri.to_string()
    }

    /// Insert or replace a document, firing the appropriate event.
    pub fn upsert_document(&self, doc: TextDocument) {
        let key = Self::key(doc.uri());
        let uri = doc.uri().clone();
        let existed = {
            let mut docs = self.docs.lock().unwrap();
            let existed = docs.contains_key(&key);
            docs.insert(key, doc);
            existed
        };
        let _ = self.events_tx.send(if existed {
            WorkspaceEvent::Changed(uri)
        } else {
            WorkspaceEvent::Created(uri)
        });
    }

    /// Remove a document, firing a delete event.
    pub fn remove_document(&self, uri: &Uri) {
        let key = Self::key(uri);
        let removed = self.docs.lock().unwrap().remove(&key).is_some();
        if removed {
            let _ = self.events_tx.send(WorkspaceEvent::Deleted(uri.clone()));
        }
    }

    /// Register a containing-document relationship (spec §4.7 notebooks).
    pub fn set_containing_document(&self, child: &Uri, containing: ContainingDocument) {
        self.containing
            .lock()
            .unwrap()
            .insert(Self::key(child), containing);
    }
}

#[async_trait]
impl Workspace for InMemoryWorkspace {
    fn workspace_folders(&self) -> Vec<Uri> {
        self.folders.clone()
    }

    async fn get_all_markdown_documents(&self) -> Result<Vec<TextDocument>> {
        Ok(self.docs.lock().unwrap().values().cloned().collect())
    }

    async fn has_markdown_document(&self, uri: &Uri) -> bool {
        self.docs.lock().unwrap().contains_key(&Self::key(uri))
    }

    async fn open_markdown_document(&self, uri: &Uri) -> Option<TextDocument> {
        self.docs.lock().unwrap().get(&Self::key(uri)).cloned()
    }

    async fn stat(&self, uri: &Uri) -> Option<Stat> {
        if self.docs.lock().unwrap().contains_key(&Self::key(uri)) {
            return Some(Stat { is_directory: false });
        }
        let prefix = format!("{}/", uri.to_string().trim_end_matches('/'));
        let has_children = self
            .docs
            .lock()
            .unwrap()
            .keys()
            .any(|k| k.starts_with(&prefix));
        if has_children {
            Some(Stat { is_directory: true })
        } else {
            None
        }
    }

    async fn read_directory(&self, uri: &Uri) -> Result<Vec<(String, Stat)>> {
        let prefix = format!("{}/", uri.to_string().trim_end_matches('/'));
        let docs = self.docs.lock().unwrap();
        let mut seen = Vec::new();
        for key in docs.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                let name = rest.split('/').next().unwrap_or(rest).to_string();
                let is_dir = rest.contains('/');
                if !seen.iter().any(|(n, _): &(String, Stat)| *n == name) {
                    seen.push((name, Stat { is_directory: is_dir }));
                }
            }
        }
        Ok(seen)
    }

    fn containing_document(&self, uri: &Uri) -> Option<ContainingDocument> {
        self.containing.lock().unwrap().get(&Self::key(uri)).cloned()
    }

    fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events_tx.subscribe()
    }
}

// ---------------------------------------------------------------------
// Filesystem-backed implementation
// ---------------------------------------------------------------------

/// A [`Workspace`] backed by the real filesystem via `tokio::fs`,
/// restricted to one or more workspace root folders.
pub struct FsWorkspace {
    folders: Vec<Uri>,
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    events_tx: broadcast::Sender<WorkspaceEvent>,
}

impl FsWorkspace {
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, extensions: Vec<String>) -> Self {
        let folders = roots
            .iter()
            .map(|r| Uri::parse(&format!("file://{}", r.to_string_lossy())))
            .collect();
        let (events_tx, _) = broadcast::channel(256);
        Self {
            folders,
            roots,
            extensions,
            events_tx,
        }
    }

    fn uri_to_path(&self, uri: &Uri) -> Option<PathBuf> {
        if uri.scheme() != "file" {
            return None;
        }
        Some(PathBuf::from(uri.path()))
    }

    fn path_is_markdown(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
    }

    async fn walk(&self, dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if file_type.is_dir() {
                Box::pin(self.walk(&path, out)).await;
            } else if self.path_is_markdown(&path) {
                out.push(path);
            }
        }
    }

    /// Notify subscribers that a document changed on disk. `md-cli` calls
    /// this after writing a workspace edit, so in-process caches observe
    /// the update without relying on a real filesystem watcher round trip.
    pub fn notify_changed(&self, uri: &Uri) {
        let _ = self.events_tx.send(WorkspaceEvent::Changed(uri.clone()));
    }
}

#[async_trait]
impl Workspace for FsWorkspace {
    fn workspace_folders(&self) -> Vec<Uri> {
        self.folders.clone()
    }

    async fn get_all_markdown_documents(&self) -> Result<Vec<TextDocument>> {
        let mut paths = Vec::new();
        for root in &self.roots {
            self.walk(root, &mut paths).await;
        }
        let mut docs = Vec::with_capacity(paths.len());
        for path in paths {
            let uri = Uri::parse(&format!("file://{}", path.to_string_lossy()));
            if let Some(doc) = self.open_markdown_document(&uri).await {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    async fn has_markdown_document(&self, uri: &Uri) -> bool {
        self.open_markdown_document(uri).await.is_some()
    }

    async fn open_markdown_document(&self, uri: &Uri) -> Option<TextDocument> {
        let path = self.uri_to_path(uri)?;
        if !self.path_is_markdown(&path) {
            return None;
        }
        let text = tokio::fs::read_to_string(&path).await.ok()?;
        Some(TextDocument::new(uri.clone(), 0, text))
    }

    async fn stat(&self, uri: &Uri) -> Option<Stat> {
        let path = self.uri_to_path(uri)?;
        let meta = tokio::fs::metadata(&path).await.ok()?;
        Some(Stat {
            is_directory: meta.is_dir(),
        })
    }

    async fn read_directory(&self, uri: &Uri) -> Result<Vec<(String, Stat)>> {
        let path = self
            .uri_to_path(uri)
            .ok_or_else(|| Error::InvalidUri(uri.to_string()))?;
        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            out.push((
                name,
                Stat {
                    is_directory: file_type.is_dir(),
                },
            ));
        }
        Ok(out)
    }

    fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events_tx.subscribe()
    }

    #[cfg(feature = "fs-watch")]
    fn watch_file(&self, uri: &Uri, opts: WatchOptions) -> Option<Watcher> {
        use notify::{Event, EventKind, RecursiveMode, Watcher as NotifyWatcher};

        let path = self.uri_to_path(uri)?;
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            let mapped = match event.kind {
                EventKind::Create(_) if !opts.ignore_create => Some(WatchEvent::Created),
                EventKind::Modify(_) if !opts.ignore_change => Some(WatchEvent::Changed),
                EventKind::Remove(_) if !opts.ignore_delete => Some(WatchEvent::Deleted),
                _ => None,
            };
            if let Some(event) = mapped {
                let _ = tx.send(event);
            }
        })
        .ok()?;
        watcher.watch(&path, RecursiveMode::NonRecursive).ok()?;

        Some(Watcher {
            events: rx,
            _guard: Box::new(watcher),
        })
    }
}

/// Shared-ownership convenience alias used by callers that need to pass a
/// workspace around (caches, the diagnostics engine, the CLI).
pub type SharedWorkspace = Arc<dyn Workspace>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_workspace_roundtrip() {
        let ws = InMemoryWorkspace::new(vec![Uri::parse("file:///root")]);
        let uri = Uri::parse("file:///root/doc.md");
        ws.upsert_document(TextDocument::new(uri.clone(), 1, "# Hi\n"));
        assert!(ws.has_markdown_document(&uri).await);
        let docs = ws.get_all_markdown_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn events_fire_on_upsert_and_remove() {
        let ws = InMemoryWorkspace::new(vec![]);
        let mut rx = ws.subscribe();
        let uri = Uri::parse("file:///a.md");
        ws.upsert_document(TextDocument::new(uri.clone(), 1, "x"));
        assert!(matches!(rx.recv().await.unwrap(), WorkspaceEvent::Created(_)));
        ws.upsert_document(TextDocument::new(uri.clone(), 2, "y"));
        assert!(matches!(rx.recv().await.unwrap(), WorkspaceEvent::Changed(_)));
        ws.remove_document(&uri);
        assert!(matches!(rx.recv().await.unwrap(), WorkspaceEvent::Deleted(_)));
    }
}
