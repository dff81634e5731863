//! Per-document lazy memoization cache (spec §4.8, C8).
//!
//! Grounded on `blz-core/src/cache.rs`'s `Arc<RwLock<HashMap<_, _>>>`
//! shared-cache shape, generalized from "cache search results" to "cache an
//! arbitrary computed value per document URI, shareable across concurrent
//! readers, cancellable on replace." The in-flight-sharing and
//! cancel-on-replace behavior is grounded on spec §4.8's own invariant text
//! rather than on a teacher precedent, since `blz`'s cache has no
//! cancellation concept — `tokio_util::sync::CancellationToken` fills that
//! gap the way `blz-core` uses `tokio::sync::RwLock` for its own
//! read-heavy cache.

use crate::uri::Uri;
use crate::workspace::{Workspace, WorkspaceEvent};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OnceCell};
use tokio_util::sync::CancellationToken;

struct Entry<T> {
    cancel: CancellationToken,
    cell: Arc<OnceCell<Option<T>>>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            cancel: self.cancel.clone(),
            cell: self.cell.clone(),
        }
    }
}

/// A per-document lazy memo keyed by URI (spec C8).
///
/// Concurrent `get` calls for the same URI share one in-flight computation;
/// [`Self::invalidate`] cancels it and starts fresh on the next `get`;
/// [`Self::remove`] does the same but leaves no residual entry until the
/// document reappears.
pub struct DocumentInfoCache<T> {
    entries: Mutex<HashMap<String, Entry<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Default for DocumentInfoCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> DocumentInfoCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn entry_for(&self, uri: &Uri) -> Entry<T> {
        let key = uri.to_string();
        let mut entries = self.entries.lock().await;
        entries
            .entry(key)
            .or_insert_with(|| Entry {
                cancel: CancellationToken::new(),
                cell: Arc::new(OnceCell::new()),
            })
            .clone()
    }

    /// Get or compute the cached value for `uri`, loading the document from
    /// `workspace` on a cache miss. Returns `None` if the document does not
    /// exist, or if the computation observed cancellation.
    pub async fn get<W, C, Fut>(&self, uri: &Uri, workspace: &W, compute: C) -> Option<T>
    where
        W: Workspace + ?Sized,
        C: FnOnce(crate::document::TextDocument, CancellationToken) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let entry = self.entry_for(uri).await;
        if let Some(existing) = entry.cell.get() {
            return existing.clone();
        }
        let doc = workspace.open_markdown_document(uri).await?;
        entry
            .cell
            .get_or_init(|| compute(doc, entry.cancel.clone()))
            .await
            .clone()
    }

    /// Populate the cache directly from an already-loaded document,
    /// bypassing a workspace round trip (spec §4.8 `getForDocument`).
    pub async fn get_for_document<C, Fut>(&self, doc: &crate::document::TextDocument, compute: C) -> Option<T>
    where
        C: FnOnce(crate::document::TextDocument, CancellationToken) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let entry = self.entry_for(doc.uri()).await;
        if let Some(existing) = entry.cell.get() {
            return existing.clone();
        }
        entry
            .cell
            .get_or_init(|| compute(doc.clone(), entry.cancel.clone()))
            .await
            .clone()
    }

    /// Replace the entry for `uri`, cancelling any in-flight computation
    /// (spec §4.8: a change event "replaces the entry, cancelling the
    /// prior computation token").
    pub async fn invalidate(&self, uri: &Uri) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.remove(&uri.to_string()) {
            entry.cancel.cancel();
        }
    }

    /// Drop the entry for `uri` entirely (spec §4.8 delete-event handling).
    pub async fn remove(&self, uri: &Uri) {
        self.invalidate(uri).await;
    }

    /// Spawn a task that invalidates/removes entries as workspace events
    /// arrive, preserving their emission order (spec §5: "workspace events
    /// are observed in emission order by both caches").
    pub fn watch_workspace(self: &Arc<Self>, mut events: broadcast::Receiver<WorkspaceEvent>) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    WorkspaceEvent::Changed(uri) | WorkspaceEvent::Created(uri) => cache.invalidate(&uri).await,
                    WorkspaceEvent::Deleted(uri) => cache.remove(&uri).await,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextDocument;
    use crate::workspace::InMemoryWorkspace;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_get_does_not_recompute() {
        let ws = InMemoryWorkspace::new(vec![]);
        let uri = Uri::parse("file:///a.md");
        ws.upsert_document(TextDocument::new(uri.clone(), 1, "# hi"));
        let cache: DocumentInfoCache<usize> = DocumentInfoCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let v1 = cache
            .get(&uri, &ws, |_doc, _cancel| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some(1usize)
                }
            })
            .await;
        assert_eq!(v1, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let v2 = cache
            .get(&uri, &ws, |_doc, _cancel| async move {
                panic!("should not recompute while entry is cached");
            })
            .await;
        assert_eq!(v2, Some(1));
    }

    #[tokio::test]
    async fn invalidate_allows_recompute() {
        let ws = InMemoryWorkspace::new(vec![]);
        let uri = Uri::parse("file:///a.md");
        ws.upsert_document(TextDocument::new(uri.clone(), 1, "# hi"));
        let cache: DocumentInfoCache<usize> = DocumentInfoCache::new();

        let v1 = cache.get(&uri, &ws, |_d, _c| async { Some(1usize) }).await;
        assert_eq!(v1, Some(1));
        cache.invalidate(&uri).await;
        let v2 = cache.get(&uri, &ws, |_d, _c| async { Some(2usize) }).await;
        assert_eq!(v2, Some(2));
    }

    #[tokio::test]
    async fn missing_document_returns_none() {
        let ws = InMemoryWorkspace::new(vec![]);
        let cache: DocumentInfoCache<usize> = DocumentInfoCache::new();
        let v = cache
            .get(&Uri::parse("file:///missing.md"), &ws, |_d, _c| async { Some(1usize) })
            .await;
        assert_eq!(v, None);
    }
}
