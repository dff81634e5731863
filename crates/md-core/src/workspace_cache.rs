//! Eager enumeration plus lazy per-document values across a workspace
//! (spec §4.9, C9).
//!
//! Layers on top of [`DocumentInfoCache`] the way `blz-core`'s per-source
//! cache layers on top of its per-path search-result cache: one extra
//! piece of state (the enumerated URI list) populated once, then kept in
//! sync with create/delete events the same way the per-document cache
//! handles change/delete.

use crate::document::TextDocument;
use crate::doc_cache::DocumentInfoCache;
use crate::uri::Uri;
use crate::workspace::{Workspace, WorkspaceEvent};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

/// Eager workspace-wide enumeration with lazy per-document values (spec
/// C9).
pub struct WorkspaceInfoCache<T> {
    docs: DocumentInfoCache<T>,
    enumerated: Mutex<Option<Vec<Uri>>>,
}

impl<T: Clone + Send + Sync + 'static> Default for WorkspaceInfoCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> WorkspaceInfoCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            docs: DocumentInfoCache::new(),
            enumerated: Mutex::new(None),
        }
    }

    async fn ensure_enumerated<W: Workspace + ?Sized>(&self, workspace: &W) -> Vec<Uri> {
        let mut guard = self.enumerated.lock().await;
        if let Some(list) = guard.as_ref() {
            return list.clone();
        }
        let list: Vec<Uri> = workspace
            .get_all_markdown_documents()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|d| d.uri().clone())
            .collect();
        *guard = Some(list.clone());
        list
    }

    /// Every workspace document's computed value, keyed by URI, in
    /// enumeration order.
    pub async fn entries<W, C, Fut>(&self, workspace: &W, compute: C) -> Vec<(Uri, T)>
    where
        W: Workspace + ?Sized,
        C: Fn(TextDocument, CancellationToken) -> Fut + Clone,
        Fut: Future<Output = Option<T>>,
    {
        let uris = self.ensure_enumerated(workspace).await;
        let mut out = Vec::with_capacity(uris.len());
        for uri in uris {
            if let Some(value) = self.docs.get(&uri, workspace, compute.clone()).await {
                out.push((uri, value));
            }
        }
        out
    }

    /// Just the values, discarding URIs.
    pub async fn values<W, C, Fut>(&self, workspace: &W, compute: C) -> Vec<T>
    where
        W: Workspace + ?Sized,
        C: Fn(TextDocument, CancellationToken) -> Fut + Clone,
        Fut: Future<Output = Option<T>>,
    {
        self.entries(workspace, compute).await.into_iter().map(|(_, v)| v).collect()
    }

    /// Compute values for an already-known set of documents, bypassing
    /// enumeration (spec §4.9 `getForDocs`).
    pub async fn get_for_docs<C, Fut>(&self, docs: &[TextDocument], compute: C) -> Vec<T>
    where
        C: Fn(TextDocument, CancellationToken) -> Fut + Clone,
        Fut: Future<Output = Option<T>>,
    {
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            if let Some(value) = self.docs.get_for_document(doc, compute.clone()).await {
                out.push(value);
            }
        }
        out
    }

    async fn on_created(&self, uri: &Uri) {
        let mut guard = self.enumerated.lock().await;
        if let Some(list) = guard.as_mut() {
            if !list.contains(uri) {
                list.push(uri.clone());
            }
        }
    }

    async fn on_changed(&self, uri: &Uri) {
        self.docs.invalidate(uri).await;
    }

    async fn on_deleted(&self, uri: &Uri) {
        {
            let mut guard = self.enumerated.lock().await;
            if let Some(list) = guard.as_mut() {
                list.retain(|u| u != uri);
            }
        }
        self.docs.remove(uri).await;
    }

    /// Spawn a task keeping this cache in sync with workspace events,
    /// preserving their emission order.
    pub fn watch_workspace(self: &Arc<Self>, mut events: broadcast::Receiver<WorkspaceEvent>) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    WorkspaceEvent::Changed(uri) => cache.on_changed(&uri).await,
                    WorkspaceEvent::Created(uri) => {
                        cache.on_created(&uri).await;
                        cache.on_changed(&uri).await;
                    },
                    WorkspaceEvent::Deleted(uri) => cache.on_deleted(&uri).await,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::InMemoryWorkspace;

    async fn heading_count(doc: TextDocument, _cancel: CancellationToken) -> Option<usize> {
        Some(doc.full_text().lines().filter(|l| l.starts_with('#')).count())
    }

    #[tokio::test]
    async fn entries_enumerates_and_computes_lazily() {
        let ws = InMemoryWorkspace::new(vec![]);
        ws.upsert_document(TextDocument::new(Uri::parse("file:///a.md"), 1, "# a\n"));
        ws.upsert_document(TextDocument::new(Uri::parse("file:///b.md"), 1, "# b\n## c\n"));

        let cache: WorkspaceInfoCache<usize> = WorkspaceInfoCache::new();
        let mut entries = cache.entries(&ws, heading_count).await;
        entries.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        assert_eq!(entries[0].1, 1);
        assert_eq!(entries[1].1, 2);
    }

    #[tokio::test]
    async fn created_document_is_picked_up_after_enumeration() {
        let ws = InMemoryWorkspace::new(vec![]);
        ws.upsert_document(TextDocument::new(Uri::parse("file:///a.md"), 1, "# a\n"));
        let cache: Arc<WorkspaceInfoCache<usize>> = Arc::new(WorkspaceInfoCache::new());

        let first = cache.entries(&ws, heading_count).await;
        assert_eq!(first.len(), 1);

        let new_uri = Uri::parse("file:///b.md");
        ws.upsert_document(TextDocument::new(new_uri.clone(), 1, "# b\n"));
        cache.on_created(&new_uri).await;

        let second = cache.entries(&ws, heading_count).await;
        assert_eq!(second.len(), 2);
    }
}
