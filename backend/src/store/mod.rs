//! Keyed ledger document store
//!
//! Every farmer code owns one document at
//! `artifacts/<app-id>/public/data/<collection>/<identity>`. The only
//! mutation is a full overwrite; readers follow a document through a
//! [`Subscription`] that yields its whole state on every change.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use shared::{Identity, LedgerDocument};
use tokio::sync::watch;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;
pub mod unavailable;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use unavailable::UnavailableDocumentStore;

/// Full document state; `None` when the document does not exist
pub type Snapshot = Option<LedgerDocument>;

/// Address of one farmer's ledger document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    collection: String,
    identity: Identity,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, identity: Identity) -> Self {
        Self {
            collection: collection.into(),
            identity,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.identity)
    }
}

/// Storage for ledger documents with change notification
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Replace the whole document at `key`
    async fn write(&self, key: &DocumentKey, doc: &LedgerDocument) -> AppResult<()>;

    /// Current state of the document at `key`
    async fn read(&self, key: &DocumentKey) -> AppResult<Snapshot>;

    /// Follow the document at `key`; the first item is its current state
    async fn subscribe(&self, key: &DocumentKey) -> AppResult<Subscription>;

    /// Name used in logs and health output
    fn backend_name(&self) -> &'static str;

    /// Why the store cannot serve documents, if it cannot
    fn unavailable_reason(&self) -> Option<String> {
        None
    }

    /// Release background resources
    async fn shutdown(&self) {}
}

/// Live view of one document. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    key: DocumentKey,
    rx: watch::Receiver<Snapshot>,
    primed: bool,
}

impl Subscription {
    pub fn new(key: DocumentKey, rx: watch::Receiver<Snapshot>) -> Self {
        Self {
            key,
            rx,
            primed: true,
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Wait for the next document state. Intermediate states written in
    /// quick succession may be coalesced into the latest one.
    ///
    /// Returns `None` once the store has dropped the document's channel.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if self.primed {
            self.primed = false;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Non-blocking variant of [`next`](Self::next)
    pub fn try_next(&mut self) -> Option<Snapshot> {
        if self.primed {
            self.primed = false;
            return Some(self.rx.borrow_and_update().clone());
        }
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }
}

/// Fan-out of document states to every subscriber of a path
#[derive(Debug, Default)]
pub(crate) struct SnapshotHub {
    channels: Mutex<HashMap<String, watch::Sender<Snapshot>>>,
}

impl SnapshotHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, watch::Sender<Snapshot>>> {
        // A poisoned map still holds valid senders
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a new state to current and future subscribers of `path`
    pub(crate) fn publish(&self, path: &str, snapshot: Snapshot) {
        let mut channels = self.lock();
        match channels.get(path) {
            Some(tx) => {
                tx.send_replace(snapshot);
            }
            None => {
                let (tx, _rx) = watch::channel(snapshot);
                channels.insert(path.to_string(), tx);
            }
        }
    }

    /// Publish only if `path` is already tracked
    pub(crate) fn refresh(&self, path: &str, snapshot: Snapshot) -> bool {
        match self.lock().get(path) {
            Some(tx) => {
                tx.send_replace(snapshot);
                true
            }
            None => false,
        }
    }

    pub(crate) fn current(&self, path: &str) -> Snapshot {
        self.lock().get(path).and_then(|tx| tx.borrow().clone())
    }

    pub(crate) fn is_tracked(&self, path: &str) -> bool {
        self.lock().contains_key(path)
    }

    pub(crate) fn tracked_paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub(crate) fn subscribe(&self, key: &DocumentKey) -> Subscription {
        let path = key.path();
        let mut channels = self.lock();
        let tx = channels
            .entry(path)
            .or_insert_with(|| watch::channel(None).0);
        Subscription::new(key.clone(), tx.subscribe())
    }

    /// Forget paths nobody is following
    pub(crate) fn prune(&self) -> usize {
        let mut channels = self.lock();
        let before = channels.len();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        before - channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: &str) -> DocumentKey {
        DocumentKey::new(
            "artifacts/kua-agro-app/public/data/kua-data",
            Identity::parse(code).unwrap(),
        )
    }

    #[test]
    fn test_document_path() {
        assert_eq!(
            key("a7").path(),
            "artifacts/kua-agro-app/public/data/kua-data/A7"
        );
    }

    #[tokio::test]
    async fn test_subscription_starts_with_current_state() {
        let hub = SnapshotHub::new();
        hub.publish(&key("a7").path(), Some(LedgerDocument::default()));

        let mut sub = hub.subscribe(&key("a7"));
        assert_eq!(sub.try_next(), Some(Some(LedgerDocument::default())));
        assert_eq!(sub.try_next(), None);

        hub.publish(&key("a7").path(), None);
        assert_eq!(sub.next().await, Some(None));
    }

    #[test]
    fn test_refresh_ignores_untracked_paths() {
        let hub = SnapshotHub::new();
        assert!(!hub.refresh("unknown", None));
        let _sub = hub.subscribe(&key("b2"));
        assert!(hub.refresh(&key("b2").path(), Some(LedgerDocument::default())));
        assert!(hub.is_tracked(&key("b2").path()));
    }

    #[test]
    fn test_prune_drops_unfollowed_paths() {
        let hub = SnapshotHub::new();
        let sub = hub.subscribe(&key("c3"));
        assert_eq!(hub.prune(), 0);
        drop(sub);
        assert_eq!(hub.prune(), 1);
        assert!(!hub.is_tracked(&key("c3").path()));
    }

    #[test]
    fn test_next_waits_for_a_change() {
        let hub = SnapshotHub::new();
        let mut sub = hub.subscribe(&key("d4"));
        assert_eq!(sub.try_next(), Some(None));

        let mut next = tokio_test::task::spawn(sub.next());
        tokio_test::assert_pending!(next.poll());

        hub.publish(&key("d4").path(), Some(LedgerDocument::default()));
        assert!(next.is_woken());
        tokio_test::assert_ready_eq!(next.poll(), Some(Some(LedgerDocument::default())));
    }
}
