//! In-process document store

use async_trait::async_trait;
use shared::LedgerDocument;

use super::{DocumentKey, DocumentStore, Snapshot, SnapshotHub, Subscription};
use crate::error::AppResult;

/// Document store kept entirely in memory; documents live as long as the
/// store does.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    hub: SnapshotHub,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a document; subscribers receive an empty snapshot
    pub fn delete(&self, key: &DocumentKey) {
        tracing::debug!(path = %key.path(), "Deleting ledger document");
        self.hub.publish(&key.path(), None);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn write(&self, key: &DocumentKey, doc: &LedgerDocument) -> AppResult<()> {
        tracing::debug!(
            path = %key.path(),
            records = doc.records.len(),
            "Writing ledger document"
        );
        self.hub.publish(&key.path(), Some(doc.clone()));
        Ok(())
    }

    async fn read(&self, key: &DocumentKey) -> AppResult<Snapshot> {
        Ok(self.hub.current(&key.path()))
    }

    async fn subscribe(&self, key: &DocumentKey) -> AppResult<Subscription> {
        tracing::debug!(path = %key.path(), "Subscribing to ledger document");
        Ok(self.hub.subscribe(key))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
