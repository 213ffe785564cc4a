//! Per-identity ledger and its binding to the remote document
//!
//! The ledger is never edited record by record: a commit writes the full
//! document remotely and the ledger only changes when the document's
//! snapshot comes back.

use std::sync::Arc;

use shared::{Identity, LedgerDocument, Record};

use crate::error::{AppError, AppResult};
use crate::store::{DocumentKey, DocumentStore, Snapshot, Subscription};

/// Committed records for one identity, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    records: Vec<Record>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace everything with the content of a snapshot
    pub fn replace(&mut self, snapshot: Snapshot) {
        self.records = snapshot.map(|doc| doc.records).unwrap_or_default();
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// The document that results from committing `record`
    pub fn with_prepended(&self, record: Record) -> LedgerDocument {
        let mut records = Vec::with_capacity(self.records.len() + 1);
        records.push(record);
        records.extend(self.records.iter().cloned());
        LedgerDocument::new(records)
    }
}

/// What a delivered snapshot did to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied { records: usize },
    /// Delivered for a document that is no longer bound
    Stale,
}

/// Keeps a [`Ledger`] in step with one remote document at a time
pub struct SyncChannel {
    store: Arc<dyn DocumentStore>,
    collection: String,
    ledger: Ledger,
    bound: Option<Identity>,
    subscription: Option<Subscription>,
}

impl SyncChannel {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            ledger: Ledger::new(),
            bound: None,
            subscription: None,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn bound_identity(&self) -> Option<&Identity> {
        self.bound.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn key_for(&self, identity: &Identity) -> DocumentKey {
        DocumentKey::new(self.collection.clone(), identity.clone())
    }

    /// Point the channel at `identity`.
    ///
    /// The previous subscription is torn down first. Switching to a
    /// different identity empties the ledger before anything else can
    /// arrive; the new document is only followed while `ready` holds.
    /// A new identity is only bound once its subscription exists, so a
    /// failed subscribe leaves the channel unbound.
    pub async fn bind(&mut self, identity: Option<&Identity>, ready: bool) -> AppResult<()> {
        if let Some(previous) = self.subscription.take() {
            tracing::debug!(path = %previous.key().path(), "Unsubscribed from ledger document");
        }

        if self.bound.as_ref() != identity {
            self.ledger.clear();
            self.bound = None;
        }

        let identity = match (identity, ready) {
            (Some(identity), true) => identity,
            (identity, _) => {
                self.bound = identity.cloned();
                return Ok(());
            }
        };

        let key = self.key_for(identity);
        let subscription = self.store.subscribe(&key).await.map_err(|e| {
            tracing::warn!(path = %key.path(), "Ledger subscribe failed: {}", e);
            e
        })?;
        tracing::debug!(path = %key.path(), "Subscribed to ledger document");
        self.bound = Some(identity.clone());
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Drop the current subscription but keep the ledger as last seen
    pub fn unsubscribe(&mut self) {
        if let Some(previous) = self.subscription.take() {
            tracing::debug!(path = %previous.key().path(), "Unsubscribed from ledger document");
        }
    }

    /// Prepend `record` to the current ledger and overwrite the remote
    /// document with the result. The local ledger is left alone; it
    /// changes when the write echoes back as a snapshot.
    ///
    /// Snapshots that already arrived are applied first so the written
    /// document never drops records the channel was told about.
    pub async fn commit_record(&mut self, record: Record) -> AppResult<()> {
        let bound = self.bound.as_ref().ok_or(AppError::SessionNotReady)?;
        if &record.agricultor != bound {
            return Err(AppError::Internal(format!(
                "Record for {} cannot be written to the ledger of {}",
                record.agricultor, bound
            )));
        }
        let key = self.key_for(&record.agricultor);
        match self.subscription.as_ref() {
            Some(subscription) if subscription.key() == &key => {}
            _ => return Err(AppError::SessionNotReady),
        }

        self.drain_snapshots();
        let doc = self.ledger.with_prepended(record);
        match self.store.write(&key, &doc).await {
            Ok(()) => {
                tracing::info!(path = %key.path(), records = doc.records.len(), "Ledger written");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(path = %key.path(), "Ledger write failed: {}", e);
                Err(match e {
                    e @ (AppError::WriteFailure(_) | AppError::Configuration(_)) => e,
                    other => AppError::WriteFailure(other.to_string()),
                })
            }
        }
    }

    /// Apply a snapshot delivered for `key`; the only way the ledger changes
    pub fn on_remote_snapshot(&mut self, key: &DocumentKey, snapshot: Snapshot) -> SnapshotOutcome {
        let current = self.subscription.as_ref().map(Subscription::key);
        if current != Some(key) {
            tracing::debug!(path = %key.path(), "Ignoring snapshot for unbound document");
            return SnapshotOutcome::Stale;
        }

        self.ledger.replace(snapshot);
        tracing::debug!(path = %key.path(), records = self.ledger.len(), "Ledger replaced");
        SnapshotOutcome::Applied {
            records: self.ledger.len(),
        }
    }

    /// Wait for the next snapshot of the bound document and apply it.
    ///
    /// Returns `None` when nothing is bound or the store closed the feed.
    pub async fn next_snapshot(&mut self) -> Option<SnapshotOutcome> {
        let subscription = self.subscription.as_mut()?;
        let snapshot = subscription.next().await?;
        let key = subscription.key().clone();
        Some(self.on_remote_snapshot(&key, snapshot))
    }

    /// Apply every snapshot already waiting, without blocking
    pub fn drain_snapshots(&mut self) -> usize {
        let mut applied = 0;
        while let Some(subscription) = self.subscription.as_mut() {
            let Some(snapshot) = subscription.try_next() else {
                break;
            };
            let key = subscription.key().clone();
            if let SnapshotOutcome::Applied { .. } = self.on_remote_snapshot(&key, snapshot) {
                applied += 1;
            }
        }
        applied
    }
}
