//! PostgreSQL-backed document store
//!
//! Documents live in `ledger_documents` as JSONB. A trigger notifies
//! `ledger_documents_changed` with the document path on every change; a
//! listener task re-reads tracked paths and fans the new state out. When
//! the listener connection drops, notifications sent meanwhile are lost,
//! so every tracked path is re-read once it is back.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shared::LedgerDocument;
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::task::JoinHandle;

use super::{DocumentKey, DocumentStore, Snapshot, SnapshotHub, Subscription};
use crate::error::{AppError, AppResult};

/// Notification channel raised by the `ledger_documents` trigger
pub const CHANGE_CHANNEL: &str = "ledger_documents_changed";

/// Document store on PostgreSQL with LISTEN/NOTIFY change feed
pub struct PgDocumentStore {
    db: PgPool,
    hub: Arc<SnapshotHub>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl PgDocumentStore {
    /// Start listening for document changes on `db`
    pub async fn connect(db: PgPool) -> AppResult<Self> {
        let mut listener = PgListener::connect_with(&db)
            .await
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        let hub = Arc::new(SnapshotHub::new());
        let task = tokio::spawn(listen_for_changes(listener, db.clone(), hub.clone()));
        tracing::info!("Listening for ledger document changes on {}", CHANGE_CHANNEL);

        Ok(Self {
            db,
            hub,
            listener: Mutex::new(Some(task)),
        })
    }
}

async fn listen_for_changes(mut listener: PgListener, db: PgPool, hub: Arc<SnapshotHub>) {
    loop {
        match listener.try_recv().await {
            Ok(Some(notification)) => {
                let path = notification.payload();
                if !hub.is_tracked(path) {
                    continue;
                }
                match fetch_document(&db, path).await {
                    Ok(snapshot) => {
                        tracing::debug!(path = %path, exists = snapshot.is_some(), "Document changed");
                        hub.refresh(path, snapshot);
                    }
                    Err(e) => tracing::warn!(path = %path, "Could not reload document: {}", e),
                }
            }
            Ok(None) => {
                tracing::warn!("Change listener connection lost");
                relisten(&mut listener).await;
                let refreshed = resync_tracked(&hub, |path| fetch_owned(db.clone(), path)).await;
                tracing::info!(refreshed, "Change listener reconnected");
            }
            Err(e) => {
                tracing::error!("Change listener error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
                relisten(&mut listener).await;
                resync_tracked(&hub, |path| fetch_owned(db.clone(), path)).await;
            }
        }
    }
}

/// Re-establish the listener connection and its LISTEN, retrying until it
/// succeeds
async fn relisten(listener: &mut PgListener) {
    loop {
        // Dropping the channel first keeps it from being listed twice
        let result = match listener.unlisten(CHANGE_CHANNEL).await {
            Ok(()) => listener.listen(CHANGE_CHANNEL).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => return,
            Err(e) => {
                tracing::warn!("Could not re-listen on {}: {}", CHANGE_CHANNEL, e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Re-read every tracked path and publish the ones that changed. Returns
/// how many were published.
async fn resync_tracked<F, Fut>(hub: &SnapshotHub, fetch: F) -> usize
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = AppResult<Snapshot>>,
{
    let mut refreshed = 0;
    for path in hub.tracked_paths() {
        match fetch(path.clone()).await {
            Ok(snapshot) if snapshot != hub.current(&path) => {
                if hub.refresh(&path, snapshot) {
                    refreshed += 1;
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(path = %path, "Could not reload document: {}", e),
        }
    }
    refreshed
}

async fn fetch_owned(db: PgPool, path: String) -> AppResult<Snapshot> {
    fetch_document(&db, &path).await
}

async fn fetch_document(db: &PgPool, path: &str) -> AppResult<Snapshot> {
    let body = sqlx::query_scalar::<_, Json<LedgerDocument>>(
        "SELECT body FROM ledger_documents WHERE doc_path = $1",
    )
    .bind(path)
    .fetch_optional(db)
    .await?;

    Ok(body.map(|Json(doc)| doc))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn write(&self, key: &DocumentKey, doc: &LedgerDocument) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_documents (doc_path, identity, body, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (doc_path)
            DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
            "#,
        )
        .bind(key.path())
        .bind(key.identity().as_str())
        .bind(Json(doc.clone()))
        .execute(&self.db)
        .await
        .map_err(|e| AppError::WriteFailure(e.to_string()))?;

        tracing::debug!(path = %key.path(), records = doc.records.len(), "Wrote ledger document");
        Ok(())
    }

    async fn read(&self, key: &DocumentKey) -> AppResult<Snapshot> {
        fetch_document(&self.db, &key.path()).await
    }

    async fn subscribe(&self, key: &DocumentKey) -> AppResult<Subscription> {
        let pruned = self.hub.prune();
        if pruned > 0 {
            tracing::debug!("Dropped {} unfollowed document channels", pruned);
        }

        // Track the path before reading so a change landing in between
        // still reaches the subscriber.
        let subscription = self.hub.subscribe(key);
        let path = key.path();
        let current = fetch_document(&self.db, &path).await?;
        self.hub.refresh(&path, current);
        Ok(subscription)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn shutdown(&self) {
        let task = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
            tracing::info!("Stopped ledger document listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Identity;

    fn key(code: &str) -> DocumentKey {
        DocumentKey::new("artifacts/test/public/data/kua-data", Identity::parse(code).unwrap())
    }

    #[tokio::test]
    async fn test_resync_publishes_changes_missed_while_disconnected() {
        let hub = SnapshotHub::new();
        let mut a = hub.subscribe(&key("a"));
        let mut b = hub.subscribe(&key("b"));
        assert_eq!(a.try_next(), Some(None));
        assert_eq!(b.try_next(), Some(None));

        let written = LedgerDocument::default();
        let a_path = key("a").path();
        let refreshed = resync_tracked(&hub, |path| {
            let doc = written.clone();
            let found = path == a_path;
            async move {
                if path.ends_with("/B") {
                    Err(AppError::Internal("connection refused".to_string()))
                } else {
                    Ok(found.then_some(doc))
                }
            }
        })
        .await;

        assert_eq!(refreshed, 1);
        assert_eq!(a.try_next(), Some(Some(written)));
        assert_eq!(b.try_next(), None);
    }

    #[tokio::test]
    async fn test_resync_skips_unchanged_documents() {
        let hub = SnapshotHub::new();
        let mut a = hub.subscribe(&key("a"));
        assert_eq!(a.try_next(), Some(None));

        let refreshed = resync_tracked(&hub, |_| async { Ok::<Snapshot, AppError>(None) }).await;
        assert_eq!(refreshed, 0);
        assert_eq!(a.try_next(), None);
    }
}
