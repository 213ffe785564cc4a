//! Stand-in store used when the configured backend could not be opened

use async_trait::async_trait;
use shared::LedgerDocument;

use super::{DocumentKey, DocumentStore, Snapshot, Subscription};
use crate::error::{AppError, AppResult};

/// Every document operation fails with the reason the real store is missing
#[derive(Debug, Clone)]
pub struct UnavailableDocumentStore {
    reason: String,
}

impl UnavailableDocumentStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> AppError {
        AppError::Configuration(self.reason.clone())
    }
}

#[async_trait]
impl DocumentStore for UnavailableDocumentStore {
    async fn write(&self, _key: &DocumentKey, _doc: &LedgerDocument) -> AppResult<()> {
        Err(self.error())
    }

    async fn read(&self, _key: &DocumentKey) -> AppResult<Snapshot> {
        Err(self.error())
    }

    async fn subscribe(&self, _key: &DocumentKey) -> AppResult<Subscription> {
        Err(self.error())
    }

    fn backend_name(&self) -> &'static str {
        "unavailable"
    }

    fn unavailable_reason(&self) -> Option<String> {
        Some(self.reason.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Identity;

    #[tokio::test]
    async fn test_every_operation_reports_configuration() {
        let store = UnavailableDocumentStore::new("database.url is required");
        let key = DocumentKey::new("artifacts/test", Identity::parse("a7").unwrap());

        assert!(matches!(store.read(&key).await, Err(AppError::Configuration(_))));
        assert!(matches!(
            store.write(&key, &LedgerDocument::default()).await,
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(store.subscribe(&key).await, Err(AppError::Configuration(_))));
        assert_eq!(
            store.unavailable_reason().as_deref(),
            Some("database.url is required")
        );
    }
}
