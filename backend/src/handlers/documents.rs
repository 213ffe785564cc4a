//! Ledger document handlers
//!
//! One document per farmer code. Writes overwrite the whole document;
//! the stream endpoint pushes the full state on every change.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::Utc;
use serde::Serialize;
use shared::{prepare_export, Identity, LedgerDocument, Record};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentSession;
use crate::store::{DocumentKey, Snapshot};
use crate::AppState;

/// Body of every `snapshot` event on the stream
#[derive(Debug, Serialize)]
pub struct SnapshotPayload {
    pub exists: bool,
    pub records: Vec<Record>,
}

impl From<Snapshot> for SnapshotPayload {
    fn from(snapshot: Snapshot) -> Self {
        match snapshot {
            Some(doc) => Self {
                exists: true,
                records: doc.records,
            },
            None => Self {
                exists: false,
                records: Vec::new(),
            },
        }
    }
}

fn document_key(state: &AppState, code: &str) -> AppResult<DocumentKey> {
    let identity = Identity::parse(code)?;
    Ok(DocumentKey::new(state.collection_path(), identity))
}

/// Current ledger document for a farmer code
pub async fn get_document(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(code): Path<String>,
) -> AppResult<Json<LedgerDocument>> {
    let key = document_key(&state, &code)?;
    let doc = state
        .store
        .read(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ledger for {}", key.identity())))?;
    Ok(Json(doc))
}

/// Overwrite a farmer's ledger document
pub async fn put_document(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(code): Path<String>,
    Json(doc): Json<LedgerDocument>,
) -> AppResult<StatusCode> {
    let key = document_key(&state, &code)?;

    if let Some(foreign) = doc.records.iter().find(|r| &r.agricultor != key.identity()) {
        return Err(AppError::Validation {
            field: "records".to_string(),
            message: format!(
                "Record {} belongs to {}, not {}",
                foreign.id,
                foreign.agricultor,
                key.identity()
            ),
            message_es: "El registro pertenece a otro agricultor.".to_string(),
        });
    }

    state.store.write(&key, &doc).await.map_err(|e| match e {
        e @ (AppError::WriteFailure(_) | AppError::Configuration(_)) => e,
        other => AppError::WriteFailure(other.to_string()),
    })?;
    tracing::info!(
        session_id = %session.session_id,
        path = %key.path(),
        records = doc.records.len(),
        "Ledger document replaced"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Server-sent `snapshot` events with the whole document, starting with
/// its current state
pub async fn stream_document(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(code): Path<String>,
) -> AppResult<Response> {
    let key = document_key(&state, &code)?;
    let mut subscription = state.store.subscribe(&key).await?;
    let (sse_tx, sse_rx) = mpsc::unbounded_channel::<Result<Event, Infallible>>();

    tokio::spawn(async move {
        loop {
            let snapshot = tokio::select! {
                snapshot = subscription.next() => snapshot,
                _ = sse_tx.closed() => break,
            };
            let Some(snapshot) = snapshot else {
                break;
            };

            let event = match Event::default()
                .event("snapshot")
                .json_data(SnapshotPayload::from(snapshot))
            {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(path = %subscription.key().path(), "Could not encode snapshot: {}", e);
                    break;
                }
            };
            if sse_tx.send(Ok(event)).is_err() {
                break;
            }
        }
        tracing::debug!(path = %subscription.key().path(), "Ledger stream closed");
    });

    Ok(Sse::new(UnboundedReceiverStream::new(sse_rx))
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// CSV download of a farmer's ledger; 204 when there is nothing to export
pub async fn export_document(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(code): Path<String>,
) -> AppResult<Response> {
    let key = document_key(&state, &code)?;
    let records = state
        .store
        .read(&key)
        .await?
        .map(|doc| doc.records)
        .unwrap_or_default();

    match prepare_export(&records, Utc::now())? {
        Some(file) => {
            tracing::info!(path = %key.path(), records = records.len(), "Ledger exported");
            Ok((
                [
                    (header::CONTENT_TYPE, file.content_type.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", file.filename),
                    ),
                ],
                file.bytes,
            )
                .into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
