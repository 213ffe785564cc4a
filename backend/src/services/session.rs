//! Field session: one device entering counts for one farmer code
//!
//! Ties the week anchor, the draft form, the ledger sync channel and the
//! exporter together. Everything runs on a single task; remote events are
//! pulled in through [`FieldSession::process_next_event`].

use std::sync::Arc;

use shared::{
    next_record_id, prepare_export, DerivedFields, Draft, DraftField, ExportFile, FieldUpdate,
    Identity, Record, WeekState,
};
use tokio::sync::watch;

use super::ledger::{SnapshotOutcome, SyncChannel};
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::store::DocumentStore;

/// Screen shown to the field worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Form,
    Ledger,
}

/// Something that happened while pumping remote events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    ReadinessChanged { ready: bool },
    LedgerReplaced { records: usize },
    StaleSnapshot,
    ReadinessClosed,
    SnapshotFeedClosed,
}

enum Wakeup {
    Readiness { open: bool },
    Snapshot(Option<SnapshotOutcome>),
    Idle,
}

pub struct FieldSession {
    channel: Option<SyncChannel>,
    configuration_error: Option<String>,
    readiness: watch::Receiver<bool>,
    readiness_open: bool,
    clock: Arc<dyn Clock>,
    identity: Option<Identity>,
    week: WeekState,
    draft: Draft,
    view: View,
}

impl FieldSession {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        readiness: watch::Receiver<bool>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::build(Some(SyncChannel::new(store, collection)), None, readiness, clock)
    }

    /// A session whose store could not be set up; every remote operation
    /// reports the configuration error.
    pub fn unavailable(
        reason: impl Into<String>,
        readiness: watch::Receiver<bool>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let reason = reason.into();
        tracing::error!("Document store unavailable: {}", reason);
        Self::build(None, Some(reason), readiness, clock)
    }

    fn build(
        channel: Option<SyncChannel>,
        configuration_error: Option<String>,
        readiness: watch::Receiver<bool>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let week = WeekState::current(clock.today());
        Self {
            channel,
            configuration_error,
            readiness,
            readiness_open: true,
            clock,
            identity: None,
            week,
            draft: Draft::new(),
            view: View::Form,
        }
    }

    /// Blocking notice to show at login when the store is unusable
    pub fn configuration_error(&self) -> Option<AppError> {
        self.configuration_error
            .as_ref()
            .map(|reason| AppError::Configuration(reason.clone()))
    }

    pub fn is_ready(&self) -> bool {
        *self.readiness.borrow()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Enter a farmer code and start following that farmer's ledger
    pub async fn login(&mut self, code: &str) -> AppResult<Identity> {
        if let Some(err) = self.configuration_error() {
            return Err(err);
        }
        if !self.is_ready() {
            return Err(AppError::AuthPending);
        }

        let identity = Identity::parse(code)?;
        self.switch_identity(Some(identity.clone())).await?;
        tracing::info!(agricultor = %identity, "Farmer signed in");
        Ok(identity)
    }

    /// Leave the current farmer code; the ledger is emptied
    pub async fn logout(&mut self) -> AppResult<()> {
        self.switch_identity(None).await
    }

    async fn switch_identity(&mut self, identity: Option<Identity>) -> AppResult<()> {
        let ready = self.is_ready();
        self.view = View::Form;
        if let Some(channel) = self.channel.as_mut() {
            if let Err(e) = channel.bind(identity.as_ref(), ready).await {
                self.identity = None;
                return Err(e);
            }
        }
        self.identity = identity;
        Ok(())
    }

    /// Wait for the next readiness change or ledger snapshot and apply it.
    ///
    /// Returns `None` when neither feed can deliver anything any more.
    pub async fn process_next_event(&mut self) -> AppResult<Option<SessionEvent>> {
        let subscribed = self
            .channel
            .as_ref()
            .map_or(false, SyncChannel::is_subscribed);
        let readiness_open = self.readiness_open;
        if !readiness_open && !subscribed {
            return Ok(None);
        }

        let wakeup = {
            let readiness = &mut self.readiness;
            let channel = self.channel.as_mut();
            tokio::select! {
                changed = readiness.changed(), if readiness_open => {
                    Wakeup::Readiness { open: changed.is_ok() }
                }
                outcome = next_snapshot(channel), if subscribed => Wakeup::Snapshot(outcome),
                else => Wakeup::Idle,
            }
        };

        match wakeup {
            Wakeup::Readiness { open: true } => {
                let ready = *self.readiness.borrow_and_update();
                tracing::info!(ready, "Identity readiness changed");
                if let Some(channel) = self.channel.as_mut() {
                    if ready {
                        channel.bind(self.identity.as_ref(), true).await?;
                    } else {
                        channel.unsubscribe();
                    }
                }
                Ok(Some(SessionEvent::ReadinessChanged { ready }))
            }
            Wakeup::Readiness { open: false } => {
                self.readiness_open = false;
                Ok(Some(SessionEvent::ReadinessClosed))
            }
            Wakeup::Snapshot(Some(SnapshotOutcome::Applied { records })) => {
                Ok(Some(SessionEvent::LedgerReplaced { records }))
            }
            Wakeup::Snapshot(Some(SnapshotOutcome::Stale)) => Ok(Some(SessionEvent::StaleSnapshot)),
            Wakeup::Snapshot(None) => {
                if let Some(channel) = self.channel.as_mut() {
                    channel.unsubscribe();
                }
                Ok(Some(SessionEvent::SnapshotFeedClosed))
            }
            Wakeup::Idle => Ok(None),
        }
    }

    /// Apply snapshots that already arrived without waiting
    pub fn apply_pending_snapshots(&mut self) -> usize {
        self.channel
            .as_mut()
            .map_or(0, SyncChannel::drain_snapshots)
    }

    pub fn week(&self) -> WeekState {
        self.week
    }

    pub fn set_week_override(&mut self, value: i32) {
        self.week.set_override(value);
    }

    pub fn reset_week(&mut self) {
        self.week.reset(self.clock.today());
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn update_field(&mut self, field: DraftField, raw: &str) -> FieldUpdate {
        self.draft.update_field(field, raw)
    }

    pub fn derived_fields(&self) -> DerivedFields {
        self.draft.derived_fields()
    }

    /// Save the draft as a record.
    ///
    /// Counts are cleared and the view moves to the ledger only once the
    /// write succeeded; on failure the draft and view stay as they were.
    pub async fn commit(&mut self) -> AppResult<Record> {
        if self.channel.is_none() {
            return Err(self.configuration_error().unwrap_or(AppError::SessionNotReady));
        }
        let identity = self.identity.as_ref().ok_or(AppError::SessionNotReady)?;
        if !*self.readiness.borrow() {
            return Err(AppError::AuthPending);
        }
        let Some(channel) = self.channel.as_mut() else {
            return Err(AppError::SessionNotReady);
        };

        channel.drain_snapshots();
        let id = next_record_id(self.clock.now().timestamp_millis(), channel.ledger().records());
        let record = self.draft.to_record(id, self.week.value, identity);
        channel.commit_record(record.clone()).await?;

        self.draft.clear_counts();
        self.view = View::Ledger;
        Ok(record)
    }

    /// Ledger as last delivered by the remote document
    pub fn records(&self) -> &[Record] {
        self.channel
            .as_ref()
            .map_or(&[][..], |channel| channel.ledger().records())
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn show_form(&mut self) {
        self.view = View::Form;
    }

    pub fn show_ledger(&mut self) {
        self.view = View::Ledger;
    }

    pub fn can_export(&self) -> bool {
        !self.records().is_empty()
    }

    /// CSV download of the ledger, `None` while it is empty
    pub fn export(&self) -> AppResult<Option<ExportFile>> {
        Ok(prepare_export(self.records(), self.clock.now())?)
    }
}

async fn next_snapshot(channel: Option<&mut SyncChannel>) -> Option<SnapshotOutcome> {
    match channel {
        Some(channel) => channel.next_snapshot().await,
        None => None,
    }
}
