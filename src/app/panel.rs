use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::app::error::{LoadOutcome, MutationOutcome, SyncError};
use crate::app::sync::SyncEngine;
use crate::domain::notification::NotificationRecord;

/// What the notification panel renders.
#[derive(Debug, Clone, Serialize)]
pub struct PanelView {
    pub open: bool,
    pub user_id: Option<Uuid>,
    pub records: Vec<NotificationRecord>,
    pub unread_count: usize,
}

/// Result of clicking a notification in the panel.
#[derive(Debug, Clone, Serialize)]
pub struct OpenedNotification {
    pub outcome: MutationOutcome,
    pub link: Option<String>,
}

/// UI-facing handle: reads snapshots and routes user intents to the engine.
#[derive(Clone)]
pub struct PanelController {
    engine: SyncEngine,
    open: Arc<AtomicBool>,
}

impl PanelController {
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            engine,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn view(&self) -> PanelView {
        let snapshot = self.engine.snapshot();
        PanelView {
            open: self.is_open(),
            user_id: self.engine.current_user(),
            records: snapshot.records,
            unread_count: snapshot.unread_count,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Relaxed);
    }

    /// Flip visibility and return the new state.
    pub fn toggle(&self) -> bool {
        !self.open.fetch_xor(true, Ordering::Relaxed)
    }

    pub async fn sign_in(&self, user_id: Uuid) -> Result<LoadOutcome, SyncError> {
        self.engine.switch_identity(Some(user_id)).await
    }

    /// Closes the panel along with the session.
    pub async fn sign_out(&self) -> Result<LoadOutcome, SyncError> {
        self.set_open(false);
        self.engine.switch_identity(None).await
    }

    pub async fn load(&self) -> Result<LoadOutcome, SyncError> {
        self.engine.load().await
    }

    /// Mark the record read and hand back its deep link.
    pub async fn open_notification(&self, id: Uuid) -> OpenedNotification {
        let link = self.engine.record(id).as_ref().and_then(NotificationRecord::link);
        let outcome = self.engine.mark_read(id).await;
        OpenedNotification { outcome, link }
    }

    pub async fn mark_read(&self, id: Uuid) -> MutationOutcome {
        self.engine.mark_read(id).await
    }

    pub async fn mark_all_read(&self) -> MutationOutcome {
        self.engine.mark_all_read().await
    }

    pub async fn remove(&self, id: Uuid) -> MutationOutcome {
        self.engine.remove(id).await
    }

    pub async fn remove_all(&self) -> MutationOutcome {
        self.engine.remove_all().await
    }
}
